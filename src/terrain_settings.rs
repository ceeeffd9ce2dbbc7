//! Terrain configuration shared by the grid and every chunk.
//!
//! `TerrainConfig` is the raw, deserializable shape. `TerrainSettings` is the
//! validated form the streaming code runs on; it is built once and then shared
//! read-only through an `Arc`.

use serde::Deserialize;

use crate::error::TerrainError;
use crate::height_map::HeightMapSettings;
use crate::lod::{DetailLevels, LodInfo};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World units between adjacent height samples
    pub mesh_scale: f32,
    /// Height samples along one chunk edge
    pub verts_per_line: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 1.0,
            verts_per_line: 97,
        }
    }
}

impl MeshSettings {
    /// Edge length of one chunk in world units. Neighbouring chunks share an edge row.
    pub fn mesh_world_size(&self) -> f32 {
        (self.verts_per_line - 1) as f32 * self.mesh_scale
    }

    fn check(&self) -> Result<(), TerrainError> {
        if self.verts_per_line < 2 {
            return Err(TerrainError::InvalidMeshSettings(format!(
                "verts_per_line must be at least 2, got {}",
                self.verts_per_line
            )));
        }
        if !self.mesh_scale.is_finite() || self.mesh_scale <= 0.0 {
            return Err(TerrainError::InvalidMeshSettings(format!(
                "mesh_scale must be positive, got {}",
                self.mesh_scale
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    pub detail_levels: Vec<LodInfo>,
    /// Index into `detail_levels` whose mesh doubles as the collision surface
    pub collider_lod_index: usize,
    /// Rescan the view radius only after the viewer moves this far. 0 rescans every tick.
    pub viewer_move_threshold: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            height_map: HeightMapSettings::default(),
            mesh: MeshSettings::default(),
            detail_levels: vec![
                LodInfo::new(0, 200.0),
                LodInfo::new(1, 400.0),
                LodInfo::new(3, 600.0),
            ],
            collider_lod_index: 0,
            viewer_move_threshold: 0.0,
        }
    }
}

impl TerrainConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, TerrainError> {
        Ok(toml::from_str(text)?)
    }

    /// Clamp numeric noise parameters and check the tables.
    pub fn validated(self) -> Result<TerrainSettings, TerrainError> {
        let TerrainConfig {
            mut height_map,
            mesh,
            detail_levels,
            collider_lod_index,
            viewer_move_threshold,
        } = self;

        height_map.validate();
        mesh.check()?;
        let detail_levels = DetailLevels::new(detail_levels)?;
        if collider_lod_index >= detail_levels.len() {
            return Err(TerrainError::ColliderLodOutOfRange {
                index: collider_lod_index,
                levels: detail_levels.len(),
            });
        }

        Ok(TerrainSettings {
            height_map,
            mesh,
            detail_levels,
            collider_lod_index,
            viewer_move_threshold: viewer_move_threshold.max(0.0),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TerrainSettings {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    pub detail_levels: DetailLevels,
    pub collider_lod_index: usize,
    pub viewer_move_threshold: f32,
}

impl TerrainSettings {
    pub fn chunk_world_size(&self) -> f32 {
        self.mesh.mesh_world_size()
    }

    /// Chunks in each direction from the viewer's chunk that the radius scan covers.
    pub fn chunks_visible_in_view_distance(&self) -> i32 {
        (self.detail_levels.max_view_distance() / self.chunk_world_size()).round() as i32
    }

    pub fn collider_lod(&self) -> &LodInfo {
        // Index checked in `TerrainConfig::validated`.
        &self.detail_levels[self.collider_lod_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::NormalizeMode;

    #[test]
    fn test_default_config_validates() {
        let settings = TerrainConfig::default().validated().unwrap();
        assert_eq!(settings.chunk_world_size(), 96.0);
        assert_eq!(settings.chunks_visible_in_view_distance(), 6);
        assert_eq!(settings.collider_lod().lod, 0);
    }

    #[test]
    fn test_collider_index_out_of_range() {
        let config = TerrainConfig {
            collider_lod_index: 3,
            ..TerrainConfig::default()
        };
        assert_eq!(
            config.validated(),
            Err(TerrainError::ColliderLodOutOfRange {
                index: 3,
                levels: 3
            })
        );
    }

    #[test]
    fn test_empty_detail_levels() {
        let config = TerrainConfig {
            detail_levels: Vec::new(),
            ..TerrainConfig::default()
        };
        assert_eq!(config.validated(), Err(TerrainError::EmptyDetailLevels));
    }

    #[test]
    fn test_invalid_mesh_settings() {
        let config = TerrainConfig {
            mesh: MeshSettings {
                mesh_scale: 0.0,
                verts_per_line: 10,
            },
            ..TerrainConfig::default()
        };
        assert!(matches!(
            config.validated(),
            Err(TerrainError::InvalidMeshSettings(_))
        ));
    }

    #[test]
    fn test_noise_parameters_clamped_not_rejected() {
        let mut config = TerrainConfig::default();
        config.height_map.noise.scale = -1.0;
        config.height_map.noise.octaves = 0;
        let settings = config.validated().unwrap();
        assert!(settings.height_map.noise.scale > 0.0);
        assert_eq!(settings.height_map.noise.octaves, 1);
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            collider_lod_index = 1
            viewer_move_threshold = 25.0

            [height_map]
            height_multiplier = 30.0

            [height_map.noise]
            seed = 42
            octaves = 4
            normalize_mode = "global"

            [mesh]
            verts_per_line = 65
            mesh_scale = 2.0

            [[detail_levels]]
            lod = 0
            visible_distance_threshold = 150.0

            [[detail_levels]]
            lod = 2
            visible_distance_threshold = 500.0
        "#;

        let config = TerrainConfig::from_toml_str(text).unwrap();
        assert_eq!(config.height_map.noise.seed, 42);
        assert_eq!(config.height_map.noise.normalize_mode, NormalizeMode::Global);
        // Unlisted fields fall back to defaults
        assert_eq!(config.height_map.noise.scale, 50.0);

        let settings = config.validated().unwrap();
        assert_eq!(settings.chunk_world_size(), 128.0);
        assert_eq!(settings.detail_levels.len(), 2);
        assert_eq!(settings.collider_lod().lod, 2);
        assert_eq!(settings.viewer_move_threshold, 25.0);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            TerrainConfig::from_toml_str("detail_levels = 7"),
            Err(TerrainError::Parse(_))
        ));
    }
}
