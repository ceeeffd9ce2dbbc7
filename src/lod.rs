use serde::Deserialize;

use crate::error::TerrainError;

/// Number of mesh LODs a mesh builder is expected to support (0 = full detail).
pub const NUM_SUPPORTED_LODS: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct LodInfo {
    pub lod: u8,
    pub visible_distance_threshold: f32,
}

impl LodInfo {
    pub fn new(lod: u8, visible_distance_threshold: f32) -> Self {
        Self {
            lod,
            visible_distance_threshold,
        }
    }

    pub fn sqr_visible_distance_threshold(&self) -> f32 {
        self.visible_distance_threshold * self.visible_distance_threshold
    }
}

/// Ordered, validated detail-level table. Index 0 is the closest band.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailLevels {
    levels: Vec<LodInfo>,
}

impl DetailLevels {
    pub fn new(levels: Vec<LodInfo>) -> Result<Self, TerrainError> {
        if levels.is_empty() {
            return Err(TerrainError::EmptyDetailLevels);
        }
        for (i, level) in levels.iter().enumerate() {
            if level.lod >= NUM_SUPPORTED_LODS {
                return Err(TerrainError::UnsupportedLod {
                    lod: level.lod,
                    max: NUM_SUPPORTED_LODS - 1,
                });
            }
            let threshold = level.visible_distance_threshold;
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(TerrainError::InvalidDistanceThreshold {
                    index: i,
                    threshold,
                });
            }
            if i > 0 && threshold <= levels[i - 1].visible_distance_threshold {
                return Err(TerrainError::DetailLevelsNotAscending { index: i });
            }
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LodInfo> {
        self.levels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LodInfo> {
        self.levels.iter()
    }

    /// Chunks farther than this from the viewer are hidden.
    pub fn max_view_distance(&self) -> f32 {
        self.levels
            .last()
            .map_or(0.0, |l| l.visible_distance_threshold)
    }

    /// Index of the first level whose threshold covers `distance`, else the coarsest level.
    pub fn lod_index_for_distance(&self, distance: f32) -> usize {
        let last = self.levels.len().saturating_sub(1);
        self.levels[..last]
            .iter()
            .position(|l| distance <= l.visible_distance_threshold)
            .unwrap_or(last)
    }
}

impl std::ops::Index<usize> for DetailLevels {
    type Output = LodInfo;

    fn index(&self, index: usize) -> &LodInfo {
        &self.levels[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> DetailLevels {
        DetailLevels::new(vec![
            LodInfo::new(0, 100.0),
            LodInfo::new(1, 200.0),
            LodInfo::new(3, 400.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_lod_index_for_distance() {
        let table = levels();
        assert_eq!(table.lod_index_for_distance(0.0), 0);
        assert_eq!(table.lod_index_for_distance(100.0), 0);
        assert_eq!(table.lod_index_for_distance(100.5), 1);
        assert_eq!(table.lod_index_for_distance(250.0), 2);
        assert_eq!(table.lod_index_for_distance(10_000.0), 2);
    }

    #[test]
    fn test_max_view_distance_is_last_threshold() {
        assert_eq!(levels().max_view_distance(), 400.0);
    }

    #[test]
    fn test_single_level_table() {
        let table = DetailLevels::new(vec![LodInfo::new(2, 50.0)]).unwrap();
        assert_eq!(table.lod_index_for_distance(0.0), 0);
        assert_eq!(table.lod_index_for_distance(80.0), 0);
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(
            DetailLevels::new(Vec::new()),
            Err(TerrainError::EmptyDetailLevels)
        );
    }

    #[test]
    fn test_unsorted_table_rejected() {
        let result = DetailLevels::new(vec![LodInfo::new(0, 200.0), LodInfo::new(1, 100.0)]);
        assert_eq!(
            result,
            Err(TerrainError::DetailLevelsNotAscending { index: 1 })
        );
    }

    #[test]
    fn test_unsupported_lod_rejected() {
        let result = DetailLevels::new(vec![LodInfo::new(NUM_SUPPORTED_LODS, 100.0)]);
        assert!(matches!(result, Err(TerrainError::UnsupportedLod { .. })));
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        for bad in [f32::NAN, f32::INFINITY, 0.0, -10.0] {
            let result = DetailLevels::new(vec![LodInfo::new(0, 50.0), LodInfo::new(1, bad)]);
            assert!(
                matches!(
                    result,
                    Err(TerrainError::InvalidDistanceThreshold { index: 1, .. })
                ),
                "threshold {bad} accepted"
            );
        }
        assert!(matches!(
            DetailLevels::new(vec![LodInfo::new(0, f32::NAN)]),
            Err(TerrainError::InvalidDistanceThreshold { index: 0, .. })
        ));
    }

    #[test]
    fn test_sqr_threshold() {
        assert_eq!(LodInfo::new(0, 5.0).sqr_visible_distance_threshold(), 25.0);
    }
}
