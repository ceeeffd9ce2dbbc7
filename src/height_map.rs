//! World-space height maps built from normalized noise.

use serde::Deserialize;

use crate::noise_field::{NoiseField, NoiseMap, NoiseSettings};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    /// World height of a normalized value of 1
    pub height_multiplier: f32,
    /// Fade each chunk toward 0 at its border before scaling
    pub use_falloff: bool,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 1.0,
            use_falloff: false,
        }
    }
}

impl HeightMapSettings {
    pub fn validate(&mut self) {
        self.noise.validate();
    }

    pub fn min_height(&self) -> f32 {
        0.0
    }

    /// Nominal top of the range. Global normalization may exceed it.
    pub fn max_height(&self) -> f32 {
        self.height_multiplier
    }
}

/// Heights for one chunk. Shared immutably between a chunk and its mesh builds.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    noise: NoiseMap,
    values: Vec<f32>,
    min_height: f32,
    max_height: f32,
}

impl HeightMap {
    pub fn from_noise(noise: NoiseMap, height_multiplier: f32) -> Self {
        Self::from_normalized(noise.values().to_vec(), noise, height_multiplier)
    }

    /// Subtract `falloff` cell by cell, clamping to `[0, 1]`, then scale.
    pub fn from_noise_with_falloff(noise: NoiseMap, falloff: &[f32], height_multiplier: f32) -> Self {
        let values = noise
            .values()
            .iter()
            .zip(falloff)
            .map(|(v, f)| (v - f).clamp(0.0, 1.0))
            .collect();
        Self::from_normalized(values, noise, height_multiplier)
    }

    fn from_normalized(normalized: Vec<f32>, noise: NoiseMap, height_multiplier: f32) -> Self {
        let values: Vec<f32> = normalized.iter().map(|v| v * height_multiplier).collect();
        let (min_height, max_height) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        Self {
            noise,
            values,
            min_height,
            max_height,
        }
    }

    pub fn width(&self) -> usize {
        self.noise.width()
    }

    pub fn height(&self) -> usize {
        self.noise.height()
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.noise.width() + x]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The normalized grid these heights were scaled from
    pub fn noise(&self) -> &NoiseMap {
        &self.noise
    }

    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    pub fn max_height(&self) -> f32 {
        self.max_height
    }
}

/// Generate the height map for one chunk. Runs on worker threads.
pub fn generate_height_map(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    sample_center: [f32; 2],
) -> HeightMap {
    let noise = NoiseField::new(settings.noise.clone()).generate(width, height, sample_center);
    if settings.use_falloff {
        let falloff = falloff_map(width, height);
        HeightMap::from_noise_with_falloff(noise, &falloff, settings.height_multiplier)
    } else {
        HeightMap::from_noise(noise, settings.height_multiplier)
    }
}

const FALLOFF_STEEPNESS: f32 = 3.0;
const FALLOFF_SHIFT: f32 = 2.2;

/// Border mask in `[0, 1]`: near 0 in the middle, rising to 1 at the edges.
pub fn falloff_map(width: usize, height: usize) -> Vec<f32> {
    let mut map = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let fx = x as f32 / width as f32 * 2.0 - 1.0;
            let fy = y as f32 / height as f32 * 2.0 - 1.0;
            map.push(falloff_curve(fx.abs().max(fy.abs())));
        }
    }
    map
}

fn falloff_curve(value: f32) -> f32 {
    let a = value.powf(FALLOFF_STEEPNESS);
    let b = (FALLOFF_SHIFT - FALLOFF_SHIFT * value).powf(FALLOFF_STEEPNESS);
    a / (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::NormalizeMode;

    #[test]
    fn test_height_multiplier_scales_values() {
        let settings = HeightMapSettings {
            noise: NoiseSettings {
                seed: 3,
                normalize_mode: NormalizeMode::Local,
                ..NoiseSettings::default()
            },
            height_multiplier: 20.0,
            ..HeightMapSettings::default()
        };
        let map = generate_height_map(11, 11, &settings, [0.0, 0.0]);

        for (h, n) in map.values().iter().zip(map.noise().values()) {
            assert_eq!(*h, n * 20.0);
        }
        assert_eq!(map.min_height(), 0.0);
        assert_eq!(map.max_height(), 20.0);
    }

    #[test]
    fn test_nominal_range() {
        let settings = HeightMapSettings {
            height_multiplier: 12.5,
            ..HeightMapSettings::default()
        };
        assert_eq!(settings.min_height(), 0.0);
        assert_eq!(settings.max_height(), 12.5);
    }

    #[test]
    fn test_dimensions_follow_request() {
        let map = generate_height_map(5, 7, &HeightMapSettings::default(), [10.0, 10.0]);
        assert_eq!(map.width(), 5);
        assert_eq!(map.height(), 7);
        assert_eq!(map.values().len(), 35);
        assert_eq!(map.get(4, 6), map.values()[34]);
    }

    #[test]
    fn test_falloff_map_shape() {
        let falloff = falloff_map(9, 9);
        let center = falloff[4 * 9 + 4];
        let corner = falloff[0];
        assert!(center < 0.01, "center {center}");
        assert!(corner > 0.99, "corner {corner}");
        assert!(falloff.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_falloff_lowers_border_heights() {
        let plain = HeightMapSettings {
            height_multiplier: 10.0,
            ..HeightMapSettings::default()
        };
        let faded = HeightMapSettings {
            use_falloff: true,
            ..plain.clone()
        };
        let a = generate_height_map(9, 9, &plain, [0.0, 0.0]);
        let b = generate_height_map(9, 9, &faded, [0.0, 0.0]);

        assert_eq!(b.get(0, 0), 0.0);
        for (faded, plain) in b.values().iter().zip(a.values()) {
            assert!(faded <= plain);
            assert!((0.0..=10.0).contains(faded));
        }
    }
}
