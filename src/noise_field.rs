//! Fractal noise height grids.
//!
//! Octaves of 2D Perlin noise are summed around the grid center. The seed
//! only drives the per-octave offsets, so the same seed always samples the
//! same infinite field and neighbouring chunks line up when their sample
//! centers are one chunk width apart.

use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// Smallest usable noise scale; smaller or non-positive scales are clamped to this.
pub const MIN_NOISE_SCALE: f32 = 0.01;
/// Per-octave offsets are drawn from `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)`.
const OCTAVE_OFFSET_RANGE: i32 = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Stretch each grid to its own observed range. Full contrast, visible seams.
    #[default]
    Local,
    /// Divide by the estimated maximum amplitude. Seamless, clamped below only.
    Global,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: i32,
    pub scale: f32,
    pub octaves: u32,
    /// Amplitude multiplier per octave, in `[0, 1]`
    pub persistence: f32,
    /// Frequency multiplier per octave, at least 1
    pub lacunarity: f32,
    pub offset: [f32; 2],
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
            normalize_mode: NormalizeMode::Local,
        }
    }
}

impl NoiseSettings {
    /// Clamp every parameter into its usable range. Never fails.
    pub fn validate(&mut self) {
        if self.scale.is_nan() || self.scale < MIN_NOISE_SCALE {
            self.scale = MIN_NOISE_SCALE;
        }
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
    }

    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    /// Sum of all octave amplitudes, the largest magnitude the octave sum can reach.
    pub fn max_possible_height(&self) -> f32 {
        let mut amplitude = 1.0;
        let mut total = 0.0;
        for _ in 0..self.octaves {
            total += amplitude;
            amplitude *= self.persistence;
        }
        total
    }
}

/// Un-normalized octave sum for one grid.
#[derive(Clone, Debug)]
pub struct RawNoise {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub octave_offsets: Vec<[f64; 2]>,
    pub min_value: f32,
    pub max_value: f32,
}

/// Normalized height grid. Read-only once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
    octave_offsets: Vec<[f64; 2]>,
    min_value: f32,
    max_value: f32,
}

impl NoiseMap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Row-major values, `y * width + x`
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn octave_offsets(&self) -> &[[f64; 2]] {
        &self.octave_offsets
    }

    /// Smallest raw (pre-normalization) value seen while filling the grid
    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    /// Largest raw (pre-normalization) value seen while filling the grid
    pub fn max_value(&self) -> f32 {
        self.max_value
    }
}

/// Multi-octave noise generator. Cheap to clone and safe to share across workers.
#[derive(Clone, Debug)]
pub struct NoiseField {
    settings: NoiseSettings,
    perlin: Perlin,
}

impl NoiseField {
    pub fn new(settings: NoiseSettings) -> Self {
        Self {
            settings: settings.validated(),
            perlin: Perlin::new(Perlin::DEFAULT_SEED),
        }
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Single-octave noise primitive in roughly `[-1, 1]`.
    pub fn primitive(&self, x: f64, y: f64) -> f32 {
        self.perlin.get([x, y]) as f32
    }

    /// Per-octave sampling offsets for a grid centered at `sample_center`.
    pub fn octave_offsets(&self, sample_center: [f32; 2]) -> Vec<[f64; 2]> {
        let s = &self.settings;
        let mut rng = ChaCha8Rng::seed_from_u64(s.seed as i64 as u64);
        (0..s.octaves)
            .map(|_| {
                let rx = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
                let ry = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
                [
                    rx + s.offset[0] as f64 + sample_center[0] as f64,
                    ry - s.offset[1] as f64 - sample_center[1] as f64,
                ]
            })
            .collect()
    }

    /// Fill a grid with the raw octave sum, tracking its min and max.
    pub fn generate_raw(&self, width: usize, height: usize, sample_center: [f32; 2]) -> RawNoise {
        let s = &self.settings;
        let octave_offsets = self.octave_offsets(sample_center);
        let scale = s.scale as f64;
        let half_width = width as f64 / 2.0;
        let half_height = height as f64 / 2.0;

        let mut values = Vec::with_capacity(width * height);
        let mut min_value = f32::MAX;
        let mut max_value = f32::MIN;

        for y in 0..height {
            for x in 0..width {
                let mut amplitude = 1.0f32;
                let mut frequency = 1.0f64;
                let mut noise_height = 0.0f32;

                for offset in &octave_offsets {
                    let sample_x = (x as f64 - half_width + offset[0]) / scale * frequency;
                    let sample_y = (y as f64 - half_height + offset[1]) / scale * frequency;
                    noise_height += self.primitive(sample_x, sample_y) * amplitude;

                    amplitude *= s.persistence;
                    frequency *= s.lacunarity as f64;
                }

                min_value = min_value.min(noise_height);
                max_value = max_value.max(noise_height);
                values.push(noise_height);
            }
        }

        RawNoise {
            width,
            height,
            values,
            octave_offsets,
            min_value,
            max_value,
        }
    }

    /// Generate a normalized grid of `width * height` samples around `sample_center`.
    pub fn generate(&self, width: usize, height: usize, sample_center: [f32; 2]) -> NoiseMap {
        self.normalize(self.generate_raw(width, height, sample_center))
    }

    pub fn normalize(&self, raw: RawNoise) -> NoiseMap {
        let RawNoise {
            width,
            height,
            mut values,
            octave_offsets,
            min_value,
            max_value,
        } = raw;

        match self.settings.normalize_mode {
            NormalizeMode::Local => {
                for v in values.iter_mut() {
                    *v = inverse_lerp(min_value, max_value, *v);
                }
            }
            NormalizeMode::Global => {
                // Lower bound only; values above 1 are kept.
                let max_possible = self.settings.max_possible_height();
                for v in values.iter_mut() {
                    *v = ((*v + 1.0) / max_possible).max(0.0);
                }
            }
        }

        NoiseMap {
            width,
            height,
            values,
            octave_offsets,
            min_value,
            max_value,
        }
    }
}

fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if a == b {
        return 0.0;
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}
