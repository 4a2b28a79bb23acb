// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Grid parameters for [super::HeightField].
//!
//! The parameters are plain values supplied once at construction.  They are validated
//! synchronously; a [HeightFieldConfig] that would make the explicit integrator diverge is
//! rejected here rather than corrected at runtime.

/// Largest Courant number `(c·dt/h)²` the 2-D explicit scheme tolerates.
pub const MAX_COURANT: f32 = 0.5;

/// Smallest grid that still has interior samples.
pub const MIN_DIMENSION: usize = 3;

/**
Configuration for a height field.

The [Default] implementation is the 128×128 water surface used by the demo scene.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightFieldConfig {
    /// Number of sample rows (z direction).
    pub rows: usize,
    /// Number of sample columns (x direction).
    pub cols: usize,
    /// Distance between adjacent samples, in world units.
    pub spacing: f32,
    /// Fixed simulation step, in seconds.
    pub dt: f32,
    /// Wave propagation speed, in world units per second.
    pub wave_speed: f32,
    /// Damping factor; zero means no energy loss.
    pub damping: f32,
}

impl Default for HeightFieldConfig {
    fn default() -> Self {
        HeightFieldConfig {
            rows: 128,
            cols: 128,
            spacing: 1.0,
            dt: 0.03,
            wave_speed: 4.0,
            damping: 0.2,
        }
    }
}

/// Stencil weights derived from a validated configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coefficients {
    /// Weight of the sample's previous height.
    pub k1: f32,
    /// Weight of the sample's current height.
    pub k2: f32,
    /// Weight of each orthogonal neighbor's current height.
    pub k3: f32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("grid must be at least 3x3, got {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("{parameter} must be finite and positive, got {value}")]
    NonPositive { parameter: &'static str, value: f32 },
    #[error("damping must be finite and non-negative, got {0}")]
    NegativeDamping(f32),
    #[error("courant number {courant} exceeds the stability bound 0.5; reduce dt or wave speed, or increase spacing")]
    Unstable { courant: f32 },
}

impl HeightFieldConfig {
    /// Number of samples in the grid.
    pub fn vertex_count(&self) -> usize {
        self.rows * self.cols
    }

    /**
    Returns `(c·dt/h)²`, the quantity the stability bound is expressed in.

    Meaningless for configurations that fail [Self::validate] on other grounds.
    */
    pub fn courant(&self) -> f32 {
        let r = self.wave_speed * self.dt / self.spacing;
        r * r
    }

    /// Checks the configuration without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coefficients().map(|_| ())
    }

    pub(crate) fn coefficients(&self) -> Result<Coefficients, ConfigError> {
        if self.rows < MIN_DIMENSION || self.cols < MIN_DIMENSION {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        for (parameter, value) in [
            ("spacing", self.spacing),
            ("dt", self.dt),
            ("wave_speed", self.wave_speed),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { parameter, value });
            }
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(ConfigError::NegativeDamping(self.damping));
        }
        let e = self.courant();
        if e > MAX_COURANT {
            return Err(ConfigError::Unstable { courant: e });
        }
        let d = self.damping * self.dt + 2.0;
        Ok(Coefficients {
            k1: (self.damping * self.dt - 2.0) / d,
            k2: (4.0 - 8.0 * e) / d,
            k3: (2.0 * e) / d,
        })
    }
}
