// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The simulated water surface.

[HeightField] solves the damped 2-D wave equation on a regular grid.  It owns its samples and
derives every per-vertex attribute the renderer needs; nothing outside this module mutates them. */

pub mod config;
pub mod height_field;
pub mod index_algorithms;

pub use config::{ConfigError, HeightFieldConfig};
pub use height_field::{DisturbError, HeightField};
pub use index_algorithms::{GridIndices, IndexError};
