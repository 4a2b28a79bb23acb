// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A damped 2-D wave solver on a regular grid.

The surface is stored as three time layers.  Each discrete step computes the next layer from the
previous two with a second-order explicit finite-difference stencil, then rotates the layers.

```text
    next = k1·prev + k2·curr + k3·(north + south + east + west)
```

Real (variable) frame time is fed through a fixed-step accumulator, so the number of discrete steps
depends only on the total elapsed time, never on how that time was chunked across calls.

Samples on the outer boundary are never written by the stencil and keep their initial height forever.
*/

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::bindings::constants::WaveVertex;
use crate::waves::config::{ConfigError, HeightFieldConfig};

/// How far from the center (in cells) a disturbance reaches.  The weight reaches zero at this distance.
const DISTURB_RADIUS: f32 = 2.0;

/// Cells from the edge a disturbance center must keep, so its whole neighborhood is interior.
const DISTURB_MARGIN: usize = 2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DisturbError {
    #[error("disturbance at ({row}, {col}) is outside the interior of a {rows}x{cols} grid")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("disturbance magnitude {0} is not finite")]
    NonFiniteMagnitude(f32),
}

/**
The simulated water surface.

Create one with [HeightField::new], drive it with [HeightField::step], and read the derived
vertex data with [HeightField::vertex] or [HeightField::write_vertices].
*/
#[derive(Debug, Clone)]
pub struct HeightField {
    config: HeightFieldConfig,
    k1: f32,
    k2: f32,
    k3: f32,
    previous: Vec<f32>,
    current: Vec<f32>,
    next: Vec<f32>,
    normals: Vec<Vec3>,
    tangents: Vec<Vec3>,
    accumulated_time: f32,
    steps_taken: u64,
}

impl HeightField {
    /**
    Creates a flat surface.

    Fails if the configuration is invalid or would make the integrator diverge.
    */
    pub fn new(config: HeightFieldConfig) -> Result<Self, ConfigError> {
        let k = config.coefficients()?;
        let count = config.vertex_count();
        logwise::info_sync!(
            "HeightField {rows}x{cols}, courant {courant}",
            rows = logwise::privacy::LogIt(&config.rows),
            cols = logwise::privacy::LogIt(&config.cols),
            courant = logwise::privacy::LogIt(&config.courant())
        );
        Ok(HeightField {
            config,
            k1: k.k1,
            k2: k.k2,
            k3: k.k3,
            previous: vec![0.0; count],
            current: vec![0.0; count],
            next: vec![0.0; count],
            normals: vec![Vec3::Y; count],
            tangents: vec![Vec3::X; count],
            accumulated_time: 0.0,
            steps_taken: 0,
        })
    }

    pub fn config(&self) -> &HeightFieldConfig {
        &self.config
    }
    /// Samples along z.
    pub fn rows(&self) -> usize {
        self.config.rows
    }
    /// Samples along x.
    pub fn cols(&self) -> usize {
        self.config.cols
    }
    /// `rows * cols`; one vertex per sample.
    pub fn vertex_count(&self) -> usize {
        self.config.vertex_count()
    }
    /// Two triangles per grid cell.
    pub fn triangle_count(&self) -> usize {
        (self.config.rows - 1) * (self.config.cols - 1) * 2
    }

    /// Extent of the grid along x, from the first to the last column.
    pub fn width(&self) -> f32 {
        (self.config.cols - 1) as f32 * self.config.spacing
    }

    /// Extent of the grid along z, from the first to the last row.
    pub fn depth(&self) -> f32 {
        (self.config.rows - 1) as f32 * self.config.spacing
    }

    /// Total number of discrete steps executed since construction.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Real time fed to [Self::step] that has not yet been consumed by a discrete step.
    pub fn pending_time(&self) -> f32 {
        self.accumulated_time
    }

    /**
    Advances the simulation by `real_delta_time` seconds.

    Runs as many fixed-size steps as the accumulated time allows and keeps the remainder for the
    next call.  Returns the number of discrete steps executed.
    */
    pub fn step(&mut self, real_delta_time: f32) -> usize {
        if !real_delta_time.is_finite() || real_delta_time < 0.0 {
            logwise::warn_sync!(
                "HeightField::step ignoring delta {delta}",
                delta = logwise::privacy::LogIt(&real_delta_time)
            );
            return 0;
        }
        self.accumulated_time += real_delta_time;
        let mut steps = 0;
        while self.accumulated_time >= self.config.dt {
            self.simulate_once();
            self.accumulated_time -= self.config.dt;
            steps += 1;
        }
        if steps > 0 {
            self.update_normals();
        }
        steps
    }

    fn simulate_once(&mut self) {
        let rows = self.config.rows;
        let cols = self.config.cols;
        let (k1, k2, k3) = (self.k1, self.k2, self.k3);
        for i in 1..rows - 1 {
            for j in 1..cols - 1 {
                let idx = i * cols + j;
                let c = &self.current;
                self.next[idx] = k1 * self.previous[idx]
                    + k2 * c[idx]
                    + k3 * (c[idx + cols] + c[idx - cols] + c[idx + 1] + c[idx - 1]);
            }
        }
        //oldest layer becomes the scratch layer for the following step
        std::mem::swap(&mut self.previous, &mut self.current);
        std::mem::swap(&mut self.current, &mut self.next);
        self.steps_taken += 1;
    }

    fn update_normals(&mut self) {
        let rows = self.config.rows;
        let cols = self.config.cols;
        let two_h = 2.0 * self.config.spacing;
        for i in 1..rows - 1 {
            for j in 1..cols - 1 {
                let idx = i * cols + j;
                let l = self.current[idx - 1];
                let r = self.current[idx + 1];
                let t = self.current[idx - cols];
                let b = self.current[idx + cols];
                //rows run toward -z, so the row below is the smaller z
                self.normals[idx] = Vec3::new(l - r, two_h, b - t).normalize();
                self.tangents[idx] = Vec3::new(two_h, r - l, 0.0).normalize();
            }
        }
    }

    /**
    Adds a raised-cosine bump of height `magnitude` centered at `(row, col)`.

    The bump covers the 3×3 neighborhood of the center and is applied to both the current and the
    previous layer, so the surface starts out displaced but at rest.  The center must be at least two
    cells from every edge.  On error nothing is modified.
    */
    pub fn disturb(&mut self, row: usize, col: usize, magnitude: f32) -> Result<(), DisturbError> {
        let rows = self.config.rows;
        let cols = self.config.cols;
        let in_range = |v: usize, n: usize| v >= DISTURB_MARGIN && v + DISTURB_MARGIN < n;
        if !in_range(row, rows) || !in_range(col, cols) {
            return Err(DisturbError::OutOfRange {
                row,
                col,
                rows,
                cols,
            });
        }
        if !magnitude.is_finite() {
            return Err(DisturbError::NonFiniteMagnitude(magnitude));
        }
        for i in row - 1..=row + 1 {
            for j in col - 1..=col + 1 {
                let di = i as f32 - row as f32;
                let dj = j as f32 - col as f32;
                let d = (di * di + dj * dj).sqrt();
                let weight = 0.5 * (1.0 + (PI * d / DISTURB_RADIUS).cos());
                let idx = i * cols + j;
                self.current[idx] += magnitude * weight;
                self.previous[idx] += magnitude * weight;
            }
        }
        Ok(())
    }

    /// Current height of a sample.
    pub fn height(&self, row: usize, col: usize) -> f32 {
        self.current[row * self.config.cols + col]
    }

    /// Current heights in row-major order.
    pub fn heights(&self) -> &[f32] {
        &self.current
    }

    /// Largest absolute current height over the grid.
    pub fn max_abs_height(&self) -> f32 {
        self.current.iter().fold(0.0_f32, |m, h| m.max(h.abs()))
    }

    /// World-space position of sample `i` (row-major), centered on the origin.
    pub fn position(&self, i: usize) -> Vec3 {
        let cols = self.config.cols;
        let (row, col) = (i / cols, i % cols);
        let h = self.config.spacing;
        Vec3::new(
            -0.5 * self.width() + col as f32 * h,
            self.current[i],
            0.5 * self.depth() - row as f32 * h,
        )
    }

    /// Unit normal of sample `i`, as of the most recent step.
    pub fn normal(&self, i: usize) -> Vec3 {
        self.normals[i]
    }

    /// Unit tangent (along +x) of sample `i`, as of the most recent step.
    pub fn tangent(&self, i: usize) -> Vec3 {
        self.tangents[i]
    }

    /// Maps the grid extent onto `[0,1]²`, u along +x and v along -z.
    pub fn tex_coord(&self, i: usize) -> Vec2 {
        let p = self.position(i);
        Vec2::new(0.5 + p.x / self.width(), 0.5 - p.z / self.depth())
    }

    /// Position, normal, tangent and texture coordinate of sample `i`, packed for upload.
    pub fn vertex(&self, i: usize) -> WaveVertex {
        WaveVertex {
            position: self.position(i).to_array(),
            normal: self.normal(i).to_array(),
            tex_coord: self.tex_coord(i).to_array(),
        }
    }

    /**
    Writes every sample into `out`, resizing it to [Self::vertex_count].
    */
    pub fn write_vertices(&self, out: &mut Vec<WaveVertex>) {
        out.resize(self.vertex_count(), WaveVertex::default());
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.vertex(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> HeightField {
        HeightField::new(HeightFieldConfig {
            rows: 9,
            cols: 7,
            ..HeightFieldConfig::default()
        })
        .unwrap()
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn flat_surface_stays_flat() {
        let mut field = small();
        assert_eq!(field.step(1.0), 33);
        assert_eq!(field.max_abs_height(), 0.0);
        assert_eq!(field.normal(4 * 7 + 3), Vec3::Y);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn disturb_range() {
        let mut field = small();
        assert!(field.disturb(2, 2, 1.0).is_ok());
        assert!(field.disturb(6, 4, 1.0).is_ok());
        assert_eq!(
            field.disturb(1, 3, 1.0),
            Err(DisturbError::OutOfRange {
                row: 1,
                col: 3,
                rows: 9,
                cols: 7
            })
        );
        assert!(field.disturb(7, 3, 1.0).is_err());
        assert!(field.disturb(3, 5, 1.0).is_err());
        assert!(field.disturb(100, 3, 1.0).is_err());
        assert!(matches!(
            field.disturb(4, 3, f32::INFINITY),
            Err(DisturbError::NonFiniteMagnitude(_))
        ));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn disturb_shape() {
        let mut field = small();
        field.disturb(4, 3, 2.0).unwrap();
        assert_eq!(field.height(4, 3), 2.0);
        assert!((field.height(3, 3) - 1.0).abs() < 1e-6);
        assert!((field.height(4, 4) - 1.0).abs() < 1e-6);
        let diagonal = field.height(5, 4);
        assert!(diagonal > 0.0 && diagonal < 1.0);
        assert_eq!(field.height(2, 3), 0.0);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn disturbance_not_visible_in_normals_until_step() {
        let mut field = small();
        field.disturb(4, 3, 1.0).unwrap();
        assert_eq!(field.normal(4 * 7 + 4), Vec3::Y);
        field.step(field.config().dt);
        assert_ne!(field.normal(4 * 7 + 4), Vec3::Y);
        assert!((field.normal(4 * 7 + 4).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn negative_delta_is_ignored() {
        let mut field = small();
        assert_eq!(field.step(-1.0), 0);
        assert_eq!(field.step(f32::NAN), 0);
        assert_eq!(field.pending_time(), 0.0);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn tex_coords_span_unit_square() {
        let field = small();
        let last = field.vertex_count() - 1;
        assert_eq!(field.tex_coord(0), Vec2::new(0.0, 0.0));
        assert_eq!(field.tex_coord(last), Vec2::new(1.0, 1.0));
        assert_eq!(field.position(0), Vec3::new(-3.0, 0.0, 4.0));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn write_vertices_matches_samples() {
        let mut field = small();
        field.disturb(4, 3, 1.0).unwrap();
        field.step(0.1);
        let mut out = Vec::new();
        field.write_vertices(&mut out);
        assert_eq!(out.len(), 63);
        assert_eq!(out[31], field.vertex(31));
    }
}
