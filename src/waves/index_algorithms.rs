// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Index lists for drawing the wave grid as a triangle mesh.

The vertices of a [HeightField](crate::waves::height_field::HeightField) never move in the XZ
plane, so the mesh connectivity is computed once and uploaded as a static index buffer.  Only the
vertex buffer changes from frame to frame.

# Example

```
use waves_and_frames::waves::index_algorithms::GridIndices;

// 3 rows of 3 vertices
let grid = GridIndices::new(3, 3).unwrap();

// 2x2 cells, 2 triangles each
assert_eq!(grid.num_triangles(), 8);
assert_eq!(grid.num_indices(), 24);

assert_eq!(grid.index_for(0), 0);
assert_eq!(grid.index_for(1), 3);
assert_eq!(grid.index_for(2), 1);
```
*/

const VERTEX_PER_TRIANGLE: usize = 3;
const TRIANGLES_PER_CELL: usize = 2;
const VERTEX_PER_CELL: usize = VERTEX_PER_TRIANGLE * TRIANGLES_PER_CELL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IndexError {
    #[error("a {rows}x{cols} grid has no cells")]
    Degenerate { rows: usize, cols: usize },
    #[error("{vertices} vertices cannot be addressed with 16-bit indices")]
    TooManyVertices { vertices: usize },
}

/**
Triangle-list index generator for a row-major `rows × cols` grid.

Row 0 is the far edge of the surface and column 0 its left edge, matching the vertex order of
[HeightField::write_vertices](crate::waves::height_field::HeightField::write_vertices).
Each cell is split along the diagonal from its bottom-left to its top-right corner:

```text
  top_left ─────── top_right
      │  1        ╱ │
      │         ╱   │
      │       ╱     │
      │     ╱       │
      │   ╱      2  │
  bottom_left ── bottom_right
```

- Triangle 1: (top_left, bottom_left, top_right)
- Triangle 2: (top_right, bottom_left, bottom_right)
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndices {
    rows: usize,
    cols: usize,
}

impl GridIndices {
    /// At least a 2×2 grid is needed to form a triangle.
    pub fn new(rows: usize, cols: usize) -> Result<Self, IndexError> {
        if rows < 2 || cols < 2 {
            return Err(IndexError::Degenerate { rows, cols });
        }
        Ok(GridIndices { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn num_vertices(&self) -> usize {
        self.rows * self.cols
    }

    pub fn num_triangles(&self) -> usize {
        (self.rows - 1) * (self.cols - 1) * TRIANGLES_PER_CELL
    }

    pub fn num_indices(&self) -> usize {
        self.num_triangles() * VERTEX_PER_TRIANGLE
    }

    /**
    Maps a position in the index buffer to the vertex it names.

    # Panics
    If `buffer_pos >= self.num_indices()`.
    */
    pub fn index_for(&self, buffer_pos: usize) -> usize {
        assert!(buffer_pos < self.num_indices(), "Index out of bounds");
        let cell_vertex = buffer_pos % VERTEX_PER_CELL;
        let cell = buffer_pos / VERTEX_PER_CELL;
        let col = cell % (self.cols - 1);
        let row = cell / (self.cols - 1);
        let (r, c) = match cell_vertex {
            0 => (row, col),
            1 | 4 => (row + 1, col),
            2 | 3 => (row, col + 1),
            5 => (row + 1, col + 1),
            _ => unreachable!(),
        };
        r * self.cols + c
    }

    /// 32-bit index list for the whole grid.
    pub fn to_u32(&self) -> Vec<u32> {
        (0..self.num_indices())
            .map(|i| self.index_for(i) as u32)
            .collect()
    }

    /**
    16-bit index list for the whole grid.

    Fails when some vertex index would not fit; `0xFFFF` is excluded because backends reserve it
    for primitive restart.
    */
    pub fn to_u16(&self) -> Result<Vec<u16>, IndexError> {
        if self.num_vertices() > u16::MAX as usize {
            return Err(IndexError::TooManyVertices {
                vertices: self.num_vertices(),
            });
        }
        Ok((0..self.num_indices())
            .map(|i| self.index_for(i) as u16)
            .collect())
    }
}
