//! Grid storage - cells, the global grid, and partition slices
//!
//! The coordinator owns one authoritative `Grid` between generations. Workers
//! own a `Vec<Cell>` slice of it (their partition) that is overwritten by every
//! scatter and read back by every gather. Both use the same row-major layout.

use serde::{Deserialize, Serialize};

/// A single binary cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    #[default]
    Dead,
    Alive,
}

impl Cell {
    pub fn is_alive(self) -> bool {
        self == Cell::Alive
    }

    /// Render as the character used by the text output
    pub fn glyph(self) -> char {
        match self {
            Cell::Alive => '#',
            Cell::Dead => '.',
        }
    }
}

impl From<bool> for Cell {
    fn from(alive: bool) -> Self {
        if alive { Cell::Alive } else { Cell::Dead }
    }
}

/// Row-major matrix of cells
///
/// `height × width` with row `y` occupying `cells[y*width .. (y+1)*width]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an all-dead grid
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![Cell::Dead; height * width],
        }
    }

    /// Create a square all-dead grid
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Flat row-major view of all cells
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// Set a cell, ignoring out-of-bounds coordinates
    ///
    /// External edits arrive in grid coordinates from an untrusted collaborator,
    /// so this clamps rather than panics.
    pub fn set_cell(&mut self, x: usize, y: usize, value: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = value;
        }
    }

    /// Number of live cells
    pub fn live_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_alive()).count()
    }

    /// Borrow the row range `[row_offset, row_offset + row_count)` as a flat slice
    pub fn rows(&self, row_offset: usize, row_count: usize) -> &[Cell] {
        &self.cells[row_offset * self.width..(row_offset + row_count) * self.width]
    }

    /// Overwrite the row range starting at `row_offset` with `cells`
    ///
    /// `cells.len()` must be a multiple of the width and fit within the grid;
    /// callers validate lengths before writing (a wrong-sized partition is a
    /// protocol violation, not a truncation).
    pub fn write_rows(&mut self, row_offset: usize, cells: &[Cell]) {
        let start = row_offset * self.width;
        self.cells[start..start + cells.len()].copy_from_slice(cells);
    }

    /// Multi-line text rendering, one row per line
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.cells.chunks(self.width) {
            for cell in row {
                out.push(cell.glyph());
            }
            out.push('\n');
        }
        out
    }
}
