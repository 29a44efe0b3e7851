//! Small character grids for the visual tasks.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Row-major grid of single-character cells.
pub type Grid = Vec<Vec<char>>;

/// A whole-grid transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Reverse every row.
    MirrorHorizontal,
    /// Reverse the row order.
    FlipVertical,
    /// Swap rows and columns.
    Transpose,
    /// Rotate a quarter turn clockwise.
    RotateClockwise,
    /// Swap `0` and `1` cells.
    Invert,
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::MirrorHorizontal => "mirror_horizontal",
            Transform::FlipVertical => "flip_vertical",
            Transform::Transpose => "transpose",
            Transform::RotateClockwise => "rotate_clockwise",
            Transform::Invert => "invert",
        }
    }

    pub fn apply(&self, grid: &Grid) -> Grid {
        match self {
            Transform::MirrorHorizontal => grid
                .iter()
                .map(|row| row.iter().rev().copied().collect())
                .collect(),
            Transform::FlipVertical => grid.iter().rev().cloned().collect(),
            Transform::Transpose => {
                let cols = grid.first().map_or(0, Vec::len);
                (0..cols)
                    .map(|c| grid.iter().map(|row| row[c]).collect())
                    .collect()
            }
            Transform::RotateClockwise => {
                let cols = grid.first().map_or(0, Vec::len);
                (0..cols)
                    .map(|c| grid.iter().rev().map(|row| row[c]).collect())
                    .collect()
            }
            Transform::Invert => grid
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&cell| match cell {
                            '0' => '1',
                            '1' => '0',
                            other => other,
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Random square grid of `0`/`1` cells that `transform` visibly changes.
///
/// Gives up after a few attempts and returns the last candidate.
pub fn binary_grid(rng: &mut ChaCha8Rng, size: usize, transform: Transform) -> Grid {
    let mut grid = random_binary(rng, size);
    for _ in 0..16 {
        if transform.apply(&grid) != grid {
            break;
        }
        grid = random_binary(rng, size);
    }
    grid
}

fn random_binary(rng: &mut ChaCha8Rng, size: usize) -> Grid {
    (0..size)
        .map(|_| {
            (0..size)
                .map(|_| if rng.random_bool(0.5) { '1' } else { '0' })
                .collect()
        })
        .collect()
}

/// One row per line.
pub fn render(grid: &Grid) -> String {
    grid.iter()
        .map(|row| row.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows joined with `/`, the single-line answer format.
pub fn render_inline(grid: &Grid) -> String {
    grid.iter()
        .map(|row| row.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}
