//! # Motion vector stream densification
//!
//! `.mvec` streams store, per frame, a `u32` LE count of motion vectors followed by that many
//! groups of 4 `f32` LE values: position x, position y, motion x, motion y. Positions are in the
//! 0-1 range.
//!
//! Each frame is turned into a grid of integer samples by averaging the magnitudes of all
//! vectors landing in a cell.

use dmask::prelude::v1::*;
use nalgebra as na;
use std::io::{ErrorKind, Read};

/// Pair containing coordinates and motion at them.
pub type MotionEntry = (na::Point2<f32>, na::Vector2<f32>);

/// Target grid of `.mvec` densification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MvecGrid {
    pub rows: usize,
    pub cols: usize,
    /// Multiplier applied to mean motion magnitudes before rounding them to integers.
    pub scale: f32,
}

impl MvecGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            scale: 1000.0,
        }
    }

    /// Cell a position falls into, as `(row, col)`.
    fn cell(&self, pos: na::Point2<f32>) -> (usize, usize) {
        let pos = na::clamp(pos, na::Point2::new(0f32, 0f32), na::Point2::new(1f32, 1f32));
        (
            (pos.y * (self.rows - 1) as f32).round() as usize,
            (pos.x * (self.cols - 1) as f32).round() as usize,
        )
    }

    /// Densify a single frame of motion vectors.
    ///
    /// Cells without any vectors are 0.
    pub fn densify(&self, motion: &[MotionEntry], out: &mut [i64]) {
        let mut sums = vec![0f32; self.rows * self.cols];
        let mut counts = vec![0usize; self.rows * self.cols];

        for &(pos, motion) in motion {
            let (row, col) = self.cell(pos);
            let idx = row * self.cols + col;
            sums[idx] += motion.magnitude();
            counts[idx] += 1;
        }

        for ((o, s), c) in out.iter_mut().zip(sums).zip(counts) {
            *o = match c {
                0 => 0,
                c => (s / c as f32 * self.scale).round() as i64,
            };
        }
    }
}

/// Read the next frame of a `.mvec` stream.
///
/// Returns `Ok(false)` on a clean end of stream.
pub fn read_frame(reader: &mut impl Read, field: &mut Vec<MotionEntry>) -> Result<bool> {
    let mut vecs = [0u8; std::mem::size_of::<u32>()];

    match reader.read_exact(&mut vecs) {
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
        r => r?,
    }

    for _ in 0..u32::from_le_bytes(vecs) {
        let mut data = [[0u8; std::mem::size_of::<f32>()]; 4];
        for b in &mut data {
            reader.read_exact(&mut *b)?;
        }
        field.push((
            na::Point2::new(f32::from_le_bytes(data[0]), f32::from_le_bytes(data[1])),
            na::Vector2::new(f32::from_le_bytes(data[2]), f32::from_le_bytes(data[3])),
        ))
    }

    Ok(true)
}

/// Densify a whole `.mvec` stream into a volume.
///
/// # Arguments
///
/// * `reader` - stream to read.
/// * `grid` - target grid of every frame.
/// * `fps` - frame rate of the stream.
pub fn densify_mvec(reader: &mut impl Read, grid: MvecGrid, fps: f64) -> Result<Volume> {
    if grid.rows == 0 || grid.cols == 0 {
        return Err(anyhow!("Grid must not be empty"));
    }

    let mut volume = Volume::empty(grid.rows, grid.cols, fps)?;
    let mut motion_vectors = vec![];
    let mut frame = vec![0; grid.rows * grid.cols];

    while read_frame(reader, &mut motion_vectors)? {
        grid.densify(&motion_vectors, &mut frame);
        volume.push_frame(&frame)?;
        motion_vectors.clear();
    }

    log::debug!("Densified {} frames", volume.dims().frames);

    Ok(volume)
}
