//! # Per-pixel volume analysis
//!
//! Secondary masks and summaries complementing the derivative mask: threshold arrival times,
//! typical intensity curves, forward difference averages, value histograms and per-row means.

use crate::deriv::forward_diff;
use crate::error::{MaskError, MaskResult};
use crate::volume::{Dims, VolumeView};
use rayon::prelude::*;

fn check_fps(fps: f64) -> MaskResult<()> {
    if !fps.is_finite() || fps <= 0.0 {
        Err(MaskError::invalid_argument(format!(
            "fps must be positive and finite, got {fps}"
        )))
    } else {
        Ok(())
    }
}

/// `n` evenly spaced values over `[start, end]`, both ends included.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut out = (0..n).map(|i| start + step * i as f64).collect::<Vec<_>>();
            out[n - 1] = end;
            out
        }
    }
}

/// Compute time of arrival of every cell at a threshold.
///
/// Each cell of the resulting row-major mask holds `k / fps`, where `k` is the first frame at
/// which the cell's sample reaches `thresh`. Cells that never reach it remain 0. A cell that is
/// already over the threshold on frame 0 also records 0, and may be overwritten by a later frame
/// that still exceeds the threshold.
///
/// # Arguments
///
/// * `volume` - input volume.
/// * `thresh` - sample value to reach.
/// * `fps` - frame rate of the volume.
///
/// # Errors
///
/// Fails if the volume is empty or if no cell ever reached the threshold past frame 0.
pub fn danger_matrix(volume: VolumeView, thresh: f64, fps: f64) -> MaskResult<Vec<f64>> {
    check_fps(fps)?;

    let Dims { frames, .. } = volume.dims();
    let frame_len = volume.dims().frame_len();

    if frames == 0 || frame_len == 0 {
        return Err(MaskError::Empty { what: "volume" });
    }

    let mut mask = vec![0f64; frame_len];

    mask.par_iter_mut().enumerate().for_each(|(idx, cell)| {
        for (k, frame) in volume.frames().enumerate() {
            if frame[idx] as f64 >= thresh && *cell == 0.0 {
                *cell = k as f64 / fps;
            }
        }
    });

    if mask.iter().all(|&v| v == 0.0) {
        Err(MaskError::NotFilled)
    } else {
        Ok(mask)
    }
}

/// Per-frame intensity curves of typical and extreme mask cells.
///
/// The first curve averages, on every frame, the samples of cells holding the most common mask
/// value (all values sharing the highest count are included). The second averages the cells
/// holding the largest mask value. Each mean is clipped to at most `thresh`.
///
/// # Arguments
///
/// * `volume` - input volume.
/// * `mask` - row-major mask of the volume, such as one made by `danger_matrix`.
/// * `thresh` - upper bound of the curves.
pub fn typical_distribution(
    volume: VolumeView,
    mask: &[f64],
    thresh: f64,
) -> MaskResult<(Vec<f64>, Vec<f64>)> {
    let Dims { frames, .. } = volume.dims();
    let frame_len = volume.dims().frame_len();

    if frames == 0 || frame_len == 0 {
        return Err(MaskError::Empty { what: "volume" });
    }

    if mask.len() < frame_len {
        return Err(MaskError::buffer_too_small("mask", frame_len, mask.len()));
    }

    // Folds -0.0 into 0.0 so both count as one value.
    let mask = mask[..frame_len].iter().map(|&v| v + 0.0).collect::<Vec<_>>();

    let mut sorted = mask.clone();
    sorted.sort_by(f64::total_cmp);

    let mut runs: Vec<(f64, usize)> = vec![];
    for &v in &sorted {
        match runs.last_mut() {
            Some((last, count)) if last.total_cmp(&v).is_eq() => *count += 1,
            _ => runs.push((v, 1)),
        }
    }

    let top_count = runs.iter().map(|&(_, c)| c).max().unwrap_or(0);
    let common = runs
        .iter()
        .filter(|&&(_, c)| c == top_count)
        .map(|&(v, _)| v)
        .collect::<Vec<_>>();
    let max = sorted[frame_len - 1];

    let typical_cells = (0..frame_len)
        .filter(|&i| common.iter().any(|v| v.total_cmp(&mask[i]).is_eq()))
        .collect::<Vec<_>>();
    let largest_cells = (0..frame_len)
        .filter(|&i| mask[i].total_cmp(&max).is_eq())
        .collect::<Vec<_>>();

    let curve = |cells: &[usize]| {
        (0..frames)
            .into_par_iter()
            .map(|k| {
                let frame = volume.frame(k);
                let sum = cells.iter().map(|&i| frame[i] as f64).sum::<f64>();
                (sum / cells.len() as f64).min(thresh)
            })
            .collect::<Vec<_>>()
    };

    Ok((curve(&typical_cells), curve(&largest_cells)))
}

/// Average forward difference derivative of every cell.
///
/// The result is the mean of `(f[k + 1] - f[k]) * fps` over all `frames - 1` consecutive frame
/// pairs, in row-major order.
pub fn forward_deriv_mask(volume: VolumeView, fps: f64) -> MaskResult<Vec<f64>> {
    check_fps(fps)?;

    let Dims { frames, .. } = volume.dims();

    if frames < 2 {
        return Err(MaskError::invalid_argument(format!(
            "at least 2 frames are needed, got {frames}"
        )));
    }

    let h = 1.0 / fps;
    let pairs = (frames - 1) as f64;
    let mut mask = vec![0f64; volume.dims().frame_len()];

    mask.par_iter_mut().enumerate().for_each(|(idx, cell)| {
        let sum = (0..frames - 1)
            .map(|k| {
                let (f1, f2) = (volume.frame(k)[idx], volume.frame(k + 1)[idx]);
                forward_diff(f1 as f64, f2 as f64, h)
            })
            .sum::<f64>();
        *cell = sum / pairs;
    });

    Ok(mask)
}

/// Histogram of mask values.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// Number of values within each bin.
    pub counts: Vec<usize>,
    /// Bin edges, one more than there are bins.
    pub edges: Vec<f64>,
}

/// Distribution of mask values over `[0, max]`.
///
/// `nbins` evenly spaced edges are placed from 0 to the largest value, producing `nbins - 1`
/// bins. Every bin is half-open except the last, which also includes the maximum. Negative values
/// are not counted.
///
/// # Arguments
///
/// * `mask` - values to bin.
/// * `nbins` - number of bin edges, at least 2.
pub fn pixel_histogram(mask: &[f64], nbins: usize) -> MaskResult<Histogram> {
    if mask.is_empty() {
        return Err(MaskError::Empty { what: "mask" });
    }

    if nbins < 2 {
        return Err(MaskError::invalid_argument(format!(
            "histogram needs at least 2 edges, got {nbins}"
        )));
    }

    let max = mask.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !(max > 0.0) {
        return Err(MaskError::NotFilled);
    }

    let edges = linspace(0.0, max, nbins);
    let mut counts = vec![0; nbins - 1];

    for &v in mask.iter().filter(|&&v| v >= 0.0 && v <= max) {
        let bin = edges.partition_point(|&e| e <= v) - 1;
        counts[bin.min(nbins - 2)] += 1;
    }

    Ok(Histogram { counts, edges })
}

/// Mean of every mask row.
///
/// Returns `(position, mean)` pairs, where positions are `rows` evenly spaced values over
/// `[0, rows]`.
pub fn row_means(mask: &[f64], rows: usize, cols: usize) -> MaskResult<Vec<(f64, f64)>> {
    if rows == 0 || cols == 0 {
        return Err(MaskError::invalid_argument(format!(
            "grid dimensions must be positive, got {rows}x{cols}"
        )));
    }

    let len = rows.checked_mul(cols).ok_or_else(|| {
        MaskError::invalid_argument(format!("{rows}x{cols} grid is too large to address"))
    })?;

    if mask.len() < len {
        return Err(MaskError::buffer_too_small("mask", len, mask.len()));
    }

    let means = mask[..len]
        .chunks_exact(cols)
        .map(|row| row.iter().sum::<f64>() / cols as f64);

    Ok(linspace(0.0, rows as f64, rows).into_iter().zip(means).collect())
}
