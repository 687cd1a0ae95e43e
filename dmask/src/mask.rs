//! # Derivative mask accumulation
//!
//! Accumulates centered temporal derivatives of a motion vector volume into a 2D mask and
//! averages them over the frame count.

use crate::addressing::Addressing;
use crate::deriv::deriv_approx;
use crate::error::{MaskError, MaskResult};
use crate::volume::{Dims, VolumeView};
use log::*;
use rayon::prelude::*;

/// Accumulation settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(default)
)]
pub struct MaskOptions {
    /// Cell addressing used for both the volume frames and the mask.
    pub addressing: Addressing,
    /// Number of worker threads. `None` uses the global rayon pool.
    pub workers: Option<usize>,
}

/// Parallel derivative mask accumulator.
///
/// Every frame `k` with a partner at `k + 2` contributes `deriv_approx(f[k], f[k + 2], 1 / fps)`
/// to each cell. Contributions are summed into thread-private buffers, merged after the parallel
/// pass and added into the mask. The mask is then divided by the total number of frames.
pub struct MaskAccumulator {
    options: MaskOptions,
    pool: Option<rayon::ThreadPool>,
}

impl Default for MaskAccumulator {
    fn default() -> Self {
        Self {
            options: Default::default(),
            pool: None,
        }
    }
}

impl MaskAccumulator {
    /// Create a new accumulator.
    ///
    /// If `options.workers` is set, a dedicated thread pool of that size is built.
    pub fn new(options: MaskOptions) -> MaskResult<Self> {
        let pool = match options.workers {
            Some(0) => {
                return Err(MaskError::invalid_argument(
                    "worker count must be at least 1",
                ))
            }
            Some(workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("dmask-{i}"))
                    .build()
                    .map_err(|e| MaskError::invalid_argument(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { options, pool })
    }

    /// Check buffers and parameters against the preconditions of `accumulate`.
    ///
    /// # Arguments
    ///
    /// * `mask_len` - length of the output mask buffer.
    /// * `volume` - input volume.
    /// * `fps` - frame rate of the volume.
    pub fn validate(&self, mask_len: usize, volume: &VolumeView, fps: f64) -> MaskResult<()> {
        let Dims { frames, rows, cols } = volume.dims();
        let addressing = self.options.addressing;

        if frames < 2 {
            return Err(MaskError::invalid_argument(format!(
                "at least 2 frames are needed, got {frames}"
            )));
        }

        if rows == 0 || cols == 0 {
            return Err(MaskError::invalid_argument(format!(
                "grid dimensions must be positive, got {rows}x{cols}"
            )));
        }

        if !fps.is_finite() || fps <= 0.0 {
            return Err(MaskError::invalid_argument(format!(
                "fps must be positive and finite, got {fps}"
            )));
        }

        let required = volume.dims().validate(addressing)?;

        let extent = addressing.extent(rows, cols);
        if mask_len < extent {
            return Err(MaskError::buffer_too_small("mask", extent, mask_len));
        }

        let actual = volume.as_slice().len();
        if actual < required {
            return Err(MaskError::buffer_too_small("volume", required, actual));
        }

        Ok(())
    }

    /// Validate inputs and accumulate the derivative mask.
    ///
    /// The mask is added into, not overwritten. Pass a zeroed mask to get the plain average.
    ///
    /// # Arguments
    ///
    /// * `mask` - output mask, at least `addressing.extent(rows, cols)` long.
    /// * `volume` - input volume.
    /// * `fps` - frame rate of the volume.
    pub fn accumulate(&self, mask: &mut [f64], volume: VolumeView, fps: f64) -> MaskResult<()> {
        self.validate(mask.len(), &volume, fps)?;
        self.accumulate_unchecked(mask, volume, fps);
        Ok(())
    }

    /// Accumulate the derivative mask without validating inputs.
    ///
    /// Undersized buffers cause a panic. Volumes with less than 3 frames contribute nothing, and
    /// an empty volume leaves the mask untouched.
    pub fn accumulate_unchecked(&self, mask: &mut [f64], volume: VolumeView, fps: f64) {
        match &self.pool {
            Some(pool) => pool.install(|| self.run(mask, volume, fps)),
            None => self.run(mask, volume, fps),
        }
    }

    fn run(&self, mask: &mut [f64], volume: VolumeView, fps: f64) {
        let Dims { frames, rows, cols } = volume.dims();
        let addressing = self.options.addressing;
        let extent = addressing.extent(rows, cols);
        let time_step = 1.0 / fps;
        let pairs = frames.saturating_sub(2);

        debug!(
            "accumulating {pairs} frame pairs over {rows}x{cols} grid ({addressing:?}, {} threads)",
            rayon::current_num_threads()
        );

        if frames == 0 || extent == 0 {
            return;
        }

        if addressing.aliases(rows, cols) {
            warn!("{rows}x{cols} grid with row stride addressing aliases cells across rows");
        }

        let sums = (0..pairs)
            .into_par_iter()
            .fold(
                || vec![0f64; extent],
                |mut acc, k| {
                    let frame_a = volume.frame_from(k);
                    let frame_b = volume.frame_from(k + 2);
                    for idx in addressing.offsets(rows, cols) {
                        acc[idx] +=
                            deriv_approx(frame_a[idx] as f64, frame_b[idx] as f64, time_step);
                    }
                    acc
                },
            )
            .reduce_with(|mut a, b| {
                a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
                a
            });

        // Accumulation is complete past this point.
        if let Some(sums) = sums {
            mask[..extent]
                .iter_mut()
                .zip(sums)
                .for_each(|(m, s)| *m += s);
        }

        let n = frames as f64;

        if addressing.aliases(rows, cols) {
            // Aliased cells are divided once per mapping cell, in visiting order.
            for idx in addressing.offsets(rows, cols) {
                mask[idx] /= n;
            }
        } else {
            let stride = match addressing {
                Addressing::RowMajor => cols,
                // Single row grids never alias, whatever the column count.
                Addressing::LegacyRowStride => rows.max(cols),
            };

            mask[..extent]
                .par_chunks_mut(stride)
                .for_each(|row| row[..cols].iter_mut().for_each(|v| *v /= n));
        }
    }
}

/// Accumulate the time-averaged centered derivative of `volume` into `mask`.
///
/// Uses row-major addressing and the global thread pool. `mask` should be zeroed beforehand:
/// new sums are added to its existing contents before the whole mask is divided by `n_frames`,
/// so repeated calls do not overwrite earlier results.
///
/// # Arguments
///
/// * `mask` - output mask of at least `n_rows * n_cols` elements.
/// * `volume` - `n_frames * n_rows * n_cols` samples, frame-major.
/// * `n_frames` - number of frames in the volume, at least 2.
/// * `n_rows` - number of rows per frame.
/// * `n_cols` - number of columns per frame.
/// * `fps` - frame rate, the inverse of the time step.
pub fn fill_mask(
    mask: &mut [f64],
    volume: &[i64],
    n_frames: usize,
    n_rows: usize,
    n_cols: usize,
    fps: f64,
) -> MaskResult<()> {
    let view = VolumeView::new_unchecked(volume, Dims::new(n_frames, n_rows, n_cols));
    MaskAccumulator::default().accumulate(mask, view, fps)
}

/// Same as `fill_mask`, but without validating inputs.
///
/// See `MaskAccumulator::accumulate_unchecked`.
pub fn fill_mask_unchecked(
    mask: &mut [f64],
    volume: &[i64],
    n_frames: usize,
    n_rows: usize,
    n_cols: usize,
    fps: f64,
) {
    let view = VolumeView::new_unchecked(volume, Dims::new(n_frames, n_rows, n_cols));
    MaskAccumulator::default().accumulate_unchecked(mask, view, fps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::Rng;

    /// Straight sequential accumulation in the legacy loop order.
    fn reference(
        mask: &mut [f64],
        volume: &[i64],
        dims: Dims,
        fps: f64,
        addressing: Addressing,
    ) {
        let Dims { frames, rows, cols } = dims;
        let h = 1.0 / fps;
        for k in 0..frames.saturating_sub(2) {
            let a = k * dims.frame_len();
            let b = (k + 2) * dims.frame_len();
            for i in 0..rows {
                for j in 0..cols {
                    let idx = addressing.index(i, j, rows, cols);
                    mask[idx] += deriv_approx(volume[a + idx] as f64, volume[b + idx] as f64, h);
                }
            }
        }
        for i in 0..rows {
            for j in 0..cols {
                mask[addressing.index(i, j, rows, cols)] /= frames as f64;
            }
        }
    }

    fn random_volume(dims: Dims, addressing: Addressing) -> Vec<i64> {
        let mut rng = rand::thread_rng();
        (0..dims.required_len(addressing))
            .map(|_| rng.gen_range(-255..=255))
            .collect()
    }

    #[test]
    fn four_frame_scenario() {
        let volume = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4];
        // h = 0.5: pairs contribute (2 - 0) / 1 and (4 - 1) / 1.
        let mut mask = [0.0; 4];
        fill_mask(&mut mask, &volume, 4, 2, 2, 2.0).unwrap();
        assert_eq!(mask, [1.25; 4]);

        // h = 1 halves every contribution.
        let mut mask = [0.0; 4];
        fill_mask(&mut mask, &volume, 4, 2, 2, 1.0).unwrap();
        assert_eq!(mask, [0.625; 4]);
    }

    #[test]
    fn two_frames_stay_zero() {
        let volume = [3, 7, 1, 9, 100, -4, 8, 12];
        let mut mask = [0.0; 4];
        fill_mask(&mut mask, &volume, 2, 2, 2, 25.0).unwrap();
        assert_eq!(mask, [0.0; 4]);
    }

    #[test]
    fn unchecked_short_volumes() {
        let volume = [5, 6];
        let mut mask = [0.0; 2];
        fill_mask_unchecked(&mut mask, &volume, 1, 1, 2, 25.0);
        assert_eq!(mask, [0.0; 2]);

        let mut mask = [1.5; 2];
        fill_mask_unchecked(&mut mask, &[], 0, 1, 2, 25.0);
        assert_eq!(mask, [1.5; 2]);
    }

    #[test]
    fn pair_count_and_normalization() {
        // Frame k holds k * 3 in every cell, so each pair contributes 3 * fps.
        let fps = 10.0;
        for frames in 2..12usize {
            let volume = (0..frames)
                .flat_map(|k| std::iter::repeat(k as i64 * 3).take(6))
                .collect::<Vec<_>>();
            let mut mask = [0.0; 6];
            fill_mask(&mut mask, &volume, frames, 2, 3, fps).unwrap();
            let expected = (frames - 2) as f64 * 3.0 * fps / frames as f64;
            for v in mask {
                assert_approx_eq!(v, expected, 1e-9);
            }
        }
    }

    #[test]
    fn accumulates_into_existing_mask() {
        let volume = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4];
        let mut mask = [0.0; 4];
        fill_mask(&mut mask, &volume, 4, 2, 2, 2.0).unwrap();
        fill_mask(&mut mask, &volume, 4, 2, 2, 2.0).unwrap();
        // The second call divides the first result again before adding its own.
        assert_eq!(mask, [1.25 / 4.0 + 1.25; 4]);

        let mut mask = [0.0; 4];
        let mut other = [0.0; 4];
        fill_mask(&mut mask, &volume, 4, 2, 2, 2.0).unwrap();
        fill_mask(&mut other, &volume, 4, 2, 2, 2.0).unwrap();
        mask.iter_mut().zip(other).for_each(|(a, b)| *a += b);
        assert_eq!(mask, [2.5; 4]);
    }

    #[test]
    fn cells_past_extent_untouched() {
        let volume = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4];
        let mut mask = [0.0, 0.0, 0.0, 0.0, 7.0];
        fill_mask(&mut mask, &volume, 4, 2, 2, 2.0).unwrap();
        assert_eq!(mask, [1.25, 1.25, 1.25, 1.25, 7.0]);
    }

    #[test]
    fn matches_reference_across_workers() {
        let dims = Dims::new(17, 9, 13);
        let volume = random_volume(dims, Addressing::RowMajor);

        let mut expected = vec![0.0; dims.frame_len()];
        reference(&mut expected, &volume, dims, 30.0, Addressing::RowMajor);

        for workers in [None, Some(1), Some(2), Some(5)] {
            let acc = MaskAccumulator::new(MaskOptions {
                workers,
                ..Default::default()
            })
            .unwrap();
            let mut mask = vec![0.0; dims.frame_len()];
            acc.accumulate(&mut mask, VolumeView::new_unchecked(&volume, dims), 30.0)
                .unwrap();
            for (a, b) in mask.iter().zip(&expected) {
                assert_approx_eq!(*a, *b, 1e-9);
            }
        }
    }

    #[test]
    fn legacy_matches_reference() {
        let options = MaskOptions {
            addressing: Addressing::LegacyRowStride,
            workers: Some(3),
        };
        let acc = MaskAccumulator::new(options).unwrap();

        for (rows, cols) in [(4, 4), (2, 3), (3, 7), (5, 2), (1, 6)] {
            let dims = Dims::new(9, rows, cols);
            let volume = random_volume(dims, Addressing::LegacyRowStride);
            let extent = Addressing::LegacyRowStride.extent(rows, cols);

            let mut expected = vec![0.0; extent];
            reference(&mut expected, &volume, dims, 25.0, Addressing::LegacyRowStride);

            let mut mask = vec![0.0; extent];
            let view = VolumeView::new(&volume, dims, Addressing::LegacyRowStride).unwrap();
            acc.accumulate(&mut mask, view, 25.0).unwrap();

            for (a, b) in mask.iter().zip(&expected) {
                assert_approx_eq!(*a, *b, 1e-9);
            }
        }
    }

    #[test]
    fn legacy_aliasing_divides_twice() {
        // 2x3 grid: (0, 2) and (1, 0) share offset 2.
        let dims = Dims::new(3, 2, 3);
        let mut volume = vec![0; dims.len()];
        // Frame 2 rises by 6 in every addressed cell.
        volume[12..].iter_mut().for_each(|v| *v = 6);

        let acc = MaskAccumulator::new(MaskOptions {
            addressing: Addressing::LegacyRowStride,
            workers: None,
        })
        .unwrap();

        let mut mask = vec![0.0; 5];
        acc.accumulate(&mut mask, VolumeView::new_unchecked(&volume, dims), 1.0)
            .unwrap();

        // Each mapping adds 3, offset 2 gets it twice and is divided by 3 twice.
        assert_approx_eq!(mask[0], 1.0);
        assert_approx_eq!(mask[1], 1.0);
        assert_approx_eq!(mask[2], 6.0 / 9.0);
        assert_approx_eq!(mask[3], 1.0);
        assert_approx_eq!(mask[4], 1.0);
    }

    #[test]
    fn legacy_equals_row_major_on_square() {
        let dims = Dims::new(6, 5, 5);
        let volume = random_volume(dims, Addressing::RowMajor);
        let view = VolumeView::new_unchecked(&volume, dims);

        let mut a = vec![0.0; 25];
        let mut b = vec![0.0; 25];
        MaskAccumulator::default()
            .accumulate(&mut a, view, 24.0)
            .unwrap();
        MaskAccumulator::new(MaskOptions {
            addressing: Addressing::LegacyRowStride,
            workers: None,
        })
        .unwrap()
        .accumulate(&mut b, view, 24.0)
        .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_arguments() {
        let volume = [0i64; 16];
        let mut mask = [0.0; 4];

        let invalid = |r: MaskResult<()>| matches!(r, Err(MaskError::InvalidArgument { .. }));

        assert!(invalid(fill_mask(&mut mask, &volume, 1, 2, 2, 1.0)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 0, 2, 1.0)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 2, 0, 1.0)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 2, 2, 0.0)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 2, 2, -30.0)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 2, 2, f64::NAN)));
        assert!(invalid(fill_mask(&mut mask, &volume, 4, 2, 2, f64::INFINITY)));

        assert!(MaskAccumulator::new(MaskOptions {
            workers: Some(0),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let volume = [0i64; 16];
        let mut mask = [0.0; 16];

        for (frames, rows, cols) in [
            (usize::MAX / 2, 4, 4),
            (4, usize::MAX / 2, 4),
            (4, 4, usize::MAX),
            (usize::MAX, usize::MAX, usize::MAX),
        ] {
            assert!(
                matches!(
                    fill_mask(&mut mask, &volume, frames, rows, cols, 1.0),
                    Err(MaskError::InvalidArgument { .. })
                ),
                "{frames}x{rows}x{cols}"
            );
        }

        let acc = MaskAccumulator::new(MaskOptions {
            addressing: Addressing::LegacyRowStride,
            workers: Some(1),
        })
        .unwrap();
        let view = VolumeView::new_unchecked(&volume, Dims::new(3, usize::MAX / 2, 2));
        assert!(matches!(
            acc.accumulate(&mut mask, view, 1.0),
            Err(MaskError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn rejects_small_buffers() {
        let volume = [0i64; 15];
        let mut mask = [0.0; 4];
        assert!(matches!(
            fill_mask(&mut mask, &volume, 4, 2, 2, 1.0),
            Err(MaskError::BufferTooSmall {
                buffer: "volume",
                required: 16,
                actual: 15
            })
        ));

        let volume = [0i64; 16];
        let mut mask = [0.0; 3];
        assert!(matches!(
            fill_mask(&mut mask, &volume, 4, 2, 2, 1.0),
            Err(MaskError::BufferTooSmall {
                buffer: "mask",
                required: 4,
                actual: 3
            })
        ));
    }
}
