//! # Motion vector volumes
//!
//! A volume is a stack of equally sized sample grids stored frame-major, row-major in one
//! contiguous buffer.

use crate::addressing::Addressing;
use crate::error::{MaskError, MaskResult};

/// Dimensions of a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Dims {
    pub frames: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Dims {
    pub fn new(frames: usize, rows: usize, cols: usize) -> Self {
        Self { frames, rows, cols }
    }

    /// Number of samples in a single frame.
    pub fn frame_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of samples in the whole volume.
    pub fn len(&self) -> usize {
        self.frames * self.frame_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Minimum buffer length needed to address every frame with the given scheme.
    pub fn required_len(&self, addressing: Addressing) -> usize {
        match self.frames {
            0 => 0,
            n => (n - 1) * self.frame_len() + addressing.extent(self.rows, self.cols),
        }
    }

    /// Same as `frame_len`, but returns `None` on overflow.
    pub fn checked_frame_len(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Same as `len`, but returns `None` on overflow.
    pub fn checked_len(&self) -> Option<usize> {
        self.frames.checked_mul(self.checked_frame_len()?)
    }

    /// Same as `required_len`, but returns `None` on overflow.
    pub fn checked_required_len(&self, addressing: Addressing) -> Option<usize> {
        match self.frames {
            0 => Some(0),
            n => (n - 1)
                .checked_mul(self.checked_frame_len()?)?
                .checked_add(addressing.checked_extent(self.rows, self.cols)?),
        }
    }

    /// Verify every size derived from these dimensions fits in `usize`.
    ///
    /// Returns the required buffer length under `addressing`.
    pub fn validate(&self, addressing: Addressing) -> MaskResult<usize> {
        self.checked_len()
            .and_then(|_| self.checked_required_len(addressing))
            .ok_or_else(|| {
                MaskError::invalid_argument(format!(
                    "volume of {}x{}x{} is too large to address",
                    self.frames, self.rows, self.cols
                ))
            })
    }
}

/// Borrowed view over a volume buffer.
#[derive(Clone, Copy, Debug)]
pub struct VolumeView<'a> {
    data: &'a [i64],
    dims: Dims,
}

impl<'a> VolumeView<'a> {
    /// Create a view without checking the buffer length.
    ///
    /// Accessing frames past the end of `data` will panic.
    pub fn new_unchecked(data: &'a [i64], dims: Dims) -> Self {
        Self { data, dims }
    }

    /// Create a view, verifying `data` is large enough for `dims` under `addressing`.
    pub fn new(data: &'a [i64], dims: Dims, addressing: Addressing) -> MaskResult<Self> {
        let required = dims.validate(addressing)?;
        if data.len() < required {
            return Err(MaskError::buffer_too_small("volume", required, data.len()));
        }
        Ok(Self { data, dims })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn as_slice(&self) -> &'a [i64] {
        self.data
    }

    /// Samples starting at frame `k`.
    ///
    /// The returned slice runs to the end of the buffer, so offsets produced by
    /// `Addressing::LegacyRowStride` remain reachable past the nominal frame length.
    pub fn frame_from(&self, k: usize) -> &'a [i64] {
        &self.data[k * self.dims.frame_len()..]
    }

    /// Samples of frame `k`, exactly `rows * cols` long.
    pub fn frame(&self, k: usize) -> &'a [i64] {
        let len = self.dims.frame_len();
        &self.data[k * len..(k + 1) * len]
    }

    /// Iterate over all frames in order.
    pub fn frames(&self) -> impl Iterator<Item = &'a [i64]> + '_ {
        (0..self.dims.frames).map(move |k| self.frame(k))
    }
}

/// Owned volume with its frame rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume {
    data: Vec<i64>,
    dims: Dims,
    fps: f64,
}

impl Volume {
    /// Create a volume without frames, to be filled with `push_frame`.
    pub fn empty(rows: usize, cols: usize, fps: f64) -> MaskResult<Self> {
        let dims = Dims::new(0, rows, cols);
        dims.checked_frame_len().ok_or_else(|| {
            MaskError::invalid_argument(format!("{rows}x{cols} grid is too large to address"))
        })?;
        Ok(Self {
            data: vec![],
            dims,
            fps,
        })
    }

    /// Wrap existing samples.
    ///
    /// `data` must hold exactly `dims.len()` samples.
    pub fn from_vec(data: Vec<i64>, dims: Dims, fps: f64) -> MaskResult<Self> {
        let len = dims.validate(Addressing::RowMajor)?;
        if data.len() != len {
            return Err(MaskError::invalid_argument(format!(
                "volume of {}x{}x{} needs {} samples, got {}",
                dims.frames,
                dims.rows,
                dims.cols,
                len,
                data.len()
            )));
        }
        Ok(Self { data, dims, fps })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.fps = fps;
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }

    pub fn view(&self) -> VolumeView {
        VolumeView::new_unchecked(&self.data, self.dims)
    }

    /// Append a frame to the end of the volume.
    pub fn push_frame(&mut self, frame: &[i64]) -> MaskResult<()> {
        if frame.len() != self.dims.frame_len() {
            return Err(MaskError::invalid_argument(format!(
                "frame needs {} samples, got {}",
                self.dims.frame_len(),
                frame.len()
            )));
        }
        self.data.extend_from_slice(frame);
        self.dims.frames += 1;
        Ok(())
    }
}
