//! # Derivative Mask Library
//!
//! This library accumulates temporal derivatives of motion vector volumes into per-pixel masks.
//! A volume is a stack of equally sized 2D sample grids, and the resulting mask holds the average
//! centered finite difference of every cell across time.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use dmask::prelude::v1::*;
//! ```

pub mod addressing;
pub mod analysis;
pub mod deriv;
pub mod error;
pub mod mask;
pub mod volume;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            addressing::Addressing,
            analysis::{
                danger_matrix, forward_deriv_mask, pixel_histogram, row_means,
                typical_distribution, Histogram,
            },
            deriv::{deriv_approx, forward_diff},
            error::{MaskError, MaskResult},
            mask::{fill_mask, fill_mask_unchecked, MaskAccumulator, MaskOptions},
            volume::{Dims, Volume, VolumeView},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
