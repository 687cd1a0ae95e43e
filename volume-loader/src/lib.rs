//! Common `Volume` loader.

use dmask::prelude::v1::*;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod mvec;
pub mod mvol;

pub use mvec::{densify_mvec, MvecGrid};
pub use mvol::{read_mvol, write_mvol};

/// Load a volume depending on the input extension.
///
/// Files ending with `.mvec` are motion vector streams, which are densified onto `grid`. Any
/// other file is parsed as a `.mvol` volume.
///
/// # Arguments
///
/// * `input` - path to the file.
/// * `grid` - grid to densify `.mvec` streams onto. Required for `.mvec` input.
/// * `fps` - frame rate override. Required for `.mvec` input, which does not store it.
pub fn load_volume(
    input: impl AsRef<Path>,
    grid: Option<MvecGrid>,
    fps: Option<f64>,
) -> Result<Volume> {
    let input = input.as_ref();
    let mut reader = BufReader::new(File::open(input)?);

    let mut volume = if input.extension().map_or(false, |e| e == "mvec") {
        let grid = grid.ok_or_else(|| anyhow!("Grid dimensions are needed for .mvec input"))?;
        let fps = fps.ok_or_else(|| anyhow!("Frame rate is needed for .mvec input"))?;
        densify_mvec(&mut reader, grid, fps)?
    } else {
        read_mvol(&mut reader)?
    };

    if let Some(fps) = fps {
        volume.set_fps(fps);
    }

    let Dims { frames, rows, cols } = volume.dims();
    log::info!(
        "Loaded {frames} frames of {rows}x{cols} from {} at {} fps",
        input.display(),
        volume.fps()
    );

    Ok(volume)
}
