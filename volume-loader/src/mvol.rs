//! # Raw volume files
//!
//! Layout, all values little-endian:
//!
//! `b"MVOL"`, `u32` version, `u32` frames, `u32` rows, `u32` cols, `f64` fps, then
//! `frames * rows * cols` `i64` samples, frame-major.

use dmask::prelude::v1::*;
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"MVOL";
const VERSION: u32 = 1;

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; std::mem::size_of::<u32>()];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Write a volume.
pub fn write_mvol(out: &mut impl Write, volume: &Volume) -> Result<()> {
    let Dims { frames, rows, cols } = volume.dims();

    out.write_all(MAGIC)?;
    out.write_all(&VERSION.to_le_bytes())?;
    for d in [frames, rows, cols] {
        out.write_all(&u32::try_from(d)?.to_le_bytes())?;
    }
    out.write_all(&volume.fps().to_le_bytes())?;

    for v in volume.as_slice() {
        out.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

/// Read a volume.
pub fn read_mvol(reader: &mut impl Read) -> Result<Volume> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(anyhow!("Not a volume file"));
    }

    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(anyhow!("Unsupported volume version {version}"));
    }

    let frames = read_u32(reader)? as usize;
    let rows = read_u32(reader)? as usize;
    let cols = read_u32(reader)? as usize;

    let mut fps = [0u8; std::mem::size_of::<f64>()];
    reader.read_exact(&mut fps)?;
    let fps = f64::from_le_bytes(fps);

    let dims = Dims::new(frames, rows, cols);
    let bytes = dims
        .checked_len()
        .and_then(|len| len.checked_mul(std::mem::size_of::<i64>()))
        .ok_or_else(|| anyhow!("Volume of {frames}x{rows}x{cols} is too large"))?;

    // The header is untrusted, so the buffer only grows with data actually present.
    let mut raw = vec![];
    reader.take(bytes as u64).read_to_end(&mut raw)?;
    if raw.len() != bytes {
        return Err(anyhow!(
            "Volume data truncated: expected {bytes} bytes, got {}",
            raw.len()
        ));
    }

    let data = raw
        .chunks_exact(std::mem::size_of::<i64>())
        .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();

    Volume::from_vec(data, dims, fps).map_err(Into::into)
}
