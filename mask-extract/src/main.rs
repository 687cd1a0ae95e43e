//! Compute a temporal derivative mask and write it to a CSV file.

use clap::*;
use dmask::prelude::v1::{Result, *};
use log::*;
use volume_loader::MvecGrid;

mod config;

use config::ExtractConfig;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("mask-extract")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Accumulates temporal derivatives of a motion volume into a mask")
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .takes_value(true)
                .required(true),
        )
        .arg(Arg::new("rows").long("rows").short('r').takes_value(true))
        .arg(Arg::new("cols").long("cols").short('c').takes_value(true))
        .arg(Arg::new("scale").long("scale").short('s').takes_value(true))
        .arg(Arg::new("fps").long("fps").short('f').takes_value(true))
        .arg(Arg::new("workers").long("workers").short('w').takes_value(true))
        .arg(Arg::new("legacy-stride").long("legacy-stride").short('l'))
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .short('t')
                .takes_value(true)
                .help("Output threshold arrival times instead of derivatives"),
        )
        .arg(
            Arg::new("histogram")
                .long("histogram")
                .short('b')
                .takes_value(true),
        )
        .arg(Arg::new("row-means").long("row-means").short('m'))
        .arg(
            Arg::new("typical")
                .long("typical")
                .short('y')
                .requires("threshold")
                .help("Print typical and largest cell intensity curves"),
        )
        .arg(Arg::new("config").long("config").takes_value(true))
        .arg(Arg::new("output").takes_value(true).required(true))
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => ExtractConfig::load(path)?,
        None => ExtractConfig::default(),
    };

    if let Some(fps) = matches.value_of("fps") {
        config.fps = Some(fps.parse()?);
    }
    if let Some(rows) = matches.value_of("rows") {
        config.rows = Some(rows.parse()?);
    }
    if let Some(cols) = matches.value_of("cols") {
        config.cols = Some(cols.parse()?);
    }
    if let Some(scale) = matches.value_of("scale") {
        config.scale = Some(scale.parse()?);
    }
    if let Some(workers) = matches.value_of("workers") {
        config.options.workers = Some(workers.parse()?);
    }
    if matches.is_present("legacy-stride") {
        config.options.addressing = Addressing::LegacyRowStride;
    }

    let threshold: Option<f64> = matches.value_of("threshold").map(str::parse).transpose()?;
    let bins: Option<usize> = matches.value_of("histogram").map(str::parse).transpose()?;

    let input = matches.value_of("input").unwrap();
    let output = matches.value_of("output").unwrap();

    let grid = match (config.rows, config.cols) {
        (Some(rows), Some(cols)) => Some(MvecGrid {
            scale: config.scale.unwrap_or(MvecGrid::new(rows, cols).scale),
            ..MvecGrid::new(rows, cols)
        }),
        (None, None) => None,
        _ => return Err(anyhow!("Both rows and cols must be given")),
    };

    let volume = volume_loader::load_volume(input, grid, config.fps)?;
    let Dims { rows, cols, .. } = volume.dims();

    // Threshold masks are always row-major.
    let (mask, addressing) = if let Some(thresh) = threshold {
        let mask = danger_matrix(volume.view(), thresh, volume.fps())?;

        if matches.is_present("typical") {
            let (typical, largest) = typical_distribution(volume.view(), &mask, thresh)?;
            for (k, (t, l)) in typical.iter().zip(&largest).enumerate() {
                println!("{:.4},{t},{l}", k as f64 / volume.fps());
            }
        }

        (mask, Addressing::RowMajor)
    } else {
        let accumulator = MaskAccumulator::new(config.options)?;
        let addressing = config.options.addressing;
        let mut mask = vec![0.0; addressing.extent(rows, cols)];
        accumulator.accumulate(&mut mask, volume.view(), volume.fps())?;
        (mask, addressing)
    };

    if let Some(bins) = bins {
        let hist = pixel_histogram(&mask, bins)?;
        for (edges, count) in hist.edges.windows(2).zip(&hist.counts) {
            info!("[{:.4}; {:.4}]: {}", edges[0], edges[1], count);
        }
    }

    let grid = (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| mask[addressing.index(i, j, rows, cols)])
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    if matches.is_present("row-means") {
        let flat = grid.concat();
        for (x, mean) in row_means(&flat, rows, cols)? {
            println!("{x:.3},{mean}");
        }
    }

    let mut writer = csv::Writer::from_path(output)?;
    for row in &grid {
        writer.write_record(row.iter().map(f64::to_string))?;
    }
    writer.flush()?;

    info!("Wrote {rows}x{cols} mask to {output}");

    Ok(())
}
