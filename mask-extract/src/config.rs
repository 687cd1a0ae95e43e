//! Extraction settings file.

use dmask::prelude::v1::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Settings that may be supplied as JSON instead of on the command line.
///
/// Command line arguments take precedence over values in the file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Frame rate override.
    pub fps: Option<f64>,
    /// Grid rows for `.mvec` input.
    pub rows: Option<usize>,
    /// Grid columns for `.mvec` input.
    pub cols: Option<usize>,
    /// Magnitude scale for `.mvec` input.
    pub scale: Option<f32>,
    /// Accumulation settings.
    pub options: MaskOptions,
}

impl ExtractConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file() {
        let config: ExtractConfig =
            serde_json::from_str(r#"{ "fps": 25.0, "options": { "workers": 4 } }"#).unwrap();
        assert_eq!(config.fps, Some(25.0));
        assert_eq!(config.rows, None);
        assert_eq!(config.options.workers, Some(4));
        assert_eq!(config.options.addressing, Addressing::RowMajor);
    }

    #[test]
    fn legacy_addressing() {
        let config: ExtractConfig =
            serde_json::from_str(r#"{ "options": { "addressing": "LegacyRowStride" } }"#)
                .unwrap();
        assert_eq!(config.options.addressing, Addressing::LegacyRowStride);
        assert_eq!(config.options.workers, None);
    }

    #[test]
    fn empty_file() {
        let config: ExtractConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExtractConfig::default());
    }
}
