//! Engine configuration module.
//!
//! Handles loading, validating, and merging `pixel-studio.toml`. Stock
//! defaults are serialized to a TOML table and a user file, if present, is
//! merged on top of it key by key, so a config file only needs the values it
//! changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [segmentation]
//! strategy = "heuristic"        # "heuristic" or "learned"
//! max_working_dimension = 1024  # Larger images are analysed downscaled
//! threshold = 40.0              # Heuristic: RGB distance cut-off
//! softness = 0.0                # Heuristic: width of the opacity ramp
//!
//! [encoding]
//! default_quality = 0.95        # Format conversion default (0.0-1.0)
//! compress_quality = 0.8        # Compression default (0.0-1.0)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "pixel-studio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `pixel-studio.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Background removal settings.
    pub segmentation: SegmentationConfig,
    /// Output quality defaults.
    pub encoding: EncodingConfig,
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if seg.max_working_dimension == 0 {
            return Err(ConfigError::Validation(
                "segmentation.max_working_dimension must be at least 1".into(),
            ));
        }
        if !(seg.threshold.is_finite() && seg.threshold >= 0.0) {
            return Err(ConfigError::Validation(
                "segmentation.threshold must be a non-negative number".into(),
            ));
        }
        if !(seg.softness.is_finite() && seg.softness >= 0.0) {
            return Err(ConfigError::Validation(
                "segmentation.softness must be a non-negative number".into(),
            ));
        }
        for (key, value) in [
            ("encoding.default_quality", self.encoding.default_quality),
            ("encoding.compress_quality", self.encoding.compress_quality),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 0.0-1.0")));
            }
        }
        Ok(())
    }
}

/// Which segmentation strategy background removal uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationStrategy {
    /// Corner-color distance. Always available.
    #[default]
    Heuristic,
    /// Injected matting model. Needs a model loader at engine construction.
    Learned,
}

/// Background removal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    pub strategy: SegmentationStrategy,
    /// Images with a longer side above this are analysed at a proportionally
    /// reduced size; the mask is scaled back up afterwards.
    pub max_working_dimension: u32,
    /// Euclidean RGB distance below which a pixel counts as background.
    pub threshold: f32,
    /// Opacity ramp width above `threshold`. Zero means a hard cut.
    pub softness: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            strategy: SegmentationStrategy::default(),
            max_working_dimension: 1024,
            threshold: 40.0,
            softness: 0.0,
        }
    }
}

/// Output quality defaults, as fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// Used by format conversion when the caller gives no quality.
    pub default_quality: f32,
    /// Used by the engine's compress operation.
    pub compress_quality: f32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default_quality: 0.95,
            compress_quality: 0.8,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EngineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `pixel-studio.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    tracing::debug!(
        strategy = ?config.segmentation.strategy,
        max_working_dimension = config.segmentation.max_working_dimension,
        "Resolved engine config"
    );
    Ok(config)
}

/// Parse config from a TOML string, on top of stock defaults.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    resolve_config(Some(overlay))
}

/// Load config from `pixel-studio.toml` in the given directory, falling back
/// to stock defaults when there is none.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `pixel-studio.toml`.
pub fn stock_config_toml() -> &'static str {
    r##"# Pixel Studio Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Background removal
# ---------------------------------------------------------------------------
[segmentation]
# "heuristic": treat colors close to the image corners as background.
# "learned": run a matting model (requires a model loader).
strategy = "heuristic"

# Images whose longer side exceeds this are analysed at a reduced size.
# The resulting mask is scaled back to the original resolution.
max_working_dimension = 1024

# Heuristic only: RGB distance from the corner color below which a pixel
# is removed.
threshold = 40.0

# Heuristic only: pixels between threshold and threshold + softness fade
# in gradually instead of being cut. 0 gives a hard edge.
softness = 0.0

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Quality used by format conversion when none is given (0.0 - 1.0).
default_quality = 0.95

# Quality used when compressing (0.0 - 1.0).
compress_quality = 0.8
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.segmentation.strategy, SegmentationStrategy::Heuristic);
        assert_eq!(config.segmentation.max_working_dimension, 1024);
        assert_eq!(config.segmentation.threshold, 40.0);
        assert_eq!(config.segmentation.softness, 0.0);
        assert_eq!(config.encoding.default_quality, 0.95);
        assert_eq!(config.encoding.compress_quality, 0.8);
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
[segmentation]
threshold = 25.5
"#,
        )
        .unwrap();
        // Overridden value
        assert_eq!(config.segmentation.threshold, 25.5);
        // Default values preserved
        assert_eq!(config.segmentation.max_working_dimension, 1024);
        assert_eq!(config.encoding, EncodingConfig::default());
    }

    #[test]
    fn parse_strategy_names() {
        let config = parse_config("[segmentation]\nstrategy = \"learned\"").unwrap();
        assert_eq!(config.segmentation.strategy, SegmentationStrategy::Learned);

        let result = parse_config("[segmentation]\nstrategy = \"magic\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[segmentation]
max_working_dimension = 512
softness = 12.0

[encoding]
compress_quality = 0.6
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.segmentation.max_working_dimension, 512);
        assert_eq!(config.segmentation.softness, 12.0);
        assert_eq!(config.encoding.compress_quality, 0.6);
        // Unspecified values should be defaults
        assert_eq!(config.segmentation.threshold, 40.0);
        assert_eq!(config.encoding.default_quality, 0.95);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_ignores_other_file_names() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[segmentation]\nthreshold = 1.0").unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.segmentation.threshold, 40.0);
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn unknown_top_level_key_rejected() {
        let result = parse_config("colour_space = \"srgb\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result = parse_config("[segmentation]\ntreshold = 30.0");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn zero_working_dimension_rejected() {
        let result = parse_config("[segmentation]\nmax_working_dimension = 0");
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("max_working_dimension")));
    }

    #[test]
    fn negative_threshold_rejected() {
        let result = parse_config("[segmentation]\nthreshold = -1.0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_softness_rejected() {
        let result = parse_config("[segmentation]\nsoftness = -0.5");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let result = parse_config("[encoding]\ndefault_quality = 95.0");
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("default_quality")));

        let result = parse_config("[encoding]\ncompress_quality = -0.1");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_overlay_wins_and_base_keys_survive() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);

        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn merge_non_table_replaces() {
        let base: toml::Value = toml::from_str("a = [1, 2]").unwrap();
        let overlay: toml::Value = toml::from_str("a = [3]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn stock_defaults_value_round_trips() {
        let config: EngineConfig = stock_defaults_value().try_into().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    // =========================================================================
    // Stock config file
    // =========================================================================

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
