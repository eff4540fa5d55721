//! Normalizer configuration.
//!
//! Handles loading, validating, and merging a `normalize.toml` file. Stock
//! defaults form the base layer; the user file is overlaid on top, so it
//! only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! propagate_internal_errors = false  # true: internal failures are Err, not Failed
//!
//! [defaults]
//! size = "full"             # full | large | medium | small | { custom = 60 } | { max_dimension = 2048 }
//! # max_dimension = 2048    # Pixel cap combined with `size`
//! quality = 100             # JPEG quality (1-100)
//! rotate = true             # Apply EXIF orientation to the pixels
//!
//! [limits]
//! # max_texture_size = 4096 # Largest edge the decoder may produce
//!
//! [device]
//! # make = "Google"         # Fallback for files without Make
//! # model = "Pixel 8"       # Fallback for files without Model
//!
//! [processing]
//! # max_processes = 4       # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, SizeConstraint, SizeSpec};
use crate::pipeline::{NormalizeOptions, NormalizeRequest};
use crate::types::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "normalize.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Normalizer configuration loaded from `normalize.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Return internal failures as errors instead of a `Failed` status.
    pub propagate_internal_errors: bool,
    /// Request defaults (size, quality, rotation).
    pub defaults: DefaultsConfig,
    /// Decoder limits.
    pub limits: LimitsConfig,
    /// Fallback camera make/model.
    pub device: DeviceInfo,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl NormalizeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.defaults;
        if !(1..=100).contains(&d.quality) {
            return Err(ConfigError::Validation(
                "defaults.quality must be 1-100".into(),
            ));
        }
        match d.size {
            SizeSpec::Custom(p) if !(1..=100).contains(&p) => {
                return Err(ConfigError::Validation(
                    "defaults.size custom percent must be 1-100".into(),
                ));
            }
            SizeSpec::MaxDimension(0) => {
                return Err(ConfigError::Validation(
                    "defaults.size max_dimension must be non-zero".into(),
                ));
            }
            _ => {}
        }
        if d.max_dimension == Some(0) {
            return Err(ConfigError::Validation(
                "defaults.max_dimension must be non-zero".into(),
            ));
        }
        if self.limits.max_texture_size == Some(0) {
            return Err(ConfigError::Validation(
                "limits.max_texture_size must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Normalizer settings derived from this config.
    pub fn normalizer_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            propagate_internal_errors: self.propagate_internal_errors,
            max_texture_size: self.limits.max_texture_size,
            device: (!self.device.is_empty()).then(|| self.device.clone()),
        }
    }

    /// A request for `path` using the configured defaults.
    pub fn default_request(&self, path: impl Into<PathBuf>) -> NormalizeRequest {
        let d = &self.defaults;
        NormalizeRequest::new(path)
            .with_size(SizeConstraint::new(d.size).with_max_dimension(d.max_dimension))
            .with_quality(Quality::new(d.quality))
            .with_rotate(d.rotate)
    }
}

/// Request defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub size: SizeSpec,
    /// Pixel cap combined with `size`.
    pub max_dimension: Option<u32>,
    /// Encoding quality (1-100). 100 with full size and no rotation means
    /// no re-encode.
    pub quality: u32,
    /// Physically apply the EXIF orientation.
    pub rotate: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            size: SizeSpec::Full,
            max_dimension: None,
            quality: Quality::MAX.value(),
            rotate: true,
        }
    }
}

/// Decoder limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest edge, in pixels, the decoder may produce.
    pub max_texture_size: Option<u32>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel normalization workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(NormalizeConfig::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<NormalizeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: NormalizeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<NormalizeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `normalize.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# media-normalize configuration
# =============================
# All keys are optional. Values shown are the defaults.
# Unknown keys are rejected.

# When true, probe/decode/encode/metadata failures are returned as errors.
# When false, they are reported as a "failed" status and the file is left
# untouched.
propagate_internal_errors = false

# ---------------------------------------------------------------------------
# Request defaults
# ---------------------------------------------------------------------------
[defaults]
# Output size:
#   "full"   - 100% of the source
#   "large"  - 75%
#   "medium" - 50%
#   "small"  - 25%
#   { custom = 60 }            - any percentage, 1-100
#   { max_dimension = 2048 }   - full size, longer edge capped at N pixels
size = "full"

# Optional pixel cap combined with `size`; the smaller result wins.
# max_dimension = 2048

# JPEG quality, 1-100. Full size + quality 100 + no rotation leaves the
# pixels alone.
quality = 100

# Physically rotate pixels according to the EXIF orientation tag, then
# reset the tag to 1.
rotate = true

# ---------------------------------------------------------------------------
# Decoder limits
# ---------------------------------------------------------------------------
[limits]
# Largest edge the decoder may produce. Acts as an extra size cap.
# max_texture_size = 4096

# ---------------------------------------------------------------------------
# Device info used to fill in missing Make/Model tags
# ---------------------------------------------------------------------------
[device]
# make = "Google"
# model = "Pixel 8"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Max parallel workers. Omit for auto (= number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stock() -> toml::Value {
        stock_defaults_value().unwrap()
    }

    #[test]
    fn default_config_is_identity_request() {
        let config = NormalizeConfig::default();
        assert_eq!(config.defaults.size, SizeSpec::Full);
        assert_eq!(config.defaults.quality, 100);
        assert!(config.defaults.rotate);
        assert!(!config.propagate_internal_errors);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[defaults]
size = "medium"
quality = 80
"#;
        let config: NormalizeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.defaults.size, SizeSpec::Medium);
        assert_eq!(config.defaults.quality, 80);
        // Unspecified values should be defaults
        assert!(config.defaults.rotate);
        assert_eq!(config.limits.max_texture_size, None);
    }

    #[test]
    fn parse_size_variants() {
        let config: NormalizeConfig =
            toml::from_str("[defaults]\nsize = { max_dimension = 2048 }").unwrap();
        assert_eq!(config.defaults.size, SizeSpec::MaxDimension(2048));

        let config: NormalizeConfig = toml::from_str("[defaults]\nsize = { custom = 60 }").unwrap();
        assert_eq!(config.defaults.size, SizeSpec::Custom(60));
    }

    // =========================================================================
    // Derived options and requests
    // =========================================================================

    #[test]
    fn normalizer_options_from_config() {
        let config: NormalizeConfig = toml::from_str(
            r#"
propagate_internal_errors = true

[limits]
max_texture_size = 4096

[device]
model = "Pixel 8"
"#,
        )
        .unwrap();

        let options = config.normalizer_options();
        assert!(options.propagate_internal_errors);
        assert_eq!(options.max_texture_size, Some(4096));
        assert_eq!(
            options.device.and_then(|d| d.model).as_deref(),
            Some("Pixel 8")
        );
    }

    #[test]
    fn empty_device_section_is_no_device() {
        assert_eq!(NormalizeConfig::default().normalizer_options().device, None);
    }

    #[test]
    fn default_request_uses_defaults_section() {
        let config: NormalizeConfig = toml::from_str(
            r#"
[defaults]
size = "large"
max_dimension = 1024
quality = 85
rotate = false
"#,
        )
        .unwrap();

        let request = config.default_request("/photos/a.jpg");
        assert_eq!(request.path, PathBuf::from("/photos/a.jpg"));
        assert_eq!(request.size.spec, SizeSpec::Large);
        assert_eq!(request.size.max_dimension, Some(1024));
        assert_eq!(request.quality.value(), 85);
        assert!(!request.rotate);
        assert!(request.location.is_none());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, NormalizeConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
[defaults]
quality = 70

[processing]
max_processes = 2
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.defaults.quality, 70);
        assert_eq!(config.processing.max_processes, Some(2));
        // Unspecified values should be defaults
        assert_eq!(config.defaults.size, SizeSpec::Full);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("quality = 90").unwrap();
        let overlay: toml::Value = toml::from_str("quality = 70").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[defaults]
quality = 100
rotate = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[defaults]\nquality = 60").unwrap();
        let merged = merge_toml(base, overlay);

        let defaults = merged.get("defaults").unwrap();
        assert_eq!(defaults.get("quality").unwrap().as_integer(), Some(60));
        assert_eq!(defaults.get("rotate").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_replaces_string_size_with_table() {
        let overlay: toml::Value =
            toml::from_str("[defaults]\nsize = { custom = 40 }").unwrap();
        let config = resolve_config(stock(), Some(overlay)).unwrap();
        assert_eq!(config.defaults.size, SizeSpec::Custom(40));
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<NormalizeConfig, _> = toml::from_str("verbose = true");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<NormalizeConfig, _> = toml::from_str("[errors]\npropagate = true");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<NormalizeConfig, _> = toml::from_str("[device]\nserial = \"123\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[limits]\nmax_texture = 4096").unwrap();

        assert!(load_config(&path).is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(NormalizeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = NormalizeConfig::default();
        config.defaults.quality = 1;
        assert!(config.validate().is_ok());

        config.defaults.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.defaults.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_custom_percent() {
        let mut config = NormalizeConfig::default();
        config.defaults.size = SizeSpec::Custom(0);
        assert!(config.validate().is_err());
        config.defaults.size = SizeSpec::Custom(150);
        assert!(config.validate().is_err());
        config.defaults.size = SizeSpec::Custom(100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_caps() {
        let mut config = NormalizeConfig::default();
        config.defaults.size = SizeSpec::MaxDimension(0);
        assert!(config.validate().is_err());

        let mut config = NormalizeConfig::default();
        config.defaults.max_dimension = Some(0);
        assert!(config.validate().is_err());

        let mut config = NormalizeConfig::default();
        config.limits.max_texture_size = Some(0);
        assert!(config.validate().is_err());

        let mut config = NormalizeConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[defaults]\nquality = 200").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // stock_config_toml / stock_defaults_value tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: NormalizeConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, NormalizeConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[defaults]", "[limits]", "[device]", "[processing]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock();
        assert!(val.is_table());
        for section in ["defaults", "limits", "device", "processing"] {
            assert!(val.get(section).is_some(), "missing {section}");
        }
        assert_eq!(
            val.get("defaults").unwrap().get("size").unwrap().as_str(),
            Some("full")
        );
    }

    #[test]
    fn resolve_config_with_no_overlay() {
        let config = resolve_config(stock(), None).unwrap();
        assert_eq!(config, NormalizeConfig::default());
    }
}
