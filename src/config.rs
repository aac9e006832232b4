//! Configuration loading using Figment
//!
//! Settings are read once at startup from:
//! 1. a TOML file (`config/trackor_qr.toml` unless another path is given)
//! 2. environment variables prefixed with `TRACKOR_QR_`, nested with `__`
//!
//! Connection credentials and the pipeline's record type and field names have
//! no defaults: a file that omits any of them is rejected at load time rather
//! than silently falling back to the asset preset. Rendering and logging
//! settings have defaults.
//!
//! # Example
//! ```no_run
//! use trackor_qr::config::AppConfig;
//!
//! let config = AppConfig::load_from("config/asset_qr.toml")?;
//! config.validate()?;
//! println!("Record type: {}", config.pipeline.trackor_type);
//! # Ok::<(), trackor_qr::error::ConfigError>(())
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::encoder::color::parse_color;
use crate::error::ConfigError;
use crate::record_store::AccessParameters;
use crate::validation::{is_in_range, is_not_empty, is_valid_field_name};

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/trackor_qr.toml";

/// Prefix for environment overrides, e.g. `TRACKOR_QR_CONNECTION__SECRET_KEY`.
pub const ENV_PREFIX: &str = "TRACKOR_QR_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Remote tracking system credentials
    pub connection: ConnectionConfig,
    /// QR rendering settings
    #[serde(default)]
    pub render: RenderConfig,
    /// Record type and field names the batch works on
    pub pipeline: PipelineConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Credentials for the remote tracking system.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Site URL, with or without `http://`/`https://`
    pub url: String,
    /// API access key
    pub access_key: String,
    /// API secret key
    pub secret_key: String,
}

// Keeps the secret out of `{:?}` output in logs.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

impl ConnectionConfig {
    /// Normalized access parameters for opening sessions.
    pub fn access_parameters(&self) -> AccessParameters {
        AccessParameters::new(&self.url, &self.access_key, &self.secret_key)
    }
}

/// QR rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Module colour (`#RRGGBB`, `#RRGGBBAA` or a named colour)
    #[serde(default = "default_fill_color")]
    pub fill_color: String,
    /// Background colour; `transparent` for an alpha background
    #[serde(default = "default_back_color")]
    pub back_color: String,
    /// Caption colour for the title band
    #[serde(default = "default_title_color")]
    pub title_color: String,
    /// Pixels per QR module
    #[serde(default = "default_box_size")]
    pub box_size: u32,
    /// Quiet zone width in modules
    #[serde(default = "default_border")]
    pub border: u32,
    /// TrueType/OpenType font used for captions
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Caption font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fill_color: default_fill_color(),
            back_color: default_back_color(),
            title_color: default_title_color(),
            box_size: default_box_size(),
            border: default_border(),
            font_path: None,
            font_size: default_font_size(),
        }
    }
}

/// How flagged records are selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Server-side `equal(FLAG, 1)` search expression
    #[default]
    Search,
    /// Exact-match filter `{FLAG: "1"}`
    Filter,
}

/// Record type and field names that parameterize the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Trackor type to bind the session to
    pub trackor_type: String,
    /// Flag field; `1` marks a record for generation
    pub generate_field: String,
    /// File-valued field that receives the PNG
    pub image_field: String,
    /// Field whose value is encoded in the symbol
    pub value_field: String,
    /// Optional caption field rendered above the symbol
    #[serde(default)]
    pub title_field: Option<String>,
    /// Selection strategy
    #[serde(default)]
    pub selection: SelectionMode,
}

impl PipelineConfig {
    /// The fixed asset-item flow: encode the trackor key, no caption.
    pub fn asset_qr() -> Self {
        Self {
            trackor_type: "VHMECT_ASSET_ITEM".to_string(),
            generate_field: "VHMECT_ECAI_GENERATE_QR_CODE".to_string(),
            image_field: "VHMECT_ECAI_ASSET_QR_CODE".to_string(),
            value_field: crate::record_store::TRACKOR_KEY.to_string(),
            title_field: None,
            selection: SelectionMode::Filter,
        }
    }

    /// Fields to project when selecting, without duplicates.
    pub fn projected_fields(&self) -> Vec<String> {
        let mut fields = vec![crate::record_store::TRACKOR_KEY.to_string()];
        for name in std::iter::once(&self.value_field).chain(self.title_field.iter()) {
            if !fields.contains(name) {
                fields.push(name.clone());
            }
        }
        fields
    }
}

// Default value functions
fn default_name() -> String {
    "trackor-qr".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_fill_color() -> String {
    "#152B42".to_string()
}

fn default_back_color() -> String {
    "transparent".to_string()
}

fn default_title_color() -> String {
    "#D9822B".to_string()
}

fn default_box_size() -> u32 {
    10
}

fn default_border() -> u32 {
    1
}

fn default_font_size() -> f32 {
    24.0
}

impl AppConfig {
    /// Load configuration from the default path and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables override file values, e.g.
    /// `TRACKOR_QR_CONNECTION__SECRET_KEY=...`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Load from a TOML string (no environment overrides)
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(Figment::new().merge(Toml::string(toml)).extract()?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |what: &str, reason: &str| ConfigError::Invalid(format!("{what}: {reason}"));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }
        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        is_not_empty(&self.connection.url).map_err(|e| invalid("connection.url", e))?;
        is_not_empty(&self.connection.access_key)
            .map_err(|e| invalid("connection.access_key", e))?;
        is_not_empty(&self.connection.secret_key)
            .map_err(|e| invalid("connection.secret_key", e))?;
        if self.connection.access_parameters().url().is_empty() {
            return Err(invalid("connection.url", "no host after the scheme"));
        }

        for (what, color) in [
            ("render.fill_color", &self.render.fill_color),
            ("render.back_color", &self.render.back_color),
            ("render.title_color", &self.render.title_color),
        ] {
            parse_color(color).map_err(|e| ConfigError::Invalid(format!("{what}: {e}")))?;
        }
        is_in_range(self.render.box_size, 1..=64).map_err(|e| invalid("render.box_size", e))?;
        is_in_range(self.render.border, 0..=16).map_err(|e| invalid("render.border", e))?;
        if !(self.render.font_size.is_finite() && self.render.font_size > 0.0) {
            return Err(invalid("render.font_size", "must be positive and finite"));
        }

        let pipeline = &self.pipeline;
        for (what, name) in [
            ("pipeline.trackor_type", &pipeline.trackor_type),
            ("pipeline.generate_field", &pipeline.generate_field),
            ("pipeline.image_field", &pipeline.image_field),
            ("pipeline.value_field", &pipeline.value_field),
        ] {
            is_valid_field_name(name).map_err(|e| invalid(what, e))?;
        }
        if let Some(title) = &pipeline.title_field {
            is_valid_field_name(title).map_err(|e| invalid("pipeline.title_field", e))?;
            if self.render.font_path.is_none() {
                return Err(invalid(
                    "render.font_path",
                    "required when pipeline.title_field is set",
                ));
            }
        }
        if pipeline.generate_field == pipeline.image_field {
            return Err(invalid(
                "pipeline.image_field",
                "must differ from pipeline.generate_field",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [connection]
        url = "https://example.onevizion.com"
        access_key = "key"
        secret_key = "secret"

        [pipeline]
        trackor_type = "VHMECT_ASSET_ITEM"
        generate_field = "VHMECT_ECAI_GENERATE_QR_CODE"
        image_field = "VHMECT_ECAI_ASSET_QR_CODE"
        value_field = "TRACKOR_KEY"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.render.fill_color, "#152B42");
        assert_eq!(config.render.back_color, "transparent");
        assert_eq!(config.render.box_size, 10);
        assert_eq!(config.render.border, 1);
        assert_eq!(config.pipeline.selection, SelectionMode::Search);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_pipeline_section_is_rejected() {
        let toml = r#"
            [connection]
            url = "example.com"
            access_key = "key"
            secret_key = "secret"
        "#;
        assert!(matches!(
            AppConfig::from_toml_str(toml),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let toml = MINIMAL.replace("image_field = \"VHMECT_ECAI_ASSET_QR_CODE\"", "");
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("image_field"), "{err}");
    }

    #[test]
    fn test_title_without_font_is_invalid() {
        let toml = format!("{MINIMAL}\ntitle_field = \"ASSET_NAME\"\n");
        let config = AppConfig::from_toml_str(&toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("font_path"));
    }

    #[test]
    fn test_blank_secret_is_invalid() {
        let toml = MINIMAL.replace("\"secret\"", "\"  \"");
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_color_is_invalid() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.render.fill_color = "#12345".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("render.fill_color"));
    }

    #[test]
    fn test_unknown_log_level_is_invalid() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_projected_fields_are_deduplicated() {
        let asset = PipelineConfig::asset_qr();
        assert_eq!(asset.projected_fields(), vec!["TRACKOR_KEY".to_string()]);

        let titled = PipelineConfig {
            value_field: "SERIAL".into(),
            title_field: Some("NAME".into()),
            ..PipelineConfig::asset_qr()
        };
        assert_eq!(
            titled.projected_fields(),
            vec!["TRACKOR_KEY".to_string(), "SERIAL".into(), "NAME".into()]
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        let printed = format!("{:?}", config.connection);
        assert!(!printed.contains("secret\""));
        assert!(printed.contains("***"));
    }
}
