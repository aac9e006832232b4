//! Error types for the QR batch job.
//!
//! Every layer of the crate reports failures through its own `thiserror` enum,
//! and the pipeline folds them into [`PipelineError`] with `#[from]` so the `?`
//! operator carries them up to `main` untouched.
//!
//! ## Error Hierarchy
//!
//! - **`ConfigError`**: loading or validating the settings file. Raised once at
//!   startup, before any remote call is made.
//! - **`RecordStoreError`**: anything the remote tracking system reports. The
//!   two typed remote failures are:
//!   - `RemoteQuery`: a selection returned a non-empty error list. Rows that may
//!     have come back alongside the errors are discarded.
//!   - `RemoteUpdate`: a write for a specific record returned errors.
//!
//!   Transport failures (connection refused, TLS, unreadable body) are kept in
//!   a separate `Transport` variant; they are just as fatal.
//! - **`RenderError`**: QR symbol construction, font loading or PNG encoding.
//!   These are not part of the remote taxonomy.
//! - **`PipelineError`**: the union of the above plus record-shape problems
//!   discovered while processing a batch.
//!
//! None of these errors are retried anywhere in the crate.

use thiserror::Error;

/// Convenience alias for results produced by the batch pipeline.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Failures while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML file or an environment override could not be read or parsed.
    #[error("Configuration error: {0}")]
    Load(#[from] figment::Error),

    /// Settings parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Invalid(String),
}

/// Failures reported by, or while talking to, the remote record API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordStoreError {
    /// A read call came back with one or more remote errors.
    #[error("{context}: {}", .errors.join("; "))]
    RemoteQuery {
        /// Which selection failed, e.g. `search on VHMECT_ASSET_ITEM`.
        context: String,
        /// Error list exactly as reported by the remote system.
        errors: Vec<String>,
    },

    /// An update call came back with one or more remote errors.
    #[error(
        "Failed to update fields for {}: {}",
        .record_key.as_deref().unwrap_or("<unknown record>"),
        .errors.join("; ")
    )]
    RemoteUpdate {
        /// Key of the record being updated, when known.
        record_key: Option<String>,
        /// Error list exactly as reported by the remote system.
        errors: Vec<String>,
    },

    /// Connection, TLS or body read failure. No remote error list exists.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The reply was not JSON, or a row lacked the trackor id or key.
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl RecordStoreError {
    /// Remote error list carried by the typed variants, empty otherwise.
    pub fn remote_errors(&self) -> &[String] {
        match self {
            Self::RemoteQuery { errors, .. } | Self::RemoteUpdate { errors, .. } => errors,
            Self::Transport(_) | Self::Decode(_) => &[],
        }
    }
}

impl From<reqwest::Error> for RecordStoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failures while rendering a QR image.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The value does not fit any QR version at the configured EC level.
    #[error("QR symbol error: {0}")]
    Symbol(#[from] qrcode::types::QrError),

    /// PNG encoding failed.
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// The font file is not a usable TrueType/OpenType font.
    #[error("Font error: {0}")]
    Font(String),

    /// A title was given to an encoder built without a font.
    #[error("Caption requested but no font is configured (set render.font_path)")]
    FontNotConfigured,

    /// A colour setting did not parse.
    #[error("Invalid colour '{0}': expected #RRGGBB, #RRGGBBAA or a known name")]
    InvalidColor(String),

    /// Reading the font file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that abort a batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Selection or update failed; passed through unchanged.
    #[error(transparent)]
    Store(#[from] RecordStoreError),

    /// The QR image for one record could not be rendered.
    #[error("Rendering failed for {record_key}: {source}")]
    Render {
        /// Key of the record being rendered
        record_key: String,
        #[source]
        source: RenderError,
    },

    /// A selected record has no text in the value field.
    #[error("Record {record_key} has no value for field '{field}'")]
    MissingField {
        /// Key of the offending record
        record_key: String,
        /// Configured value field
        field: String,
    },
}
