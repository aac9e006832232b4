//! # trackor_qr
//!
//! Batch job that generates QR codes for records in a remote tracking system.
//! Records ("trackors") carrying a generate flag are selected, a QR image of a
//! configured field value is rendered for each, and the PNG is uploaded back
//! into a file field in the same update that clears the flag.
//!
//! ## Crate Structure
//!
//! - **`config`**: `AppConfig`, loaded once from TOML plus `TRACKOR_QR_*`
//!   environment overrides with `figment`, then validated.
//! - **`encoder`**: `QrEncoder`, which renders a value (optionally captioned)
//!   to a base64 PNG.
//! - **`record_store`**: typed facade over the remote REST API. Sessions are
//!   opened per trackor type through a `SessionFactory`; an in-memory backend
//!   ships alongside the HTTP one for tests and dry runs.
//! - **`pipeline`**: `QrPipeline`, the select / render / update loop.
//! - **`error`**: `thiserror` enums for each layer.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`validation`**: small checks shared by configuration validation.

pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod record_store;
pub mod validation;

pub use config::AppConfig;
pub use encoder::QrEncoder;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::QrPipeline;
