//! CLI Entry Point for trackor-qr
//!
//! Provides command-line interface for:
//! - Running one QR generation batch against the remote tracking system
//! - Rendering a single QR image locally for preview
//! - Checking a settings file without contacting the remote system
//!
//! # Usage
//!
//! Run a batch:
//! ```bash
//! trackor-qr run --config config/trackor_qr.toml
//! ```
//!
//! Preview an image:
//! ```bash
//! trackor-qr render AST-002 --title Laptop --config config/trackor_qr.toml --out ast-002.png
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use trackor_qr::config::{AppConfig, RenderConfig, DEFAULT_CONFIG_PATH};
use trackor_qr::logging::{self, TracingConfig};
use trackor_qr::record_store::HttpSessionFactory;
use trackor_qr::{QrEncoder, QrPipeline};

#[derive(Parser)]
#[command(name = "trackor-qr")]
#[command(about = "Generate QR codes for flagged trackors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every flagged trackor once, then exit
    Run {
        /// Settings file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Render one QR image to a local PNG file
    Render {
        /// Value to encode
        value: String,

        /// Caption title (needs render.font_path)
        #[arg(long)]
        title: Option<String>,

        /// Settings file supplying the [render] section
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output PNG path
        #[arg(long)]
        out: PathBuf,
    },

    /// Load and validate a settings file
    CheckConfig {
        /// Settings file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_batch(&config).await,
        Commands::Render {
            value,
            title,
            config,
            out,
        } => render_preview(&value, title.as_deref(), config.as_deref(), &out),
        Commands::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::load_from(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

async fn run_batch(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let encoder = QrEncoder::from_config(&config.render)?;
    let factory = HttpSessionFactory::new(config.connection.access_parameters())?;
    let pipeline = QrPipeline::new(factory, config.pipeline, encoder);

    match pipeline.run().await {
        Ok(()) => {
            info!("QR code generation finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "QR code generation aborted");
            Err(e.into())
        }
    }
}

fn render_preview(
    value: &str,
    title: Option<&str>,
    config: Option<&Path>,
    out: &Path,
) -> Result<()> {
    logging::init(TracingConfig::default()).map_err(anyhow::Error::msg)?;

    let render = match config {
        Some(path) => load_config(path)?.render,
        None => RenderConfig::default(),
    };
    let png = QrEncoder::from_config(&render)?.encode_png(value, title)?;
    std::fs::write(out, &png).with_context(|| format!("failed to write {}", out.display()))?;

    info!(value, bytes = png.len(), out = %out.display(), "QR image written");
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let pipeline = &config.pipeline;

    println!("Configuration OK: {}", path.display());
    println!("  site:          {}", config.connection.access_parameters().url());
    println!("  trackor type:  {}", pipeline.trackor_type);
    println!("  selection:     {:?}", pipeline.selection);
    println!("  generate flag: {}", pipeline.generate_field);
    println!("  image field:   {}", pipeline.image_field);
    println!("  value field:   {}", pipeline.value_field);
    println!(
        "  title field:   {}",
        pipeline.title_field.as_deref().unwrap_or("(none)")
    );
    Ok(())
}
