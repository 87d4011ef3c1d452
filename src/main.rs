//! # Chain Media Optimizer - Main Entry Point
//!
//! ## Execution flow:
//! 1. Parse CLI arguments (input path, format, resize, quality flags)
//! 2. Initialize logging (INFO, or DEBUG with --verbose)
//! 3. Validate that the input path exists
//! 4. Resolve the external tool binaries once
//! 5. Build the optimizer and run it over the file or directory
//!
//! ## Example usage:
//! ```bash
//! media-chain photo.jpg
//! media-chain photos/ --resize 50% --lossy
//! media-chain image.png --format webp --dry-run
//! media-chain hero.jpg --resize 100kb
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use chain_media_optimizer::{Config, Optimizer, Toolkit};

#[derive(Parser)]
#[command(name = "media-chain")]
#[command(about = "Optimize images and videos with external encoder pipelines")]
struct Args {
    /// File or directory to optimize
    input: PathBuf,

    /// Convert the output to this format (e.g. jpeg, webp, avif)
    #[arg(short, long)]
    format: Option<String>,

    /// Resize: percentage (50%), byte budget (100kb), width (w960) or height (h480)
    #[arg(short, long)]
    resize: Option<String>,

    /// Run an aggressive lossy pre-pass before the lossless finishing pass
    #[arg(short, long)]
    lossy: bool,

    /// Show what would be optimized without changing any file
    #[arg(short, long)]
    dry_run: bool,

    /// Keep the first audio stream when transcoding video (dropped by default)
    #[arg(long)]
    keep_audio: bool,

    /// Suppress per-file status lines
    #[arg(short, long)]
    silent: bool,

    /// Emit machine-readable JSON events instead of status lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if !args.input.exists() {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            args.input.display()
        ));
    }

    let config = Config {
        format: args.format,
        resize: args.resize,
        lossy: args.lossy,
        dry_run: args.dry_run,
        keep_audio: args.keep_audio,
        silent: args.silent,
        json_output: args.json,
    };

    let optimizer = Optimizer::new(Toolkit::resolve(), config)?;
    optimizer.run(&args.input).await?;

    Ok(())
}
