//! # Configuration Management Module
//!
//! Invocation options for the optimization engine.
//!
//! ## Parameters:
//! - `format`: target output format for conversion (None = keep format)
//! - `resize`: raw resize token, parsed once at engine construction
//! - `lossy`: run the aggressive lossy pre-pass where formats support it
//! - `dry_run`: report what would change without touching any file
//! - `keep_audio`: keep the first audio stream when transcoding video
//! - `silent`: suppress per-file status lines
//! - `json_output`: emit structured JSON events instead of status lines
//!
//! The struct round-trips through JSON (`from_file`/`save_to_file`) so
//! callers embedding the engine can persist a configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::OptimizeError;
use crate::file_manager::FileManager;

/// Configuration for media optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target output format (e.g. "jpeg", "webp"); None keeps the format
    pub format: Option<String>,
    /// Resize token: percentage (50%), byte budget (100kb), width (w960)
    /// or height (h480)
    pub resize: Option<String>,
    /// Aggressive lossy pre-pass
    pub lossy: bool,
    /// Don't actually replace or write any output file
    pub dry_run: bool,
    /// Keep the first audio stream when transcoding video
    pub keep_audio: bool,
    /// Suppress per-file status lines
    pub silent: bool,
    /// Emit JSON events instead of status lines
    pub json_output: bool,
}

impl Config {
    /// Validate configuration parameters. The resize token has its own
    /// parser and is validated where it is parsed.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref format) = self.format {
            let Some(normalized) = FileManager::normalize_format(format) else {
                return Err(OptimizeError::Validation(
                    "Format must not be empty (e.g. jpeg, webp, avif)".to_string(),
                )
                .into());
            };
            if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(OptimizeError::Validation(format!(
                    "'{}' is not a valid output format (e.g. jpeg, webp, avif)",
                    format
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
