//! # Error Types Module
//!
//! Typed failure taxonomy for the optimization engine.
//!
//! ## Categories:
//! - `Io`: filesystem errors (stat, rename, cleanup)
//! - `MissingBinaries`: required external tools not found on PATH;
//!   detected before any process is spawned, carries the complete list
//! - `Tool`: an external encoder exited with a non-zero status
//! - `Validation`: bad user input (resize token, format, config values)
//! - `Unsupported`: the file cannot be processed by any step of its chain
//!
//! `MissingBinaries` and `Validation` are fatal for the whole invocation.
//! `Tool` and `Unsupported` are recovered at the single-file boundary so
//! one bad file never aborts a directory batch.

/// Custom error types for media optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required binaries: {}", .0.join(", "))]
    MissingBinaries(Vec<String>),

    #[error("{tool} failed: {stderr}")]
    Tool { tool: String, stderr: String },

    #[error("{0}")]
    Validation(String),

    #[error("Unsupported file: {0}")]
    Unsupported(String),
}
