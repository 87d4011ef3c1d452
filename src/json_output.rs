//! # JSON Output Module
//!
//! Structured event output for programmatic callers (`--json`): one JSON
//! object per line on stdout, replacing the human status lines.
//!
//! ## Message types:
//! - `start`: beginning of a directory run
//! - `file_complete`: one processed file with its sizes and outcome
//! - `complete`: final aggregate statistics
//! - `error`: a fatal invocation error

use crate::progress::OptimizationStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One structured event
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start { input: PathBuf, total_files: usize },

    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        original_size: u64,
        optimized_size: u64,
        percent_change: f64,
        status: String,
    },

    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_optimized: usize,
        files_already_optimized: usize,
        files_unsupported: usize,
        original_size: u64,
        optimized_size: u64,
        bytes_saved: u64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl JsonMessage {
    /// Emit this message as one line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input: PathBuf, total_files: usize) -> Self {
        Self::Start { input, total_files }
    }

    pub fn file_complete(
        path: PathBuf,
        original_size: u64,
        optimized_size: u64,
        percent_change: f64,
        status: &str,
    ) -> Self {
        Self::FileComplete {
            path,
            original_size,
            optimized_size,
            percent_change,
            status: status.to_string(),
        }
    }

    pub fn complete(stats: &OptimizationStats) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_optimized: stats.files_optimized,
            files_already_optimized: stats.files_already_optimized,
            files_unsupported: stats.files_unsupported,
            original_size: stats.total_original_size,
            optimized_size: stats.total_optimized_size,
            bytes_saved: stats.bytes_saved(),
        }
    }

    pub fn error(message: String) -> Self {
        Self::Error { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_by_type() {
        let message = JsonMessage::file_complete(PathBuf::from("a.jpg"), 100, 80, -20.0, "optimized");
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"file_complete\""));
        assert!(json.contains("\"status\":\"optimized\""));

        let parsed: JsonMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            JsonMessage::FileComplete { original_size, optimized_size, .. } => {
                assert_eq!(original_size, 100);
                assert_eq!(optimized_size, 80);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
