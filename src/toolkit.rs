//! # Toolkit Module
//!
//! Process-wide binary resolution table for the external encoders.
//!
//! The table is built once at startup by scanning the `PATH` search path
//! and is passed down explicitly (never held as ambient global state), so
//! pipelines can be exercised in tests with fake tool availability. A
//! missing binary is recorded as unavailable rather than failing
//! immediately; the hard failure happens per invocation, right before a
//! pipeline would spawn anything, with the complete list of missing tools.
//!
//! Logical tools:
//! - `magick`: general-purpose raster encoder (also conversion/resize)
//! - `svgo`: vector graphics optimizer
//! - `gifsicle`: lossless palette-image packer
//! - `mozjpegtran`: lossless JPEG re-coder, falls back to plain
//!   `jpegtran` and is reported as `mozjpegtran/jpegtran` in errors
//! - `ffmpeg`: video transcoder

use crate::error::OptimizeError;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Logical names of every tool the engine knows how to drive
pub const KNOWN_TOOLS: &[&str] = &["magick", "svgo", "gifsicle", "mozjpegtran", "ffmpeg"];

/// A binary some pipeline run will actually invoke: logical name plus the
/// resolved path, or `None` when the tool is unavailable
#[derive(Debug, Clone)]
pub struct RequiredBinary {
    pub name: String,
    pub path: Option<PathBuf>,
}

/// Read-only table mapping logical tool names to resolved binary paths
#[derive(Debug, Clone, Default)]
pub struct Toolkit {
    paths: HashMap<String, PathBuf>,
}

impl Toolkit {
    /// Resolve every known tool on the search path. Call once per process.
    pub fn resolve() -> Self {
        let mut paths = HashMap::new();
        for &tool in KNOWN_TOOLS {
            let resolved = match tool {
                "mozjpegtran" => {
                    find_in_path("mozjpegtran").or_else(|| find_in_path("jpegtran"))
                }
                _ => find_in_path(tool),
            };
            match resolved {
                Some(path) => {
                    debug!("Resolved {} -> {}", tool, path.display());
                    paths.insert(tool.to_string(), path);
                }
                None => debug!("Tool {} not found on PATH, recorded as unavailable", tool),
            }
        }
        Self { paths }
    }

    /// Build a toolkit from explicit name/path pairs. Used by tests to
    /// inject fake tools without touching the real environment.
    pub fn with_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = (S, PathBuf)>,
        S: Into<String>,
    {
        Self {
            paths: tools.into_iter().map(|(name, path)| (name.into(), path)).collect(),
        }
    }

    /// Resolved path for a logical tool, if it was found
    pub fn lookup(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    /// The name a tool is reported under in errors and binary listings
    pub fn display_name(name: &str) -> &str {
        if name == "mozjpegtran" {
            "mozjpegtran/jpegtran"
        } else {
            name
        }
    }

    /// The `RequiredBinary` record for one logical tool
    pub fn required(&self, name: &str) -> RequiredBinary {
        RequiredBinary {
            name: Self::display_name(name).to_string(),
            path: self.paths.get(name).cloned(),
        }
    }

    /// Fail fast when any binary a pipeline run needs is unavailable,
    /// naming every missing tool in one error.
    pub fn ensure_available(required: &[RequiredBinary]) -> Result<(), OptimizeError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|binary| binary.path.is_none())
            .map(|binary| binary.name.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OptimizeError::MissingBinaries(missing))
        }
    }
}

/// Scan the PATH search path for a tool binary
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let extension = if cfg!(windows) { ".exe" } else { "" };
    let tool_with_ext = format!("{}{}", tool, extension);

    env::var_os("PATH")?
        .to_str()?
        .split(if cfg!(windows) { ';' } else { ':' })
        .map(|dir| Path::new(dir).join(&tool_with_ext))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_tools_are_looked_up_by_name() {
        let toolkit = Toolkit::with_tools([("magick", PathBuf::from("/fake/magick"))]);
        assert_eq!(toolkit.lookup("magick"), Some(Path::new("/fake/magick")));
        assert_eq!(toolkit.lookup("ffmpeg"), None);
    }

    #[test]
    fn missing_binaries_are_reported_together() {
        let toolkit = Toolkit::with_tools([("magick", PathBuf::from("/fake/magick"))]);
        let required = vec![
            toolkit.required("magick"),
            toolkit.required("svgo"),
            toolkit.required("mozjpegtran"),
        ];
        let err = Toolkit::ensure_available(&required).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("svgo"));
        assert!(message.contains("mozjpegtran/jpegtran"));
        assert!(!message.contains("magick,"));
    }

    #[test]
    fn available_set_passes() {
        let toolkit = Toolkit::with_tools([
            ("magick", PathBuf::from("/fake/magick")),
            ("gifsicle", PathBuf::from("/fake/gifsicle")),
        ]);
        let required = vec![toolkit.required("magick"), toolkit.required("gifsicle")];
        assert!(Toolkit::ensure_available(&required).is_ok());
    }
}
