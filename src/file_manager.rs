//! # File Management Module
//!
//! File-level plumbing shared by the whole engine.
//!
//! ## Responsibilities:
//! - Media kind detection (image vs video) from the file extension
//! - Output path derivation for format conversion, with extension
//!   normalization (`jpg` -> `jpeg`, `tif` -> `tiff`)
//! - Scratch/candidate path derivation: a purpose suffix is inserted
//!   before the preserved extension so format-sensitive tools behave
//!   correctly on intermediates (`photo.optimized.q94.png`)
//! - Size lookup and human-readable formatting
//! - Warn-only scratch removal ("already absent" is not an error)
//!
//! Scratch names are derived deterministically from the final output path,
//! which namespaces concurrent runs against different files without locks.

use anyhow::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "avi", "ogv"];

/// Media kind, decided by the output extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a normalized (lower-case) extension. Anything that is not
    /// a known video container is treated as an image, so unknown
    /// extensions flow into the generic raster fallback pipeline.
    pub fn from_extension(extension: &str) -> Self {
        if VIDEO_EXTENSIONS.contains(&extension) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// Manages file operations and naming conventions
pub struct FileManager;

impl FileManager {
    /// Classify a path by its extension
    pub fn media_kind(path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        MediaKind::from_extension(&ext)
    }

    /// Hidden entries (leading dot) are skipped by the directory walker
    pub fn is_hidden_name(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Normalize a target format token: trim, strip a leading dot,
    /// lower-case, and fold extension aliases. Empty input means no
    /// conversion was requested.
    pub fn normalize_format(format: &str) -> Option<String> {
        let normalized = format.trim().trim_start_matches('.').to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Some(match normalized.as_str() {
            "jpg" => "jpeg".to_string(),
            "tif" => "tiff".to_string(),
            _ => normalized,
        })
    }

    /// Output path for an input file and an optional target format.
    /// Without a format the file is optimized in place.
    pub fn output_path_for(input: &Path, format: Option<&str>) -> PathBuf {
        let Some(normalized) = format.and_then(Self::normalize_format) else {
            return input.to_path_buf();
        };
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(format!("{}.{}", stem, normalized))
    }

    /// Derive a scratch path from `path` by inserting a purpose tag before
    /// the extension: `photo.jpeg` + `scale37` -> `photo.scale37.jpeg`.
    pub fn scratch_path(path: &Path, tag: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, tag, ext.to_string_lossy()),
            None => format!("{}.{}", stem, tag),
        };
        path.with_file_name(name)
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Remove a scratch/candidate file. A missing file is fine (it was
    /// already promoted or never written); any other failure is logged as
    /// a warning and never masks the primary result.
    pub async fn remove_scratch(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up scratch file {}: {}", path.display(), e),
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    /// Signed percent change from `original` to `optimized`; negative when
    /// the file shrank
    pub fn percent_change(optimized: u64, original: u64) -> f64 {
        if original == 0 {
            0.0
        } else {
            ((optimized as f64 - original as f64) / original as f64) * 100.0
        }
    }
}
