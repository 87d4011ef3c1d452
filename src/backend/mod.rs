//! # Backend Steps Module
//!
//! One backend per external tool, all exposed through a uniform
//! produce-a-file contract so the chain executor can drive any of them
//! interchangeably:
//!
//! | Backend  | Tool                  | Role |
//! |----------|-----------------------|------|
//! | Magick   | `magick`              | raster encoding, conversion, resize |
//! | Svgo     | `svgo`                | SVG optimization |
//! | Gifsicle | `gifsicle`            | lossless GIF refinement |
//! | Jpegtran | `mozjpegtran`/`jpegtran` | lossless JPEG refinement |
//! | Ffmpeg   | `ffmpeg`              | video transcoding, conversion, resize |
//!
//! The catalog maps a normalized output extension to its ordered step
//! list. Unknown extensions fall back to a single format-preserving
//! raster step. When a run needs conversion or a resize and the selected
//! pipeline does not start with the general-purpose backend for that
//! media kind, the catalog prepends it: only `magick` (images) and
//! `ffmpeg` (video) know how to convert and resize.

pub mod ffmpeg;
pub mod gifsicle;
pub mod jpegtran;
pub mod magick;
pub mod svgo;

use crate::error::OptimizeError;
use crate::file_manager::MediaKind;
use crate::resize::ResizeDirective;
use crate::toolkit::{RequiredBinary, Toolkit};
use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// The external tool a pipeline step drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Magick,
    Svgo,
    Gifsicle,
    Jpegtran,
    Ffmpeg,
}

impl Backend {
    /// Logical name the tool is resolved under in the toolkit
    pub fn tool_name(self) -> &'static str {
        match self {
            Backend::Magick => "magick",
            Backend::Svgo => "svgo",
            Backend::Gifsicle => "gifsicle",
            Backend::Jpegtran => "mozjpegtran",
            Backend::Ffmpeg => "ffmpeg",
        }
    }
}

/// One step of a pipeline: a backend plus the output format it targets
#[derive(Debug, Clone)]
pub struct PipelineStep {
    pub backend: Backend,
    pub format: String,
}

impl PipelineStep {
    fn new(backend: Backend, format: &str) -> Self {
        Self { backend, format: format.to_string() }
    }
}

/// Quality-mode flags shared by every step of a chain
#[derive(Debug, Clone, Copy)]
pub struct StepOptions {
    /// Run the aggressive lossy pre-pass where the backend has one
    pub lossy: bool,
    /// Keep the first audio stream when transcoding video
    pub keep_audio: bool,
}

/// Everything a step needs to produce its output file
pub struct StepContext<'a> {
    pub toolkit: &'a Toolkit,
    pub input: &'a Path,
    pub output: &'a Path,
    pub resize: Option<&'a ResizeDirective>,
    pub options: StepOptions,
}

/// The uniform execute contract. The chain executor is generic over this
/// so tests can manufacture steps with known output sizes.
#[allow(async_fn_in_trait)]
pub trait ExecuteStep {
    fn name(&self) -> String;
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()>;
}

impl ExecuteStep for PipelineStep {
    fn name(&self) -> String {
        format!("{}:{}", self.backend.tool_name(), self.format)
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        match self.backend {
            Backend::Magick => magick::run(ctx).await,
            Backend::Svgo => svgo::run(ctx).await,
            Backend::Gifsicle => gifsicle::run(ctx).await,
            Backend::Jpegtran => jpegtran::run(ctx).await,
            Backend::Ffmpeg => ffmpeg::run(ctx).await,
        }
    }
}

/// Ordered step list for a normalized output extension
pub fn select_pipeline(extension: &str) -> Vec<PipelineStep> {
    if MediaKind::from_extension(extension) == MediaKind::Video {
        return vec![PipelineStep::new(Backend::Ffmpeg, extension)];
    }
    match extension {
        "png" => vec![PipelineStep::new(Backend::Magick, "png")],
        "svg" => vec![PipelineStep::new(Backend::Svgo, "svg")],
        "jpg" | "jpeg" => vec![
            PipelineStep::new(Backend::Magick, extension),
            PipelineStep::new(Backend::Jpegtran, extension),
        ],
        "gif" => vec![
            PipelineStep::new(Backend::Magick, "gif"),
            PipelineStep::new(Backend::Gifsicle, "gif"),
        ],
        "webp" | "avif" | "heic" | "heif" | "jxl" => {
            vec![PipelineStep::new(Backend::Magick, extension)]
        }
        other => vec![PipelineStep::new(Backend::Magick, other)],
    }
}

/// Select the pipeline and apply the prepend rule: conversion and resizing
/// are only defined for the general-purpose backend of each media kind.
pub fn plan_pipeline(
    extension: &str,
    converting: bool,
    resize: Option<&ResizeDirective>,
) -> Vec<PipelineStep> {
    let mut steps = select_pipeline(extension);
    if converting || resize.is_some() {
        let general = match MediaKind::from_extension(extension) {
            MediaKind::Image => Backend::Magick,
            MediaKind::Video => Backend::Ffmpeg,
        };
        if steps.first().map(|step| step.backend) != Some(general) {
            steps.insert(0, PipelineStep::new(general, extension));
        }
    }
    steps
}

/// The deduplicated set of binaries `steps` will actually invoke
pub fn required_binaries(steps: &[PipelineStep], toolkit: &Toolkit) -> Vec<RequiredBinary> {
    let mut seen = HashSet::new();
    steps
        .iter()
        .filter(|step| seen.insert(step.backend.tool_name()))
        .map(|step| toolkit.required(step.backend.tool_name()))
        .collect()
}

/// Spawn a resolved tool and wait for it, turning a non-zero exit into a
/// typed error carrying the tool's stderr.
pub(crate) async fn run_tool(toolkit: &Toolkit, tool: &str, args: &[String]) -> Result<()> {
    let display = Toolkit::display_name(tool);
    let binary = toolkit
        .lookup(tool)
        .ok_or_else(|| OptimizeError::MissingBinaries(vec![display.to_string()]))?;

    debug!("Running {} {}", binary.display(), args.join(" "));
    let output = Command::new(binary)
        .args(args)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute {}: {}", display, e))?;

    if !output.status.success() {
        return Err(OptimizeError::Tool {
            tool: display.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn backends(steps: &[PipelineStep]) -> Vec<Backend> {
        steps.iter().map(|s| s.backend).collect()
    }

    #[test]
    fn catalog_maps_extensions_to_step_chains() {
        assert_eq!(backends(&select_pipeline("png")), vec![Backend::Magick]);
        assert_eq!(backends(&select_pipeline("svg")), vec![Backend::Svgo]);
        assert_eq!(
            backends(&select_pipeline("jpeg")),
            vec![Backend::Magick, Backend::Jpegtran]
        );
        assert_eq!(
            backends(&select_pipeline("gif")),
            vec![Backend::Magick, Backend::Gifsicle]
        );
        assert_eq!(backends(&select_pipeline("webp")), vec![Backend::Magick]);
        assert_eq!(backends(&select_pipeline("mp4")), vec![Backend::Ffmpeg]);
        assert_eq!(backends(&select_pipeline("xyz")), vec![Backend::Magick]);
    }

    #[test]
    fn resize_prepends_the_conversion_capable_backend() {
        let resize = ResizeDirective::Percentage(50.0);
        assert_eq!(
            backends(&plan_pipeline("svg", false, Some(&resize))),
            vec![Backend::Magick, Backend::Svgo]
        );
        // already starts with the general backend: unchanged
        assert_eq!(
            backends(&plan_pipeline("jpeg", true, None)),
            vec![Backend::Magick, Backend::Jpegtran]
        );
        assert_eq!(
            backends(&plan_pipeline("webm", false, Some(&resize))),
            vec![Backend::Ffmpeg]
        );
        // no conversion, no resize: no prepend
        assert_eq!(backends(&plan_pipeline("svg", false, None)), vec![Backend::Svgo]);
    }

    #[test]
    fn required_binaries_deduplicate_by_tool() {
        let toolkit = Toolkit::with_tools([("magick", PathBuf::from("/fake/magick"))]);
        let steps = plan_pipeline("jpeg", false, None);
        let required = required_binaries(&steps, &toolkit);
        assert_eq!(required.len(), 2);
        assert_eq!(required[0].name, "magick");
        assert!(required[0].path.is_some());
        assert_eq!(required[1].name, "mozjpegtran/jpegtran");
        assert!(required[1].path.is_none());
    }
}
