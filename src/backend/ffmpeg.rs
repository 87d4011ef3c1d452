//! # Video Transcoder Backend
//!
//! Drives `ffmpeg` for every video container the engine handles, plus the
//! conversion/resize duties for video.
//!
//! ## Invocation contract
//! - strips metadata and chapters (`-map_metadata -1 -map_chapters -1`)
//! - strips data and subtitle streams (`-dn -sn`) for smaller web output
//! - keeps the primary video stream (`-map 0:v:0`); audio is dropped by
//!   default (`-an`) and only the first audio stream is kept on request
//! - resize directives translate to a `scale` filter with dimensions
//!   normalized to even numbers, which H.264 requires to encode at all
//! - byte-budget directives are image-only and rejected with a validation
//!   error before anything is spawned
//!
//! Codec parameters are per output extension; aggressive mode picks
//! smaller-file values in a single pass (there is no refinement chain for
//! video).

use super::{run_tool, StepContext};
use crate::error::OptimizeError;
use crate::resize::{Axis, ResizeDirective};
use anyhow::Result;
use std::path::Path;

const MAX_SIZE_IS_IMAGE_ONLY: &str = "Resize max size (e.g. 100kB) is image-only. \
For videos use percentage (50%), width (w960), or height (h480).";

/// Translate a resize directive into an ffmpeg `scale` filter
pub(crate) fn scale_filter(
    resize: Option<&ResizeDirective>,
) -> Result<Option<String>, OptimizeError> {
    match resize {
        None => Ok(None),
        Some(ResizeDirective::MaxSize(_)) => {
            Err(OptimizeError::Validation(MAX_SIZE_IS_IMAGE_ONLY.to_string()))
        }
        Some(ResizeDirective::Percentage(value)) => {
            let ratio = value / 100.0;
            Ok(Some(format!(
                "scale=trunc(iw*{ratio}/2)*2:trunc(ih*{ratio}/2)*2"
            )))
        }
        Some(ResizeDirective::Dimension { axis: Axis::Width, pixels }) => Ok(Some(format!(
            "scale={}:-2:force_original_aspect_ratio=decrease",
            pixels
        ))),
        Some(ResizeDirective::Dimension { axis: Axis::Height, pixels }) => Ok(Some(format!(
            "scale=-2:{}:force_original_aspect_ratio=decrease",
            pixels
        ))),
    }
}

/// Codec and muxing flags for one output extension
fn codec_args(extension: &str, lossy: bool, keep_audio: bool) -> Vec<String> {
    let mut args: Vec<&str> = Vec::new();

    match extension {
        "webm" => {
            args.extend([
                "-c:v",
                "libvpx-vp9",
                "-b:v",
                "0",
                "-crf",
                if lossy { "35" } else { "31" },
                "-row-mt",
                "1",
                "-tile-columns",
                "2",
                "-frame-parallel",
                "1",
                "-deadline",
                "good",
                "-cpu-used",
                if lossy { "2" } else { "1" },
                "-pix_fmt",
                "yuv420p",
            ]);
            if keep_audio {
                args.extend(["-c:a", "libopus", "-b:a", if lossy { "64k" } else { "96k" }]);
            }
        }
        "ogv" => {
            args.extend(["-c:v", "libtheora", "-q:v", if lossy { "4" } else { "6" }]);
            if keep_audio {
                args.extend(["-c:a", "libvorbis", "-q:a", if lossy { "3" } else { "4" }]);
            }
        }
        _ => {
            args.extend([
                "-c:v",
                "libx264",
                "-preset",
                if lossy { "medium" } else { "slow" },
                "-crf",
                if lossy { "28" } else { "23" },
                "-pix_fmt",
                "yuv420p",
            ]);
            if keep_audio {
                args.extend(["-c:a", "aac", "-b:a", if lossy { "96k" } else { "128k" }]);
            }
            if matches!(extension, "mp4" | "m4v" | "mov") {
                // moov atom up front so playback can start while streaming
                args.extend(["-movflags", "+faststart"]);
            }
        }
    }

    args.into_iter().map(|arg| arg.to_string()).collect()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub(crate) async fn run(ctx: &StepContext<'_>) -> Result<()> {
    let extension = extension_of(ctx.output);
    let filter = scale_filter(ctx.resize)?;

    let mut args: Vec<String> = ["-v", "error", "-y", "-i"]
        .into_iter()
        .map(|arg| arg.to_string())
        .collect();
    args.push(ctx.input.display().to_string());
    if let Some(filter) = filter {
        args.push("-vf".to_string());
        args.push(filter);
    }
    args.extend(
        ["-map_metadata", "-1", "-map_chapters", "-1", "-dn", "-sn", "-map", "0:v:0"]
            .into_iter()
            .map(|arg| arg.to_string()),
    );
    if ctx.options.keep_audio {
        args.push("-map".to_string());
        args.push("0:a:0?".to_string());
    } else {
        args.push("-an".to_string());
    }
    args.extend(codec_args(&extension, ctx.options.lossy, ctx.options.keep_audio));
    args.push(ctx.output.display().to_string());

    run_tool(ctx.toolkit, "ffmpeg", &args).await
}
