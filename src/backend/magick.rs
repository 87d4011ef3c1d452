//! # Raster Encoder Backend
//!
//! Drives ImageMagick for every raster format the engine handles, and for
//! all conversion/resize duties. Flag presets are per output extension,
//! with separate lossy and lossless variants where the format supports an
//! aggressive pre-pass.
//!
//! PNG output goes through the quality-candidate search: the encoder's
//! quality parameter selects the compression strategy, and the smallest of
//! a small preset set wins. Multi-frame (animated) inputs collapse the
//! candidate set to a single conservative level, because re-encoding cost
//! and risk scale with frame count.
//!
//! A byte-budget resize is resolved here by the scale search: the backend
//! renders probe candidates at integer scales and the search keeps the
//! largest one that fits.

use super::{run_tool, StepContext};
use crate::file_manager::FileManager;
use crate::resize::ResizeDirective;
use crate::search::{self, Candidate};
use crate::toolkit::Toolkit;
use anyhow::Result;
use std::path::Path;
use tokio::process::Command;

const PNG_QUALITY_CANDIDATES: &[u32] = &[91, 94, 95, 97];
const PNG_ANIMATED_CANDIDATES: &[u32] = &[90];

/*
 * JPEG presets: the lossy variant favors smaller output via chroma
 * subsampling and a float DCT at quality 80; the lossless variant keeps
 * pixel data intact and only optimizes coding and scan order.
 */
const JPEG_LOSSY_FLAGS: &[&str] = &[
    "-strip",
    "-sampling-factor",
    "4:2:0",
    "-define",
    "jpeg:optimize-coding=true",
    "-define",
    "jpeg:dct-method=float",
    "-quality",
    "80",
    "-interlace",
    "Plane",
];

const JPEG_LOSSLESS_FLAGS: &[&str] = &[
    "-define",
    "jpeg:optimize-coding=true",
    "-interlace",
    "Plane",
];

const PNG_LOSSLESS_FLAGS: &[&str] = &[];
const PNG_LOSSY_FLAGS: &[&str] = &[
    "-strip",
    "-define",
    "png:exclude-chunks=all",
    "-define",
    "png:include-chunks=tRNS,gAMA",
];

/*
 * GIF preset: coalesce frames before layer optimization to maximize delta
 * compression; OptimizePlus is the more aggressive layer optimizer.
 */
const GIF_FLAGS: &[&str] = &["-strip", "-coalesce", "-layers", "OptimizePlus"];

const WEBP_FLAGS: &[&str] = &[
    "-strip",
    "-define",
    "webp:method=6",
    "-define",
    "webp:thread-level=1",
    "-quality",
    "80",
];

const AVIF_FLAGS: &[&str] = &["-strip", "-define", "heic:speed=1", "-quality", "50"];
const HEIC_FLAGS: &[&str] = &["-strip", "-define", "heic:speed=1", "-quality", "75"];
const JXL_FLAGS: &[&str] = &["-strip", "-define", "jxl:effort=9", "-quality", "75"];
const SVG_FLAGS: &[&str] = &["-strip"];
const GENERIC_FLAGS: &[&str] = &["-strip"];

fn flags_for(extension: &str, lossy: bool) -> &'static [&'static str] {
    match extension {
        "jpg" | "jpeg" => {
            if lossy {
                JPEG_LOSSY_FLAGS
            } else {
                JPEG_LOSSLESS_FLAGS
            }
        }
        "png" => {
            if lossy {
                PNG_LOSSY_FLAGS
            } else {
                PNG_LOSSLESS_FLAGS
            }
        }
        "gif" => GIF_FLAGS,
        "webp" => WEBP_FLAGS,
        "avif" => AVIF_FLAGS,
        "heic" | "heif" => HEIC_FLAGS,
        "jxl" => JXL_FLAGS,
        "svg" => SVG_FLAGS,
        _ => GENERIC_FLAGS,
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub(crate) async fn run(ctx: &StepContext<'_>) -> Result<()> {
    if let Some(ResizeDirective::MaxSize(budget)) = ctx.resize {
        return run_max_size(ctx, *budget).await;
    }

    let geometry = ctx.resize.and_then(|directive| directive.magick_geometry());
    if !ctx.options.lossy {
        return run_once(ctx.toolkit, ctx.input, ctx.output, geometry.as_deref(), false).await;
    }

    // Aggressive pre-pass into a scratch file, lossless finishing pass from
    // scratch to output; the scratch never survives this call.
    let lossy_path = FileManager::scratch_path(ctx.output, "lossy");
    let outcome: Result<()> = async {
        run_once(ctx.toolkit, ctx.input, &lossy_path, geometry.as_deref(), true).await?;
        run_once(ctx.toolkit, &lossy_path, ctx.output, None, false).await
    }
    .await;
    FileManager::remove_scratch(&lossy_path).await;
    outcome
}

/// One encoder invocation, input to output. PNG routes through the
/// quality-candidate search instead of a single shot.
async fn run_once(
    toolkit: &Toolkit,
    input: &Path,
    output: &Path,
    geometry: Option<&str>,
    lossy: bool,
) -> Result<()> {
    let extension = extension_of(output);
    if extension == "png" {
        return write_png(toolkit, input, output, geometry, lossy).await;
    }

    let mut args: Vec<String> = vec![input.display().to_string()];
    if let Some(geometry) = geometry {
        args.push("-resize".to_string());
        args.push(geometry.to_string());
    }
    args.extend(flags_for(&extension, lossy).iter().map(|flag| flag.to_string()));
    args.push(output.display().to_string());

    run_tool(toolkit, "magick", &args).await
}

/// Render every PNG quality candidate and keep the smallest
async fn write_png(
    toolkit: &Toolkit,
    input: &Path,
    output: &Path,
    geometry: Option<&str>,
    lossy: bool,
) -> Result<()> {
    let flags = flags_for("png", lossy);
    let levels = if is_animated(toolkit, input).await {
        PNG_ANIMATED_CANDIDATES
    } else {
        PNG_QUALITY_CANDIDATES
    };

    search::pick_smallest(output, levels, |quality| {
        let candidate_path = FileManager::scratch_path(output, &format!("q{}", quality));
        async move {
            let mut args: Vec<String> = vec![input.display().to_string()];
            if let Some(geometry) = geometry {
                args.push("-resize".to_string());
                args.push(geometry.to_string());
            }
            args.extend(flags.iter().map(|flag| flag.to_string()));
            args.push("-quality".to_string());
            args.push(quality.to_string());
            args.push(candidate_path.display().to_string());

            run_tool(toolkit, "magick", &args).await?;
            let size = FileManager::file_size(&candidate_path).await?;
            Ok(Candidate { path: candidate_path, size })
        }
    })
    .await?;
    Ok(())
}

/// Resolve a byte budget by searching over integer scales
async fn run_max_size(ctx: &StepContext<'_>, budget: u64) -> Result<()> {
    let toolkit = ctx.toolkit;
    let input = ctx.input;
    let output = ctx.output;
    let lossy = ctx.options.lossy;

    search::fit_to_budget(output, budget, |scale| {
        let candidate_path = FileManager::scratch_path(output, &format!("scale{}", scale));
        let geometry = if scale == 100 { None } else { Some(format!("{}%", scale)) };
        async move {
            run_once(toolkit, input, &candidate_path, geometry.as_deref(), lossy).await?;
            let size = FileManager::file_size(&candidate_path).await?;
            Ok(Candidate { path: candidate_path, size })
        }
    })
    .await?;
    Ok(())
}

/// Frame count probe via `magick identify`; any failure is treated as a
/// single-frame image so optimization proceeds on the normal path.
async fn is_animated(toolkit: &Toolkit, input: &Path) -> bool {
    let Some(binary) = toolkit.lookup("magick") else {
        return false;
    };
    let result = Command::new(binary)
        .args(["identify", "-format", "%n"])
        .arg(input)
        .output()
        .await;
    match result {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<u64>().ok())
            .map(|frames| frames > 1)
            .unwrap_or(false),
        _ => false,
    }
}
