//! # GIF Packer Backend
//!
//! Drives `gifsicle` as the GIF refinement pass. `-O3` alone is lossless;
//! aggressive mode runs a `--lossy=80` pre-pass into a scratch file and
//! then re-packs it losslessly.

use super::{run_tool, StepContext};
use crate::file_manager::FileManager;
use crate::toolkit::Toolkit;
use anyhow::Result;
use std::path::Path;

async fn run_pass(toolkit: &Toolkit, input: &Path, output: &Path, lossy: bool) -> Result<()> {
    let mut args = vec!["-O3".to_string()];
    if lossy {
        args.push("--lossy=80".to_string());
    }
    args.push(input.display().to_string());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    run_tool(toolkit, "gifsicle", &args).await
}

pub(crate) async fn run(ctx: &StepContext<'_>) -> Result<()> {
    if !ctx.options.lossy {
        return run_pass(ctx.toolkit, ctx.input, ctx.output, false).await;
    }

    let lossy_path = FileManager::scratch_path(ctx.output, "lossy");
    let outcome: Result<()> = async {
        run_pass(ctx.toolkit, ctx.input, &lossy_path, true).await?;
        run_pass(ctx.toolkit, &lossy_path, ctx.output, false).await
    }
    .await;
    FileManager::remove_scratch(&lossy_path).await;
    outcome
}
