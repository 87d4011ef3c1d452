//! # JPEG Re-coder Backend
//!
//! Drives `mozjpegtran` (or plain `jpegtran`) as the lossless JPEG
//! refinement pass after the general raster encoder: optimized Huffman
//! tables, metadata dropped. No quality mode, no resize.

use super::{run_tool, StepContext};
use anyhow::Result;

pub(crate) async fn run(ctx: &StepContext<'_>) -> Result<()> {
    let args = vec![
        "-copy".to_string(),
        "none".to_string(),
        "-optimize".to_string(),
        "-outfile".to_string(),
        ctx.output.display().to_string(),
        ctx.input.display().to_string(),
    ];
    run_tool(ctx.toolkit, "mozjpegtran", &args).await
}
