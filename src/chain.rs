//! # Step Chain Executor Module
//!
//! Runs a pipeline's steps in order on one file with the keep-if-smaller
//! policy: the first step writes directly to the requested output
//! (applying the resize directive and quality mode), every later step
//! re-codes the current output into its own scratch candidate and only an
//! actually smaller candidate replaces the output (atomic rename). A
//! candidate that loses, and a candidate left behind by a failing step,
//! are both removed before the executor returns, so no scratch file ever
//! outlives the call.
//!
//! A failing step fails the whole chain; the error propagates to the
//! caller, which owns the working output file and treats the file as
//! unsupported.

use crate::backend::{ExecuteStep, StepContext, StepOptions};
use crate::file_manager::FileManager;
use crate::resize::ResizeDirective;
use crate::toolkit::Toolkit;
use anyhow::Result;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Execute `steps` in order from `input` into `output`, returning the size
/// of the smallest result any step produced.
pub async fn run<S: ExecuteStep>(
    steps: &[S],
    toolkit: &Toolkit,
    input: &Path,
    output: &Path,
    resize: Option<&ResizeDirective>,
    options: StepOptions,
) -> Result<u64> {
    let Some((first, rest)) = steps.split_first() else {
        anyhow::bail!("pipeline has no steps");
    };

    // Resizing happens exactly once, in the first step.
    first
        .execute(&StepContext { toolkit, input, output, resize, options })
        .await?;
    let mut current_size = FileManager::file_size(output).await?;
    debug!("{} wrote {} bytes", first.name(), current_size);

    for (index, step) in rest.iter().enumerate() {
        let candidate_path = FileManager::scratch_path(output, &format!("pass{}", index + 2));
        let ctx = StepContext {
            toolkit,
            input: output,
            output: &candidate_path,
            resize: None,
            options,
        };

        let outcome: Result<u64> = async {
            step.execute(&ctx).await?;
            FileManager::file_size(&candidate_path).await
        }
        .await;

        let mut promotion_failure = None;
        if let Ok(candidate_size) = &outcome {
            if *candidate_size < current_size {
                match fs::rename(&candidate_path, output).await {
                    Ok(()) => {
                        debug!(
                            "{} improved {} -> {} bytes",
                            step.name(),
                            current_size,
                            candidate_size
                        );
                        current_size = *candidate_size;
                    }
                    Err(error) => promotion_failure = Some(error),
                }
            } else {
                debug!(
                    "{} produced {} bytes, keeping {} bytes",
                    step.name(),
                    candidate_size,
                    current_size
                );
            }
        }

        // Candidate cleanup runs on every path: discarded, failed, or
        // already renamed away (then it is a no-op).
        FileManager::remove_scratch(&candidate_path).await;
        outcome?;
        if let Some(error) = promotion_failure {
            return Err(error.into());
        }
    }

    Ok(current_size)
}
