//! # Vector Optimizer Backend
//!
//! Drives `svgo` for SVG output. The conservative plugin set is safe on
//! any document; aggressive mode adds destructive plugins (path merging,
//! dimension removal, metadata stripping) as a pre-pass, then the
//! conservative set runs again as the finishing pass.

use super::{run_tool, StepContext};
use crate::file_manager::FileManager;
use crate::toolkit::Toolkit;
use anyhow::Result;
use std::path::Path;

const COMMON_PLUGINS: &[&str] = &[
    "cleanupAttrs",
    "cleanupListOfValues",
    "cleanupNumericValues",
    "convertColors",
    "minifyStyles",
    "moveGroupAttrsToElems",
    "removeComments",
    "removeDoctype",
    "removeEditorsNSData",
    "removeEmptyAttrs",
    "removeEmptyContainers",
    "removeEmptyText",
    "removeNonInheritableGroupAttrs",
    "removeXMLProcInst",
    "sortAttrs",
];

const AGGRESSIVE_EXTRA_PLUGINS: &[&str] = &[
    "cleanupEnableBackground",
    "cleanupIDs",
    "collapseGroups",
    "convertPathData",
    "convertShapeToPath",
    "convertTransform",
    "mergePaths",
    "moveElemsAttrsToGroup",
    "removeAttrs",
    "removeDesc",
    "removeDimensions",
    "removeElementsByAttr",
    "removeHiddenElems",
    "removeMetadata",
    "removeRasterImages",
    "removeStyleElement",
    "removeTitle",
    "removeUnknownsAndDefaults",
    "removeUnusedNS",
    "removeUselessDefs",
    "removeUselessStrokeAndFill",
    "removeViewBox",
    "removeXMLNS",
];

fn aggressive_plugins() -> Vec<&'static str> {
    COMMON_PLUGINS
        .iter()
        .chain(AGGRESSIVE_EXTRA_PLUGINS)
        .copied()
        .collect()
}

async fn run_pass(
    toolkit: &Toolkit,
    input: &Path,
    output: &Path,
    plugins: &[&str],
) -> Result<()> {
    let args = vec![
        input.display().to_string(),
        "--config={\"full\":true}".to_string(),
        "--multipass".to_string(),
        format!("--enable={}", plugins.join(",")),
        "--output".to_string(),
        output.display().to_string(),
    ];
    run_tool(toolkit, "svgo", &args).await
}

pub(crate) async fn run(ctx: &StepContext<'_>) -> Result<()> {
    if !ctx.options.lossy {
        return run_pass(ctx.toolkit, ctx.input, ctx.output, COMMON_PLUGINS).await;
    }

    let lossy_path = FileManager::scratch_path(ctx.output, "lossy");
    let outcome: Result<()> = async {
        run_pass(ctx.toolkit, ctx.input, &lossy_path, &aggressive_plugins()).await?;
        run_pass(ctx.toolkit, &lossy_path, ctx.output, COMMON_PLUGINS).await
    }
    .await;
    FileManager::remove_scratch(&lossy_path).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggressive_set_extends_the_common_set() {
        let aggressive = aggressive_plugins();
        for plugin in COMMON_PLUGINS {
            assert!(aggressive.contains(plugin));
        }
        assert!(aggressive.contains(&"removeViewBox"));
        assert!(!COMMON_PLUGINS.contains(&"removeViewBox"));
        assert_eq!(
            aggressive.len(),
            COMMON_PLUGINS.len() + AGGRESSIVE_EXTRA_PLUGINS.len()
        );
    }
}
