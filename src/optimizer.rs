//! # Optimizer Orchestration Module
//!
//! Ties the engine together for one invocation: derive the output path,
//! plan the pipeline, fail fast on missing binaries, run the step chain
//! into a working scratch file, and resolve the outcome ladder:
//!
//! 1. chain failed -> `[unsupported]`, the file contributes nothing and
//!    siblings keep processing
//! 2. no improvement and no conversion -> keep the original untouched
//! 3. dry run -> discard the working file, report what would have happened
//! 4. otherwise promote: atomic rename onto the output path, and when
//!    converting, remove the input afterward
//!
//! Directory runs walk the tree sequentially in a stable sorted order,
//! skip hidden entries, and aggregate per-file totals. Unsupported files
//! never abort a batch; missing binaries and validation errors do,
//! because they are systemic rather than per-file.

use crate::backend::{self, StepOptions};
use crate::chain;
use crate::config::Config;
use crate::error::OptimizeError;
use crate::file_manager::{FileManager, MediaKind};
use crate::json_output::JsonMessage;
use crate::progress::{FileStatus, OptimizationStats, Reporter};
use crate::resize::ResizeDirective;
use crate::toolkit::Toolkit;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Per-invocation byte totals
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationResult {
    pub original_size: u64,
    pub optimized_size: u64,
}

impl OptimizationResult {
    pub fn savings(&self) -> u64 {
        self.original_size.saturating_sub(self.optimized_size)
    }
}

/// Drives pipelines over a file or a directory tree
#[derive(Debug)]
pub struct Optimizer {
    config: Config,
    toolkit: Toolkit,
    resize: Option<ResizeDirective>,
}

impl Optimizer {
    /// Validate the configuration, parse the resize token once, and build
    /// the engine. Validation failures surface here, before any file is
    /// touched.
    pub fn new(toolkit: Toolkit, config: Config) -> Result<Self> {
        config.validate()?;
        let resize = match config.resize.as_deref() {
            Some(token) => ResizeDirective::parse(token)?,
            None => None,
        };
        Ok(Self { config, toolkit, resize })
    }

    /// Optimize a file or every file under a directory
    pub async fn run(&self, input: &Path) -> Result<OptimizationResult> {
        let metadata = fs::metadata(input).await?;
        if metadata.is_dir() {
            self.run_directory(input).await
        } else {
            self.run_single(input).await
        }
    }

    async fn run_single(&self, input: &Path) -> Result<OptimizationResult> {
        let reporter = Reporter::for_file(self.config.silent, self.config.json_output);
        let mut stats = OptimizationStats::default();
        let result = self.optimize_file(input, &reporter, &mut stats).await?;
        if self.config.json_output {
            JsonMessage::complete(&stats).emit();
        }
        Ok(result)
    }

    async fn run_directory(&self, dir: &Path) -> Result<OptimizationResult> {
        let files = collect_files(dir)?;
        debug!("Found {} files under {}", files.len(), dir.display());

        if self.config.json_output {
            JsonMessage::start(dir.to_path_buf(), files.len()).emit();
        }

        let reporter =
            Reporter::for_directory(files.len() as u64, self.config.silent, self.config.json_output);
        let mut stats = OptimizationStats::default();
        let mut total = OptimizationResult::default();

        for file in &files {
            let result = self.optimize_file(file, &reporter, &mut stats).await?;
            total.original_size += result.original_size;
            total.optimized_size += result.optimized_size;
        }

        reporter.finish(&stats);
        Ok(total)
    }

    async fn optimize_file(
        &self,
        input: &Path,
        reporter: &Reporter,
        stats: &mut OptimizationStats,
    ) -> Result<OptimizationResult> {
        let output = FileManager::output_path_for(input, self.config.format.as_deref());
        let converting = output != input;
        let extension = output
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        // Byte budgets are image-only; reject them for video before
        // anything is spawned, as a validation error rather than a
        // per-file "unsupported".
        if MediaKind::from_extension(&extension) == MediaKind::Video {
            let _ = backend::ffmpeg::scale_filter(self.resize.as_ref())?;
        }

        let steps = backend::plan_pipeline(&extension, converting, self.resize.as_ref());
        let required = backend::required_binaries(&steps, &self.toolkit);
        Toolkit::ensure_available(&required)?;

        let work = FileManager::scratch_path(&output, "optimized");
        let options = StepOptions {
            lossy: self.config.lossy,
            keep_audio: self.config.keep_audio,
        };

        let attempt: Result<(u64, u64)> = async {
            let original_size = FileManager::file_size(input).await?;
            let optimized_size = chain::run(
                &steps,
                &self.toolkit,
                input,
                &work,
                self.resize.as_ref(),
                options,
            )
            .await?;
            Ok((original_size, optimized_size))
        }
        .await;

        let (original_size, optimized_size) = match attempt {
            Ok(sizes) => sizes,
            Err(error) => {
                FileManager::remove_scratch(&work).await;
                if matches!(
                    error.downcast_ref::<OptimizeError>(),
                    Some(OptimizeError::MissingBinaries(_) | OptimizeError::Validation(_))
                ) {
                    return Err(error);
                }
                debug!("{}: {:#}", input.display(), error);
                let status = FileStatus::Unsupported;
                reporter.file_done(input, &status, 0, 0);
                stats.record(&status, 0, 0);
                return Ok(OptimizationResult::default());
            }
        };

        if !converting && optimized_size >= original_size {
            FileManager::remove_scratch(&work).await;
            let status = FileStatus::AlreadyOptimized;
            reporter.file_done(input, &status, original_size, original_size);
            stats.record(&status, original_size, original_size);
            return Ok(OptimizationResult {
                original_size,
                optimized_size: original_size,
            });
        }

        if self.config.dry_run {
            FileManager::remove_scratch(&work).await;
        } else {
            if let Err(error) = fs::rename(&work, &output).await {
                FileManager::remove_scratch(&work).await;
                return Err(error.into());
            }
            if converting {
                fs::remove_file(input).await?;
            }
        }

        let status = FileStatus::Optimized {
            percent_change: FileManager::percent_change(optimized_size, original_size),
            converted_to: converting.then(|| output.clone()),
        };
        reporter.file_done(input, &status, original_size, optimized_size);
        stats.record(&status, original_size, optimized_size);
        Ok(OptimizationResult { original_size, optimized_size })
    }
}

/// Every regular file under `dir`, hidden entries skipped, in a stable
/// depth-first sorted order.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|entry| {
        entry.depth() == 0 || !FileManager::is_hidden_name(&entry.file_name().to_string_lossy())
    }) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_resize_token_fails_at_construction() {
        let config = Config {
            resize: Some("invalid".to_string()),
            ..Default::default()
        };
        let err = Optimizer::new(Toolkit::default(), config).unwrap_err();
        assert!(err.to_string().starts_with("Resize must be"));
    }

    #[test]
    fn invalid_format_fails_at_construction() {
        let config = Config {
            format: Some("no/pe".to_string()),
            ..Default::default()
        };
        assert!(Optimizer::new(Toolkit::default(), config).is_err());
    }
}

// Integration tests drive the real engine against fake tools: small shell
// stubs injected through the toolkit, writing outputs of known sizes.
#[cfg(all(test, unix))]
mod integration_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// magick stand-in: fails on *corrupt* inputs, otherwise writes a
    /// fixed-size output keyed on the input name.
    const FAKE_MAGICK: &str = r#"#!/bin/sh
for last in "$@"; do :; done
case "$1" in
  *corrupt*) exit 1 ;;
  *a.bin) head -c 80 /dev/zero > "$last" ;;
  *b.bin) head -c 150 /dev/zero > "$last" ;;
  *) head -c 10 /dev/zero > "$last" ;;
esac
"#;

    /// magick stand-in whose output size tracks the requested scale:
    /// 10 bytes per scale percent.
    const SCALING_MAGICK: &str = r#"#!/bin/sh
for last in "$@"; do :; done
if [ "$2" = "-resize" ]; then pct=${3%\%}; else pct=100; fi
head -c $((pct * 10)) /dev/zero > "$last"
"#;

    /// jpegtran stand-in: always writes 140 bytes to its -outfile arg.
    const FAKE_JPEGTRAN: &str = r#"#!/bin/sh
head -c 140 /dev/zero > "$5"
"#;

    fn install_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn silent_config() -> Config {
        Config { silent: true, ..Default::default() }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn directory_walk_aggregates_and_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let magick = install_tool(tmp.path(), "magick", FAKE_MAGICK);
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        std::fs::write(media.join("a.bin"), vec![1u8; 100]).unwrap();
        std::fs::write(media.join("b.bin"), vec![1u8; 200]).unwrap();
        std::fs::write(media.join("corrupt.bin"), vec![1u8; 50]).unwrap();
        std::fs::write(media.join(".hidden.bin"), vec![1u8; 10]).unwrap();

        let optimizer =
            Optimizer::new(Toolkit::with_tools([("magick", magick)]), silent_config()).unwrap();
        let result = optimizer.run(&media).await.unwrap();

        assert_eq!(result.original_size, 300, "unsupported file contributes zero");
        assert_eq!(result.optimized_size, 230);

        assert_eq!(std::fs::metadata(media.join("a.bin")).unwrap().len(), 80);
        assert_eq!(std::fs::metadata(media.join("b.bin")).unwrap().len(), 150);
        // the unsupported file and the hidden file are untouched
        assert_eq!(std::fs::metadata(media.join("corrupt.bin")).unwrap().len(), 50);
        assert_eq!(std::fs::metadata(media.join(".hidden.bin")).unwrap().len(), 10);

        // cleanup invariant: no scratch file outlives the run
        assert_eq!(
            entries(&media),
            vec![".hidden.bin", "a.bin", "b.bin", "corrupt.bin"]
        );
    }

    #[tokio::test]
    async fn dry_run_leaves_the_filesystem_untouched() {
        let tmp = TempDir::new().unwrap();
        let magick = install_tool(tmp.path(), "magick", FAKE_MAGICK);
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        let original = vec![7u8; 100];
        std::fs::write(media.join("a.bin"), &original).unwrap();

        let config = Config { dry_run: true, ..silent_config() };
        let optimizer = Optimizer::new(Toolkit::with_tools([("magick", magick)]), config).unwrap();
        let result = optimizer.run(&media.join("a.bin")).await.unwrap();

        assert_eq!(result, OptimizationResult { original_size: 100, optimized_size: 80 });
        assert_eq!(std::fs::read(media.join("a.bin")).unwrap(), original);
        assert_eq!(entries(&media), vec!["a.bin"]);
    }

    #[tokio::test]
    async fn no_improvement_keeps_the_original() {
        let tmp = TempDir::new().unwrap();
        let magick = install_tool(tmp.path(), "magick", FAKE_MAGICK);
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        // the fake writes 10 bytes for this name; 10 >= 5, no improvement
        std::fs::write(media.join("small.bin"), vec![7u8; 5]).unwrap();

        let optimizer =
            Optimizer::new(Toolkit::with_tools([("magick", magick)]), silent_config()).unwrap();
        let result = optimizer.run(&media.join("small.bin")).await.unwrap();

        assert_eq!(result, OptimizationResult { original_size: 5, optimized_size: 5 });
        assert_eq!(std::fs::metadata(media.join("small.bin")).unwrap().len(), 5);
        assert_eq!(entries(&media), vec!["small.bin"]);
    }

    #[tokio::test]
    async fn byte_budget_is_resolved_by_the_scale_search() {
        let tmp = TempDir::new().unwrap();
        let magick = install_tool(tmp.path(), "magick", SCALING_MAGICK);
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        std::fs::write(media.join("big.bin"), vec![7u8; 2000]).unwrap();

        let config = Config { resize: Some("450b".to_string()), ..silent_config() };
        let optimizer = Optimizer::new(Toolkit::with_tools([("magick", magick)]), config).unwrap();
        let result = optimizer.run(&media.join("big.bin")).await.unwrap();

        // largest scale with size <= 450 at 10 bytes per percent is 45
        assert_eq!(result, OptimizationResult { original_size: 2000, optimized_size: 450 });
        assert_eq!(std::fs::metadata(media.join("big.bin")).unwrap().len(), 450);
        assert_eq!(entries(&media), vec!["big.bin"], "all probe candidates were swept");
    }

    #[tokio::test]
    async fn conversion_switches_extension_and_removes_the_input() {
        let tmp = TempDir::new().unwrap();
        let magick = install_tool(tmp.path(), "magick", FAKE_MAGICK);
        let jpegtran = install_tool(tmp.path(), "jpegtran", FAKE_JPEGTRAN);
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        std::fs::write(media.join("a.bin"), vec![7u8; 100]).unwrap();

        let config = Config { format: Some("jpeg".to_string()), ..silent_config() };
        let toolkit = Toolkit::with_tools([("magick", magick), ("mozjpegtran", jpegtran)]);
        let optimizer = Optimizer::new(toolkit, config).unwrap();
        let result = optimizer.run(&media.join("a.bin")).await.unwrap();

        // the re-coder pass produced 140 bytes and lost to the 80-byte encode
        assert_eq!(result, OptimizationResult { original_size: 100, optimized_size: 80 });
        assert_eq!(std::fs::metadata(media.join("a.jpeg")).unwrap().len(), 80);
        assert_eq!(entries(&media), vec!["a.jpeg"], "input removed after conversion");
    }

    #[tokio::test]
    async fn missing_binaries_abort_before_touching_files() {
        let tmp = TempDir::new().unwrap();
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        std::fs::write(media.join("a.bin"), vec![7u8; 100]).unwrap();

        let optimizer = Optimizer::new(Toolkit::default(), silent_config()).unwrap();
        let err = optimizer.run(&media.join("a.bin")).await.unwrap_err();

        assert!(err.to_string().contains("magick"));
        assert_eq!(std::fs::metadata(media.join("a.bin")).unwrap().len(), 100);
        assert_eq!(entries(&media), vec!["a.bin"]);
    }

    #[tokio::test]
    async fn video_byte_budget_fails_validation_not_per_file() {
        let tmp = TempDir::new().unwrap();
        let media = tmp.path().join("media");
        std::fs::create_dir(&media).unwrap();
        std::fs::write(media.join("clip.mp4"), vec![7u8; 100]).unwrap();

        let config = Config { resize: Some("100kb".to_string()), ..silent_config() };
        let toolkit = Toolkit::with_tools([("ffmpeg", PathBuf::from("/fake/ffmpeg"))]);
        let optimizer = Optimizer::new(toolkit, config).unwrap();
        let err = optimizer.run(&media.join("clip.mp4")).await.unwrap_err();

        assert!(err.to_string().contains("image-only"));
        assert_eq!(std::fs::metadata(media.join("clip.mp4")).unwrap().len(), 100);
    }
}
