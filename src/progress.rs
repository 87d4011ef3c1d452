//! # Progress Tracking and Reporting Module
//!
//! Every processed file yields exactly one status line:
//!
//! ```text
//! [unsupported] photos/broken.jpg
//! [optimized]   photos/already-small.png
//! [-42.3%]      photos/hero.jpeg
//! [-12.1%]      photos/logo.png -> photos/logo.webp
//! ```
//!
//! Directory runs additionally get an `indicatif` progress bar (unless
//! silent or in JSON mode) and a final aggregate summary reporting bytes
//! before/after and percent saved when savings are positive.

use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Column width of the status tag, sized to the widest one
const STATUS_COLUMN: usize = "[unsupported]".len();

/// Outcome of one file, rendered as its status line
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// The whole chain failed; the file contributes nothing to totals
    Unsupported,
    /// The output would not be smaller and no conversion was requested
    AlreadyOptimized,
    /// The file was optimized (or would be, on a dry run)
    Optimized {
        percent_change: f64,
        converted_to: Option<PathBuf>,
    },
}

impl FileStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Unsupported => "[unsupported]".to_string(),
            Self::AlreadyOptimized => "[optimized]".to_string(),
            Self::Optimized { percent_change, .. } => format!("[{:.1}%]", percent_change),
        }
    }

    /// The single status line for this file
    pub fn format_line(&self, path: &Path) -> String {
        let padded = format!("{:<width$}", self.label(), width = STATUS_COLUMN);
        match self {
            Self::Optimized { converted_to: Some(output), .. } => {
                format!("{} {} -> {}", padded, path.display(), output.display())
            }
            _ => format!("{} {}", padded, path.display()),
        }
    }

    fn json_tag(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::AlreadyOptimized => "already_optimized",
            Self::Optimized { .. } => "optimized",
        }
    }
}

/// Aggregate counters over one invocation
#[derive(Debug, Default)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_optimized: usize,
    pub files_already_optimized: usize,
    pub files_unsupported: usize,
    pub total_original_size: u64,
    pub total_optimized_size: u64,
}

impl OptimizationStats {
    pub fn record(&mut self, status: &FileStatus, original_size: u64, optimized_size: u64) {
        self.files_processed += 1;
        match status {
            FileStatus::Unsupported => self.files_unsupported += 1,
            FileStatus::AlreadyOptimized => self.files_already_optimized += 1,
            FileStatus::Optimized { .. } => self.files_optimized += 1,
        }
        self.total_original_size += original_size;
        self.total_optimized_size += optimized_size;
    }

    pub fn bytes_saved(&self) -> u64 {
        self.total_original_size.saturating_sub(self.total_optimized_size)
    }

    pub fn format_summary(&self) -> String {
        let base = format!(
            "Processed: {} files | Optimized: {} | Already optimized: {} | Unsupported: {}",
            self.files_processed,
            self.files_optimized,
            self.files_already_optimized,
            self.files_unsupported,
        );
        if self.bytes_saved() > 0 {
            let percent =
                -FileManager::percent_change(self.total_optimized_size, self.total_original_size);
            format!(
                "{} | {} -> {} (saved {:.1}%)",
                base,
                FileManager::format_size(self.total_original_size),
                FileManager::format_size(self.total_optimized_size),
                percent,
            )
        } else {
            base
        }
    }
}

/// Emits per-file status and the final summary for one invocation
pub struct Reporter {
    bar: Option<ProgressBar>,
    silent: bool,
    json: bool,
}

impl Reporter {
    /// Reporter for a directory run with a known file count
    pub fn for_directory(total_files: u64, silent: bool, json: bool) -> Self {
        let bar = (!silent && !json).then(|| {
            let bar = ProgressBar::new(total_files);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { bar, silent, json }
    }

    /// Reporter for a single-file run: status lines only
    pub fn for_file(silent: bool, json: bool) -> Self {
        Self { bar: None, silent, json }
    }

    /// Emit the one status line for a processed file
    pub fn file_done(
        &self,
        path: &Path,
        status: &FileStatus,
        original_size: u64,
        optimized_size: u64,
    ) {
        if self.json {
            JsonMessage::file_complete(
                path.to_path_buf(),
                original_size,
                optimized_size,
                FileManager::percent_change(optimized_size, original_size),
                status.json_tag(),
            )
            .emit();
        } else if !self.silent {
            let line = status.format_line(path);
            match &self.bar {
                Some(bar) => bar.println(line),
                None => println!("{}", line),
            }
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Close out a directory run with the aggregate summary
    pub fn finish(&self, stats: &OptimizationStats) {
        if self.json {
            JsonMessage::complete(stats).emit();
            return;
        }
        let summary = stats.format_summary();
        match &self.bar {
            Some(bar) => bar.finish_with_message(summary),
            None if !self.silent => println!("{}", summary),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_are_padded_to_one_column() {
        let unsupported = FileStatus::Unsupported.format_line(Path::new("a.jpg"));
        let optimized = FileStatus::AlreadyOptimized.format_line(Path::new("a.jpg"));
        let saved = FileStatus::Optimized { percent_change: -42.3, converted_to: None }
            .format_line(Path::new("a.jpg"));

        assert_eq!(unsupported, "[unsupported] a.jpg");
        assert_eq!(optimized, "[optimized]   a.jpg");
        assert_eq!(saved, "[-42.3%]      a.jpg");
        let column = |line: &str| line.find("a.jpg").unwrap();
        assert_eq!(column(&unsupported), column(&optimized));
        assert_eq!(column(&unsupported), column(&saved));
    }

    #[test]
    fn conversion_lines_show_both_paths() {
        let status = FileStatus::Optimized {
            percent_change: -12.1,
            converted_to: Some(PathBuf::from("a.webp")),
        };
        assert_eq!(status.format_line(Path::new("a.png")), "[-12.1%]      a.png -> a.webp");
    }

    #[test]
    fn stats_accumulate_by_outcome() {
        let mut stats = OptimizationStats::default();
        stats.record(
            &FileStatus::Optimized { percent_change: -20.0, converted_to: None },
            100,
            80,
        );
        stats.record(
            &FileStatus::Optimized { percent_change: -25.0, converted_to: None },
            200,
            150,
        );
        stats.record(&FileStatus::Unsupported, 0, 0);
        stats.record(&FileStatus::AlreadyOptimized, 50, 50);

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.files_optimized, 2);
        assert_eq!(stats.files_unsupported, 1);
        assert_eq!(stats.files_already_optimized, 1);
        assert_eq!(stats.total_original_size, 350);
        assert_eq!(stats.total_optimized_size, 280);
        assert_eq!(stats.bytes_saved(), 70);
        assert!(stats.format_summary().contains("saved 20.0%"));
    }

    #[test]
    fn summary_omits_savings_when_nothing_was_saved() {
        let mut stats = OptimizationStats::default();
        stats.record(&FileStatus::AlreadyOptimized, 50, 50);
        assert!(!stats.format_summary().contains("saved"));
    }
}
