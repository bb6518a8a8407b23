use colored::*;
use diffsanity_core::ProgressReporter;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// Each scanned root gets its own line: a spinner while the tree is listed,
/// then a bar once the number of files to hash is known.
pub struct CliReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<PathBuf, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn label(root: &Path) -> String {
        root.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string())
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &Path) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message(format!("Listing {}...", Self::label(root)));
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Some(old) = self.bars().insert(root.to_path_buf(), pb) {
            old.finish_and_clear();
        }
    }

    fn on_listing_complete(&self, root: &Path, total_files: usize) {
        if let Some(pb) = self.bars().get(root) {
            pb.set_style(
                ProgressStyle::with_template(
                    "  {spinner:.cyan} {prefix} [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining)",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━╸─")
                .tick_chars(TICK_CHARS),
            );
            pb.set_prefix(Self::label(root));
            pb.set_length(total_files as u64);
            pb.set_position(0);
        }
    }

    fn on_file_hashed(&self, root: &Path, files_done: usize, _total_files: usize) {
        if let Some(pb) = self.bars().get(root) {
            pb.set_position(files_done as u64);
        }
    }

    fn on_scan_complete(&self, root: &Path, distinct_digests: usize, duration_secs: f64) {
        if let Some(pb) = self.bars().remove(root) {
            pb.finish_and_clear();
        }
        let _ = self.multi.println(format!(
            "  {} {}: {} distinct items in {:.2}s",
            "✓".green(),
            root.display(),
            distinct_digests,
            duration_secs
        ));
    }
}
