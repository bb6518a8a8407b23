use std::path::Path;

/// Trait for reporting scan progress.
///
/// Scans of the source and backup trees may run concurrently, so every call
/// names the root it belongs to. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &Path) {}
    fn on_listing_complete(&self, _root: &Path, _total_files: usize) {}
    fn on_file_hashed(&self, _root: &Path, _files_done: usize, _total_files: usize) {}
    fn on_scan_complete(&self, _root: &Path, _distinct_digests: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
