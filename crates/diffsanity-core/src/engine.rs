use crate::config::ScanOptions;
use crate::error::{Error, Result};
use crate::hasher::cache::{self, LoadedManifest, ManifestEntries, ManifestTag};
use crate::hasher::{self, Digest, DigestSource};
use crate::identity::{ExtensionClass, FileIdentity};
use crate::index::HashIndex;
use crate::progress::ProgressReporter;
use crate::reconcile::{self, MissingItem};
use crate::report::Verdict;
use crate::scanner::{self, FileTree, LocalTree, PrimaryKey};
use std::collections::HashSet;
use std::hash::Hasher as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use twox_hash::XxHash64;

#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub files_listed: usize,
    pub files_indexed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub normalized: usize,
    pub decode_fallbacks: usize,
    pub skipped_raw: usize,
    pub skipped_by_sampling: usize,
    pub manifest_bad_lines: usize,
    pub manifest_stale: bool,
    pub manifest_saved: bool,
    pub duration: Duration,
}

/// A file that could not be hashed. The rest of the scan carried on.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub index: HashIndex,
    pub stats: ScanStats,
    pub failures: Vec<FileFailure>,
    /// Only a sample of the tree's files was hashed.
    pub sampled: bool,
}

impl ScanOutcome {
    /// Every listed file made it into the index.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.sampled
    }
}

/// Hashes every file of one tree, reusing digests from the tree's manifest.
pub struct DirectoryHasher<'a> {
    options: &'a ScanOptions,
    sampling: bool,
}

impl<'a> DirectoryHasher<'a> {
    pub fn new(options: &'a ScanOptions) -> Self {
        Self {
            options,
            sampling: options.is_sampled(),
        }
    }

    /// Hash every file regardless of the configured sample rate.
    pub fn without_sampling(mut self) -> Self {
        self.sampling = false;
        self
    }

    pub fn scan(&self, tree: &dyn FileTree, reporter: &dyn ProgressReporter) -> Result<ScanOutcome> {
        let root = tree.root().to_path_buf();
        let start = Instant::now();
        reporter.on_scan_start(&root);
        info!("Scanning {}", root.display());

        let mut stats = ScanStats::default();
        let mut failures: Vec<FileFailure> = Vec::new();

        let listing = tree.list_files()?;
        stats.files_listed = listing.files.len();
        failures.extend(
            listing
                .errors
                .into_iter()
                .map(|(path, error)| FileFailure { path, error }),
        );

        let files = self.select(listing.files, &mut stats);
        reporter.on_listing_complete(&root, files.len());

        let tag = ManifestTag::new(self.options.algorithm, &self.options.rules);
        let loaded = if self.options.use_manifest {
            cache::load(&root, &tag)
        } else {
            LoadedManifest::default()
        };
        stats.manifest_bad_lines = loaded.bad_lines;
        stats.manifest_stale = loaded.stale;

        let mut index = HashIndex::new();
        let mut observed = ManifestEntries::new();
        let mut ambiguous: HashSet<PrimaryKey> = HashSet::new();
        let total = files.len();

        for (done, identity) in files.iter().enumerate() {
            match self.digest_of(tree, identity, &loaded, &mut stats) {
                Ok((key, digest)) => {
                    match observed.get(&key) {
                        Some(previous) if previous != &digest => {
                            debug!(
                                "Files sharing key '{}' have different content, not caching it",
                                key
                            );
                            ambiguous.insert(key);
                        }
                        Some(_) => {}
                        None => {
                            observed.insert(key, digest.clone());
                        }
                    }
                    index.insert(digest, identity.relative_path());
                    stats.files_indexed += 1;
                }
                Err(error) => {
                    warn!(
                        "Could not hash {}: {}",
                        root.join(identity.relative_path()).display(),
                        error
                    );
                    failures.push(FileFailure {
                        path: identity.relative_path().to_path_buf(),
                        error,
                    });
                }
            }
            reporter.on_file_hashed(&root, done + 1, total);
        }

        if self.options.use_manifest && self.options.rewrite_manifest {
            if failures.is_empty() {
                observed.retain(|key, _| !ambiguous.contains(key));
                // Files left out by filters keep their cached digests.
                let filtered = stats.skipped_raw + stats.skipped_by_sampling > 0;
                let to_save = if filtered && !loaded.stale {
                    let mut merged = loaded.entries;
                    merged.extend(observed);
                    merged
                } else {
                    observed
                };
                match cache::save(&root, &tag, &to_save) {
                    Ok(_) => stats.manifest_saved = true,
                    Err(err) => warn!(
                        "Could not write manifest for {}: {}",
                        root.display(),
                        err
                    ),
                }
            } else {
                info!(
                    "Not rewriting manifest for {}: {} files failed",
                    root.display(),
                    failures.len()
                );
            }
        }

        stats.duration = start.elapsed();
        debug!(
            "Scan of {} completed in {:.2}s: {} files, {} distinct, {} cache hits, {} misses, {} decode fallbacks",
            root.display(),
            stats.duration.as_secs_f64(),
            stats.files_indexed,
            index.len(),
            stats.cache_hits,
            stats.cache_misses,
            stats.decode_fallbacks,
        );
        reporter.on_scan_complete(&root, index.len(), stats.duration.as_secs_f64());

        Ok(ScanOutcome {
            root,
            index,
            stats,
            failures,
            sampled: self.sampling,
        })
    }

    fn select(&self, files: Vec<PathBuf>, stats: &mut ScanStats) -> Vec<FileIdentity> {
        files
            .into_iter()
            .filter(|path| !cache::is_manifest_path(path))
            .map(FileIdentity::new)
            .filter(|identity| {
                if self.options.skip_raw_files && identity.class() == ExtensionClass::RawPhoto {
                    stats.skipped_raw += 1;
                    return false;
                }
                if self.sampling && !sampled_in(identity.relative_path(), self.options.sample_rate) {
                    stats.skipped_by_sampling += 1;
                    return false;
                }
                true
            })
            .collect()
    }

    fn digest_of(
        &self,
        tree: &dyn FileTree,
        identity: &FileIdentity,
        loaded: &LoadedManifest,
        stats: &mut ScanStats,
    ) -> Result<(PrimaryKey, Digest)> {
        let key = scanner::primary_key_for(tree, identity)?;

        if let Some(digest) = loaded.entries.get(&key) {
            trace!("Cache hit for {}", identity.relative_path().display());
            stats.cache_hits += 1;
            return Ok((key, digest.clone()));
        }

        let (digest, source) =
            hasher::compute_digest(tree, identity, self.options.algorithm, &self.options.rules)?;
        debug!(
            "Hashed {} ({:?}): {}",
            identity.relative_path().display(),
            source,
            digest
        );
        stats.cache_misses += 1;
        match source {
            DigestSource::Normalized => stats.normalized += 1,
            DigestSource::DecodeFallback => stats.decode_fallbacks += 1,
            DigestSource::Verbatim => {}
        }
        Ok((key, digest))
    }
}

/// Deterministic selection of roughly `rate` of all paths, independent of
/// traversal order.
fn sampled_in(relative: &Path, rate: f64) -> bool {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(relative.to_string_lossy().as_bytes());
    (hasher.finish() as f64 / u64::MAX as f64) < rate
}

#[derive(Debug)]
pub struct Verification {
    pub source: ScanOutcome,
    pub backup: ScanOutcome,
    pub missing: Vec<MissingItem>,
    pub verdict: Verdict,
}

impl Verification {
    /// Source content that was found in the backup, as `(digest, source path)`.
    pub fn present(&self) -> impl Iterator<Item = (&Digest, &Path)> {
        self.source
            .index
            .iter()
            .filter(|(digest, _)| self.backup.index.contains(digest))
    }
}

/// Runs the two-tree verification: scan source, scan backup, reconcile.
pub struct VerifyEngine {
    options: ScanOptions,
}

impl VerifyEngine {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Verify that every distinct piece of content under `source_root`
    /// exists somewhere under `backup_root`.
    pub fn verify(
        &self,
        source_root: &Path,
        backup_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Verification> {
        let source = LocalTree::open_root(source_root, &self.options.ignore_patterns)?;
        let backup = LocalTree::open_root(backup_root, &self.options.ignore_patterns)?;
        self.verify_trees(&source, &backup, reporter)
    }

    pub fn verify_trees(
        &self,
        source: &dyn FileTree,
        backup: &dyn FileTree,
        reporter: &dyn ProgressReporter,
    ) -> Result<Verification> {
        let source_hasher = DirectoryHasher::new(&self.options);
        // Sampling the backup would turn skipped files into false "missing" reports.
        let backup_hasher = DirectoryHasher::new(&self.options).without_sampling();

        let (source_outcome, backup_outcome) = if self.options.parallel_scans {
            rayon::join(
                || source_hasher.scan(source, reporter),
                || backup_hasher.scan(backup, reporter),
            )
        } else {
            let source_outcome = source_hasher.scan(source, reporter);
            (source_outcome, backup_hasher.scan(backup, reporter))
        };
        let (source_outcome, backup_outcome) = (source_outcome?, backup_outcome?);

        let missing = reconcile::missing(&source_outcome.index, &backup_outcome.index);
        let verdict = Verdict::derive(&missing, &source_outcome, &backup_outcome);
        info!(
            "{} distinct source items, {} missing from backup: {:?}",
            source_outcome.index.len(),
            missing.len(),
            verdict
        );

        Ok(Verification {
            source: source_outcome,
            backup: backup_outcome,
            missing,
            verdict,
        })
    }

    /// Hash a single tree, e.g. to warm its manifest. Sampling does not apply.
    pub fn hash_directory(&self, root: &Path, reporter: &dyn ProgressReporter) -> Result<ScanOutcome> {
        let tree = LocalTree::open_root(root, &self.options.ignore_patterns)?;
        DirectoryHasher::new(&self.options)
            .without_sampling()
            .scan(&tree, reporter)
    }
}
