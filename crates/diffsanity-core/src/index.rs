use crate::hasher::Digest;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Distinct digests observed in one tree, each with every relative path that
/// produced it.
///
/// The representative path of a digest is the smallest of its paths, so the
/// index does not depend on traversal order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HashIndex {
    entries: BTreeMap<Digest, BTreeSet<PathBuf>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, digest: Digest, path: impl Into<PathBuf>) {
        self.entries.entry(digest).or_default().insert(path.into());
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.contains_key(digest)
    }

    /// Number of distinct digests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of paths across all digests.
    pub fn file_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn representative(&self, digest: &Digest) -> Option<&Path> {
        self.entries
            .get(digest)
            .and_then(|paths| paths.first())
            .map(PathBuf::as_path)
    }

    pub fn paths(&self, digest: &Digest) -> impl Iterator<Item = &Path> {
        self.entries
            .get(digest)
            .into_iter()
            .flat_map(|paths| paths.iter().map(PathBuf::as_path))
    }

    /// `(digest, representative path)` in digest order.
    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &Path)> {
        self.entries.iter().filter_map(|(digest, paths)| {
            paths.first().map(|path| (digest, path.as_path()))
        })
    }
}
