use crate::hasher::Digest;
use crate::index::HashIndex;
use std::path::PathBuf;

/// Source content with no counterpart in the backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingItem {
    pub digest: Digest,
    /// Representative source path, relative to the source root.
    pub path: PathBuf,
    /// Every source path with this digest, including `path`.
    pub paths: Vec<PathBuf>,
}

/// Digests present in `source` but absent from `backup`, in digest order.
///
/// Empty exactly when the backup holds every distinct piece of source content.
pub fn missing(source: &HashIndex, backup: &HashIndex) -> Vec<MissingItem> {
    source
        .iter()
        .filter(|(digest, _)| !backup.contains(digest))
        .map(|(digest, path)| MissingItem {
            digest: digest.clone(),
            path: path.to_path_buf(),
            paths: source.paths(digest).map(|p| p.to_path_buf()).collect(),
        })
        .collect()
}
