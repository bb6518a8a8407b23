pub mod cache;
mod digest;

pub use digest::{hash_bytes, hash_reader, ContentHasher, Digest, HashAlgorithm, CHUNK_SIZE};

use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use crate::normalize::NormalizationRules;
use crate::scanner::FileTree;
use std::io::Read;

/// How a freshly computed digest was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestSource {
    /// Streamed verbatim; no strategy applies to the file's class.
    Verbatim,
    /// Hashed over the normalized byte stream.
    Normalized,
    /// A strategy applies but decoding failed; hashed the verbatim bytes.
    DecodeFallback,
}

/// Compute the digest of one file: normalize when a strategy applies,
/// otherwise stream the file through the hasher in fixed-size chunks.
///
/// The file handle is dropped before returning on every path.
pub fn compute_digest(
    tree: &dyn FileTree,
    identity: &FileIdentity,
    algorithm: HashAlgorithm,
    rules: &NormalizationRules,
) -> Result<(Digest, DigestSource)> {
    let path = identity.relative_path();
    let open_err = |err| Error::from_io(err, path);

    if rules.strategy_for(identity.class()).is_none() {
        let reader = tree.open(path).map_err(open_err)?;
        let digest = hash_reader(algorithm, reader).map_err(open_err)?;
        return Ok((digest, DigestSource::Verbatim));
    }

    let mut data = Vec::new();
    tree.open(path)
        .and_then(|mut reader| reader.read_to_end(&mut data))
        .map_err(open_err)?;

    Ok(match rules.normalize_bytes(identity, &data) {
        Some(normalized) => (hash_bytes(algorithm, &normalized), DigestSource::Normalized),
        None => (hash_bytes(algorithm, &data), DigestSource::DecodeFallback),
    })
}
