//! Per-directory manifest of previously computed digests (`filehash.sum`).
//!
//! ```text
//! #! diffsanity-manifest v1 algorithm=md5 normalization=image=pixels-v2+image-0.24,raw=imagepipe-0.5
//! 2024-03-01T12:00:05Z | hello.txt | 6 | b1946ac92492d2347c6235b4d2611184
//! ```
//!
//! The header line records what produced the digests. A manifest without a
//! header, or with a header for another algorithm or normalization, is stale
//! and none of its entries are used.

use super::digest::{Digest, HashAlgorithm};
use crate::error::Result;
use crate::normalize::NormalizationRules;
use crate::scanner::PrimaryKey;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE_NAME: &str = "filehash.sum";
pub const DELIMITER: &str = " | ";

const HEADER_PREFIX: &str = "#! diffsanity-manifest";
const FORMAT_VERSION: &str = "v1";
const TEMP_PREFIX: &str = ".filehash.sum.";

pub type ManifestEntries = BTreeMap<PrimaryKey, Digest>;

/// What produced the digests in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTag {
    pub algorithm: HashAlgorithm,
    pub normalization: String,
}

impl ManifestTag {
    pub fn new(algorithm: HashAlgorithm, rules: &NormalizationRules) -> Self {
        Self {
            algorithm,
            normalization: rules.fingerprint(),
        }
    }

    pub fn header_line(&self) -> String {
        format!(
            "{} {} algorithm={} normalization={}",
            HEADER_PREFIX, FORMAT_VERSION, self.algorithm, self.normalization
        )
    }

    fn matches_header(&self, line: &str) -> bool {
        line.trim_end() == self.header_line()
    }
}

#[derive(Debug, Default)]
pub struct LoadedManifest {
    pub entries: ManifestEntries,
    /// Lines that could not be parsed and were skipped.
    pub bad_lines: usize,
    /// The manifest was produced under a different configuration and was discarded.
    pub stale: bool,
    /// Entry lines dropped because the manifest was stale.
    pub discarded: usize,
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE_NAME)
}

/// Whether a root-relative path is the manifest itself or one of its temporary files.
pub fn is_manifest_path(relative: &Path) -> bool {
    let mut components = relative.components();
    let (Some(Component::Normal(name)), None) = (components.next(), components.next()) else {
        return false;
    };
    let name = name.to_string_lossy();
    name == MANIFEST_FILE_NAME || name.starts_with(TEMP_PREFIX)
}

/// Load the manifest of `dir`. Never fails: a missing or unreadable manifest
/// is an empty cache.
pub fn load(dir: &Path, tag: &ManifestTag) -> LoadedManifest {
    let path = manifest_path(dir);
    match fs::read(&path) {
        Ok(content) => {
            let loaded = parse(&content, tag);
            if loaded.stale {
                warn!(
                    "Manifest {} was written with different hashing settings, recomputing all {} entries",
                    path.display(),
                    loaded.discarded
                );
            } else {
                debug!(
                    "Loaded {} manifest entries from {} ({} bad lines)",
                    loaded.entries.len(),
                    path.display(),
                    loaded.bad_lines
                );
            }
            if loaded.bad_lines > 0 {
                warn!(
                    "Skipped {} malformed lines in {}",
                    loaded.bad_lines,
                    path.display()
                );
            }
            loaded
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("No manifest at {}", path.display());
            LoadedManifest::default()
        }
        Err(err) => {
            warn!(
                "Could not read manifest {}, starting with an empty cache: {}",
                path.display(),
                err
            );
            LoadedManifest::default()
        }
    }
}

pub fn parse(content: &[u8], tag: &ManifestTag) -> LoadedManifest {
    let mut loaded = LoadedManifest::default();
    let mut lines = content
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .peekable();

    let header_ok = matches!(
        lines.peek().map(|line| std::str::from_utf8(line)),
        Some(Ok(first)) if tag.matches_header(first)
    );
    if header_ok {
        lines.next();
    } else if lines.peek().is_some() {
        loaded.stale = true;
        loaded.discarded = lines
            .filter(|line| !line.starts_with(HEADER_PREFIX.as_bytes()))
            .count();
        return loaded;
    }

    for line in lines {
        match std::str::from_utf8(line)
            .ok()
            .and_then(|line| parse_entry(line, tag.algorithm))
        {
            Some((key, digest)) => {
                loaded.entries.insert(key, digest);
            }
            None => loaded.bad_lines += 1,
        }
    }

    loaded
}

fn parse_entry(line: &str, algorithm: HashAlgorithm) -> Option<(PrimaryKey, Digest)> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    let [modified, file_name, size, digest] = fields.as_slice() else {
        return None;
    };
    if modified.is_empty() || file_name.is_empty() || size.parse::<u64>().is_err() {
        return None;
    }
    let digest = Digest::parse(digest, algorithm)?;
    let key = PrimaryKey {
        modified: modified.to_string(),
        file_name: file_name.to_string(),
        size: size.to_string(),
    };
    Some((key, digest))
}

fn render_entry(key: &PrimaryKey, digest: &Digest) -> String {
    [
        key.modified.as_str(),
        key.file_name.as_str(),
        key.size.as_str(),
        digest.as_str(),
    ]
    .join(DELIMITER)
}

/// An entry line is only worth writing if it reads back as the same entry.
fn round_trips(line: &str, key: &PrimaryKey, digest: &Digest, algorithm: HashAlgorithm) -> bool {
    !line.contains(&['\n', '\r'][..])
        && parse_entry(line, algorithm)
            .map_or(false, |(parsed_key, parsed_digest)| {
                &parsed_key == key && &parsed_digest == digest
            })
}

/// Render the manifest text. Entries whose fields cannot survive a round trip
/// are left out; returns the text and the number of entries written.
pub fn render(tag: &ManifestTag, entries: &ManifestEntries) -> (String, usize) {
    let mut out = tag.header_line();
    out.push('\n');
    let mut written = 0;
    for (key, digest) in entries {
        let line = render_entry(key, digest);
        if !round_trips(&line, key, digest, tag.algorithm) {
            debug!("Not caching '{}': name cannot be stored in a manifest", key.file_name);
            continue;
        }
        out.push_str(&line);
        out.push('\n');
        written += 1;
    }
    (out, written)
}

/// Atomically replace the manifest of `dir` with `entries`.
pub fn save(dir: &Path, tag: &ManifestTag, entries: &ManifestEntries) -> Result<usize> {
    let (content, written) = render(tag, entries);

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(manifest_path(dir)).map_err(|e| e.error)?;

    info!(
        "Wrote {} entries to {}",
        written,
        manifest_path(dir).display()
    );
    Ok(written)
}
