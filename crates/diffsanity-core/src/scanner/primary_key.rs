use super::walk::{FileStat, FileTree};
use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::time::SystemTime;

/// Cheap identity of an on-disk file state, used as the manifest cache key.
///
/// Built from filesystem metadata only. A file whose content changes is
/// assumed to change at least one of modification time, name or size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    /// ISO-8601 UTC, whole seconds, e.g. `2024-03-01T12:00:05Z`.
    pub modified: String,
    pub file_name: String,
    /// Size in bytes, decimal.
    pub size: String,
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.modified, self.file_name, self.size)
    }
}

pub fn format_modified(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn primary_key(identity: &FileIdentity, stat: &FileStat) -> PrimaryKey {
    PrimaryKey {
        modified: format_modified(stat.modified),
        file_name: identity.file_name(),
        size: stat.len.to_string(),
    }
}

/// Stat the file and build its key. A file that vanished since it was listed
/// yields `Error::NotFound`.
pub fn primary_key_for(tree: &dyn FileTree, identity: &FileIdentity) -> Result<PrimaryKey> {
    let stat = tree
        .stat(identity.relative_path())
        .map_err(|err| Error::from_io(err, identity.relative_path()))?;
    Ok(primary_key(identity, &stat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::walk::LocalTree;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    #[test]
    fn test_format_truncates_to_seconds() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(format_modified(t), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_key_fields() {
        let identity = FileIdentity::new("one/hello.txt");
        let stat = FileStat {
            modified: UNIX_EPOCH + Duration::from_secs(86_400),
            len: 6,
        };
        let key = primary_key(&identity, &stat);
        assert_eq!(key.modified, "1970-01-02T00:00:00Z");
        assert_eq!(key.file_name, "hello.txt");
        assert_eq!(key.size, "6");
    }

    #[test]
    fn test_key_is_stable_and_distinct() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("hello.txt"), "hello\n").unwrap();
        fs::write(tmp.path().join("sub/shorter.txt"), "short\n").unwrap();
        fs::write(tmp.path().join("sub/a-much-longer-filename.txt"), "long\n").unwrap();

        let tree = LocalTree::open_root(tmp.path(), &[]).unwrap();
        let files = tree.list_files().unwrap().files;

        let first: Vec<PrimaryKey> = files
            .iter()
            .map(|f| primary_key_for(&tree, &FileIdentity::new(f)).unwrap())
            .collect();
        let second: Vec<PrimaryKey> = files
            .iter()
            .map(|f| primary_key_for(&tree, &FileIdentity::new(f)).unwrap())
            .collect();
        assert_eq!(first, second);

        for (i, a) in first.iter().enumerate() {
            for b in first.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_vanished_file_is_not_found() {
        let tmp = tempdir().unwrap();
        let tree = LocalTree::open_root(tmp.path(), &[]).unwrap();
        let identity = FileIdentity::new(Path::new("gone.txt"));
        assert!(matches!(
            primary_key_for(&tree, &identity),
            Err(Error::NotFound(_))
        ));
    }
}
