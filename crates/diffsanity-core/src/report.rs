use crate::engine::ScanOutcome;
use crate::error::{Error, Result};
use crate::reconcile::MissingItem;
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Overall result of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every distinct piece of source content was found in the backup.
    AllPresent,
    /// At least one piece of source content is absent from the backup.
    Missing,
    /// Nothing was found missing, but not every source file was checked
    /// (per-file failures or sampling), or the backup scan was partial.
    Incomplete,
}

impl Verdict {
    pub fn derive(missing: &[MissingItem], source: &ScanOutcome, backup: &ScanOutcome) -> Self {
        if !missing.is_empty() {
            Verdict::Missing
        } else if !source.is_complete() || !backup.failures.is_empty() {
            Verdict::Incomplete
        } else {
            Verdict::AllPresent
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Verdict::AllPresent => 0,
            Verdict::Missing => 1,
            Verdict::Incomplete => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Verdict::AllPresent
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::AllPresent => "all present",
            Verdict::Missing => "missing content",
            Verdict::Incomplete => "incomplete",
        };
        f.write_str(text)
    }
}

/// One line summarising the verdict for humans.
pub fn summary_line(verdict: Verdict, missing: usize) -> String {
    match verdict {
        Verdict::AllPresent => "All content is present in the backup.".to_string(),
        Verdict::Missing => format!(
            "{} item{} missing from the backup.",
            missing,
            if missing == 1 { " is" } else { "s are" }
        ),
        Verdict::Incomplete => {
            "No missing content found, but not every file could be verified.".to_string()
        }
    }
}

/// Report line for source content that the backup holds. `path` is relative
/// to the source root.
pub fn found_line(path: &Path) -> String {
    format!("Found {}", path.display())
}

/// Report line for source content the backup lacks, naming the
/// source-relative representative path.
pub fn missing_line(item: &MissingItem) -> String {
    format!("Missing {} with hash {}", item.path.display(), item.digest)
}

/// Write the absolute source path of every missing item, one per line.
/// A relative `source_root` is resolved against the working directory.
///
/// The file is replaced atomically, so a reader never sees a partial list.
pub fn write_missing_list(path: &Path, source_root: &Path, missing: &[MissingItem]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let source_root =
        std::path::absolute(source_root).map_err(|e| Error::from_io(e, source_root))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::from_io(e, dir))?;
    for item in missing {
        writeln!(tmp, "{}", source_root.join(&item.path).display())?;
    }
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::from_io(e.error, path))?;

    info!("Wrote {} missing paths to {}", missing.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FileFailure, ScanStats};
    use crate::hasher::{hash_bytes, HashAlgorithm};
    use crate::index::HashIndex;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn outcome(failures: usize, sampled: bool) -> ScanOutcome {
        ScanOutcome {
            root: PathBuf::from("/tree"),
            index: HashIndex::new(),
            stats: ScanStats::default(),
            failures: (0..failures)
                .map(|i| FileFailure {
                    path: PathBuf::from(format!("gone_{}.txt", i)),
                    error: Error::NotFound(PathBuf::from(format!("gone_{}.txt", i))),
                })
                .collect(),
            sampled,
        }
    }

    fn item(name: &str) -> MissingItem {
        MissingItem {
            digest: hash_bytes(HashAlgorithm::Md5, name.as_bytes()),
            path: PathBuf::from(name),
            paths: vec![PathBuf::from(name)],
        }
    }

    #[test]
    fn test_verdict_derivation() {
        let clean = outcome(0, false);
        assert_eq!(Verdict::derive(&[], &clean, &clean), Verdict::AllPresent);
        assert_eq!(
            Verdict::derive(&[item("a.txt")], &clean, &clean),
            Verdict::Missing
        );
        assert_eq!(
            Verdict::derive(&[], &outcome(1, false), &clean),
            Verdict::Incomplete
        );
        assert_eq!(
            Verdict::derive(&[], &outcome(0, true), &clean),
            Verdict::Incomplete
        );
        assert_eq!(
            Verdict::derive(&[], &clean, &outcome(2, false)),
            Verdict::Incomplete
        );
        // Missing content outranks an incomplete scan.
        assert_eq!(
            Verdict::derive(&[item("a.txt")], &outcome(1, true), &clean),
            Verdict::Missing
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Verdict::AllPresent.exit_code(), 0);
        assert_eq!(Verdict::Missing.exit_code(), 1);
        assert_eq!(Verdict::Incomplete.exit_code(), 3);
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            summary_line(Verdict::AllPresent, 0),
            "All content is present in the backup."
        );
        assert_eq!(
            summary_line(Verdict::Missing, 1),
            "1 item is missing from the backup."
        );
        assert_eq!(
            summary_line(Verdict::Missing, 3),
            "3 items are missing from the backup."
        );
    }

    #[test]
    fn test_report_lines_use_source_relative_paths() {
        assert_eq!(
            found_line(Path::new("sub/hello.txt")),
            "Found sub/hello.txt"
        );
        let missing = item("src-only.txt");
        assert_eq!(
            missing_line(&missing),
            format!("Missing src-only.txt with hash {}", missing.digest)
        );
    }

    #[test]
    fn test_write_missing_list() {
        let tmp = tempdir().unwrap();
        let list = tmp.path().join("missing.txt");
        let source_root = Path::new("/photos");

        write_missing_list(&list, source_root, &[item("a.jpg"), item("sub/b.txt")]).unwrap();

        let content = fs::read_to_string(&list).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                Path::new("/photos").join("a.jpg").display().to_string(),
                Path::new("/photos").join("sub/b.txt").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_list_paths_are_absolute_for_relative_root() {
        let tmp = tempdir().unwrap();
        let list = tmp.path().join("missing.txt");

        write_missing_list(&list, Path::new("photos"), &[item("src-only.txt")]).unwrap();

        let content = fs::read_to_string(&list).unwrap();
        let line = content.lines().next().unwrap();
        assert!(Path::new(line).is_absolute(), "{}", line);
        let expected = std::env::current_dir()
            .unwrap()
            .join("photos")
            .join("src-only.txt");
        assert_eq!(line, expected.display().to_string());
    }

    #[test]
    fn test_write_empty_missing_list() {
        let tmp = tempdir().unwrap();
        let list = tmp.path().join("missing.txt");
        write_missing_list(&list, tmp.path(), &[]).unwrap();
        assert_eq!(fs::read_to_string(&list).unwrap(), "");
    }
}
