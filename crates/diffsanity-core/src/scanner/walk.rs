use crate::error::{Error, Result};
use glob::Pattern;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error};
use walkdir::WalkDir;

/// The filesystem facts the scanner needs about a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileStat {
    pub fn from_metadata(metadata: &fs::Metadata) -> io::Result<Self> {
        Ok(Self {
            modified: metadata.modified()?,
            len: metadata.len(),
        })
    }
}

/// Result of listing a tree: the regular files found, plus subtrees that
/// could not be read.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, Error)>,
}

/// Read-only view of a directory tree. All paths are relative to `root()`.
pub trait FileTree: Send + Sync {
    fn root(&self) -> &Path;

    /// Every regular file under the root. Order is unspecified.
    fn list_files(&self) -> Result<Listing>;

    fn open(&self, relative: &Path) -> io::Result<Box<dyn Read + Send>>;

    fn stat(&self, relative: &Path) -> io::Result<FileStat>;
}

/// A tree on the local filesystem. Symlinks are not followed.
#[derive(Debug)]
pub struct LocalTree {
    root: PathBuf,
    ignore_patterns: Vec<Pattern>,
}

impl LocalTree {
    /// Open `root`, failing when it is missing, not a directory or unreadable.
    pub fn open_root(root: impl Into<PathBuf>, ignore_globs: &[String]) -> Result<Self> {
        let root = root.into();

        let metadata = fs::metadata(&root).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::DirectoryNotFound(root.clone()),
            _ => Error::from_io(err, &root),
        })?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(root));
        }
        fs::read_dir(&root).map_err(|err| Error::from_io(err, &root))?;

        let ignore_patterns = ignore_globs
            .iter()
            .map(|glob| {
                Pattern::new(glob).map_err(|source| Error::InvalidPattern {
                    pattern: glob.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root,
            ignore_patterns,
        })
    }

    fn is_ignored(&self, relative: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative))
    }
}

impl FileTree for LocalTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_files(&self) -> Result<Listing> {
        let mut listing = Listing::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry
                        .path()
                        .strip_prefix(&self.root)
                        .map(|relative| !self.is_ignored(relative))
                        .unwrap_or(true)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    if err.depth() == 0 {
                        let io_err = err
                            .into_io_error()
                            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk error"));
                        return Err(Error::from_io(io_err, path));
                    }
                    error!("Error reading {}: {}", path.display(), err);
                    let cause = match err.into_io_error() {
                        Some(io_err) => Error::from_io(io_err, &path),
                        None => Error::Other("filesystem loop".to_string()),
                    };
                    listing.errors.push((path, cause));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                listing.files.push(relative.to_path_buf());
            }
        }

        debug!(
            "Listed {} files under {} ({} unreadable entries)",
            listing.files.len(),
            self.root.display(),
            listing.errors.len()
        );
        Ok(listing)
    }

    fn open(&self, relative: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.root.join(relative))?))
    }

    fn stat(&self, relative: &Path) -> io::Result<FileStat> {
        FileStat::from_metadata(&fs::metadata(self.root.join(relative))?)
    }
}
