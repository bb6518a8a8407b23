use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions decoded to pixels through the image codec.
///
/// Multi-frame containers (gif, tiff, webp) are left out: the codec only
/// yields their first frame, which would make distinct files compare equal.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "jpe", "png", "bmp", "heif", "heic"];

/// Camera raw extensions rendered through the raw pipeline.
pub const RAW_EXTENSIONS: [&str; 12] = [
    "cr2", "cr3", "crw", "nef", "nrw", "arw", "dng", "orf", "raf", "rw2", "pef", "srw",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtensionClass {
    Image,
    RawPhoto,
    Other,
}

impl ExtensionClass {
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return ExtensionClass::Other;
        };
        let ext = ext.to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            ExtensionClass::Image
        } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
            ExtensionClass::RawPhoto
        } else {
            ExtensionClass::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionClass::Image => "image",
            ExtensionClass::RawPhoto => "raw",
            ExtensionClass::Other => "other",
        }
    }
}

impl fmt::Display for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file as seen from the root of the tree being scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    relative_path: PathBuf,
    class: ExtensionClass,
}

impl FileIdentity {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        let relative_path = relative_path.into();
        let class = ExtensionClass::from_path(&relative_path);
        Self {
            relative_path,
            class,
        }
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn class(&self) -> ExtensionClass {
        self.class
    }

    /// File name without any directory component.
    pub fn file_name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
