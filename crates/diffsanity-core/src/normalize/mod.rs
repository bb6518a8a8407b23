//! Format-aware content normalization.
//!
//! A file's digest is taken over its *normalized* bytes. Classes with a
//! registered strategy are decoded into a canonical pixel buffer so that
//! metadata-only edits (EXIF, text chunks, colour profile tags) do not change
//! the digest. Everything else is hashed verbatim.

mod pixels;
#[cfg(feature = "raw")]
mod raw;

pub use pixels::PixelNormalizer;
#[cfg(feature = "raw")]
pub use raw::RawNormalizer;

use crate::error::Result;
use crate::identity::{ExtensionClass, FileIdentity};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use tracing::debug;

/// One way of turning a file's bytes into the byte stream that gets hashed.
pub trait Normalizer: Send + Sync {
    /// Stable identifier of the produced byte stream.
    ///
    /// Must change whenever the output for the same input could change, as it
    /// is written into manifests to detect stale digests.
    fn id(&self) -> &'static str;

    fn normalize(&self, identity: &FileIdentity, data: &[u8]) -> Result<Vec<u8>>;
}

/// Registry of normalization strategies keyed by extension class.
///
/// Classes without a strategy are hashed verbatim.
pub struct NormalizationRules {
    strategies: BTreeMap<ExtensionClass, Box<dyn Normalizer>>,
}

impl NormalizationRules {
    /// Rules that hash every file verbatim.
    pub fn verbatim() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Pixel decoding for images, plus raw rendering when built with `raw`.
    pub fn standard() -> Self {
        let rules = Self::verbatim().register(ExtensionClass::Image, PixelNormalizer);
        #[cfg(feature = "raw")]
        let rules = rules.register(ExtensionClass::RawPhoto, RawNormalizer);
        rules
    }

    pub fn register<N: Normalizer + 'static>(mut self, class: ExtensionClass, strategy: N) -> Self {
        self.strategies.insert(class, Box::new(strategy));
        self
    }

    pub fn strategy_for(&self, class: ExtensionClass) -> Option<&dyn Normalizer> {
        self.strategies.get(&class).map(|s| s.as_ref())
    }

    /// Canonical description of the registered strategies, e.g.
    /// `image=pixels-v2+image-0.24,raw=imagepipe-0.5`.
    pub fn fingerprint(&self) -> String {
        if self.strategies.is_empty() {
            return "verbatim".to_string();
        }
        self.strategies
            .iter()
            .map(|(class, strategy)| format!("{}={}", class, strategy.id()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Normalize already-read file bytes.
    ///
    /// `None` means "hash the verbatim bytes": either no strategy applies or
    /// decoding failed.
    pub fn normalize_bytes(&self, identity: &FileIdentity, data: &[u8]) -> Option<Vec<u8>> {
        let strategy = self.strategy_for(identity.class())?;
        match strategy.normalize(identity, data) {
            Ok(normalized) => Some(normalized),
            Err(err) => {
                debug!(
                    "Could not decode {} as {}, falling back to verbatim bytes: {}",
                    identity.relative_path().display(),
                    identity.class(),
                    err
                );
                None
            }
        }
    }

    /// Normalize from a byte source. Verbatim classes are not read at all.
    pub fn normalize<R: Read>(
        &self,
        identity: &FileIdentity,
        mut source: R,
    ) -> io::Result<Option<Vec<u8>>> {
        if self.strategy_for(identity.class()).is_none() {
            return Ok(None);
        }
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(self.normalize_bytes(identity, &data))
    }
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for NormalizationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizationRules")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    struct Upper;

    impl Normalizer for Upper {
        fn id(&self) -> &'static str {
            "upper-v1"
        }

        fn normalize(&self, _identity: &FileIdentity, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.to_ascii_uppercase())
        }
    }

    struct Broken;

    impl Normalizer for Broken {
        fn id(&self) -> &'static str {
            "broken-v1"
        }

        fn normalize(&self, _identity: &FileIdentity, _data: &[u8]) -> Result<Vec<u8>> {
            Err(Error::Decode("always fails".to_string()))
        }
    }

    #[test]
    fn test_other_class_is_verbatim() {
        let rules = NormalizationRules::standard();
        let identity = FileIdentity::new("docs/hello.txt");
        let normalized = rules.normalize(&identity, Cursor::new(b"hello")).unwrap();
        assert!(normalized.is_none());
    }

    #[test]
    fn test_registered_strategy_is_used() {
        let rules = NormalizationRules::verbatim().register(ExtensionClass::Other, Upper);
        let identity = FileIdentity::new("hello.txt");
        let normalized = rules.normalize(&identity, Cursor::new(b"hello")).unwrap();
        assert_eq!(normalized.as_deref(), Some(&b"HELLO"[..]));
    }

    #[test]
    fn test_decode_failure_falls_back() {
        let rules = NormalizationRules::verbatim().register(ExtensionClass::Image, Broken);
        let identity = FileIdentity::new("pic.jpg");
        assert!(rules.normalize_bytes(&identity, b"not a jpeg").is_none());
    }

    #[test]
    fn test_corrupt_image_falls_back() {
        let rules = NormalizationRules::standard();
        let identity = FileIdentity::new("corrupt.png");
        assert!(rules.normalize_bytes(&identity, b"\x89PNG garbage").is_none());
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(NormalizationRules::verbatim().fingerprint(), "verbatim");
        let rules = NormalizationRules::verbatim()
            .register(ExtensionClass::Other, Upper)
            .register(ExtensionClass::Image, PixelNormalizer);
        assert_eq!(rules.fingerprint(), "image=pixels-v2+image-0.24,other=upper-v1");
        assert!(NormalizationRules::standard()
            .fingerprint()
            .starts_with("image=pixels-v2+image-0.24"));
    }
}
