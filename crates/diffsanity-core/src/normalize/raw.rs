use super::Normalizer;
use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use imagepipe::{ImageSource, Pipeline};
use std::io::Cursor;

/// Renders camera raw files through the default imagepipe pipeline and keeps
/// the 8-bit sRGB output buffer.
///
/// This compares renderings, not sensor data: two files whose embedded
/// rendering parameters differ can normalize differently.
pub struct RawNormalizer;

impl Normalizer for RawNormalizer {
    /// Bump with every new minor version of `imagepipe` or `rawloader`.
    fn id(&self) -> &'static str {
        "imagepipe-0.5"
    }

    fn normalize(&self, _identity: &FileIdentity, data: &[u8]) -> Result<Vec<u8>> {
        let raw = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| Error::Decode(format!("{:?}", e)))?;
        let mut pipeline = Pipeline::new_from_source(ImageSource::Raw(raw)).map_err(Error::Decode)?;
        let rendered = pipeline.output_8bit(None).map_err(Error::Decode)?;
        Ok(rendered.data)
    }
}
