//! Photo encoding for submissions.
//!
//! A photo is attached to a record as an opaque [`PhotoPayload`]. The
//! default encoder reads the file and embeds it as a base64 `data:` URL.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

use crate::error::EncodingError;
use crate::model::PhotoPayload;

/// Largest photo accepted by [`DataUrlEncoder::default`] (5 MiB).
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

/// A photo file picked in the report form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub path: PathBuf,
}

impl PhotoFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// MIME type guessed from the extension; `application/octet-stream`
    /// when unknown.
    #[must_use]
    pub fn mime(&self) -> &'static str {
        mime_for(&self.path)
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Turns a picked file into a payload. May suspend.
#[async_trait]
pub trait PhotoEncoder: Send + Sync {
    async fn encode(&self, file: &PhotoFile) -> Result<PhotoPayload, EncodingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrlEncoder {
    max_bytes: u64,
}

impl Default for DataUrlEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PHOTO_BYTES)
    }
}

impl DataUrlEncoder {
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

#[async_trait]
impl PhotoEncoder for DataUrlEncoder {
    async fn encode(&self, file: &PhotoFile) -> Result<PhotoPayload, EncodingError> {
        let unreadable = |source: std::io::Error| EncodingError::Unreadable {
            path: file.path.clone(),
            source,
        };

        let meta = tokio::fs::metadata(&file.path).await.map_err(unreadable)?;
        if meta.len() > self.max_bytes {
            return Err(EncodingError::TooLarge {
                bytes: meta.len(),
                max: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(&file.path).await.map_err(unreadable)?;
        if bytes.is_empty() {
            return Err(EncodingError::Empty);
        }

        tracing::debug!(path = %file.path.display(), bytes = bytes.len(), "photo encoded");
        Ok(PhotoPayload::new(format!(
            "data:{};base64,{}",
            file.mime(),
            STANDARD.encode(&bytes)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encodes_file_as_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hole.PNG");
        std::fs::write(&path, b"abc").unwrap();

        let payload = DataUrlEncoder::default()
            .encode(&PhotoFile::new(&path))
            .await
            .unwrap();
        assert_eq!(payload.as_str(), "data:image/png;base64,YWJj");
        assert_eq!(payload.mime(), Some("image/png"));
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataUrlEncoder::default()
            .encode(&PhotoFile::new(dir.path().join("nope.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, EncodingError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn oversize_and_empty_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.jpg");
        std::fs::write(&big, [0_u8; 16]).unwrap();
        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();

        let encoder = DataUrlEncoder::new(8);
        assert!(matches!(
            encoder.encode(&PhotoFile::new(big)).await,
            Err(EncodingError::TooLarge { bytes: 16, max: 8 })
        ));
        assert!(matches!(
            encoder.encode(&PhotoFile::new(empty)).await,
            Err(EncodingError::Empty)
        ));
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(PhotoFile::new("x.tiff").mime(), "application/octet-stream");
        assert_eq!(PhotoFile::new("x.jpeg").mime(), "image/jpeg");
    }
}
