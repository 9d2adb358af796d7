//! Save targets: where a finished composite goes.

use std::path::PathBuf;

use async_trait::async_trait;

use imagerow_common::error::ExportError;

use crate::compositor::EncodedImage;

/// Result of handing a composite to a [`SaveTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedExport {
    /// Where the artifact landed.
    pub location: PathBuf,

    /// Encoded size in bytes.
    pub bytes_written: usize,
}

/// Persists (or downloads) an encoded composite under a fixed name.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    async fn save(&self, name: &str, image: &EncodedImage) -> Result<SavedExport, ExportError>;
}

/// Writes composites into a directory, replacing any previous file.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SaveTarget for DirectorySaver {
    async fn save(&self, name: &str, image: &EncodedImage) -> Result<SavedExport, ExportError> {
        let location = self.dir.join(name);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExportError::save(format!("{}: {e}", self.dir.display())))?;
        tokio::fs::write(&location, &image.bytes)
            .await
            .map_err(|e| ExportError::save(format!("{}: {e}", location.display())))?;

        tracing::info!(output = %location.display(), bytes = image.bytes.len(), "Saved composite");
        Ok(SavedExport {
            location,
            bytes_written: image.bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::PNG_MIME;

    #[tokio::test]
    async fn test_writes_named_file() {
        let dir = std::env::temp_dir().join(format!("imagerow-save-{}", std::process::id()));
        let saver = DirectorySaver::new(&dir);
        let image = EncodedImage {
            mime: PNG_MIME,
            bytes: vec![7u8; 12],
            width: 1,
            height: 1,
        };

        let saved = saver.save("download.png", &image).await.unwrap();
        assert_eq!(saved.location, dir.join("download.png"));
        assert_eq!(saved.bytes_written, 12);
        assert_eq!(std::fs::read(&saved.location).unwrap(), vec![7u8; 12]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
