//! File-like inputs as delivered by a drop.

use std::path::Path;
use std::sync::Arc;

/// One dropped file: a display name plus its raw, undecoded bytes.
///
/// The bytes are shared and never mutated. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk. The name is the path's final component.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Original file name. Not unique: two drops may carry the same name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_uses_file_name() {
        let dir = std::env::temp_dir().join(format!("imagerow-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("left.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let source = SourceFile::read(&path).unwrap();
        assert_eq!(source.name(), "left.png");
        assert_eq!(&source.bytes()[..], &[1, 2, 3]);
        assert_eq!(source.len(), 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_clone_shares_bytes() {
        let a = SourceFile::new("a.png", vec![0u8; 16]);
        let b = a.clone();
        assert!(Arc::ptr_eq(a.bytes(), b.bytes()));
    }
}
