//! Where an upload's bytes come from.

use std::path::{Path, PathBuf};

use docchat_core::{FileUpload, Result};

/// One file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// A file on disk, read when its upload starts.
    Path { path: PathBuf, name: String },
    /// Bytes already in memory.
    Memory(FileUpload),
}

impl FileSource {
    /// A file on disk, named after its final path component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::Path { path, name }
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Memory(FileUpload::new(name, data))
    }

    /// Upload name (the file name only, never a directory path).
    pub fn name(&self) -> &str {
        match self {
            Self::Path { name, .. } => name,
            Self::Memory(upload) => &upload.name,
        }
    }

    /// Size in bytes, if it can be determined without reading the file.
    pub async fn size(&self) -> u64 {
        match self {
            Self::Path { path, .. } => tokio::fs::metadata(path)
                .await
                .map(|m| m.len())
                .unwrap_or(0),
            Self::Memory(upload) => upload.size(),
        }
    }

    /// Read the body.
    pub async fn load(self) -> Result<FileUpload> {
        match self {
            Self::Path { path, name } => {
                let data = tokio::fs::read(&path).await?;
                Ok(FileUpload::new(name, data))
            }
            Self::Memory(upload) => Ok(upload),
        }
    }
}
