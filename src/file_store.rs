//! Async filesystem operations the reconciliation flows are built on.
//!
//! Every operation resolves to `Ok(value)` or a [`FileError`]; nothing panics
//! into caller logic.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::model::document::is_blank_path;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("invalid path: {0:?}")]
    InvalidPath(PathBuf),
    #[error("{}: content is not valid text", .0.display())]
    InvalidContent(PathBuf),
    #[error("{}: not found", .0.display())]
    NotFound(PathBuf),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FileError> {
        validate(path)?;
        fs::read(path)
            .await
            .map_err(|err| FileError::from_io(path, err))
    }

    /// Read a file as UTF-8 text.
    pub async fn read_text(&self, path: &Path) -> Result<String, FileError> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes).map_err(|_| FileError::InvalidContent(path.to_path_buf()))
    }

    /// Replace the file's content. A failed write may leave either version on disk.
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<Written, FileError> {
        validate(path)?;
        fs::write(path, content.as_bytes())
            .await
            .map_err(|source| FileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("wrote {} bytes to {}", content.len(), path.display());
        Ok(Written {
            path: path.to_path_buf(),
            content: content.to_string(),
        })
    }

    /// Delete a file. A missing file is an error.
    pub async fn remove_file(&self, path: &Path) -> Result<PathBuf, FileError> {
        validate(path)?;
        fs::remove_file(path)
            .await
            .map_err(|source| FileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(path.to_path_buf())
    }

    /// Delete a file, treating a missing file as success.
    pub async fn remove_file_if_exists(&self, path: &Path) -> Result<PathBuf, FileError> {
        match self.remove_file(path).await {
            Err(FileError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(path.to_path_buf())
            }
            other => other,
        }
    }

    /// Create a directory (and parents). Existing directories are a no-op.
    pub async fn create_dir(&self, path: &Path) -> Result<PathBuf, FileError> {
        validate(path)?;
        if fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
            return Ok(path.to_path_buf());
        }
        fs::create_dir_all(path)
            .await
            .map_err(|source| FileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(path.to_path_buf())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        !is_blank_path(Some(path)) && fs::try_exists(path).await.unwrap_or(false)
    }
}

fn validate(path: &Path) -> Result<(), FileError> {
    if is_blank_path(Some(path)) {
        return Err(FileError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}
