use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Directory of scratch copies for documents that never got a real path.
/// One file per document, named by its guid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, guid: Uuid) -> PathBuf {
        self.dir.join(guid.to_string())
    }
}
