use std::path::{Path, PathBuf};

use super::document::window_title;

/// Window-side editor state: the text a renderer holds for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    pub content: String,
    pub path: Option<PathBuf>,
    pub dirty: bool,
    pub title: String,
}

impl Buffer {
    /// Create a new empty, untitled buffer.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Create a buffer from already-loaded file contents.
    pub fn from_file(path: PathBuf, content: String) -> Self {
        Self {
            title: window_title(&path),
            content,
            path: Some(path),
            dirty: false,
        }
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Append typed text at the end of the buffer.
    pub fn insert_text(&mut self, text: &str) {
        self.content.push_str(text);
        self.dirty = true;
    }

    /// Replace the whole buffer as a user edit.
    pub fn replace(&mut self, text: &str) {
        self.content = text.to_string();
        self.dirty = true;
    }

    /// Load content pushed by the main side; not a user edit.
    pub fn load(&mut self, content: String) {
        self.content = content;
        self.dirty = false;
    }

    pub fn set_path(&mut self, path: &Path) {
        self.title = window_title(path);
        self.path = Some(path.to_path_buf());
    }
}
