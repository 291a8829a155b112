use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Window-scoped document identity. Positive, reassigned on every launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last known window placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        }
    }
}

impl Geometry {
    /// Placement for a window opened on top of `self`.
    pub fn cascaded(&self, offset: i32) -> Self {
        Self {
            x: self.x + offset,
            y: self.y + offset,
            ..*self
        }
    }
}

/// One open window's persisted identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    /// Stable for the document's lifetime; names its scratch file.
    pub guid: Uuid,
    pub file_path: Option<PathBuf>,
    pub geometry: Geometry,
}

impl Document {
    pub fn has_real_path(&self) -> bool {
        !is_blank_path(self.file_path.as_deref())
    }

    pub fn real_path(&self) -> Option<&Path> {
        self.file_path.as_deref().filter(|p| !is_blank_path(Some(p)))
    }
}

/// True for an absent path or one that is empty/whitespace.
pub fn is_blank_path(path: Option<&Path>) -> bool {
    match path {
        None => true,
        Some(p) => p.as_os_str().to_string_lossy().trim().is_empty(),
    }
}

/// Absolute form of a user-supplied path, resolving symlinks when it exists.
pub fn absolute_path(path: PathBuf) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(&path))
        .unwrap_or(path)
}

/// File name without its extension, used as the window title.
pub fn window_title(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_paths() {
        assert!(is_blank_path(None));
        assert!(is_blank_path(Some(Path::new(""))));
        assert!(is_blank_path(Some(Path::new("   "))));
        assert!(!is_blank_path(Some(Path::new("/tmp/a.md"))));
    }

    #[test]
    fn title_strips_extension() {
        assert_eq!(window_title(Path::new("/notes/todo.md")), "todo");
        assert_eq!(window_title(Path::new("/notes/README")), "README");
    }

    #[test]
    fn real_path_ignores_blank() {
        let doc = Document {
            id: DocumentId(1),
            guid: Uuid::new_v4(),
            file_path: Some(PathBuf::from(" ")),
            geometry: Geometry::default(),
        };
        assert!(!doc.has_real_path());
        assert_eq!(doc.real_path(), None);
    }

    #[test]
    fn cascade_keeps_size() {
        let g = Geometry {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        };
        let c = g.cascaded(20);
        assert_eq!((c.x, c.y, c.width, c.height), (30, 40, 300, 200));
    }
}
