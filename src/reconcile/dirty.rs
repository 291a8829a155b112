use std::path::Path;

use crate::file_store::FileStore;
use crate::model::document::is_blank_path;

/// Whether in-memory `content` differs from what is saved at `file_path`.
///
/// Without a path, any content counts as a change. An unreadable file counts
/// as changed: there is nothing to compare against. Comparison is exact, with
/// no line-ending or whitespace normalisation.
pub async fn has_changes(files: &FileStore, file_path: Option<&Path>, content: &str) -> bool {
    let path = match file_path {
        Some(path) if !is_blank_path(Some(path)) => path,
        _ => return !content.is_empty(),
    };

    match files.read_file(path).await {
        Ok(bytes) => bytes != content.as_bytes(),
        Err(err) => {
            tracing::debug!("treating {} as changed: {err}", path.display());
            true
        }
    }
}

/// What closing a window requires, before any user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePlan {
    /// Nothing to keep.
    Close,
    /// Unedited but non-empty: save quietly, then close.
    SaveThenClose,
    /// Edited: ask Save / Discard / Cancel.
    Ask,
}

pub fn plan_close(edited: bool, content: &str) -> ClosePlan {
    match (edited, content.is_empty()) {
        (false, true) => ClosePlan::Close,
        (false, false) => ClosePlan::SaveThenClose,
        (true, _) => ClosePlan::Ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_path_is_dirty_iff_content() {
        let files = FileStore::new();
        assert!(!has_changes(&files, None, "").await);
        assert!(has_changes(&files, None, "x").await);
        assert!(!has_changes(&files, Some(Path::new(" ")), "").await);
        assert!(has_changes(&files, Some(Path::new("")), "x").await);
    }

    #[tokio::test]
    async fn compares_exactly_against_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "line\r\n").unwrap();
        let files = FileStore::new();

        assert!(!has_changes(&files, Some(&path), "line\r\n").await);
        assert!(has_changes(&files, Some(&path), "line\n").await);
        assert!(has_changes(&files, Some(&path), "line\r\n ").await);
    }

    #[tokio::test]
    async fn unreadable_file_is_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::new();
        let missing = dir.path().join("missing.md");
        assert!(has_changes(&files, Some(&missing), "").await);
        assert!(has_changes(&files, Some(&missing), "x").await);
    }

    #[test]
    fn close_plans() {
        assert_eq!(plan_close(false, ""), ClosePlan::Close);
        assert_eq!(plan_close(false, "text"), ClosePlan::SaveThenClose);
        assert_eq!(plan_close(true, ""), ClosePlan::Ask);
        assert_eq!(plan_close(true, "text"), ClosePlan::Ask);
    }
}
