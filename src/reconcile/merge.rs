use std::path::Path;

use super::watch::FileEvent;
use super::{FlowError, Reconciler};
use crate::dialog::{Choice, Dialogs, Prompt};
use crate::provider::ContentProvider;
use crate::store::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The event was our own write echoing back.
    SelfWrite,
    /// Disk and window already agree.
    Unchanged,
    /// The window now shows the on-disk content.
    Reloaded,
    /// The window's content was written back over the external change.
    KeptMine,
    /// The file disappeared; the window keeps its content, marked edited.
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Reload,
    Keep,
}

impl<S: PersistentStore, D: Dialogs> Reconciler<S, D> {
    /// Reconcile a window with a change to its file made outside this process.
    pub async fn on_file_event<P: ContentProvider>(
        &mut self,
        window: &P,
        path: &Path,
        event: FileEvent,
    ) -> Result<MergeOutcome, FlowError> {
        let id = window.window();
        if self.self_writes.take(path) {
            tracing::debug!("ignoring own write to {}", path.display());
            return Ok(MergeOutcome::SelfWrite);
        }

        if event == FileEvent::Removed {
            tracing::warn!(
                "{} was removed on disk; window {id} keeps its content",
                path.display()
            );
            window.set_edited(true).await?;
            return Ok(MergeOutcome::Orphaned);
        }

        let (on_disk, snapshot) =
            tokio::join!(self.files.read_text(path), window.file_path_and_content());
        let on_disk = on_disk?;
        let snapshot = snapshot?;
        if on_disk == snapshot.content {
            return Ok(MergeOutcome::Unchanged);
        }

        let resolution = if window.is_edited().await? {
            self.ask_reload().await
        } else {
            Resolution::Reload
        };

        match resolution {
            Resolution::Reload => {
                window.set_content(on_disk).await?;
                window.set_edited(false).await?;
                tracing::info!("reloaded window {id} from {}", path.display());
                Ok(MergeOutcome::Reloaded)
            }
            Resolution::Keep => {
                if let Err(err) = self.write_tracked(path, &snapshot.content).await {
                    tracing::error!("failed to keep changes of window {id}: {err}");
                    return Err(err.into());
                }
                window.document_saved(path).await?;
                window.set_edited(false).await?;
                tracing::info!("kept window {id} over external change to {}", path.display());
                Ok(MergeOutcome::KeptMine)
            }
        }
    }

    async fn ask_reload(&self) -> Resolution {
        self.dialogs
            .ask(Prompt {
                message: "The file has been changed on disk. Do you want to keep your \
                          changes, or reload the document?"
                    .to_string(),
                choices: vec![
                    Choice::new("Reload From Disk", Resolution::Reload),
                    Choice::new("Keep My Changes", Resolution::Keep),
                ],
                dismissed: Resolution::Keep,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn self_write_is_swallowed_once() {
        let mut fx = Fixture::new(vec![]);
        let path = fx.write("a.md", "disk");
        let w = fx.open_window(Some(&path), "mine", false).await;
        fx.core
            .save_document(&w, crate::reconcile::SaveMode::Save)
            .await
            .unwrap();
        assert!(fx.core.self_writes().is_marked(&path));

        let first = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(first, MergeOutcome::SelfWrite);
        assert!(!fx.core.self_writes().is_marked(&path));
        assert!(fx.dialogs.asked().is_empty());

        // The next change is external again.
        std::fs::write(&path, "theirs").unwrap();
        let second = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(second, MergeOutcome::Reloaded);
        assert_eq!(w.content(), "theirs");
    }

    #[tokio::test]
    async fn equal_content_is_a_noop() {
        let mut fx = Fixture::new(vec![]);
        let path = fx.write("a.md", "same");
        let w = fx.open_window(Some(&path), "same", true).await;

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert!(w.edited());
        assert!(w.state.lock().unwrap().set_contents.is_empty());
    }

    #[tokio::test]
    async fn clean_window_reloads_silently() {
        let mut fx = Fixture::new(vec![]);
        let path = fx.write("a.md", "v1");
        let w = fx.open_window(Some(&path), "v1", false).await;
        std::fs::write(&path, "v2").unwrap();

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Reloaded);
        assert_eq!(w.content(), "v2");
        assert!(fx.dialogs.asked().is_empty());
    }

    #[tokio::test]
    async fn dirty_window_reload_takes_disk_content() {
        let mut fx = Fixture::new(vec![Answer::Pick("Reload From Disk")]);
        let path = fx.write("a.md", "theirs");
        let w = fx.open_window(Some(&path), "mine", true).await;

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Reloaded);
        assert_eq!(w.content(), "theirs");
        assert!(!w.edited());
        assert_eq!(fx.dialogs.asked().len(), 1);
    }

    #[tokio::test]
    async fn dirty_window_keep_writes_back_and_marks_self_write() {
        let mut fx = Fixture::new(vec![Answer::Pick("Keep My Changes")]);
        let path = fx.write("a.md", "theirs");
        let w = fx.open_window(Some(&path), "mine", true).await;

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::KeptMine);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "mine");
        assert_eq!(w.content(), "mine");
        assert!(!w.edited());
        assert!(fx.core.self_writes().is_marked(&path));
    }

    #[tokio::test]
    async fn dismissed_prompt_keeps_changes() {
        let mut fx = Fixture::new(vec![Answer::Dismiss]);
        let path = fx.write("a.md", "theirs");
        let w = fx.open_window(Some(&path), "mine", true).await;

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Changed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::KeptMine);
    }

    #[tokio::test]
    async fn removal_marks_window_edited() {
        let mut fx = Fixture::new(vec![]);
        let path = fx.write("a.md", "text");
        let w = fx.open_window(Some(&path), "text", false).await;
        std::fs::remove_file(&path).unwrap();

        let outcome = fx
            .core
            .on_file_event(&w, &path, FileEvent::Removed)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Orphaned);
        assert!(w.edited());
        assert_eq!(w.content(), "text");
        assert_eq!(w.file_path(), Some(path));
    }
}
