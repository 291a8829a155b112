use tokio_util::sync::CancellationToken;

use super::dirty::{ClosePlan, plan_close};
use super::save::SaveMode;
use super::{FlowError, Reconciler};
use crate::dialog::{Choice, Dialogs, Prompt};
use crate::model::document::{Document, DocumentId, is_blank_path};
use crate::model::entry::CurrentDocEntry;
use crate::provider::ContentProvider;
use crate::store::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The document was flushed to the session and removed from the registry.
    Closed,
    /// The close was aborted; `cancel` has been triggered.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Save,
    Discard,
    Cancel,
}

impl<S: PersistentStore, D: Dialogs> Reconciler<S, D> {
    /// Decide whether a window may close, saving or discarding as needed.
    ///
    /// `cancel` is triggered whenever the window stays open, so a caller
    /// closing several windows (quit) can stop. A save failure also triggers
    /// it and is returned as the error; the window remains open and editable.
    pub async fn close_document<P: ContentProvider>(
        &mut self,
        window: &P,
        quitting: bool,
        cancel: &CancellationToken,
    ) -> Result<CloseOutcome, FlowError> {
        let id = window.window();
        let doc = self.document(id)?.clone();
        let snapshot = match window.file_path_and_content().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                cancel.cancel();
                return Err(err.into());
            }
        };
        let untitled = is_blank_path(snapshot.file_path.as_deref());

        if quitting && untitled {
            return match self.save_scratch(&doc, &snapshot.content).await {
                Ok(()) => self.finish_close(id, true).await,
                Err(err) => {
                    tracing::error!("can't close window {id}: scratch save failed: {err}");
                    cancel.cancel();
                    Err(err)
                }
            };
        }

        let edited = if untitled {
            !snapshot.content.is_empty()
        } else {
            match window.is_edited().await {
                Ok(edited) => edited,
                Err(err) => {
                    cancel.cancel();
                    return Err(err.into());
                }
            }
        };

        match plan_close(edited, &snapshot.content) {
            ClosePlan::Close => {
                if !doc.has_real_path() {
                    self.remove_scratch(doc.guid).await;
                }
                self.finish_close(id, quitting).await
            }
            ClosePlan::SaveThenClose => self.save_then_close(window, quitting, cancel).await,
            ClosePlan::Ask => match self.ask_before_close().await {
                Decision::Save => self.save_then_close(window, quitting, cancel).await,
                Decision::Discard => {
                    if !doc.has_real_path() {
                        self.remove_scratch(doc.guid).await;
                    }
                    self.finish_close(id, quitting).await
                }
                Decision::Cancel => {
                    tracing::debug!("close of window {id} cancelled");
                    cancel.cancel();
                    Ok(CloseOutcome::Cancelled)
                }
            },
        }
    }

    /// Close every open window for application quit. Stops at the first
    /// window that stays open; returns true when all windows closed.
    pub async fn quit_all<P, F>(&mut self, mut window_for: F) -> bool
    where
        P: ContentProvider,
        F: FnMut(DocumentId) -> Option<P>,
    {
        let cancel = CancellationToken::new();
        for id in self.registry.ids() {
            if cancel.is_cancelled() {
                break;
            }
            let Some(window) = window_for(id) else {
                tracing::warn!("window {id} has no renderer, dropping it");
                if let Err(err) = self.finish_close(id, true).await {
                    tracing::error!("failed to drop window {id}: {err}");
                }
                continue;
            };
            match self.close_document(&window, true, &cancel).await {
                Ok(_) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => tracing::error!("quit aborted at window {id}: {err}"),
            }
        }
        !cancel.is_cancelled() && self.registry.is_empty()
    }

    async fn ask_before_close(&self) -> Decision {
        self.dialogs
            .ask(Prompt {
                message: "Your file was changed since saving the last time. \
                          Do you want to save before closing?"
                    .to_string(),
                choices: vec![
                    Choice::new("Save Changes", Decision::Save),
                    Choice::new("Discard Changes", Decision::Discard),
                    Choice::new("Cancel", Decision::Cancel),
                ],
                dismissed: Decision::Cancel,
            })
            .await
    }

    async fn save_then_close<P: ContentProvider>(
        &mut self,
        window: &P,
        quitting: bool,
        cancel: &CancellationToken,
    ) -> Result<CloseOutcome, FlowError> {
        let id = window.window();
        match self.save_document(window, SaveMode::Save).await {
            Ok(_) => self.finish_close(id, quitting).await,
            Err(FlowError::Cancelled) => {
                tracing::debug!("save before close of window {id} cancelled");
                cancel.cancel();
                Ok(CloseOutcome::Cancelled)
            }
            Err(err) => {
                tracing::error!("can't close window {id}: error saving: {err}");
                cancel.cancel();
                Err(err)
            }
        }
    }

    /// Keep an untitled document's content across restarts.
    async fn save_scratch(&self, doc: &Document, content: &str) -> Result<(), FlowError> {
        self.files.create_dir(self.scratch.dir()).await?;
        self.files
            .write_file(&self.scratch.path_for(doc.guid), content)
            .await?;
        Ok(())
    }

    /// Flush the closing document to the session and drop it from the registry.
    async fn finish_close(
        &mut self,
        id: DocumentId,
        quitting: bool,
    ) -> Result<CloseOutcome, FlowError> {
        let doc = self.registry.remove(id).ok_or(FlowError::UnknownWindow(id))?;
        if let Some(path) = doc.real_path() {
            self.watcher.unwatch(path);
            self.self_writes.forget(path);
        }

        self.remember_recent(&doc).await;
        if quitting {
            if let Err(err) = self
                .session
                .update_current_doc(CurrentDocEntry::from_document(&doc))
                .await
            {
                tracing::warn!("failed to keep window {id} for restore: {err}");
            }
        } else {
            self.persist_windows().await;
        }

        tracing::info!("closed window {id}");
        Ok(CloseOutcome::Closed)
    }
}
