use std::path::PathBuf;

use super::dirty::has_changes;
use super::{FlowError, Reconciler};
use crate::dialog::Dialogs;
use crate::model::document::{DocumentId, is_blank_path};
use crate::model::entry::RecentDocEntry;
use crate::provider::ContentProvider;
use crate::store::PersistentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Another window already shows this file; focus it.
    AlreadyOpen(DocumentId),
    /// The focused pristine window now holds the file.
    Reuse(DocumentId),
    /// The shell should create a window for this file and register it.
    NewWindow { path: PathBuf, content: String },
}

impl<S: PersistentStore, D: Dialogs> Reconciler<S, D> {
    /// Open a document, asking for a location when `path` is `None`.
    pub async fn open_document<P: ContentProvider>(
        &mut self,
        path: Option<PathBuf>,
        focused: Option<&P>,
    ) -> Result<OpenOutcome, FlowError> {
        let path = match path {
            Some(path) => path,
            None => self
                .dialogs
                .choose_open_location()
                .await
                .ok_or(FlowError::Cancelled)?,
        };
        if is_blank_path(Some(&path)) {
            return Err(FlowError::Cancelled);
        }

        if let Some(doc) = self.registry.find_by_path(&path) {
            tracing::debug!("{} already open in window {}", path.display(), doc.id);
            return Ok(OpenOutcome::AlreadyOpen(doc.id));
        }

        let content = match self.files.read_text(&path).await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("can't open {}: {err}", path.display());
                if let Err(err) = self.session.prune_recent_docs().await {
                    tracing::warn!("failed to prune recent docs: {err}");
                }
                return Err(err.into());
            }
        };

        let outcome = match focused {
            Some(window) if self.is_pristine(window).await => {
                let id = window.window();
                let guid = self.document(id)?.guid;
                self.registry.update_path(id, path.clone());
                self.rewatch(None, &path);
                window.set_file_path(&path).await?;
                window.set_content(content).await?;
                window.set_edited(false).await?;
                self.remove_scratch(guid).await;
                let doc = self.document(id)?.clone();
                self.remember(&doc).await;
                OpenOutcome::Reuse(id)
            }
            _ => {
                if let Err(err) = self.session.add_recent_doc(RecentDocEntry::new(&path)).await {
                    tracing::warn!("failed to add recent doc {}: {err}", path.display());
                }
                OpenOutcome::NewWindow {
                    path: path.clone(),
                    content,
                }
            }
        };

        tracing::info!("opened {}", path.display());
        Ok(outcome)
    }

    /// Untitled, empty and unedited.
    async fn is_pristine<P: ContentProvider>(&self, window: &P) -> bool {
        let Ok(doc) = self.document(window.window()) else {
            return false;
        };
        if doc.has_real_path() {
            return false;
        }
        let Ok(snapshot) = window.file_path_and_content().await else {
            return false;
        };
        if has_changes(&self.files, snapshot.file_path.as_deref(), &snapshot.content).await {
            return false;
        }
        matches!(window.is_edited().await, Ok(false))
    }
}
