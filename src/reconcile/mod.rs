//! Document close/save/merge reconciliation.
//!
//! [`Reconciler`] is the single context object the flows run against: it owns
//! the document registry, session persistence, the file store, the dialog
//! front-end, the path watcher and the self-write suppression set. Each flow
//! lives in its own submodule as an `async fn` returning a typed outcome.

pub mod close;
pub mod dirty;
pub mod merge;
pub mod open;
pub mod save;
pub mod scratch;
pub mod watch;

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::dialog::Dialogs;
use crate::file_store::{FileError, FileStore, Written};
use crate::model::document::{Document, DocumentId, Geometry};
use crate::model::entry::{CurrentDocEntry, RecentDocEntry};
use crate::model::registry::DocumentRegistry;
use crate::provider::ProviderError;
use crate::session::SessionStore;
use crate::store::PersistentStore;

pub use close::CloseOutcome;
pub use merge::MergeOutcome;
pub use open::OpenOutcome;
pub use save::SaveMode;
pub use scratch::ScratchDir;
pub use watch::{FileEvent, PathWatcher, SelfWrites, WatchEvent};

#[derive(Debug, Error)]
pub enum FlowError {
    /// The user backed out. A normal outcome, not a failure.
    #[error("cancelled by user")]
    Cancelled,
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("no document registered for window {0}")]
    UnknownWindow(DocumentId),
}

impl FlowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Extension and chooser filter for the documents this shell edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKind {
    pub extension: String,
    pub filter_name: String,
}

impl DocumentKind {
    pub fn new(extension: &str, filter_name: impl Into<String>) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            filter_name: filter_name.into(),
        }
    }
}

/// A document read back from the persisted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredDocument {
    pub entry: CurrentDocEntry,
    pub content: String,
}

pub struct Reconciler<S, D> {
    registry: DocumentRegistry,
    session: SessionStore<S>,
    files: FileStore,
    dialogs: D,
    watcher: Box<dyn PathWatcher>,
    self_writes: SelfWrites,
    scratch: ScratchDir,
    kind: DocumentKind,
}

impl<S: PersistentStore, D: Dialogs> Reconciler<S, D> {
    pub fn new(
        session: SessionStore<S>,
        dialogs: D,
        watcher: Box<dyn PathWatcher>,
        scratch: ScratchDir,
        kind: DocumentKind,
    ) -> Self {
        Self {
            registry: DocumentRegistry::new(),
            session,
            files: FileStore::new(),
            dialogs,
            watcher,
            self_writes: SelfWrites::default(),
            scratch,
            kind,
        }
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DocumentRegistry {
        &mut self.registry
    }

    pub fn session(&self) -> &SessionStore<S> {
        &self.session
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn self_writes(&self) -> &SelfWrites {
        &self.self_writes
    }

    pub fn document(&self, id: DocumentId) -> Result<&Document, FlowError> {
        self.registry.get(id).ok_or(FlowError::UnknownWindow(id))
    }

    // ── Window lifecycle ────────────────────────────────────────

    /// Register a freshly created window and persist the window list.
    pub async fn register_document(
        &mut self,
        file_path: Option<PathBuf>,
        guid: Option<Uuid>,
        geometry: Geometry,
    ) -> Document {
        let doc = self.registry.insert(file_path, guid, geometry).clone();
        if let Some(path) = doc.real_path() {
            self.watcher.watch(path);
        }
        tracing::info!(
            "registered window {} ({})",
            doc.id,
            doc.real_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "untitled".to_string())
        );
        self.persist_windows().await;
        doc
    }

    pub async fn update_geometry(&mut self, id: DocumentId, geometry: Geometry) -> bool {
        if !self.registry.update_geometry(id, geometry) {
            return false;
        }
        self.persist_windows().await;
        true
    }

    /// Rewrite current docs from the registry. Best effort.
    pub async fn persist_windows(&self) {
        let entries: Vec<CurrentDocEntry> = self
            .registry
            .iter()
            .map(CurrentDocEntry::from_document)
            .collect();
        if let Err(err) = self.session.save_current_docs(entries).await {
            tracing::warn!("failed to save current docs: {err}");
        }
    }

    /// Load the documents that were open when the previous run quit.
    pub async fn restore_session(&self) -> Vec<RestoredDocument> {
        let entries = match self.session.load_current_docs().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("failed to load current docs: {err}");
                return Vec::new();
            }
        };

        let mut restored = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(path) = entry.file_path.clone().filter(|_| entry.has_real_path()) {
                match self.files.read_text(&path).await {
                    Ok(content) => restored.push(RestoredDocument { entry, content }),
                    Err(err) => tracing::warn!("skipping session document: {err}"),
                }
                continue;
            }

            let content = match entry.guid {
                Some(guid) => match self.files.read_text(&self.scratch.path_for(guid)).await {
                    Ok(content) => content,
                    Err(err) if err.is_not_found() => String::new(),
                    Err(err) => {
                        tracing::warn!("unreadable scratch document: {err}");
                        String::new()
                    }
                },
                None => String::new(),
            };
            restored.push(RestoredDocument { entry, content });
        }
        restored
    }

    // ── Shared steps ────────────────────────────────────────────

    /// Write through the file store, marking watched paths as self-written.
    async fn write_tracked(&mut self, path: &Path, content: &str) -> Result<Written, FileError> {
        let watched = self.watcher.is_watching(path);
        if watched {
            self.self_writes.mark(path);
        }
        let result = self.files.write_file(path, content).await;
        if result.is_err() && watched {
            self.self_writes.forget(path);
        }
        result
    }

    fn rewatch(&mut self, old: Option<&Path>, new: &Path) {
        if let Some(old) = old {
            if old == new {
                return;
            }
            self.watcher.unwatch(old);
            self.self_writes.forget(old);
        }
        self.watcher.watch(new);
    }

    async fn remove_scratch(&self, guid: Uuid) {
        let path = self.scratch.path_for(guid);
        if let Err(err) = self.files.remove_file_if_exists(&path).await {
            tracing::warn!("failed to remove scratch file: {err}");
        }
    }

    /// Record a saved or opened path in the session. Never fails the caller.
    async fn remember(&self, doc: &Document) {
        if let Err(err) = self
            .session
            .update_current_doc(CurrentDocEntry::from_document(doc))
            .await
        {
            tracing::warn!("failed to update current doc {}: {err}", doc.id);
        }
        self.remember_recent(doc).await;
    }

    async fn remember_recent(&self, doc: &Document) {
        let Some(path) = doc.real_path() else {
            return;
        };
        if let Err(err) = self
            .session
            .add_recent_doc(RecentDocEntry::new(path))
            .await
        {
            tracing::warn!("failed to add recent doc {}: {err}", path.display());
        }
    }
}
