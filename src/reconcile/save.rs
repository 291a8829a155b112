use std::path::{Path, PathBuf};

use super::{FlowError, Reconciler};
use crate::dialog::{Choice, Dialogs, FileFilter, Prompt};
use crate::model::document::{Document, absolute_path, is_blank_path};
use crate::provider::ContentProvider;
use crate::store::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Save,
    SaveAs,
}

impl<S: PersistentStore, D: Dialogs> Reconciler<S, D> {
    /// Save a window's content, asking for a location when needed.
    ///
    /// The registry, watch, renderer path and scratch cleanup are committed
    /// only after the write succeeds, so a failed save-as leaves the window on
    /// its previous path. Session bookkeeping afterwards is best effort.
    pub async fn save_document<P: ContentProvider>(
        &mut self,
        window: &P,
        mode: SaveMode,
    ) -> Result<PathBuf, FlowError> {
        let id = window.window();
        let doc = self.document(id)?.clone();
        let snapshot = window.file_path_and_content().await?;

        let current = snapshot
            .file_path
            .filter(|p| !is_blank_path(Some(p)))
            .or_else(|| doc.real_path().map(Path::to_path_buf));

        let target = match (mode, current) {
            (SaveMode::Save, Some(path)) => path,
            _ => self.choose_save_target().await?,
        };

        self.write_tracked(&target, &snapshot.content).await?;
        tracing::info!("saved window {id} to {}", target.display());

        if doc.real_path() != Some(target.as_path()) {
            self.commit_path(window, &doc, &target).await?;
        }
        window.document_saved(&target).await?;
        window.set_edited(false).await?;

        let saved = self.document(id)?.clone();
        self.remember(&saved).await;
        Ok(target)
    }

    /// Ask for a save location; append the default extension and confirm
    /// overwriting an existing file.
    async fn choose_save_target(&self) -> Result<PathBuf, FlowError> {
        let filters = [
            FileFilter::new(&self.kind.filter_name, &[self.kind.extension.as_str()]),
            FileFilter::all_files(),
        ];
        let Some(mut path) = self.dialogs.choose_save_location(&filters).await else {
            return Err(FlowError::Cancelled);
        };
        if is_blank_path(Some(&path)) {
            return Err(FlowError::Cancelled);
        }
        path = absolute_path(path);
        if path.extension().is_none() && !self.kind.extension.is_empty() {
            path.set_extension(&self.kind.extension);
        }

        if self.files.exists(&path).await {
            let overwrite = self
                .dialogs
                .ask(Prompt {
                    message: "This file already exists. Do you want to overwrite it?".to_string(),
                    choices: vec![Choice::new("Cancel", false), Choice::new("Overwrite", true)],
                    dismissed: false,
                })
                .await;
            if !overwrite {
                return Err(FlowError::Cancelled);
            }
        }
        Ok(path)
    }

    async fn commit_path<P: ContentProvider>(
        &mut self,
        window: &P,
        doc: &Document,
        target: &Path,
    ) -> Result<(), FlowError> {
        self.registry.update_path(doc.id, target.to_path_buf());
        self.rewatch(doc.real_path(), target);
        if !doc.has_real_path() {
            self.remove_scratch(doc.guid).await;
        }
        window.set_file_path(target).await?;
        Ok(())
    }
}
