//! Per-window content renderer protocol.
//!
//! The reconciliation flows only talk to windows through [`ContentProvider`].
//! [`bridge`] carries the calls over correlated request/response channels and
//! [`renderer`] is the window-side host answering them.

pub mod bridge;
pub mod renderer;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::document::DocumentId;

pub use bridge::{Bridge, WindowChannel};

/// Editor state reported by a window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub file_path: Option<PathBuf>,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("window {0} is gone")]
    Disconnected(DocumentId),
    #[error("window {0} dropped the request")]
    Dropped(DocumentId),
    #[error("window {window} answered {kind} with an unexpected reply")]
    UnexpectedReply {
        window: DocumentId,
        kind: &'static str,
    },
}

#[allow(async_fn_in_trait)]
pub trait ContentProvider {
    fn window(&self) -> DocumentId;

    async fn file_path_and_content(&self) -> Result<Snapshot, ProviderError>;
    async fn is_edited(&self) -> Result<bool, ProviderError>;
    async fn set_edited(&self, edited: bool) -> Result<(), ProviderError>;
    async fn set_content(&self, content: String) -> Result<(), ProviderError>;
    async fn set_file_path(&self, path: &Path) -> Result<(), ProviderError>;
    async fn document_saved(&self, path: &Path) -> Result<(), ProviderError>;
}
