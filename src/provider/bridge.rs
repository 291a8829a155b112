//! Main-side transport: every request carries a correlation id scoped to
//! (window, request kind, sequence) and is parked in a pending table until the
//! matching reply arrives. Replies that do not match an outstanding request
//! are dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

use super::{ContentProvider, ProviderError, Snapshot};
use crate::model::document::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    FilePathAndContent,
    IsEdited,
    SetEdited,
    SetContent,
    SetFilePath,
    DocumentSaved,
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::FilePathAndContent => "filepath_content",
            Self::IsEdited => "is_edited",
            Self::SetEdited => "set_edited",
            Self::SetContent => "set-content",
            Self::SetFilePath => "set-filepath",
            Self::DocumentSaved => "document_saved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub window: DocumentId,
    pub kind: RequestKind,
    pub seq: u64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.kind.name(), self.window, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    FilePathAndContent,
    IsEdited,
    SetEdited(bool),
    SetContent(String),
    SetFilePath(PathBuf),
    DocumentSaved(PathBuf),
}

impl RequestBody {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::FilePathAndContent => RequestKind::FilePathAndContent,
            Self::IsEdited => RequestKind::IsEdited,
            Self::SetEdited(_) => RequestKind::SetEdited,
            Self::SetContent(_) => RequestKind::SetContent,
            Self::SetFilePath(_) => RequestKind::SetFilePath,
            Self::DocumentSaved(_) => RequestKind::DocumentSaved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    FilePathAndContent(Snapshot),
    IsEdited(bool),
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: RequestId,
    pub body: ReplyBody,
}

type Pending = HashMap<RequestId, oneshot::Sender<ReplyBody>>;

#[derive(Debug)]
struct Inner {
    pending: Mutex<Pending>,
    windows: Mutex<HashMap<DocumentId, mpsc::UnboundedSender<Request>>>,
    seq: AtomicU64,
}

/// Shared request/response table for all windows.
#[derive(Debug, Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                windows: Mutex::new(HashMap::new()),
                seq: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a window's request sink. Replaces any previous sink for `window`.
    pub fn connect(
        &self,
        window: DocumentId,
        requests: mpsc::UnboundedSender<Request>,
    ) -> WindowChannel {
        lock(&self.inner.windows).insert(window, requests);
        WindowChannel {
            window,
            bridge: self.clone(),
        }
    }

    /// Detach a window and fail its outstanding requests.
    pub fn disconnect(&self, window: DocumentId) {
        lock(&self.inner.windows).remove(&window);
        lock(&self.inner.pending).retain(|id, _| id.window != window);
    }

    pub fn channel(&self, window: DocumentId) -> Option<WindowChannel> {
        lock(&self.inner.windows)
            .contains_key(&window)
            .then(|| WindowChannel {
                window,
                bridge: self.clone(),
            })
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Route a reply to the request it answers. Returns false when ignored.
    pub fn deliver(&self, reply: Reply) -> bool {
        let Some(tx) = lock(&self.inner.pending).remove(&reply.id) else {
            tracing::warn!("ignoring reply {} with no outstanding request", reply.id);
            return false;
        };
        if tx.send(reply.body).is_err() {
            tracing::debug!("requester for {} went away", reply.id);
            return false;
        }
        true
    }

    /// Drain replies from all windows into the pending table.
    pub fn spawn_router(&self, mut replies: mpsc::UnboundedReceiver<Reply>) {
        let bridge = self.clone();
        tokio::spawn(async move {
            while let Some(reply) = replies.recv().await {
                bridge.deliver(reply);
            }
            tracing::debug!("reply router stopped");
        });
    }

    async fn request(
        &self,
        window: DocumentId,
        body: RequestBody,
    ) -> Result<ReplyBody, ProviderError> {
        let id = RequestId {
            window,
            kind: body.kind(),
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
        };

        let sink = lock(&self.inner.windows)
            .get(&window)
            .cloned()
            .ok_or(ProviderError::Disconnected(window))?;

        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);

        if sink.send(Request { id, body }).is_err() {
            lock(&self.inner.pending).remove(&id);
            return Err(ProviderError::Disconnected(window));
        }

        tracing::debug!("request {id}");
        rx.await.map_err(|_| ProviderError::Dropped(window))
    }
}

/// One window's view of the bridge.
#[derive(Debug, Clone)]
pub struct WindowChannel {
    window: DocumentId,
    bridge: Bridge,
}

impl WindowChannel {
    async fn ack(&self, body: RequestBody) -> Result<(), ProviderError> {
        let kind = body.kind().name();
        match self.bridge.request(self.window, body).await? {
            ReplyBody::Ack => Ok(()),
            _ => Err(ProviderError::UnexpectedReply {
                window: self.window,
                kind,
            }),
        }
    }
}

impl ContentProvider for WindowChannel {
    fn window(&self) -> DocumentId {
        self.window
    }

    async fn file_path_and_content(&self) -> Result<Snapshot, ProviderError> {
        match self
            .bridge
            .request(self.window, RequestBody::FilePathAndContent)
            .await?
        {
            ReplyBody::FilePathAndContent(snapshot) => Ok(snapshot),
            _ => Err(ProviderError::UnexpectedReply {
                window: self.window,
                kind: RequestKind::FilePathAndContent.name(),
            }),
        }
    }

    async fn is_edited(&self) -> Result<bool, ProviderError> {
        match self.bridge.request(self.window, RequestBody::IsEdited).await? {
            ReplyBody::IsEdited(edited) => Ok(edited),
            _ => Err(ProviderError::UnexpectedReply {
                window: self.window,
                kind: RequestKind::IsEdited.name(),
            }),
        }
    }

    async fn set_edited(&self, edited: bool) -> Result<(), ProviderError> {
        self.ack(RequestBody::SetEdited(edited)).await
    }

    async fn set_content(&self, content: String) -> Result<(), ProviderError> {
        self.ack(RequestBody::SetContent(content)).await
    }

    async fn set_file_path(&self, path: &Path) -> Result<(), ProviderError> {
        self.ack(RequestBody::SetFilePath(path.to_path_buf())).await
    }

    async fn document_saved(&self, path: &Path) -> Result<(), ProviderError> {
        self.ack(RequestBody::DocumentSaved(path.to_path_buf())).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
