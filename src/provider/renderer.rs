//! Window-side host answering bridge requests from a shared [`Buffer`].

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::Snapshot;
use super::bridge::{Reply, ReplyBody, Request, RequestBody};
use crate::model::buffer::Buffer;

pub type SharedBuffer = Arc<Mutex<Buffer>>;

/// Spawn a renderer task for one window. Returns the request sink to hand to
/// [`super::Bridge::connect`]. The task ends when the sink is dropped.
pub fn spawn_renderer(
    buffer: SharedBuffer,
    replies: mpsc::UnboundedSender<Reply>,
) -> mpsc::UnboundedSender<Request> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let body = answer(&buffer, request.body);
            if replies.send(Reply { id: request.id, body }).is_err() {
                break;
            }
        }
    });
    tx
}

pub fn answer(buffer: &SharedBuffer, body: RequestBody) -> ReplyBody {
    let mut buf = lock(buffer);
    match body {
        RequestBody::FilePathAndContent => ReplyBody::FilePathAndContent(Snapshot {
            file_path: buf.path.clone(),
            content: buf.content.clone(),
        }),
        RequestBody::IsEdited => ReplyBody::IsEdited(buf.dirty),
        RequestBody::SetEdited(edited) => {
            buf.dirty = edited;
            ReplyBody::Ack
        }
        RequestBody::SetContent(content) => {
            buf.load(content);
            ReplyBody::Ack
        }
        RequestBody::SetFilePath(path) => {
            buf.set_path(&path);
            ReplyBody::Ack
        }
        RequestBody::DocumentSaved(path) => {
            buf.set_path(&path);
            buf.dirty = false;
            ReplyBody::Ack
        }
    }
}

pub fn lock(buffer: &SharedBuffer) -> MutexGuard<'_, Buffer> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
