//! File watching and self-write suppression.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

const SELF_WRITE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Changed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub event: FileEvent,
}

pub trait PathWatcher {
    fn watch(&mut self, path: &Path);
    fn unwatch(&mut self, path: &Path);
    fn is_watching(&self, path: &Path) -> bool;
}

/// Paths we just wrote ourselves. The next watch event for a marked path is
/// swallowed and clears the mark.
#[derive(Debug)]
pub struct SelfWrites {
    marked: HashSet<PathBuf>,
    order: VecDeque<PathBuf>,
    capacity: usize,
}

impl Default for SelfWrites {
    fn default() -> Self {
        Self::with_capacity(SELF_WRITE_CAPACITY)
    }
}

impl SelfWrites {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            marked: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn mark(&mut self, path: &Path) {
        if !self.marked.insert(path.to_path_buf()) {
            return;
        }
        self.order.push_back(path.to_path_buf());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.marked.remove(&oldest);
            }
        }
    }

    /// Consume the mark for `path`. True when the event should be ignored.
    pub fn take(&mut self, path: &Path) -> bool {
        if !self.marked.remove(path) {
            return false;
        }
        self.order.retain(|p| p != path);
        true
    }

    pub fn forget(&mut self, path: &Path) {
        self.take(path);
    }

    pub fn is_marked(&self, path: &Path) -> bool {
        self.marked.contains(path)
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

/// Watcher used when file watching is disabled.
#[derive(Debug, Default)]
pub struct NoopWatcher;

impl PathWatcher for NoopWatcher {
    fn watch(&mut self, _path: &Path) {}
    fn unwatch(&mut self, _path: &Path) {}
    fn is_watching(&self, _path: &Path) -> bool {
        false
    }
}

/// `notify`-backed watcher. Watches each document's parent directory so that
/// atomic-rename saves by other editors are still observed, and forwards
/// events only for registered document paths.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    files: Arc<Mutex<HashSet<PathBuf>>>,
    dirs: HashMap<PathBuf, usize>,
}

impl NotifyWatcher {
    pub fn new(events: mpsc::UnboundedSender<WatchEvent>) -> notify::Result<Self> {
        let files: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
        let filter = files.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let kind = match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) => FileEvent::Changed,
                        EventKind::Remove(_) => FileEvent::Removed,
                        _ => return,
                    };
                    for path in event.paths {
                        if !lock(&filter).contains(&path) {
                            continue;
                        }
                        let kind = if kind == FileEvent::Changed && !path.exists() {
                            FileEvent::Removed
                        } else {
                            kind
                        };
                        if events.send(WatchEvent { path, event: kind }).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("file watcher error: {err}");
                }
            }
        })?;

        Ok(Self {
            watcher,
            files,
            dirs: HashMap::new(),
        })
    }
}

impl PathWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) {
        if !lock(&self.files).insert(path.to_path_buf()) {
            return;
        }
        let Some(dir) = parent_dir(path) else {
            return;
        };
        let count = self.dirs.entry(dir.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            if let Err(err) = self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                tracing::warn!("failed to watch {}: {err}", dir.display());
            }
        }
    }

    fn unwatch(&mut self, path: &Path) {
        if !lock(&self.files).remove(path) {
            return;
        }
        let Some(dir) = parent_dir(path) else {
            return;
        };
        if let Some(count) = self.dirs.get_mut(&dir) {
            *count -= 1;
            if *count == 0 {
                self.dirs.remove(&dir);
                if let Err(err) = self.watcher.unwatch(&dir) {
                    tracing::debug!("failed to unwatch {}: {err}", dir.display());
                }
            }
        }
    }

    fn is_watching(&self, path: &Path) -> bool {
        lock(&self.files).contains(path)
    }
}

fn parent_dir(path: &Path) -> Option<PathBuf> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn self_write_mark_is_one_shot() {
        let mut writes = SelfWrites::default();
        let path = Path::new("/docs/a.md");
        writes.mark(path);
        writes.mark(path);
        assert_eq!(writes.len(), 1);
        assert!(writes.take(path));
        assert!(!writes.take(path));
        assert!(writes.is_empty());
    }

    #[test]
    fn self_writes_are_bounded() {
        let mut writes = SelfWrites::with_capacity(2);
        writes.mark(Path::new("/a"));
        writes.mark(Path::new("/b"));
        writes.mark(Path::new("/c"));
        assert_eq!(writes.len(), 2);
        assert!(!writes.is_marked(Path::new("/a")));
        assert!(writes.is_marked(Path::new("/c")));
    }

    #[tokio::test]
    async fn notify_watcher_reports_changes_for_watched_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().canonicalize().unwrap();
        let watched = dir_path.join("watched.md");
        let other = dir_path.join("other.md");
        std::fs::write(&watched, "a").unwrap();
        std::fs::write(&other, "a").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = NotifyWatcher::new(tx).unwrap();
        watcher.watch(&watched);
        assert!(watcher.is_watching(&watched));
        assert!(!watcher.is_watching(&other));

        std::fs::write(&other, "b").unwrap();
        std::fs::write(&watched, "b").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.path, watched);
        assert_eq!(event.event, FileEvent::Changed);

        watcher.unwatch(&watched);
        assert!(!watcher.is_watching(&watched));
    }
}
