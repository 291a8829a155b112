//! Current-docs (session restore) and recent-docs (Open Recent) persistence.
//!
//! Both collections are normalised before every persist and after every load.
//! Normalisation is idempotent, so repeated save/load cycles never grow a list.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::watch;

use crate::model::entry::{CurrentDocEntry, EntryError, RecentDocEntry};
use crate::store::{CURRENT_FILES_KEY, PersistentStore, RECENT_FILES_KEY, StoreError};

/// OS-level recent-document list, when the platform offers one.
pub trait RecentHistory {
    fn note(&self, path: &std::path::Path);
    fn clear(&self);
}

pub struct SessionStore<S> {
    store: S,
    max_recent: usize,
    history: Option<Box<dyn RecentHistory>>,
    recent_tx: watch::Sender<Vec<RecentDocEntry>>,
}

impl<S: PersistentStore> SessionStore<S> {
    pub fn new(store: S, max_recent: usize) -> Self {
        let (recent_tx, _) = watch::channel(Vec::new());
        Self {
            store,
            max_recent,
            history: None,
            recent_tx,
        }
    }

    pub fn with_history(mut self, history: Box<dyn RecentHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Feed of the normalised recent list, republished after every change.
    pub fn subscribe_recent(&self) -> watch::Receiver<Vec<RecentDocEntry>> {
        self.recent_tx.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Recent docs ─────────────────────────────────────────────

    pub async fn load_recent_docs(&self) -> Result<Vec<RecentDocEntry>, StoreError> {
        let raw = self.store.get(RECENT_FILES_KEY).await?;
        let parsed = parse_items(raw.as_ref(), RECENT_FILES_KEY, RecentDocEntry::from_value);
        Ok(self.normalize_recent(parsed).await)
    }

    pub async fn save_recent_docs(
        &self,
        docs: Vec<RecentDocEntry>,
    ) -> Result<Vec<RecentDocEntry>, StoreError> {
        let docs = self.normalize_recent(docs).await;
        self.store
            .set(RECENT_FILES_KEY, to_value(RECENT_FILES_KEY, &docs)?)
            .await?;
        self.recent_tx.send_replace(docs.clone());
        Ok(docs)
    }

    /// Append a path to the recent list and publish the refreshed list.
    pub async fn add_recent_doc(
        &self,
        entry: RecentDocEntry,
    ) -> Result<Vec<RecentDocEntry>, StoreError> {
        tracing::info!("add recent doc {}", entry.file_path.display());
        if let Some(history) = &self.history {
            history.note(&entry.file_path);
        }

        let mut docs = self.load_recent_docs().await?;
        // Re-opening a file makes it the newest entry.
        docs.retain(|doc| doc.file_path != entry.file_path);
        docs.push(entry);
        self.save_recent_docs(docs).await
    }

    pub async fn clear_recent_docs(&self) -> Result<(), StoreError> {
        if let Some(history) = &self.history {
            history.clear();
        }
        self.store.set(RECENT_FILES_KEY, Value::Array(Vec::new())).await?;
        self.recent_tx.send_replace(Vec::new());
        Ok(())
    }

    /// Re-normalise the persisted list, pruning entries whose file disappeared.
    pub async fn prune_recent_docs(&self) -> Result<Vec<RecentDocEntry>, StoreError> {
        let docs = self.load_recent_docs().await?;
        self.save_recent_docs(docs).await
    }

    pub async fn normalize_recent(&self, docs: Vec<RecentDocEntry>) -> Vec<RecentDocEntry> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(docs.len());
        for doc in docs {
            if seen.insert(doc.file_path.clone()) {
                unique.push(doc);
            }
        }

        let mut existing = Vec::with_capacity(unique.len());
        for doc in unique {
            if tokio::fs::try_exists(&doc.file_path).await.unwrap_or(false) {
                existing.push(doc);
            } else {
                tracing::debug!("pruning missing recent doc {}", doc.file_path.display());
            }
        }

        if self.max_recent > 0 && existing.len() > self.max_recent {
            let excess = existing.len() - self.max_recent;
            existing.drain(..excess);
        }
        existing
    }

    // ── Current docs ────────────────────────────────────────────

    pub async fn load_current_docs(&self) -> Result<Vec<CurrentDocEntry>, StoreError> {
        let raw = self.store.get(CURRENT_FILES_KEY).await?;
        let parsed = parse_items(raw.as_ref(), CURRENT_FILES_KEY, CurrentDocEntry::from_value);
        Ok(normalize_current(parsed))
    }

    pub async fn save_current_docs(
        &self,
        docs: Vec<CurrentDocEntry>,
    ) -> Result<Vec<CurrentDocEntry>, StoreError> {
        let docs = normalize_current(docs);
        self.store
            .set(CURRENT_FILES_KEY, to_value(CURRENT_FILES_KEY, &docs)?)
            .await?;
        tracing::debug!("saved {} current docs", docs.len());
        Ok(docs)
    }

    /// Replace the entry with the same id, or append it.
    pub async fn update_current_doc(
        &self,
        entry: CurrentDocEntry,
    ) -> Result<Vec<CurrentDocEntry>, StoreError> {
        let mut docs = self.load_current_docs().await?;
        match docs.iter_mut().find(|saved| saved.id == entry.id) {
            Some(saved) => *saved = entry,
            None => docs.push(entry),
        }
        self.save_current_docs(docs).await
    }
}

/// Deduplicate by id, keeping the first entry that has a real path, or else
/// the first entry seen, then drop non-positive ids. Order follows each id's
/// first occurrence.
pub fn normalize_current(docs: Vec<CurrentDocEntry>) -> Vec<CurrentDocEntry> {
    let mut slots: HashMap<_, usize> = HashMap::new();
    let mut out: Vec<CurrentDocEntry> = Vec::with_capacity(docs.len());
    for doc in docs {
        match slots.get(&doc.id) {
            Some(&idx) => {
                if !out[idx].has_real_path() && doc.has_real_path() {
                    out[idx] = doc;
                }
            }
            None => {
                slots.insert(doc.id, out.len());
                out.push(doc);
            }
        }
    }
    out.retain(|doc| doc.id.0 > 0);
    out
}

fn parse_items<T>(
    raw: Option<&Value>,
    key: &str,
    parse: impl Fn(&Value) -> Result<T, EntryError>,
) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let Some(items) = raw.as_array() else {
        tracing::warn!("{key}: stored value is not a list, ignoring it");
        return Vec::new();
    };

    let mut rejected = 0usize;
    let parsed: Vec<T> = items
        .iter()
        .filter_map(|item| match parse(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                rejected += 1;
                tracing::debug!("{key}: dropping entry: {err}");
                None
            }
        })
        .collect();

    if rejected > 0 {
        tracing::warn!("{key}: dropped {rejected} invalid entries");
    }
    parsed
}

fn to_value<T: serde::Serialize>(key: &str, docs: &[T]) -> Result<Value, StoreError> {
    serde_json::to_value(docs).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })
}

pub fn recent_paths(docs: &[RecentDocEntry]) -> Vec<PathBuf> {
    docs.iter().map(|d| d.file_path.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::DocumentId;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn entry(id: u64, path: Option<&str>) -> CurrentDocEntry {
        CurrentDocEntry {
            id: DocumentId(id),
            guid: None,
            file_path: path.map(PathBuf::from),
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "x").unwrap();
        path
    }

    #[test]
    fn current_dedupe_prefers_real_path() {
        let docs = vec![
            entry(1, None),
            entry(2, Some("/b.md")),
            entry(1, Some("/a.md")),
            entry(1, Some("/c.md")),
        ];
        let normalized = normalize_current(docs);
        assert_eq!(normalized, vec![entry(1, Some("/a.md")), entry(2, Some("/b.md"))]);
        assert_eq!(normalize_current(normalized.clone()), normalized);
    }

    #[tokio::test]
    async fn current_docs_load_drops_invalid_items() {
        let store = MemoryStore::new();
        store
            .set(
                CURRENT_FILES_KEY,
                json!([
                    "junk",
                    null,
                    {"id": 0, "filePath": "/z.md"},
                    {"id": 3, "filePath": "", "x": 1, "y": 2, "width": 10, "height": 20},
                    {"id": 3, "filePath": "/a.md", "x": 1, "y": 2, "width": 10, "height": 20}
                ]),
            )
            .await
            .unwrap();

        let session = SessionStore::new(store, 10);
        let docs = session.load_current_docs().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_path, Some(PathBuf::from("/a.md")));
        assert_eq!((docs[0].width, docs[0].height), (10, 20));
    }

    #[tokio::test]
    async fn current_docs_round_trip() {
        let session = SessionStore::new(MemoryStore::new(), 10);
        let input = vec![entry(2, None), entry(1, Some("/a.md")), entry(2, Some("/b.md"))];
        let expected = normalize_current(input.clone());

        let saved = session.save_current_docs(input).await.unwrap();
        assert_eq!(saved, expected);
        assert_eq!(session.load_current_docs().await.unwrap(), expected);

        session.save_current_docs(saved).await.unwrap();
        assert_eq!(session.load_current_docs().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn non_positive_ids_never_reach_the_store() {
        let session = SessionStore::new(MemoryStore::new(), 10);
        let input = vec![entry(0, Some("/z.md")), entry(1, Some("/a.md"))];
        let normalized = normalize_current(input.clone());
        assert_eq!(normalized, vec![entry(1, Some("/a.md"))]);

        session.save_current_docs(input).await.unwrap();
        assert_eq!(session.load_current_docs().await.unwrap(), normalized);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unserializable_path_keeps_previous_list() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let session = SessionStore::new(MemoryStore::new(), 10);
        session.update_current_doc(entry(1, Some("/a.md"))).await.unwrap();

        let mut bad = entry(2, None);
        bad.file_path = Some(PathBuf::from(OsStr::from_bytes(b"/tmp/\xff.md")));
        let err = session.update_current_doc(bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialize { .. }));
        assert_eq!(
            session.load_current_docs().await.unwrap(),
            vec![entry(1, Some("/a.md"))]
        );
    }

    #[tokio::test]
    async fn update_current_doc_replaces_by_id() {
        let session = SessionStore::new(MemoryStore::new(), 10);
        session.update_current_doc(entry(1, None)).await.unwrap();
        session.update_current_doc(entry(2, Some("/b.md"))).await.unwrap();
        let docs = session.update_current_doc(entry(1, Some("/a.md"))).await.unwrap();
        assert_eq!(docs, vec![entry(1, Some("/a.md")), entry(2, Some("/b.md"))]);
    }

    #[tokio::test]
    async fn recent_docs_dedupe_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.md");
        let b = touch(dir.path(), "b.md");
        let missing = dir.path().join("missing.md");

        let store = MemoryStore::new();
        store
            .set(
                RECENT_FILES_KEY,
                json!([
                    {"filePath": a, "id": 1},
                    {"filePath": a, "id": 2, "x": 40},
                    {"filePath": ""},
                    7,
                    {"filePath": missing},
                    {"filePath": b}
                ]),
            )
            .await
            .unwrap();

        let session = SessionStore::new(store, 10);
        let docs = session.load_recent_docs().await.unwrap();
        assert_eq!(recent_paths(&docs), vec![a.clone(), b.clone()]);

        let again = session.normalize_recent(docs.clone()).await;
        assert_eq!(again, docs);
    }

    #[tokio::test]
    async fn add_recent_doc_publishes_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4).map(|i| touch(dir.path(), &format!("{i}.md"))).collect();

        let session = SessionStore::new(MemoryStore::new(), 3);
        let rx = session.subscribe_recent();
        for path in &paths {
            session.add_recent_doc(RecentDocEntry::new(path)).await.unwrap();
        }
        session.add_recent_doc(RecentDocEntry::new(&paths[3])).await.unwrap();

        let published = rx.borrow().clone();
        assert_eq!(recent_paths(&published), paths[1..].to_vec());
        assert_eq!(session.load_recent_docs().await.unwrap(), published);
    }

    #[tokio::test]
    async fn re_added_doc_survives_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3).map(|i| touch(dir.path(), &format!("{i}.md"))).collect();

        let session = SessionStore::new(MemoryStore::new(), 3);
        for path in &paths {
            session.add_recent_doc(RecentDocEntry::new(path)).await.unwrap();
        }
        session.add_recent_doc(RecentDocEntry::new(&paths[0])).await.unwrap();
        let newest = touch(dir.path(), "3.md");
        let docs = session.add_recent_doc(RecentDocEntry::new(&newest)).await.unwrap();

        assert_eq!(
            recent_paths(&docs),
            vec![paths[2].clone(), paths[0].clone(), newest]
        );
    }

    #[derive(Default)]
    struct FakeHistory {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecentHistory for FakeHistory {
        fn note(&self, path: &Path) {
            self.calls.lock().unwrap().push(format!("note {}", path.display()));
        }

        fn clear(&self) {
            self.calls.lock().unwrap().push("clear".to_string());
        }
    }

    #[tokio::test]
    async fn clear_recent_docs_empties_store_and_os_history() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.md");
        let history = FakeHistory::default();
        let calls = history.calls.clone();

        let session = SessionStore::new(MemoryStore::new(), 10).with_history(Box::new(history));
        let rx = session.subscribe_recent();
        session.add_recent_doc(RecentDocEntry::new(&a)).await.unwrap();
        session.clear_recent_docs().await.unwrap();

        assert!(session.load_recent_docs().await.unwrap().is_empty());
        assert!(rx.borrow().is_empty());
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec![format!("note {}", a.display()), "clear".to_string()]
        );
    }
}
