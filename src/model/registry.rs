use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::document::{Document, DocumentId, Geometry, is_blank_path};

/// In-memory map of open windows to their documents.
#[derive(Debug)]
pub struct DocumentRegistry {
    documents: BTreeMap<DocumentId, Document>,
    next_id: u64,
    untitled_index: u32,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self {
            documents: BTreeMap::new(),
            next_id: 1,
            untitled_index: 1,
        }
    }
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new window's document. A restored document keeps its guid.
    pub fn insert(
        &mut self,
        file_path: Option<PathBuf>,
        guid: Option<Uuid>,
        geometry: Geometry,
    ) -> &Document {
        let id = DocumentId(self.next_id);
        self.next_id += 1;

        let file_path = file_path.filter(|p| !is_blank_path(Some(p)));
        let doc = Document {
            id,
            guid: guid.unwrap_or_else(Uuid::new_v4),
            file_path,
            geometry,
        };
        self.documents.entry(id).or_insert(doc)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn remove(&mut self, id: DocumentId) -> Option<Document> {
        self.documents.remove(&id)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Document> {
        self.documents
            .values()
            .find(|doc| doc.real_path().is_some_and(|p| same_file_path(p, path)))
    }

    /// Set a document's path. A present path never silently reverts to absent.
    pub fn update_path(&mut self, id: DocumentId, path: PathBuf) -> Option<PathBuf> {
        let doc = self.documents.get_mut(&id)?;
        if is_blank_path(Some(&path)) {
            return doc.file_path.clone();
        }
        doc.file_path.replace(path)
    }

    pub fn update_geometry(&mut self, id: DocumentId, geometry: Geometry) -> bool {
        match self.documents.get_mut(&id) {
            Some(doc) => {
                doc.geometry = geometry;
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.documents.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Title for a window without a path: "Untitled N".
    pub fn next_untitled_title(&mut self) -> String {
        let title = format!("Untitled {}", self.untitled_index);
        self.untitled_index += 1;
        title
    }
}

pub fn same_file_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    let a_canon = std::fs::canonicalize(a);
    let b_canon = std::fs::canonicalize(b);
    matches!((a_canon, b_canon), (Ok(ca), Ok(cb)) if ca == cb)
}
