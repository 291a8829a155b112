pub mod buffer;
pub mod config;
pub mod document;
pub mod entry;
pub mod registry;

pub use document::{Document, DocumentId, Geometry};
pub use entry::{CurrentDocEntry, EntryError, RecentDocEntry};
pub use registry::DocumentRegistry;
