//! Typed records persisted under the recent/current document keys.
//!
//! Stored values are untrusted: every item is validated on its own and an
//! invalid item is dropped without affecting its neighbours.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use super::document::{Document, DocumentId, Geometry, is_blank_path};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("entry has no file path")]
    MissingPath,
    #[error("entry id must be a positive integer")]
    InvalidId,
    #[error("entry field `{0}` is malformed")]
    Malformed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDocEntry {
    pub file_path: PathBuf,
}

impl RecentDocEntry {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EntryError> {
        let obj = value.as_object().ok_or(EntryError::NotAnObject)?;
        let path = match obj.get("filePath") {
            Some(Value::String(s)) => PathBuf::from(s),
            Some(Value::Null) | None => return Err(EntryError::MissingPath),
            Some(_) => return Err(EntryError::Malformed("filePath")),
        };
        if is_blank_path(Some(&path)) {
            return Err(EntryError::MissingPath);
        }
        Ok(Self::new(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDocEntry {
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CurrentDocEntry {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id,
            guid: Some(doc.guid),
            file_path: doc.real_path().map(PathBuf::from),
            x: doc.geometry.x,
            y: doc.geometry.y,
            width: doc.geometry.width,
            height: doc.geometry.height,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn has_real_path(&self) -> bool {
        !is_blank_path(self.file_path.as_deref())
    }

    pub fn from_value(value: &Value) -> Result<Self, EntryError> {
        let obj = value.as_object().ok_or(EntryError::NotAnObject)?;

        let id = obj
            .get("id")
            .and_then(Value::as_u64)
            .filter(|id| *id > 0)
            .ok_or(EntryError::InvalidId)?;

        let guid = match obj.get("guid") {
            Some(Value::String(s)) => {
                Some(Uuid::parse_str(s).map_err(|_| EntryError::Malformed("guid"))?)
            }
            Some(Value::Null) | None => None,
            Some(_) => return Err(EntryError::Malformed("guid")),
        };

        let file_path = match obj.get("filePath") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(PathBuf::from(s)),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(_) => return Err(EntryError::Malformed("filePath")),
        };

        let defaults = Geometry::default();
        Ok(Self {
            id: DocumentId(id),
            guid,
            file_path,
            x: int_field(obj, "x", i64::from(defaults.x))? as i32,
            y: int_field(obj, "y", i64::from(defaults.y))? as i32,
            width: uint_field(obj, "width", defaults.width)?,
            height: uint_field(obj, "height", defaults.height)?,
        })
    }
}

fn int_field(
    obj: &serde_json::Map<String, Value>,
    key: &'static str,
    default: i64,
) -> Result<i64, EntryError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .filter(|n| i32::try_from(*n).is_ok())
            .ok_or(EntryError::Malformed(key)),
    }
}

fn uint_field(
    obj: &serde_json::Map<String, Value>,
    key: &'static str,
    default: u32,
) -> Result<u32, EntryError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(EntryError::Malformed(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recent_requires_object_with_path() {
        assert_eq!(
            RecentDocEntry::from_value(&json!("a.md")),
            Err(EntryError::NotAnObject)
        );
        assert_eq!(
            RecentDocEntry::from_value(&json!({"filePath": "  "})),
            Err(EntryError::MissingPath)
        );
        assert_eq!(
            RecentDocEntry::from_value(&json!({"filePath": 3})),
            Err(EntryError::Malformed("filePath"))
        );
        assert_eq!(
            RecentDocEntry::from_value(&json!({"filePath": "/a.md", "id": 7})),
            Ok(RecentDocEntry::new("/a.md"))
        );
    }

    #[test]
    fn current_requires_positive_integer_id() {
        assert_eq!(
            CurrentDocEntry::from_value(&json!({"id": 0})),
            Err(EntryError::InvalidId)
        );
        assert_eq!(
            CurrentDocEntry::from_value(&json!({"id": -3})),
            Err(EntryError::InvalidId)
        );
        assert_eq!(
            CurrentDocEntry::from_value(&json!({"id": 1.5})),
            Err(EntryError::InvalidId)
        );
        assert_eq!(
            CurrentDocEntry::from_value(&json!({"id": "2"})),
            Err(EntryError::InvalidId)
        );
    }

    #[test]
    fn current_blank_path_is_untitled() {
        let entry =
            CurrentDocEntry::from_value(&json!({"id": 4, "filePath": "", "x": 5})).unwrap();
        assert_eq!(entry.file_path, None);
        assert_eq!(entry.x, 5);
        assert_eq!(entry.width, Geometry::default().width);
    }

    #[test]
    fn current_round_trips_through_json() {
        let entry = CurrentDocEntry {
            id: DocumentId(3),
            guid: Some(Uuid::new_v4()),
            file_path: Some(PathBuf::from("/docs/a.md")),
            x: -10,
            y: 20,
            width: 640,
            height: 480,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["filePath"], json!("/docs/a.md"));
        assert_eq!(CurrentDocEntry::from_value(&value), Ok(entry));
    }

    #[test]
    fn current_rejects_bad_guid() {
        assert_eq!(
            CurrentDocEntry::from_value(&json!({"id": 1, "guid": "nope"})),
            Err(EntryError::Malformed("guid"))
        );
    }
}
