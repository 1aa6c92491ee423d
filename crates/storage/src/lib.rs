//! Annotation storage
//!
//! Key/value bridge between committed editors and the PDF-saving pipeline.
//! Editors write their serialized record under their id; the save pipeline
//! reads the [`SerializableStorage`] projection.

mod annotation_storage;
mod frozen;
mod serializable;
mod sidecar;

use serde_json::Value;

pub use annotation_storage::AnnotationStorage;
pub use frozen::FrozenAnnotationStorage;
pub use serializable::{compute_hash, SerializableStorage};
pub use sidecar::AnnotationSidecar;

/// Property set stored under one key.
pub type ValueBag = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is frozen and cannot be modified")]
    Frozen,
    #[error("value for `{0}` is not an object")]
    NotAnObject(String),
    #[error("unsupported sidecar version {0}")]
    UnsupportedVersion(u32),
    #[error("sidecar hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read/write surface shared by the live and the frozen storage.
pub trait AnnotationStore {
    /// Stored fields merged over `default`. `default` itself is left untouched.
    fn get_value(&self, key: &str, default: &ValueBag) -> ValueBag;

    fn get_raw_value(&self, key: &str) -> Option<&ValueBag>;

    fn set_value(&mut self, key: &str, value: ValueBag) -> StorageResult<()>;

    fn remove(&mut self, key: &str) -> StorageResult<()>;

    fn has(&self, key: &str) -> bool {
        self.get_raw_value(key).is_some()
    }

    fn size(&self) -> usize;

    fn modified(&self) -> bool;

    fn serializable(&self) -> SerializableStorage;
}

/// Converts a JSON value into a property bag.
pub fn to_value_bag(key: &str, value: Value) -> StorageResult<ValueBag> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StorageError::NotAnObject(key.to_owned())),
    }
}

pub(crate) fn merge_over(default: &ValueBag, stored: Option<&ValueBag>) -> ValueBag {
    let mut merged = default.clone();
    if let Some(stored) = stored {
        for (field, value) in stored {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}
