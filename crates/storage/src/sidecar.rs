use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{compute_hash, SerializableStorage, StorageError, StorageResult};

const SIDECAR_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SidecarEnvelope {
    version: u32,
    annotations: SerializableStorage,
}

/// JSON file holding a saved [`SerializableStorage`] next to a document.
#[derive(Debug, Clone)]
pub struct AnnotationSidecar {
    path: PathBuf,
}

impl AnnotationSidecar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sidecar path for a document: `<document>.annotations.json`.
    pub fn for_document(document: &Path) -> Self {
        let mut name = document.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        name.push(".annotations.json");
        Self { path: document.with_file_name(name) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, annotations: &SerializableStorage) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let envelope =
            SidecarEnvelope { version: SIDECAR_SCHEMA_VERSION, annotations: annotations.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Loads the sidecar, `None` when it does not exist.
    pub fn load(&self) -> StorageResult<Option<SerializableStorage>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: SidecarEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != SIDECAR_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        let computed = compute_hash(&envelope.annotations.map);
        if computed != envelope.annotations.hash {
            return Err(StorageError::HashMismatch {
                stored: envelope.annotations.hash,
                computed,
            });
        }

        Ok(Some(envelope.annotations))
    }
}
