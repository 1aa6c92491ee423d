//! Editor and layer identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Layers are identified by the index of the page they sit on.
pub type LayerId = usize;

/// Prefix shared by every editor id handed out in a session.
pub const EDITOR_ID_PREFIX: &str = "pdf_annotator_editor_";

/// Unique editor id: a fixed prefix followed by a monotonic counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorId(String);

impl EditorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EditorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Hands out editor ids for one session.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> EditorId {
        let id = EditorId(format!("{EDITOR_ID_PREFIX}{}", self.next));
        self.next += 1;
        id
    }

    #[cfg(test)]
    pub(crate) fn reset(&mut self) {
        self.next = 0;
    }
}
