use serde::{Deserialize, Serialize};

use crate::{EditorRecord, ModelError, ModelResult};

/// Clipboard interchange: a JSON array of editor records.
///
/// Records on the clipboard carry no `id` and inline their bitmaps as data
/// URLs, so they can be pasted into another document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipboardPayload {
    pub records: Vec<EditorRecord>,
}

impl ClipboardPayload {
    pub fn new(records: Vec<EditorRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Parses clipboard text. Every record must validate, otherwise the
    /// whole payload is rejected.
    pub fn from_json(text: &str) -> ModelResult<Self> {
        let payload: Self = serde_json::from_str(text)?;
        for (index, record) in payload.records.iter().enumerate() {
            record.validate().map_err(|err| {
                ModelError::InvalidRecord(format!("clipboard item {index}: {err}"))
            })?;
        }
        Ok(payload)
    }

    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
