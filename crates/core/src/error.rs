//! Error types for the editing core

use annotation_model::ModelError;
use annotation_storage::StorageError;

use crate::config::ConfigError;
use crate::ids::EditorId;

/// Errors surfaced by editing operations
///
/// User-triggered failures never leave partial state behind: the operation
/// that returns one of these has not queued any command.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Rotation that is not a multiple of 90 degrees
    #[error("invalid rotation {0}, expected a multiple of 90")]
    InvalidRotation(i32),

    /// Editor id not known to the manager
    #[error("editor not found: {0}")]
    EditorNotFound(EditorId),

    /// No layer registered for the page
    #[error("no layer for page {0}")]
    LayerNotFound(usize),

    /// Operation needs an active editor of a given kind
    #[error("no active {0} editor")]
    NoActiveEditor(&'static str),

    /// Editor exists but is of another kind
    #[error("editor {id} is not a {expected} editor")]
    WrongEditorKind { id: EditorId, expected: &'static str },

    /// Parameter does not apply to the editor kind
    #[error("parameter {param:?} does not apply to {editor}")]
    ParamMismatch { param: annotation_model::EditorParamType, editor: &'static str },

    /// Value of the wrong kind for the parameter
    #[error("invalid value for parameter {0:?}")]
    InvalidParamValue(annotation_model::EditorParamType),

    /// Clipboard content could not be used
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// Bitmap could not be resolved or decoded
    #[error("bitmap error: {0}")]
    Bitmap(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type EditorResult<T> = Result<T, EditorError>;
