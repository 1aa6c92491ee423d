use annotation_model::AnnotationEditorType;
use serde::Serialize;

use crate::editor::Editor;
use crate::ids::EditorId;

/// Flags a toolbar needs, re-derived after every operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub is_editing: bool,
    pub has_selected_editor: bool,
    pub has_something_to_undo: bool,
    pub has_something_to_redo: bool,
    pub has_empty_clipboard: bool,
    pub is_empty: bool,
}

/// Rendering surface the editing core talks to.
///
/// Every method defaults to doing nothing, so a host only implements what it
/// draws. Calls are made after the state they describe has been applied.
pub trait RenderHooks {
    /// An editor was added or came back through undo.
    fn render(&mut self, _editor: &Editor) {}

    /// Content, style or geometry of a live editor changed.
    fn redraw(&mut self, _editor: &Editor) {}

    /// The editor's page became visible.
    fn show(&mut self, _id: &EditorId) {}

    /// The editor's page was hidden; the editor itself lives on.
    fn hide(&mut self, _id: &EditorId) {}

    fn remove(&mut self, _id: &EditorId) {}

    fn mode_changed(&mut self, _mode: AnnotationEditorType) {}

    fn selection_changed(&mut self, _selection: &[EditorId]) {}

    fn state_changed(&mut self, _state: &UiState) {}
}

/// Hooks for a headless session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl RenderHooks for NoopHooks {}
