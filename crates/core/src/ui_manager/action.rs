//! Serializable form of every manager operation
//!
//! Hosts that talk to the core over a message channel, and the replay tool,
//! describe operations as [`UiAction`] values and feed them to
//! [`UiManager::dispatch`].

use annotation_model::{AnnotationEditorType, EditorParamType, EditorRecord};
use serde::{Deserialize, Serialize};

use super::{NudgeDirection, ResizeHandle, UiManager};
use crate::bitmap_cache::{BitmapSource, DecodedBitmap};
use crate::editor::ParamValue;
use crate::error::{EditorError, EditorResult};
use crate::geometry::{NormalizedBox, Point, Viewport};
use crate::ids::EditorId;

/// One operation on the editing session. Pointer positions are layer
/// pixels unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiAction {
    UpdateMode {
        mode: AnnotationEditorType,
        #[serde(default)]
        edit_id: Option<EditorId>,
    },
    AddLayer {
        page_index: usize,
        viewport: Viewport,
    },
    RemoveLayer {
        page_index: usize,
    },
    UpdateViewport {
        page_index: usize,
        viewport: Viewport,
    },
    SetCurrentPage {
        page_index: usize,
    },
    CreateFreeText {
        page_index: usize,
        x: f64,
        y: f64,
    },
    SetText {
        text: String,
    },
    EnterEditMode {
        id: EditorId,
    },
    CommitOrRemove,
    InkDown {
        page_index: usize,
        x: f64,
        y: f64,
    },
    InkMove {
        x: f64,
        y: f64,
    },
    InkUp,
    /// Text selection boxes, display-normalized.
    Highlight {
        page_index: usize,
        boxes: Vec<NormalizedBox>,
    },
    FreeHighlightStart {
        page_index: usize,
        x: f64,
        y: f64,
    },
    FreeHighlightMove {
        x: f64,
        y: f64,
    },
    FreeHighlightEnd,
    /// `center` is display-normalized.
    CreateStamp {
        page_index: usize,
        source: BitmapSource,
        #[serde(default)]
        center: Option<Point>,
    },
    /// Answer to a bitmap request: either the decoded image or an error.
    BitmapLoaded {
        id: EditorId,
        #[serde(default)]
        bitmap: Option<DecodedBitmap>,
        #[serde(default)]
        error: Option<String>,
    },
    UpdateParams {
        param: EditorParamType,
        value: ParamValue,
    },
    LoadExisting {
        record: EditorRecord,
        annotation_element_id: String,
    },
    SetAltText {
        id: EditorId,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        decorative: bool,
    },
    Select {
        id: EditorId,
    },
    ToggleSelected {
        id: EditorId,
    },
    AddToSelection {
        id: EditorId,
    },
    SelectAll,
    UnselectAll,
    Delete,
    Undo,
    Redo,
    Copy,
    Cut,
    Paste {
        #[serde(default)]
        text: Option<String>,
    },
    Translate {
        dx: f64,
        dy: f64,
    },
    Nudge {
        direction: NudgeDirection,
        #[serde(default)]
        big: bool,
    },
    DragStart,
    Drag {
        dx: f64,
        dy: f64,
    },
    MoveToPage {
        page_index: usize,
    },
    DragEnd,
    Resize {
        id: EditorId,
        handle: ResizeHandle,
        dx: f64,
        dy: f64,
    },
    FinishGesture,
    Tick,
    Destroy,
}

/// What an operation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum ActionOutcome {
    Done,
    /// Whether the operation had an effect.
    Flag(bool),
    Editor(Option<EditorId>),
    Editors(Vec<EditorId>),
    Clipboard(Option<String>),
    Count(usize),
}

impl UiManager {
    /// Runs one operation.
    pub fn dispatch(&mut self, action: UiAction) -> EditorResult<ActionOutcome> {
        use ActionOutcome::{Clipboard, Count, Done, Editor, Editors, Flag};

        let outcome = match action {
            UiAction::UpdateMode { mode, edit_id } => {
                self.update_mode(mode, edit_id.as_ref())?;
                Done
            }
            UiAction::AddLayer { page_index, viewport } => {
                self.add_layer(page_index, viewport);
                Done
            }
            UiAction::RemoveLayer { page_index } => Flag(self.remove_layer(page_index)),
            UiAction::UpdateViewport { page_index, viewport } => {
                self.update_viewport(page_index, viewport)?;
                Done
            }
            UiAction::SetCurrentPage { page_index } => {
                self.set_current_page(page_index);
                Done
            }
            UiAction::CreateFreeText { page_index, x, y } => {
                Editor(Some(self.create_free_text(page_index, Point::new(x, y))?))
            }
            UiAction::SetText { text } => {
                self.set_text(&text)?;
                Done
            }
            UiAction::EnterEditMode { id } => {
                self.enter_edit_mode(&id)?;
                Done
            }
            UiAction::CommitOrRemove => Flag(self.commit_or_remove()),
            UiAction::InkDown { page_index, x, y } => {
                Editor(Some(self.ink_pointer_down(page_index, Point::new(x, y))?))
            }
            UiAction::InkMove { x, y } => Flag(self.ink_pointer_move(Point::new(x, y))?),
            UiAction::InkUp => {
                self.ink_pointer_up()?;
                Done
            }
            UiAction::Highlight { page_index, boxes } => Editor(self.create_highlight(page_index, &boxes)?),
            UiAction::FreeHighlightStart { page_index, x, y } => {
                Editor(Some(self.start_free_highlight(page_index, Point::new(x, y))?))
            }
            UiAction::FreeHighlightMove { x, y } => Flag(self.free_highlight_move(Point::new(x, y))?),
            UiAction::FreeHighlightEnd => Editor(self.end_free_highlight()?),
            UiAction::CreateStamp { page_index, source, center } => {
                Editor(Some(self.create_stamp(page_index, source, center)?))
            }
            UiAction::BitmapLoaded { id, bitmap, error } => {
                let result = match (bitmap, error) {
                    (Some(bitmap), None) => Ok(bitmap),
                    (_, Some(error)) => Err(error),
                    (None, None) => {
                        return Err(EditorError::Bitmap("bitmap answer without image or error".to_owned()))
                    }
                };
                Flag(self.bitmap_loaded(&id, result)?)
            }
            UiAction::UpdateParams { param, value } => {
                self.update_params(param, value)?;
                Done
            }
            UiAction::LoadExisting { record, annotation_element_id } => {
                Editor(Some(self.load_existing(&record, &annotation_element_id)?))
            }
            UiAction::SetAltText { id, text, decorative } => {
                self.set_alt_text(&id, text, decorative)?;
                Done
            }
            UiAction::Select { id } => {
                self.set_selected(&id)?;
                Done
            }
            UiAction::ToggleSelected { id } => {
                self.toggle_selected(&id)?;
                Done
            }
            UiAction::AddToSelection { id } => {
                self.add_to_selection(&id)?;
                Done
            }
            UiAction::SelectAll => {
                self.select_all();
                Done
            }
            UiAction::UnselectAll => {
                self.unselect_all();
                Done
            }
            UiAction::Delete => Count(self.delete()),
            UiAction::Undo => Flag(self.undo()),
            UiAction::Redo => Flag(self.redo()),
            UiAction::Copy => Clipboard(self.copy()?),
            UiAction::Cut => Clipboard(self.cut()?),
            UiAction::Paste { text } => Editors(self.paste(text.as_deref())?),
            UiAction::Translate { dx, dy } => {
                self.translate_selected(dx, dy);
                Done
            }
            UiAction::Nudge { direction, big } => {
                self.nudge(direction, big);
                Done
            }
            UiAction::DragStart => Flag(self.set_up_drag_session()),
            UiAction::Drag { dx, dy } => {
                self.drag_selected_editors(dx, dy)?;
                Done
            }
            UiAction::MoveToPage { page_index } => {
                self.move_selected_to_page(page_index)?;
                Done
            }
            UiAction::DragEnd => Flag(self.end_drag_session()),
            UiAction::Resize { id, handle, dx, dy } => {
                self.resize(&id, handle, dx, dy)?;
                Done
            }
            UiAction::FinishGesture => {
                self.finish_gesture();
                Done
            }
            UiAction::Tick => Flag(self.tick()),
            UiAction::Destroy => {
                self.destroy();
                Done
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_camel_case_json() {
        let action: UiAction =
            serde_json::from_str(r#"{"action":"createFreeText","pageIndex":0,"x":10,"y":20}"#).unwrap();
        assert_eq!(action, UiAction::CreateFreeText { page_index: 0, x: 10.0, y: 20.0 });

        let action: UiAction = serde_json::from_str(r#"{"action":"nudge","direction":"left"}"#).unwrap();
        assert_eq!(action, UiAction::Nudge { direction: NudgeDirection::Left, big: false });
    }

    #[test]
    fn mode_and_params_use_wire_codes() {
        let action: UiAction = serde_json::from_str(r#"{"action":"updateMode","mode":15}"#).unwrap();
        assert_eq!(action, UiAction::UpdateMode { mode: AnnotationEditorType::Ink, edit_id: None });

        let action: UiAction =
            serde_json::from_str(r#"{"action":"updateParams","param":22,"value":4}"#).unwrap();
        assert_eq!(
            action,
            UiAction::UpdateParams { param: EditorParamType::InkThickness, value: ParamValue::Number(4.0) }
        );
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert!(serde_json::from_str::<UiAction>(r#"{"action":"explode"}"#).is_err());
    }

    #[test]
    fn outcomes_serialize_with_a_tag() {
        let json = serde_json::to_value(ActionOutcome::Count(2)).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "count", "value": 2}));
        let json = serde_json::to_value(ActionOutcome::Done).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "done"}));
    }
}
