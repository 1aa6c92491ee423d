use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use annotation_model::{AnnotationEditorType, EditorParamType, EditorRecord, Rgb};
use annotation_storage::{AnnotationStore, ValueBag};
use pdf_annotator_scheduler::ManualClock;
use serde_json::{json, Value};

use super::*;
use crate::bitmap_cache::{BitmapSource, DecodedBitmap};
use crate::config::EditorConfig;
use crate::editor::{Editor, EditorKind, ParamValue};
use crate::error::EditorError;
use crate::geometry::{NormalizedBox, Point, Viewport};
use crate::ids::EditorId;

const EPSILON: f64 = 1e-9;

#[derive(Clone, Default)]
struct RecordingHooks {
    events: Rc<RefCell<Vec<String>>>,
}

impl RecordingHooks {
    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl RenderHooks for RecordingHooks {
    fn render(&mut self, editor: &Editor) {
        self.push(format!("render:{}", editor.id()));
    }

    fn redraw(&mut self, editor: &Editor) {
        self.push(format!("redraw:{}", editor.id()));
    }

    fn show(&mut self, id: &EditorId) {
        self.push(format!("show:{id}"));
    }

    fn hide(&mut self, id: &EditorId) {
        self.push(format!("hide:{id}"));
    }

    fn remove(&mut self, id: &EditorId) {
        self.push(format!("remove:{id}"));
    }

    fn mode_changed(&mut self, mode: AnnotationEditorType) {
        self.push(format!("mode:{}", mode.name()));
    }
}

struct Harness {
    manager: UiManager,
    clock: Arc<ManualClock>,
    events: Rc<RefCell<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EditorConfig::default(), Viewport::new(200.0, 100.0))
    }

    fn with_config(config: EditorConfig, viewport: Viewport) -> Self {
        let hooks = RecordingHooks::default();
        let events = hooks.events.clone();
        let clock = Arc::new(ManualClock::new());
        let mut manager = UiManager::with_hooks(config, Box::new(hooks), clock.clone());
        manager.add_layer(0, viewport);
        Self { manager, clock, events }
    }

    fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    fn saw(&self, event: &str) -> bool {
        self.events.borrow().iter().any(|seen| seen == event)
    }

    fn stored(&self, id: &EditorId) -> Option<ValueBag> {
        self.manager.storage().get_raw_value(id.as_str()).cloned()
    }

    fn bbox(&self, id: &EditorId) -> NormalizedBox {
        self.manager.editor(id).expect("editor should exist").bbox()
    }

    fn free_text(&mut self, text: &str) -> EditorId {
        let id = self.manager.create_free_text(0, Point::new(20.0, 10.0)).unwrap();
        self.manager.set_text(text).unwrap();
        assert!(self.manager.commit_or_remove());
        id
    }

    fn highlight(&mut self, bbox: NormalizedBox) -> EditorId {
        self.manager.create_highlight(0, &[bbox]).unwrap().expect("highlight should be created")
    }
}

fn cat_source() -> BitmapSource {
    BitmapSource::Url { url: "https://example.com/cat.png".to_owned() }
}

fn cat_bitmap() -> DecodedBitmap {
    DecodedBitmap { mime: "image/png".to_owned(), bytes: vec![137, 80, 78, 71], width: 400, height: 200 }
}

#[test]
fn committed_free_text_reaches_storage_and_undo_removes_it() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::FreeText, None).unwrap();

    let id = h.manager.create_free_text(0, Point::new(20.0, 10.0)).unwrap();
    h.manager.set_text("Hello").unwrap();
    assert_eq!(h.manager.storage().size(), 0);
    assert_eq!(h.manager.active_editor(), Some(&id));

    assert!(h.manager.commit_or_remove());
    let record = h.stored(&id).expect("record stored");
    assert_eq!(record["annotationType"], json!(3));
    assert_eq!(record["value"], json!("Hello"));
    let rect: Vec<f64> = serde_json::from_value(record["rect"].clone()).unwrap();
    assert!((rect[0] - 20.0).abs() < EPSILON);
    assert!((rect[3] - 90.0).abs() < EPSILON);
    assert!(h.manager.ui_state().has_something_to_undo);

    assert!(h.manager.undo());
    assert!(h.manager.editor(&id).is_none());
    assert_eq!(h.manager.storage().size(), 0);
    assert!(h.saw(&format!("remove:{id}")));

    assert!(h.manager.redo());
    assert_eq!(h.stored(&id).unwrap()["value"], json!("Hello"));
}

#[test]
fn empty_free_text_is_dropped_without_history() {
    let mut h = Harness::new();
    let id = h.manager.create_free_text(0, Point::new(20.0, 10.0)).unwrap();
    h.manager.set_text("   ").unwrap();

    assert!(!h.manager.commit_or_remove());
    assert!(h.manager.editor(&id).is_none());
    assert_eq!(h.manager.history_len(), 0);
    assert!(h.manager.storage().serializable().is_empty());
    assert!(h.manager.ui_state().is_empty);
}

#[test]
fn reopened_free_text_records_an_edit() {
    let mut h = Harness::new();
    let id = h.free_text("Hello");

    h.manager.update_mode(AnnotationEditorType::FreeText, Some(&id)).unwrap();
    assert_eq!(h.manager.active_editor(), Some(&id));
    h.manager.set_text("Changed").unwrap();
    assert!(h.manager.commit_or_remove());
    assert_eq!(h.manager.history_len(), 2);
    assert_eq!(h.stored(&id).unwrap()["value"], json!("Changed"));

    h.manager.undo();
    assert_eq!(h.stored(&id).unwrap()["value"], json!("Hello"));
}

#[test]
fn emptying_an_existing_free_text_deletes_it_undoably() {
    let mut h = Harness::new();
    let id = h.free_text("Hello");

    h.manager.enter_edit_mode(&id).unwrap();
    h.manager.set_text("").unwrap();
    assert!(!h.manager.commit_or_remove());
    assert!(h.manager.editor(&id).is_none());
    assert_eq!(h.manager.storage().size(), 0);

    assert!(h.manager.undo());
    assert_eq!(h.stored(&id).unwrap()["value"], json!("Hello"));
}

#[test]
fn only_free_text_can_enter_edit_mode() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    assert!(matches!(h.manager.enter_edit_mode(&id), Err(EditorError::WrongEditorKind { .. })));
}

#[test]
fn ink_strokes_become_one_editor_until_committed() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::Ink, None).unwrap();

    let id = h.manager.ink_pointer_down(0, Point::new(10.0, 10.0)).unwrap();
    assert!(h.manager.ink_pointer_move(Point::new(50.0, 50.0)).unwrap());
    assert!(!h.manager.ink_pointer_move(Point::new(50.0, 50.0)).unwrap());
    assert!(h.manager.ink_pointer_move(Point::new(90.0, 20.0)).unwrap());
    h.manager.ink_pointer_up().unwrap();

    let again = h.manager.ink_pointer_down(0, Point::new(120.0, 30.0)).unwrap();
    assert_eq!(again, id);
    h.manager.ink_pointer_move(Point::new(150.0, 60.0)).unwrap();
    h.manager.ink_pointer_up().unwrap();
    assert_eq!(h.manager.storage().size(), 0);

    h.manager.update_mode(AnnotationEditorType::None, None).unwrap();
    let record = h.stored(&id).expect("ink stored on mode change");
    assert_eq!(record["annotationType"], json!(15));
    assert_eq!(record["paths"].as_array().map(Vec::len), Some(2));
    assert_eq!(h.manager.history_len(), 1);
}

#[test]
fn ink_moves_without_an_active_editor_fail() {
    let mut h = Harness::new();
    assert!(matches!(
        h.manager.ink_pointer_move(Point::new(1.0, 1.0)),
        Err(EditorError::NoActiveEditor(_))
    ));
}

#[test]
fn viewport_change_redraws_ink_after_the_delay() {
    let mut h = Harness::new();
    let id = h.manager.ink_pointer_down(0, Point::new(10.0, 10.0)).unwrap();
    h.manager.ink_pointer_move(Point::new(40.0, 40.0)).unwrap();
    h.manager.ink_pointer_up().unwrap();
    h.manager.commit_or_remove();
    h.events.borrow_mut().clear();

    h.manager.update_viewport(0, Viewport::new(200.0, 100.0).with_scale(2.0)).unwrap();
    h.manager.update_viewport(0, Viewport::new(200.0, 100.0).with_scale(3.0)).unwrap();
    h.advance(199);
    assert!(!h.manager.tick());
    h.advance(1);
    assert!(h.manager.tick());
    assert_eq!(
        h.events.borrow().iter().filter(|event| **event == format!("redraw:{id}")).count(),
        1
    );
    assert_eq!(h.manager.layer(0).unwrap().viewport().scale, 3.0);
}

#[test]
fn unknown_layer_is_reported() {
    let mut h = Harness::new();
    assert!(matches!(
        h.manager.update_viewport(4, Viewport::new(10.0, 10.0)),
        Err(EditorError::LayerNotFound(4))
    ));
    assert!(matches!(
        h.manager.create_free_text(4, Point::new(1.0, 1.0)),
        Err(EditorError::LayerNotFound(4))
    ));
}

#[test]
fn text_highlight_is_committed_and_selected() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));

    assert_eq!(h.manager.selection(), &[id.clone()]);
    let record = h.stored(&id).unwrap();
    assert_eq!(record["annotationType"], json!(9));
    assert!(record.contains_key("quadPoints"));
    assert!(record.contains_key("outlines"));

    assert_eq!(h.manager.create_highlight(0, &[]).unwrap(), None);
}

#[test]
fn free_highlight_is_stored_without_quad_points() {
    let mut h = Harness::with_config(EditorConfig::default(), Viewport::new(100.0, 100.0));
    h.manager.update_mode(AnnotationEditorType::Highlight, None).unwrap();

    let id = h.manager.start_free_highlight(0, Point::new(20.0, 50.0)).unwrap();
    assert!(h.manager.free_highlight_move(Point::new(60.0, 50.0)).unwrap());
    assert_eq!(h.manager.end_free_highlight().unwrap(), Some(id.clone()));

    let record = h.stored(&id).unwrap();
    assert!(!record.contains_key("quadPoints"));
    assert!(record.contains_key("outlines"));
    assert_eq!(record["thickness"], json!(12.0));
}

#[test]
fn nudges_coalesce_into_one_undo_step() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let start = h.bbox(&id);

    for _ in 0..3 {
        h.manager.nudge(NudgeDirection::Right, false);
        h.advance(500);
    }
    // The move is visible before anything is recorded.
    assert!((h.bbox(&id).x - (start.x + 3.0 / 200.0)).abs() < EPSILON);
    assert_eq!(h.manager.history_len(), 1);

    h.advance(499);
    assert!(!h.manager.tick());
    h.advance(1);
    assert!(h.manager.tick());
    assert_eq!(h.manager.history_len(), 2);

    h.manager.undo();
    assert!(h.bbox(&id).approx_eq(&start, EPSILON));
}

#[test]
fn big_nudge_uses_the_big_step() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let start = h.bbox(&id);

    h.manager.nudge(NudgeDirection::Down, true);
    assert!((h.bbox(&id).y - (start.y + 10.0 / 100.0)).abs() < EPSILON);
}

#[test]
fn undo_records_pending_translation_first() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let start = h.bbox(&id);

    h.manager.translate_selected(20.0, 0.0);
    assert!(h.manager.undo());
    assert_eq!(h.manager.history_len(), 2);
    assert!(h.bbox(&id).approx_eq(&start, EPSILON));
    assert!(h.manager.editor(&id).is_some());
}

#[test]
fn drag_session_logs_one_move_only_when_something_moved() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let start = h.bbox(&id);

    assert!(h.manager.set_up_drag_session());
    assert!(!h.manager.end_drag_session());
    assert_eq!(h.manager.history_len(), 1);

    assert!(h.manager.set_up_drag_session());
    h.manager.drag_selected_editors(10.0, 5.0).unwrap();
    h.manager.drag_selected_editors(10.0, 5.0).unwrap();
    assert!(h.manager.end_drag_session());
    assert_eq!(h.manager.history_len(), 2);
    assert!((h.bbox(&id).x - (start.x + 0.1)).abs() < EPSILON);
    assert!((h.bbox(&id).y - (start.y + 0.1)).abs() < EPSILON);

    h.manager.undo();
    assert!(h.bbox(&id).approx_eq(&start, EPSILON));
}

#[test]
fn only_one_drag_session_runs_at_a_time() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let start = h.bbox(&id);

    assert!(h.manager.set_up_drag_session());
    h.manager.drag_selected_editors(20.0, 10.0).unwrap();
    assert!(!h.manager.set_up_drag_session());
    h.manager.drag_selected_editors(20.0, 10.0).unwrap();
    assert!(h.manager.end_drag_session());
    assert!(!h.manager.end_drag_session());
    assert!((h.bbox(&id).x - (start.x + 0.2)).abs() < EPSILON);

    h.manager.undo();
    assert!(h.bbox(&id).approx_eq(&start, EPSILON));
}

#[test]
fn drag_turns_text_selection_off_until_it_ends() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::Highlight, None).unwrap();
    h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    assert!(h.manager.layer(0).unwrap().text_selection());

    assert!(h.manager.set_up_drag_session());
    assert!(!h.manager.layer(0).unwrap().text_selection());
    h.manager.add_layer(1, Viewport::new(200.0, 100.0));
    assert!(!h.manager.layer(1).unwrap().text_selection());

    h.manager.end_drag_session();
    assert!(h.manager.layer(0).unwrap().text_selection());
    assert!(h.manager.layer(1).unwrap().text_selection());
}

#[test]
fn dragging_without_a_session_fails() {
    let mut h = Harness::new();
    assert!(h.manager.drag_selected_editors(1.0, 1.0).is_err());
    assert!(!h.manager.set_up_drag_session());
}

#[test]
fn drag_can_move_editors_to_another_page() {
    let mut h = Harness::new();
    h.manager.add_layer(1, Viewport::new(200.0, 100.0));
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));

    h.manager.set_up_drag_session();
    h.manager.move_selected_to_page(1).unwrap();
    assert!(h.manager.end_drag_session());
    assert_eq!(h.manager.editor(&id).unwrap().page_index(), 1);
    assert!(h.manager.layer(1).unwrap().contains(&id));
    assert!(!h.manager.layer(0).unwrap().contains(&id));
    assert_eq!(h.stored(&id).unwrap()["pageIndex"], json!(1));

    h.manager.undo();
    assert_eq!(h.manager.editor(&id).unwrap().page_index(), 0);
    assert!(h.manager.layer(0).unwrap().contains(&id));
}

#[test]
fn resize_steps_fold_into_one_gesture() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.25, 0.25, 0.25, 0.25));
    let start = h.bbox(&id);

    h.manager.resize(&id, ResizeHandle::BottomRight, 25.0, 0.0).unwrap();
    h.manager.resize(&id, ResizeHandle::BottomRight, 25.0, 25.0).unwrap();
    let grown = h.bbox(&id);
    assert!((grown.x - start.x).abs() < EPSILON);
    assert!((grown.width - (start.width + 0.25)).abs() < EPSILON);
    assert!((grown.height - (start.height + 0.25)).abs() < EPSILON);
    assert_eq!(h.manager.history_len(), 2);

    h.manager.finish_gesture();
    h.manager.resize(&id, ResizeHandle::Left, -10.0, 0.0).unwrap();
    assert_eq!(h.manager.history_len(), 3);

    h.manager.undo();
    assert!(h.bbox(&id).approx_eq(&grown, EPSILON));
    h.manager.undo();
    assert!(h.bbox(&id).approx_eq(&start, EPSILON));
}

#[test]
fn resize_never_goes_below_the_minimum_size() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.25, 0.25, 0.25, 0.25));

    h.manager.resize(&id, ResizeHandle::Right, -500.0, 0.0).unwrap();
    assert!((h.bbox(&id).width - 16.0 / 200.0).abs() < EPSILON);
}

#[test]
fn stamp_corner_resize_keeps_the_aspect_ratio() {
    let mut h = Harness::new();
    let id = h.manager.create_stamp(0, cat_source(), None).unwrap();
    h.manager.bitmap_loaded(&id, Ok(cat_bitmap())).unwrap();
    let start = h.bbox(&id);
    let ratio = start.width / start.height;

    h.manager.resize(&id, ResizeHandle::BottomRight, -40.0, -5.0).unwrap();
    let resized = h.bbox(&id);
    assert!((resized.width / resized.height - ratio).abs() < 1e-6);
    assert!(resized.width < start.width);
}

#[test]
fn delete_removes_the_selection_as_one_step() {
    let mut h = Harness::new();
    let first = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let second = h.highlight(NormalizedBox::new(0.1, 0.5, 0.2, 0.1));

    h.manager.select_all();
    assert_eq!(h.manager.selection().len(), 2);
    assert_eq!(h.manager.delete(), 2);
    assert!(h.manager.storage().serializable().is_empty());
    assert!(!h.manager.storage().modified());

    assert!(h.manager.undo());
    assert!(h.manager.editor(&first).is_some());
    assert!(h.manager.editor(&second).is_some());
    assert_eq!(h.manager.storage().size(), 2);
}

#[test]
fn selection_keeps_insertion_order() {
    let mut h = Harness::new();
    let first = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let second = h.highlight(NormalizedBox::new(0.1, 0.5, 0.2, 0.1));

    h.manager.set_selected(&second).unwrap();
    h.manager.add_to_selection(&first).unwrap();
    assert_eq!(h.manager.last_selected(), Some(&first));

    h.manager.toggle_selected(&first).unwrap();
    assert_eq!(h.manager.selection(), &[second.clone()]);
    assert!(h.manager.is_selected(&second));

    h.manager.unselect_all();
    assert!(!h.manager.ui_state().has_selected_editor);

    let missing = EditorId::new("missing");
    assert!(matches!(h.manager.set_selected(&missing), Err(EditorError::EditorNotFound(_))));
}

#[test]
fn parameter_changes_on_a_selection_coalesce_and_keep_defaults() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let red = Rgb::new(255, 0, 0);
    let blue = Rgb::new(0, 0, 255);

    h.manager.update_params(EditorParamType::HighlightColor, ParamValue::Color(red)).unwrap();
    h.manager.update_params(EditorParamType::HighlightColor, ParamValue::Color(blue)).unwrap();
    assert_eq!(h.manager.history_len(), 2);
    assert_eq!(h.stored(&id).unwrap()["color"], json!([0, 0, 255]));
    assert_eq!(h.manager.defaults().highlight_color, Rgb::YELLOW);

    h.manager.undo();
    let editor = h.manager.editor(&id).unwrap();
    assert_eq!(
        editor.param_value(EditorParamType::HighlightColor).unwrap(),
        ParamValue::Color(Rgb::YELLOW)
    );

    h.manager.unselect_all();
    h.manager.update_params(EditorParamType::HighlightColor, ParamValue::Color(red)).unwrap();
    assert_eq!(h.manager.defaults().highlight_color, red);
    let editor = h.manager.editor(&id).unwrap();
    assert_eq!(
        editor.param_value(EditorParamType::HighlightColor).unwrap(),
        ParamValue::Color(Rgb::YELLOW)
    );
}

#[test]
fn parameter_changes_on_different_editors_undo_separately() {
    let mut h = Harness::new();
    let a = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    let b = h.highlight(NormalizedBox::new(0.1, 0.5, 0.2, 0.1));
    let red = Rgb::new(255, 0, 0);
    let blue = Rgb::new(0, 0, 255);
    let color_of = |h: &Harness, id: &EditorId| {
        h.manager.editor(id).unwrap().param_value(EditorParamType::HighlightColor).unwrap()
    };

    h.manager.set_selected(&a).unwrap();
    h.manager.update_params(EditorParamType::HighlightColor, ParamValue::Color(red)).unwrap();
    h.manager.set_selected(&b).unwrap();
    h.manager.update_params(EditorParamType::HighlightColor, ParamValue::Color(blue)).unwrap();
    assert_eq!(h.manager.history_len(), 4);

    assert!(h.manager.undo());
    assert_eq!(color_of(&h, &a), ParamValue::Color(red));
    assert_eq!(color_of(&h, &b), ParamValue::Color(Rgb::YELLOW));

    assert!(h.manager.undo());
    assert_eq!(color_of(&h, &a), ParamValue::Color(Rgb::YELLOW));
    assert!(h.manager.editor(&b).is_some());
}

#[test]
fn parameter_change_without_selection_only_touches_defaults() {
    let mut h = Harness::new();
    h.manager.update_params(EditorParamType::InkThickness, ParamValue::Number(4.0)).unwrap();
    assert_eq!(h.manager.defaults().ink_thickness, 4.0);
    assert_eq!(h.manager.history_len(), 0);

    assert!(matches!(
        h.manager.update_params(EditorParamType::InkColor, ParamValue::Number(1.0)),
        Err(EditorError::InvalidParamValue(EditorParamType::InkColor))
    ));
}

#[test]
fn font_size_change_scales_free_text() {
    let mut h = Harness::new();
    let id = h.free_text("Hello");
    h.manager.set_selected(&id).unwrap();
    let start = h.bbox(&id);

    h.manager.update_params(EditorParamType::FreeTextSize, ParamValue::Number(20.0)).unwrap();
    let scaled = h.bbox(&id);
    assert!((scaled.x - start.x).abs() < EPSILON);
    assert!((scaled.width - start.width * 2.0).abs() < EPSILON);
    assert_eq!(h.stored(&id).unwrap()["fontSize"], json!(20.0));
}

#[test]
fn copy_and_paste_add_a_batch_on_the_current_page() {
    let mut h = Harness::new();
    h.manager.add_layer(1, Viewport::new(200.0, 100.0));
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    assert!(h.manager.ui_state().has_empty_clipboard);

    let json = h.manager.copy().unwrap().expect("selection copied");
    let parsed: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    assert!(parsed[0].get("id").is_none());
    assert!(!h.manager.ui_state().has_empty_clipboard);

    h.manager.set_current_page(1);
    let pasted = h.manager.paste(None).unwrap();
    assert_eq!(pasted.len(), 1);
    assert_ne!(pasted[0], id);
    assert_eq!(h.manager.editor(&pasted[0]).unwrap().page_index(), 1);
    assert_eq!(h.manager.selection(), pasted.as_slice());
    assert_eq!(h.manager.storage().size(), 2);

    h.manager.undo();
    assert!(h.manager.editor(&pasted[0]).is_none());
    assert_eq!(h.manager.storage().size(), 1);
}

#[test]
fn paste_is_all_or_nothing() {
    let mut h = Harness::new();
    let text = r#"[
        {"annotationType": 3, "rect": [0, 0, 50, 20], "rotation": 0, "pageIndex": 0, "value": "ok"},
        {"annotationType": 13, "rect": [0, 0, 50, 20], "rotation": 0, "pageIndex": 0, "bitmapId": "gone"}
    ]"#;

    assert!(h.manager.paste(Some(text)).is_err());
    assert!(h.manager.ui_state().is_empty);
    assert_eq!(h.manager.history_len(), 0);

    assert!(matches!(h.manager.paste(Some("not json")), Err(EditorError::Clipboard(_))));
    assert!(h.manager.paste(Some("[]")).unwrap().is_empty());
}

#[test]
fn cut_copies_then_deletes() {
    let mut h = Harness::new();
    let id = h.free_text("Snip");
    h.manager.set_selected(&id).unwrap();

    let json = h.manager.cut().unwrap().expect("cut text");
    assert!(json.contains("Snip"));
    assert!(h.manager.editor(&id).is_none());

    let pasted = h.manager.paste(None).unwrap();
    let stored = h.stored(&pasted[0]).unwrap();
    assert_eq!(stored["value"], json!("Snip"));
}

#[test]
fn loaded_annotation_is_saved_only_when_changed() {
    let mut h = Harness::new();
    let mut record = EditorRecord::new(AnnotationEditorType::FreeText, [20.0, 20.0, 120.0, 60.0], 0, 0)
        .with_color(Rgb::BLACK);
    record.font_size = Some(10.0);
    record.value = Some("Hi".to_owned());

    let id = h.manager.load_existing(&record, "25R").unwrap();
    assert_eq!(h.manager.storage().size(), 0);

    h.manager.set_selected(&id).unwrap();
    h.manager.nudge(NudgeDirection::Right, true);
    assert_eq!(h.stored(&id).unwrap()["id"], json!("25R"));
}

#[test]
fn deleting_a_loaded_annotation_leaves_a_marker() {
    let mut h = Harness::new();
    let mut record = EditorRecord::new(AnnotationEditorType::FreeText, [20.0, 20.0, 120.0, 60.0], 0, 0)
        .with_color(Rgb::BLACK);
    record.font_size = Some(10.0);
    record.value = Some("Hi".to_owned());
    let id = h.manager.load_existing(&record, "25R").unwrap();

    h.manager.set_selected(&id).unwrap();
    assert_eq!(h.manager.delete(), 1);
    assert_eq!(
        Value::Object(h.stored(&id).unwrap()),
        json!({"id": "25R", "deleted": true, "pageIndex": 0})
    );

    h.manager.undo();
    assert!(h.manager.editor(&id).is_some());
    assert_eq!(h.manager.storage().size(), 0);
}

#[test]
fn stamp_waits_for_its_bitmap() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::Stamp, None).unwrap();
    let id = h.manager.create_stamp(0, cat_source(), None).unwrap();
    assert_eq!(h.manager.storage().size(), 0);

    let requests = h.manager.take_bitmap_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].editor_id, id);
    assert!(h.manager.take_bitmap_requests().is_empty());

    assert!(h.manager.bitmap_loaded(&id, Ok(cat_bitmap())).unwrap());
    assert!(h.bbox(&id).approx_eq(&NormalizedBox::new(0.125, 0.125, 0.75, 0.75), EPSILON));
    assert_eq!(h.manager.history_len(), 1);
    let storage = h.manager.serializable();
    assert_eq!(storage.transfer.len(), 1);
    assert_eq!(storage.map[id.as_str()]["bitmapId"], json!(storage.transfer[0]));

    // A second stamp of the same image comes straight from the cache.
    h.manager.create_stamp(0, cat_source(), Some(Point::new(0.25, 0.25))).unwrap();
    assert!(h.manager.take_bitmap_requests().is_empty());
    assert_eq!(h.manager.bitmap_stats().bitmaps, 1);
    assert_eq!(h.manager.history_len(), 2);
}

#[test]
fn failed_bitmap_discards_the_stamp() {
    let mut h = Harness::new();
    let id = h.manager.create_stamp(0, cat_source(), None).unwrap();

    assert!(!h.manager.bitmap_loaded(&id, Err("404".to_owned())).unwrap());
    assert!(h.manager.editor(&id).is_none());
    assert_eq!(h.manager.history_len(), 0);
}

#[test]
fn unknown_cached_bitmap_is_an_error() {
    let mut h = Harness::new();
    let result = h.manager.create_stamp(0, BitmapSource::Id { id: "nope".to_owned() }, None);
    assert!(matches!(result, Err(EditorError::Bitmap(_))));
    assert!(h.manager.ui_state().is_empty);
}

#[test]
fn destroy_cancels_pending_bitmaps() {
    let mut h = Harness::new();
    let id = h.manager.create_stamp(0, cat_source(), None).unwrap();
    let requests = h.manager.take_bitmap_requests();

    h.manager.destroy();
    assert!(requests[0].token.is_cancelled());
    assert!(!h.manager.bitmap_loaded(&id, Ok(cat_bitmap())).unwrap());
    assert_eq!(h.manager.editors().count(), 0);
    assert!(h.manager.layer(0).is_none());
}

#[test]
fn alt_text_is_stored_and_undoable() {
    let mut h = Harness::new();
    let id = h.manager.create_stamp(0, cat_source(), None).unwrap();
    h.manager.bitmap_loaded(&id, Ok(cat_bitmap())).unwrap();

    h.manager.set_alt_text(&id, Some("A cat".to_owned()), false).unwrap();
    assert_eq!(h.stored(&id).unwrap()["accessibilityData"], json!({"type": "Figure", "alt": "A cat"}));

    h.manager.set_alt_text(&id, None, true).unwrap();
    assert_eq!(h.stored(&id).unwrap()["accessibilityData"]["type"], json!("Artifact"));

    h.manager.undo();
    assert_eq!(h.stored(&id).unwrap()["accessibilityData"]["alt"], json!("A cat"));

    let text = h.free_text("Not a stamp");
    assert!(matches!(
        h.manager.set_alt_text(&text, Some("x".to_owned()), false),
        Err(EditorError::WrongEditorKind { .. })
    ));
}

#[test]
fn mode_switch_reconfigures_layers() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::Highlight, None).unwrap();
    let layer = h.manager.layer(0).unwrap();
    assert!(layer.pointer_capture());
    assert!(layer.text_selection());
    assert!(h.saw("mode:highlight"));
    assert!(h.manager.ui_state().is_editing);

    h.manager.update_mode(AnnotationEditorType::None, None).unwrap();
    assert!(!h.manager.layer(0).unwrap().pointer_capture());
    assert!(!h.manager.ui_state().is_editing);
}

#[test]
fn leaving_a_mode_commits_the_active_editor() {
    let mut h = Harness::new();
    h.manager.update_mode(AnnotationEditorType::FreeText, None).unwrap();
    let id = h.manager.create_free_text(0, Point::new(20.0, 10.0)).unwrap();
    h.manager.set_text("Keep me").unwrap();

    h.manager.update_mode(AnnotationEditorType::Ink, None).unwrap();
    assert_eq!(h.manager.active_editor(), None);
    assert!(h.stored(&id).is_some());
}

#[test]
fn hidden_pages_keep_their_editors() {
    let mut h = Harness::new();
    let id = h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));

    assert!(h.manager.remove_layer(0));
    assert!(!h.manager.remove_layer(0));
    assert!(h.saw(&format!("hide:{id}")));
    let editor = h.manager.editor(&id).unwrap();
    assert_eq!(editor.layer(), None);
    assert!(h.stored(&id).is_some());

    h.manager.add_layer(0, Viewport::new(200.0, 100.0));
    assert!(h.saw(&format!("show:{id}")));
    assert!(h.manager.layer(0).unwrap().contains(&id));
    assert_eq!(h.manager.editor(&id).unwrap().layer(), Some(0));
}

#[test]
fn history_is_bounded() {
    let config = EditorConfig::default().with_history_capacity(2);
    let mut h = Harness::with_config(config, Viewport::new(200.0, 100.0));
    for row in 0..3 {
        h.highlight(NormalizedBox::new(0.1, 0.1 + f64::from(row) * 0.2, 0.2, 0.1));
    }

    assert_eq!(h.manager.history_len(), 2);
    assert!(h.manager.undo());
    assert!(h.manager.undo());
    assert!(!h.manager.undo());
    assert_eq!(h.manager.editors().count(), 1);
}

#[test]
fn new_command_after_undo_drops_the_redo_tail() {
    let mut h = Harness::new();
    h.highlight(NormalizedBox::new(0.1, 0.1, 0.2, 0.1));
    h.highlight(NormalizedBox::new(0.1, 0.5, 0.2, 0.1));

    h.manager.undo();
    assert!(h.manager.ui_state().has_something_to_redo);
    h.highlight(NormalizedBox::new(0.5, 0.5, 0.2, 0.1));
    assert!(!h.manager.ui_state().has_something_to_redo);
    assert!(!h.manager.redo());
}

#[test]
fn rotated_page_round_trips_through_storage() {
    let viewport = Viewport::new(200.0, 100.0).with_rotation(crate::geometry::Rotation::Deg90);
    let mut h = Harness::with_config(EditorConfig::default(), viewport);
    let id = h.highlight(NormalizedBox::new(0.2, 0.3, 0.1, 0.1));

    let record: EditorRecord = serde_json::from_value(Value::Object(h.stored(&id).unwrap())).unwrap();
    assert_eq!(record.rotation, 90);

    let copy = h.manager.load_existing(&record, "7R").unwrap();
    assert!(h.bbox(&copy).approx_eq(&h.bbox(&id), 1e-6));
    assert!(matches!(h.manager.editor(&copy).unwrap().kind(), EditorKind::Highlight(_)));
}

#[test]
fn dispatch_runs_scripted_actions() {
    let mut h = Harness::new();
    let script = [
        json!({"action": "updateMode", "mode": 3}),
        json!({"action": "createFreeText", "pageIndex": 0, "x": 20, "y": 10}),
        json!({"action": "setText", "text": "Scripted"}),
        json!({"action": "commitOrRemove"}),
        json!({"action": "selectAll"}),
        json!({"action": "copy"}),
        json!({"action": "paste"}),
    ];

    let mut outcomes = Vec::new();
    for step in script {
        let action: UiAction = serde_json::from_value(step).unwrap();
        outcomes.push(h.manager.dispatch(action).unwrap());
    }

    assert!(matches!(outcomes[1], ActionOutcome::Editor(Some(_))));
    assert_eq!(outcomes[3], ActionOutcome::Flag(true));
    assert!(matches!(&outcomes[6], ActionOutcome::Editors(ids) if ids.len() == 1));
    assert_eq!(h.manager.storage().size(), 2);

    let undo: UiAction = serde_json::from_value(json!({"action": "undo"})).unwrap();
    assert_eq!(h.manager.dispatch(undo).unwrap(), ActionOutcome::Flag(true));
    assert_eq!(h.manager.storage().size(), 1);
}
