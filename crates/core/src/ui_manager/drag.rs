//! Moving and resizing editors
//!
//! Keyboard nudges move editors right away but are recorded lazily: deltas
//! pile up until the coalescing window passes without a new nudge, then a
//! single command carrying the total is logged. Pointer drags snapshot the
//! selection up front and log one command when the drag ends; only one drag
//! runs at a time and page text cannot be selected meanwhile. Resizing logs
//! a coalescing command per step so a whole gesture undoes at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::Placement;
use super::{CommandKind, EditingState, EditorCommand, UiManager};
use crate::command_manager::AddOptions;
use crate::editor::EditorKind;
use crate::error::{EditorError, EditorResult};
use crate::geometry::{normalized_from_rect, rect_from_page_region, rotate_box, NormalizedBox};
use crate::ids::EditorId;

/// Arrow key direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NudgeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Resize handle on an editor's displayed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeHandle {
    /// Which horizontal and vertical edges the handle moves: `-1` for the
    /// left or top edge, `1` for the right or bottom edge, `0` for neither.
    pub fn direction(self) -> (i8, i8) {
        match self {
            Self::TopLeft => (-1, -1),
            Self::Top => (0, -1),
            Self::TopRight => (1, -1),
            Self::Right => (1, 0),
            Self::BottomRight => (1, 1),
            Self::Bottom => (0, 1),
            Self::BottomLeft => (-1, 1),
            Self::Left => (-1, 0),
        }
    }

    pub fn is_corner(self) -> bool {
        let (x, y) = self.direction();
        x != 0 && y != 0
    }
}

/// Placements of the selection when a pointer drag started.
#[derive(Debug, Clone)]
pub(crate) struct DragSession {
    before: Vec<(EditorId, Placement)>,
}

/// Resize in progress on one editor.
#[derive(Debug, Clone)]
pub(crate) struct ResizeGesture {
    id: EditorId,
    handle: ResizeHandle,
    original: NormalizedBox,
    /// Displayed box when the gesture started.
    shown: NormalizedBox,
    /// Total pointer movement in screen pixels.
    dx: f64,
    dy: f64,
}

impl UiManager {
    /// Moves the selection by a screen-space delta in pixels. The move is
    /// visible immediately; the undo step is recorded once no further move
    /// arrives within the coalescing window.
    pub fn translate_selected(&mut self, dx: f64, dy: f64) {
        let ids = self.state.selection.clone();
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(viewport) = self.viewport_for(&id) else {
                continue;
            };
            let (page_dx, page_dy) = viewport.screen_delta_to_page(dx, dy);
            self.state.translate_editor(&id, page_dx, page_dy);
            moved.push((id, page_dx, page_dy));
        }
        if moved.is_empty() {
            return;
        }

        self.translation.accumulate(self.clock.now(), |pending| {
            let mut deltas = pending.unwrap_or_default();
            for (id, page_dx, page_dy) in moved {
                let delta = deltas.entry(id).or_insert((0.0, 0.0));
                delta.0 += page_dx;
                delta.1 += page_dy;
            }
            deltas
        });
    }

    /// Arrow-key move by the small or big step from the configuration.
    pub fn nudge(&mut self, direction: NudgeDirection, big: bool) {
        let step = if big { self.config.translate_big_px } else { self.config.translate_small_px };
        let (dx, dy) = match direction {
            NudgeDirection::Left => (-step, 0.0),
            NudgeDirection::Right => (step, 0.0),
            NudgeDirection::Up => (0.0, -step),
            NudgeDirection::Down => (0.0, step),
        };
        self.translate_selected(dx, dy);
    }

    /// Records pending translation now instead of waiting for the timer.
    pub fn flush_translation(&mut self) {
        if let Some(deltas) = self.translation.flush() {
            self.record_translation(deltas);
        }
    }

    pub(super) fn record_translation(&mut self, deltas: BTreeMap<EditorId, (f64, f64)>) {
        let deltas: Vec<(EditorId, f64, f64)> = deltas
            .into_iter()
            .filter(|(_, (dx, dy))| *dx != 0.0 || *dy != 0.0)
            .map(|(id, (dx, dy))| (id, dx, dy))
            .collect();
        if deltas.is_empty() {
            return;
        }

        debug!(editors = deltas.len(), "translation recorded");
        let undo_deltas = deltas.clone();
        let command = EditorCommand::new(
            move |state: &mut EditingState| {
                for (id, dx, dy) in &deltas {
                    state.translate_editor(id, *dx, *dy);
                }
            },
            move |state: &mut EditingState| {
                for (id, dx, dy) in &undo_deltas {
                    state.translate_editor(id, -dx, -dy);
                }
            },
        );
        self.history.add(&mut self.state, command, AddOptions::record());
        self.refresh_state();
    }

    /// Snapshots the selection before a pointer drag and turns text
    /// selection off until the drag ends. Returns `false` when nothing is
    /// selected or a drag is already in progress.
    pub fn set_up_drag_session(&mut self) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.flush_translation();
        let before: Vec<(EditorId, Placement)> = self
            .state
            .selection
            .iter()
            .filter_map(|id| self.state.editors.get(id).map(|editor| (id.clone(), Placement::of(editor))))
            .collect();
        if before.is_empty() {
            return false;
        }
        self.drag = Some(DragSession { before });
        self.suspend_text_selection(true);
        true
    }

    /// Moves the dragged editors by a screen-space delta in pixels.
    pub fn drag_selected_editors(&mut self, dx: f64, dy: f64) -> EditorResult<()> {
        let session = self.drag.as_ref().ok_or(EditorError::NoActiveEditor("drag"))?;
        let ids: Vec<EditorId> = session.before.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            if let Some(viewport) = self.viewport_for(&id) {
                let (page_dx, page_dy) = viewport.screen_delta_to_page(dx, dy);
                self.state.translate_editor(&id, page_dx, page_dy);
            }
        }
        Ok(())
    }

    /// Drops the dragged editors onto another displayed page, keeping their
    /// position fields.
    pub fn move_selected_to_page(&mut self, page_index: usize) -> EditorResult<()> {
        let session = self.drag.as_ref().ok_or(EditorError::NoActiveEditor("drag"))?;
        let page = self.require_layer(page_index)?.dimensions();
        let ids: Vec<EditorId> = session.before.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            if let Some(editor) = self.state.editors.get(&id) {
                let bbox = editor.bbox();
                self.state.place_editor(&id, Placement { x: bbox.x, y: bbox.y, page_index, page });
            }
        }
        Ok(())
    }

    /// Ends the drag. Logs one move command, and returns `true`, only when
    /// some editor ended up somewhere else.
    pub fn end_drag_session(&mut self) -> bool {
        let Some(DragSession { before }) = self.drag.take() else {
            return false;
        };
        self.suspend_text_selection(false);

        let moves: Vec<(EditorId, Placement, Placement)> = before
            .into_iter()
            .filter_map(|(id, from)| {
                let to = Placement::of(self.state.editors.get(&id)?);
                (to != from).then_some((id, from, to))
            })
            .collect();
        if moves.is_empty() {
            return false;
        }

        debug!(editors = moves.len(), "drag recorded");
        let undo_moves = moves.clone();
        let command = EditorCommand::new(
            move |state: &mut EditingState| {
                for (id, _, to) in &moves {
                    state.place_editor(id, *to);
                }
            },
            move |state: &mut EditingState| {
                for (id, from, _) in &undo_moves {
                    state.place_editor(id, *from);
                }
            },
        );
        self.history.add(&mut self.state, command, AddOptions::record());
        self.refresh_state();
        true
    }

    fn suspend_text_selection(&mut self, suspended: bool) {
        for layer in self.state.layers.values_mut() {
            layer.suspend_text_selection(suspended);
        }
    }

    /// Drags `handle` of an editor by a screen-space delta in pixels.
    ///
    /// Steps of one gesture fold into a single undo step until
    /// [`UiManager::finish_gesture`] or a gesture on another handle.
    pub fn resize(&mut self, id: &EditorId, handle: ResizeHandle, dx: f64, dy: f64) -> EditorResult<()> {
        let editor = self.require_editor(id)?;
        let keep_ratio = handle.is_corner() && matches!(editor.kind(), EditorKind::Stamp(_));
        let (rotation, page) = (editor.rotation(), *editor.page());
        let original = editor.bbox();
        let viewport = self.viewport_for(id).ok_or_else(|| EditorError::EditorNotFound(id.clone()))?;
        let shown = editor.view_box(viewport.rotation);

        let continues = self
            .resize
            .as_ref()
            .is_some_and(|gesture| &gesture.id == id && gesture.handle == handle);
        if !continues {
            self.finish_gesture();
            self.flush_translation();
            self.resize = Some(ResizeGesture {
                id: id.clone(),
                handle,
                original,
                shown,
                dx: 0.0,
                dy: 0.0,
            });
        }
        let Some(gesture) = self.resize.as_mut() else {
            return Ok(());
        };
        gesture.dx += dx;
        gesture.dy += dy;

        let (width_px, height_px) = viewport.display_size();
        let min_size = self.config.min_editor_size_px;
        let resized = resized_box(
            &gesture.shown,
            handle,
            (gesture.dx / width_px, gesture.dy / height_px),
            (min_size / width_px, min_size / height_px),
            keep_ratio,
        );
        let region = rotate_box(&resized, viewport.rotation.inverse());
        let after = normalized_from_rect(rect_from_page_region(&region, &page), rotation, &page);
        let before = gesture.original;

        let (redo_id, undo_id) = (id.clone(), id.clone());
        let command = EditorCommand::new(
            move |state: &mut EditingState| state.set_editor_bbox(&redo_id, after),
            move |state: &mut EditingState| state.set_editor_bbox(&undo_id, before),
        )
        .with_kind(CommandKind::Resize(id.clone()));
        self.history.add(&mut self.state, command, AddOptions::coalescing());
        self.refresh_state();
        Ok(())
    }

    /// Closes the current resize gesture so the next one gets its own undo
    /// step.
    pub fn finish_gesture(&mut self) {
        if let Some(gesture) = self.resize.take() {
            self.history.stop_coalescing(&CommandKind::Resize(gesture.id));
        }
    }
}

/// Moves the edges `handle` controls by `delta` (display-normalized) while
/// keeping each side at least `min_size`. With `keep_ratio` the box keeps its
/// aspect ratio and the opposite corner stays put.
fn resized_box(
    shown: &NormalizedBox,
    handle: ResizeHandle,
    delta: (f64, f64),
    min_size: (f64, f64),
    keep_ratio: bool,
) -> NormalizedBox {
    let (hx, hy) = handle.direction();
    let (mut left, mut right) = (shown.x, shown.right());
    let (mut top, mut bottom) = (shown.y, shown.bottom());

    match hx {
        -1 => left = (left + delta.0).min(right - min_size.0),
        1 => right = (right + delta.0).max(left + min_size.0),
        _ => {}
    }
    match hy {
        -1 => top = (top + delta.1).min(bottom - min_size.1),
        1 => bottom = (bottom + delta.1).max(top + min_size.1),
        _ => {}
    }

    if keep_ratio && shown.width > 0.0 && shown.height > 0.0 {
        let factor = ((right - left) / shown.width).max((bottom - top) / shown.height);
        let (width, height) = (shown.width * factor, shown.height * factor);
        if hx < 0 {
            left = right - width;
        } else {
            right = left + width;
        }
        if hy < 0 {
            top = bottom - height;
        } else {
            bottom = top + height;
        }
    }

    NormalizedBox::new(left, top, right - left, bottom - top)
}
