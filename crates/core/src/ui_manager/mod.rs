//! Editing session orchestration
//!
//! [`UiManager`] owns every editor of a document, the per-page layers that
//! show them, the undo log, the selection and the storage mirror. Hosts drive
//! it with pointer and keyboard level operations and call [`UiManager::tick`]
//! from their event loop so debounced work (translation coalescing, ink
//! redraws) can run.
//!
//! Editors are created in an editing state and only reach storage and the
//! undo log when committed. Every committed change goes through the command
//! log, so undo and redo always replay against the same [`EditingState`].

mod action;
mod clipboard;
mod drag;
mod hooks;
mod selection;
mod state;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use annotation_model::{AnnotationEditorType, EditorParamType, EditorRecord, Rgb};
use annotation_storage::{AnnotationStorage, AnnotationStore, SerializableStorage};
use pdf_annotator_scheduler::{CancellationRegistry, Clock, Debounce, SystemClock};
use tracing::{debug, info, warn};

pub use action::{ActionOutcome, UiAction};
pub use drag::{NudgeDirection, ResizeHandle};
pub use hooks::{NoopHooks, RenderHooks, UiState};
pub use state::EditingState;

use crate::bitmap_cache::{BitmapCache, BitmapCacheStats, BitmapRequest, BitmapSource, DecodedBitmap};
use crate::command_manager::{AddOptions, Command, CommandManager};
use crate::config::{EditorConfig, EditorDefaults};
use crate::editor::{
    Editor, EditorKind, EditorState, FreeTextData, HighlightData, InkData, ParamValue, StampData,
};
use crate::error::{EditorError, EditorResult};
use crate::geometry::{editor_box_from_display, NormalizedBox, Point, Viewport};
use crate::ids::{EditorId, IdGenerator};
use crate::layer::Layer;
use drag::{DragSession, ResizeGesture};

/// Pixel size assumed for a cached image whose dimensions were never reported.
const FALLBACK_STAMP_SIZE: (u32, u32) = (200, 200);

/// Key under which consecutive commands collapse into one undo step.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// A parameter change on one set of editors.
    Param(EditorParamType, Vec<EditorId>),
    Resize(EditorId),
}

pub(crate) type History = CommandManager<EditingState, CommandKind>;
pub(crate) type EditorCommand = Command<EditingState, CommandKind>;

/// Editor whose content can still change.
#[derive(Debug)]
struct ActiveEditor {
    id: EditorId,
    /// Committed content before editing resumed, for editors that already
    /// existed.
    before: Option<Editor>,
}

pub struct UiManager {
    config: EditorConfig,
    state: EditingState,
    history: History,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
    mode: AnnotationEditorType,
    current_page: usize,
    active: Option<ActiveEditor>,
    /// Per-editor page-normalized delta not yet recorded as a command.
    translation: Debounce<BTreeMap<EditorId, (f64, f64)>>,
    ink_redraw: Debounce<BTreeSet<usize>>,
    drag: Option<DragSession>,
    resize: Option<ResizeGesture>,
    clipboard: Option<String>,
    bitmaps: BitmapCache,
    pending_bitmaps: CancellationRegistry<EditorId>,
    bitmap_requests: Vec<BitmapRequest>,
    ui_state: UiState,
}

impl UiManager {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_hooks(config, Box::new(NoopHooks), Arc::new(SystemClock::new()))
    }

    pub fn with_hooks(config: EditorConfig, hooks: Box<dyn RenderHooks>, clock: Arc<dyn Clock>) -> Self {
        let translation = Debounce::new(config.translation_coalesce());
        let ink_redraw = Debounce::new(config.ink_redraw_delay());
        let history = CommandManager::new(config.history_capacity);
        let mut manager = Self {
            config,
            state: EditingState::new(hooks),
            history,
            ids: IdGenerator::new(),
            clock,
            mode: AnnotationEditorType::None,
            current_page: 0,
            active: None,
            translation,
            ink_redraw,
            drag: None,
            resize: None,
            clipboard: None,
            bitmaps: BitmapCache::new(),
            pending_bitmaps: CancellationRegistry::new(),
            bitmap_requests: Vec::new(),
            ui_state: UiState::default(),
        };
        manager.refresh_state();
        manager
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn defaults(&self) -> &EditorDefaults {
        &self.config.defaults
    }

    pub fn mode(&self) -> AnnotationEditorType {
        self.mode
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn ui_state(&self) -> UiState {
        self.ui_state
    }

    pub fn editor(&self, id: &EditorId) -> Option<&Editor> {
        self.state.editors.get(id)
    }

    pub fn editors(&self) -> impl Iterator<Item = &Editor> {
        self.state.editors.values()
    }

    pub fn layer(&self, page_index: usize) -> Option<&Layer> {
        self.state.layers.get(&page_index)
    }

    /// Editor being created or edited, if any.
    pub fn active_editor(&self) -> Option<&EditorId> {
        self.active.as_ref().map(|active| &active.id)
    }

    pub fn storage(&self) -> &AnnotationStorage {
        &self.state.storage
    }

    /// Storage access for registering callbacks or resetting the modified
    /// flag after a save.
    pub fn storage_mut(&mut self) -> &mut AnnotationStorage {
        &mut self.state.storage
    }

    pub fn serializable(&self) -> SerializableStorage {
        self.state.storage.serializable()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn bitmap_stats(&self) -> BitmapCacheStats {
        self.bitmaps.stats()
    }

    /// Switches the editing mode. Leaving a mode commits the active editor.
    ///
    /// With `edit_id`, the editor is selected and, for free text, reopened
    /// for editing.
    pub fn update_mode(&mut self, mode: AnnotationEditorType, edit_id: Option<&EditorId>) -> EditorResult<()> {
        if let Some(id) = edit_id {
            self.require_editor(id)?;
        }
        self.flush_translation();

        if mode != self.mode {
            self.commit_or_remove();
            if mode == AnnotationEditorType::None {
                self.state.set_selection(Vec::new());
            }
            self.mode = mode;
            for layer in self.state.layers.values_mut() {
                layer.update_mode(mode);
            }
            info!(mode = mode.name(), "editing mode changed");
            self.state.hooks.mode_changed(mode);
        }

        if let Some(id) = edit_id {
            self.set_selected(id)?;
            if self.editor(id).map(Editor::editor_type) == Some(AnnotationEditorType::FreeText) {
                self.enter_edit_mode(id)?;
            }
        }
        self.refresh_state();
        Ok(())
    }

    /// Registers the layer of a page that became visible and attaches the
    /// editors living on it.
    pub fn add_layer(&mut self, page_index: usize, viewport: Viewport) {
        let mut layer = Layer::new(page_index, viewport);
        layer.update_mode(self.mode);
        layer.suspend_text_selection(self.drag.is_some());

        let ids: Vec<EditorId> = self
            .state
            .editors
            .values()
            .filter(|editor| editor.page_index() == page_index)
            .map(|editor| editor.id().clone())
            .collect();
        for id in &ids {
            layer.attach(id.clone());
            if let Some(editor) = self.state.editors.get_mut(id) {
                editor.set_layer(Some(page_index));
            }
            self.state.hooks.show(id);
        }

        debug!(page = page_index, editors = ids.len(), "layer added");
        self.state.layers.insert(page_index, layer);
        self.refresh_state();
    }

    /// Detaches the editors of a page that is no longer displayed. The
    /// editors stay in the session.
    pub fn remove_layer(&mut self, page_index: usize) -> bool {
        let active_here = self
            .active
            .as_ref()
            .and_then(|active| self.editor(&active.id))
            .is_some_and(|editor| editor.page_index() == page_index);
        if active_here {
            self.commit_or_remove();
        }

        let Some(layer) = self.state.layers.remove(&page_index) else {
            return false;
        };
        for id in layer.editors() {
            if let Some(editor) = self.state.editors.get_mut(id) {
                editor.set_layer(None);
            }
            self.state.hooks.hide(id);
        }
        debug!(page = page_index, "layer removed");
        self.refresh_state();
        true
    }

    /// Zoom or rotation changed for a page. Ink editors on it are redrawn
    /// once the view settles.
    pub fn update_viewport(&mut self, page_index: usize, viewport: Viewport) -> EditorResult<()> {
        let layer = self
            .state
            .layers
            .get_mut(&page_index)
            .ok_or(EditorError::LayerNotFound(page_index))?;
        layer.set_viewport(viewport);

        self.ink_redraw.accumulate(self.clock.now(), |pages| {
            let mut pages = pages.unwrap_or_default();
            pages.insert(page_index);
            pages
        });
        Ok(())
    }

    pub fn set_current_page(&mut self, page_index: usize) {
        self.current_page = page_index;
    }

    /// Runs debounced work whose deadline has passed. Returns `true` when
    /// something ran.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        let mut fired = false;

        if let Some(deltas) = self.translation.poll(now) {
            self.record_translation(deltas);
            fired = true;
        }

        if let Some(pages) = self.ink_redraw.poll(now) {
            let ids: Vec<EditorId> = self
                .state
                .editors
                .values()
                .filter(|editor| editor.layer().is_some() && pages.contains(&editor.page_index()))
                .filter(|editor| matches!(editor.kind(), EditorKind::Ink(_)))
                .map(|editor| editor.id().clone())
                .collect();
            debug!(pages = ?pages, editors = ids.len(), "ink redraw");
            for id in &ids {
                self.state.redraw(id);
            }
            fired = true;
        }

        if fired {
            self.refresh_state();
        }
        fired
    }

    pub fn undo(&mut self) -> bool {
        self.flush_translation();
        self.commit_or_remove();
        let undone = self.history.undo(&mut self.state);
        self.refresh_state();
        undone
    }

    pub fn redo(&mut self) -> bool {
        self.flush_translation();
        self.commit_or_remove();
        let redone = self.history.redo(&mut self.state);
        self.refresh_state();
        redone
    }

    /// Finalizes the active editor. An editor left empty is dropped without
    /// a trace. Returns `true` when something was committed.
    pub fn commit_or_remove(&mut self) -> bool {
        let Some(ActiveEditor { id, before }) = self.active.take() else {
            return false;
        };
        let Some(editor) = self.state.editors.get_mut(&id) else {
            return false;
        };

        if !editor.finish_editing() {
            debug!(editor = %id, "empty editor dropped");
            self.state.discard_editor(&id);
            if let Some(before) = before {
                // Emptying an existing editor deletes it.
                self.state.insert_editor(before);
                self.delete_editors(vec![id]);
            }
            self.refresh_state();
            return false;
        }

        let after = editor.clone();
        self.state.sync_storage(&id);
        self.state.redraw(&id);
        match before {
            None => self.push_create(after),
            Some(before) if before.serialize(true) != after.serialize(true) => {
                let command = EditorCommand::new(
                    move |state: &mut EditingState| state.restore_editor(&after),
                    move |state: &mut EditingState| state.restore_editor(&before),
                );
                self.history.add(&mut self.state, command, AddOptions::record());
            }
            Some(_) => {}
        }
        self.refresh_state();
        true
    }

    /// Reopens a committed free text editor for typing.
    pub fn enter_edit_mode(&mut self, id: &EditorId) -> EditorResult<()> {
        let editor = self.require_editor(id)?;
        if !matches!(editor.kind(), EditorKind::FreeText(_)) {
            return Err(EditorError::WrongEditorKind { id: id.clone(), expected: "free text" });
        }
        if self.active_editor() == Some(id) {
            return Ok(());
        }

        self.flush_translation();
        self.commit_or_remove();
        let before = self.state.editors.get_mut(id).map(|editor| {
            let snapshot = editor.clone();
            editor.begin_editing();
            snapshot
        });
        self.active = Some(ActiveEditor { id: id.clone(), before });
        self.state.set_selection(vec![id.clone()]);
        self.refresh_state();
        Ok(())
    }

    /// Starts a free text editor at `at`, in layer pixels.
    pub fn create_free_text(&mut self, page_index: usize, at: Point) -> EditorResult<EditorId> {
        let layer = self.require_layer(page_index)?;
        let shown = layer.to_display(at);

        self.flush_translation();
        self.commit_or_remove();
        let defaults = &self.config.defaults;
        let data = FreeTextData::new(defaults.free_text_size, defaults.free_text_color);
        let id = self.spawn_editor(
            page_index,
            EditorKind::FreeText(data),
            NormalizedBox::new(shown.x, shown.y, 0.0, 0.0),
        )?;
        self.activate(&id);
        self.refresh_state();
        Ok(id)
    }

    /// Replaces the text of the active free text editor.
    pub fn set_text(&mut self, text: &str) -> EditorResult<()> {
        let id = self.active_id()?;
        match self.state.editors.get_mut(&id).map(Editor::kind_mut) {
            Some(EditorKind::FreeText(data)) => data.text = text.to_owned(),
            _ => return Err(EditorError::NoActiveEditor("free text")),
        }
        self.state.redraw(&id);
        Ok(())
    }

    /// Pointer down in ink mode. Continues the active ink editor on the same
    /// page, otherwise starts a new one.
    pub fn ink_pointer_down(&mut self, page_index: usize, at: Point) -> EditorResult<EditorId> {
        let viewport = *self.require_layer(page_index)?.viewport();

        let id = match self.active_ink_on(page_index) {
            Some(id) => id,
            None => {
                self.flush_translation();
                self.commit_or_remove();
                let defaults = &self.config.defaults;
                let data = InkData::drawing(&viewport, defaults.ink_color, defaults.ink_thickness, defaults.ink_opacity);
                let id = self.spawn_editor(
                    page_index,
                    EditorKind::Ink(data),
                    NormalizedBox::new(0.0, 0.0, 1.0, 1.0),
                )?;
                self.activate(&id);
                id
            }
        };

        if let Some(session) = self.ink_session(&id) {
            session.start_stroke(at);
        }
        self.state.redraw(&id);
        self.refresh_state();
        Ok(id)
    }

    /// Returns `true` when the sample extended the stroke.
    pub fn ink_pointer_move(&mut self, at: Point) -> EditorResult<bool> {
        let id = self.active_id()?;
        let session = self.ink_session(&id).ok_or(EditorError::NoActiveEditor("ink"))?;
        let added = session.add_point(at);
        if added {
            self.state.redraw(&id);
        }
        Ok(added)
    }

    pub fn ink_pointer_up(&mut self) -> EditorResult<()> {
        let id = self.active_id()?;
        self.ink_session(&id).ok_or(EditorError::NoActiveEditor("ink"))?.end_stroke();
        Ok(())
    }

    /// Highlights text selection rectangles given in display-normalized
    /// coordinates. Returns `None` when the boxes cover nothing.
    pub fn create_highlight(&mut self, page_index: usize, boxes: &[NormalizedBox]) -> EditorResult<Option<EditorId>> {
        self.require_layer(page_index)?;
        self.flush_translation();
        self.commit_or_remove();

        let defaults = &self.config.defaults;
        let Some((data, shown)) = HighlightData::from_boxes(
            boxes,
            defaults.highlight_color,
            defaults.highlight_thickness,
            defaults.highlight_opacity,
        ) else {
            return Ok(None);
        };

        let id = self.spawn_editor(page_index, EditorKind::Highlight(data), shown)?;
        self.commit_new(&id);
        self.state.set_selection(vec![id.clone()]);
        self.refresh_state();
        Ok(Some(id))
    }

    /// Starts a freehand highlight at `at`, in layer pixels.
    pub fn start_free_highlight(&mut self, page_index: usize, at: Point) -> EditorResult<EditorId> {
        let viewport = *self.require_layer(page_index)?.viewport();
        self.flush_translation();
        self.commit_or_remove();

        let defaults = &self.config.defaults;
        let data = HighlightData::free(
            at,
            &viewport,
            defaults.highlight_color,
            defaults.highlight_thickness,
            defaults.highlight_opacity,
        );
        let shown = data.outline.bbox;
        let id = self.spawn_editor(page_index, EditorKind::Highlight(data), shown)?;
        self.activate(&id);
        self.refresh_state();
        Ok(id)
    }

    pub fn free_highlight_move(&mut self, at: Point) -> EditorResult<bool> {
        let id = self.active_id()?;
        let added = match self.state.editors.get_mut(&id).map(Editor::kind_mut) {
            Some(EditorKind::Highlight(data)) if data.is_drawing() => data.add_free_point(at),
            _ => return Err(EditorError::NoActiveEditor("free highlight")),
        };
        if added {
            self.state.redraw(&id);
        }
        Ok(added)
    }

    /// Ends the freehand highlight and commits it.
    pub fn end_free_highlight(&mut self) -> EditorResult<Option<EditorId>> {
        let id = self.active_id()?;
        if !matches!(self.editor(&id).map(Editor::kind), Some(EditorKind::Highlight(_))) {
            return Err(EditorError::NoActiveEditor("free highlight"));
        }
        Ok(self.commit_or_remove().then_some(id))
    }

    /// Places a stamp centered on `center` (display-normalized, page center
    /// when absent). Images not in the cache yet are requested from the host
    /// through [`UiManager::take_bitmap_requests`].
    pub fn create_stamp(&mut self, page_index: usize, source: BitmapSource, center: Option<Point>) -> EditorResult<EditorId> {
        let viewport = *self.require_layer(page_index)?.viewport();
        let center = center.unwrap_or(Point::new(0.5, 0.5));

        let cached = match &source {
            BitmapSource::Id { id } => Some(
                self.bitmaps
                    .get(id)
                    .ok_or_else(|| EditorError::Bitmap(format!("unknown bitmap `{id}`")))?,
            ),
            other => other.key().and_then(|key| self.bitmaps.lookup(&key)),
        };

        self.flush_translation();
        self.commit_or_remove();
        let id = match cached {
            Some(bitmap) => {
                let size = bitmap.size.unwrap_or(FALLBACK_STAMP_SIZE);
                let shown = StampData::fitted_box(size, viewport.display_size(), (center.x, center.y));
                let id = self.spawn_editor(page_index, EditorKind::Stamp(StampData::with_bitmap(bitmap)), shown)?;
                self.commit_new(&id);
                self.state.set_selection(vec![id.clone()]);
                id
            }
            None => {
                let shown = NormalizedBox::new(center.x, center.y, 0.0, 0.0);
                let id = self.spawn_editor(page_index, EditorKind::Stamp(StampData::pending(source.clone())), shown)?;
                self.request_bitmap(&id, source);
                id
            }
        };
        self.refresh_state();
        Ok(id)
    }

    /// Image loads the host has to perform. Each request carries a token
    /// that is cancelled if the stamp goes away first.
    pub fn take_bitmap_requests(&mut self) -> Vec<BitmapRequest> {
        std::mem::take(&mut self.bitmap_requests)
    }

    /// Completes a bitmap request. A failed load removes the pending stamp
    /// without recording anything. Returns `true` when the stamp got its
    /// image.
    pub fn bitmap_loaded(&mut self, id: &EditorId, result: Result<DecodedBitmap, String>) -> EditorResult<bool> {
        let Some(token) = self.pending_bitmaps.complete(id) else {
            debug!(editor = %id, "bitmap for an unknown request ignored");
            return Ok(false);
        };
        if token.is_cancelled() {
            return Ok(false);
        }
        let Some(editor) = self.state.editors.get(id) else {
            return Ok(false);
        };
        let EditorKind::Stamp(data) = editor.kind() else {
            return Err(EditorError::WrongEditorKind { id: id.clone(), expected: "stamp" });
        };
        let key = data.pending.as_ref().and_then(BitmapSource::key);
        let was_committed = editor.state() == EditorState::Committed;

        let decoded = match result {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(editor = %id, "bitmap failed to load: {reason}");
                self.state.discard_editor(id);
                self.refresh_state();
                return Ok(false);
            }
        };

        let size = (decoded.width, decoded.height);
        let bitmap = self.bitmaps.insert(key, decoded);
        let layer_size = self.viewport_for(id).map(|viewport| viewport.display_size());
        if let Some(editor) = self.state.editors.get_mut(id) {
            if let EditorKind::Stamp(data) = editor.kind_mut() {
                data.set_bitmap(bitmap);
            }
            if !was_committed {
                let shown = editor.view_box(editor.rotation());
                let center = (shown.x + shown.width / 2.0, shown.y + shown.height / 2.0);
                let fitted = StampData::fitted_box(size, layer_size.unwrap_or((1.0, 1.0)), center);
                let bbox = editor_box_from_display(&fitted, editor.rotation(), editor.page());
                editor.set_bbox(bbox);
            }
        }

        if was_committed {
            self.state.sync_storage(id);
            self.state.redraw(id);
        } else {
            self.commit_new(id);
            self.state.set_selection(vec![id.clone()]);
        }
        self.refresh_state();
        Ok(true)
    }

    /// Changes a parameter on the selected editors it applies to, as one
    /// undo step that later changes of the same parameter on the same
    /// editors fold into. With nothing selected, the default for new editors
    /// changes instead.
    pub fn update_params(&mut self, param: EditorParamType, value: ParamValue) -> EditorResult<()> {
        let mut defaults = self.config.defaults.clone();
        apply_default(&mut defaults, param, value)?;
        self.flush_translation();

        let mut targets: Vec<EditorId> = self.state.selection.clone();
        if let Some(active) = self.active_editor() {
            if !targets.contains(active) {
                targets.push(active.clone());
            }
        }
        if targets.is_empty() {
            self.config.defaults = defaults;
            return Ok(());
        }
        let previous: Vec<(EditorId, ParamValue)> = targets
            .iter()
            .filter_map(|id| {
                let editor = self.state.editors.get(id)?;
                editor.param_value(param).ok().map(|value| (id.clone(), value))
            })
            .collect();
        if previous.is_empty() {
            return Ok(());
        }

        let ids: Vec<EditorId> = previous.iter().map(|(id, _)| id.clone()).collect();
        let kind = CommandKind::Param(param, ids.clone());
        let command = EditorCommand::new(
            move |state: &mut EditingState| {
                for id in &ids {
                    state.apply_param(id, param, value);
                }
            },
            move |state: &mut EditingState| {
                for (id, value) in &previous {
                    state.apply_param(id, param, *value);
                }
            },
        )
        .with_kind(kind);
        self.history.add(&mut self.state, command, AddOptions::coalescing());
        self.refresh_state();
        Ok(())
    }

    /// Adds an editor for an annotation already in the document. It is not
    /// saved unless it changes.
    pub fn load_existing(&mut self, record: &EditorRecord, annotation_element_id: &str) -> EditorResult<EditorId> {
        let page = self.require_layer(record.page_index)?.dimensions();
        let id = self.ids.next_id();
        let mut editor = Editor::deserialize(record, id.clone(), page, &self.config.defaults, &mut self.bitmaps)?;
        editor.link_existing(annotation_element_id.to_owned(), record.clone());
        editor.set_state(EditorState::Committed);

        let pending = pending_source(&editor);
        self.state.insert_editor(editor);
        if let Some(source) = pending {
            self.request_bitmap(&id, source);
        }
        self.refresh_state();
        Ok(id)
    }

    /// Sets the alternative text of a stamp. A decorative image has none.
    pub fn set_alt_text(&mut self, id: &EditorId, text: Option<String>, decorative: bool) -> EditorResult<()> {
        let editor = self.require_editor(id)?;
        let before = editor.clone();
        let mut after = editor.clone();
        match after.kind_mut() {
            EditorKind::Stamp(data) => {
                data.alt_text = text;
                data.decorative = decorative;
            }
            _ => return Err(EditorError::WrongEditorKind { id: id.clone(), expected: "stamp" }),
        }

        self.flush_translation();
        let command = EditorCommand::new(
            move |state: &mut EditingState| state.restore_editor(&after),
            move |state: &mut EditingState| state.restore_editor(&before),
        );
        self.history.add(&mut self.state, command, AddOptions::exec());
        self.refresh_state();
        Ok(())
    }

    /// Tears the session down. Storage keeps what was committed.
    pub fn destroy(&mut self) {
        let cancelled = self.pending_bitmaps.cancel_all();
        self.bitmap_requests.clear();
        self.translation.cancel();
        self.ink_redraw.cancel();
        self.active = None;
        self.drag = None;
        self.resize = None;
        for layer in self.state.layers.values_mut() {
            layer.suspend_text_selection(false);
        }

        let ids: Vec<EditorId> = self.state.editors.keys().cloned().collect();
        for id in &ids {
            self.state.hooks.remove(id);
        }
        self.state.editors.clear();
        self.state.layers.clear();
        self.state.set_selection(Vec::new());
        self.history.clear();
        self.bitmaps.prune();
        info!(editors = ids.len(), cancelled, "editing session destroyed");
        self.refresh_state();
    }

    fn require_editor(&self, id: &EditorId) -> EditorResult<&Editor> {
        self.state.editors.get(id).ok_or_else(|| EditorError::EditorNotFound(id.clone()))
    }

    fn require_layer(&self, page_index: usize) -> EditorResult<&Layer> {
        self.state.layers.get(&page_index).ok_or(EditorError::LayerNotFound(page_index))
    }

    fn active_id(&self) -> EditorResult<EditorId> {
        self.active
            .as_ref()
            .map(|active| active.id.clone())
            .ok_or(EditorError::NoActiveEditor("any"))
    }

    fn active_ink_on(&self, page_index: usize) -> Option<EditorId> {
        let active = self.active.as_ref()?;
        let editor = self.state.editors.get(&active.id)?;
        match editor.kind() {
            EditorKind::Ink(data) if data.session().is_some() && editor.page_index() == page_index => {
                Some(active.id.clone())
            }
            _ => None,
        }
    }

    fn ink_session(&mut self, id: &EditorId) -> Option<&mut crate::editor::InkSession> {
        match self.state.editors.get_mut(id)?.kind_mut() {
            EditorKind::Ink(data) => data.session_mut(),
            _ => None,
        }
    }

    /// Viewport an editor is shown with; the unscaled page when its page is
    /// not displayed.
    fn viewport_for(&self, id: &EditorId) -> Option<Viewport> {
        let editor = self.state.editors.get(id)?;
        let viewport = match editor.layer().and_then(|layer| self.state.layers.get(&layer)) {
            Some(layer) => *layer.viewport(),
            None => {
                let page = editor.page();
                Viewport::new(page.width, page.height).with_origin(page.x, page.y)
            }
        };
        Some(viewport)
    }

    /// Creates an editor on a displayed page from a box drawn under the
    /// page's current rotation.
    fn spawn_editor(&mut self, page_index: usize, kind: EditorKind, shown: NormalizedBox) -> EditorResult<EditorId> {
        let viewport = *self.require_layer(page_index)?.viewport();
        let page = viewport.dimensions();
        let bbox = editor_box_from_display(&shown, viewport.rotation, &page);

        let id = self.ids.next_id();
        let mut editor = Editor::new(id.clone(), page_index, page, viewport.rotation, bbox, kind);
        editor.set_state(EditorState::Rendered);
        debug!(editor = %id, page = page_index, kind = editor.editor_type().name(), "editor created");
        self.state.insert_editor(editor);
        Ok(id)
    }

    fn activate(&mut self, id: &EditorId) {
        if let Some(editor) = self.state.editors.get_mut(id) {
            editor.begin_editing();
        }
        self.active = Some(ActiveEditor { id: id.clone(), before: None });
        self.state.set_selection(vec![id.clone()]);
    }

    /// Commits an editor that needs no editing phase.
    fn commit_new(&mut self, id: &EditorId) {
        let Some(editor) = self.state.editors.get_mut(id) else {
            return;
        };
        editor.set_state(EditorState::Committed);
        let snapshot = editor.clone();
        self.state.sync_storage(id);
        self.push_create(snapshot);
    }

    fn push_create(&mut self, snapshot: Editor) {
        let id = snapshot.id().clone();
        let command = EditorCommand::new(
            move |state: &mut EditingState| state.insert_editor(snapshot.clone()),
            move |state: &mut EditingState| {
                state.remove_editor(&id);
            },
        );
        self.history.add(&mut self.state, command, AddOptions::record());
    }

    /// Removes editors as one undo step.
    fn delete_editors(&mut self, ids: Vec<EditorId>) -> usize {
        let snapshots: Vec<Editor> = ids.iter().filter_map(|id| self.state.editors.get(id).cloned()).collect();
        if snapshots.is_empty() {
            return 0;
        }
        for snapshot in &snapshots {
            self.pending_bitmaps.cancel(snapshot.id());
        }

        let count = snapshots.len();
        let ids: Vec<EditorId> = snapshots.iter().map(|editor| editor.id().clone()).collect();
        let command = EditorCommand::new(
            move |state: &mut EditingState| {
                for id in &ids {
                    state.remove_editor(id);
                }
            },
            move |state: &mut EditingState| {
                for snapshot in &snapshots {
                    state.insert_editor(snapshot.clone());
                }
            },
        );
        self.history.add(&mut self.state, command, AddOptions::exec());
        debug!(count, "editors deleted");
        count
    }

    fn request_bitmap(&mut self, id: &EditorId, source: BitmapSource) {
        let token = self.pending_bitmaps.register(id.clone());
        debug!(editor = %id, "bitmap requested");
        self.bitmap_requests.push(BitmapRequest { editor_id: id.clone(), source, token });
    }

    /// Re-derives the toolbar flags and reports them when they changed.
    fn refresh_state(&mut self) {
        let state = UiState {
            is_editing: self.mode != AnnotationEditorType::None,
            has_selected_editor: !self.state.selection.is_empty(),
            has_something_to_undo: self.history.has_something_to_undo(),
            has_something_to_redo: self.history.has_something_to_redo(),
            has_empty_clipboard: self.clipboard.is_none(),
            is_empty: self.state.editors.is_empty(),
        };
        if state != self.ui_state {
            self.ui_state = state;
            self.state.hooks.state_changed(&state);
        }
    }
}

impl std::fmt::Debug for UiManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiManager")
            .field("mode", &self.mode)
            .field("current_page", &self.current_page)
            .field("editors", &self.state.editors.len())
            .field("layers", &self.state.layers.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

fn pending_source(editor: &Editor) -> Option<BitmapSource> {
    match editor.kind() {
        EditorKind::Stamp(data) if !data.is_loaded() => data.pending.clone(),
        _ => None,
    }
}

/// Updates the default for new editors, checking the value's kind.
fn apply_default(defaults: &mut EditorDefaults, param: EditorParamType, value: ParamValue) -> EditorResult<()> {
    let invalid = || EditorError::InvalidParamValue(param);
    let color = |value: ParamValue| -> EditorResult<Rgb> { value.as_color().ok_or_else(invalid) };
    let number = |value: ParamValue| -> EditorResult<f64> {
        value.as_number().filter(|number| number.is_finite()).ok_or_else(invalid)
    };

    match param {
        EditorParamType::FreeTextSize => defaults.free_text_size = number(value)?,
        EditorParamType::FreeTextColor => defaults.free_text_color = color(value)?,
        EditorParamType::InkColor => defaults.ink_color = color(value)?,
        EditorParamType::InkThickness => defaults.ink_thickness = number(value)?,
        EditorParamType::InkOpacity => defaults.ink_opacity = number(value)?.clamp(0.0, 1.0),
        EditorParamType::HighlightColor => defaults.highlight_color = color(value)?,
        EditorParamType::HighlightThickness => defaults.highlight_thickness = number(value)?,
        EditorParamType::HighlightOpacity => defaults.highlight_opacity = number(value)?.clamp(0.0, 1.0),
    }
    Ok(())
}

#[cfg(test)]
mod tests;
