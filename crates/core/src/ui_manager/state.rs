use std::collections::BTreeMap;

use annotation_model::{DeletedRecord, EditorParamType};
use annotation_storage::{to_value_bag, AnnotationStorage, AnnotationStore, StorageResult};
use serde::Serialize;
use tracing::warn;

use super::hooks::RenderHooks;
use crate::editor::{Editor, EditorState, ParamValue};
use crate::geometry::{NormalizedBox, PageDimensions};
use crate::ids::EditorId;
use crate::layer::Layer;

/// Where an editor sits: its position fields plus its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
    pub page: PageDimensions,
}

impl Placement {
    pub fn of(editor: &Editor) -> Self {
        let bbox = editor.bbox();
        Self { x: bbox.x, y: bbox.y, page_index: editor.page_index(), page: *editor.page() }
    }
}

/// Everything undo and redo may touch.
///
/// Commands receive this by `&mut`, never the manager, so replaying one
/// cannot record further commands.
pub struct EditingState {
    pub(crate) layers: BTreeMap<usize, Layer>,
    pub(crate) editors: BTreeMap<EditorId, Editor>,
    /// Insertion ordered; the last entry is the "last selected" editor.
    pub(crate) selection: Vec<EditorId>,
    pub(crate) storage: AnnotationStorage,
    pub(crate) hooks: Box<dyn RenderHooks>,
}

impl EditingState {
    pub(crate) fn new(hooks: Box<dyn RenderHooks>) -> Self {
        Self {
            layers: BTreeMap::new(),
            editors: BTreeMap::new(),
            selection: Vec::new(),
            storage: AnnotationStorage::new(),
            hooks,
        }
    }

    /// Adds an editor, attaching it to its page's layer when that page is
    /// displayed, and mirrors it into storage once committed.
    pub(crate) fn insert_editor(&mut self, mut editor: Editor) {
        let id = editor.id().clone();
        match self.layers.get_mut(&editor.page_index()) {
            Some(layer) => {
                layer.attach(id.clone());
                editor.set_layer(Some(layer.id()));
            }
            None => editor.set_layer(None),
        }
        if editor.state() == EditorState::Removed {
            editor.set_state(EditorState::Committed);
        }
        self.editors.insert(id.clone(), editor);
        self.sync_storage(&id);
        if let Some(editor) = self.editors.get(&id) {
            self.hooks.render(editor);
        }
    }

    /// Takes an editor out of the session. A loaded annotation leaves a
    /// deletion marker behind in storage.
    pub(crate) fn remove_editor(&mut self, id: &EditorId) -> Option<Editor> {
        let mut editor = self.editors.remove(id)?;
        if let Some(layer) = editor.layer().and_then(|layer| self.layers.get_mut(&layer)) {
            layer.detach(id);
        }
        editor.set_layer(None);
        editor.set_state(EditorState::Removed);
        self.deselect(id);

        let cleared = match editor.annotation_element_id() {
            Some(element_id) => self.write_deleted_marker(id, element_id, editor.page_index()),
            None => self.storage.remove(id.as_str()),
        };
        if let Err(err) = cleared {
            warn!(editor = %id, "failed to clear storage: {err}");
        }

        self.hooks.remove(id);
        Some(editor)
    }

    /// Drops an editor that never reached storage.
    pub(crate) fn discard_editor(&mut self, id: &EditorId) -> Option<Editor> {
        let mut editor = self.editors.remove(id)?;
        if let Some(layer) = editor.layer().and_then(|layer| self.layers.get_mut(&layer)) {
            layer.detach(id);
        }
        editor.set_state(EditorState::Removed);
        self.deselect(id);
        self.hooks.remove(id);
        Some(editor)
    }

    fn write_deleted_marker(&mut self, id: &EditorId, element_id: &str, page_index: usize) -> StorageResult<()> {
        let marker = serde_json::to_value(DeletedRecord::new(element_id, page_index))?;
        self.storage.replace_value(id.as_str(), to_value_bag(id.as_str(), marker)?);
        Ok(())
    }

    /// Rewrites the storage entry of a committed editor from its current
    /// content.
    pub(crate) fn sync_storage(&mut self, id: &EditorId) {
        let Some(editor) = self.editors.get(id) else {
            return;
        };
        if editor.state() != EditorState::Committed {
            return;
        }

        let result = match editor.serialize(false) {
            Some(record) => write_record(&mut self.storage, id, &record),
            None => self.storage.remove(id.as_str()),
        };
        if let Err(err) = result {
            warn!(editor = %id, "failed to update storage: {err}");
        }
    }

    pub(crate) fn redraw(&mut self, id: &EditorId) {
        if let Some(editor) = self.editors.get(id) {
            self.hooks.redraw(editor);
        }
    }

    pub(crate) fn apply_param(&mut self, id: &EditorId, param: EditorParamType, value: ParamValue) {
        let Some(editor) = self.editors.get_mut(id) else {
            return;
        };
        if let Err(err) = editor.update_param(param, value) {
            warn!(editor = %id, "parameter update skipped: {err}");
            return;
        }
        self.sync_storage(id);
        self.redraw(id);
    }

    pub(crate) fn place_editor(&mut self, id: &EditorId, placement: Placement) {
        let Some(editor) = self.editors.get_mut(id) else {
            return;
        };

        if editor.page_index() != placement.page_index {
            if let Some(layer) = editor.layer().and_then(|layer| self.layers.get_mut(&layer)) {
                layer.detach(id);
            }
            editor.move_to_page(placement.page_index, placement.page);
            match self.layers.get_mut(&placement.page_index) {
                Some(layer) => {
                    layer.attach(id.clone());
                    editor.set_layer(Some(layer.id()));
                }
                None => editor.set_layer(None),
            }
        }
        editor.set_position(placement.x, placement.y);
        self.sync_storage(id);
        self.redraw(id);
    }

    /// Moves by a page-normalized delta.
    pub(crate) fn translate_editor(&mut self, id: &EditorId, dx: f64, dy: f64) {
        if let Some(editor) = self.editors.get_mut(id) {
            editor.translate(dx, dy);
            self.sync_storage(id);
            self.redraw(id);
        }
    }

    pub(crate) fn set_editor_bbox(&mut self, id: &EditorId, bbox: NormalizedBox) {
        if let Some(editor) = self.editors.get_mut(id) {
            editor.set_bbox(bbox);
            self.sync_storage(id);
            self.redraw(id);
        }
    }

    /// Swaps an editor's content for a snapshot of the same editor.
    pub(crate) fn restore_editor(&mut self, snapshot: &Editor) {
        let id = snapshot.id().clone();
        let layer = self.editors.get(&id).and_then(Editor::layer);
        let mut editor = snapshot.clone();
        editor.set_layer(layer);
        self.editors.insert(id.clone(), editor);
        self.sync_storage(&id);
        self.redraw(&id);
    }

    pub(crate) fn select(&mut self, id: &EditorId) {
        self.selection.retain(|selected| selected != id);
        self.selection.push(id.clone());
        self.hooks.selection_changed(&self.selection);
    }

    pub(crate) fn deselect(&mut self, id: &EditorId) {
        let before = self.selection.len();
        self.selection.retain(|selected| selected != id);
        if before != self.selection.len() {
            self.hooks.selection_changed(&self.selection);
        }
    }

    pub(crate) fn set_selection(&mut self, ids: Vec<EditorId>) {
        if ids != self.selection {
            self.selection = ids;
            self.hooks.selection_changed(&self.selection);
        }
    }
}

fn write_record<T: Serialize>(storage: &mut AnnotationStorage, id: &EditorId, record: &T) -> StorageResult<()> {
    let value = serde_json::to_value(record)?;
    storage.replace_value(id.as_str(), to_value_bag(id.as_str(), value)?);
    Ok(())
}
