use annotation_model::ClipboardPayload;
use tracing::{debug, warn};

use super::{pending_source, EditingState, EditorCommand, UiManager};
use crate::command_manager::AddOptions;
use crate::editor::{Editor, EditorState};
use crate::error::{EditorError, EditorResult};
use crate::ids::EditorId;

impl UiManager {
    /// Serializes the selection into clipboard JSON. Returns `None` when
    /// nothing selected has content.
    pub fn copy(&mut self) -> EditorResult<Option<String>> {
        self.flush_translation();
        self.commit_or_remove();

        let records: Vec<_> = self
            .state
            .selection
            .iter()
            .filter_map(|id| self.state.editors.get(id))
            .filter_map(|editor| editor.serialize(true))
            .collect();
        if records.is_empty() {
            return Ok(None);
        }

        let json = ClipboardPayload::new(records).to_json()?;
        debug!(bytes = json.len(), "selection copied");
        self.clipboard = Some(json.clone());
        self.refresh_state();
        Ok(Some(json))
    }

    /// Copies the selection, then deletes it.
    pub fn cut(&mut self) -> EditorResult<Option<String>> {
        let copied = self.copy()?;
        if copied.is_some() {
            self.delete();
        }
        Ok(copied)
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    /// Adds the editors described by `text`, or by the last copy when `text`
    /// is `None`, to the current page as one undo step. The pasted editors
    /// become the selection.
    ///
    /// Nothing is added if any record fails to load.
    pub fn paste(&mut self, text: Option<&str>) -> EditorResult<Vec<EditorId>> {
        let Some(text) = text.map(str::to_owned).or_else(|| self.clipboard.clone()) else {
            return Ok(Vec::new());
        };
        let payload = ClipboardPayload::from_json(&text).map_err(|err| {
            warn!("paste aborted: {err}");
            EditorError::Clipboard(err.to_string())
        })?;
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        let page_index = self.current_page;
        let page = self.require_layer(page_index)?.dimensions();
        let mut pasted: Vec<Editor> = Vec::with_capacity(payload.len());
        for record in &payload.records {
            let mut record = record.clone();
            record.page_index = page_index;
            record.id = None;
            let id = self.ids.next_id();
            let mut editor = Editor::deserialize(&record, id, page, &self.config.defaults, &mut self.bitmaps)
                .map_err(|err| {
                    warn!("paste aborted: {err}");
                    err
                })?;
            editor.set_state(EditorState::Committed);
            pasted.push(editor);
        }

        self.flush_translation();
        self.commit_or_remove();
        let ids: Vec<EditorId> = pasted.iter().map(|editor| editor.id().clone()).collect();
        let pending: Vec<_> = pasted
            .iter()
            .filter_map(|editor| pending_source(editor).map(|source| (editor.id().clone(), source)))
            .collect();

        let undo_ids = ids.clone();
        let command = EditorCommand::new(
            move |state: &mut EditingState| {
                for editor in &pasted {
                    state.insert_editor(editor.clone());
                }
            },
            move |state: &mut EditingState| {
                for id in &undo_ids {
                    state.remove_editor(id);
                }
            },
        );
        self.history.add(&mut self.state, command, AddOptions::exec());
        for (id, source) in pending {
            self.request_bitmap(&id, source);
        }

        debug!(count = ids.len(), page = page_index, "editors pasted");
        self.state.set_selection(ids.clone());
        self.refresh_state();
        Ok(ids)
    }
}
