use tracing::debug;

use super::UiManager;
use crate::error::{EditorError, EditorResult};
use crate::ids::EditorId;

impl UiManager {
    /// Makes `id` the only selected editor. Selecting another editor commits
    /// the one being edited.
    pub fn set_selected(&mut self, id: &EditorId) -> EditorResult<()> {
        self.require_editor(id)?;
        if self.active_editor().is_some_and(|active| active != id) {
            self.flush_translation();
            self.commit_or_remove();
        }
        // Committing may have dropped an emptied editor.
        if !self.state.editors.contains_key(id) {
            return Err(EditorError::EditorNotFound(id.clone()));
        }
        self.state.set_selection(vec![id.clone()]);
        self.refresh_state();
        Ok(())
    }

    /// Adds `id` to the selection or takes it out.
    pub fn toggle_selected(&mut self, id: &EditorId) -> EditorResult<()> {
        self.require_editor(id)?;
        if self.is_selected(id) {
            self.state.deselect(id);
        } else {
            self.state.select(id);
        }
        self.refresh_state();
        Ok(())
    }

    /// Extends the selection; `id` becomes the last selected editor.
    pub fn add_to_selection(&mut self, id: &EditorId) -> EditorResult<()> {
        self.require_editor(id)?;
        self.state.select(id);
        self.refresh_state();
        Ok(())
    }

    pub fn unselect_all(&mut self) {
        self.flush_translation();
        self.commit_or_remove();
        self.state.set_selection(Vec::new());
        self.refresh_state();
    }

    /// Selects every committed editor of the session.
    pub fn select_all(&mut self) {
        self.flush_translation();
        self.commit_or_remove();
        let ids: Vec<EditorId> = self.state.editors.keys().cloned().collect();
        self.state.set_selection(ids);
        self.refresh_state();
    }

    pub fn selection(&self) -> &[EditorId] {
        &self.state.selection
    }

    pub fn is_selected(&self, id: &EditorId) -> bool {
        self.state.selection.contains(id)
    }

    /// Most recently selected editor still in the selection.
    pub fn last_selected(&self) -> Option<&EditorId> {
        self.state.selection.last()
    }

    /// Deletes the selection as one undo step. Returns how many editors went
    /// away.
    pub fn delete(&mut self) -> usize {
        self.flush_translation();
        self.commit_or_remove();
        let ids = self.state.selection.clone();
        let count = self.delete_editors(ids);
        debug!(count, "selection deleted");
        self.refresh_state();
        count
    }
}
