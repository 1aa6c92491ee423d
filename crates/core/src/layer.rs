//! Per-page editor layer
//!
//! A layer exists while its page is displayed. It lists the editors shown on
//! the page and carries the page's current viewport. Editors themselves are
//! owned by the manager, so hiding a page never drops them.

use annotation_model::AnnotationEditorType;
use tracing::debug;

use crate::geometry::{PageDimensions, Point, Viewport};
use crate::ids::{EditorId, LayerId};

#[derive(Debug, Clone)]
pub struct Layer {
    page_index: usize,
    viewport: Viewport,
    editors: Vec<EditorId>,
    /// Pointer events reach the layer instead of the page below.
    pointer_capture: bool,
    /// Text selection on the page stays enabled, for highlighting.
    text_selection: bool,
    /// Text selection is off while an editor drag is in progress.
    selection_suspended: bool,
}

impl Layer {
    pub fn new(page_index: usize, viewport: Viewport) -> Self {
        Self {
            page_index,
            viewport,
            editors: Vec::new(),
            pointer_capture: false,
            text_selection: false,
            selection_suspended: false,
        }
    }

    pub fn id(&self) -> LayerId {
        self.page_index
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn dimensions(&self) -> PageDimensions {
        self.viewport.dimensions()
    }

    pub fn editors(&self) -> &[EditorId] {
        &self.editors
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }

    pub fn contains(&self, id: &EditorId) -> bool {
        self.editors.contains(id)
    }

    pub fn pointer_capture(&self) -> bool {
        self.pointer_capture
    }

    pub fn text_selection(&self) -> bool {
        self.text_selection && !self.selection_suspended
    }

    /// Layer pixel to display-normalized point.
    pub fn to_display(&self, point: Point) -> Point {
        let (width, height) = self.viewport.display_size();
        Point::new(point.x / width, point.y / height)
    }

    /// Enables the input the editing mode needs.
    pub(crate) fn update_mode(&mut self, mode: AnnotationEditorType) {
        let (pointer_capture, text_selection) = match mode {
            AnnotationEditorType::None => (false, false),
            AnnotationEditorType::FreeText | AnnotationEditorType::Ink | AnnotationEditorType::Stamp => {
                (true, false)
            }
            AnnotationEditorType::Highlight => (true, true),
        };
        self.pointer_capture = pointer_capture;
        self.text_selection = text_selection;
    }

    pub(crate) fn suspend_text_selection(&mut self, suspended: bool) {
        self.selection_suspended = suspended;
    }

    pub(crate) fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub(crate) fn attach(&mut self, id: EditorId) {
        if !self.editors.contains(&id) {
            debug!(page = self.page_index, editor = %id, "editor attached");
            self.editors.push(id);
        }
    }

    pub(crate) fn detach(&mut self, id: &EditorId) -> bool {
        let before = self.editors.len();
        self.editors.retain(|editor| editor != id);
        before != self.editors.len()
    }
}
