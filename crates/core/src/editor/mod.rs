//! Annotation editors
//!
//! An [`Editor`] is one user-authored annotation. The fields shared by every
//! kind (id, page, normalized box, rotation) live on the struct, the payload
//! lives in [`EditorKind`].
//!
//! Position and size are stored as fractions of the unrotated page: `(x, y)`
//! is the corner shown top-left under the editor's rotation, and `width` and
//! `height` are measured along the editor's own axes. Zoom and view rotation
//! never change them.

mod free_text;
mod highlight;
mod ink;
mod stamp;

use annotation_model::{AnnotationEditorType, EditorParamType, EditorRecord, ModelError, Rgb};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bitmap_cache::BitmapCache;
use crate::config::EditorDefaults;
use crate::error::{EditorError, EditorResult};
use crate::geometry::{
    display_box_from_editor, editor_box_from_display, normalized_from_rect,
    page_region_from_rect, rect_from_normalized, rect_from_page_region, rotate_box,
    NormalizedBox, PageDimensions, PdfRect, Rotation,
};
use crate::ids::{EditorId, LayerId};

pub use free_text::FreeTextData;
pub use highlight::{HighlightData, HighlightShape};
pub use ink::{InkData, InkSession};
pub use stamp::{StampData, MAX_STAMP_RATIO};

/// Where an editor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorState {
    Constructed,
    Rendered,
    /// Content can still change; nothing is in storage yet.
    Editing,
    /// Frozen and mirrored into annotation storage.
    Committed,
    Removed,
}

/// Value carried by a parameter update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Color(Rgb),
    Number(f64),
}

impl ParamValue {
    pub fn as_color(self) -> Option<Rgb> {
        match self {
            Self::Color(color) => Some(color),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(number),
            Self::Color(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EditorKind {
    FreeText(FreeTextData),
    Ink(InkData),
    Highlight(HighlightData),
    Stamp(StampData),
}

impl EditorKind {
    pub fn editor_type(&self) -> AnnotationEditorType {
        match self {
            Self::FreeText(_) => AnnotationEditorType::FreeText,
            Self::Ink(_) => AnnotationEditorType::Ink,
            Self::Highlight(_) => AnnotationEditorType::Highlight,
            Self::Stamp(_) => AnnotationEditorType::Stamp,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::FreeText(data) => data.is_empty(),
            Self::Ink(data) => data.is_empty(),
            Self::Highlight(data) => data.is_empty(),
            Self::Stamp(data) => data.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Editor {
    id: EditorId,
    page_index: usize,
    layer: Option<LayerId>,
    page: PageDimensions,
    bbox: NormalizedBox,
    rotation: Rotation,
    annotation_element_id: Option<String>,
    state: EditorState,
    /// Record this editor was loaded from, used to tell whether it changed.
    initial: Option<EditorRecord>,
    kind: EditorKind,
}

impl Editor {
    pub fn new(
        id: EditorId,
        page_index: usize,
        page: PageDimensions,
        rotation: Rotation,
        bbox: NormalizedBox,
        kind: EditorKind,
    ) -> Self {
        Self {
            id,
            page_index,
            layer: None,
            page,
            bbox,
            rotation,
            annotation_element_id: None,
            state: EditorState::Constructed,
            initial: None,
            kind,
        }
    }

    pub fn id(&self) -> &EditorId {
        &self.id
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    pub fn page(&self) -> &PageDimensions {
        &self.page
    }

    /// Normalized `x, y, width, height`.
    pub fn bbox(&self) -> NormalizedBox {
        self.bbox
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn annotation_element_id(&self) -> Option<&str> {
        self.annotation_element_id.as_deref()
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn kind(&self) -> &EditorKind {
        &self.kind
    }

    pub fn editor_type(&self) -> AnnotationEditorType {
        self.kind.editor_type()
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    /// Absolute PDF rect, shifted by `(tx, ty)` page units in the editor's frame.
    pub fn get_rect(&self, tx: f64, ty: f64) -> PdfRect {
        rect_from_normalized(&self.bbox, self.rotation, &self.page, (tx, ty))
    }

    pub fn rect(&self) -> PdfRect {
        self.get_rect(0.0, 0.0)
    }

    /// Page-normalized area covered, independent of rotation.
    pub fn region(&self) -> NormalizedBox {
        page_region_from_rect(self.rect(), &self.page)
    }

    /// Display-normalized box when the page is shown under `view`.
    pub fn view_box(&self, view: Rotation) -> NormalizedBox {
        rotate_box(&self.region(), view)
    }

    pub(crate) fn kind_mut(&mut self) -> &mut EditorKind {
        &mut self.kind
    }

    pub(crate) fn set_layer(&mut self, layer: Option<LayerId>) {
        self.layer = layer;
    }

    pub(crate) fn set_state(&mut self, state: EditorState) {
        self.state = state;
    }

    pub(crate) fn link_existing(&mut self, annotation_element_id: String, initial: EditorRecord) {
        self.annotation_element_id = Some(annotation_element_id);
        self.initial = Some(initial);
    }

    pub(crate) fn set_bbox(&mut self, bbox: NormalizedBox) {
        self.bbox = bbox;
    }

    pub(crate) fn set_region(&mut self, region: &NormalizedBox) {
        let rect = rect_from_page_region(region, &self.page);
        self.bbox = normalized_from_rect(rect, self.rotation, &self.page);
    }

    /// Moves by a page-normalized delta.
    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        self.bbox.x += dx;
        self.bbox.y += dy;
    }

    pub(crate) fn set_position(&mut self, x: f64, y: f64) {
        self.bbox.x = x;
        self.bbox.y = y;
    }

    pub(crate) fn move_to_page(&mut self, page_index: usize, page: PageDimensions) {
        self.page_index = page_index;
        self.page = page;
    }

    /// Scales the box along the editor's own axes, keeping either the
    /// top-left corner or the center in place.
    pub(crate) fn scale_box(&mut self, sx: f64, sy: f64, about_center: bool) {
        let shown = display_box_from_editor(&self.bbox, self.rotation, &self.page);
        let width = shown.width * sx;
        let height = shown.height * sy;
        let (x, y) = if about_center {
            (shown.x + (shown.width - width) / 2.0, shown.y + (shown.height - height) / 2.0)
        } else {
            (shown.x, shown.y)
        };
        self.bbox = editor_box_from_display(
            &NormalizedBox::new(x, y, width, height),
            self.rotation,
            &self.page,
        );
    }

    pub(crate) fn begin_editing(&mut self) {
        self.state = EditorState::Editing;
    }

    /// Freezes the content. Returns `false` when nothing is left, in which
    /// case the editor must be dropped instead of stored.
    pub(crate) fn finish_editing(&mut self) -> bool {
        match &mut self.kind {
            EditorKind::FreeText(data) => {
                data.commit_text();
                let (width, height) = data.estimated_size();
                self.bbox.width = width / self.page.width;
                self.bbox.height = height / self.page.height;
            }
            EditorKind::Ink(data) => {
                if let Some(shown) = data.finish_session() {
                    self.bbox = editor_box_from_display(&shown, self.rotation, &self.page);
                }
            }
            EditorKind::Highlight(data) => {
                if let Some(shown) = data.finish_drawing() {
                    self.bbox = editor_box_from_display(&shown, self.rotation, &self.page);
                }
            }
            EditorKind::Stamp(_) => {}
        }

        if self.is_empty() {
            return false;
        }
        self.state = EditorState::Committed;
        true
    }

    /// Current value of `param`.
    pub fn param_value(&self, param: EditorParamType) -> EditorResult<ParamValue> {
        self.check_param(param)?;
        let value = match (&self.kind, param) {
            (EditorKind::FreeText(data), EditorParamType::FreeTextSize) => {
                ParamValue::Number(data.font_size)
            }
            (EditorKind::FreeText(data), EditorParamType::FreeTextColor) => {
                ParamValue::Color(data.color)
            }
            (EditorKind::Ink(data), EditorParamType::InkColor) => ParamValue::Color(data.color),
            (EditorKind::Ink(data), EditorParamType::InkThickness) => {
                ParamValue::Number(data.thickness)
            }
            (EditorKind::Ink(data), EditorParamType::InkOpacity) => ParamValue::Number(data.opacity),
            (EditorKind::Highlight(data), EditorParamType::HighlightColor) => {
                ParamValue::Color(data.color)
            }
            (EditorKind::Highlight(data), EditorParamType::HighlightThickness) => {
                ParamValue::Number(data.thickness)
            }
            (EditorKind::Highlight(data), EditorParamType::HighlightOpacity) => {
                ParamValue::Number(data.opacity)
            }
            _ => return Err(self.mismatch(param)),
        };
        Ok(value)
    }

    /// Applies a parameter change and returns the previous value.
    pub(crate) fn update_param(
        &mut self,
        param: EditorParamType,
        value: ParamValue,
    ) -> EditorResult<ParamValue> {
        let previous = self.param_value(param)?;
        check_value(param, value)?;

        let rescale = match (&mut self.kind, param, value) {
            (EditorKind::FreeText(data), EditorParamType::FreeTextSize, ParamValue::Number(size)) => {
                let ratio = size / data.font_size;
                data.font_size = size;
                Some((ratio, ratio, false))
            }
            (EditorKind::FreeText(data), EditorParamType::FreeTextColor, ParamValue::Color(color)) => {
                data.color = color;
                None
            }
            (EditorKind::Ink(data), EditorParamType::InkColor, ParamValue::Color(color)) => {
                data.color = color;
                None
            }
            (EditorKind::Ink(data), EditorParamType::InkThickness, ParamValue::Number(thickness)) => {
                data.thickness = thickness;
                None
            }
            (EditorKind::Ink(data), EditorParamType::InkOpacity, ParamValue::Number(opacity)) => {
                data.opacity = opacity.clamp(0.0, 1.0);
                None
            }
            (EditorKind::Highlight(data), EditorParamType::HighlightColor, ParamValue::Color(color)) => {
                data.color = color;
                None
            }
            (
                EditorKind::Highlight(data),
                EditorParamType::HighlightThickness,
                ParamValue::Number(thickness),
            ) => data.set_thickness(thickness).map(|(sx, sy)| (sx, sy, true)),
            (EditorKind::Highlight(data), EditorParamType::HighlightOpacity, ParamValue::Number(opacity)) => {
                data.opacity = opacity.clamp(0.0, 1.0);
                None
            }
            _ => return Err(EditorError::InvalidParamValue(param)),
        };

        if let Some((sx, sy, about_center)) = rescale {
            if sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0 {
                self.scale_box(sx, sy, about_center);
            }
        }
        Ok(previous)
    }

    fn check_param(&self, param: EditorParamType) -> EditorResult<()> {
        if param.editor_type() == self.editor_type() {
            Ok(())
        } else {
            Err(self.mismatch(param))
        }
    }

    fn mismatch(&self, param: EditorParamType) -> EditorError {
        EditorError::ParamMismatch { param, editor: self.editor_type().name() }
    }

    /// Record for the save pipeline or, with `is_for_copying`, the clipboard.
    ///
    /// Returns `None` for an empty editor, and outside copy mode for a loaded
    /// annotation whose content did not change.
    pub fn serialize(&self, is_for_copying: bool) -> Option<EditorRecord> {
        if self.is_empty() {
            return None;
        }

        let rect = self.rect();
        let mut record = EditorRecord::new(
            self.editor_type(),
            rect,
            self.rotation.degrees(),
            self.page_index,
        );
        match &self.kind {
            EditorKind::FreeText(data) => data.write_record(&mut record),
            EditorKind::Ink(data) => data.write_record(&mut record, &rect, self.rotation),
            EditorKind::Highlight(data) => data.write_record(&mut record, &rect, self.rotation),
            EditorKind::Stamp(data) => {
                if !data.write_record(&mut record, is_for_copying) {
                    return None;
                }
            }
        }

        if is_for_copying {
            return Some(record);
        }

        record.id = self.annotation_element_id.clone();
        if let Some(initial) = &self.initial {
            if records_match(initial, &record) {
                return None;
            }
        }
        Some(record)
    }

    /// Builds an editor from a record, sized against `page`.
    pub fn deserialize(
        record: &EditorRecord,
        id: EditorId,
        page: PageDimensions,
        defaults: &EditorDefaults,
        bitmaps: &mut BitmapCache,
    ) -> EditorResult<Editor> {
        record.validate()?;
        let rotation = Rotation::from_degrees(i32::from(record.rotation))?;
        let rect = record.rect;

        let kind = match record.annotation_type {
            AnnotationEditorType::FreeText => {
                EditorKind::FreeText(FreeTextData::from_record(record, defaults))
            }
            AnnotationEditorType::Ink => {
                EditorKind::Ink(InkData::from_record(record, &rect, rotation, defaults))
            }
            AnnotationEditorType::Highlight => {
                EditorKind::Highlight(HighlightData::from_record(record, &rect, rotation, defaults))
            }
            AnnotationEditorType::Stamp => EditorKind::Stamp(StampData::from_record(record, bitmaps)?),
            AnnotationEditorType::None => {
                return Err(ModelError::InvalidRecord("record without an editor type".to_owned()).into())
            }
        };

        let bbox = normalized_from_rect(rect, rotation, &page);
        Ok(Editor::new(id, record.page_index, page, rotation, bbox, kind))
    }
}

fn check_value(param: EditorParamType, value: ParamValue) -> EditorResult<()> {
    let valid = match param {
        EditorParamType::FreeTextColor | EditorParamType::InkColor | EditorParamType::HighlightColor => {
            value.as_color().is_some()
        }
        EditorParamType::FreeTextSize
        | EditorParamType::InkThickness
        | EditorParamType::HighlightThickness => {
            value.as_number().is_some_and(|number| number.is_finite() && number > 0.0)
        }
        EditorParamType::InkOpacity | EditorParamType::HighlightOpacity => {
            value.as_number().is_some_and(f64::is_finite)
        }
    };
    if valid {
        Ok(())
    } else {
        Err(EditorError::InvalidParamValue(param))
    }
}

/// Same content up to float noise, ignoring ids.
fn records_match(a: &EditorRecord, b: &EditorRecord) -> bool {
    let strip = |record: &EditorRecord| {
        let mut record = record.clone();
        record.id = None;
        serde_json::to_value(record).ok()
    };
    match (strip(a), strip(b)) {
        (Some(a), Some(b)) => values_close(&a, &b),
        _ => false,
    }
}

fn values_close(a: &Value, b: &Value) -> bool {
    const TOLERANCE: f64 = 1e-6;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= TOLERANCE,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_close(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, x)| y.get(key).is_some_and(|y| values_close(x, y)))
        }
        _ => a == b,
    }
}
