use serde::{Deserialize, Serialize};

use crate::{AnnotationEditorType, ModelError, ModelResult, Rgb};

/// One bezier path of an ink annotation, in PDF units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkPath {
    /// Start point followed by `(control1, control2, end)` triples.
    pub bezier: Vec<f64>,
    /// The raw stroke points.
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityData {
    #[serde(rename = "type")]
    pub kind: String,
    pub alt: String,
}

impl AccessibilityData {
    pub fn figure(alt: impl Into<String>) -> Self {
        Self { kind: "Figure".to_owned(), alt: alt.into() }
    }
}

/// Serialized editor record read by the save pipeline and the clipboard.
///
/// The common fields are always present. The variant payload lives in the
/// optional fields and only the ones that apply to `annotation_type` are
/// emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorRecord {
    pub annotation_type: AnnotationEditorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    /// `[x1, y1, x2, y2]` in PDF units.
    pub rect: [f64; 4],
    pub rotation: u16,
    pub page_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    // FreeText
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    // Ink and free highlights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<InkPath>>,

    // Highlight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quad_points: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlines: Option<Vec<Vec<f64>>>,

    // Stamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitmap_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitmap_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_data: Option<AccessibilityData>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl EditorRecord {
    /// Record with the common fields set and an empty payload.
    pub fn new(
        annotation_type: AnnotationEditorType,
        rect: [f64; 4],
        rotation: u16,
        page_index: usize,
    ) -> Self {
        Self {
            annotation_type,
            color: None,
            rect,
            rotation,
            page_index,
            id: None,
            deleted: false,
            font_size: None,
            value: None,
            thickness: None,
            opacity: None,
            paths: None,
            quad_points: None,
            outlines: None,
            bitmap_id: None,
            bitmap_url: None,
            accessibility_data: None,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Checks the invariants a deserializer relies on.
    pub fn validate(&self) -> ModelResult<()> {
        let [x1, y1, x2, y2] = self.rect;
        if !self.rect.iter().all(|v| v.is_finite()) || x1 > x2 || y1 > y2 {
            return Err(ModelError::InvalidRecord(format!("bad rect {:?}", self.rect)));
        }

        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(ModelError::InvalidRecord(format!("bad rotation {}", self.rotation)));
        }

        let missing = |field: &str| {
            Err(ModelError::InvalidRecord(format!(
                "{} record without `{field}`",
                self.annotation_type.name()
            )))
        };

        match self.annotation_type {
            AnnotationEditorType::None => {
                Err(ModelError::InvalidRecord("record without an editor type".to_owned()))
            }
            AnnotationEditorType::FreeText if self.value.is_none() => missing("value"),
            AnnotationEditorType::Ink if self.paths.is_none() => missing("paths"),
            AnnotationEditorType::Highlight if self.outlines.is_none() => missing("outlines"),
            AnnotationEditorType::Stamp
                if self.bitmap_id.is_none() && self.bitmap_url.is_none() =>
            {
                missing("bitmapId")
            }
            _ => Ok(()),
        }
    }
}

/// Marker written for a pre-existing annotation the user deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecord {
    pub id: String,
    pub deleted: bool,
    pub page_index: usize,
}

impl DeletedRecord {
    pub fn new(id: impl Into<String>, page_index: usize) -> Self {
        Self { id: id.into(), deleted: true, page_index }
    }
}
