use std::sync::Arc;

use annotation_model::{AccessibilityData, EditorRecord};

use crate::bitmap_cache::{Bitmap, BitmapCache, BitmapSource};
use crate::error::{EditorError, EditorResult};
use crate::geometry::NormalizedBox;

/// Largest share of the layer a freshly loaded stamp may cover, per axis.
pub const MAX_STAMP_RATIO: f64 = 0.75;

const DECORATIVE_KIND: &str = "Artifact";

/// Image stamp payload.
#[derive(Debug, Clone, Default)]
pub struct StampData {
    pub bitmap: Option<Arc<Bitmap>>,
    /// Image still being loaded by the host.
    pub pending: Option<BitmapSource>,
    /// Remote image the stamp was loaded from, kept for re-serialization.
    pub bitmap_url: Option<String>,
    pub alt_text: Option<String>,
    pub decorative: bool,
}

impl StampData {
    pub fn pending(source: BitmapSource) -> Self {
        let bitmap_url = match &source {
            BitmapSource::Url { url } if !url.starts_with("data:") => Some(url.clone()),
            _ => None,
        };
        Self { pending: Some(source), bitmap_url, ..Self::default() }
    }

    pub fn with_bitmap(bitmap: Arc<Bitmap>) -> Self {
        Self { bitmap: Some(bitmap), ..Self::default() }
    }

    pub fn is_loaded(&self) -> bool {
        self.bitmap.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.is_none() && self.pending.is_none() && self.bitmap_url.is_none()
    }

    pub(crate) fn set_bitmap(&mut self, bitmap: Arc<Bitmap>) {
        self.bitmap = Some(bitmap);
        self.pending = None;
    }

    /// Box for an image of `image_size` pixels on a layer of `layer_size`
    /// pixels, centered on `center` (display-normalized). The image keeps its
    /// aspect ratio and is shrunk to fit [`MAX_STAMP_RATIO`] of the layer.
    pub fn fitted_box(image_size: (u32, u32), layer_size: (f64, f64), center: (f64, f64)) -> NormalizedBox {
        let (layer_width, layer_height) = layer_size;
        let mut width = f64::from(image_size.0.max(1));
        let mut height = f64::from(image_size.1.max(1));

        let max_width = layer_width * MAX_STAMP_RATIO;
        let max_height = layer_height * MAX_STAMP_RATIO;
        if width > max_width || height > max_height {
            let factor = (max_width / width).min(max_height / height);
            width *= factor;
            height *= factor;
        }

        let width = width / layer_width;
        let height = height / layer_height;
        NormalizedBox::new(center.0 - width / 2.0, center.1 - height / 2.0, width, height)
    }

    /// Returns `false` when there is nothing to write yet.
    pub(super) fn write_record(&self, record: &mut EditorRecord, is_for_copying: bool) -> bool {
        match (&self.bitmap, &self.bitmap_url) {
            (Some(bitmap), _) if is_for_copying => record.bitmap_url = Some(bitmap.to_data_url()),
            (Some(bitmap), _) => record.bitmap_id = Some(bitmap.id.clone()),
            (None, Some(url)) => record.bitmap_url = Some(url.clone()),
            (None, None) => return false,
        }

        record.accessibility_data = if self.decorative {
            Some(AccessibilityData { kind: DECORATIVE_KIND.to_owned(), alt: String::new() })
        } else {
            self.alt_text
                .as_deref()
                .filter(|alt| !alt.trim().is_empty())
                .map(AccessibilityData::figure)
        };
        true
    }

    pub(super) fn from_record(record: &EditorRecord, bitmaps: &mut BitmapCache) -> EditorResult<Self> {
        let mut data = match (&record.bitmap_id, &record.bitmap_url) {
            (Some(id), _) => {
                let bitmap = bitmaps
                    .get(id)
                    .ok_or_else(|| EditorError::Bitmap(format!("unknown bitmap `{id}`")))?;
                Self::with_bitmap(bitmap)
            }
            (None, Some(url)) if url.starts_with("data:") => Self::with_bitmap(bitmaps.import_data_url(url)?),
            (None, Some(url)) => Self::pending(BitmapSource::Url { url: url.clone() }),
            (None, None) => return Err(EditorError::Bitmap("stamp record without an image".to_owned())),
        };

        if let Some(accessibility) = &record.accessibility_data {
            data.decorative = accessibility.kind == DECORATIVE_KIND;
            if !data.decorative && !accessibility.alt.is_empty() {
                data.alt_text = Some(accessibility.alt.clone());
            }
        }
        Ok(data)
    }
}
