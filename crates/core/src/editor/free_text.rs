use annotation_model::{EditorRecord, Rgb};

use crate::config::EditorDefaults;

/// Average glyph advance as a fraction of the font size.
const AVERAGE_CHAR_WIDTH: f64 = 0.55;
const LINE_HEIGHT: f64 = 1.35;
/// Inner padding on every side, in page units.
const PADDING: f64 = 2.0;

/// Text annotation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeTextData {
    pub text: String,
    /// Font size in points
    pub font_size: f64,
    pub color: Rgb,
}

impl FreeTextData {
    pub fn new(font_size: f64, color: Rgb) -> Self {
        Self { text: String::new(), font_size, color }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Box size in page units for the current text.
    ///
    /// Used when no measured size is available.
    pub fn estimated_size(&self) -> (f64, f64) {
        let lines: Vec<&str> = self.text.split('\n').collect();
        let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0).max(1);
        let width = longest as f64 * self.font_size * AVERAGE_CHAR_WIDTH + 2.0 * PADDING;
        let height = lines.len().max(1) as f64 * self.font_size * LINE_HEIGHT + 2.0 * PADDING;
        (width, height)
    }

    pub(crate) fn commit_text(&mut self) {
        let trimmed_len = self.text.trim_end().len();
        self.text.truncate(trimmed_len);
    }

    pub(super) fn write_record(&self, record: &mut EditorRecord) {
        record.color = Some(self.color);
        record.font_size = Some(self.font_size);
        record.value = Some(self.text.clone());
    }

    pub(super) fn from_record(record: &EditorRecord, defaults: &EditorDefaults) -> Self {
        Self {
            text: record.value.clone().unwrap_or_default(),
            font_size: record.font_size.unwrap_or(defaults.free_text_size),
            color: record.color.unwrap_or(defaults.free_text_color),
        }
    }
}
