//! Wire types shared by the annotation editors, the storage bridge and the
//! clipboard.
//!
//! Everything here is plain data: the serialized editor record consumed by the
//! PDF-saving pipeline, the clipboard payload (a JSON array of those records)
//! and the numeric type codes used on the wire.

mod clipboard;
mod record;

use serde::{Deserialize, Serialize};

pub use clipboard::ClipboardPayload;
pub use record::{AccessibilityData, DeletedRecord, EditorRecord, InkPath};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown annotation editor type code {0}")]
    UnknownEditorType(u8),
    #[error("unknown editor parameter code {0}")]
    UnknownParamType(u16),
    #[error("invalid color `{0}`")]
    InvalidColor(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Editor kinds with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AnnotationEditorType {
    None,
    FreeText,
    Highlight,
    Stamp,
    Ink,
}

impl AnnotationEditorType {
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::FreeText => 3,
            Self::Highlight => 9,
            Self::Stamp => 13,
            Self::Ink => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FreeText => "freetext",
            Self::Highlight => "highlight",
            Self::Stamp => "stamp",
            Self::Ink => "ink",
        }
    }
}

impl From<AnnotationEditorType> for u8 {
    fn from(value: AnnotationEditorType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for AnnotationEditorType {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::None),
            3 => Ok(Self::FreeText),
            9 => Ok(Self::Highlight),
            13 => Ok(Self::Stamp),
            15 => Ok(Self::Ink),
            other => Err(ModelError::UnknownEditorType(other)),
        }
    }
}

/// Editable properties, with the codes used when they travel as messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum EditorParamType {
    FreeTextSize,
    FreeTextColor,
    InkColor,
    InkThickness,
    InkOpacity,
    HighlightColor,
    HighlightThickness,
    HighlightOpacity,
}

impl EditorParamType {
    pub const fn code(self) -> u16 {
        match self {
            Self::FreeTextSize => 11,
            Self::FreeTextColor => 12,
            Self::InkColor => 21,
            Self::InkThickness => 22,
            Self::InkOpacity => 23,
            Self::HighlightColor => 31,
            Self::HighlightThickness => 33,
            Self::HighlightOpacity => 36,
        }
    }

    /// Editor kind the parameter belongs to.
    pub fn editor_type(self) -> AnnotationEditorType {
        match self {
            Self::FreeTextSize | Self::FreeTextColor => AnnotationEditorType::FreeText,
            Self::InkColor | Self::InkThickness | Self::InkOpacity => AnnotationEditorType::Ink,
            Self::HighlightColor | Self::HighlightThickness | Self::HighlightOpacity => {
                AnnotationEditorType::Highlight
            }
        }
    }
}

impl From<EditorParamType> for u16 {
    fn from(value: EditorParamType) -> Self {
        value.code()
    }
}

impl TryFrom<u16> for EditorParamType {
    type Error = ModelError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            11 => Ok(Self::FreeTextSize),
            12 => Ok(Self::FreeTextColor),
            21 => Ok(Self::InkColor),
            22 => Ok(Self::InkThickness),
            23 => Ok(Self::InkOpacity),
            31 => Ok(Self::HighlightColor),
            33 => Ok(Self::HighlightThickness),
            36 => Ok(Self::HighlightOpacity),
            other => Err(ModelError::UnknownParamType(other)),
        }
    }
}

/// RGB triplet, 0-255 per channel. Serialized as a three element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const YELLOW: Rgb = Rgb([255, 255, 152]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> ModelResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ModelError::InvalidColor(hex.to_owned()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ModelError::InvalidColor(hex.to_owned()))
        };

        Ok(Self([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}
