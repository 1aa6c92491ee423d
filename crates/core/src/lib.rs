//! PDF Annotator Core Library
//!
//! Annotation authoring on top of a rendered PDF: editors for free text, ink,
//! highlights and image stamps, the per-page layers that show them, undo and
//! redo, the clipboard and the storage mirror read by the save pipeline.

pub mod bitmap_cache;
pub mod command_manager;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod layer;
pub mod outliner;
pub mod ui_manager;

pub use bitmap_cache::{
    Bitmap, BitmapCache, BitmapCacheStats, BitmapKey, BitmapRequest, BitmapSource, DecodedBitmap,
};
pub use command_manager::{AddOptions, Command, CommandManager, DEFAULT_CAPACITY};
pub use config::{ConfigError, EditorConfig, EditorDefaults};
pub use editor::{Editor, EditorKind, EditorState, ParamValue};
pub use error::{EditorError, EditorResult};
pub use geometry::{NormalizedBox, PageDimensions, PdfRect, Point, Rotation, Viewport};
pub use ids::{EditorId, LayerId};
pub use layer::Layer;
pub use ui_manager::{
    ActionOutcome, CommandKind, EditingState, NoopHooks, NudgeDirection, RenderHooks, ResizeHandle,
    UiAction, UiManager, UiState,
};
