//! Coordinate transforms
//!
//! Three spaces are in play:
//! - page-normalized: fractions of the unrotated page box, origin top-left,
//!   independent of zoom and rotation. Editors store their position here.
//! - screen: pixels of the displayed layer, after rotation and zoom, origin
//!   top-left.
//! - PDF: points in the unrotated page, origin bottom-left, shifted by the
//!   page origin.
//!
//! [`rect_from_normalized`] and [`rect_in_current_coords`] are exact inverses
//! for every rotation.

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// `[x1, y1, x2, y2]` in PDF units.
pub type PdfRect = [f64; 4];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned box in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn approx_eq(&self, other: &NormalizedBox, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// Clockwise page rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90, negative values included.
    pub fn from_degrees(degrees: i32) -> EditorResult<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(EditorError::InvalidRotation(degrees)),
        }
    }

    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    const fn quarter_turns(self) -> u8 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 1,
            Self::Deg180 => 2,
            Self::Deg270 => 3,
        }
    }

    const fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub const fn add(self, other: Rotation) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + other.quarter_turns())
    }

    pub const fn inverse(self) -> Self {
        Self::from_quarter_turns(4 - self.quarter_turns())
    }

    /// True when width and height trade places.
    pub const fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<i32> for Rotation {
    type Error = EditorError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
    }
}

/// Rotates a screen-space vector into page space.
pub fn screen_to_page_vector(rotation: Rotation, x: f64, y: f64) -> (f64, f64) {
    match rotation {
        Rotation::Deg0 => (x, y),
        Rotation::Deg90 => (y, -x),
        Rotation::Deg180 => (-x, -y),
        Rotation::Deg270 => (-y, x),
    }
}

/// Rotates a page-space vector into screen space.
pub fn page_to_screen_vector(rotation: Rotation, x: f64, y: f64) -> (f64, f64) {
    screen_to_page_vector(rotation.inverse(), x, y)
}

/// Maps a page-normalized point to its display-normalized position.
pub fn rotate_point(point: Point, rotation: Rotation) -> Point {
    let Point { x, y } = point;
    match rotation {
        Rotation::Deg0 => Point::new(x, y),
        Rotation::Deg90 => Point::new(1.0 - y, x),
        Rotation::Deg180 => Point::new(1.0 - x, 1.0 - y),
        Rotation::Deg270 => Point::new(y, 1.0 - x),
    }
}

/// Maps a page-normalized box to its display-normalized position.
///
/// Applying a quarter turn four times gives back the original box.
pub fn rotate_box(bbox: &NormalizedBox, rotation: Rotation) -> NormalizedBox {
    let NormalizedBox { x, y, width, height } = *bbox;
    match rotation {
        Rotation::Deg0 => NormalizedBox::new(x, y, width, height),
        Rotation::Deg90 => NormalizedBox::new(1.0 - y - height, x, height, width),
        Rotation::Deg180 => NormalizedBox::new(1.0 - x - width, 1.0 - y - height, width, height),
        Rotation::Deg270 => NormalizedBox::new(y, 1.0 - x - width, height, width),
    }
}

/// Unscaled page box in PDF units plus the page origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

impl PageDimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height, x: 0.0, y: 0.0 }
    }
}

/// Snapshot of how a page is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub page_width: f64,
    pub page_height: f64,
    #[serde(default)]
    pub page_x: f64,
    #[serde(default)]
    pub page_y: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Viewport {
    pub const fn new(page_width: f64, page_height: f64) -> Self {
        Self {
            rotation: Rotation::Deg0,
            scale: 1.0,
            page_width,
            page_height,
            page_x: 0.0,
            page_y: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.page_x = x;
        self.page_y = y;
        self
    }

    pub fn dimensions(&self) -> PageDimensions {
        PageDimensions {
            width: self.page_width,
            height: self.page_height,
            x: self.page_x,
            y: self.page_y,
        }
    }

    /// Displayed layer size in pixels.
    pub fn display_size(&self) -> (f64, f64) {
        let (w, h) = (self.page_width * self.scale, self.page_height * self.scale);
        if self.rotation.is_transposed() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Layer pixel to page-normalized point.
    pub fn screen_to_page(&self, point: Point) -> Point {
        let (width, height) = self.display_size();
        let display = Point::new(point.x / width, point.y / height);
        rotate_point(display, self.rotation.inverse())
    }

    /// Page-normalized point to layer pixel.
    pub fn page_to_screen(&self, point: Point) -> Point {
        let (width, height) = self.display_size();
        let display = rotate_point(point, self.rotation);
        Point::new(display.x * width, display.y * height)
    }

    /// Screen-space pixel delta to a page-normalized delta.
    pub fn screen_delta_to_page(&self, dx: f64, dy: f64) -> (f64, f64) {
        let (px, py) = screen_to_page_vector(self.rotation, dx, dy);
        (px / (self.page_width * self.scale), py / (self.page_height * self.scale))
    }

    /// Display-normalized box to a page-normalized region.
    pub fn display_box_to_page(&self, bbox: &NormalizedBox) -> NormalizedBox {
        rotate_box(bbox, self.rotation.inverse())
    }

    /// Page-normalized region to a display-normalized box.
    pub fn page_box_to_display(&self, region: &NormalizedBox) -> NormalizedBox {
        rotate_box(region, self.rotation)
    }
}

/// Absolute PDF rectangle of a box stored as normalized editor fields.
///
/// `(x, y)` is the editor's top-left corner in its own orientation, expressed
/// in the unrotated page; `width`/`height` are measured along the editor's own
/// axes. `shift` is an extra translation in page units, applied in the
/// editor's frame.
pub fn rect_from_normalized(
    bbox: &NormalizedBox,
    rotation: Rotation,
    page: &PageDimensions,
    shift: (f64, f64),
) -> PdfRect {
    let (shift_x, shift_y) = shift;
    let page_height = page.height;
    let x = bbox.x * page.width;
    let y = bbox.y * page.height;
    let width = bbox.width * page.width;
    let height = bbox.height * page.height;

    match rotation {
        Rotation::Deg0 => [
            x + shift_x + page.x,
            page_height - y - shift_y - height + page.y,
            x + shift_x + width + page.x,
            page_height - y - shift_y + page.y,
        ],
        Rotation::Deg90 => [
            x + shift_y + page.x,
            page_height - y + shift_x + page.y,
            x + shift_y + height + page.x,
            page_height - y + shift_x + width + page.y,
        ],
        Rotation::Deg180 => [
            x - shift_x - width + page.x,
            page_height - y + shift_y + page.y,
            x - shift_x + page.x,
            page_height - y + shift_y + height + page.y,
        ],
        Rotation::Deg270 => [
            x - shift_y - height + page.x,
            page_height - y - shift_x - width + page.y,
            x - shift_y + page.x,
            page_height - y - shift_x + page.y,
        ],
    }
}

/// Inverse of [`rect_from_normalized`] for a rect relative to the page origin:
/// returns `[x, y, width, height]` in page units.
pub fn rect_in_current_coords(rect: PdfRect, rotation: Rotation, page_height: f64) -> [f64; 4] {
    let [x1, y1, x2, y2] = rect;
    let width = x2 - x1;
    let height = y2 - y1;

    match rotation {
        Rotation::Deg0 => [x1, page_height - y2, width, height],
        Rotation::Deg90 => [x1, page_height - y1, height, width],
        Rotation::Deg180 => [x2, page_height - y1, width, height],
        Rotation::Deg270 => [x2, page_height - y2, height, width],
    }
}

/// Normalized editor fields for an absolute PDF rectangle.
pub fn normalized_from_rect(
    rect: PdfRect,
    rotation: Rotation,
    page: &PageDimensions,
) -> NormalizedBox {
    let [x1, y1, x2, y2] = rect;
    let local = [x1 - page.x, y1 - page.y, x2 - page.x, y2 - page.y];
    let [x, y, width, height] = rect_in_current_coords(local, rotation, page.height);
    NormalizedBox::new(x / page.width, y / page.height, width / page.width, height / page.height)
}

/// Page-normalized region (unrotated, top-left origin) covered by a PDF rect.
pub fn page_region_from_rect(rect: PdfRect, page: &PageDimensions) -> NormalizedBox {
    let [x1, y1, x2, y2] = rect;
    NormalizedBox::new(
        (x1 - page.x) / page.width,
        (page.height - (y2 - page.y)) / page.height,
        (x2 - x1) / page.width,
        (y2 - y1) / page.height,
    )
}

/// PDF rect covering a page-normalized region.
pub fn rect_from_page_region(region: &NormalizedBox, page: &PageDimensions) -> PdfRect {
    [
        region.x * page.width + page.x,
        page.height - region.bottom() * page.height + page.y,
        region.right() * page.width + page.x,
        page.height - region.y * page.height + page.y,
    ]
}

/// Maps a point given relative to an editor's box, in the editor's own
/// orientation, into the editor's PDF rect.
pub fn map_to_rect(u: f64, v: f64, rect: &PdfRect, rotation: Rotation) -> (f64, f64) {
    let [bl_x, bl_y, tr_x, tr_y] = *rect;
    let width = tr_x - bl_x;
    let height = tr_y - bl_y;

    match rotation {
        Rotation::Deg0 => (bl_x + u * width, tr_y - v * height),
        Rotation::Deg90 => (bl_x + v * width, bl_y + u * height),
        Rotation::Deg180 => (tr_x - u * width, bl_y + v * height),
        Rotation::Deg270 => (tr_x - v * width, tr_y - u * height),
    }
}

/// Normalized editor fields for a box drawn in display-normalized space under
/// `rotation`.
pub fn editor_box_from_display(
    display: &NormalizedBox,
    rotation: Rotation,
    page: &PageDimensions,
) -> NormalizedBox {
    let region = rotate_box(display, rotation.inverse());
    let rect = rect_from_page_region(&region, page);
    normalized_from_rect(rect, rotation, page)
}

/// Display-normalized box of an editor shown under its own rotation.
pub fn display_box_from_editor(
    bbox: &NormalizedBox,
    rotation: Rotation,
    page: &PageDimensions,
) -> NormalizedBox {
    let rect = rect_from_normalized(bbox, rotation, page, (0.0, 0.0));
    rotate_box(&page_region_from_rect(rect, page), rotation)
}

/// Inverse of [`map_to_rect`]: box-relative `(u, v)` of a PDF point.
pub fn unmap_from_rect(x: f64, y: f64, rect: &PdfRect, rotation: Rotation) -> (f64, f64) {
    let [bl_x, bl_y, tr_x, tr_y] = *rect;
    let width = tr_x - bl_x;
    let height = tr_y - bl_y;
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }

    match rotation {
        Rotation::Deg0 => ((x - bl_x) / width, (tr_y - y) / height),
        Rotation::Deg90 => ((y - bl_y) / height, (x - bl_x) / width),
        Rotation::Deg180 => ((tr_x - x) / width, (y - bl_y) / height),
        Rotation::Deg270 => ((tr_y - y) / height, (tr_x - x) / width),
    }
}
