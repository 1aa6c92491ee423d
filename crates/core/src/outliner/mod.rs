//! Outline geometry for highlights and ink
//!
//! Outliners turn either a fixed set of boxes or a stream of pointer samples
//! into closed polygons. Polygons are stored relative to the outline's
//! bounding box so they follow the owning editor through moves and resizes.

mod bezier;
mod freehand;
mod highlight;

pub use bezier::{cubic_bbox, fit_curve, CubicSegment, InkCurve};
pub use freehand::{FreeOutliner, FOCUS_EXTRA_THICKNESS, MIN_POINT_DISTANCE};
pub use highlight::{HighlightOutliner, FOCUS_BORDER, FOCUS_INNER_MARGIN, HIGHLIGHT_BORDER};

use crate::geometry::{map_to_rect, rotate_box, NormalizedBox, PdfRect, Point, Rotation};

/// Closed polygon rings plus their bounding box.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outline {
    /// Rings in box-relative coordinates, each point in `[0, 1]^2`.
    pub polygons: Vec<Vec<Point>>,
    /// Bounding box in display-normalized coordinates.
    pub bbox: NormalizedBox,
    /// Box-relative anchor for the editor toolbar.
    pub last_point: Option<Point>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.polygons.iter().all(|ring| ring.is_empty())
    }

    /// Flat `[x0, y0, x1, y1, ...]` arrays per ring, in PDF units inside `rect`.
    pub fn serialize(&self, rect: &PdfRect, rotation: Rotation) -> Vec<Vec<f64>> {
        self.polygons
            .iter()
            .map(|ring| {
                ring.iter()
                    .flat_map(|point| {
                        let (x, y) = map_to_rect(point.x, point.y, rect, rotation);
                        [x, y]
                    })
                    .collect()
            })
            .collect()
    }

    /// Same rings expressed relative to `frame` instead of the own box.
    ///
    /// Points may fall outside `[0, 1]` when the outline is larger than
    /// `frame`.
    pub fn rebased_onto(&self, frame: &NormalizedBox) -> Outline {
        let rebase = |point: &Point| {
            Point::new(
                (self.bbox.x + point.x * self.bbox.width - frame.x) / frame.width,
                (self.bbox.y + point.y * self.bbox.height - frame.y) / frame.height,
            )
        };
        Outline {
            polygons: self.polygons.iter().map(|ring| ring.iter().map(rebase).collect()).collect(),
            bbox: *frame,
            last_point: self.last_point.as_ref().map(rebase),
        }
    }

    /// Bounding box after turning the view by `rotation`.
    pub fn rotated_bbox(&self, rotation: Rotation) -> NormalizedBox {
        rotate_box(&self.bbox, rotation)
    }
}

/// QuadPoints for `boxes`, all given relative to the editor box.
///
/// Each box yields its corners in the order top-left, top-right, bottom-left,
/// bottom-right.
pub fn serialize_quad_points(boxes: &[NormalizedBox], rect: &PdfRect, rotation: Rotation) -> Vec<f64> {
    let mut quad_points = Vec::with_capacity(boxes.len() * 8);
    for bbox in boxes {
        let (ax, ay) = map_to_rect(bbox.x, bbox.y, rect, rotation);
        let (bx, by) = map_to_rect(bbox.right(), bbox.bottom(), rect, rotation);
        let (x1, x2) = (ax.min(bx), ax.max(bx));
        let (y1, y2) = (ay.min(by), ay.max(by));
        quad_points.extend_from_slice(&[x1, y2, x2, y2, x1, y1, x2, y1]);
    }
    quad_points
}

/// Re-expresses absolute display-normalized boxes relative to `frame`.
pub fn boxes_relative_to(boxes: &[NormalizedBox], frame: &NormalizedBox) -> Vec<NormalizedBox> {
    boxes
        .iter()
        .map(|bbox| {
            NormalizedBox::new(
                (bbox.x - frame.x) / frame.width,
                (bbox.y - frame.y) / frame.height,
                bbox.width / frame.width,
                bbox.height / frame.height,
            )
        })
        .collect()
}
