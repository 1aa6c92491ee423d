use annotation_model::{EditorRecord, Rgb};

use crate::config::EditorDefaults;
use crate::geometry::{unmap_from_rect, NormalizedBox, PdfRect, Point, Rotation, Viewport};
use crate::outliner::{
    boxes_relative_to, serialize_quad_points, FreeOutliner, HighlightOutliner, Outline,
    FOCUS_EXTRA_THICKNESS,
};

/// How a highlight was made.
#[derive(Debug, Clone)]
pub enum HighlightShape {
    /// Anchored to text selection rectangles, relative to the editor box.
    Quad { boxes: Vec<NormalizedBox> },
    /// Drawn freehand. The outliner is absent for highlights loaded from a
    /// record; those keep their outline but cannot be re-thickened.
    Free { outliner: Option<FreeOutliner>, scale: f64, drawing: bool },
}

/// Highlight annotation payload.
#[derive(Debug, Clone)]
pub struct HighlightData {
    pub shape: HighlightShape,
    pub outline: Outline,
    pub focus_outline: Outline,
    pub color: Rgb,
    pub thickness: f64,
    pub opacity: f64,
}

impl HighlightData {
    /// Highlight over selection rectangles given in display-normalized
    /// coordinates. Also returns the display box the outline covers.
    pub fn from_boxes(
        boxes: &[NormalizedBox],
        color: Rgb,
        thickness: f64,
        opacity: f64,
    ) -> Option<(Self, NormalizedBox)> {
        let outline = HighlightOutliner::fill(boxes).outline();
        if outline.is_empty() {
            return None;
        }
        let shown = outline.bbox;
        let focus_outline = HighlightOutliner::focus(boxes).outline().rebased_onto(&shown);

        let data = Self {
            shape: HighlightShape::Quad { boxes: boxes_relative_to(boxes, &shown) },
            outline,
            focus_outline,
            color,
            thickness,
            opacity,
        };
        Some((data, shown))
    }

    /// Starts a freehand highlight at `start`, in layer pixels.
    pub fn free(start: Point, viewport: &Viewport, color: Rgb, thickness: f64, opacity: f64) -> Self {
        let outliner = FreeOutliner::new(start, viewport.display_size(), thickness * viewport.scale, 0.0);
        let outline = outliner.outline();
        let focus_outline = outliner.focus_outline().rebased_onto(&outline.bbox);
        Self {
            shape: HighlightShape::Free { outliner: Some(outliner), scale: viewport.scale, drawing: true },
            outline,
            focus_outline,
            color,
            thickness,
            opacity,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.shape, HighlightShape::Free { .. })
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.shape, HighlightShape::Free { drawing: true, .. })
    }

    pub fn is_empty(&self) -> bool {
        self.outline.is_empty()
    }

    /// Grows a freehand highlight. Returns `false` when the sample was
    /// dropped or the highlight is not being drawn.
    pub(crate) fn add_free_point(&mut self, point: Point) -> bool {
        let HighlightShape::Free { outliner: Some(outliner), drawing: true, .. } = &mut self.shape else {
            return false;
        };
        if !outliner.add(point) {
            return false;
        }
        self.outline = outliner.outline();
        self.focus_outline = outliner.focus_outline().rebased_onto(&self.outline.bbox);
        true
    }

    /// Ends a freehand stroke and returns the display box it covers.
    pub(crate) fn finish_drawing(&mut self) -> Option<NormalizedBox> {
        match &mut self.shape {
            HighlightShape::Free { drawing, .. } if *drawing => {
                *drawing = false;
                (!self.outline.is_empty()).then_some(self.outline.bbox)
            }
            _ => None,
        }
    }

    /// Sets the stroke width. For a freehand highlight the outline is rebuilt
    /// and the returned factors say how much the box grew along each axis.
    pub(crate) fn set_thickness(&mut self, thickness: f64) -> Option<(f64, f64)> {
        self.thickness = thickness;
        let HighlightShape::Free { outliner: Some(outliner), scale, .. } = &self.shape else {
            return None;
        };

        let width = thickness * *scale;
        let outline = outliner.new_outline(width, 0.0);
        if outline.is_empty() || self.outline.bbox.width <= 0.0 || self.outline.bbox.height <= 0.0 {
            return None;
        }
        let factors = (
            outline.bbox.width / self.outline.bbox.width,
            outline.bbox.height / self.outline.bbox.height,
        );
        self.focus_outline =
            outliner.new_outline(width + FOCUS_EXTRA_THICKNESS, 0.0).rebased_onto(&outline.bbox);
        self.outline = outline;
        Some(factors)
    }

    pub(super) fn write_record(&self, record: &mut EditorRecord, rect: &PdfRect, rotation: Rotation) {
        record.color = Some(self.color);
        record.opacity = Some(self.opacity);
        record.outlines = Some(self.outline.serialize(rect, rotation));
        match &self.shape {
            HighlightShape::Quad { boxes } => {
                record.quad_points = Some(serialize_quad_points(boxes, rect, rotation));
            }
            HighlightShape::Free { .. } => {
                record.thickness = Some(self.thickness);
            }
        }
    }

    pub(super) fn from_record(
        record: &EditorRecord,
        rect: &PdfRect,
        rotation: Rotation,
        defaults: &EditorDefaults,
    ) -> Self {
        let unmap = |x: f64, y: f64| {
            let (u, v) = unmap_from_rect(x, y, rect, rotation);
            Point::new(u, v)
        };

        let polygons: Vec<Vec<Point>> = record
            .outlines
            .iter()
            .flatten()
            .map(|ring| ring.chunks_exact(2).map(|pair| unmap(pair[0], pair[1])).collect())
            .collect();
        let outline = Outline {
            polygons,
            bbox: NormalizedBox::new(0.0, 0.0, 1.0, 1.0),
            last_point: None,
        };

        let shape = match &record.quad_points {
            Some(quad_points) => HighlightShape::Quad {
                boxes: quad_points
                    .chunks_exact(8)
                    .map(|quad| {
                        let a = unmap(quad[0], quad[1]);
                        let b = unmap(quad[6], quad[7]);
                        let (x1, x2) = (a.x.min(b.x), a.x.max(b.x));
                        let (y1, y2) = (a.y.min(b.y), a.y.max(b.y));
                        NormalizedBox::new(x1, y1, x2 - x1, y2 - y1)
                    })
                    .collect(),
            },
            None => HighlightShape::Free { outliner: None, scale: 1.0, drawing: false },
        };

        Self {
            shape,
            // The focus ring of a loaded highlight hugs the fill.
            focus_outline: outline.clone(),
            outline,
            color: record.color.unwrap_or(defaults.highlight_color),
            thickness: record.thickness.unwrap_or(defaults.highlight_thickness),
            opacity: record.opacity.unwrap_or(defaults.highlight_opacity),
        }
    }
}
