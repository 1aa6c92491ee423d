use annotation_model::{EditorRecord, InkPath, Rgb};

use crate::config::EditorDefaults;
use crate::geometry::{map_to_rect, unmap_from_rect, NormalizedBox, PdfRect, Point, Rotation, Viewport};
use crate::outliner::fit_curve;

/// Strokes being drawn, in layer pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct InkSession {
    strokes: Vec<Vec<Point>>,
    drawing: bool,
    layer_size: (f64, f64),
    scale: f64,
}

impl InkSession {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            strokes: Vec::new(),
            drawing: false,
            layer_size: viewport.display_size(),
            scale: viewport.scale,
        }
    }

    pub fn start_stroke(&mut self, at: Point) {
        self.strokes.push(vec![at]);
        self.drawing = true;
    }

    /// Returns `false` when no stroke is in progress or the sample repeats
    /// the previous one.
    pub fn add_point(&mut self, at: Point) -> bool {
        if !self.drawing {
            return false;
        }
        match self.strokes.last_mut() {
            Some(stroke) if stroke.last() != Some(&at) => {
                stroke.push(at);
                true
            }
            _ => false,
        }
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Vec::is_empty)
    }
}

/// Ink annotation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InkData {
    /// Raw stroke points relative to the editor box.
    pub paths: Vec<Vec<Point>>,
    pub color: Rgb,
    /// Stroke width in points
    pub thickness: f64,
    pub opacity: f64,
    pub(crate) session: Option<InkSession>,
}

impl InkData {
    pub fn new(color: Rgb, thickness: f64, opacity: f64) -> Self {
        Self { paths: Vec::new(), color, thickness, opacity, session: None }
    }

    pub fn drawing(viewport: &Viewport, color: Rgb, thickness: f64, opacity: f64) -> Self {
        Self { session: Some(InkSession::new(viewport)), ..Self::new(color, thickness, opacity) }
    }

    pub fn session(&self) -> Option<&InkSession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut InkSession> {
        self.session.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.iter().all(Vec::is_empty) && self.session.as_ref().map_or(true, InkSession::is_empty)
    }

    /// Turns the drawn strokes into box-relative paths.
    ///
    /// Returns the display-normalized box enclosing the smoothed strokes plus
    /// half the stroke width, or `None` when nothing was drawn.
    pub(crate) fn finish_session(&mut self) -> Option<NormalizedBox> {
        let session = self.session.take()?;
        let strokes: Vec<&Vec<Point>> = session.strokes.iter().filter(|stroke| !stroke.is_empty()).collect();

        let mut bounds: Option<[f64; 4]> = None;
        for stroke in &strokes {
            if let Some(curve) = fit_curve(stroke) {
                let [x1, y1, x2, y2] = curve.bbox();
                bounds = Some(match bounds {
                    Some([a, b, c, d]) => [a.min(x1), b.min(y1), c.max(x2), d.max(y2)],
                    None => [x1, y1, x2, y2],
                });
            }
        }
        let [x1, y1, x2, y2] = bounds?;

        let pad = self.thickness * session.scale / 2.0;
        let min_x = x1 - pad;
        let min_y = y1 - pad;
        let width = (x2 - x1 + 2.0 * pad).max(f64::EPSILON);
        let height = (y2 - y1 + 2.0 * pad).max(f64::EPSILON);

        self.paths = strokes
            .iter()
            .map(|stroke| {
                stroke
                    .iter()
                    .map(|point| Point::new((point.x - min_x) / width, (point.y - min_y) / height))
                    .collect()
            })
            .collect();

        let (layer_width, layer_height) = session.layer_size;
        Some(NormalizedBox::new(
            min_x / layer_width,
            min_y / layer_height,
            width / layer_width,
            height / layer_height,
        ))
    }

    pub(super) fn write_record(&self, record: &mut EditorRecord, rect: &PdfRect, rotation: Rotation) {
        let to_pdf = |point: Point| map_to_rect(point.x, point.y, rect, rotation);
        let paths = self
            .paths
            .iter()
            .filter_map(|path| {
                let curve = fit_curve(path)?;
                let points = path
                    .iter()
                    .flat_map(|point| {
                        let (x, y) = to_pdf(*point);
                        [x, y]
                    })
                    .collect();
                Some(InkPath { bezier: curve.flatten(to_pdf), points })
            })
            .collect();

        record.color = Some(self.color);
        record.thickness = Some(self.thickness);
        record.opacity = Some(self.opacity);
        record.paths = Some(paths);
    }

    pub(super) fn from_record(
        record: &EditorRecord,
        rect: &PdfRect,
        rotation: Rotation,
        defaults: &EditorDefaults,
    ) -> Self {
        let paths = record
            .paths
            .iter()
            .flatten()
            .map(|path| {
                path.points
                    .chunks_exact(2)
                    .map(|pair| {
                        let (u, v) = unmap_from_rect(pair[0], pair[1], rect, rotation);
                        Point::new(u, v)
                    })
                    .collect()
            })
            .collect();

        Self {
            paths,
            color: record.color.unwrap_or(defaults.ink_color),
            thickness: record.thickness.unwrap_or(defaults.ink_thickness),
            opacity: record.opacity.unwrap_or(defaults.ink_opacity),
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn session_ignores_moves_without_a_stroke() {
        let mut session = InkSession::new(&Viewport::new(100.0, 100.0));
        assert!(!session.add_point(Point::new(1.0, 1.0)));

        session.start_stroke(Point::new(1.0, 1.0));
        assert!(!session.add_point(Point::new(1.0, 1.0)));
        assert!(session.add_point(Point::new(5.0, 1.0)));
        session.end_stroke();
        assert!(!session.add_point(Point::new(9.0, 1.0)));
        assert_eq!(session.strokes(), &[vec![Point::new(1.0, 1.0), Point::new(5.0, 1.0)]]);
    }

    #[test]
    fn finish_session_pads_by_half_the_thickness() {
        let viewport = Viewport::new(200.0, 100.0).with_scale(2.0);
        let mut data = InkData::drawing(&viewport, Rgb::BLACK, 4.0, 1.0);
        let session = data.session_mut().expect("session");
        session.start_stroke(Point::new(100.0, 50.0));
        session.add_point(Point::new(200.0, 50.0));
        session.end_stroke();

        let shown = data.finish_session().expect("box");
        // Pad is 4 * 2 / 2 = 4 px on a 400 x 200 layer.
        assert_close(shown.x, 96.0 / 400.0);
        assert_close(shown.y, 46.0 / 200.0);
        assert_close(shown.width, 108.0 / 400.0);
        assert_close(shown.height, 8.0 / 200.0);

        assert!(data.session().is_none());
        assert_eq!(data.paths.len(), 1);
        assert_close(data.paths[0][0].x, 4.0 / 108.0);
        assert_close(data.paths[0][0].y, 0.5);
    }

    #[test]
    fn nothing_drawn_means_empty() {
        let mut data = InkData::drawing(&Viewport::new(10.0, 10.0), Rgb::BLACK, 1.0, 1.0);
        assert!(data.is_empty());
        assert!(data.finish_session().is_none());
        assert!(data.is_empty());
    }

    #[test]
    fn paths_survive_a_record_round_trip() {
        let mut data = InkData::new(Rgb::new(0, 0, 255), 2.0, 0.5);
        data.paths = vec![vec![Point::new(0.1, 0.2), Point::new(0.5, 0.9), Point::new(0.8, 0.3)]];

        let rect = [100.0, 100.0, 300.0, 200.0];
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let mut record = EditorRecord::new(annotation_model::AnnotationEditorType::Ink, rect, rotation.degrees(), 0);
            data.write_record(&mut record, &rect, rotation);

            let paths = record.paths.as_ref().expect("paths");
            assert_eq!(paths[0].points.len(), 6);
            assert_eq!(paths[0].bezier.len(), 2 + 6 * 2);

            let back = InkData::from_record(&record, &rect, rotation, &EditorDefaults::default());
            for (a, b) in back.paths[0].iter().zip(&data.paths[0]) {
                assert_close(a.x, b.x);
                assert_close(a.y, b.y);
            }
            assert_eq!(back.opacity, 0.5);
        }
    }
}
