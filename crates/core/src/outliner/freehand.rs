//! Freehand highlight ribbon
//!
//! Pointer samples are kept in layer pixels. The outline is a ribbon of
//! constant half-width around the sampled polyline with round caps, rebuilt
//! on demand so a different stroke width never needs the samples replayed.

use std::f64::consts::PI;

use super::Outline;
use crate::geometry::{NormalizedBox, Point};

/// Samples closer than this to the previous one, in pixels, are dropped.
pub const MIN_POINT_DISTANCE: f64 = 8.0;
/// Extra width of the focus ring over the fill ribbon, in pixels.
pub const FOCUS_EXTRA_THICKNESS: f64 = 5.0;

const CAP_STEPS: usize = 8;
const DOT_STEPS: usize = 16;

#[derive(Debug, Clone)]
pub struct FreeOutliner {
    points: Vec<Point>,
    layer_width: f64,
    layer_height: f64,
    thickness: f64,
    inner_margin: f64,
}

impl FreeOutliner {
    /// `layer_size` is the displayed layer size in pixels, `thickness` and
    /// `inner_margin` are in pixels too.
    pub fn new(start: Point, layer_size: (f64, f64), thickness: f64, inner_margin: f64) -> Self {
        Self {
            points: vec![start],
            layer_width: layer_size.0,
            layer_height: layer_size.1,
            thickness,
            inner_margin,
        }
    }

    /// Adds a pointer sample. Returns `false` when the sample would not change
    /// the outline.
    pub fn add(&mut self, point: Point) -> bool {
        if let Some(last) = self.points.last() {
            if last.distance_to(&point) < MIN_POINT_DISTANCE {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn outline(&self) -> Outline {
        self.new_outline(self.thickness, self.inner_margin)
    }

    pub fn focus_outline(&self) -> Outline {
        self.new_outline(self.thickness + FOCUS_EXTRA_THICKNESS, self.inner_margin)
    }

    /// Rebuilds the outline at another width from the samples collected so far.
    pub fn new_outline(&self, thickness: f64, inner_margin: f64) -> Outline {
        let ring = ribbon(&self.points, thickness / 2.0);
        if ring.is_empty() || self.layer_width <= 0.0 || self.layer_height <= 0.0 {
            return Outline::default();
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in &ring {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        min_x -= inner_margin;
        min_y -= inner_margin;
        let width = (max_x + inner_margin - min_x).max(f64::EPSILON);
        let height = (max_y + inner_margin - min_y).max(f64::EPSILON);

        let relative = |point: &Point| Point::new((point.x - min_x) / width, (point.y - min_y) / height);
        let polygon = ring.iter().map(relative).collect();
        let last_point = self.points.last().map(relative);

        Outline {
            polygons: vec![polygon],
            bbox: NormalizedBox::new(
                min_x / self.layer_width,
                min_y / self.layer_height,
                width / self.layer_width,
                height / self.layer_height,
            ),
            last_point,
        }
    }
}

fn ribbon(points: &[Point], half: f64) -> Vec<Point> {
    let mut samples: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if samples.last().map_or(true, |last| last.distance_to(point) > f64::EPSILON) {
            samples.push(*point);
        }
    }

    match samples.as_slice() {
        [] => Vec::new(),
        [dot] => (0..DOT_STEPS)
            .map(|step| {
                let angle = 2.0 * PI * step as f64 / DOT_STEPS as f64;
                Point::new(dot.x + half * angle.cos(), dot.y + half * angle.sin())
            })
            .collect(),
        _ => stroke(&samples, half),
    }
}

fn stroke(samples: &[Point], half: f64) -> Vec<Point> {
    let segment_normals: Vec<(f64, f64)> = samples
        .windows(2)
        .map(|pair| {
            let (dx, dy) = (pair[1].x - pair[0].x, pair[1].y - pair[0].y);
            let length = dx.hypot(dy);
            (-dy / length, dx / length)
        })
        .collect();

    let last = samples.len() - 1;
    let vertex_normals: Vec<(f64, f64)> = (0..samples.len())
        .map(|index| {
            if index == 0 {
                return segment_normals[0];
            }
            if index == last {
                return segment_normals[last - 1];
            }
            let (ax, ay) = segment_normals[index - 1];
            let (bx, by) = segment_normals[index];
            let (sx, sy) = (ax + bx, ay + by);
            let length = sx.hypot(sy);
            if length < 1e-9 {
                (bx, by)
            } else {
                (sx / length, sy / length)
            }
        })
        .collect();

    let mut ring = Vec::with_capacity(2 * samples.len() + 2 * CAP_STEPS);
    for (point, (nx, ny)) in samples.iter().zip(&vertex_normals) {
        ring.push(Point::new(point.x + half * nx, point.y + half * ny));
    }
    push_cap(&mut ring, samples[last], vertex_normals[last], half);
    for (point, (nx, ny)) in samples.iter().zip(&vertex_normals).rev() {
        ring.push(Point::new(point.x - half * nx, point.y - half * ny));
    }
    let (nx, ny) = vertex_normals[0];
    push_cap(&mut ring, samples[0], (-nx, -ny), half);
    ring
}

/// Half circle from `center + half * normal` to `center - half * normal`,
/// endpoints excluded.
fn push_cap(ring: &mut Vec<Point>, center: Point, normal: (f64, f64), half: f64) {
    let start = normal.1.atan2(normal.0);
    for step in 1..CAP_STEPS {
        let angle = start - PI * step as f64 / CAP_STEPS as f64;
        ring.push(Point::new(center.x + half * angle.cos(), center.y + half * angle.sin()));
    }
}
