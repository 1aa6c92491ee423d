//! Ink stroke smoothing
//!
//! Raw samples become a chain of quadratic curves through the midpoints of
//! consecutive samples, each raised to the equivalent cubic. Bounding boxes
//! are exact: extremes come from the roots of each cubic's derivative.

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

/// A smoothed stroke: a start point followed by cubic segments.
#[derive(Debug, Clone, PartialEq)]
pub struct InkCurve {
    pub start: Point,
    pub segments: Vec<CubicSegment>,
}

impl InkCurve {
    /// `[min_x, min_y, max_x, max_y]` of the whole curve.
    pub fn bbox(&self) -> [f64; 4] {
        let mut bbox = [self.start.x, self.start.y, self.start.x, self.start.y];
        let mut from = self.start;
        for segment in &self.segments {
            let [x1, y1, x2, y2] = cubic_bbox(from, segment.control1, segment.control2, segment.end);
            bbox = [bbox[0].min(x1), bbox[1].min(y1), bbox[2].max(x2), bbox[3].max(y2)];
            from = segment.end;
        }
        bbox
    }

    /// Start point then `control1, control2, end` per segment, as a flat
    /// coordinate list mapped through `map`.
    pub fn flatten(&self, mut map: impl FnMut(Point) -> (f64, f64)) -> Vec<f64> {
        let mut flat = Vec::with_capacity(2 + self.segments.len() * 6);
        let mut push = |point: Point| {
            let (x, y) = map(point);
            flat.push(x);
            flat.push(y);
        };
        push(self.start);
        for segment in &self.segments {
            push(segment.control1);
            push(segment.control2);
            push(segment.end);
        }
        flat
    }
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

fn midpoint(a: Point, b: Point) -> Point {
    lerp(a, b, 0.5)
}

/// Smooths raw stroke samples. Returns `None` for an empty stroke.
pub fn fit_curve(points: &[Point]) -> Option<InkCurve> {
    let (&first, rest) = points.split_first()?;

    let Some(&last) = rest.last() else {
        return Some(InkCurve {
            start: first,
            segments: vec![CubicSegment { control1: first, control2: first, end: first }],
        });
    };

    let mut segments = Vec::with_capacity(points.len() - 1);
    let mut from = first;
    for pair in points[1..].windows(2) {
        let (control, next) = (pair[0], pair[1]);
        let to = midpoint(control, next);
        segments.push(CubicSegment {
            control1: lerp(from, control, 2.0 / 3.0),
            control2: lerp(to, control, 2.0 / 3.0),
            end: to,
        });
        from = to;
    }
    segments.push(CubicSegment { control1: from, control2: last, end: last });

    Some(InkCurve { start: first, segments })
}

/// Exact `[min_x, min_y, max_x, max_y]` of a cubic bezier.
pub fn cubic_bbox(p0: Point, p1: Point, p2: Point, p3: Point) -> [f64; 4] {
    let (min_x, max_x) = axis_extent(p0.x, p1.x, p2.x, p3.x);
    let (min_y, max_y) = axis_extent(p0.y, p1.y, p2.y, p3.y);
    [min_x, min_y, max_x, max_y]
}

fn axis_extent(p0: f64, p1: f64, p2: f64, p3: f64) -> (f64, f64) {
    let mut min = p0.min(p3);
    let mut max = p0.max(p3);

    // B'(t) / 3 = a t^2 + b t + c
    let a = -p0 + 3.0 * p1 - 3.0 * p2 + p3;
    let b = 2.0 * (p0 - 2.0 * p1 + p2);
    let c = p1 - p0;

    let mut consider = |t: f64| {
        if t > 0.0 && t < 1.0 {
            let mt = 1.0 - t;
            let value = mt * mt * mt * p0 + 3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t * p3;
            min = min.min(value);
            max = max.max(value);
        }
    };

    if a.abs() < 1e-12 {
        if b.abs() >= 1e-12 {
            consider(-c / b);
        }
    } else {
        let discriminant = b * b - 4.0 * a * c;
        if discriminant >= 0.0 {
            let root = discriminant.sqrt();
            consider((-b + root) / (2.0 * a));
            consider((-b - root) / (2.0 * a));
        }
    }

    (min, max)
}
