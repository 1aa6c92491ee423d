//! Union outline of text-selection boxes
//!
//! Boxes are snapped onto a 1e-4 grid, then a sweep over their vertical edges
//! keeps only the parts that lie on the union's boundary. Those pieces are
//! linked through the horizontal edges they share endpoints with, which gives
//! closed rectilinear rings.

use super::Outline;
use crate::geometry::{NormalizedBox, Point};

const GRID: f64 = 10_000.0;

/// Border added around each box of a fill outline.
pub const HIGHLIGHT_BORDER: f64 = 0.001;
/// Border added around each box of a focus outline.
pub const FOCUS_BORDER: f64 = 0.0025;
/// Extra margin between a focus outline and its bounding box.
pub const FOCUS_INNER_MARGIN: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VerticalEdge {
    x: i64,
    y1: i64,
    y2: i64,
    left: bool,
}

/// Outliner for a fixed list of display-normalized boxes.
#[derive(Debug, Clone)]
pub struct HighlightOutliner {
    edges: Vec<VerticalEdge>,
    bbox: NormalizedBox,
    last_point: Option<(i64, i64)>,
}

impl HighlightOutliner {
    pub fn new(boxes: &[NormalizedBox], border_width: f64, inner_margin: f64) -> Self {
        let mut edges = Vec::with_capacity(boxes.len() * 2);
        let (mut min_x, mut min_y) = (i64::MAX, i64::MAX);
        let (mut max_x, mut max_y) = (i64::MIN, i64::MIN);
        let mut last_point = None;

        for bbox in boxes {
            let x1 = ((bbox.x - border_width) * GRID).floor() as i64;
            let x2 = ((bbox.right() + border_width) * GRID).ceil() as i64;
            let y1 = ((bbox.y - border_width) * GRID).floor() as i64;
            let y2 = ((bbox.bottom() + border_width) * GRID).ceil() as i64;
            if x1 >= x2 || y1 >= y2 {
                continue;
            }

            edges.push(VerticalEdge { x: x1, y1, y2, left: true });
            edges.push(VerticalEdge { x: x2, y1, y2, left: false });
            min_x = min_x.min(x1);
            min_y = min_y.min(y1);
            max_x = max_x.max(x2);
            max_y = max_y.max(y2);
            last_point = Some((x2, y1));
        }

        let bbox = if edges.is_empty() {
            NormalizedBox::default()
        } else {
            NormalizedBox::new(
                min_x as f64 / GRID - inner_margin,
                min_y as f64 / GRID - inner_margin,
                (max_x - min_x) as f64 / GRID + 2.0 * inner_margin,
                (max_y - min_y) as f64 / GRID + 2.0 * inner_margin,
            )
        };

        Self { edges, bbox, last_point }
    }

    /// Outline used to fill a highlight.
    pub fn fill(boxes: &[NormalizedBox]) -> Self {
        Self::new(boxes, HIGHLIGHT_BORDER, 0.0)
    }

    /// Wider outline drawn when the highlight has focus.
    pub fn focus(boxes: &[NormalizedBox]) -> Self {
        Self::new(boxes, FOCUS_BORDER, FOCUS_INNER_MARGIN)
    }

    pub fn bbox(&self) -> NormalizedBox {
        self.bbox
    }

    pub fn outline(&self) -> Outline {
        if self.edges.is_empty() {
            return Outline::default();
        }

        let segments = merge_collinear(self.boundary_segments());
        let polygons = link_rings(&segments)
            .into_iter()
            .map(|ring| ring.into_iter().map(|(x, y)| self.relative(x, y)).collect())
            .collect();

        Outline {
            polygons,
            bbox: self.bbox,
            last_point: self.last_point.map(|(x, y)| self.relative(x, y)),
        }
    }

    fn relative(&self, x: i64, y: i64) -> Point {
        Point::new(
            (x as f64 / GRID - self.bbox.x) / self.bbox.width,
            (y as f64 / GRID - self.bbox.y) / self.bbox.height,
        )
    }

    /// Sweeps left to right and keeps the uncovered part of every edge.
    ///
    /// A left edge is tested before its interval joins the active set and a
    /// right edge after its interval leaves it. Left edges go first at equal
    /// x so that touching boxes merge.
    fn boundary_segments(&self) -> Vec<VerticalEdge> {
        let mut sorted = self.edges.clone();
        sorted.sort_by_key(|edge| (edge.x, u8::from(!edge.left), edge.y1, edge.y2));

        let mut active: Vec<(i64, i64)> = Vec::new();
        let mut segments = Vec::new();
        for edge in sorted {
            if edge.left {
                push_uncovered(&mut segments, &edge, &active);
                active.push((edge.y1, edge.y2));
            } else {
                if let Some(index) = active.iter().position(|span| *span == (edge.y1, edge.y2)) {
                    active.swap_remove(index);
                }
                push_uncovered(&mut segments, &edge, &active);
            }
        }
        segments
    }
}

fn push_uncovered(segments: &mut Vec<VerticalEdge>, edge: &VerticalEdge, active: &[(i64, i64)]) {
    let mut covering: Vec<(i64, i64)> =
        active.iter().copied().filter(|&(a, b)| a < edge.y2 && b > edge.y1).collect();
    covering.sort_unstable();

    let mut cursor = edge.y1;
    for (a, b) in covering {
        if a > cursor {
            segments.push(VerticalEdge { y1: cursor, y2: a.min(edge.y2), ..*edge });
        }
        cursor = cursor.max(b);
        if cursor >= edge.y2 {
            return;
        }
    }
    if cursor < edge.y2 {
        segments.push(VerticalEdge { y1: cursor, ..*edge });
    }
}

/// Joins end-to-end pieces lying on the same line and facing the same side.
fn merge_collinear(mut segments: Vec<VerticalEdge>) -> Vec<VerticalEdge> {
    segments.sort_by_key(|edge| (edge.x, edge.left, edge.y1));

    let mut merged: Vec<VerticalEdge> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last) if last.x == segment.x && last.left == segment.left && last.y2 == segment.y1 => {
                last.y2 = segment.y2;
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Walks vertical segments through the horizontal edges joining them.
fn link_rings(segments: &[VerticalEdge]) -> Vec<Vec<(i64, i64)>> {
    const UNLINKED: usize = usize::MAX;

    let mut endpoints: Vec<(i64, i64, usize, bool)> = segments
        .iter()
        .enumerate()
        .flat_map(|(index, edge)| [(edge.y1, edge.x, index, true), (edge.y2, edge.x, index, false)])
        .collect();
    endpoints.sort_by_key(|&(y, x, _, _)| (y, x));

    let mut partner_top = vec![UNLINKED; segments.len()];
    let mut partner_bottom = vec![UNLINKED; segments.len()];
    for pair in endpoints.chunks_exact(2) {
        let (_, _, a, a_top) = pair[0];
        let (_, _, b, b_top) = pair[1];
        if a_top {
            partner_top[a] = b;
        } else {
            partner_bottom[a] = b;
        }
        if b_top {
            partner_top[b] = a;
        } else {
            partner_bottom[b] = a;
        }
    }

    let mut visited = vec![false; segments.len()];
    let mut rings = Vec::new();
    for start in 0..segments.len() {
        if visited[start] {
            continue;
        }

        let mut ring: Vec<(i64, i64)> = Vec::new();
        let mut current = start;
        let mut from_top = true;
        loop {
            visited[current] = true;
            let edge = segments[current];
            let (enter, exit, next) = if from_top {
                (edge.y1, edge.y2, partner_bottom[current])
            } else {
                (edge.y2, edge.y1, partner_top[current])
            };
            push_vertex(&mut ring, (edge.x, enter));
            push_vertex(&mut ring, (edge.x, exit));

            if next == UNLINKED || visited[next] {
                break;
            }
            from_top = segments[next].y1 == exit;
            current = next;
        }

        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() >= 4 {
            rings.push(ring);
        }
    }
    rings
}

fn push_vertex(ring: &mut Vec<(i64, i64)>, vertex: (i64, i64)) {
    if ring.last() != Some(&vertex) {
        ring.push(vertex);
    }
}
