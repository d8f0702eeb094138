//! Path classification and the accumulated extraction result (C10).
//!
//! A closed subpath is emitted as an `ExtractedRectangle` when its four device-space
//! vertices meet at angles within ~6 degrees of a right angle; otherwise every
//! consecutive pair of points becomes an `ExtractedLine`, with curves having already
//! been reduced by the VM to a chord from their start to final anchor point.

use serde_derive::{Deserialize, Serialize};

use crate::color::Rgb;

/// Cosine of (90 - 6) degrees; a vertex angle's cosine magnitude under this is
/// treated as a right angle.
const RIGHT_ANGLE_COS_TOLERANCE: f64 = 0.104_528_46;
/// Device-space points closer than this are the same point (closes subpaths, etc).
const POINT_EPSILON: f64 = 1e-6;
/// Axis tolerance, in device-space points, for horizontal/vertical classification.
const AXIS_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLine {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub horizontal: bool,
    pub vertical: bool,
    pub stroked: bool,
    pub filled: bool,
    pub stroke_width: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRectangle {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub stroked: bool,
    pub filled: bool,
    pub stroke_width: f64,
    pub color: Rgb,
}

/// Accumulates everything a content-stream run paints, with post-hoc filtering and
/// classification into horizontal/vertical/diagonal pools.
#[derive(Debug, Default, Clone)]
pub struct PathExtractor {
    pub lines: Vec<ExtractedLine>,
    pub rectangles: Vec<ExtractedRectangle>,
}

impl PathExtractor {
    pub fn horizontal_lines(&self) -> impl Iterator<Item = &ExtractedLine> {
        self.lines.iter().filter(|l| l.horizontal && !l.vertical)
    }

    pub fn vertical_lines(&self) -> impl Iterator<Item = &ExtractedLine> {
        self.lines.iter().filter(|l| l.vertical && !l.horizontal)
    }

    pub fn diagonal_lines(&self) -> impl Iterator<Item = &ExtractedLine> {
        self.lines.iter().filter(|l| !l.horizontal && !l.vertical)
    }

    /// Drops lines shorter than `min_length` and rectangles narrower than `min_width`
    /// or shorter than `min_height` (all in device-space units).
    pub fn retain_min_dimensions(&mut self, min_length: f64, min_width: f64, min_height: f64) {
        self.lines.retain(|l| {
            let dx = l.x1 - l.x0;
            let dy = l.y1 - l.y0;
            (dx * dx + dy * dy).sqrt() >= min_length
        });
        self.rectangles
            .retain(|r| (r.x1 - r.x0) >= min_width && (r.y1 - r.y0) >= min_height);
    }
}

/// Classifies one closed-or-open device-space subpath produced by a paint operator.
/// Returns either a single rectangle, or the subpath's chord-approximated segments as
/// individual lines.
pub(crate) fn classify_subpath(
    points: &[(f64, f64)],
    stroked: bool,
    filled: bool,
    stroke_width: f64,
    color: Rgb,
) -> (Option<ExtractedRectangle>, Vec<ExtractedLine>) {
    let pts = dedup_consecutive(points);
    if let Some(rect) = try_rectangle(&pts, stroked, filled, stroke_width, color) {
        return (Some(rect), Vec::new());
    }

    let mut lines = Vec::with_capacity(pts.len().saturating_sub(1));
    for pair in pts.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        lines.push(ExtractedLine {
            x0,
            y0,
            x1,
            y1,
            horizontal: (y1 - y0).abs() < AXIS_TOLERANCE,
            vertical: (x1 - x0).abs() < AXIS_TOLERANCE,
            stroked,
            filled,
            stroke_width,
            color,
        });
    }
    (None, lines)
}

fn dedup_consecutive(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().map(|&last| points_close(last, p)).unwrap_or(false) {
            continue;
        }
        out.push(p);
    }
    out
}

fn points_close(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < POINT_EPSILON && (a.1 - b.1).abs() < POINT_EPSILON
}

fn try_rectangle(
    pts: &[(f64, f64)],
    stroked: bool,
    filled: bool,
    stroke_width: f64,
    color: Rgb,
) -> Option<ExtractedRectangle> {
    let mut pts = pts.to_vec();
    if pts.len() == 5 && points_close(pts[0], pts[4]) {
        pts.pop();
    }
    if pts.len() != 4 {
        return None;
    }

    for i in 0..4 {
        let prev = pts[(i + 3) % 4];
        let cur = pts[i];
        let next = pts[(i + 1) % 4];
        let v1 = (prev.0 - cur.0, prev.1 - cur.1);
        let v2 = (next.0 - cur.0, next.1 - cur.1);
        let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
        let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
        if mag1 < POINT_EPSILON || mag2 < POINT_EPSILON {
            return None;
        }
        let cos = (v1.0 * v2.0 + v1.1 * v2.1) / (mag1 * mag2);
        if cos.abs() > RIGHT_ANGLE_COS_TOLERANCE {
            return None;
        }
    }

    let xs = pts.iter().map(|p| p.0);
    let ys = pts.iter().map(|p| p.1);
    Some(ExtractedRectangle {
        x0: xs.clone().fold(f64::INFINITY, f64::min),
        x1: xs.fold(f64::NEG_INFINITY, f64::max),
        y0: ys.clone().fold(f64::INFINITY, f64::min),
        y1: ys.fold(f64::NEG_INFINITY, f64::max),
        stroked,
        filled,
        stroke_width,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_aligned_quadrilateral_is_a_rectangle() {
        let pts = [(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0), (0.0, 0.0)];
        let (rect, lines) = classify_subpath(&pts, true, false, 1.0, Rgb::BLACK);
        assert!(lines.is_empty());
        let rect = rect.unwrap();
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn open_triangle_is_three_lines_not_a_rectangle() {
        let pts = [(0.0, 0.0), (50.0, 0.0), (0.0, 100.0)];
        let (rect, lines) = classify_subpath(&pts, true, false, 1.0, Rgb::BLACK);
        assert!(rect.is_none());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn horizontal_and_vertical_classification_respects_tolerance() {
        let pts = [(10.0, 10.0), (110.0, 10.2), (110.2, 210.0)];
        let (_, lines) = classify_subpath(&pts, true, false, 1.0, Rgb::BLACK);
        assert!(lines[0].horizontal);
        assert!(lines[1].vertical);
    }

    #[test]
    fn min_dimension_filter_drops_short_lines_and_small_rectangles() {
        let mut extractor = PathExtractor::default();
        extractor.lines.push(ExtractedLine {
            x0: 0.0,
            y0: 0.0,
            x1: 0.2,
            y1: 0.0,
            horizontal: true,
            vertical: false,
            stroked: true,
            filled: false,
            stroke_width: 1.0,
            color: Rgb::BLACK,
        });
        extractor.rectangles.push(ExtractedRectangle {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
            stroked: false,
            filled: true,
            stroke_width: 0.0,
            color: Rgb::BLACK,
        });
        extractor.retain_min_dimensions(1.0, 5.0, 5.0);
        assert!(extractor.lines.is_empty());
        assert!(extractor.rectangles.is_empty());
    }
}
