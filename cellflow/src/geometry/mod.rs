//! Planar geometry for region polygons.

use serde::{Deserialize, Serialize};

/// Below this absolute signed area a polygon is treated as degenerate and
/// its centroid falls back to the vertex mean.
pub const AREA_EPSILON: f64 = 1e-9;

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from the left edge).
    pub x: f64,
    /// Vertical position (pixels from the top edge).
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns true if both coordinates are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Signed area of a closed polygon (shoelace formula). Positive for
/// counter-clockwise vertex order in a y-up frame.
#[must_use]
pub fn signed_area(vertices: &[Point]) -> f64 {
    edges(vertices).map(|(a, b)| cross(a, b)).sum::<f64>() / 2.0
}

/// Centroid of a closed polygon.
///
/// Uses the area-weighted formula; when `|A| < AREA_EPSILON` (collinear or
/// coincident vertices) returns the arithmetic mean of the vertices.
/// Returns `None` for an empty slice.
#[must_use]
pub fn polygon_centroid(vertices: &[Point]) -> Option<Point> {
    if vertices.is_empty() {
        return None;
    }

    let area = signed_area(vertices);
    if area.abs() < AREA_EPSILON {
        return Some(vertex_mean(vertices));
    }

    let (sx, sy) = edges(vertices).fold((0.0, 0.0), |(sx, sy), (a, b)| {
        let c = cross(a, b);
        (sx + (a.x + b.x) * c, sy + (a.y + b.y) * c)
    });
    let scale = 6.0 * area;
    Some(Point::new(sx / scale, sy / scale))
}

/// Arithmetic mean of the vertices.
#[must_use]
pub fn vertex_mean(vertices: &[Point]) -> Point {
    #[allow(clippy::cast_precision_loss)]
    let n = vertices.len().max(1) as f64;
    let (sx, sy) = vertices.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

fn edges(vertices: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

fn cross(a: Point, b: Point) -> f64 {
    a.x.mul_add(b.y, -(b.x * a.y))
}
