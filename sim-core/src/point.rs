use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use glam::DVec2;

/// An immutable point of the unit-square landscape.
///
/// Points are used as keys of ordered maps and sets, so they carry a total
/// order: `x` first, then `y`, both compared with [`f64::total_cmp`].
/// Equality agrees with that order.
#[derive(Clone, Copy, Debug)]
pub struct Point {
    pos: DVec2,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pos: DVec2::new(x, y),
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.pos.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.pos.y
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &Point) -> f64 {
        self.pos.distance(other.pos)
    }

    pub fn mid_point(&self, other: &Point) -> Point {
        Point {
            pos: (self.pos + other.pos) / 2.0,
        }
    }

    /// Renders the point as `<pt><x>..</x><y>..</y></pt>`.
    pub fn xml(&self) -> String {
        format!("<pt><x>{}</x><y>{}</y></pt>", self.pos.x, self.pos.y)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Point {}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pos
            .x
            .total_cmp(&other.pos.x)
            .then_with(|| self.pos.y.total_cmp(&other.pos.y))
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point {
            pos: self.pos + rhs.pos,
        }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point {
            pos: self.pos - rhs.pos,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pos.x, self.pos.y)
    }
}

/// Euclidean distance between two points.
#[inline]
pub fn euclidean_distance(a: &Point, b: &Point) -> f64 {
    a.distance_to(b)
}

/// Arithmetic mean of a set of points.
///
/// ### Returns
/// `None` if `points` is empty.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Point> {
    let mut sum = DVec2::ZERO;
    let mut n = 0usize;
    for p in points {
        sum += p.pos;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(Point {
            pos: sum / n as f64,
        })
    }
}
