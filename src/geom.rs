//!
//! # Mesh Geometry Primitives
//!
//! Points, rectangular boxes, one-dimensional intervals, and the direction
//! enumerations the routing mesh is built from. Boxes partition the die area,
//! so containment is half-open: left-closed, right-open on both axes.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::units::{DbUnits, Int};

/// # Point in two-dimensional layout-space
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub x: DbUnits,
    pub y: DbUnits,
}
impl Point {
    /// Create a new [Point] from (x,y) coordinates
    pub fn new(x: impl Into<DbUnits>, y: impl Into<DbUnits>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
    /// Get the coordinate associated with direction `dir`
    pub fn coord(&self, dir: Dir) -> DbUnits {
        match dir {
            Dir::Horiz => self.x,
            Dir::Vert => self.y,
        }
    }
}

/// Direction Enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Dir {
    Horiz,
    Vert,
}
impl Dir {
    /// Whichever direction we are, return the other one.
    pub fn other(&self) -> Self {
        match self {
            Self::Horiz => Self::Vert,
            Self::Vert => Self::Horiz,
        }
    }
}

/// # Cardinal Side Enumeration
///
/// Names the four sides of a mesh tile. Edge lists are indexed by side;
/// the spatial walk always iterates toward [Side::East] or [Side::North].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    East,
    South,
    West,
}
impl Side {
    /// All four sides, in index order
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];
    /// The opposing side
    pub fn opposite(&self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }
    /// Direction of travel *across* this side.
    /// East/West sides are crossed by horizontal wires, North/South by vertical ones.
    pub fn dir(&self) -> Dir {
        match self {
            Side::East | Side::West => Dir::Horiz,
            Side::North | Side::South => Dir::Vert,
        }
    }
    /// Index into per-tile side arrays
    pub fn index(&self) -> usize {
        match self {
            Side::North => 0,
            Side::East => 1,
            Side::South => 2,
            Side::West => 3,
        }
    }
}

/// # Rectangular Bounding Box
///
/// Points `p0` and `p1` represent opposite corners of a bounding rectangle.
/// `p0` is always closest to negative-infinity, in both x and y,
/// and `p1` is always closest to positive-infinity.
/// Emptiness is encoded by inverted corners.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundBox {
    pub p0: Point,
    pub p1: Point,
}
impl BoundBox {
    /// Create a new [BoundBox] from two [Point]s, sorting coordinates.
    pub fn from_points(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }
    /// Create a new [BoundBox] from four coordinates, un-sorted.
    pub fn new(
        x0: impl Into<DbUnits>,
        y0: impl Into<DbUnits>,
        x1: impl Into<DbUnits>,
        y1: impl Into<DbUnits>,
    ) -> Self {
        Self::from_points(Point::new(x0, y0), Point::new(x1, y1))
    }
    /// Create a new [BoundBox] comprising solely `pt`, having zero area.
    pub fn from_point(pt: Point) -> Self {
        Self { p0: pt, p1: pt }
    }
    /// Create an empty, otherwise invalid [BoundBox]
    pub fn empty() -> Self {
        Self {
            p0: Point::new(Int::MAX, Int::MAX),
            p1: Point::new(Int::MIN, Int::MIN),
        }
    }
    /// Boolean indication of whether a box is empty
    pub fn is_empty(&self) -> bool {
        self.p0.x > self.p1.x || self.p0.y > self.p1.y
    }
    /// Boolean indication of whether [Point] `pt` lies inside our box.
    /// Half-open: the `p1` edges are excluded, so abutting boxes never share a point.
    pub fn contains(&self, pt: Point) -> bool {
        self.p0.x <= pt.x && self.p1.x > pt.x && self.p0.y <= pt.y && self.p1.y > pt.y
    }
    /// Compute the intersection with rectangular bounding box `bbox`.
    /// Creates and returns a new [BoundBox].
    pub fn intersection(&self, bbox: &BoundBox) -> BoundBox {
        let pmin = Point::new(self.p0.x.max(bbox.p0.x), self.p0.y.max(bbox.p0.y));
        let pmax = Point::new(self.p1.x.min(bbox.p1.x), self.p1.y.min(bbox.p1.y));
        if pmin.x > pmax.x || pmin.y > pmax.y {
            return BoundBox::empty();
        }
        BoundBox { p0: pmin, p1: pmax }
    }
    /// Expand in-place to cover `bbox` as well
    pub fn merge(&mut self, bbox: &BoundBox) {
        if bbox.is_empty() {
            return;
        }
        self.p0 = Point::new(self.p0.x.min(bbox.p0.x), self.p0.y.min(bbox.p0.y));
        self.p1 = Point::new(self.p1.x.max(bbox.p1.x), self.p1.y.max(bbox.p1.y));
    }
    /// Expand an existing [BoundBox] in all directions by `delta`
    pub fn expand(&mut self, delta: impl Into<DbUnits>) {
        let delta = delta.into();
        self.p0.x -= delta;
        self.p0.y -= delta;
        self.p1.x += delta;
        self.p1.y += delta;
    }
    /// Get the box's size as an (x,y) tuple
    pub fn size(&self) -> (DbUnits, DbUnits) {
        (self.p1.x - self.p0.x, self.p1.y - self.p0.y)
    }
    /// Get the box's center point
    pub fn center(&self) -> Point {
        Point::new(
            DbUnits((self.p0.x.raw() + self.p1.x.raw()) / 2),
            DbUnits((self.p0.y.raw() + self.p1.y.raw()) / 2),
        )
    }
    /// The box's span along `dir`: its x-extent for [Dir::Horiz], y-extent for [Dir::Vert]
    pub fn span(&self, dir: Dir) -> Interval {
        match dir {
            Dir::Horiz => Interval::new(self.p0.x, self.p1.x),
            Dir::Vert => Interval::new(self.p0.y, self.p1.y),
        }
    }
}
impl Default for BoundBox {
    /// Default boxes are empty
    fn default() -> BoundBox {
        BoundBox::empty()
    }
}

/// # One-Dimensional Interval
///
/// Emptiness is a state of its own, distinct from zero length:
/// a `[v,v]` interval contains `v`, while an empty interval contains nothing
/// and absorbs every intersection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interval {
    pub vmin: DbUnits,
    pub vmax: DbUnits,
}
impl Interval {
    /// Create a new [Interval] from two bounds, sorting them.
    pub fn new(v0: impl Into<DbUnits>, v1: impl Into<DbUnits>) -> Self {
        let (v0, v1) = (v0.into(), v1.into());
        Self {
            vmin: v0.min(v1),
            vmax: v0.max(v1),
        }
    }
    /// Create an empty [Interval]
    pub fn empty() -> Self {
        Self {
            vmin: DbUnits(Int::MAX),
            vmax: DbUnits(Int::MIN),
        }
    }
    /// Create the full [Interval], the identity for intersection
    pub fn full() -> Self {
        Self {
            vmin: DbUnits(Int::MIN),
            vmax: DbUnits(Int::MAX),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.vmin > self.vmax
    }
    /// Boolean indication of whether `v` lies inside, inclusive of both bounds
    pub fn contains(&self, v: impl Into<DbUnits>) -> bool {
        let v = v.into();
        self.vmin <= v && v <= self.vmax
    }
    /// Length of the interval; zero when empty or zero-length
    pub fn length(&self) -> DbUnits {
        if self.is_empty() {
            DbUnits(0)
        } else {
            self.vmax - self.vmin
        }
    }
    /// Shrink to the overlap with `other`, in place.
    /// Intersection with an empty interval stays empty.
    pub fn intersect(&mut self, other: &Interval) {
        self.vmin = self.vmin.max(other.vmin);
        self.vmax = self.vmax.min(other.vmax);
    }
    /// Grow the low bound by `dlo` and the high bound by `dhi`.
    /// Negative deltas shrink; shrinking past the other bound empties the interval.
    pub fn inflate(&mut self, dlo: impl Into<DbUnits>, dhi: impl Into<DbUnits>) {
        if self.is_empty() {
            return;
        }
        self.vmin -= dlo.into();
        self.vmax += dhi.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_boxes() {
        let b = BoundBox::new(0, 0, 100, 100);
        assert!(b.contains(Point::new(0, 0)));
        assert!(b.contains(Point::new(99, 99)));
        assert!(!b.contains(Point::new(100, 50)));
        assert!(!b.contains(Point::new(50, 100)));
    }
    #[test]
    fn empty_interval_absorbs() {
        let mut i = Interval::new(0, 10);
        i.intersect(&Interval::empty());
        assert!(i.is_empty());
        let mut e = Interval::empty();
        e.intersect(&Interval::new(0, 10));
        assert!(e.is_empty());
    }
    #[test]
    fn zero_length_is_not_empty() {
        let i = Interval::new(5, 5);
        assert!(!i.is_empty());
        assert!(i.contains(5));
        assert_eq!(i.length(), DbUnits(0));
    }
    #[test]
    fn full_interval_intersection() {
        let mut c = Interval::full();
        c.intersect(&Interval::new(0, 100));
        c.intersect(&Interval::new(50, 200));
        assert_eq!(c, Interval::new(50, 100));
    }
}
