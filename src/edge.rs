//!
//! # Capacity Edges
//!
//! A directed adjacency between two mesh tiles across a shared side segment.
//! Edges are only materialized in the canonical East/North directions; the
//! same edge is listed on its source's East (or North) side and on its
//! target's opposite side, which is what "the reverse edge" refers to.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::geom::{Dir, Interval, Side};
use crate::units::DbUnits;
use crate::{CompKey, GCellKey};

/// # Mesh Edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Tile the edge leaves
    pub source: GCellKey,
    /// Tile the edge enters
    pub target: GCellKey,
    /// Side of `source` the edge crosses: [Side::East] or [Side::North]
    pub side: Side,
    /// Boundary coordinate: x of the shared side for East edges, y for North
    pub axis: DbUnits,
    /// Shared interval on the orthogonal axis
    pub span: Interval,
    /// Wire-track capacity across the shared side
    pub capacity: i32,
    /// Wires crossing this edge, ordered by their off-direction axis
    segments: Vec<(DbUnits, CompKey)>,
}
impl Edge {
    /// Create a new, unloaded [Edge]
    pub fn new(
        source: GCellKey,
        target: GCellKey,
        side: Side,
        axis: DbUnits,
        span: Interval,
        capacity: i32,
    ) -> Self {
        Self {
            source,
            target,
            side,
            axis,
            span,
            capacity,
            segments: Vec::new(),
        }
    }
    /// Direction of wires crossing us
    pub fn dir(&self) -> Dir {
        self.side.dir()
    }
    pub fn is_horizontal(&self) -> bool {
        self.dir() == Dir::Horiz
    }
    pub fn is_vertical(&self) -> bool {
        self.dir() == Dir::Vert
    }
    /// Current load; equals the crossing-wire count by construction
    pub fn load(&self) -> usize {
        self.segments.len()
    }
    /// An edge is overflowed when its load exceeds its capacity
    pub fn is_overflowed(&self) -> bool {
        self.load() as i64 > self.capacity as i64
    }
    /// Crossing wires, in axis order
    pub fn segments(&self) -> impl Iterator<Item = CompKey> + '_ {
        self.segments.iter().map(|(_, k)| *k)
    }
    pub fn has(&self, segment: CompKey) -> bool {
        self.segments.iter().any(|(_, k)| *k == segment)
    }
    /// Register `segment`, keeping the list sorted by `axis`
    pub fn add(&mut self, segment: CompKey, axis: DbUnits) {
        let at = self
            .segments
            .partition_point(|(a, _)| *a <= axis);
        self.segments.insert(at, (axis, segment));
    }
    /// Unregister `segment`. Returns whether it was present.
    pub fn remove(&mut self, segment: CompKey) -> bool {
        let before = self.segments.len();
        self.segments.retain(|(_, k)| *k != segment);
        before != self.segments.len()
    }
    /// Swap `old` for `new` in place, preserving order and load.
    /// Returns whether a replacement occurred.
    pub fn replace(&mut self, old: CompKey, new: CompKey) -> bool {
        for (_, k) in self.segments.iter_mut() {
            if *k == old {
                *k = new;
                return true;
            }
        }
        false
    }
    /// Load over capacity; zero-capacity edges count as full
    pub fn density(&self) -> f32 {
        if self.capacity <= 0 {
            if self.segments.is_empty() {
                0.0
            } else {
                1.0
            }
        } else {
            self.load() as f32 / self.capacity as f32
        }
    }
}
