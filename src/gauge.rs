//!
//! # Routing Gauge
//!
//! Read-only description of the available routing layers: per-layer
//! preferred direction, kind, track pitch and offset, and the track-counting
//! queries capacity computation is built on. A gauge is immutable for the
//! duration of a routing run and shared by [Ptr].
//!
//! [Ptr]: crate::Ptr
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::geom::Dir;
use crate::units::{DbUnits, Int};

/// Layer-Kind Enumeration
///
/// Only [LayerKind::Default] layers contribute routing capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayerKind {
    Default,
    PinOnly,
    Blockage,
}

/// # Single-Layer Gauge
///
/// One routing layer's worth of gauge data. Tracks run in `dir`,
/// spaced `pitch` apart starting from `offset` on the orthogonal axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerGauge {
    /// Layer Name
    pub name: String,
    /// Depth in the layer stack, bottom-up
    pub depth: usize,
    /// Preferred routing direction
    pub dir: Dir,
    /// Layer kind; non-[LayerKind::Default] layers carry no tracks
    pub kind: LayerKind,
    /// Track pitch
    pub pitch: DbUnits,
    /// First-track offset on the orthogonal axis
    pub offset: DbUnits,
}
impl LayerGauge {
    /// Create a new [LayerGauge] with zero offset
    pub fn new(
        name: impl Into<String>,
        depth: usize,
        dir: Dir,
        kind: LayerKind,
        pitch: impl Into<DbUnits>,
    ) -> Self {
        Self {
            name: name.into(),
            depth,
            dir,
            kind,
            pitch: pitch.into(),
            offset: DbUnits(0),
        }
    }
    /// Count the tracks whose axes lie in `[lo, hi]`, both bounds inclusive.
    /// Monotone in the span: growing `[lo, hi]` never decreases the count.
    pub fn track_number(&self, lo: DbUnits, hi: DbUnits) -> usize {
        if self.pitch.raw() <= 0 || hi < lo {
            return 0;
        }
        let pitch = self.pitch.raw();
        let lo = lo.raw() - self.offset.raw();
        let hi = hi.raw() - self.offset.raw();
        // First and last track indices inside the span
        let first: Int = num_integer::div_ceil(lo, pitch);
        let last: Int = num_integer::div_floor(hi, pitch);
        if last < first {
            0
        } else {
            (last - first + 1) as usize
        }
    }
}

/// # Routing Gauge
///
/// The full layer stack, ordered by depth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingGauge {
    /// Gauge Name
    pub name: String,
    /// Per-layer gauges, index equals depth
    pub layers: Vec<LayerGauge>,
}
impl RoutingGauge {
    /// Create a new and empty [RoutingGauge]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }
    /// Add a [LayerGauge], assigning its depth. Returns `self` for chaining.
    pub fn add(mut self, mut layer: LayerGauge) -> Self {
        layer.depth = self.layers.len();
        self.layers.push(layer);
        self
    }
    /// Get the gauge at `depth`. Returns `None` if `depth` is out of bounds.
    pub fn layer(&self, depth: usize) -> Option<&LayerGauge> {
        self.layers.get(depth)
    }
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
    /// Depth of the first default-kind layer running in `dir`
    pub fn default_depth(&self, dir: Dir) -> Option<usize> {
        self.layers
            .iter()
            .position(|l| l.kind == LayerKind::Default && l.dir == dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_counts() {
        let g = LayerGauge::new("metal2", 0, Dir::Horiz, LayerKind::Default, 20);
        assert_eq!(g.track_number(DbUnits(0), DbUnits(199)), 10);
        assert_eq!(g.track_number(DbUnits(0), DbUnits(99)), 5);
        assert_eq!(g.track_number(DbUnits(1), DbUnits(19)), 0);
        assert_eq!(g.track_number(DbUnits(10), DbUnits(5)), 0);
    }
    #[test]
    fn track_counts_monotone() {
        let g = LayerGauge::new("metal3", 0, Dir::Vert, LayerKind::Default, 20);
        let mut prev = 0;
        for hi in 0..400 {
            let n = g.track_number(DbUnits(0), DbUnits(hi));
            assert!(n >= prev);
            prev = n;
        }
    }
}
