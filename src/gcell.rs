//!
//! # Mesh Tiles
//!
//! A GCell is one tile of the routing mesh: its abutment box (half-open on
//! both axes, so tiles partition the die), per-side edge lists, the per-net
//! anchor contacts currently routed through it, and cached density state.
//!

// Crates.io
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// Local imports
use crate::config::DensityMode;
use crate::db::Cell;
use crate::edge::Edge;
use crate::geom::{BoundBox, Dir, Interval, Side};
use crate::units::DbUnits;
use crate::{CompKey, EdgeKey, NetKey};

/// One per-net anchor contact, local to a tile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GContact {
    pub net: NetKey,
    pub contact: CompKey,
}

/// # GCell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GCell {
    /// Tile area; left-closed, right-open on both axes
    pub bbox: BoundBox,
    /// Outgoing edges per side, each list ordered along the side
    edges: [Vec<EdgeKey>; 4],
    /// Per-net anchors routed through this tile
    gcontacts: Vec<GContact>,
    /// Cached density, recomputed by [GCell::update_density]
    pub density: f32,
    /// Cached saturation state
    pub saturated: bool,
}
impl GCell {
    /// Create a new tile covering `bbox`, with no edges or anchors
    pub fn new(bbox: BoundBox) -> Self {
        Self {
            bbox,
            edges: Default::default(),
            gcontacts: Vec::new(),
            density: 0.0,
            saturated: false,
        }
    }

    /// The tile's extent along `dir`
    pub fn side(&self, dir: Dir) -> Interval {
        self.bbox.span(dir)
    }

    /// Edge keys on `side`, in side order
    pub fn edges(&self, side: Side) -> &[EdgeKey] {
        &self.edges[side.index()]
    }
    /// All edge keys, all four sides
    pub fn all_edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges.iter().flatten().copied()
    }
    /// Register `edge` on `side`, keeping the list ordered by span start
    pub fn add_edge(&mut self, arena: &SlotMap<EdgeKey, Edge>, side: Side, edge: EdgeKey) {
        let start = arena.get(edge).map(|e| e.span.vmin).unwrap_or_default();
        let list = &mut self.edges[side.index()];
        let at = list.partition_point(|k| {
            arena.get(*k).map(|e| e.span.vmin).unwrap_or_default() <= start
        });
        list.insert(at, edge);
    }
    /// Drop all edge registrations; used only while gutting the mesh
    pub fn clear_edges(&mut self) {
        for list in self.edges.iter_mut() {
            list.clear();
        }
    }
    /// The unique outgoing edge on `side` whose shared interval contains
    /// `axis`. The span's high bound is excluded, like the tile boxes, so a
    /// boundary axis resolves to exactly one edge.
    pub fn edge_at(
        &self,
        arena: &SlotMap<EdgeKey, Edge>,
        side: Side,
        axis: DbUnits,
    ) -> Option<EdgeKey> {
        self.edges[side.index()]
            .iter()
            .copied()
            .find(|k| {
                arena
                    .get(*k)
                    .map(|e| e.span.vmin <= axis && axis < e.span.vmax)
                    .unwrap_or(false)
            })
    }

    /// The tile-local anchor contact for `net`, created at the tile center if absent.
    pub fn gcontact(&mut self, cell: &mut Cell, net: NetKey) -> CompKey {
        if let Some(gc) = self.gcontacts.iter().find(|gc| gc.net == net) {
            return gc.contact;
        }
        let contact = cell.new_contact(net, self.bbox.center());
        self.gcontacts.push(GContact { net, contact });
        contact
    }
    /// Membership test over the anchor list
    pub fn has_gcontact(&self, contact: CompKey) -> bool {
        self.gcontacts.iter().any(|gc| gc.contact == contact)
    }
    /// The anchor list
    pub fn gcontacts(&self) -> &[GContact] {
        &self.gcontacts
    }
    /// Release one reference on `contact`: when nothing remains attached to
    /// its ring, the anchor is destroyed and dropped from the tile.
    /// Returns whether destruction happened.
    pub fn unref_contact(&mut self, cell: &mut Cell, contact: CompKey) -> bool {
        let at = match self.gcontacts.iter().position(|gc| gc.contact == contact) {
            Some(at) => at,
            None => return false,
        };
        match cell.contact(contact) {
            Some(c) if c.slaves.is_empty() => {
                self.gcontacts.remove(at);
                cell.destroy_contact(contact);
                true
            }
            _ => false,
        }
    }
    /// Drop the transient anchors left over from global routing:
    /// every anchor whose ring has emptied is destroyed.
    /// Returns the destroyed contact keys so callers can unlink wrappers.
    pub fn cleanup_global(&mut self, cell: &mut Cell) -> Vec<CompKey> {
        let mut keep = Vec::with_capacity(self.gcontacts.len());
        let mut destroyed = Vec::new();
        for gc in self.gcontacts.drain(..) {
            match cell.contact(gc.contact) {
                Some(c) if c.slaves.is_empty() => {
                    cell.destroy_contact(gc.contact);
                    destroyed.push(gc.contact);
                }
                Some(_) => keep.push(gc),
                None => (),
            }
        }
        self.gcontacts = keep;
        destroyed
    }

    /// Recompute the cached density from edge loads, per `mode`
    pub fn update_density(&mut self, arena: &SlotMap<EdgeKey, Edge>, mode: DensityMode) {
        let mut hload = 0usize;
        let mut hcap = 0i64;
        let mut vload = 0usize;
        let mut vcap = 0i64;
        let mut max_edge = 0.0f32;
        for key in self.all_edges() {
            let edge = match arena.get(key) {
                Some(edge) => edge,
                None => continue,
            };
            max_edge = max_edge.max(edge.density());
            match edge.dir() {
                Dir::Horiz => {
                    hload += edge.load();
                    hcap += edge.capacity as i64;
                }
                Dir::Vert => {
                    vload += edge.load();
                    vcap += edge.capacity as i64;
                }
            }
        }
        let havg = if hcap > 0 { hload as f32 / hcap as f32 } else { 0.0 };
        let vavg = if vcap > 0 { vload as f32 / vcap as f32 } else { 0.0 };
        self.density = match mode {
            DensityMode::MaxDensity => max_edge,
            DensityMode::AverageHVDensity => (havg + vavg) / 2.0,
            DensityMode::AverageHDensity => havg,
            DensityMode::AverageVDensity => vavg,
            DensityMode::MaxHVDensity => havg.max(vavg),
        };
    }
    /// Refresh the saturation cache; returns one when the tile is saturated.
    pub fn check_density(
        &mut self,
        arena: &SlotMap<EdgeKey, Edge>,
        mode: DensityMode,
        saturate_ratio: f32,
    ) -> usize {
        self.update_density(arena, mode);
        self.saturated = self.density > saturate_ratio;
        self.saturated as usize
    }
}
