//!
//! # Spatial Index
//!
//! Two-level lookup from a die point to the tile containing it: the first
//! level is slot arithmetic on a uniform grid at the slice pitch, the second
//! resolves the slot to its [GCell]. Rebuilt whenever the mesh changes.
//!
//! Also home to the crossing walk: "which tiles does this wire cross, and
//! through which edges?"
//!

// Crates.io
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// Local imports
use crate::edge::Edge;
use crate::gcell::GCell;
use crate::geom::{BoundBox, Dir, Point, Side};
use crate::units::{DbUnits, Int};
use crate::{EdgeKey, GCellKey};

/// # Matrix
///
/// The two-level point-to-tile index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Matrix {
    /// Indexed area
    area: BoundBox,
    /// Slot pitch, the slice height
    side: DbUnits,
    /// Slot-grid width
    imax: Int,
    /// Slot-grid height
    jmax: Int,
    /// Slot contents, row-major from the area's lower-left
    slots: Vec<Option<GCellKey>>,
}
impl Matrix {
    /// Rebuild over `area` at pitch `side` from the current tile set.
    /// Idempotent when the tile set is unchanged.
    pub fn rebuild(
        &mut self,
        area: BoundBox,
        side: DbUnits,
        gcells: &SlotMap<GCellKey, GCell>,
    ) {
        self.area = area;
        self.side = side;
        if area.is_empty() || side.raw() <= 0 {
            self.imax = 0;
            self.jmax = 0;
            self.slots.clear();
            return;
        }
        let (w, h) = area.size();
        self.imax = num_integer::div_ceil(w.raw(), side.raw());
        self.jmax = num_integer::div_ceil(h.raw(), side.raw());
        self.slots = vec![None; (self.imax * self.jmax) as usize];
        for (key, gcell) in gcells.iter() {
            let (i0, j0) = match self.slot_of(gcell.bbox.p0) {
                Some(ij) => ij,
                None => continue,
            };
            // Upper corners are exclusive; pull them back inside
            let p1 = Point::new(gcell.bbox.p1.x - DbUnits(1), gcell.bbox.p1.y - DbUnits(1));
            let (i1, j1) = match self.slot_of(p1) {
                Some(ij) => ij,
                None => continue,
            };
            for j in j0..=j1 {
                for i in i0..=i1 {
                    self.slots[(j * self.imax + i) as usize] = Some(key);
                }
            }
        }
    }
    /// Drop all index state; used while gutting the mesh
    pub fn clear(&mut self) {
        self.area = BoundBox::empty();
        self.imax = 0;
        self.jmax = 0;
        self.slots.clear();
    }
    fn slot_of(&self, p: Point) -> Option<(Int, Int)> {
        if !self.area.contains(p) {
            return None;
        }
        let i = num_integer::div_floor((p.x - self.area.p0.x).raw(), self.side.raw());
        let j = num_integer::div_floor((p.y - self.area.p0.y).raw(), self.side.raw());
        Some((i, j))
    }
    /// The tile containing `p`, in near-constant time
    pub fn gcell_at(&self, gcells: &SlotMap<GCellKey, GCell>, p: Point) -> Option<GCellKey> {
        let (i, j) = self.slot_of(p)?;
        let key = self.slots[(j * self.imax + i) as usize]?;
        match gcells.get(key) {
            Some(gcell) if gcell.bbox.contains(p) => Some(key),
            _ => None,
        }
    }
}

/// One step of a crossing walk: a tile, and the edge through which the walk
/// leaves it. The final tile carries no edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderElement {
    pub gcell: GCellKey,
    pub edge: Option<EdgeKey>,
}

/// # Crossing-Walk Result
///
/// The ordered tile path of one wire, always iterated toward East or North.
/// Empty when the wire lies outside the mesh.
#[derive(Debug, Clone, Default)]
pub struct GCellsUnder {
    elements: Vec<UnderElement>,
}
impl GCellsUnder {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn elements(&self) -> &[UnderElement] {
        &self.elements
    }
    pub fn gcell_at(&self, i: usize) -> GCellKey {
        self.elements[i].gcell
    }
    pub fn edge_at(&self, i: usize) -> Option<EdgeKey> {
        self.elements[i].edge
    }
}

/// Walk the mesh under a wire running in `dir` between `source` and `target`.
///
/// Endpoints are clamped to the indexed area; a coordinate landing exactly on
/// the exclusive upper bound is pulled back one unit so it stays inside a
/// tile. Wires entirely outside the area yield an empty walk and an error
/// log; tile-lookup failures inside the area are internal bugs and also
/// yield an empty walk.
pub fn walk_under(
    matrix: &Matrix,
    gcells: &SlotMap<GCellKey, GCell>,
    edges: &SlotMap<EdgeKey, Edge>,
    area: &BoundBox,
    source: Point,
    target: Point,
    dir: Dir,
) -> GCellsUnder {
    let mut under = GCellsUnder::default();

    if source.x > area.p1.x
        || source.y > area.p1.y
        || target.x <= area.p0.x
        || target.y <= area.p0.y
    {
        log::error!(
            "walk_under(): wire {:?} -> {:?} is completely outside the mesh area (ignored)",
            source,
            target
        );
        return under;
    }

    let mut xs = source.x.max(area.p0.x);
    let mut ys = source.y.max(area.p0.y);
    let mut xt = target.x.min(area.p1.x);
    let mut yt = target.y.min(area.p1.y);
    if xs == area.p1.x {
        xs -= DbUnits(1);
    }
    if ys == area.p1.y {
        ys -= DbUnits(1);
    }
    if xt == area.p1.x {
        xt -= DbUnits(1);
    }
    if yt == area.p1.y {
        yt -= DbUnits(1);
    }

    let mut gsource = match matrix.gcell_at(gcells, Point::new(xs, ys)) {
        Some(g) => g,
        None => {
            log::error!("walk_under(): source {:?} not under a tile (ignored)", source);
            return under;
        }
    };
    let mut gtarget = match matrix.gcell_at(gcells, Point::new(xt, yt)) {
        Some(g) => g,
        None => {
            log::error!("walk_under(): target {:?} not under a tile (ignored)", target);
            return under;
        }
    };

    if gsource == gtarget {
        under.elements.push(UnderElement {
            gcell: gsource,
            edge: None,
        });
        return under;
    }

    // Normalize so iteration always advances East (resp. North)
    let (side, axis) = match dir {
        Dir::Horiz => {
            if source.x > target.x {
                std::mem::swap(&mut gsource, &mut gtarget);
            }
            (Side::East, ys)
        }
        Dir::Vert => {
            if source.y > target.y {
                std::mem::swap(&mut gsource, &mut gtarget);
            }
            (Side::North, xs)
        }
    };

    let mut edge = gcells
        .get(gsource)
        .and_then(|g| g.edge_at(edges, side, axis));
    while let Some(key) = edge {
        let e = match edges.get(key) {
            Some(e) => e,
            None => break,
        };
        under.elements.push(UnderElement {
            gcell: e.source,
            edge: Some(key),
        });
        if e.target == gtarget {
            break;
        }
        edge = gcells
            .get(e.target)
            .and_then(|g| g.edge_at(edges, side, axis));
    }
    under.elements.push(UnderElement {
        gcell: gtarget,
        edge: None,
    });

    under
}
