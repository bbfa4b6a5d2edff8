//!
//! # Routing Engine
//!
//! Top-level owner of the mesh, the spatial index, the auto-wrapper lookup
//! tables, and the per-net bookkeeping. External routers drive it through a
//! [Session]: trace wires over the mesh, break and unify them, rip them back
//! up, then project the surviving topology back onto the geometry with
//! [Engine::finalize_layout].
//!
//! [Session]: crate::session::Session
//!

// Std-lib imports
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

// Crates.io
use slotmap::SlotMap;

// Local imports
use crate::autos::{AutoContact, AutoSegment};
use crate::config::Config;
use crate::db::{Cell, Component, ComponentBase};
use crate::edge::Edge;
use crate::error::{RouteError, RouteResult};
use crate::gcell::GCell;
use crate::geom::{Dir, Interval, Point, Side};
use crate::matrix::{walk_under, GCellsUnder, Matrix};
use crate::netdata::{NetData, RoutingState};
use crate::session::Session;
use crate::units::DbUnits;
use crate::{CompKey, EdgeKey, GCellKey, NetKey};

/// Engine lifecycle states, in order. Mutations freeze progressively:
/// wrappers stop linking past [EngineState::Active], stop unlinking past
/// [EngineState::Driving].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineState {
    Creation,
    GlobalLoaded,
    Active,
    Driving,
    PreDestroying,
    Gutted,
}

/// Global-routing load methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMethod {
    /// Canonical path: materialize wrappers net by net
    ByNet,
    /// Tile-by-tile loading; never implemented in this engine
    ByGCell,
}

/// Whether [ripup] walks outward through degree-2 anchors
///
/// [ripup]: crate::session::Session::ripup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    None,
    Propagate,
}

/// Teardown gates consulted while gutting
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFlags {
    /// Destroy emptied tile-anchor contacts along with their wrappers
    pub destroy_base_contact: bool,
}

/// # Phase Timer
///
/// Wraps the main engine phases; cumulative, suspendable.
#[derive(Debug, Default)]
pub struct Measures {
    running: Option<Instant>,
    accumulated: Duration,
}
impl Measures {
    pub fn start(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running = Some(Instant::now());
    }
    pub fn stop(&mut self) {
        if let Some(t) = self.running.take() {
            self.accumulated += t.elapsed();
        }
    }
    pub fn suspend(&mut self) {
        self.stop();
    }
    pub fn resume(&mut self) {
        if self.running.is_none() {
            self.running = Some(Instant::now());
        }
    }
    pub fn elapsed(&self) -> Duration {
        match self.running {
            Some(t) => self.accumulated + t.elapsed(),
            None => self.accumulated,
        }
    }
}

/// # Routing Engine
pub struct Engine {
    config: Config,
    cell: Cell,
    matrix: Matrix,
    gcells: SlotMap<GCellKey, GCell>,
    edges: SlotMap<EdgeKey, Edge>,
    ov_edges: HashSet<EdgeKey>,
    net_ordering: Vec<NetKey>,
    net_datas: HashMap<NetKey, NetData>,
    auto_segments: HashMap<CompKey, AutoSegment>,
    auto_contacts: HashMap<CompKey, AutoContact>,
    state: EngineState,
    flags: EngineFlags,
    measures: Measures,
    blockage_net: NetKey,
    next_align_group: u32,
    // Pending-revalidation scratch, drained at session close
    pub(crate) touched_gcells: Vec<GCellKey>,
    pub(crate) touched_nets: Vec<NetKey>,
}

impl Engine {
    /// Create an engine over `cell`, with one root tile spanning the
    /// abutment box. Configuration offenses are fatal here; no engine is
    /// created.
    pub fn create(mut cell: Cell, config: Config) -> RouteResult<Engine> {
        config.validate()?;
        if cell.abutment.is_empty() {
            return Err(RouteError::config(format!(
                "Engine::create(): cell {} has no abutment box",
                cell.name
            )));
        }
        let blockage_net = match cell.net_by_name("blockagenet") {
            Some(net) => net,
            None => cell.add_net("blockagenet"),
        };
        let mut engine = Engine {
            config,
            cell,
            matrix: Matrix::default(),
            gcells: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            ov_edges: HashSet::new(),
            net_ordering: Vec::new(),
            net_datas: HashMap::new(),
            auto_segments: HashMap::new(),
            auto_contacts: HashMap::new(),
            state: EngineState::Creation,
            flags: EngineFlags::default(),
            measures: Measures::default(),
            blockage_net,
            next_align_group: 0,
            touched_gcells: Vec::new(),
            touched_nets: Vec::new(),
        };
        engine.gcells.insert(GCell::new(engine.cell.abutment));
        engine.update_matrix();
        Ok(engine)
    }

    // ------------------------------------------------------------------
    // State queries

    pub fn state(&self) -> EngineState {
        self.state
    }
    pub fn set_state(&mut self, state: EngineState) {
        self.state = state;
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn cell(&self) -> &Cell {
        &self.cell
    }
    pub(crate) fn cell_mut(&mut self) -> &mut Cell {
        &mut self.cell
    }
    pub fn blockage_net(&self) -> NetKey {
        self.blockage_net
    }
    pub fn gcells(&self) -> &SlotMap<GCellKey, GCell> {
        &self.gcells
    }
    pub fn edges(&self) -> &SlotMap<EdgeKey, Edge> {
        &self.edges
    }
    /// Edges currently loaded past capacity
    pub fn ov_edges(&self) -> &HashSet<EdgeKey> {
        &self.ov_edges
    }
    /// Net keys in routing order; valid after [Engine::setup_net_datas]
    pub fn net_ordering(&self) -> &[NetKey] {
        &self.net_ordering
    }

    /// Open a mutation session. A second open cannot be expressed while the
    /// first is alive; the borrow rules carry the no-reentry rule.
    pub fn open_session(&mut self) -> Session<'_> {
        Session::new(self)
    }

    // ------------------------------------------------------------------
    // Mesh queries

    /// The die extent along `dir`
    pub fn uside(&self, dir: Dir) -> Interval {
        self.cell.abutment.span(dir)
    }
    /// The tile containing `p`
    pub fn gcell_under(&self, p: Point) -> Option<GCellKey> {
        self.matrix.gcell_at(&self.gcells, p)
    }
    /// The ordered tile path under wire `segment`
    pub fn gcells_under(&self, segment: CompKey) -> GCellsUnder {
        let seg = match self.cell.segment(segment) {
            Some(seg) => seg,
            None => {
                log::error!("Engine::gcells_under(): {:?} is not a wire segment", segment);
                return GCellsUnder::default();
            }
        };
        let (source, target) = match (
            self.cell.source_position(segment),
            self.cell.target_position(segment),
        ) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                log::error!("Engine::gcells_under(): {:?} has a dangling anchor", segment);
                return GCellsUnder::default();
            }
        };
        self.gcells_under_points(source, target, seg.dir)
    }
    /// The ordered tile path under a virtual wire between two points
    pub fn gcells_under_points(&self, source: Point, target: Point, dir: Dir) -> GCellsUnder {
        walk_under(
            &self.matrix,
            &self.gcells,
            &self.edges,
            &self.cell.abutment,
            source,
            target,
            dir,
        )
    }

    /// Track capacity across `span` for wires running in `dir`,
    /// summed over default-kind layers up to the allowed depth.
    pub fn capacity(&self, span: Interval, dir: Dir) -> RouteResult<i32> {
        let mut span = span;
        span.inflate(0, -1);
        if span.is_empty() {
            return Ok(0);
        }
        let ab = self.cell.abutment;
        let gauge = self.config.gauge.read()?;
        let mut capacity = 0i32;
        for depth in 0..=self.config.allowed_depth {
            let g = match gauge.layer(depth) {
                Some(g) => g,
                None => break,
            };
            if g.kind != crate::gauge::LayerKind::Default {
                continue;
            }
            if dir == Dir::Horiz && g.dir == Dir::Horiz {
                capacity += g.track_number(span.vmin - ab.p0.y, span.vmax - ab.p0.y) as i32;
            }
            if dir == Dir::Vert && g.dir == Dir::Vert {
                capacity += g.track_number(span.vmin - ab.p0.x, span.vmax - ab.p0.x) as i32;
            }
        }
        Ok(capacity)
    }

    /// Rebuild the spatial index over the current tile set.
    /// Idempotent when the tile set is unchanged.
    pub fn update_matrix(&mut self) {
        self.matrix
            .rebuild(self.cell.abutment, self.config.slice_height, &self.gcells);
    }

    /// Partition the root tile into the uniform slice-pitch mesh, with
    /// capacity edges between all adjacent tiles. Legal while still in
    /// [EngineState::Creation].
    pub fn setup_grid(&mut self) -> RouteResult<()> {
        if self.state > EngineState::Creation {
            return Err(RouteError::state(format!(
                "Engine::setup_grid(): mesh is frozen at state {:?}",
                self.state
            )));
        }
        self.gcells.clear();
        self.edges.clear();
        self.ov_edges.clear();

        let ab = self.cell.abutment;
        let side = self.config.slice_height;
        let (w, h) = ab.size();
        let cols = num_integer::div_ceil(w.raw(), side.raw());
        let rows = num_integer::div_ceil(h.raw(), side.raw());

        let mut grid: Vec<GCellKey> = Vec::with_capacity((cols * rows) as usize);
        for j in 0..rows {
            for i in 0..cols {
                let x0 = ab.p0.x + side * i;
                let y0 = ab.p0.y + side * j;
                let x1 = (x0 + side).min(ab.p1.x);
                let y1 = (y0 + side).min(ab.p1.y);
                grid.push(self.gcells.insert(GCell::new(crate::geom::BoundBox::new(
                    x0, y0, x1, y1,
                ))));
            }
        }
        let at = |i: i64, j: i64| grid[(j * cols + i) as usize];
        for j in 0..rows {
            for i in 0..cols {
                let source = at(i, j);
                if i + 1 < cols {
                    let target = at(i + 1, j);
                    self.make_edge(source, target, Side::East)?;
                }
                if j + 1 < rows {
                    let target = at(i, j + 1);
                    self.make_edge(source, target, Side::North)?;
                }
            }
        }
        self.update_matrix();
        Ok(())
    }
    /// Create the canonical edge from `source` across `side`, registering it
    /// on both tiles.
    fn make_edge(&mut self, source: GCellKey, target: GCellKey, side: Side) -> RouteResult<()> {
        let sbox = self.gcells[source].bbox;
        let tbox = self.gcells[target].bbox;
        let (axis, span) = match side {
            Side::East => (
                sbox.p1.x,
                intersect(sbox.span(Dir::Vert), tbox.span(Dir::Vert)),
            ),
            Side::North => (
                sbox.p1.y,
                intersect(sbox.span(Dir::Horiz), tbox.span(Dir::Horiz)),
            ),
            _ => {
                return Err(RouteError::msg(
                    "Engine::make_edge(): edges are only materialized East/North",
                ))
            }
        };
        let capacity = self.capacity(span, side.dir())?;
        let key = self
            .edges
            .insert(Edge::new(source, target, side, axis, span, capacity));
        let arena = &self.edges;
        self.gcells[source].add_edge(arena, side, key);
        self.gcells[target].add_edge(arena, side.opposite(), key);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Net bookkeeping

    /// Build [NetData] records for every net not yet known, then (re)sort
    /// the routing order ascending by (sparsity, net id). Deterministic for
    /// a given cell and configuration.
    pub fn setup_net_datas(&mut self) {
        let nets: Vec<NetKey> = self.cell.nets().collect();
        for net in nets {
            if self.net_datas.contains_key(&net) {
                continue;
            }
            let data = NetData::new(&self.cell, net, None, self.config.global_threshold);
            self.net_datas.insert(net, data);
            self.net_ordering.push(net);
        }
        let datas = &self.net_datas;
        self.net_ordering.sort_by_key(|net| {
            datas
                .get(net)
                .map(NetData::sparsity_key)
                .unwrap_or((i64::MAX, u64::MAX))
        });
    }
    /// The bookkeeping record for `net`, created on the spot when missing.
    /// With `create_state`, a routing-state record is attached as well.
    pub fn net_data_mut(&mut self, net: NetKey, create_state: bool) -> &mut NetData {
        let data = match self.net_datas.entry(net) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.net_ordering.push(net);
                e.insert(NetData::new(
                    &self.cell,
                    net,
                    None,
                    self.config.global_threshold,
                ))
            }
        };
        if create_state && data.state.is_none() {
            data.state = Some(RoutingState::default());
        }
        data
    }
    /// Read-only lookup; `None` when the net has no record yet
    pub fn net_data(&self, net: NetKey) -> Option<&NetData> {
        self.net_datas.get(&net)
    }

    /// Collect the nets crossing `edge` into `nets`: wires leaving a source
    /// tile anchor for a target tile anchor. Returns how many were found.
    pub fn nets_from_edge(&self, edge: EdgeKey, nets: &mut HashSet<NetKey>) -> usize {
        let e = match self.edges.get(edge) {
            Some(e) => e,
            None => return 0,
        };
        let (source, target) = match (self.gcells.get(e.source), self.gcells.get(e.target)) {
            (Some(s), Some(t)) => (s, t),
            _ => return 0,
        };
        let mut count = 0;
        for gc in source.gcontacts() {
            let contact = match self.cell.contact(gc.contact) {
                Some(c) => c,
                None => continue,
            };
            for slave in contact.slaves.iter() {
                if let Some(Component::Segment(seg)) = self.cell.comp(*slave) {
                    if seg.dir == e.dir()
                        && seg.source == gc.contact
                        && target.has_gcontact(seg.target)
                    {
                        nets.insert(seg.net());
                        count += 1;
                    }
                }
            }
        }
        count
    }

    // ------------------------------------------------------------------
    // Topology primitives, reached through [Session]

    /// The tile-local anchor for `net` on `gcell`
    pub(crate) fn gcontact(&mut self, gcell: GCellKey, net: NetKey) -> Option<CompKey> {
        let g = self.gcells.get_mut(gcell)?;
        let contact = g.gcontact(&mut self.cell, net);
        self.touched_gcells.push(gcell);
        Some(contact)
    }

    /// Create a wire on the mesh between anchors `source` and `target`,
    /// registering it on every edge it crosses. Anchors are swapped when
    /// needed so wires always run West-to-East or South-to-North.
    pub(crate) fn create_wire(
        &mut self,
        source: CompKey,
        target: CompKey,
        dir: Dir,
    ) -> RouteResult<CompKey> {
        let (mut source, mut target) = (source, target);
        let (mut spos, mut tpos) = match (self.cell.position(source), self.cell.position(target)) {
            (Some(s), Some(t)) => (s, t),
            _ => return RouteError::fail("Engine::create_wire(): anchor is not a contact or pad"),
        };
        let net = match (self.cell.comp(source), self.cell.comp(target)) {
            (Some(s), Some(t)) if s.net() == t.net() => s.net(),
            _ => return RouteError::fail("Engine::create_wire(): anchors on different nets"),
        };
        if spos.coord(dir) > tpos.coord(dir) {
            std::mem::swap(&mut source, &mut target);
            std::mem::swap(&mut spos, &mut tpos);
        }
        let axis = match dir {
            Dir::Horiz => spos.y,
            Dir::Vert => spos.x,
        };
        let under = self.gcells_under_points(
            endpoint(spos, dir, axis),
            endpoint(tpos, dir, axis),
            dir,
        );
        if under.is_empty() {
            return RouteError::fail("Engine::create_wire(): wire is outside the mesh");
        }
        let width = self.config.extension_cap * 2;
        let segment = self.cell.new_segment(net, dir, axis, width, source, target);
        for element in under.elements() {
            if let Some(key) = element.edge {
                if let Some(edge) = self.edges.get_mut(key) {
                    edge.add(segment, axis);
                }
            }
            self.touched_gcells.push(element.gcell);
        }
        self.touched_nets.push(net);
        Ok(segment)
    }

    /// Split `segment` at tile `break_gcell`.
    ///
    /// The tile's per-net anchor becomes the new joint: the wire is
    /// retargeted onto it and a second wire of the same kind continues to
    /// the original target, taking over the edges past the break tile.
    /// A wire not crossing `break_gcell` is an error; the anchor is still
    /// returned, unsplit.
    pub(crate) fn break_at(
        &mut self,
        segment: CompKey,
        break_gcell: GCellKey,
    ) -> RouteResult<CompKey> {
        let (net, dir, axis, width, old_target) = match self.cell.segment(segment) {
            Some(seg) => (seg.net(), seg.dir, seg.axis, seg.width, seg.target),
            None => {
                return Err(RouteError::unsupported(format!(
                    "Engine::break_at(): {:?} is not a horizontal or vertical wire",
                    segment
                )))
            }
        };
        let under = self.gcells_under(segment);
        let mut at = 0;
        while at < under.len() {
            if under.gcell_at(at) == break_gcell {
                break;
            }
            at += 1;
        }

        let break_contact = match self.gcontact(break_gcell, net) {
            Some(c) => c,
            None => return RouteError::fail("Engine::break_at(): stale break tile"),
        };

        if at == under.len() {
            log::error!(
                "Engine::break_at(): {:?} is *not* over {:?}",
                segment,
                break_gcell
            );
            return Ok(break_contact);
        }

        self.cell.retarget(segment, break_contact);
        let splitted = self
            .cell
            .new_segment(net, dir, axis, width, break_contact, old_target);
        for j in at..under.len().saturating_sub(1) {
            if let Some(key) = under.edge_at(j) {
                if let Some(edge) = self.edges.get_mut(key) {
                    edge.replace(segment, splitted);
                }
            }
        }

        self.invalidate_segment(segment);
        self.invalidate_contact(break_contact);
        self.invalidate_contact(old_target);
        for element in under.elements() {
            self.touched_gcells.push(element.gcell);
        }
        self.touched_nets.push(net);
        Ok(break_contact)
    }

    /// Merge the two same-direction wires meeting at `contact` into one,
    /// then release the anchor. Returns `true` only when a merge actually
    /// happened: anything else depending on the anchor, fewer than two
    /// same-direction wires, or an empty merged-axis interval over the
    /// crossed tiles all abort with `false`.
    pub(crate) fn unify(&mut self, contact: CompKey) -> bool {
        let slaves = match self.cell.contact(contact) {
            Some(c) => c.slaves.clone(),
            None => return false,
        };
        let mut horizontals: Vec<CompKey> = Vec::new();
        let mut verticals: Vec<CompKey> = Vec::new();
        for slave in slaves {
            match self.cell.comp(slave) {
                Some(Component::Segment(seg)) if seg.dir == Dir::Horiz => {
                    if !verticals.is_empty() || horizontals.len() > 1 {
                        return false;
                    }
                    horizontals.push(slave);
                }
                Some(Component::Segment(_)) => {
                    if !horizontals.is_empty() || verticals.len() > 1 {
                        return false;
                    }
                    verticals.push(slave);
                }
                _ => {
                    // Something else depends on this anchor
                    return false;
                }
            }
        }

        let mut merged = false;
        if horizontals.len() == 2 {
            if !self.merge_pair(contact, horizontals, Dir::Horiz) {
                return false;
            }
            merged = true;
        }
        if verticals.len() == 2 {
            if !self.merge_pair(contact, verticals, Dir::Vert) {
                return false;
            }
            merged = true;
        }
        if !merged {
            return false;
        }

        if let Some(position) = self.cell.position(contact) {
            if let Some(home) = self.gcell_under(position) {
                if self.unref_at(home, contact) {
                    self.unlink_contact(contact);
                }
                self.touched_gcells.push(home);
            }
        }
        true
    }
    /// The merge half of [Engine::unify]: `pair` are the two wires of
    /// direction `dir` meeting at `contact`.
    fn merge_pair(&mut self, contact: CompKey, mut pair: Vec<CompKey>, dir: Dir) -> bool {
        // pair[0] must be the incoming wire, ending at the anchor
        let ends_here = self
            .cell
            .segment(pair[0])
            .map(|s| s.target == contact)
            .unwrap_or(false);
        if !ends_here {
            pair.swap(0, 1);
        }
        let (kept, removed) = (pair[0], pair[1]);

        let mut constraints = Interval::full();
        let under0 = self.gcells_under(kept);
        for element in under0.elements() {
            if let Some(g) = self.gcells.get(element.gcell) {
                constraints.intersect(&g.side(dir.other()));
            }
        }
        let under1 = self.gcells_under(removed);
        for element in under1.elements() {
            if let Some(g) = self.gcells.get(element.gcell) {
                constraints.intersect(&g.side(dir.other()));
                if constraints.is_empty() {
                    return false;
                }
            }
        }

        for j in 0..under1.len().saturating_sub(1) {
            if let Some(key) = under1.edge_at(j) {
                if let Some(edge) = self.edges.get_mut(key) {
                    edge.replace(removed, kept);
                }
            }
        }

        let (far_target, net) = match self.cell.segment(removed) {
            Some(seg) => (seg.target, seg.net()),
            None => return false,
        };
        self.unlink_segment(removed);
        self.cell.destroy_segment(removed);
        self.cell.retarget(kept, far_target);
        self.invalidate_segment(kept);
        self.invalidate_contact(far_target);
        for element in under1.elements() {
            self.touched_gcells.push(element.gcell);
        }
        self.touched_nets.push(net);
        true
    }

    /// Remove `seed` from the mesh, optionally propagating outward through
    /// degree-2 anchors until hitting a terminal or a branch. Surviving
    /// boundary anchors get a [Engine::unify] pass; the net drops back to
    /// un-routed.
    pub(crate) fn ripup(&mut self, seed: CompKey, flags: Propagation) {
        let (net, seed_source, seed_target) = match self.cell.segment(seed) {
            Some(seg) => (seg.net(), seg.source, seg.target),
            None => {
                log::error!("Engine::ripup(): {:?} is not a wire segment", seed);
                return;
            }
        };
        log::debug!("Engine::ripup(): {:?}", seed);

        let mut end0: Option<CompKey> = None;
        let mut end1: Option<CompKey> = None;
        let mut ripups: Vec<CompKey> = vec![seed];
        let mut stack: Vec<(CompKey, CompKey)> = Vec::new();
        if flags == Propagation::Propagate {
            stack.push((seed, seed_source));
            stack.push((seed, seed_target));
        }

        while let Some((from, anchor)) = stack.pop() {
            let ring = match self.cell.contact(anchor) {
                Some(c) => c.slaves.clone(),
                None => continue,
            };
            let mut connected: Option<CompKey> = None;
            let mut slave_count = 0;
            for linked in ring {
                if linked == from {
                    continue;
                }
                match self.cell.comp(linked) {
                    Some(Component::Pad(_)) => slave_count += 1,
                    Some(Component::Segment(_)) => {
                        connected = Some(linked);
                        slave_count += 1;
                    }
                    _ => (),
                }
            }
            match connected {
                Some(next) if slave_count == 1 => {
                    if let Some(seg) = self.cell.segment(next) {
                        stack.push((next, seg.opposite(anchor)));
                        ripups.push(next);
                    }
                }
                _ => {
                    if end0.is_none() {
                        end0 = Some(anchor);
                    } else {
                        end1 = Some(anchor);
                    }
                }
            }
        }

        for segment in ripups {
            let under = self.gcells_under(segment);
            for j in 0..under.len().saturating_sub(1) {
                if let Some(key) = under.edge_at(j) {
                    if let Some(edge) = self.edges.get_mut(key) {
                        edge.remove(segment);
                    }
                }
            }
            let (source, target) = match self.cell.segment(segment) {
                Some(seg) => (seg.source, seg.target),
                None => continue,
            };
            self.unlink_segment(segment);
            self.cell.destroy_segment(segment);

            if !under.is_empty() {
                let deleted_source = self.unref_at(under.gcell_at(0), source);
                let deleted_target = self.unref_at(under.gcell_at(under.len() - 1), target);
                if deleted_source {
                    self.unlink_contact(source);
                    if end0 == Some(source) {
                        end0 = None;
                    }
                    if end1 == Some(source) {
                        end1 = None;
                    }
                }
                if deleted_target {
                    self.unlink_contact(target);
                    if end0 == Some(target) {
                        end0 = None;
                    }
                    if end1 == Some(target) {
                        end1 = None;
                    }
                }
                for element in under.elements() {
                    self.touched_gcells.push(element.gcell);
                }
            }
        }

        if let Some(end) = end0 {
            self.unify(end);
        }
        if let Some(end) = end1 {
            self.unify(end);
        }

        self.net_data_mut(net, false).global_routed = false;
        self.touched_nets.push(net);
    }
    /// Release one reference on `anchor` from tile `gcell`; see
    /// [GCell::unref_contact]
    fn unref_at(&mut self, gcell: GCellKey, anchor: CompKey) -> bool {
        match self.gcells.get_mut(gcell) {
            Some(g) => g.unref_contact(&mut self.cell, anchor),
            None => false,
        }
    }

    /// Rerun topology updates on every anchor of `net` whose cache has been
    /// invalidated, in component-collection order.
    pub(crate) fn update_net_topology(&mut self, net: NetKey) {
        let comps = match self.cell.net(net) {
            Some(n) => n.components.clone(),
            None => return,
        };
        let mut stale: Vec<CompKey> = Vec::new();
        for key in comps {
            if let Some(auto) = self.auto_contacts.get(&key) {
                if auto.invalidated_cache {
                    stale.push(key);
                }
            }
        }
        for key in stale {
            self.update_contact_topology(key);
        }
    }
    /// Recompute the terminal markers of `net`'s invalidated wires: a wire
    /// is terminal when either anchor is a routing pad, or a contact with a
    /// pad on its ring.
    pub(crate) fn compute_net_terminals(&mut self, net: NetKey) {
        let comps = match self.cell.net(net) {
            Some(n) => n.components.clone(),
            None => return,
        };
        for key in comps {
            let stale = self
                .auto_segments
                .get(&key)
                .map(|a| a.invalidated)
                .unwrap_or(false);
            if !stale {
                continue;
            }
            let terminal = self
                .cell
                .segment(key)
                .map(|seg| {
                    self.anchors_pad(seg.source) || self.anchors_pad(seg.target)
                })
                .unwrap_or(false);
            if let Some(auto) = self.auto_segments.get_mut(&key) {
                auto.terminal = terminal;
            }
        }
    }
    fn anchors_pad(&self, anchor: CompKey) -> bool {
        match self.cell.comp(anchor) {
            Some(Component::Pad(_)) => true,
            Some(Component::Contact(c)) => c
                .slaves
                .iter()
                .any(|s| matches!(self.cell.comp(*s), Some(Component::Pad(_)))),
            _ => false,
        }
    }

    /// Refresh one anchor: tile anchors are re-centered on their tile, and
    /// the invalidation mark is cleared.
    fn update_contact_topology(&mut self, contact: CompKey) {
        if let Some(position) = self.cell.position(contact) {
            if let Some(home) = self.gcell_under(position) {
                if let Some(g) = self.gcells.get(home) {
                    if g.has_gcontact(contact) {
                        self.cell.move_contact(contact, g.bbox.center());
                    }
                }
            }
        }
        if let Some(auto) = self.auto_contacts.get_mut(&contact) {
            auto.invalidated_cache = false;
        }
    }

    // ------------------------------------------------------------------
    // Global-routing load & teardown

    /// Drop the transient per-tile artifacts of global routing, tile by tile
    pub fn cleanup_global(&mut self) {
        let keys: Vec<GCellKey> = self.gcells.keys().collect();
        for key in keys {
            let destroyed = match self.gcells.get_mut(key) {
                Some(g) => g.cleanup_global(&mut self.cell),
                None => continue,
            };
            for contact in destroyed {
                self.unlink_contact(contact);
            }
        }
    }

    /// Materialize auto-wrappers over the global topology handed in by the
    /// router. Legal exactly once, at [EngineState::GlobalLoaded].
    pub fn load_global_routing(&mut self, method: LoadMethod) -> RouteResult<()> {
        if self.state < EngineState::GlobalLoaded {
            return Err(RouteError::state(
                "Engine::load_global_routing(): global routing not present yet",
            ));
        }
        if self.state > EngineState::GlobalLoaded {
            return Err(RouteError::state(
                "Engine::load_global_routing(): global routing already loaded",
            ));
        }
        match method {
            LoadMethod::ByNet => self.load_gr_by_net(),
            _ => {
                return Err(RouteError::unsupported(format!(
                    "Engine::load_global_routing(): no method {:?} (cell {})",
                    method, self.cell.name
                )))
            }
        }
        self.cleanup_global();
        self.state = EngineState::Active;
        Ok(())
    }
    /// The canonical per-net load: wrap every wire and anchor, weaving
    /// collinear coplanar wires into shared alignment groups.
    fn load_gr_by_net(&mut self) {
        let nets: Vec<NetKey> = if self.net_ordering.is_empty() {
            self.cell.nets().collect()
        } else {
            self.net_ordering.clone()
        };
        for net in nets {
            if net == self.blockage_net {
                continue;
            }
            let comps = match self.cell.net(net) {
                Some(n) => n.components.clone(),
                None => continue,
            };
            let mut groups: HashMap<(Dir, i64), u32> = HashMap::new();
            let mut wired = false;
            for key in comps {
                if let Some((dir, axis)) = self.cell.segment(key).map(|s| (s.dir, s.axis.raw())) {
                    self.link_segment(key);
                    let group = *groups.entry((dir, axis)).or_insert_with(|| {
                        let g = self.next_align_group;
                        self.next_align_group += 1;
                        g
                    });
                    if let Some(auto) = self.auto_segments.get_mut(&key) {
                        auto.align_group = Some(group);
                    }
                    wired = true;
                } else if self.cell.contact(key).is_some() {
                    self.link_contact(key);
                }
            }
            if wired {
                self.net_data_mut(net, false).global_routed = true;
            }
        }
    }

    /// Drive the geometric database: destroy every wrapper, writing back the
    /// refined geometry it encodes, then tear down the mesh. Idempotent at
    /// [EngineState::Driving] and above.
    pub fn finalize_layout(&mut self) -> RouteResult<()> {
        if self.state > EngineState::Driving {
            return Ok(());
        }
        self.state = EngineState::Driving;
        self.start_measures();
        self.gut();
        self.stop_measures();
        self.print_measures("finalize");
        self.state = EngineState::Gutted;
        Ok(())
    }

    /// Tear down wrappers and mesh. Safe from both [Engine::finalize_layout]
    /// (at Driving) and [Engine::reset] (at or below Active); a second call
    /// is a no-op.
    fn gut(&mut self) {
        self.flags.destroy_base_contact = false;

        if self.state == EngineState::Driving {
            let mut fixed = 0usize;
            let mut doglegs = 0usize;
            let mut terminals = 0usize;
            for auto in self.auto_segments.values() {
                if auto.fixed {
                    fixed += 1;
                }
                if auto.reduce_dogleg_layer() {
                    doglegs += 1;
                }
                if auto.terminal {
                    terminals += 1;
                }
            }
            let segments = self.auto_segments.len();
            let contacts = self.auto_contacts.len();
            log::info!("Driving the geometric database");
            log::info!("  - Active AutoSegments := {}", segments - fixed);
            log::info!(
                "  - Active AutoContacts := {}",
                contacts.saturating_sub(fixed * 2)
            );
            log::info!("  - AutoSegments        := {}", segments);
            log::info!("  - AutoContacts        := {}", contacts);
            log::info!("  - Same-layer doglegs  := {}", doglegs);
            log::info!("  - Terminal wires      := {}", terminals);
        }

        if self.state < EngineState::Gutted {
            self.state = EngineState::Gutted;
            self.flags.destroy_base_contact = true;

            self.destroy_auto_segments();
            self.destroy_auto_contacts();

            let keys: Vec<GCellKey> = self.gcells.keys().collect();
            for key in keys {
                if let Some(g) = self.gcells.get_mut(key) {
                    if self.flags.destroy_base_contact {
                        g.cleanup_global(&mut self.cell);
                    }
                    g.clear_edges();
                }
            }
            self.edges.clear();
            self.gcells.clear();
            self.ov_edges.clear();
            self.matrix.clear();
            self.touched_gcells.clear();
            self.touched_nets.clear();
        }
    }
    fn destroy_auto_segments(&mut self) {
        if self.state == EngineState::Driving {
            log::info!("  - Expandeds           := {}", self.auto_segments.len());
        }
        self.auto_segments.clear();
    }
    fn destroy_auto_contacts(&mut self) {
        self.auto_contacts.clear();
    }

    /// Final teardown ahead of dropping the engine. Guts whatever is left;
    /// harmless after [Engine::finalize_layout].
    pub fn destroy(&mut self) {
        if self.state < EngineState::Gutted {
            self.state = EngineState::PreDestroying;
        }
        self.gut();
        self.state = EngineState::Gutted;
    }

    /// Gut and re-create the root tile, returning to [EngineState::Creation]
    pub fn reset(&mut self) -> RouteResult<()> {
        self.gut();
        self.flags = EngineFlags::default();
        self.state = EngineState::Creation;
        self.gcells.insert(GCell::new(self.cell.abutment));
        self.update_matrix();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Densities & overflow

    /// Recompute every tile's density cache
    pub fn update_density(&mut self) {
        let keys: Vec<GCellKey> = self.gcells.keys().collect();
        let mode = self.config.density_mode;
        for key in keys {
            let arena = &self.edges;
            if let Some(g) = self.gcells.get_mut(key) {
                g.update_density(arena, mode);
            }
        }
    }
    /// Refresh every tile's saturation cache; returns the saturated count
    pub fn check_gcell_densities(&mut self) -> usize {
        let keys: Vec<GCellKey> = self.gcells.keys().collect();
        let mode = self.config.density_mode;
        let ratio = self.config.saturate_ratio;
        let mut saturateds = 0;
        for key in keys {
            let arena = &self.edges;
            if let Some(g) = self.gcells.get_mut(key) {
                saturateds += g.check_density(arena, mode, ratio);
            }
        }
        saturateds
    }
    /// Recompute density caches on the given tiles; the session-close half
    /// of tile revalidation
    pub(crate) fn revalidate_gcells(&mut self, keys: &[GCellKey]) {
        let mode = self.config.density_mode;
        for key in keys {
            let arena = &self.edges;
            if let Some(g) = self.gcells.get_mut(*key) {
                g.update_density(arena, mode);
            }
        }
    }
    /// Re-derive the overflowed-edge set from scratch
    pub(crate) fn rebuild_ov_edges(&mut self) {
        self.ov_edges.clear();
        for (key, edge) in self.edges.iter() {
            if edge.is_overflowed() {
                self.ov_edges.insert(key);
            }
        }
        if !self.ov_edges.is_empty() {
            log::warn!(
                "Engine: {} overflowed edge(s) after session close",
                self.ov_edges.len()
            );
        }
    }

    // ------------------------------------------------------------------
    // Auto-wrapper lookup tables

    /// The wrapper over wire `base`, if linked
    pub fn lookup_segment(&self, base: CompKey) -> Option<&AutoSegment> {
        self.auto_segments.get(&base)
    }
    /// The wrapper over anchor `base`, if linked
    pub fn lookup_contact(&self, base: CompKey) -> Option<&AutoContact> {
        self.auto_contacts.get(&base)
    }
    pub(crate) fn link_segment(&mut self, base: CompKey) {
        if self.state > EngineState::Active {
            return;
        }
        if let Some(seg) = self.cell.segment(base) {
            let id = seg.id();
            self.auto_segments
                .entry(base)
                .or_insert_with(|| AutoSegment::new(base, id));
        }
    }
    pub(crate) fn unlink_segment(&mut self, base: CompKey) {
        if self.state > EngineState::Driving {
            return;
        }
        self.auto_segments.remove(&base);
    }
    pub(crate) fn link_contact(&mut self, base: CompKey) {
        if self.state > EngineState::Active {
            return;
        }
        if let Some(c) = self.cell.contact(base) {
            let id = c.id();
            self.auto_contacts
                .entry(base)
                .or_insert_with(|| AutoContact::new(base, id));
        }
    }
    pub(crate) fn unlink_contact(&mut self, base: CompKey) {
        if self.state > EngineState::Active {
            return;
        }
        self.auto_contacts.remove(&base);
    }
    pub(crate) fn invalidate_segment(&mut self, base: CompKey) {
        if let Some(auto) = self.auto_segments.get_mut(&base) {
            auto.invalidate();
        }
    }
    pub(crate) fn invalidate_contact(&mut self, base: CompKey) {
        if let Some(auto) = self.auto_contacts.get_mut(&base) {
            auto.invalidate();
        }
    }
    /// Pin the wrapped wire in place. Router-set; counted in the finalize
    /// report and meant to exclude the wire from later re-routing passes.
    pub(crate) fn set_fixed(&mut self, base: CompKey) {
        let net = self.cell.segment(base).map(|s| s.net());
        if let Some(auto) = self.auto_segments.get_mut(&base) {
            auto.fixed = true;
            auto.invalidate();
        }
        if let Some(net) = net {
            self.touched_nets.push(net);
        }
    }
    /// Mark the wrapped wire as a same-layer dogleg the drive phase may
    /// flatten. Router-set; counted in the finalize report.
    pub(crate) fn set_reduces_dogleg(&mut self, base: CompKey) {
        let net = self.cell.segment(base).map(|s| s.net());
        if let Some(auto) = self.auto_segments.get_mut(&base) {
            auto.reduces_dogleg_layer = true;
            auto.invalidate();
        }
        if let Some(net) = net {
            self.touched_nets.push(net);
        }
    }

    /// Re-align every alignment group of `net` onto its leader's axis.
    /// Chunks are processed in wrapper-id order for determinism.
    pub(crate) fn alignate(&mut self, net: NetKey) {
        let comps = match self.cell.net(net) {
            Some(n) => n.components.clone(),
            None => return,
        };
        let mut seeds: Vec<(u64, CompKey)> = comps
            .iter()
            .filter_map(|key| self.auto_segments.get(key).map(|a| (a.id(), *key)))
            .collect();
        seeds.sort();

        let mut explored: HashSet<CompKey> = HashSet::new();
        for (seed_id, seed) in seeds {
            if explored.contains(&seed) {
                continue;
            }
            let group = self.auto_segments.get(&seed).and_then(|a| a.align_group);
            let mut chunk: Vec<(u64, CompKey)> = vec![(seed_id, seed)];
            if let Some(group) = group {
                for (key, auto) in self.auto_segments.iter() {
                    if *key != seed && auto.align_group == Some(group) {
                        chunk.push((auto.id(), *key));
                    }
                }
            }
            chunk.sort();
            let axis = match self.cell.segment(chunk[0].1) {
                Some(seg) => seg.axis,
                None => continue,
            };
            for (_, base) in chunk {
                self.cell.set_segment_axis(base, axis);
                if let Some(auto) = self.auto_segments.get_mut(&base) {
                    auto.revalidate();
                }
                explored.insert(base);
            }
        }
    }

    // ------------------------------------------------------------------
    // Measures

    pub fn start_measures(&mut self) {
        self.measures.start();
    }
    pub fn stop_measures(&mut self) {
        self.measures.stop();
    }
    pub fn suspend_measures(&mut self) {
        self.measures.suspend();
    }
    pub fn resume_measures(&mut self) {
        self.measures.resume();
    }
    pub fn print_measures(&self, tag: &str) {
        log::info!(
            "  - Done in {:.3}s ({})",
            self.measures.elapsed().as_secs_f64(),
            tag
        );
    }

    // ------------------------------------------------------------------
    // Introspection

    /// Walk `net`'s wires and check the topology of both wrapper anchors of
    /// every wrapped wire. Returns overall coherency.
    pub fn check_net(&self, net: NetKey) -> bool {
        let comps = match self.cell.net(net) {
            Some(n) => &n.components,
            None => return true,
        };
        let mut coherency = true;
        for key in comps.iter() {
            if let Some(Component::Segment(seg)) = self.cell.comp(*key) {
                if self.auto_segments.contains_key(key) {
                    for anchor in [seg.source, seg.target] {
                        if self.auto_contacts.contains_key(&anchor) {
                            coherency = self.check_contact_topology(anchor) && coherency;
                        }
                    }
                }
            }
        }
        coherency
    }
    /// Full-database coherency sweep. `message` labels the report.
    pub fn check(&self, message: Option<&str>) -> bool {
        if let Some(message) = message {
            log::info!("Checking engine coherency ({})", message);
        }
        let mut coherency = true;
        for (base, auto) in self.auto_segments.iter() {
            if auto.base() != *base || self.cell.segment(*base).is_none() {
                log::error!("Engine::check(): stale wire wrapper {:?}", base);
                coherency = false;
            }
        }
        for (_, gcell) in self.gcells.iter() {
            for gc in gcell.gcontacts() {
                coherency = self.check_contact_topology(gc.contact) && coherency;
            }
        }
        if message.is_some() {
            log::info!("  - completed");
        }
        coherency
    }
    /// One anchor's ring coherency: every slave exists and shares the net
    fn check_contact_topology(&self, contact: CompKey) -> bool {
        let c = match self.cell.contact(contact) {
            Some(c) => c,
            None => {
                log::error!("Engine::check_contact_topology(): stale anchor {:?}", contact);
                return false;
            }
        };
        let mut coherency = true;
        for slave in c.slaves.iter() {
            match self.cell.comp(*slave) {
                Some(comp) if comp.net() == c.net() => (),
                Some(_) => {
                    log::error!(
                        "Engine::check_contact_topology(): {:?} rings a foreign-net slave {:?}",
                        contact,
                        slave
                    );
                    coherency = false;
                }
                None => {
                    log::error!(
                        "Engine::check_contact_topology(): {:?} rings a stale slave {:?}",
                        contact,
                        slave
                    );
                    coherency = false;
                }
            }
        }
        coherency
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "<Engine {} state={:?} gcells={} edges={}>",
            self.cell.name,
            self.state,
            self.gcells.len(),
            self.edges.len()
        )
    }
}

/// Overlay `axis` onto `p` in the off-`dir` coordinate
fn endpoint(p: Point, dir: Dir, axis: DbUnits) -> Point {
    match dir {
        Dir::Horiz => Point::new(p.x, axis),
        Dir::Vert => Point::new(axis, p.y),
    }
}

fn intersect(a: Interval, b: Interval) -> Interval {
    let mut a = a;
    a.intersect(&b);
    a
}
