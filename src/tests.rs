//!
//! # Unit Tests
//!
//! Scenario tests over the sample mesh: a 10x10 grid of 100-unit tiles with
//! one horizontal and one vertical default layer at track pitch 20.
//!

use std::collections::HashSet;

use crate::config::Config;
use crate::db::Cell;
use crate::engine::{Engine, EngineState, LoadMethod, Propagation};
use crate::error::{RouteError, RouteResult};
use crate::gauge::{LayerGauge, LayerKind, RoutingGauge};
use crate::geom::{BoundBox, Dir, Interval, Point};
use crate::units::DbUnits;
use crate::{CompKey, GCellKey, NetKey};

/// # Sample Meshes
/// Namespace for commonly re-used engine setups for testing.
pub struct SampleMesh;

impl SampleMesh {
    /// One horizontal and one vertical default layer, both at pitch 20
    pub fn gauge() -> RoutingGauge {
        RoutingGauge::new("sample")
            .add(LayerGauge::new(
                "metal2",
                0,
                Dir::Horiz,
                LayerKind::Default,
                20,
            ))
            .add(LayerGauge::new(
                "metal3",
                0,
                Dir::Vert,
                LayerKind::Default,
                20,
            ))
    }
    /// A 1000x1000 die at the origin
    pub fn cell() -> Cell {
        Cell::new("top", BoundBox::new(0, 0, 1000, 1000))
    }
    /// Engine over `cell` with the sample gauge and a 100-unit slice,
    /// gridded into 10x10 tiles.
    pub fn engine(cell: Cell) -> RouteResult<Engine> {
        let mut engine = Engine::create(cell, Config::new(Self::gauge(), 100))?;
        engine.setup_grid()?;
        Ok(engine)
    }
    /// The tile at grid position (i, j)
    pub fn tile(engine: &Engine, i: i64, j: i64) -> GCellKey {
        engine
            .gcell_under(Point::new(i * 100 + 50, j * 100 + 50))
            .expect("tile lookup in sample mesh")
    }
}

fn segments_of(engine: &Engine, net: NetKey) -> Vec<CompKey> {
    engine
        .cell()
        .net(net)
        .map(|n| {
            n.components
                .iter()
                .copied()
                .filter(|k| engine.cell().segment(*k).is_some())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn grid_edge_invariants() -> RouteResult<()> {
    let engine = SampleMesh::engine(SampleMesh::cell())?;
    assert_eq!(engine.gcells().len(), 100);
    // 90 east + 90 north adjacencies
    assert_eq!(engine.edges().len(), 180);
    for (key, edge) in engine.edges().iter() {
        let source = &engine.gcells()[edge.source];
        let target = &engine.gcells()[edge.target];
        assert!(source.edges(edge.side).contains(&key));
        assert!(target.edges(edge.side.opposite()).contains(&key));
        assert_eq!(edge.load(), edge.segments().count());
        // One default layer at pitch 20 over a 100-unit shared side
        assert_eq!(edge.capacity, 5);
    }
    Ok(())
}

#[test]
fn single_tile_segment() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(30, 50));
    let c1 = cell.new_contact(n1, Point::new(70, 50));
    let mut engine = SampleMesh::engine(cell)?;
    let t00 = SampleMesh::tile(&engine, 0, 0);

    let mut session = engine.open_session();
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    let under = engine.gcells_under(seg);
    assert_eq!(under.len(), 1);
    assert_eq!(under.gcell_at(0), t00);
    assert_eq!(under.edge_at(0), None);
    for (_, edge) in engine.edges().iter() {
        assert_eq!(edge.load(), 0);
    }
    Ok(())
}

#[test]
fn cross_tile_segment() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(50, 50));
    let c1 = cell.new_contact(n1, Point::new(250, 50));
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t10, t20) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 1, 0),
        SampleMesh::tile(&engine, 2, 0),
    );

    let mut session = engine.open_session();
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    let under = engine.gcells_under(seg);
    assert_eq!(under.len(), 3);
    assert_eq!(
        (under.gcell_at(0), under.gcell_at(1), under.gcell_at(2)),
        (t00, t10, t20)
    );
    let e01 = under.edge_at(0).expect("edge out of tile(0,0)");
    let e12 = under.edge_at(1).expect("edge out of tile(1,0)");
    assert_eq!(under.edge_at(2), None);
    assert_eq!(engine.edges()[e01].load(), 1);
    assert_eq!(engine.edges()[e12].load(), 1);
    assert_eq!(engine.edges()[e01].axis, DbUnits(100));
    assert!(engine.edges()[e01].span.contains(50));
    // No other edge was loaded
    let loaded = engine
        .edges()
        .iter()
        .filter(|(_, e)| e.load() > 0)
        .count();
    assert_eq!(loaded, 2);
    Ok(())
}

#[test]
fn break_and_reunify() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(50, 50));
    let c1 = cell.new_contact(n1, Point::new(250, 50));
    let mut engine = SampleMesh::engine(cell)?;
    let t10 = SampleMesh::tile(&engine, 1, 0);

    let mut session = engine.open_session();
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();
    let under = engine.gcells_under(seg);
    let e01 = under.edge_at(0).expect("edge out of tile(0,0)");
    let e12 = under.edge_at(1).expect("edge out of tile(1,0)");

    let mut session = engine.open_session();
    let joint = session.break_at(seg, t10)?;
    session.close();

    // The original wire keeps the first edge; the new one carries the rest
    assert!(engine.edges()[e01].has(seg));
    assert_eq!(engine.edges()[e01].load(), 1);
    assert!(!engine.edges()[e12].has(seg));
    assert_eq!(engine.edges()[e12].load(), 1);
    let splitted = engine.edges()[e12].segments().next().expect("split wire");
    assert_eq!(
        engine.cell().contact(joint).map(|c| c.position),
        Some(Point::new(150, 50))
    );
    assert!(engine.gcells()[t10].has_gcontact(joint));
    assert_eq!(engine.cell().segment(seg).map(|s| s.target), Some(joint));
    assert_eq!(
        engine.cell().segment(splitted).map(|s| (s.source, s.target)),
        Some((joint, c1))
    );
    assert_eq!(engine.cell().segment(splitted).map(|s| s.axis), Some(DbUnits(50)));

    // Reunify: the split wire folds back into the original
    let mut session = engine.open_session();
    assert!(session.unify(joint));
    session.close();

    assert!(engine.cell().contact(joint).is_none());
    assert!(!engine.gcells()[t10].has_gcontact(joint));
    assert!(engine.cell().segment(splitted).is_none());
    assert_eq!(engine.cell().segment(seg).map(|s| s.target), Some(c1));
    assert_eq!(engine.cell().segment(seg).map(|s| s.axis), Some(DbUnits(50)));
    assert!(engine.edges()[e01].has(seg));
    assert!(engine.edges()[e12].has(seg));
    assert_eq!(engine.edges()[e01].load(), 1);
    assert_eq!(engine.edges()[e12].load(), 1);

    // An anchor with a single wire has nothing to merge
    let mut session = engine.open_session();
    assert!(!session.unify(c1));
    session.close();
    assert!(engine.cell().contact(c1).is_some());
    Ok(())
}

#[test]
fn ripup_with_propagation() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n2 = cell.add_net("n2");
    let pad1 = cell.new_pad(n2, BoundBox::new(40, 40, 60, 60));
    let pad2 = cell.new_pad(n2, BoundBox::new(540, 240, 560, 260));
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t30, t32, t52) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 3, 0),
        SampleMesh::tile(&engine, 3, 2),
        SampleMesh::tile(&engine, 5, 2),
    );

    // H-V-H staircase between two terminal pads
    let mut session = engine.open_session();
    let tc1 = session.gcontact(t00, n2).expect("gcontact");
    let c1 = session.gcontact(t30, n2).expect("gcontact");
    let c2 = session.gcontact(t32, n2).expect("gcontact");
    let tc2 = session.gcontact(t52, n2).expect("gcontact");
    session.attach_pad(tc1, pad1);
    session.attach_pad(tc2, pad2);
    session.create_wire(tc1, c1, Dir::Horiz)?;
    let middle = session.create_wire(c1, c2, Dir::Vert)?;
    session.create_wire(c2, tc2, Dir::Horiz)?;
    session.close();
    assert_eq!(segments_of(&engine, n2).len(), 3);

    let mut session = engine.open_session();
    session.ripup(middle, Propagation::Propagate);
    session.close();

    assert_eq!(segments_of(&engine, n2).len(), 0);
    // Terminal anchors survive on their pads; internal anchors are gone
    assert!(engine.cell().contact(tc1).is_some());
    assert!(engine.cell().contact(tc2).is_some());
    assert!(engine.cell().contact(c1).is_none());
    assert!(engine.cell().contact(c2).is_none());
    assert_eq!(engine.net_data(n2).map(|d| d.global_routed), Some(false));
    for (_, edge) in engine.edges().iter() {
        assert_eq!(edge.load(), 0);
    }
    Ok(())
}

#[test]
fn sparsity_ordering() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    // Areas 100, 400, 900; four pads each. Added out of order on purpose.
    let pads = |cell: &mut Cell, net: NetKey, side: i64| {
        cell.new_pad(net, BoundBox::new(0, 0, 1, 1));
        cell.new_pad(net, BoundBox::new(side, 0, side + 1, 1));
        cell.new_pad(net, BoundBox::new(0, side, 1, side + 1));
        cell.new_pad(net, BoundBox::new(side, side, side + 1, side + 1));
    };
    let n_mid = cell.add_net("mid");
    pads(&mut cell, n_mid, 20);
    let n_big = cell.add_net("big");
    pads(&mut cell, n_big, 30);
    let n_small = cell.add_net("small");
    pads(&mut cell, n_small, 10);

    let mut engine = SampleMesh::engine(cell)?;
    engine.setup_net_datas();
    let order: Vec<NetKey> = engine
        .net_ordering()
        .iter()
        .copied()
        .filter(|n| *n == n_small || *n == n_mid || *n == n_big)
        .collect();
    assert_eq!(order, vec![n_small, n_mid, n_big]);
    Ok(())
}

#[test]
fn ordering_is_deterministic() -> RouteResult<()> {
    let build = || -> RouteResult<Vec<String>> {
        let mut cell = SampleMesh::cell();
        for (name, side) in [("a", 25), ("b", 15), ("c", 35), ("d", 15)] {
            let net = cell.add_net(name);
            cell.new_pad(net, BoundBox::new(0, 0, 1, 1));
            cell.new_pad(net, BoundBox::new(side, side, side + 1, side + 1));
        }
        let mut engine = SampleMesh::engine(cell)?;
        engine.setup_net_datas();
        Ok(engine
            .net_ordering()
            .iter()
            .map(|n| engine.cell().net(*n).unwrap().name.clone())
            .collect())
    };
    assert_eq!(build()?, build()?);
    Ok(())
}

#[test]
fn capacity_computation() -> RouteResult<()> {
    let engine = SampleMesh::engine(SampleMesh::cell())?;
    assert_eq!(engine.capacity(Interval::new(0, 200), Dir::Horiz)?, 10);
    assert_eq!(engine.capacity(Interval::new(0, 200), Dir::Vert)?, 10);
    assert_eq!(engine.capacity(Interval::new(0, 100), Dir::Horiz)?, 5);
    // A span emptied by the high-end shrink carries nothing
    assert_eq!(engine.capacity(Interval::new(5, 5), Dir::Horiz)?, 0);
    Ok(())
}

#[test]
fn walk_normalizes_direction() -> RouteResult<()> {
    let engine = SampleMesh::engine(SampleMesh::cell())?;
    let under = engine.gcells_under_points(Point::new(250, 50), Point::new(50, 50), Dir::Horiz);
    assert_eq!(under.len(), 3);
    assert_eq!(under.gcell_at(0), SampleMesh::tile(&engine, 0, 0));
    assert_eq!(under.gcell_at(2), SampleMesh::tile(&engine, 2, 0));
    Ok(())
}

#[test]
fn walk_clamps_exclusive_bound() -> RouteResult<()> {
    let engine = SampleMesh::engine(SampleMesh::cell())?;
    let under = engine.gcells_under_points(Point::new(950, 950), Point::new(1000, 950), Dir::Horiz);
    assert_eq!(under.len(), 1);
    assert_eq!(under.gcell_at(0), SampleMesh::tile(&engine, 9, 9));
    // Entirely outside: empty walk
    let under = engine.gcells_under_points(Point::new(1100, 50), Point::new(1200, 50), Dir::Horiz);
    assert!(under.is_empty());
    Ok(())
}

#[test]
fn break_outside_path_is_rejected() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(50, 50));
    let c1 = cell.new_contact(n1, Point::new(250, 50));
    let mut engine = SampleMesh::engine(cell)?;
    let t05 = SampleMesh::tile(&engine, 0, 5);

    let mut session = engine.open_session();
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    let joint = session.break_at(seg, t05)?;
    session.close();

    // No split happened; the anchor is still handed back
    assert_eq!(engine.cell().segment(seg).map(|s| s.target), Some(c1));
    assert!(engine.gcells()[t05].has_gcontact(joint));
    assert_eq!(segments_of(&engine, n1).len(), 1);

    // And a non-wire seed is an unsupported kind
    let mut session = engine.open_session();
    let err = session.break_at(c0, t05);
    assert!(matches!(err, Err(RouteError::Unsupported(_))));
    session.close();
    Ok(())
}

#[test]
fn unify_rejects_busy_anchors() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let pad = cell.new_pad(n1, BoundBox::new(140, 40, 160, 60));
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t10, t20) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 1, 0),
        SampleMesh::tile(&engine, 2, 0),
    );

    let mut session = engine.open_session();
    let c0 = session.gcontact(t00, n1).expect("gcontact");
    let cm = session.gcontact(t10, n1).expect("gcontact");
    let c1 = session.gcontact(t20, n1).expect("gcontact");
    session.create_wire(c0, cm, Dir::Horiz)?;
    session.create_wire(cm, c1, Dir::Horiz)?;
    session.attach_pad(cm, pad);
    // A pad also hangs on the joint: merging would orphan it
    assert!(!session.unify(cm));
    session.close();
    assert_eq!(segments_of(&engine, n1).len(), 2);
    Ok(())
}

#[test]
fn overflow_tracking() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let mut nets = Vec::new();
    for i in 0..6 {
        let net = cell.add_net(format!("n{}", i));
        let c0 = cell.new_contact(net, Point::new(50, 10 + i * 10));
        let c1 = cell.new_contact(net, Point::new(150, 10 + i * 10));
        nets.push((c0, c1));
    }
    let mut engine = SampleMesh::engine(cell)?;

    let mut session = engine.open_session();
    for (c0, c1) in nets {
        session.create_wire(c0, c1, Dir::Horiz)?;
    }
    session.close();

    // Six wires over a five-track edge
    assert_eq!(engine.ov_edges().len(), 1);
    let ov = *engine.ov_edges().iter().next().unwrap();
    assert_eq!(engine.edges()[ov].load(), 6);
    assert!(engine.edges()[ov].is_overflowed());
    assert!(engine.check_gcell_densities() >= 1);
    Ok(())
}

#[test]
fn load_state_machine() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(50, 50));
    let c1 = cell.new_contact(n1, Point::new(250, 50));
    let mut engine = SampleMesh::engine(cell)?;

    // Too early
    assert!(matches!(
        engine.load_global_routing(LoadMethod::ByNet),
        Err(RouteError::State { .. })
    ));

    let mut session = engine.open_session();
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    engine.set_state(EngineState::GlobalLoaded);
    assert!(matches!(
        engine.load_global_routing(LoadMethod::ByGCell),
        Err(RouteError::Unsupported(_))
    ));
    engine.load_global_routing(LoadMethod::ByNet)?;
    assert_eq!(engine.state(), EngineState::Active);
    assert!(engine.lookup_segment(seg).is_some());
    assert_eq!(engine.net_data(n1).map(|d| d.global_routed), Some(true));

    // Twice is once too many
    assert!(matches!(
        engine.load_global_routing(LoadMethod::ByNet),
        Err(RouteError::State { .. })
    ));
    Ok(())
}

#[test]
fn topology_updates_clear_invalidations() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t20, t40) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 2, 0),
        SampleMesh::tile(&engine, 4, 0),
    );

    let mut session = engine.open_session();
    let c0 = session.gcontact(t00, n1).expect("gcontact");
    let c1 = session.gcontact(t40, n1).expect("gcontact");
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    engine.set_state(EngineState::GlobalLoaded);
    engine.load_global_routing(LoadMethod::ByNet)?;

    let mut session = engine.open_session();
    session.break_at(seg, t20)?;
    session.update_net_topology(n1);
    session.close();

    for key in [c0, c1] {
        if let Some(auto) = engine.lookup_contact(key) {
            assert!(!auto.invalidated_cache);
        }
    }
    assert!(engine.check_net(n1));
    assert!(engine.check(Some("after break")));
    Ok(())
}

#[test]
fn router_marks_and_terminals() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let pad = cell.new_pad(n1, BoundBox::new(40, 40, 60, 60));
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t20) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 2, 0),
    );

    let mut session = engine.open_session();
    let tc = session.gcontact(t00, n1).expect("gcontact");
    let c1 = session.gcontact(t20, n1).expect("gcontact");
    session.attach_pad(tc, pad);
    let seg = session.create_wire(tc, c1, Dir::Horiz)?;
    session.close();

    engine.set_state(EngineState::GlobalLoaded);
    engine.load_global_routing(LoadMethod::ByNet)?;

    let mut session = engine.open_session();
    session.set_fixed(seg);
    session.set_reduces_dogleg(seg);
    session.close();

    let auto = engine.lookup_segment(seg).expect("wrapper");
    assert!(auto.fixed);
    assert!(auto.reduces_dogleg_layer);
    // One end rings a pad, so the close pass marked the wire terminal
    assert!(auto.terminal);

    engine.finalize_layout()?;
    assert_eq!(engine.state(), EngineState::Gutted);
    Ok(())
}

#[test]
fn nets_from_edge_counts_crossers() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let mut engine = SampleMesh::engine(cell)?;
    let (t00, t10) = (
        SampleMesh::tile(&engine, 0, 0),
        SampleMesh::tile(&engine, 1, 0),
    );

    let mut session = engine.open_session();
    let c0 = session.gcontact(t00, n1).expect("gcontact");
    let c1 = session.gcontact(t10, n1).expect("gcontact");
    let seg = session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    let under = engine.gcells_under(seg);
    let e01 = under.edge_at(0).expect("edge out of tile(0,0)");
    let mut nets = HashSet::new();
    assert_eq!(engine.nets_from_edge(e01, &mut nets), 1);
    assert!(nets.contains(&n1));
    Ok(())
}

#[test]
fn update_matrix_is_idempotent() -> RouteResult<()> {
    let mut engine = SampleMesh::engine(SampleMesh::cell())?;
    let probes = [
        Point::new(0, 0),
        Point::new(50, 50),
        Point::new(999, 999),
        Point::new(420, 666),
    ];
    let before: Vec<_> = probes.iter().map(|p| engine.gcell_under(*p)).collect();
    engine.update_matrix();
    engine.update_matrix();
    let after: Vec<_> = probes.iter().map(|p| engine.gcell_under(*p)).collect();
    assert_eq!(before, after);
    assert_eq!(engine.gcell_under(Point::new(1000, 500)), None);
    Ok(())
}

#[test]
fn finalize_and_reset() -> RouteResult<()> {
    let mut cell = SampleMesh::cell();
    let n1 = cell.add_net("n1");
    let c0 = cell.new_contact(n1, Point::new(50, 50));
    let c1 = cell.new_contact(n1, Point::new(250, 50));
    let mut engine = SampleMesh::engine(cell)?;

    let mut session = engine.open_session();
    session.create_wire(c0, c1, Dir::Horiz)?;
    session.close();

    engine.set_state(EngineState::GlobalLoaded);
    engine.load_global_routing(LoadMethod::ByNet)?;

    engine.finalize_layout()?;
    assert_eq!(engine.state(), EngineState::Gutted);
    assert!(engine.gcells().is_empty());
    assert!(engine.edges().is_empty());
    // Idempotent at Driving and above
    engine.finalize_layout()?;
    assert_eq!(engine.state(), EngineState::Gutted);
    // The wire itself survives finalize: the mesh is gone, the geometry is not
    assert!(engine.cell().net(n1).is_some());

    engine.reset()?;
    assert_eq!(engine.state(), EngineState::Creation);
    // One root tile again, indexed
    assert_eq!(engine.gcells().len(), 1);
    assert!(engine.gcell_under(Point::new(500, 500)).is_some());
    Ok(())
}

#[test]
fn engine_creation_errors() {
    let gauge = SampleMesh::gauge();
    let cell = Cell::new("empty", BoundBox::empty());
    assert!(matches!(
        Engine::create(cell, Config::new(gauge, 100)),
        Err(RouteError::Config(_))
    ));

    let gauge = RoutingGauge::new("void");
    let cell = SampleMesh::cell();
    assert!(matches!(
        Engine::create(cell, Config::new(gauge, 100)),
        Err(RouteError::Config(_))
    ));
}
