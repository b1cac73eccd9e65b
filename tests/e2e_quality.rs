//! End-to-end tests for interface bookkeeping and spanner repair.
//!
//! The scenario is a vertex `v` below two neighbours `vp` and `vpp` that
//! are separated by a wall. Crossings recorded just above `v` make the gap
//! between the two regions much shorter than the detour through `v`, so
//! the spanner check must repair the pair.

use std::sync::Arc;

use spars_rs::geometry::{GeometryOracle, Obstacle, PlaneSpace, Point2};
use spars_rs::interface::VertexPair;
use spars_rs::{Admission, EdgeType, Roadmap, SparseConfig, VertexId, VertexType};

// ============================================================================
// Helpers
// ============================================================================

struct Triple {
    roadmap: Roadmap<PlaneSpace>,
    v: VertexId,
    vp: VertexId,
    vpp: VertexId,
}

fn space(with_wall: bool) -> PlaneSpace {
    let space = PlaneSpace::with_bounds(-2.0, -2.0, 2.0, 2.0, 21);
    if with_wall {
        space.with_obstacle(Obstacle::rect(-0.05, 0.3, 0.05, 1.5))
    } else {
        space
    }
}

/// Visibility radius 1.0, dense radius `dense` and the given stretch.
fn config(space: &PlaneSpace, stretch: f64, dense: f64) -> SparseConfig {
    SparseConfig {
        sparse_delta_fraction: 1.0 / space.max_extent(),
        dense_delta_fraction: dense / space.max_extent(),
        stretch_factor: stretch,
        ..Default::default()
    }
}

fn setup_triple(space: PlaneSpace, stretch: f64, dense: f64) -> Triple {
    let config = config(&space, stretch, dense);
    setup_triple_with(space, config)
}

fn setup_triple_with(space: PlaneSpace, config: SparseConfig) -> Triple {
    let roadmap = Roadmap::new(space, config).unwrap();
    let (v, vp, vpp) = {
        let mut core = roadmap.write();
        let graph = core.graph_mut();
        let v = graph.add_vertex_from_state(&Point2::new(0.0, -0.4), VertexType::Coverage).unwrap();
        let vp = graph.add_vertex_from_state(&Point2::new(-0.7, 0.7), VertexType::Coverage).unwrap();
        let vpp = graph.add_vertex_from_state(&Point2::new(0.7, 0.7), VertexType::Coverage).unwrap();
        graph.add_edge(v, vp, EdgeType::Connectivity).unwrap();
        graph.add_edge(v, vpp, EdgeType::Connectivity).unwrap();
        (v, vp, vpp)
    };
    Triple { roadmap, v, vp, vpp }
}

fn point(x: f64, y: f64) -> Arc<Point2> {
    Arc::new(Point2::new(x, y))
}

/// Record one crossing on each side of `v`, 0.2 apart.
fn record_crossings(t: &Triple) {
    let mut core = t.roadmap.write();
    assert!(core.update_pair_points(t.v, &point(-0.1, 0.15), t.vp, &point(-0.25, 0.2)).unwrap());
    assert!(core.update_pair_points(t.v, &point(0.1, 0.15), t.vpp, &point(0.25, 0.2)).unwrap());
}

fn quality_vertex(roadmap: &Roadmap<PlaneSpace>) -> Option<VertexId> {
    let core = roadmap.read();
    let graph = core.graph();
    graph
        .vertex_ids()
        .find(|&id| graph.vertex_type(id).unwrap() == VertexType::Quality)
}

fn last_distance(t: &Triple) -> Option<f64> {
    let core = t.roadmap.read();
    core.graph()
        .interfaces()
        .get(t.v, VertexPair::new(t.vp, t.vpp))
        .map(|d| d.last_distance())
}

// ============================================================================
// 1. Interface records
// ============================================================================

#[test]
fn test_first_crossing_leaves_gap_unknown() {
    let t = setup_triple(space(true), 3.0, 0.1);
    let mut core = t.roadmap.write();
    assert!(core.update_pair_points(t.v, &point(-0.1, 0.15), t.vp, &point(-0.25, 0.2)).unwrap());

    let data = core.graph().interfaces().get(t.v, VertexPair::new(t.vp, t.vpp)).unwrap();
    assert!(data.interface1().is_some());
    assert!(data.interface2().is_none());
    assert_eq!(data.last_distance(), f64::INFINITY);
}

#[test]
fn test_both_crossings_set_gap() {
    let t = setup_triple(space(true), 3.0, 0.1);
    record_crossings(&t);

    let gap = last_distance(&t).unwrap();
    assert!((gap - 0.2).abs() < 1e-12);
}

#[test]
fn test_closer_crossing_replaces_farther_is_ignored() {
    let t = setup_triple(space(true), 3.0, 0.1);
    record_crossings(&t);

    {
        let mut core = t.roadmap.write();
        // 0.3 from the other inside state: no improvement
        assert!(!core.update_pair_points(t.v, &point(-0.2, 0.15), t.vp, &point(-0.3, 0.2)).unwrap());
        // 0.15: narrows the gap
        assert!(core.update_pair_points(t.v, &point(-0.05, 0.15), t.vp, &point(-0.2, 0.2)).unwrap());
    }
    assert!((last_distance(&t).unwrap() - 0.15).abs() < 1e-12);
}

#[test]
fn test_max_spanner_path_is_half_the_detour() {
    let t = setup_triple(space(true), 3.0, 0.1);
    let core = t.roadmap.read();

    let leg = (0.7_f64 * 0.7 + 1.1 * 1.1).sqrt();
    let midpoint = core.max_spanner_path(t.v, t.vp, t.vpp).unwrap();
    assert!((midpoint - leg).abs() < 1e-12);
}

// ============================================================================
// 2. Spanner check and repair
// ============================================================================

#[test]
fn test_violation_adds_quality_vertex_around_wall() {
    let t = setup_triple(space(true), 3.0, 0.1);
    record_crossings(&t);
    let before = t.roadmap.astar_search(t.vp, t.vpp).unwrap().into_path().unwrap();

    assert!(t.roadmap.write().spanner_check(t.v).unwrap());

    let core = t.roadmap.read();
    let graph = core.graph();
    assert_eq!(graph.num_vertices(), 4);
    assert_eq!(core.stats().quality, 1);
    assert_eq!(core.stats().quality_edges, 2);

    let q = graph
        .vertex_ids()
        .find(|&id| graph.vertex_type(id).unwrap() == VertexType::Quality)
        .unwrap();
    let qs = graph.get_vertex_state(q).unwrap();
    assert!(qs.distance(&Point2::new(0.1, 0.15)) < 1e-12);
    for end in [t.vp, t.vpp] {
        let e = graph.edge_between(q, end).unwrap();
        assert_eq!(graph.edge_type(e).unwrap(), EdgeType::Quality);
    }

    // Records around the new vertex are gone
    assert!(graph.interfaces().get(t.v, VertexPair::new(t.vp, t.vpp)).is_none_or(|d| d.is_empty()));
    drop(core);

    let after = t.roadmap.astar_search(t.vp, t.vpp).unwrap().into_path().unwrap();
    assert_eq!(after.vertices, vec![t.vp, q, t.vpp]);
    assert!(after.distance < before.distance);
}

#[test]
fn test_violation_with_clear_line_adds_direct_edge() {
    let t = setup_triple(space(false), 3.0, 0.1);
    record_crossings(&t);

    assert!(t.roadmap.write().spanner_check(t.v).unwrap());

    let core = t.roadmap.read();
    let graph = core.graph();
    assert_eq!(graph.num_vertices(), 3);
    let e = graph.edge_between(t.vp, t.vpp).unwrap();
    assert_eq!(graph.edge_type(e).unwrap(), EdgeType::Quality);
    assert_eq!(core.stats().quality_edges, 1);
    assert_eq!(core.stats().total_added(), 0);
}

#[test]
fn test_no_violation_under_large_stretch() {
    let t = setup_triple(space(true), 10.0, 0.1);
    record_crossings(&t);

    assert!(!t.roadmap.write().spanner_check(t.v).unwrap());
    assert_eq!(t.roadmap.num_vertices(), 3);
    assert_eq!(t.roadmap.num_edges(), 2);
}

#[test]
fn test_repair_abandoned_when_path_hugs_v() {
    // Shortcut state (0.1, 0.15) lies 0.56 from v, inside a dense radius of 0.6
    let t = setup_triple(space(true), 3.0, 0.6);
    record_crossings(&t);

    assert!(!t.roadmap.write().add_quality_path(t.v, t.vp, t.vpp).unwrap());
    assert_eq!(t.roadmap.num_vertices(), 3);
    assert_eq!(t.roadmap.num_edges(), 2);
}

#[test]
fn test_spanner_check_on_removed_vertex_is_noop() {
    let t = setup_triple(space(true), 3.0, 0.1);
    {
        let mut core = t.roadmap.write();
        core.graph_mut().remove_vertex(t.v).unwrap();
    }
    assert!(!t.roadmap.write().spanner_check(t.v).unwrap());
}

#[test]
fn test_repair_stops_when_new_vertex_absorbs_neighbour() {
    let t = setup_triple(space(true), 3.0, 0.1);
    // 0.21 from the shortcut state (0.1, 0.15), inside the merge radius
    let w = t
        .roadmap
        .write()
        .graph_mut()
        .add_vertex_from_state(&Point2::new(0.3, 0.1), VertexType::Coverage)
        .unwrap();
    record_crossings(&t);

    assert!(t.roadmap.write().spanner_check(t.v).unwrap());

    let q = quality_vertex(&t.roadmap).unwrap();
    let core = t.roadmap.read();
    let graph = core.graph();
    assert!(!graph.is_live(w));
    assert!(graph.neighbors(q).is_empty(), "no chain edges after a merge");
    assert_eq!(graph.num_vertices(), 4);
    assert_eq!(graph.num_edges(), 2);
    assert_eq!(core.stats().vertices_moved, 1);
    assert_eq!(core.stats().quality, 1);
    assert_eq!(core.stats().quality_edges, 0);
}

#[test]
fn test_state_without_clearance_disables_chain() {
    let space = space(true);
    // (0.1, 0.15) is about 0.16 from the wall corner
    let config = SparseConfig {
        obstacle_clearance: 0.2,
        ..config(&space, 3.0, 0.1)
    };
    let t = setup_triple_with(space, config);
    record_crossings(&t);

    assert!(t.roadmap.write().add_quality_path(t.v, t.vp, t.vpp).unwrap());
    assert!(quality_vertex(&t.roadmap).is_none());
    assert_eq!(t.roadmap.num_vertices(), 3);
    assert_eq!(t.roadmap.num_edges(), 2);
    assert_eq!(t.roadmap.read().stats().quality_edges, 0);
}

// ============================================================================
// 3. Quality admission through the roadmap
// ============================================================================

#[test]
fn test_candidate_between_walled_neighbours_is_admitted_for_quality() {
    let space = space(true);
    let config = SparseConfig {
        near_sample_points_multiple: 20,
        ..config(&space, 3.0, 0.3)
    };
    let t = setup_triple_with(space, config);
    t.roadmap.write().set_quality_mode(true);
    let before = t.roadmap.astar_search(t.vp, t.vpp).unwrap().into_path().unwrap();

    // Sees v, vp and vpp; v and vp already share an edge
    let id = t.roadmap.add_state(Point2::new(0.0, 0.2));
    let admission = t.roadmap.add_state_to_roadmap(id, 0).unwrap();
    assert_eq!(
        admission,
        Admission::Admitted { kind: VertexType::Quality, vertex: None }
    );
    assert_eq!(t.roadmap.read().consecutive_failures(), 0);

    let after = t.roadmap.astar_search(t.vp, t.vpp).unwrap().into_path().unwrap();
    assert!(after.distance < before.distance, "{} !< {}", after.distance, before.distance);
}

#[test]
fn test_unrepresented_nearby_state_is_admitted_for_coverage() {
    let space = PlaneSpace::with_bounds(-2.0, -2.0, 2.0, 2.0, 21);
    let config = SparseConfig {
        near_sample_points_multiple: 20,
        ..config(&space, 3.0, 0.5)
    };
    let roadmap = Roadmap::new(space, config).unwrap();
    let origin = roadmap
        .write()
        .graph_mut()
        .add_vertex_from_state(&Point2::new(0.0, 0.0), VertexType::Coverage)
        .unwrap();
    roadmap.write().set_quality_mode(true);

    // Covered by the origin, but most states within 0.5 of it are not
    let id = roadmap.add_state(Point2::new(0.95, 0.0));
    assert_eq!(roadmap.add_state_to_roadmap(id, 0).unwrap(), Admission::Rejected);

    let core = roadmap.read();
    let graph = core.graph();
    assert_eq!(graph.num_vertices(), 2);
    assert_eq!(core.stats().coverage, 1);
    assert_eq!(core.stats().quality, 0);
    let added = graph.vertex_ids().find(|&id| id != origin).unwrap();
    assert_eq!(graph.vertex_type(added).unwrap(), VertexType::Coverage);
    let state = graph.get_vertex_state(added).unwrap();
    assert!(state.distance(&Point2::new(0.0, 0.0)) > core.config().sparse_delta);
    assert!(state.distance(&Point2::new(0.95, 0.0)) <= core.config().dense_delta + 1e-12);
}
