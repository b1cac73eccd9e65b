//! End-to-end tests for candidate admission.
//!
//! Each test drives a `Roadmap` over a small `PlaneSpace` through the public
//! API and checks which test admitted the candidate and what the graph
//! looks like afterwards.

use spars_rs::geometry::{GeometryOracle, Obstacle, PlaneSpace, Point2};
use spars_rs::{Admission, EdgeType, Roadmap, SparseConfig, VertexId, VertexType};

// ============================================================================
// Helpers
// ============================================================================

/// Config whose visibility radius is exactly 1.0 in `space`.
fn unit_delta(space: &PlaneSpace) -> SparseConfig {
    SparseConfig {
        sparse_delta_fraction: 1.0 / space.max_extent(),
        stretch_factor: 3.0,
        ..Default::default()
    }
}

fn roadmap(space: PlaneSpace) -> Roadmap<PlaneSpace> {
    let config = unit_delta(&space);
    Roadmap::new(space, config).unwrap()
}

fn offer(roadmap: &Roadmap<PlaneSpace>, x: f64, y: f64) -> Admission {
    let id = roadmap.add_state(Point2::new(x, y));
    roadmap.add_state_to_roadmap(id, 0).unwrap()
}

fn vertex_of(admission: Admission) -> VertexId {
    admission.vertex().expect("admission created a vertex")
}

/// Two coverage vertices 1.6 apart joined by a connectivity vertex between
/// them. Returns (roadmap, left, right, middle).
fn setup_bridge() -> (Roadmap<PlaneSpace>, VertexId, VertexId, VertexId) {
    let roadmap = roadmap(PlaneSpace::new(10.0, 10.0, 11));
    let left = vertex_of(offer(&roadmap, 2.0, 5.0));
    let right = vertex_of(offer(&roadmap, 3.6, 5.0));
    let middle = offer(&roadmap, 2.8, 5.0);
    assert_eq!(middle.kind(), Some(VertexType::Connectivity));
    (roadmap, left, right, vertex_of(middle))
}

// ============================================================================
// 1. Coverage
// ============================================================================

#[test]
fn test_first_candidate_is_coverage() {
    let roadmap = roadmap(PlaneSpace::new(10.0, 10.0, 1));
    let admission = offer(&roadmap, 5.0, 5.0);

    assert_eq!(admission.kind(), Some(VertexType::Coverage));
    assert_eq!(roadmap.num_vertices(), 1);
    assert_eq!(roadmap.num_edges(), 0);
}

#[test]
fn test_far_candidate_is_coverage() {
    let roadmap = roadmap(PlaneSpace::new(20.0, 20.0, 2));
    offer(&roadmap, 1.0, 1.0);
    let admission = offer(&roadmap, 11.0, 1.0);

    assert_eq!(admission.kind(), Some(VertexType::Coverage));
    assert_eq!(roadmap.get_disjoint_sets_count(), 2);
}

#[test]
fn test_obstructed_neighbour_does_not_cover() {
    let space = PlaneSpace::new(10.0, 10.0, 3).with_obstacle(Obstacle::rect(2.4, 0.0, 2.6, 10.0));
    let roadmap = roadmap(space);
    offer(&roadmap, 2.0, 5.0);

    // 0.9 away, inside the radius, but behind the wall
    let admission = offer(&roadmap, 2.9, 5.0);
    assert_eq!(admission.kind(), Some(VertexType::Coverage));
    assert_eq!(roadmap.num_edges(), 0);
}

// ============================================================================
// 2. Connectivity
// ============================================================================

#[test]
fn test_connectivity_joins_components() {
    let (roadmap, left, right, middle) = setup_bridge();

    assert_eq!(roadmap.num_vertices(), 3);
    assert_eq!(roadmap.num_edges(), 2);
    assert_eq!(roadmap.get_disjoint_sets_count(), 1);
    assert!(roadmap.same_component(left, right));

    let core = roadmap.read();
    let graph = core.graph();
    for end in [left, right] {
        let e = graph.edge_between(middle, end).unwrap();
        assert_eq!(graph.edge_type(e).unwrap(), EdgeType::Connectivity);
    }
    assert_eq!(core.stats().edges_added(EdgeType::Connectivity), 2);
}

#[test]
fn test_astar_runs_through_connectivity_vertex() {
    let (roadmap, left, right, middle) = setup_bridge();

    let path = roadmap.astar_search(left, right).unwrap().into_path().unwrap();
    assert_eq!(path.vertices, vec![left, middle, right]);
    assert!((path.distance - 1.6).abs() < 1e-9);
}

#[test]
fn test_candidate_between_connected_pair_is_rejected() {
    let (roadmap, _, _, _) = setup_bridge();

    // Nearest two are left and middle, already joined by an edge
    assert_eq!(offer(&roadmap, 2.4, 5.3), Admission::Rejected);
    assert_eq!(roadmap.read().consecutive_failures(), 1);
    assert_eq!(roadmap.num_vertices(), 3);
}

// ============================================================================
// 3. Interface
// ============================================================================

/// Two vertices 1.0 apart in the same component through a detour vertex,
/// with no direct edge between them.
fn setup_detour(space: PlaneSpace) -> (Roadmap<PlaneSpace>, VertexId, VertexId) {
    let roadmap = roadmap(space);
    let (a, b) = {
        let mut core = roadmap.write();
        let graph = core.graph_mut();
        let a = graph.add_vertex_from_state(&Point2::new(2.0, 5.0), VertexType::Coverage).unwrap();
        let b = graph.add_vertex_from_state(&Point2::new(3.0, 5.0), VertexType::Coverage).unwrap();
        let c = graph.add_vertex_from_state(&Point2::new(2.5, 6.5), VertexType::Coverage).unwrap();
        graph.add_edge(a, c, EdgeType::Connectivity).unwrap();
        graph.add_edge(c, b, EdgeType::Connectivity).unwrap();
        (a, b)
    };
    (roadmap, a, b)
}

#[test]
fn test_interface_connects_visible_pair_directly() {
    let (roadmap, a, b) = setup_detour(PlaneSpace::new(10.0, 10.0, 4));

    let admission = offer(&roadmap, 2.5, 5.0);
    assert_eq!(
        admission,
        Admission::Admitted { kind: VertexType::Interface, vertex: None }
    );
    assert_eq!(roadmap.num_vertices(), 3);

    let core = roadmap.read();
    let e = core.graph().edge_between(a, b).unwrap();
    assert_eq!(core.graph().edge_type(e).unwrap(), EdgeType::Interface);
    // No vertex was added, but the edge is counted
    assert_eq!(core.stats().total_added(), 0);
    assert_eq!(core.stats().interface_edges, 1);
}

#[test]
fn test_interface_bridges_blocked_pair() {
    let space = PlaneSpace::new(10.0, 10.0, 5).with_obstacle(Obstacle::rect(2.45, 4.95, 2.55, 5.05));
    let (roadmap, a, b) = setup_detour(space);

    let admission = offer(&roadmap, 2.5, 4.5);
    assert_eq!(admission.kind(), Some(VertexType::Interface));
    let v = vertex_of(admission);

    let core = roadmap.read();
    let graph = core.graph();
    assert!(graph.has_edge(v, a));
    assert!(graph.has_edge(v, b));
    assert!(!graph.has_edge(a, b));
    assert_eq!(graph.num_edges(), 4);
    assert_eq!(core.stats().interface, 1);
    assert_eq!(core.stats().interface_edges, 2);
}

// ============================================================================
// 4. Discretized seeding and passes
// ============================================================================

#[test]
fn test_discretized_seeding_admits_every_lattice_point() {
    let space = PlaneSpace::new(4.0, 4.0, 6);
    let lattice = space.lattice(1.0);
    let config = SparseConfig {
        sparse_delta_fraction: 1.5 / space.max_extent(),
        stretch_factor: 3.0,
        ..Default::default()
    };
    let roadmap = Roadmap::new(space, config).unwrap();

    let report = roadmap.insert_discretized(lattice).unwrap();
    assert_eq!(report.candidates, 25);
    assert_eq!(report.admitted, 25);
    assert_eq!(roadmap.num_vertices(), 25);
    assert!(report.stats.discretized > 0);
    assert_eq!(report.stats.total_added(), 25);

    // Seeding twice is refused
    let again = roadmap.insert_discretized(vec![Point2::new(0.5, 0.5)]);
    assert!(again.is_err());
}

#[test]
fn test_pass_report_tracks_graph() {
    let space = PlaneSpace::new(10.0, 10.0, 7).with_obstacle(Obstacle::circle(5.0, 5.0, 1.5));
    let mut config = unit_delta(&space);
    config.verify_invariants = true;
    let roadmap = Roadmap::new(space, config).unwrap();

    let samples: Vec<Point2> = (0..400)
        .map_while(|_| roadmap.oracle().sample_valid(100))
        .collect();
    let report = roadmap.run_pass(samples).unwrap();

    assert_eq!(report.candidates, 400);
    assert!(report.admitted > 0);
    assert!(!report.saturated);
    assert_eq!(report.vertices, roadmap.num_vertices());
    assert_eq!(report.edges, roadmap.num_edges());
    assert_eq!(report.disjoint_sets, roadmap.get_disjoint_sets_count());
    assert_eq!(report.stats.random_samples_added, report.admitted);
    assert!(report.motion_checks > 0);
}

#[test]
fn test_saturated_pass_does_not_stop_the_next_one() {
    let space = PlaneSpace::new(10.0, 10.0, 12);
    let config = SparseConfig {
        fourth_criteria_after_failures: 2,
        terminate_after_failures: 3,
        ..unit_delta(&space)
    };
    let roadmap = Roadmap::new(space, config).unwrap();

    // One coverage vertex, then rejections until saturation
    let first = roadmap.run_pass(vec![Point2::new(5.0, 5.0); 10]).unwrap();
    assert!(first.saturated);
    assert!(first.quality_mode);
    assert_eq!(first.candidates, 7);

    // Starts over with quality mode off and a zero failure count
    let second = roadmap
        .run_pass(vec![Point2::new(5.0, 5.0), Point2::new(1.0, 1.0), Point2::new(5.0, 5.0)])
        .unwrap();
    assert!(!second.saturated);
    assert!(!second.quality_mode);
    assert_eq!(second.candidates, 3);
    assert_eq!(second.admitted, 1);
    assert_eq!(roadmap.num_vertices(), 2);
    assert_eq!(roadmap.read().consecutive_failures(), 1);
}

#[test]
fn test_vertices_moved_counts_one_pass() {
    let roadmap = roadmap(PlaneSpace::new(10.0, 10.0, 13));
    {
        let mut core = roadmap.write();
        core.graph_mut().add_vertex_from_state(&Point2::new(5.0, 5.0), VertexType::Coverage).unwrap();
        let fresh = core
            .graph_mut()
            .add_vertex_from_state(&Point2::new(5.2, 5.0), VertexType::Interface)
            .unwrap();
        assert!(core.check_remove_close_vertices(fresh).unwrap());
        assert_eq!(core.stats().vertices_moved, 1);
    }

    let report = roadmap.run_pass(Vec::new()).unwrap();
    assert_eq!(report.stats.vertices_moved, 0);
    assert_eq!(report.vertices_freed, 1);
}

#[test]
fn test_config_from_json() {
    let config = SparseConfig::from_json_str(
        r#"{ "sparse_delta_fraction": 0.2, "stretch_factor": 2.5, "use_check_remove_close_vertices": false }"#,
    )
    .unwrap();
    let roadmap = Roadmap::new(PlaneSpace::new(3.0, 4.0, 8), config).unwrap();

    let resolved = roadmap.read().config().clone();
    assert!((resolved.sparse_delta - 1.0).abs() < 1e-12);
    assert_eq!(resolved.stretch_factor, 2.5);
    assert!(!resolved.use_check_remove_close_vertices);
    assert_eq!(resolved.near_sample_points, 4);
}
