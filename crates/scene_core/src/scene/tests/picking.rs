//! Hit testing against a prepared frame

use std::sync::Arc;

use approx::assert_relative_eq;

use super::{context, cube, front_camera};
use crate::config::SceneConfig;
use crate::foundation::math::Vec3;
use crate::render::Mesh;
use crate::scene::{Node, NodeKey, SceneGraph};

/// Ray origin slightly off-axis so the ray crosses face interiors, not triangle edges
fn eye() -> Vec3 {
    Vec3::new(0.1, 0.2, 10.0)
}

fn forward() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

/// Corner triangle whose box covers the ray's axis while the triangle itself does not
fn corner_triangle() -> Arc<Mesh> {
    let vertices = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(0.5, -1.0, 0.0),
        Vec3::new(-1.0, 0.5, 0.0),
    ];
    Arc::new(Mesh::new(vertices, vec![vec![0, 1, 2]]).unwrap())
}

struct Stack {
    graph: SceneGraph,
    root: NodeKey,
    front: NodeKey,
    back: NodeKey,
    corner: NodeKey,
}

fn stacked_scene(config: SceneConfig) -> Stack {
    let mut graph = SceneGraph::with_config(config);
    let root = graph.create_node();
    let front = graph.insert(Node::new().with_geometry(cube(1.0)));
    let back = graph.insert(Node::new().with_position(Vec3::new(0.0, 0.0, -3.0)).with_geometry(cube(1.0)));
    let corner = graph.insert(Node::new().with_position(Vec3::new(0.0, 0.0, -8.0)).with_geometry(corner_triangle()));
    graph.add_child(root, front).unwrap();
    graph.add_child(front, back).unwrap();
    graph.add_child(root, corner).unwrap();
    graph.update_frame(root, &context(0.0));
    Stack { graph, root, front, back, corner }
}

#[test]
fn test_overlapping_nodes_returned_in_pre_order() {
    let scene = stacked_scene(SceneConfig::default());
    let hits = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), false);

    let keys: Vec<_> = hits.iter().map(|hit| hit.key).collect();
    assert_eq!(keys, vec![scene.front, scene.back]);
    assert_relative_eq!(hits[0].point, Vec3::new(0.1, 0.2, 1.0), epsilon = 1e-5);
    assert_relative_eq!(hits[1].point, Vec3::new(0.1, 0.2, -2.0), epsilon = 1e-5);
    assert_eq!(hits[0].camera, front_camera());
}

#[test]
fn test_bounds_only_is_a_superset_of_exact() {
    let scene = stacked_scene(SceneConfig::default());
    let exact = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), false);
    let bounds = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), true);

    assert_eq!(bounds.len(), 3);
    assert_eq!(bounds[2].key, scene.corner);
    for hit in &exact {
        assert!(bounds.iter().any(|candidate| candidate.key == hit.key));
    }
}

#[test]
fn test_high_accuracy_gaze_forces_exact_test() {
    let mut scene = stacked_scene(SceneConfig::default());
    scene.graph.node_mut(scene.corner).unwrap().set_high_accuracy_gaze(true);
    let bounds = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), true);
    assert_eq!(bounds.len(), 2);
}

#[test]
fn test_children_of_unselectable_nodes_are_tested() {
    let mut scene = stacked_scene(SceneConfig::default());
    scene.graph.node_mut(scene.front).unwrap().set_selectable(false);
    let hits = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, scene.back);
}

#[test]
fn test_transparent_nodes_are_not_hit() {
    let mut scene = stacked_scene(SceneConfig::default());
    scene.graph.node_mut(scene.front).unwrap().set_opacity(0.01);
    scene.graph.update_frame(scene.root, &context(0.0));
    let hits = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), false);
    // Opacity is inherited, so the child fades with its parent
    assert!(hits.is_empty());
}

#[test]
fn test_early_exit_still_reports_a_hit() {
    let config = SceneConfig { hit_test_early_exit: true, ..SceneConfig::default() };
    let scene = stacked_scene(config);
    let hits = scene.graph.hit_test(scene.root, &front_camera(), eye(), forward(), false);
    assert_eq!(hits.len(), 2);
    assert_relative_eq!(hits[0].distance, 9.0, epsilon = 1e-4);
    assert_relative_eq!(hits[1].distance, 12.0, epsilon = 1e-4);
}

#[test]
fn test_culled_nodes_are_not_hit() {
    let scene = stacked_scene(SceneConfig::default());
    let mut graph = scene.graph;
    let outside = graph.insert(Node::new().with_position(Vec3::new(0.0, 0.0, 40.0)).with_geometry(cube(1.0)));
    graph.add_child(scene.root, outside).unwrap();
    graph.update_frame(scene.root, &context(0.0));

    let hits = graph.hit_test(scene.root, &front_camera(), Vec3::new(0.0, 0.0, 50.0), forward(), true);
    assert!(hits.iter().all(|hit| hit.key != outside));
}
