//! Thread ownership and the atomic mirror

use std::thread;

use approx::assert_relative_eq;

use super::context;
use crate::foundation::math::Vec3;
use crate::scene::{Node, SceneGraph};

#[test]
fn test_atomic_writes_stay_off_primary_until_sync() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node();
    let a = graph.insert(Node::new().with_position(Vec3::new(1.0, 0.0, 0.0)));
    let b = graph.insert(Node::new().with_position(Vec3::new(0.0, 1.0, 0.0)));
    graph.add_child(root, a).unwrap();
    graph.add_child(a, b).unwrap();
    graph.update_frame(root, &context(0.0));
    graph.sync_atomic_state(root);

    let a_state = graph.node(a).unwrap().atomic_state();
    let b_state = graph.node(b).unwrap().atomic_state();
    assert_relative_eq!(b_state.world_position(), Vec3::new(1.0, 1.0, 0.0));

    let writer = {
        let a_state = a_state.clone();
        thread::spawn(move || a_state.set_position(Vec3::new(5.0, 0.0, 0.0)))
    };
    writer.join().unwrap();

    assert_relative_eq!(a_state.world_position(), Vec3::new(5.0, 0.0, 0.0));
    assert_relative_eq!(graph.node(a).unwrap().world_position(), Vec3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(graph.node(a).unwrap().bounding_box().center(), Vec3::new(1.0, 0.0, 0.0));

    // Children are not walked; the child picks up the parent on its own next write
    assert_relative_eq!(b_state.world_position(), Vec3::new(1.0, 1.0, 0.0));
    b_state.set_scale(Vec3::new(1.0, 1.0, 1.0));
    assert_relative_eq!(b_state.world_position(), Vec3::new(5.0, 1.0, 0.0));

    graph.sync_atomic_state(root);
    assert_relative_eq!(a_state.world_position(), Vec3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(a_state.position(), Vec3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(b_state.world_position(), Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn test_sync_publishes_umbrella_and_reparenting() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node();
    let left = graph.insert(Node::new().with_position(Vec3::new(-2.0, 0.0, 0.0)));
    let right = graph.insert(Node::new().with_position(Vec3::new(2.0, 0.0, 0.0)));
    let leaf = graph.insert(Node::new().with_position(Vec3::new(0.0, 1.0, 0.0)));
    graph.add_child(root, left).unwrap();
    graph.add_child(root, right).unwrap();
    graph.add_child(left, leaf).unwrap();
    graph.update_frame(root, &context(0.0));
    graph.sync_atomic_state(root);

    let root_state = graph.node(root).unwrap().atomic_state();
    assert_eq!(root_state.umbrella_box(), graph.node(root).unwrap().umbrella_box());

    graph.add_child(right, leaf).unwrap();
    graph.update_frame(root, &context(0.0));
    graph.sync_atomic_state(root);

    let leaf_state = graph.node(leaf).unwrap().atomic_state();
    leaf_state.set_position(Vec3::new(0.0, 3.0, 0.0));
    assert_relative_eq!(leaf_state.world_position(), Vec3::new(2.0, 3.0, 0.0));
}

#[test]
fn test_graph_rejects_foreign_threads() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node();
    assert!(graph.is_owned_by_current_thread());

    let result = thread::spawn(move || {
        graph.create_node();
        root
    })
    .join();
    assert!(result.is_err());
}

#[test]
fn test_atomic_state_is_readable_anywhere() {
    let mut graph = SceneGraph::new();
    let node = graph.insert(Node::new().with_position(Vec3::new(3.0, 0.0, 0.0)));
    graph.update_frame(node, &context(0.0));
    graph.sync_atomic_state(node);

    let state = graph.node(node).unwrap().atomic_state();
    let seen = thread::spawn(move || state.world_position()).join().unwrap();
    assert_relative_eq!(seen, Vec3::new(3.0, 0.0, 0.0));
}
