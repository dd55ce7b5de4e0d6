//! # Scene Core
//!
//! Scene-graph core for a real-time 3D renderer.
//!
//! ## Features
//!
//! - **Node tree**: arena-backed hierarchy with animated property setters,
//!   lights, sounds, constraints, actions and named animations
//! - **Transform propagation**: pivot-aware local transforms, world state and
//!   umbrella bounding boxes, with dirty tracking for culled subtrees
//! - **Frustum culling**: hierarchical classification that skips whole
//!   subtrees
//! - **Sort keys**: per-element keys carrying hierarchy grouping, light-set
//!   hash, opacity and camera distance
//! - **Hit testing**: bounds-only or exact triangle picking
//! - **Atomic snapshots**: lock-free transform state readable from any thread
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_core::prelude::*;
//! use std::sync::Arc;
//!
//! let mut graph = SceneGraph::new();
//! let root = graph.create_node();
//! let cube = graph.insert(Node::new().with_geometry(Arc::new(Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0)))));
//! graph.add_child(root, cube).unwrap();
//!
//! let camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0, 1.0, 0.1, 100.0);
//! let output = graph.update_frame(root, &RenderContext::new(camera, 1.0 / 60.0));
//! assert_eq!(output.sort_keys.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod foundation;
pub mod geometry;
pub mod render;
pub mod scene;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        config::{Config, SceneConfig},
        error::{GeometryError, SceneError, SceneResult},
        foundation::{
            diagnostics::FrameStats,
            math::{Mat4, Quat, Vec3},
        },
        geometry::{BoundingBox, Frustum, FrustumResult, Ray},
        render::{
            sort_for_rendering, Camera, DrawParams, Geometry, Light, LightType, Mesh, RenderContext, RenderDriver,
            SortKey,
        },
        scene::{
            Action, ActionKind, BillboardAxis, BillboardConstraint, FrameOutput, HitResult, Node, NodeId, NodeKey,
            NodeKind, PhysicsBody, PropertyAnimationGroup, Scene, SceneGraph, TimingFunction, Transaction,
        },
    };
}
