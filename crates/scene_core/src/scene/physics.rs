//! Scene ownership and physics registration hooks
//!
//! The scene core never simulates anything. It only keeps physics-body
//! registration in step with scene membership: a node's body is registered when
//! the node joins a scene and unregistered when it leaves.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::scene::NodeId;

/// Physics properties handed to the physics world on registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsBody {
    /// Mass in kilograms (ignored for static bodies)
    pub mass: f32,
    /// Static bodies never move
    pub is_static: bool,
}

impl PhysicsBody {
    /// Movable body
    pub fn dynamic(mass: f32) -> Self {
        Self { mass, is_static: false }
    }

    /// Immovable body
    pub fn fixed() -> Self {
        Self { mass: 0.0, is_static: true }
    }
}

/// External physics simulation
pub trait PhysicsWorld: Send {
    /// Start simulating the node's body
    fn register(&mut self, node: NodeId, body: &PhysicsBody);

    /// Stop simulating the node's body
    fn unregister(&mut self, node: NodeId);

    /// Whether the node currently has a registered body
    fn is_registered(&self, node: NodeId) -> bool;
}

/// Bookkeeping-only physics world
#[derive(Debug, Default)]
pub struct SimplePhysicsWorld {
    bodies: HashMap<NodeId, PhysicsBody>,
}

impl SimplePhysicsWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl PhysicsWorld for SimplePhysicsWorld {
    fn register(&mut self, node: NodeId, body: &PhysicsBody) {
        log::debug!("Registering physics body for node {}", node);
        self.bodies.insert(node, *body);
    }

    fn unregister(&mut self, node: NodeId) {
        log::debug!("Unregistering physics body for node {}", node);
        self.bodies.remove(&node);
    }

    fn is_registered(&self, node: NodeId) -> bool {
        self.bodies.contains_key(&node)
    }
}

/// Shared owner of a set of nodes and their physics world
///
/// Nodes hold only a weak reference to their scene.
pub struct Scene {
    physics_world: Mutex<Box<dyn PhysicsWorld>>,
    members: Mutex<HashSet<NodeId>>,
}

impl Scene {
    /// Create a scene around a physics world
    pub fn new(physics_world: impl PhysicsWorld + 'static) -> Arc<Self> {
        Arc::new(Self {
            physics_world: Mutex::new(Box::new(physics_world)),
            members: Mutex::new(HashSet::new()),
        })
    }

    /// Create a scene with a [`SimplePhysicsWorld`]
    pub fn with_simple_physics() -> Arc<Self> {
        Self::new(SimplePhysicsWorld::new())
    }

    /// Access the physics world
    pub fn physics_world(&self) -> MutexGuard<'_, Box<dyn PhysicsWorld>> {
        self.physics_world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the node belongs to this scene
    pub fn contains(&self, node: NodeId) -> bool {
        self.members().contains(&node)
    }

    /// Number of member nodes
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    pub(crate) fn add_member(&self, node: NodeId) {
        self.members().insert(node);
    }

    pub(crate) fn remove_member(&self, node: NodeId) {
        self.members().remove(&node);
    }

    fn members(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        self.members.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("member_count", &self.member_count())
            .finish_non_exhaustive()
    }
}
