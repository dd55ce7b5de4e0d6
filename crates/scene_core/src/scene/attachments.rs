//! Small collaborators attached to nodes: sounds, particle emitters and
//! transform delegates

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::NodeId;

/// Positional sound source carried by a node
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    /// Name of the sound asset
    pub name: String,
    /// Position relative to the owning node
    pub position: Vec3,
    world_position: Vec3,
}

impl Sound {
    /// Create a sound at a node-relative position
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self { name: name.into(), position, world_position: position }
    }

    /// Position in world space as of the last transform pass
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    pub(crate) fn update_world_position(&mut self, world_transform: &Mat4) {
        self.world_position = world_transform.transform_vec3_point(&self.position);
    }
}

/// Particle system driven by the node it is attached to
pub trait ParticleEmitter: Send {
    /// Advance the emitter; called once per frame while the node is visible
    fn update(&mut self, world_transform: &Mat4, delta_time: f32);
}

/// Observer of a node's world position
pub trait TransformDelegate: Send + Sync {
    /// Called from the transform pass when the node's world position changes
    fn world_position_changed(&self, node: NodeId, world_position: Vec3);
}
