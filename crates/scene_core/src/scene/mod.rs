//! Scene graph
//!
//! The node tree and the per-frame passes that run over it: transform
//! propagation, constraints, frustum culling, sort-key generation and hit
//! testing, plus the atomic mirror read by other threads.

pub mod action;
pub mod animation;
pub mod atomic;
pub mod attachments;
pub mod constraint;
pub mod frame;
pub mod graph;
pub mod node;
pub mod physics;
mod sort_keys;
mod thread;
mod transform;
mod visibility;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionCallback, ActionId, ActionKind};
pub use animation::{
    AnimatedProperty, AnimationTag, AnimationTarget, ExecutableAnimation, PropertyAnimation, PropertyAnimationGroup,
    PropertyTarget, TimingFunction, Transaction,
};
pub use atomic::AtomicNodeState;
pub use attachments::{ParticleEmitter, Sound, TransformDelegate};
pub use constraint::{BillboardAxis, BillboardConstraint, Constraint, ConstraintId};
pub use frame::FrameOutput;
pub use graph::SceneGraph;
pub use hit_test::HitResult;
pub use node::{DirtyFlags, Node, NodeId, NodeKey, NodeKind, Pivot};
pub use physics::{PhysicsBody, PhysicsWorld, Scene, SimplePhysicsWorld};
