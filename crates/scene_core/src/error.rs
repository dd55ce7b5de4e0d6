//! Error types for scene graph operations

use thiserror::Error;

use crate::scene::{NodeId, NodeKey};

/// Errors returned by tree and attachment operations on a [`crate::scene::SceneGraph`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The key does not refer to a live node (destroyed or from another graph)
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// The operation needs a parent node but the node is a root
    #[error("Node {0} has no parent")]
    MissingParent(NodeId),

    /// Adding the child would make a node its own ancestor
    #[error("Adding node {child} under {parent} would create a cycle")]
    CycleDetected {
        /// Prospective parent
        parent: NodeId,
        /// Prospective child
        child: NodeId,
    },

    /// The node is not a child of the given parent
    #[error("Node {child} is not a child of {parent}")]
    NotAChild {
        /// Expected parent
        parent: NodeId,
        /// Node that was not found in the parent's child list
        child: NodeId,
    },
}

/// Errors raised while building geometry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Geometry was built without any vertex data
    #[error("Geometry has no vertex source")]
    MissingVertexSource,

    /// An element index points past the end of the vertex source
    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices available
        vertex_count: usize,
    },

    /// Triangle elements need a multiple of three indices
    #[error("Element has {0} indices, which is not a multiple of 3")]
    IncompleteTriangles(usize),
}

/// Result alias for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
