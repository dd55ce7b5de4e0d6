//! Geometric primitives used by the scene passes
//!
//! Bounding boxes, rays, triangles and the view frustum. Vectors and matrices
//! themselves come from [`crate::foundation::math`].

mod bounding_box;
mod frustum;
mod ray;

pub use bounding_box::BoundingBox;
pub use frustum::{Frustum, FrustumBoxMetadata, FrustumResult, Plane};
pub use ray::{Ray, Triangle};
