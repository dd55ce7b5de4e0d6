//! Rendering collaborators of the scene core
//!
//! The scene graph does not own GPU resources. It talks to the renderer through
//! the camera, lights, sort keys and the [`Geometry`] / [`RenderDriver`] traits.

pub mod camera;
pub mod context;
pub mod geometry;
pub mod light;
pub mod sort_key;

pub use camera::Camera;
pub use context::RenderContext;
pub use geometry::{DrawParams, Geometry, GeometryElement, Mesh, RenderDriver};
pub use light::{hash_lights, Light, LightId, LightType};
pub use sort_key::{sort_for_rendering, SortKey, SortKeyInput};
