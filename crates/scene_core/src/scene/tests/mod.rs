//! Frame-pipeline scenarios spanning several scene modules

mod concurrency;
mod picking;

use std::sync::Arc;

use crate::foundation::math::Vec3;
use crate::render::{Camera, Mesh, RenderContext};

/// Camera on +Z looking at the origin
fn front_camera() -> Camera {
    Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0, 1.0, 0.1, 100.0)
}

fn context(delta_time: f32) -> RenderContext {
    RenderContext::new(front_camera(), delta_time)
}

fn cube(half_extent: f32) -> Arc<Mesh> {
    Arc::new(Mesh::cuboid(Vec3::new(half_extent, half_extent, half_extent)))
}
