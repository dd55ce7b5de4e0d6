//! Per-frame render parameters shared by the scene passes

use crate::render::Camera;

/// Everything the per-frame passes need from the renderer
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Active camera
    pub camera: Camera,
    /// Seconds since the previous frame
    pub delta_time: f32,
}

impl RenderContext {
    /// Create a context for one frame
    pub fn new(camera: Camera, delta_time: f32) -> Self {
        Self { camera, delta_time }
    }

    /// Far plane used to normalize sort-key distances
    pub fn z_far(&self) -> f32 {
        self.camera.far
    }
}
