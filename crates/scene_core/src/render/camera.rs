//! # Camera
//!
//! Perspective camera used by the visibility, sort-key and hit-test passes.
//! Matrices follow the OpenGL clip-space convention produced by `nalgebra`
//! (right-handed, Y-up, looking down -Z in view space).

use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::geometry::Frustum;

/// 3D perspective camera
///
/// Matrix calculations are performed on demand; call [`Camera::frustum`] once per
/// frame and reuse the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 90.0, 1.0, 0.1, 100.0)
    }
}

impl Camera {
    /// Create a perspective camera looking at `target` with a +Y up vector
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `target` - Point in world space to look at
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height)
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(position: Vec3, target: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Update camera target (look-at point)
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Normalized view direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.position + self.forward()),
            &self.up,
        )
    }

    /// View-to-clip matrix
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Frustum in world space
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&(self.projection_matrix() * self.view_matrix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, FrustumResult};

    #[test]
    fn test_frustum_follows_camera_direction() {
        let camera = Camera::perspective(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::zeros(),
            60.0,
            1.0,
            0.1,
            50.0,
        );
        let frustum = camera.frustum();
        let at_origin = BoundingBox::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5));
        let behind_camera = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.5, 0.5, 0.5));

        assert_eq!(frustum.classify_box(&at_origin), FrustumResult::Inside);
        assert_eq!(frustum.classify_box(&behind_camera), FrustumResult::Outside);
    }

    #[test]
    fn test_degenerate_target_falls_back_to_negative_z() {
        let camera = Camera::perspective(Vec3::zeros(), Vec3::zeros(), 60.0, 1.0, 0.1, 50.0);
        assert_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0));
    }
}
