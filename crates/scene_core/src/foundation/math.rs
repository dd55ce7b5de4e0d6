//! Math utilities and types
//!
//! Vector, quaternion and matrix types come from `nalgebra`; this module pins the
//! `f32` aliases used across the scene core and adds the handful of helpers the
//! transform pipeline needs (pivot wrapping, Euler normalization, translation
//! extraction).

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Quat, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Wrap an angle into `[0, 2π)`
    pub fn normalize_angle_2pi(radians: f32) -> f32 {
        let wrapped = radians.rem_euclid(constants::TAU);
        // rem_euclid can round up to exactly TAU for tiny negative inputs
        if wrapped >= constants::TAU { 0.0 } else { wrapped }
    }

    /// Wrap each component of an Euler triple into `[0, 2π)`
    pub fn normalize_angles_2pi(euler: Vec3) -> Vec3 {
        Vec3::new(
            normalize_angle_2pi(euler.x),
            normalize_angle_2pi(euler.y),
            normalize_angle_2pi(euler.z),
        )
    }

    /// Quaternion from XYZ Euler angles (radians)
    pub fn quat_from_euler(euler: Vec3) -> Quat {
        Quat::from_euler_angles(euler.x, euler.y, euler.z)
    }

    /// XYZ Euler angles (radians, each in `[0, 2π)`) from a quaternion
    pub fn quat_to_euler(rotation: &Quat) -> Vec3 {
        let (x, y, z) = rotation.euler_angles();
        normalize_angles_2pi(Vec3::new(x, y, z))
    }

    /// Spherical interpolation that never panics on antipodal inputs
    pub fn slerp(from: &Quat, to: &Quat, t: f32) -> Quat {
        from.try_slerp(to, t, 1.0e-6)
            .unwrap_or_else(|| from.nlerp(to, t))
    }
}

/// Extension trait for Mat4 with the operations the transform pipeline uses
pub trait Mat4Ext {
    /// Translation column of an affine transform
    fn translation_part(&self) -> Vec3;

    /// Upper-left 3x3 rotation block embedded back into a 4x4 matrix
    fn rotation_part(&self) -> Mat4;

    /// Wrap `self` with a pivot: `pivot · self · pivot⁻¹`
    fn about_pivot(&self, pivot: &Mat4, pivot_inverse: &Mat4) -> Mat4;

    /// Transform a point (w = 1) by this matrix
    fn transform_vec3_point(&self, point: &Vec3) -> Vec3;

    /// Inverse-transpose for normal transformation; identity for singular matrices
    fn inverse_transpose(&self) -> Mat4;

    /// Column-major copy of the 16 matrix entries
    fn to_column_array(&self) -> [f32; 16];

    /// Build from 16 column-major entries
    fn from_column_array(values: &[f32; 16]) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn rotation_part(&self) -> Mat4 {
        let mut rotation = Mat4::identity();
        rotation
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.fixed_view::<3, 3>(0, 0));
        rotation
    }

    fn about_pivot(&self, pivot: &Mat4, pivot_inverse: &Mat4) -> Mat4 {
        pivot * self * pivot_inverse
    }

    fn transform_vec3_point(&self, point: &Vec3) -> Vec3 {
        self.transform_point(&Point3::from(*point)).coords
    }

    fn inverse_transpose(&self) -> Mat4 {
        self.try_inverse()
            .map_or_else(Mat4::identity, |inverse| inverse.transpose())
    }

    fn to_column_array(&self) -> [f32; 16] {
        let mut values = [0.0; 16];
        values.copy_from_slice(self.as_slice());
        values
    }

    fn from_column_array(values: &[f32; 16]) -> Mat4 {
        Mat4::from_column_slice(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_wraps_negative() {
        assert_relative_eq!(utils::normalize_angle_2pi(-constants::PI), constants::PI, epsilon = 1e-5);
        assert_relative_eq!(utils::normalize_angle_2pi(3.0 * constants::PI), constants::PI, epsilon = 1e-5);
        assert!(utils::normalize_angle_2pi(constants::TAU) < constants::TAU);
    }

    #[test]
    fn test_euler_round_trip_small_angles() {
        let euler = Vec3::new(0.3, 0.2, 0.1);
        let rotation = utils::quat_from_euler(euler);
        assert_relative_eq!(utils::quat_to_euler(&rotation), euler, epsilon = 1e-5);
    }

    #[test]
    fn test_about_pivot_is_noop_for_identity_pivot() {
        let scale = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 4.0));
        let wrapped = scale.about_pivot(&Mat4::identity(), &Mat4::identity());
        assert_relative_eq!(wrapped, scale);
    }

    #[test]
    fn test_inverse_transpose_of_singular_is_identity() {
        let singular = Mat4::zeros();
        assert_eq!(singular.inverse_transpose(), Mat4::identity());
    }

    #[test]
    fn test_translation_part() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.translation_part(), Vec3::new(1.0, 2.0, 3.0));
    }
}
