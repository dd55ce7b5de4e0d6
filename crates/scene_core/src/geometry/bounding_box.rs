//! Axis-aligned bounding boxes

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Axis-Aligned Bounding Box for culling, hit testing and light range checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::at_point(Vec3::zeros())
    }
}

impl BoundingBox {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Zero-volume box located at a point
    pub fn at_point(point: Vec3) -> Self {
        Self { min: point, max: point }
    }

    /// Create a box centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point
    ///
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::at_point(*first);
        for point in rest {
            bounds.expand_to_point(point);
        }
        Some(bounds)
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Grow this box to include a point
    pub fn expand_to_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow this box to include another box (in place)
    pub fn union_in_place(&mut self, other: &BoundingBox) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Union of two boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut result = *self;
        result.union_in_place(other);
        result
    }

    /// Transform the box by a matrix and re-fit an axis-aligned box around the result
    pub fn transform(&self, matrix: &Mat4) -> BoundingBox {
        let corners = self.corners().map(|corner| matrix.transform_vec3_point(&corner));
        let mut bounds = Self::at_point(corners[0]);
        for corner in &corners[1..] {
            bounds.expand_to_point(corner);
        }
        bounds
    }

    /// Check if this box contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this box fully contains another box, with a small tolerance
    pub fn contains_box(&self, other: &BoundingBox, epsilon: f32) -> bool {
        other.min.x >= self.min.x - epsilon && other.max.x <= self.max.x + epsilon &&
        other.min.y >= self.min.y - epsilon && other.max.y <= self.max.y + epsilon &&
        other.min.z >= self.min.z - epsilon && other.max.z <= self.max.z + epsilon
    }

    /// Check if this box intersects another box
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Distance from a point to the closest point of the box (0 if inside)
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        let closest = point.sup(&self.min).inf(&self.max);
        (closest - point).magnitude()
    }

    /// Distance from a point to the furthest corner of the box
    pub fn furthest_distance_to_point(&self, point: &Vec3) -> f32 {
        self.corners()
            .iter()
            .map(|corner| (corner - point).magnitude())
            .fold(0.0, f32::max)
    }

    /// Test ray intersection using the slab method
    ///
    /// Returns the entry point on the box (or the ray origin if it starts inside),
    /// or `None` on a miss. Zero-length directions never intersect.
    /// Based on "An Efficient and Robust Ray–Box Intersection Algorithm".
    pub fn intersect_ray(&self, ray_origin: &Vec3, ray_dir: &Vec3) -> Option<Vec3> {
        if ray_dir.magnitude_squared() <= f32::EPSILON * f32::EPSILON {
            return None;
        }

        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray_origin[axis];
            let dir = ray_dir[axis];
            if dir == 0.0 {
                // Parallel to this slab: must already be between its planes
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let t1 = (self.min[axis] - origin) * inv;
            let t2 = (self.max[axis] - origin) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }

        // Ray intersects if tmax >= tmin and tmax >= 0
        if tmax >= tmin && tmax >= 0.0 {
            Some(ray_origin + ray_dir * tmin.max(0.0))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_contains_point() {
        let aabb = unit_box();
        assert!(aabb.contains_point(&Vec3::zeros()));
        assert!(aabb.contains_point(&Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(&Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0));
        let b = BoundingBox::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let c = BoundingBox::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_union_contains_both() {
        let a = unit_box();
        let b = BoundingBox::at_point(Vec3::new(5.0, 0.0, 0.0));
        let u = a.union(&b);
        assert!(u.contains_box(&a, 0.0));
        assert!(u.contains_box(&b, 0.0));
        assert_eq!(u.max.x, 5.0);
    }

    #[test]
    fn test_transform_translates_and_scales() {
        let m = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let t = unit_box().transform(&m);
        assert_relative_eq!(t.min, Vec3::new(8.0, -1.0, -1.0));
        assert_relative_eq!(t.max, Vec3::new(12.0, 1.0, 1.0));
    }

    #[test]
    fn test_transform_rotation_refits() {
        let m = Mat4::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let t = unit_box().transform(&m);
        let diag = 2.0_f32.sqrt();
        assert_relative_eq!(t.max.x, diag, epsilon = 1e-5);
        assert_relative_eq!(t.min.y, -diag, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_hit_and_miss() {
        let aabb = unit_box();
        let hit = aabb.intersect_ray(&Vec3::new(0.0, 0.0, 5.0), &Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(hit.unwrap(), Vec3::new(0.0, 0.0, 1.0));

        let miss = aabb.intersect_ray(&Vec3::new(0.0, 5.0, 5.0), &Vec3::new(0.0, 0.0, -1.0));
        assert!(miss.is_none());

        let behind = aabb.intersect_ray(&Vec3::new(0.0, 0.0, 5.0), &Vec3::new(0.0, 0.0, 1.0));
        assert!(behind.is_none());
    }

    #[test]
    fn test_ray_from_inside_returns_origin() {
        let aabb = unit_box();
        let origin = Vec3::new(0.25, 0.0, 0.0);
        let hit = aabb.intersect_ray(&origin, &Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(hit.unwrap(), origin);
    }

    #[test]
    fn test_zero_length_ray_never_hits() {
        assert!(unit_box().intersect_ray(&Vec3::zeros(), &Vec3::zeros()).is_none());
    }

    #[test]
    fn test_degenerate_box_ray() {
        let point_box = BoundingBox::at_point(Vec3::new(0.0, 0.0, -3.0));
        let hit = point_box.intersect_ray(&Vec3::zeros(), &Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(hit.unwrap(), Vec3::new(0.0, 0.0, -3.0));
    }

    #[test]
    fn test_distances() {
        let aabb = unit_box();
        let p = Vec3::new(4.0, 0.0, 0.0);
        assert_relative_eq!(aabb.distance_to_point(&p), 3.0);
        assert_relative_eq!(aabb.distance_to_point(&Vec3::zeros()), 0.0);
        assert_relative_eq!(aabb.furthest_distance_to_point(&p), (25.0f32 + 1.0 + 1.0).sqrt());
    }
}
