//! View frustum and box classification

use crate::foundation::math::{Mat4, Vec3};
use crate::geometry::BoundingBox;

/// Plane defined by normal and distance from origin
///
/// Points with a non-negative signed distance are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance, normalizing both
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::zeros(), distance };
        }
        Self { normal: normal / length, distance: distance / length }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Box corner furthest along the normal (the "positive vertex")
    fn positive_vertex(&self, bounds: &BoundingBox) -> Vec3 {
        Vec3::new(
            if self.normal.x >= 0.0 { bounds.max.x } else { bounds.min.x },
            if self.normal.y >= 0.0 { bounds.max.y } else { bounds.min.y },
            if self.normal.z >= 0.0 { bounds.max.z } else { bounds.min.z },
        )
    }

    /// Box corner furthest against the normal (the "negative vertex")
    fn negative_vertex(&self, bounds: &BoundingBox) -> Vec3 {
        Vec3::new(
            if self.normal.x >= 0.0 { bounds.min.x } else { bounds.max.x },
            if self.normal.y >= 0.0 { bounds.min.y } else { bounds.max.y },
            if self.normal.z >= 0.0 { bounds.min.z } else { bounds.max.z },
        )
    }
}

/// Outcome of classifying a box against the frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumResult {
    /// Box is entirely inside every plane
    Inside,
    /// Box straddles at least one plane
    Intersects,
    /// Box is entirely outside at least one plane
    Outside,
}

/// Per-box bookkeeping reused between frames
///
/// Remembers which plane rejected the box last time so it is tested first;
/// boxes that were outside usually stay outside the same plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrustumBoxMetadata {
    last_rejecting_plane: Option<usize>,
}

impl FrustumBoxMetadata {
    /// Plane index that rejected the box on the previous test, if any
    pub fn last_rejecting_plane(&self) -> Option<usize> {
        self.last_rejecting_plane
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction for OpenGL-style clip space (`-w <= z <= w`),
    /// which is what `nalgebra::Matrix4::new_perspective` produces.
    pub fn from_view_projection(vp_matrix: &Mat4) -> Self {
        let row = |i: usize| {
            let r = vp_matrix.row(i);
            [r[0], r[1], r[2], r[3]]
        };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let combine = |a: [f32; 4], b: [f32; 4], sign: f32| {
            Plane::new(
                Vec3::new(a[0] + sign * b[0], a[1] + sign * b[1], a[2] + sign * b[2]),
                a[3] + sign * b[3],
            )
        };

        Self {
            planes: [
                combine(r3, r0, 1.0),  // left
                combine(r3, r0, -1.0), // right
                combine(r3, r1, 1.0),  // bottom
                combine(r3, r1, -1.0), // top
                combine(r3, r2, 1.0),  // near
                combine(r3, r2, -1.0), // far
            ],
        }
    }

    /// Check if a point is inside the frustum
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Classify a box, without metadata
    pub fn classify_box(&self, bounds: &BoundingBox) -> FrustumResult {
        let mut metadata = FrustumBoxMetadata::default();
        self.classify_box_with_metadata(bounds, &mut metadata)
    }

    /// Classify a box, testing the previously rejecting plane first
    pub fn classify_box_with_metadata(
        &self,
        bounds: &BoundingBox,
        metadata: &mut FrustumBoxMetadata,
    ) -> FrustumResult {
        let start = metadata.last_rejecting_plane.unwrap_or(0);
        let mut intersects = false;

        for offset in 0..self.planes.len() {
            let index = (start + offset) % self.planes.len();
            let plane = &self.planes[index];

            if plane.distance_to_point(&plane.positive_vertex(bounds)) < 0.0 {
                metadata.last_rejecting_plane = Some(index);
                return FrustumResult::Outside;
            }
            if plane.distance_to_point(&plane.negative_vertex(bounds)) < 0.0 {
                intersects = true;
            }
        }

        metadata.last_rejecting_plane = None;
        if intersects {
            FrustumResult::Intersects
        } else {
            FrustumResult::Inside
        }
    }
}
