//! Post-transform orientation constraints

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Rotation3, UnitQuaternion};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::RenderContext;

static NEXT_CONSTRAINT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle used to remove a constraint from its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(u64);

impl ConstraintId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONSTRAINT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Adjusts a node's orientation after its world transform is known
///
/// The returned rotation is applied about the node's world position.
pub trait Constraint: Send {
    /// Rotation to apply, given the node's current world transform
    fn rotation(&self, world_transform: &Mat4, context: &RenderContext) -> Mat4;
}

/// Axis a billboard is allowed to turn around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillboardAxis {
    /// Turn freely to face the camera
    #[default]
    Free,
    /// Turn around the world X axis only
    X,
    /// Turn around the world Y axis only
    Y,
    /// Turn around the world Z axis only
    Z,
}

/// Keeps the node's local +Z axis pointed at the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BillboardConstraint {
    /// Rotation freedom
    pub axis: BillboardAxis,
}

impl BillboardConstraint {
    /// Create a billboard with the given rotation freedom
    pub fn new(axis: BillboardAxis) -> Self {
        Self { axis }
    }
}

impl Constraint for BillboardConstraint {
    fn rotation(&self, world_transform: &Mat4, context: &RenderContext) -> Mat4 {
        let position = world_transform.translation_part();
        let mut to_camera = context.camera.position - position;
        let up = match self.axis {
            BillboardAxis::Free => Vec3::y(),
            BillboardAxis::X => {
                to_camera.x = 0.0;
                Vec3::x()
            }
            BillboardAxis::Y => {
                to_camera.y = 0.0;
                Vec3::y()
            }
            BillboardAxis::Z => {
                to_camera.z = 0.0;
                Vec3::z()
            }
        };

        let Some(direction) = to_camera.try_normalize(f32::EPSILON) else {
            return Mat4::identity();
        };
        // face_towards needs an up vector that is not parallel to the direction
        let up = if direction.cross(&up).norm_squared() <= f32::EPSILON {
            if up == Vec3::z() { Vec3::y() } else { Vec3::z() }
        } else {
            up
        };

        let facing = Rotation3::face_towards(&direction, &up);

        let basis = world_transform.fixed_view::<3, 3>(0, 0);
        let current = UnitQuaternion::from_matrix(&basis.into_owned());
        (facing * current.to_rotation_matrix().inverse()).to_homogeneous()
    }
}
