//! Transform propagation and the constraint pass
//!
//! Local transform, in application order (object space to parent space):
//! scale about the scale pivot, rotate about the rotation pivot, translate.
//!
//! ```text
//! local = T · (P_r · R · P_r⁻¹) · (P_s · S · P_s⁻¹)
//! world = parent_world · local
//! ```
//!
//! The world-rotation accumulator ignores pivots and constraints; it only feeds
//! light and sound orientation.

use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};
use crate::geometry::BoundingBox;
use crate::render::RenderContext;
use crate::scene::{DirtyFlags, Node, NodeKey, Pivot, SceneGraph};

/// Local transform from its components
pub(crate) fn local_transform(
    position: &Vec3,
    rotation: &Quat,
    scale: &Vec3,
    rotation_pivot: Option<&Pivot>,
    scale_pivot: Option<&Pivot>,
) -> Mat4 {
    let mut scaling = Mat4::new_nonuniform_scaling(scale);
    if let Some(pivot) = scale_pivot {
        scaling = scaling.about_pivot(&pivot.matrix, &pivot.inverse);
    }

    let mut rotating = rotation.to_homogeneous();
    if let Some(pivot) = rotation_pivot {
        rotating = rotating.about_pivot(&pivot.matrix, &pivot.inverse);
    }

    Mat4::new_translation(position) * rotating * scaling
}

impl Node {
    /// This node's local transform
    pub fn local_transform(&self) -> Mat4 {
        local_transform(
            &self.position(),
            &self.rotation(),
            &self.scale(),
            self.rotation_pivot(),
            self.scale_pivot(),
        )
    }

    /// Store a new world transform and everything derived from it
    ///
    /// Returns whether the world position moved.
    pub(crate) fn apply_world_transform(&mut self, world: Mat4) -> bool {
        self.world_transform = world;
        let position = world.translation_part();
        let moved = position != self.world_position;
        self.world_position = position;

        self.bounding_box = match self.geometry() {
            Some(geometry) => geometry.bounding_box().transform(&world),
            None => BoundingBox::at_point(position),
        };
        for sound in &mut self.sounds {
            sound.update_world_position(&world);
        }
        if moved {
            self.notify_delegate();
        }
        moved
    }

    /// Recompute world state from the parent's; returns whether the world transform changed
    pub(crate) fn compute_world_state(&mut self, parent_world: &Mat4, parent_rotation: &Mat4) -> bool {
        let previous = self.world_transform;
        let world = parent_world * self.local_transform();
        self.world_rotation = parent_rotation * self.rotation().to_homogeneous();
        self.apply_world_transform(world);
        world != previous
    }
}

impl SceneGraph {
    pub(crate) fn parent_world_state(&self, key: NodeKey) -> (Mat4, Mat4) {
        self.nodes
            .get(key)
            .and_then(|node| node.parent)
            .and_then(|parent| self.nodes.get(parent))
            .map_or_else(
                || (Mat4::identity(), Mat4::identity()),
                |parent| (parent.world_transform, parent.world_rotation),
            )
    }

    /// Transform pass over the subtree at `root`
    ///
    /// Visible nodes are always recomputed. Culled nodes are recomputed only when
    /// their own state or their parent's world transform changed, and culled
    /// subtrees are entered only when something inside them is dirty. Umbrella
    /// boxes are folded bottom-up on the way out.
    pub fn compute_transforms(&mut self, root: NodeKey) {
        self.thread.assert_owner("compute_transforms");
        if !self.nodes.contains_key(root) {
            log::warn!("compute_transforms: node {:?} not found", root);
            return;
        }
        let (parent_world, parent_rotation) = self.parent_world_state(root);
        self.compute_transforms_recursive(root, &parent_world, &parent_rotation, false, false);
    }

    /// Recompute only nodes with pending changes, so the culler sees fresh umbrella boxes
    pub(crate) fn refresh_dirty_transforms(&mut self, root: NodeKey) {
        if !self.nodes.contains_key(root) {
            return;
        }
        let (parent_world, parent_rotation) = self.parent_world_state(root);
        self.compute_transforms_recursive(root, &parent_world, &parent_rotation, false, true);
    }

    fn compute_transforms_recursive(
        &mut self,
        key: NodeKey,
        parent_world: &Mat4,
        parent_rotation: &Mat4,
        parent_changed: bool,
        dirty_only: bool,
    ) {
        let frame = self.frame;
        let node = &mut self.nodes[key];
        let visible = !dirty_only && node.visibility_frame == frame;
        let dirty = node.dirty;

        let mut changed = false;
        let recompute = visible || parent_changed || dirty.contains(DirtyFlags::TRANSFORM);
        if recompute {
            changed = node.compute_world_state(parent_world, parent_rotation);
            self.frame_stats.transforms_computed += 1;
        }
        let descend = visible || changed || dirty.contains(DirtyFlags::DESCENDANT_TRANSFORM);
        node.dirty = DirtyFlags::empty();

        if !recompute && !descend {
            return;
        }

        let world = node.world_transform;
        let rotation = node.world_rotation;
        let child_count = node.children.len();
        if descend {
            for index in 0..child_count {
                let child = self.nodes[key].children[index];
                self.compute_transforms_recursive(child, &world, &rotation, changed, dirty_only);
            }
        }
        self.fold_umbrella(key);
    }

    /// Umbrella = own box ∪ children's umbrellas
    pub(crate) fn fold_umbrella(&mut self, key: NodeKey) {
        let node = &self.nodes[key];
        let mut umbrella = node.bounding_box;
        for child in &node.children {
            umbrella.union_in_place(&self.nodes[*child].umbrella_box);
        }
        self.nodes[key].umbrella_box = umbrella;
    }

    /// Constraint pass over the visible part of the subtree at `root`
    ///
    /// A node whose parent was re-oriented is recomputed from the parent's new
    /// world transform first, whether or not it is visible, and the rest of
    /// its subtree follows. Each constraint's rotation is then applied about
    /// the node's world position. Umbrella boxes along changed paths are
    /// refolded.
    pub fn apply_constraints(&mut self, root: NodeKey, context: &RenderContext) {
        self.thread.assert_owner("apply_constraints");
        if !self.nodes.contains_key(root) {
            log::warn!("apply_constraints: node {:?} not found", root);
            return;
        }
        let (parent_world, _) = self.parent_world_state(root);
        self.apply_constraints_recursive(root, context, &parent_world, false);
    }

    fn apply_constraints_recursive(
        &mut self,
        key: NodeKey,
        context: &RenderContext,
        parent_world: &Mat4,
        parent_updated: bool,
    ) -> bool {
        let frame = self.frame;
        let node = &mut self.nodes[key];
        // Culled nodes still follow a parent that a constraint just moved
        if node.visibility_frame != frame && !parent_updated {
            return false;
        }

        let mut updated = false;
        if parent_updated {
            node.apply_world_transform(parent_world * node.local_transform());
            self.frame_stats.transforms_computed += 1;
            updated = true;
        }

        if !node.constraints.is_empty() {
            let mut world = node.world_transform;
            for (_, constraint) in &node.constraints {
                let rotation = constraint.rotation(&world, context);
                let position = world.translation_part();
                world = Mat4::new_translation(&position) * rotation * Mat4::new_translation(&-position) * world;
            }
            node.apply_world_transform(world);
            updated = true;
        }

        let world = node.world_transform;
        let mut subtree_changed = updated;
        for index in 0..self.nodes[key].children.len() {
            let child = self.nodes[key].children[index];
            subtree_changed |= self.apply_constraints_recursive(child, context, &world, updated);
        }

        if subtree_changed {
            self.fold_umbrella(key);
        }
        subtree_changed
    }

    /// Place a node in world space relative to its parent
    ///
    /// The parent's last computed transforms are used, so call after a
    /// transform pass. Root nodes have no parent frame to solve against.
    pub fn set_world_transform(&mut self, key: NodeKey, world_position: Vec3, world_rotation: Quat) -> SceneResult<()> {
        self.thread.assert_owner("set_world_transform");
        let node = self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))?;
        let parent_key = node.parent.ok_or(SceneError::MissingParent(node.id()))?;
        let parent = self.nodes.get(parent_key).ok_or(SceneError::NodeNotFound(parent_key))?;

        let parent_inverse = parent.world_transform.try_inverse().unwrap_or_else(|| {
            log::warn!("set_world_transform: parent of {} has a singular transform", node.id());
            Mat4::identity()
        });
        let local_position = parent_inverse.transform_vec3_point(&world_position);

        let parent_rotation = Quat::from_matrix(&parent.world_rotation.fixed_view::<3, 3>(0, 0).into_owned());
        let local_rotation = parent_rotation.inverse() * world_rotation;

        if let Some(node) = self.node_mut(key) {
            node.set_position(local_position);
            node.set_rotation(local_rotation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_local_transform_order() {
        let local = local_transform(
            &Vec3::new(1.0, 0.0, 0.0),
            &Quat::identity(),
            &Vec3::new(2.0, 2.0, 2.0),
            None,
            None,
        );
        let point = local.transform_vec3_point(&Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(point, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_scale_pivot_keeps_pivot_fixed() {
        let pivot = Pivot::at(Vec3::new(1.0, 0.0, 0.0));
        let local = local_transform(&Vec3::zeros(), &Quat::identity(), &Vec3::new(3.0, 3.0, 3.0), None, Some(&pivot));
        assert_relative_eq!(local.transform_vec3_point(&Vec3::new(1.0, 0.0, 0.0)), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(local.transform_vec3_point(&Vec3::zeros()), Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn test_rotation_pivot_keeps_pivot_fixed() {
        let pivot = Pivot::at(Vec3::new(1.0, 0.0, 0.0));
        let quarter_turn = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let local = local_transform(&Vec3::zeros(), &quarter_turn, &Vec3::new(1.0, 1.0, 1.0), Some(&pivot), None);
        assert_relative_eq!(
            local.transform_vec3_point(&Vec3::new(1.0, 0.0, 0.0)),
            Vec3::new(1.0, 0.0, 0.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(local.transform_vec3_point(&Vec3::zeros()), Vec3::new(1.0, -1.0, 0.0), epsilon = 1e-5);
    }
}
