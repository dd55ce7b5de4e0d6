//! Cross-thread mirror of node transform state
//!
//! Each field is an independent sequence-locked cell of `f32`s stored as
//! `AtomicU32` bits. Readers never block; writers spin only against another
//! writer of the same field. There is no consistency across fields: a reader
//! may see a new position next to a bounding box from an earlier update.
//!
//! The link to the parent's mirror is the one lock on this path. Getters never
//! touch it. Setters take a shared read of it, and only
//! [`crate::scene::SceneGraph::sync_atomic_state`] takes it for writing, when
//! the tree is relinked.
//!
//! Atomic setters recompute this node's own world state from the parent's last
//! published state. They never walk children and never touch the umbrella box,
//! since the child list belongs to the render thread.
//! [`crate::scene::SceneGraph::sync_atomic_state`] republishes a whole subtree
//! from the authoritative render-thread state.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use nalgebra::Quaternion;

use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};
use crate::geometry::BoundingBox;
use crate::scene::transform::local_transform;
use crate::scene::{Node, NodeKey, Pivot, SceneGraph};

/// Sequence-locked array of `N` floats
struct SeqCell<const N: usize> {
    sequence: AtomicU64,
    values: [AtomicU32; N],
}

impl<const N: usize> SeqCell<N> {
    fn new(initial: [f32; N]) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            values: initial.map(|value| AtomicU32::new(bytemuck::cast(value))),
        }
    }

    fn load(&self) -> [f32; N] {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let values: [f32; N] =
                std::array::from_fn(|i| bytemuck::cast(self.values[i].load(Ordering::Relaxed)));

            fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return values;
            }
        }
    }

    fn store(&self, values: [f32; N]) {
        let mut sequence = self.sequence.load(Ordering::Relaxed);
        loop {
            if sequence & 1 == 0 {
                match self.sequence.compare_exchange_weak(
                    sequence,
                    sequence + 1,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(current) => sequence = current,
                }
            } else {
                std::hint::spin_loop();
                sequence = self.sequence.load(Ordering::Relaxed);
            }
        }
        fence(Ordering::Release);

        for (cell, value) in self.values.iter().zip(values) {
            cell.store(bytemuck::cast(value), Ordering::Relaxed);
        }

        self.sequence.store(sequence + 2, Ordering::Release);
    }
}

fn vec3_to_array(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

fn array_to_vec3(a: [f32; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

fn box_to_array(b: &BoundingBox) -> [f32; 6] {
    [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]
}

fn array_to_box(a: [f32; 6]) -> BoundingBox {
    BoundingBox::new(Vec3::new(a[0], a[1], a[2]), Vec3::new(a[3], a[4], a[5]))
}

fn quat_to_array(q: &Quat) -> [f32; 4] {
    let q = q.quaternion();
    [q.i, q.j, q.k, q.w]
}

fn array_to_quat(a: [f32; 4]) -> Quat {
    Quat::new_normalize(Quaternion::new(a[3], a[0], a[1], a[2]))
}

/// Thread-safe snapshot of one node's transform state
pub struct AtomicNodeState {
    position: SeqCell<3>,
    rotation: SeqCell<4>,
    scale: SeqCell<3>,
    transform: SeqCell<16>,
    world_position: SeqCell<3>,
    world_rotation: SeqCell<16>,
    bounding_box: SeqCell<6>,
    umbrella_box: SeqCell<6>,
    local_bounds: SeqCell<6>,
    has_geometry: AtomicBool,
    rotation_pivot: SeqCell<16>,
    scale_pivot: SeqCell<16>,
    parent: RwLock<Weak<AtomicNodeState>>,
}

impl AtomicNodeState {
    pub(crate) fn new() -> Self {
        let identity = Mat4::identity().to_column_array();
        Self {
            position: SeqCell::new([0.0; 3]),
            rotation: SeqCell::new(quat_to_array(&Quat::identity())),
            scale: SeqCell::new([1.0; 3]),
            transform: SeqCell::new(identity),
            world_position: SeqCell::new([0.0; 3]),
            world_rotation: SeqCell::new(identity),
            bounding_box: SeqCell::new([0.0; 6]),
            umbrella_box: SeqCell::new([0.0; 6]),
            local_bounds: SeqCell::new([0.0; 6]),
            has_geometry: AtomicBool::new(false),
            rotation_pivot: SeqCell::new(identity),
            scale_pivot: SeqCell::new(identity),
            parent: RwLock::new(Weak::new()),
        }
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        array_to_vec3(self.position.load())
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        array_to_quat(self.rotation.load())
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        array_to_vec3(self.scale.load())
    }

    /// World transform
    pub fn transform(&self) -> Mat4 {
        Mat4::from_column_array(&self.transform.load())
    }

    /// World position
    pub fn world_position(&self) -> Vec3 {
        array_to_vec3(self.world_position.load())
    }

    /// World rotation
    pub fn world_rotation(&self) -> Mat4 {
        Mat4::from_column_array(&self.world_rotation.load())
    }

    /// World bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        array_to_box(self.bounding_box.load())
    }

    /// Umbrella box as of the last sync
    pub fn umbrella_box(&self) -> BoundingBox {
        array_to_box(self.umbrella_box.load())
    }

    /// Set the local position and recompute this node's own world state
    pub fn set_position(&self, position: Vec3) {
        self.position.store(vec3_to_array(&position));
        self.recompute();
    }

    /// Set the local rotation and recompute this node's own world state
    pub fn set_rotation(&self, rotation: Quat) {
        self.rotation.store(quat_to_array(&rotation));
        self.recompute();
    }

    /// Set the local scale and recompute this node's own world state
    pub fn set_scale(&self, scale: Vec3) {
        self.scale.store(vec3_to_array(&scale));
        self.recompute();
    }

    fn parent(&self) -> Option<Arc<AtomicNodeState>> {
        self.parent
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }

    pub(crate) fn set_parent(&self, parent: Option<&Arc<AtomicNodeState>>) {
        let mut link = self.parent.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *link = parent.map_or_else(Weak::new, Arc::downgrade);
    }

    fn load_pivot(cell: &SeqCell<16>) -> Option<Pivot> {
        let matrix = Mat4::from_column_array(&cell.load());
        if matrix == Mat4::identity() {
            None
        } else {
            Pivot::from_matrix(matrix)
        }
    }

    fn recompute(&self) {
        let (parent_transform, parent_rotation) = self
            .parent()
            .map_or_else(|| (Mat4::identity(), Mat4::identity()), |p| (p.transform(), p.world_rotation()));

        let rotation = self.rotation();
        let local = local_transform(
            &self.position(),
            &rotation,
            &self.scale(),
            Self::load_pivot(&self.rotation_pivot).as_ref(),
            Self::load_pivot(&self.scale_pivot).as_ref(),
        );
        let world = parent_transform * local;
        let world_position = world.translation_part();
        let bounds = if self.has_geometry.load(Ordering::Acquire) {
            array_to_box(self.local_bounds.load()).transform(&world)
        } else {
            BoundingBox::at_point(world_position)
        };

        self.transform.store(world.to_column_array());
        self.world_position.store(vec3_to_array(&world_position));
        self.world_rotation.store((parent_rotation * rotation.to_homogeneous()).to_column_array());
        self.bounding_box.store(box_to_array(&bounds));
    }

    /// Copy the node's render-thread state into the mirror
    pub(crate) fn publish(&self, node: &Node) {
        self.position.store(vec3_to_array(&node.position()));
        self.rotation.store(quat_to_array(&node.rotation()));
        self.scale.store(vec3_to_array(&node.scale()));
        self.transform.store(node.world_transform().to_column_array());
        self.world_position.store(vec3_to_array(&node.world_position()));
        self.world_rotation.store(node.world_rotation().to_column_array());
        self.bounding_box.store(box_to_array(&node.bounding_box()));
        self.umbrella_box.store(box_to_array(&node.umbrella_box()));

        match node.geometry() {
            Some(geometry) => {
                self.local_bounds.store(box_to_array(&geometry.bounding_box()));
                self.has_geometry.store(true, Ordering::Release);
            }
            None => self.has_geometry.store(false, Ordering::Release),
        }

        let identity = Mat4::identity();
        self.rotation_pivot
            .store(node.rotation_pivot().map_or(identity, |p| p.matrix).to_column_array());
        self.scale_pivot
            .store(node.scale_pivot().map_or(identity, |p| p.matrix).to_column_array());
    }
}

impl SceneGraph {
    /// Overwrite the atomic mirror of every node under `root` with render-thread state
    ///
    /// Values written through [`AtomicNodeState`] setters since the last sync are
    /// discarded. Parent links are re-established from the current topology.
    pub fn sync_atomic_state(&self, root: NodeKey) {
        self.thread.assert_owner("sync_atomic_state");
        if !self.nodes.contains_key(root) {
            log::warn!("sync_atomic_state: node {:?} not found", root);
            return;
        }
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            let parent = node.parent.map(|parent| &self.nodes[parent].atomic);
            node.atomic.set_parent(parent);
            node.atomic.publish(node);
            stack.extend(node.children.iter().copied());
        }
    }
}

impl Default for AtomicNodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomicNodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicNodeState")
            .field("position", &self.position())
            .field("world_position", &self.world_position())
            .finish_non_exhaustive()
    }
}
