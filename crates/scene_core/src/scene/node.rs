//! Scene node data model
//!
//! A [`Node`] owns its local transform state, render flags and attachments.
//! Topology (parent and children) and everything derived per frame are
//! maintained by [`crate::scene::SceneGraph`]; nodes only expose them read-only.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::foundation::diagnostics;
use crate::foundation::math::{utils, Mat4, Quat, Vec3};
use crate::geometry::{BoundingBox, FrustumBoxMetadata};
use crate::render::{Geometry, Light, LightId, SortKey};
use crate::scene::animation::{AnimatedProperty, AnimationTag, PropertyAnimation, Transaction};
use crate::scene::atomic::AtomicNodeState;
use crate::scene::{
    Action, ActionId, Constraint, ConstraintId, ExecutableAnimation, ParticleEmitter, PhysicsBody, Scene,
    Sound, TransformDelegate,
};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Visibility stamp of a node that has never passed frustum testing
pub(crate) const NEVER_VISIBLE: u64 = u64::MAX;

/// Process-unique node identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn raw(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

slotmap::new_key_type! {
    /// Arena handle of a node inside a [`crate::scene::SceneGraph`]
    pub struct NodeKey;
}

/// Closed set of node roles checked during sort-key collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    /// Ordinary node
    #[default]
    Normal,
    /// Entry to a separately rendered space; not descended into when collecting keys
    Portal,
    /// Frame around a portal; contributes no keys of its own
    PortalFrame,
}

/// Pivot matrix with its cached inverse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    /// Pivot transform
    pub matrix: Mat4,
    /// Cached inverse of `matrix`
    pub inverse: Mat4,
}

impl Pivot {
    /// Pivot from an arbitrary matrix; `None` when it cannot be inverted
    pub fn from_matrix(matrix: Mat4) -> Option<Self> {
        matrix.try_inverse().map(|inverse| Self { matrix, inverse })
    }

    /// Pivot at a local-space offset
    pub fn at(offset: Vec3) -> Self {
        Self {
            matrix: Mat4::new_translation(&offset),
            inverse: Mat4::new_translation(&-offset),
        }
    }
}

bitflags::bitflags! {
    /// Pending transform work for a node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        /// The node's own local state or geometry changed
        const TRANSFORM = 1 << 0;
        /// Some descendant has pending transform work
        const DESCENDANT_TRANSFORM = 1 << 1;
    }
}

/// Named-animation registry entry list
type AnimationList = Vec<Box<dyn ExecutableAnimation>>;

/// Element of the scene tree
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    name: Option<String>,

    // Local transform
    position: Vec3,
    rotation: Quat,
    euler: Vec3,
    scale: Vec3,
    rotation_pivot: Option<Pivot>,
    scale_pivot: Option<Pivot>,

    // Render-affecting state
    opacity: f32,
    hidden: bool,
    hidden_opacity: f32,
    hierarchical: bool,
    rendering_order: i32,
    selectable: bool,
    high_accuracy_gaze: bool,
    light_receiving_mask: u32,
    shadow_casting_mask: u32,

    // Computed each frame
    pub(crate) world_transform: Mat4,
    pub(crate) inverse_transpose: Mat4,
    pub(crate) world_rotation: Mat4,
    pub(crate) world_position: Vec3,
    pub(crate) bounding_box: BoundingBox,
    pub(crate) umbrella_box: BoundingBox,
    pub(crate) computed_opacity: f32,
    pub(crate) computed_lights: Vec<Light>,
    pub(crate) lights_hash: u64,
    pub(crate) sort_keys: Vec<SortKey>,
    pub(crate) visibility_frame: u64,
    pub(crate) frustum_metadata: FrustumBoxMetadata,
    pub(crate) dirty: DirtyFlags,

    // Topology, maintained by the graph
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    // Attachments
    geometry: Option<Arc<dyn Geometry>>,
    pub(crate) lights: Vec<Light>,
    pub(crate) sounds: Vec<Sound>,
    pub(crate) particle_emitter: Option<Box<dyn ParticleEmitter>>,
    pub(crate) physics_body: Option<PhysicsBody>,
    pub(crate) constraints: Vec<(ConstraintId, Box<dyn Constraint>)>,
    animations: HashMap<String, AnimationList>,
    property_animations: Vec<PropertyAnimation>,
    actions: Vec<Action>,
    executing_actions: bool,
    cancelled_actions: Vec<ActionId>,
    actions_cleared: bool,
    pub(crate) scene: Option<Weak<Scene>>,
    transform_delegate: Option<Weak<dyn TransformDelegate>>,

    pub(crate) atomic: Arc<AtomicNodeState>,
}

impl Node {
    /// Create an unparented node at the origin
    pub fn new() -> Self {
        diagnostics::node_allocated();
        Self {
            id: NodeId::next(),
            kind: NodeKind::Normal,
            name: None,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            euler: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation_pivot: None,
            scale_pivot: None,
            opacity: 1.0,
            hidden: false,
            hidden_opacity: 1.0,
            hierarchical: false,
            rendering_order: 0,
            selectable: true,
            high_accuracy_gaze: false,
            light_receiving_mask: 1,
            shadow_casting_mask: 1,
            world_transform: Mat4::identity(),
            inverse_transpose: Mat4::identity(),
            world_rotation: Mat4::identity(),
            world_position: Vec3::zeros(),
            bounding_box: BoundingBox::default(),
            umbrella_box: BoundingBox::default(),
            computed_opacity: 1.0,
            computed_lights: Vec::new(),
            lights_hash: 0,
            sort_keys: Vec::new(),
            visibility_frame: NEVER_VISIBLE,
            frustum_metadata: FrustumBoxMetadata::default(),
            dirty: DirtyFlags::TRANSFORM,
            parent: None,
            children: Vec::new(),
            geometry: None,
            lights: Vec::new(),
            sounds: Vec::new(),
            particle_emitter: None,
            physics_body: None,
            constraints: Vec::new(),
            animations: HashMap::new(),
            property_animations: Vec::new(),
            actions: Vec::new(),
            executing_actions: false,
            cancelled_actions: Vec::new(),
            actions_cleared: false,
            scene: None,
            transform_delegate: None,
            atomic: Arc::new(AtomicNodeState::new()),
        }
    }

    /// Builder pattern: set a name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder pattern: set the local position immediately
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.write_position(position);
        self
    }

    /// Builder pattern: set the local scale immediately
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.write_scale(scale);
        self
    }

    /// Builder pattern: attach geometry
    pub fn with_geometry(mut self, geometry: Arc<dyn Geometry>) -> Self {
        self.set_geometry(Some(geometry));
        self
    }

    /// Copy of this node's own state for subtree cloning
    ///
    /// The copy gets a new id and shares geometry. Physics body, particle
    /// emitter, constraints, animations, actions, scene and delegate are not
    /// carried over.
    pub(crate) fn duplicate(&self) -> Node {
        let mut copy = Node::new();
        copy.kind = self.kind;
        copy.name = self.name.clone();
        copy.position = self.position;
        copy.rotation = self.rotation;
        copy.euler = self.euler;
        copy.scale = self.scale;
        copy.rotation_pivot = self.rotation_pivot;
        copy.scale_pivot = self.scale_pivot;
        copy.opacity = self.opacity;
        copy.hidden = self.hidden;
        copy.hidden_opacity = self.hidden_opacity;
        copy.hierarchical = self.hierarchical;
        copy.rendering_order = self.rendering_order;
        copy.selectable = self.selectable;
        copy.high_accuracy_gaze = self.high_accuracy_gaze;
        copy.light_receiving_mask = self.light_receiving_mask;
        copy.shadow_casting_mask = self.shadow_casting_mask;
        copy.geometry = self.geometry.clone();
        copy.lights = self.lights.clone();
        copy.sounds = self.sounds.clone();
        copy
    }

    // ---------------------------------------------------------------------
    // Identity

    /// Process-unique id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Role tag
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Set the role tag
    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    /// Optional display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the display name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Parent key, if attached
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child keys in order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    // ---------------------------------------------------------------------
    // Local transform

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local rotation as XYZ Euler angles in `[0, 2π)`
    pub fn euler_angles(&self) -> Vec3 {
        self.euler
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Rotation pivot
    pub fn rotation_pivot(&self) -> Option<&Pivot> {
        self.rotation_pivot.as_ref()
    }

    /// Scale pivot
    pub fn scale_pivot(&self) -> Option<&Pivot> {
        self.scale_pivot.as_ref()
    }

    /// Set the local position, animated by the current transaction
    pub fn set_position(&mut self, position: Vec3) {
        self.animate_or_apply(AnimatedProperty::Position { from: self.position, to: position });
    }

    /// Set the local rotation, animated by the current transaction
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.animate_or_apply(AnimatedProperty::Rotation { from: self.rotation, to: rotation });
    }

    /// Set the local rotation from XYZ Euler angles, animated per axis
    pub fn set_euler_angles(&mut self, euler: Vec3) {
        self.animate_or_apply(AnimatedProperty::Euler { from: self.euler, to: euler });
    }

    /// Set the Euler X angle only
    pub fn set_euler_x(&mut self, angle: f32) {
        self.set_euler_angles(Vec3::new(angle, self.euler.y, self.euler.z));
    }

    /// Set the Euler Y angle only
    pub fn set_euler_y(&mut self, angle: f32) {
        self.set_euler_angles(Vec3::new(self.euler.x, angle, self.euler.z));
    }

    /// Set the Euler Z angle only
    pub fn set_euler_z(&mut self, angle: f32) {
        self.set_euler_angles(Vec3::new(self.euler.x, self.euler.y, angle));
    }

    /// Set the local scale, animated by the current transaction
    pub fn set_scale(&mut self, scale: Vec3) {
        self.animate_or_apply(AnimatedProperty::Scale { from: self.scale, to: scale });
    }

    /// Set the X scale only
    pub fn set_scale_x(&mut self, value: f32) {
        self.set_scale(Vec3::new(value, self.scale.y, self.scale.z));
    }

    /// Set the Y scale only
    pub fn set_scale_y(&mut self, value: f32) {
        self.set_scale(Vec3::new(self.scale.x, value, self.scale.z));
    }

    /// Set the Z scale only
    pub fn set_scale_z(&mut self, value: f32) {
        self.set_scale(Vec3::new(self.scale.x, self.scale.y, value));
    }

    /// Set or clear the rotation pivot
    pub fn set_rotation_pivot(&mut self, pivot: Option<Pivot>) {
        self.rotation_pivot = pivot;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    /// Set or clear the scale pivot
    pub fn set_scale_pivot(&mut self, pivot: Option<Pivot>) {
        self.scale_pivot = pivot;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub(crate) fn write_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub(crate) fn write_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.euler = utils::quat_to_euler(&rotation);
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub(crate) fn write_euler(&mut self, euler: Vec3) {
        self.euler = utils::normalize_angles_2pi(euler);
        self.rotation = utils::quat_from_euler(self.euler);
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub(crate) fn write_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub(crate) fn write_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub(crate) fn write_hidden_opacity(&mut self, opacity: f32) {
        self.hidden_opacity = opacity.clamp(0.0, 1.0);
    }

    // ---------------------------------------------------------------------
    // Render state

    /// Explicit opacity
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the explicit opacity (clamped to `[0, 1]`), animated by the current transaction
    pub fn set_opacity(&mut self, opacity: f32) {
        self.animate_or_apply(AnimatedProperty::Opacity { from: self.opacity, to: opacity.clamp(0.0, 1.0) });
    }

    /// Whether the node is flagged hidden
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Current hide/show multiplier
    pub fn hidden_opacity(&self) -> f32 {
        self.hidden_opacity
    }

    /// Hide or show; the multiplier fades over the current transaction's duration
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
        let to = if hidden { 0.0 } else { 1.0 };
        self.animate_or_apply(AnimatedProperty::HiddenOpacity { from: self.hidden_opacity, to });
    }

    /// Whether this node starts a hierarchical rendering group
    pub fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    /// Group this node's subtree for rendering
    pub fn set_hierarchical(&mut self, hierarchical: bool) {
        self.hierarchical = hierarchical;
    }

    /// Explicit render-order tie break
    pub fn rendering_order(&self) -> i32 {
        self.rendering_order
    }

    /// Set the render-order tie break
    pub fn set_rendering_order(&mut self, order: i32) {
        self.rendering_order = order;
    }

    /// Whether hit testing considers this node
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Include or exclude this node (not its children) from hit testing
    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    /// Whether hit testing always uses exact geometry for this node
    pub fn high_accuracy_gaze(&self) -> bool {
        self.high_accuracy_gaze
    }

    /// Force exact geometry hit testing for this node
    pub fn set_high_accuracy_gaze(&mut self, enabled: bool) {
        self.high_accuracy_gaze = enabled;
    }

    /// Lights whose influence mask shares a bit with this mask light the node
    pub fn light_receiving_mask(&self) -> u32 {
        self.light_receiving_mask
    }

    /// Set the light-receiving mask
    pub fn set_light_receiving_mask(&mut self, mask: u32) {
        self.light_receiving_mask = mask;
    }

    /// Shadow-casting mask
    pub fn shadow_casting_mask(&self) -> u32 {
        self.shadow_casting_mask
    }

    /// Set the shadow-casting mask
    pub fn set_shadow_casting_mask(&mut self, mask: u32) {
        self.shadow_casting_mask = mask;
    }

    // ---------------------------------------------------------------------
    // Computed state

    /// World transform as of the last transform or constraint pass
    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    /// Inverse-transpose of the world transform, as of the last sort-key pass
    pub fn inverse_transpose(&self) -> Mat4 {
        self.inverse_transpose
    }

    /// Accumulated world rotation (pivots and constraints excluded)
    pub fn world_rotation(&self) -> Mat4 {
        self.world_rotation
    }

    /// World position
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// World bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Union of this node's box and every descendant's box
    pub fn umbrella_box(&self) -> BoundingBox {
        self.umbrella_box
    }

    /// Cumulative opacity as of the last sort-key pass
    pub fn computed_opacity(&self) -> f32 {
        self.computed_opacity
    }

    /// Lights affecting this node as of the last sort-key pass
    pub fn computed_lights(&self) -> &[Light] {
        &self.computed_lights
    }

    /// Hash of [`Node::computed_lights`]
    pub fn lights_hash(&self) -> u64 {
        self.lights_hash
    }

    /// Keys produced for this node by the last sort-key pass
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort_keys
    }

    /// Pending transform work
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    // ---------------------------------------------------------------------
    // Attachments

    /// Attached geometry
    pub fn geometry(&self) -> Option<&Arc<dyn Geometry>> {
        self.geometry.as_ref()
    }

    /// Attach or detach geometry
    pub fn set_geometry(&mut self, geometry: Option<Arc<dyn Geometry>>) {
        self.geometry = geometry;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    /// Attached lights
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Attach a light; it illuminates this node's subtree
    pub fn add_light(&mut self, light: Light) -> LightId {
        let id = light.id();
        self.lights.push(light);
        id
    }

    /// Detach a light
    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        let index = self.lights.iter().position(|light| light.id() == id)?;
        Some(self.lights.remove(index))
    }

    /// Attached sounds
    pub fn sounds(&self) -> &[Sound] {
        &self.sounds
    }

    /// Attach a sound
    pub fn add_sound(&mut self, sound: Sound) {
        self.sounds.push(sound);
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    /// Attach or detach a particle emitter
    pub fn set_particle_emitter(&mut self, emitter: Option<Box<dyn ParticleEmitter>>) {
        self.particle_emitter = emitter;
    }

    /// Whether a particle emitter is attached
    pub fn has_particle_emitter(&self) -> bool {
        self.particle_emitter.is_some()
    }

    /// Attached physics body
    pub fn physics_body(&self) -> Option<&PhysicsBody> {
        self.physics_body.as_ref()
    }

    /// Owning scene, if attached and still alive
    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.as_ref().and_then(Weak::upgrade)
    }

    /// Set or clear the world-position observer
    pub fn set_transform_delegate(&mut self, delegate: Option<Weak<dyn TransformDelegate>>) {
        self.transform_delegate = delegate;
    }

    pub(crate) fn notify_delegate(&self) {
        if let Some(delegate) = self.transform_delegate.as_ref().and_then(Weak::upgrade) {
            delegate.world_position_changed(self.id, self.world_position);
        }
    }

    /// Thread-safe transform mirror
    pub fn atomic_state(&self) -> Arc<AtomicNodeState> {
        self.atomic.clone()
    }

    // ---------------------------------------------------------------------
    // Constraints

    /// Append a constraint; constraints apply in attachment order
    pub fn add_constraint(&mut self, constraint: Box<dyn Constraint>) -> ConstraintId {
        let id = ConstraintId::next();
        self.constraints.push((id, constraint));
        id
    }

    /// Remove one constraint
    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|(existing, _)| *existing != id);
        self.constraints.len() != before
    }

    /// Remove every constraint
    pub fn remove_all_constraints(&mut self) {
        self.constraints.clear();
    }

    /// Number of constraints
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // ---------------------------------------------------------------------
    // Property animations

    fn animate_or_apply(&mut self, property: AnimatedProperty) {
        let duration = Transaction::animation_duration();
        if duration <= 0.0 {
            self.property_animations.retain(|a| a.property().target() != property.target());
            property.apply_at(1.0, self);
        } else {
            self.add_property_animation(PropertyAnimation::new(property, duration, Transaction::timing_function()));
        }
    }

    /// Queue a property animation, replacing any running on the same property
    pub fn add_property_animation(&mut self, animation: PropertyAnimation) {
        let target = animation.property().target();
        self.property_animations.retain(|a| a.property().target() != target);
        self.property_animations.push(animation);
    }

    /// Whether any property animation is queued
    pub fn has_property_animations(&self) -> bool {
        !self.property_animations.is_empty()
    }

    /// Advance queued property animations; returns whether any value changed
    pub fn advance_property_animations(&mut self, delta_time: f32) -> bool {
        if self.property_animations.is_empty() {
            return false;
        }
        let mut running = std::mem::take(&mut self.property_animations);
        let mut changed = false;
        running.retain_mut(|animation| {
            changed |= animation.advance(delta_time, self);
            !animation.is_finished()
        });
        // Animations queued while advancing replace running ones on the same property
        let added = std::mem::replace(&mut self.property_animations, running);
        for animation in added {
            self.add_property_animation(animation);
        }
        changed
    }

    pub(crate) fn has_property_animations_owned_by(&self, tag: AnimationTag) -> bool {
        self.property_animations.iter().any(|a| a.owner() == Some(tag))
    }

    pub(crate) fn set_property_animations_paused(&mut self, tag: AnimationTag, paused: bool) {
        for animation in self.property_animations.iter_mut().filter(|a| a.owner() == Some(tag)) {
            animation.set_paused(paused);
        }
    }

    pub(crate) fn remove_property_animations_owned_by(&mut self, tag: AnimationTag) {
        self.property_animations.retain(|a| a.owner() != Some(tag));
    }

    // ---------------------------------------------------------------------
    // Named animations

    /// Register an animation under `name` and start it immediately
    ///
    /// Registration and start are one step: `execute` runs before this returns,
    /// so there is no need to call [`Node::run_animation`] afterwards. That call
    /// resumes animations that were paused. Several animations may share a
    /// name; they run side by side.
    pub fn add_animation(&mut self, name: impl Into<String>, mut animation: Box<dyn ExecutableAnimation>) {
        animation.execute(self);
        self.animations.entry(name.into()).or_default().push(animation);
    }

    /// Terminate and drop every animation registered under `name`
    pub fn remove_animation(&mut self, name: &str) -> bool {
        let Some(mut list) = self.animations.remove(name) else {
            return false;
        };
        for animation in &mut list {
            animation.terminate(self);
        }
        true
    }

    /// Terminate and drop every named animation
    pub fn remove_all_animations(&mut self) {
        let all = std::mem::take(&mut self.animations);
        for (_, mut list) in all {
            for animation in &mut list {
                animation.terminate(self);
            }
        }
    }

    /// Start or resume the animations under `name`
    pub fn run_animation(&mut self, name: &str) -> bool {
        self.with_animations(name, |animation, node| animation.execute(node))
    }

    /// Pause the animations under `name`
    pub fn pause_animation(&mut self, name: &str) -> bool {
        self.with_animations(name, |animation, node| animation.pause(node))
    }

    /// Whether any animation under `name` is still running
    pub fn is_animation_running(&self, name: &str) -> bool {
        self.animations
            .get(name)
            .is_some_and(|list| list.iter().any(|animation| animation.is_running(self)))
    }

    /// Names with registered animations
    pub fn animation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.animations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn with_animations(
        &mut self,
        name: &str,
        mut f: impl FnMut(&mut Box<dyn ExecutableAnimation>, &mut Node),
    ) -> bool {
        let Some(mut list) = self.animations.remove(name) else {
            return false;
        };
        for animation in &mut list {
            f(animation, self);
        }
        // Animations added under the same name by a callback stay after the existing ones
        if let Some(added) = self.animations.remove(name) {
            list.extend(added);
        }
        self.animations.insert(name.to_string(), list);
        true
    }

    // ---------------------------------------------------------------------
    // Actions

    /// Schedule an action
    pub fn run_action(&mut self, action: Action) -> ActionId {
        let id = action.id();
        self.actions.push(action);
        id
    }

    /// Cancel an action; safe to call from inside an executing action
    pub fn remove_action(&mut self, id: ActionId) -> bool {
        let before = self.actions.len();
        self.actions.retain(|action| action.id() != id);
        if self.actions.len() != before {
            return true;
        }
        if self.executing_actions {
            self.cancelled_actions.push(id);
            return true;
        }
        false
    }

    /// Cancel every action
    pub fn remove_all_actions(&mut self) {
        self.actions.clear();
        if self.executing_actions {
            self.actions_cleared = true;
        }
    }

    /// Whether any action is scheduled
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Execute scheduled actions once; returns how many ran
    pub(crate) fn run_actions(&mut self, delta_time: f32) -> u32 {
        if self.actions.is_empty() {
            return 0;
        }
        let mut running = std::mem::take(&mut self.actions);
        self.executing_actions = true;
        let mut executed = 0;

        running.retain_mut(|action| {
            if self.actions_cleared || self.cancelled_actions.contains(&action.id()) {
                return false;
            }
            executed += 1;
            action.execute(self, delta_time)
        });

        self.executing_actions = false;
        if self.actions_cleared {
            running.clear();
        }
        running.retain(|action| !self.cancelled_actions.contains(&action.id()));
        self.cancelled_actions.clear();
        self.actions_cleared = false;

        let added = std::mem::replace(&mut self.actions, running);
        self.actions.extend(added);
        executed
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        diagnostics::node_released();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("scale", &self.scale)
            .field("world_position", &self.world_position)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants;
    use crate::render::Mesh;
    use approx::assert_relative_eq;

    #[test]
    fn test_ids_are_unique() {
        let a = Node::new();
        let b = Node::new();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_euler_is_normalized() {
        let mut node = Node::new();
        node.set_euler_angles(Vec3::new(-constants::PI / 2.0, 0.0, 0.0));
        assert_relative_eq!(node.euler_angles().x, 1.5 * constants::PI, epsilon = 1e-5);
    }

    #[test]
    fn test_per_axis_scale() {
        let mut node = Node::new();
        node.set_scale_y(3.0);
        assert_eq!(node.scale(), Vec3::new(1.0, 3.0, 1.0));
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut node = Node::new();
        node.dirty = DirtyFlags::empty();
        node.set_opacity(0.5);
        assert!(node.dirty_flags().is_empty());
        node.set_position(Vec3::x());
        assert!(node.dirty_flags().contains(DirtyFlags::TRANSFORM));
    }

    #[test]
    fn test_duplicate_shares_geometry_but_not_behaviour() {
        let mesh: Arc<dyn Geometry> = Arc::new(Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0)));
        let mut node = Node::new().with_name("crate").with_geometry(mesh.clone());
        node.add_constraint(Box::new(crate::scene::BillboardConstraint::default()));
        node.run_action(Action::new(crate::scene::ActionKind::PerFrame, |_, _| {}));

        let copy = node.duplicate();
        assert_ne!(copy.id(), node.id());
        assert_eq!(copy.name(), Some("crate"));
        assert!(Arc::ptr_eq(copy.geometry().unwrap(), &mesh));
        assert_eq!(copy.constraint_count(), 0);
        assert!(!copy.has_actions());
    }

    #[test]
    fn test_named_animations_share_a_name() {
        use crate::scene::{AnimationTarget, PropertyAnimationGroup};

        let mut node = Node::new();
        node.add_animation(
            "move",
            Box::new(PropertyAnimationGroup::new(1.0).with_target(AnimationTarget::Position(Vec3::x()))),
        );
        node.add_animation(
            "move",
            Box::new(PropertyAnimationGroup::new(1.0).with_target(AnimationTarget::Opacity(0.0))),
        );
        assert!(node.is_animation_running("move"));
        assert_eq!(node.animation_names(), vec!["move"]);

        node.advance_property_animations(0.5);
        assert_relative_eq!(node.position().x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(node.opacity(), 0.5, epsilon = 1e-5);

        assert!(node.remove_animation("move"));
        assert!(!node.has_property_animations());
        assert!(!node.remove_animation("move"));
    }

    #[test]
    fn test_pivot_requires_invertible_matrix() {
        assert!(Pivot::from_matrix(Mat4::zeros()).is_none());
        let pivot = Pivot::at(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(pivot.matrix * pivot.inverse, Mat4::identity());
    }

    #[derive(Default)]
    struct StartCounter {
        starts: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }

    impl ExecutableAnimation for StartCounter {
        fn execute(&mut self, _node: &mut Node) {
            self.starts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }

        fn pause(&mut self, _node: &mut Node) {}

        fn terminate(&mut self, _node: &mut Node) {}

        fn is_running(&self, _node: &Node) -> bool {
            true
        }
    }

    #[test]
    fn test_add_animation_starts_it_once() {
        let counter = StartCounter::default();
        let starts = counter.starts.clone();
        let mut node = Node::new();

        node.add_animation("spin", Box::new(counter));
        assert_eq!(starts.load(std::sync::atomic::Ordering::Relaxed), 1);

        assert!(node.run_animation("spin"));
        assert_eq!(starts.load(std::sync::atomic::Ordering::Relaxed), 2);
    }
}
