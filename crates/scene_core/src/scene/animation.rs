//! Node property animation
//!
//! Animated setters on [`Node`] consult the calling thread's [`Transaction`]
//! stack. With a zero duration (the default) a value is applied immediately;
//! otherwise a [`PropertyAnimation`] is queued on the node and advanced by
//! [`crate::scene::SceneGraph::advance_animations`].
//!
//! Named animations use the [`ExecutableAnimation`] contract. The scene core
//! decides when they execute, pause or terminate; how they interpolate is up to
//! the implementation. [`PropertyAnimationGroup`] is the built-in one.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Quat, Vec3};
use crate::scene::Node;

/// Easing curve applied to animation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimingFunction {
    /// Constant speed
    #[default]
    Linear,
    /// Slow start
    EaseIn,
    /// Slow end
    EaseOut,
    /// Slow start and end
    EaseInEaseOut,
}

impl TimingFunction {
    /// Map linear progress in `[0, 1]` to eased progress
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            TimingFunction::Linear => t,
            TimingFunction::EaseIn => t * t,
            TimingFunction::EaseOut => t * (2.0 - t),
            TimingFunction::EaseInEaseOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TransactionFrame {
    duration: f32,
    timing: TimingFunction,
}

thread_local! {
    static TRANSACTIONS: RefCell<Vec<TransactionFrame>> = const { RefCell::new(Vec::new()) };
}

/// Per-thread stack of animation settings for property setters
///
/// ```
/// use scene_core::scene::{Node, Transaction};
/// use scene_core::foundation::math::Vec3;
///
/// let mut node = Node::new();
/// Transaction::animate(0.5, || node.set_position(Vec3::new(1.0, 0.0, 0.0)));
/// assert_eq!(node.position(), Vec3::zeros()); // moves as animations advance
/// ```
pub struct Transaction;

impl Transaction {
    /// Open a transaction inheriting the enclosing one's settings
    pub fn begin() {
        TRANSACTIONS.with(|stack| {
            let mut stack = stack.borrow_mut();
            let frame = stack.last().copied().unwrap_or(TransactionFrame {
                duration: 0.0,
                timing: TimingFunction::Linear,
            });
            stack.push(frame);
        });
    }

    /// Close the innermost transaction
    pub fn commit() {
        TRANSACTIONS.with(|stack| {
            if stack.borrow_mut().pop().is_none() {
                log::warn!("Transaction::commit called without a matching begin");
            }
        });
    }

    /// Set the duration used by setters in the innermost transaction
    pub fn set_animation_duration(seconds: f32) {
        Self::with_current(|frame| frame.duration = seconds.max(0.0));
    }

    /// Set the timing function used by setters in the innermost transaction
    pub fn set_timing_function(timing: TimingFunction) {
        Self::with_current(|frame| frame.timing = timing);
    }

    /// Duration in effect on this thread (0 outside any transaction)
    pub fn animation_duration() -> f32 {
        TRANSACTIONS.with(|stack| stack.borrow().last().map_or(0.0, |frame| frame.duration))
    }

    /// Timing function in effect on this thread
    pub fn timing_function() -> TimingFunction {
        TRANSACTIONS.with(|stack| {
            stack.borrow().last().map_or(TimingFunction::Linear, |frame| frame.timing)
        })
    }

    /// Run `f` inside a transaction with the given duration
    pub fn animate<R>(duration: f32, f: impl FnOnce() -> R) -> R {
        Self::begin();
        Self::set_animation_duration(duration);
        let result = f();
        Self::commit();
        result
    }

    fn with_current(f: impl FnOnce(&mut TransactionFrame)) {
        TRANSACTIONS.with(|stack| match stack.borrow_mut().last_mut() {
            Some(frame) => f(frame),
            None => log::warn!("Transaction setting changed outside of begin/commit; ignored"),
        });
    }
}

static NEXT_ANIMATION_TAG: AtomicU64 = AtomicU64::new(1);

/// Identifies the property animations started by one named animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationTag(u64);

impl AnimationTag {
    /// Allocate a fresh tag
    pub fn new() -> Self {
        Self(NEXT_ANIMATION_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AnimationTag {
    fn default() -> Self {
        Self::new()
    }
}

/// Property slot an animation writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTarget {
    /// Local position
    Position,
    /// Local scale
    Scale,
    /// Local rotation (quaternion or Euler)
    Rotation,
    /// Explicit opacity
    Opacity,
    /// Hide/show multiplier
    HiddenOpacity,
}

/// Start and end values of an animated property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimatedProperty {
    /// Local position
    Position {
        /// Start value
        from: Vec3,
        /// End value
        to: Vec3,
    },
    /// Local scale
    Scale {
        /// Start value
        from: Vec3,
        /// End value
        to: Vec3,
    },
    /// Local rotation, spherically interpolated
    Rotation {
        /// Start value
        from: Quat,
        /// End value
        to: Quat,
    },
    /// Local rotation as Euler angles, interpolated per axis
    Euler {
        /// Start value
        from: Vec3,
        /// End value
        to: Vec3,
    },
    /// Explicit opacity
    Opacity {
        /// Start value
        from: f32,
        /// End value
        to: f32,
    },
    /// Hide/show multiplier
    HiddenOpacity {
        /// Start value
        from: f32,
        /// End value
        to: f32,
    },
}

impl AnimatedProperty {
    /// Slot this property writes to
    pub fn target(&self) -> PropertyTarget {
        match self {
            AnimatedProperty::Position { .. } => PropertyTarget::Position,
            AnimatedProperty::Scale { .. } => PropertyTarget::Scale,
            AnimatedProperty::Rotation { .. } | AnimatedProperty::Euler { .. } => PropertyTarget::Rotation,
            AnimatedProperty::Opacity { .. } => PropertyTarget::Opacity,
            AnimatedProperty::HiddenOpacity { .. } => PropertyTarget::HiddenOpacity,
        }
    }

    /// Write the value at eased progress `t` into the node
    pub(crate) fn apply_at(&self, t: f32, node: &mut Node) {
        match *self {
            AnimatedProperty::Position { from, to } => node.write_position(from.lerp(&to, t)),
            AnimatedProperty::Scale { from, to } => node.write_scale(from.lerp(&to, t)),
            AnimatedProperty::Rotation { from, to } => node.write_rotation(utils::slerp(&from, &to, t)),
            AnimatedProperty::Euler { from, to } => node.write_euler(from.lerp(&to, t)),
            AnimatedProperty::Opacity { from, to } => node.write_opacity(utils::lerp(from, to, t)),
            AnimatedProperty::HiddenOpacity { from, to } => {
                node.write_hidden_opacity(utils::lerp(from, to, t));
            }
        }
    }
}

/// One property interpolating over time
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAnimation {
    property: AnimatedProperty,
    duration: f32,
    elapsed: f32,
    timing: TimingFunction,
    owner: Option<AnimationTag>,
    paused: bool,
}

impl PropertyAnimation {
    /// Create an animation over `duration` seconds
    pub fn new(property: AnimatedProperty, duration: f32, timing: TimingFunction) -> Self {
        Self {
            property,
            duration: duration.max(0.0),
            elapsed: 0.0,
            timing,
            owner: None,
            paused: false,
        }
    }

    /// Builder pattern: tag the animation with its owning named animation
    pub fn with_owner(mut self, owner: AnimationTag) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Animated property
    pub fn property(&self) -> &AnimatedProperty {
        &self.property
    }

    /// Owning named animation, if any
    pub fn owner(&self) -> Option<AnimationTag> {
        self.owner
    }

    /// Linear progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    /// Whether the end value has been reached
    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Whether time is frozen for this animation
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freeze or resume
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance time and write the new value; returns whether anything was written
    pub(crate) fn advance(&mut self, delta_time: f32, node: &mut Node) -> bool {
        if self.paused {
            return false;
        }
        self.elapsed += delta_time.max(0.0);
        self.property.apply_at(self.timing.apply(self.progress()), node);
        true
    }
}

/// Contract for animations registered on a node under a name
pub trait ExecutableAnimation: Send {
    /// Start, or resume if paused
    fn execute(&mut self, node: &mut Node);

    /// Freeze in place
    fn pause(&mut self, node: &mut Node);

    /// Stop permanently, leaving the node at its current values
    fn terminate(&mut self, node: &mut Node);

    /// Whether the animation is still affecting the node
    fn is_running(&self, node: &Node) -> bool;

    /// Whether the animation restarts itself when it completes
    fn is_repeating(&self) -> bool {
        false
    }
}

/// End value of one property in a [`PropertyAnimationGroup`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationTarget {
    /// Local position
    Position(Vec3),
    /// Local scale
    Scale(Vec3),
    /// Local rotation
    Rotation(Quat),
    /// Local rotation as Euler angles
    Euler(Vec3),
    /// Explicit opacity
    Opacity(f32),
}

/// Animates several node properties to end values over a shared duration
///
/// Start values are captured from the node on [`ExecutableAnimation::execute`].
#[derive(Debug, Clone)]
pub struct PropertyAnimationGroup {
    tag: AnimationTag,
    duration: f32,
    timing: TimingFunction,
    targets: Vec<AnimationTarget>,
}

impl PropertyAnimationGroup {
    /// Create an empty group
    pub fn new(duration: f32) -> Self {
        Self {
            tag: AnimationTag::new(),
            duration,
            timing: TimingFunction::Linear,
            targets: Vec::new(),
        }
    }

    /// Builder pattern: set the timing function
    pub fn with_timing(mut self, timing: TimingFunction) -> Self {
        self.timing = timing;
        self
    }

    /// Builder pattern: add a target value
    pub fn with_target(mut self, target: AnimationTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Tag carried by the property animations this group starts
    pub fn tag(&self) -> AnimationTag {
        self.tag
    }

    fn property_for(&self, target: AnimationTarget, node: &Node) -> AnimatedProperty {
        match target {
            AnimationTarget::Position(to) => AnimatedProperty::Position { from: node.position(), to },
            AnimationTarget::Scale(to) => AnimatedProperty::Scale { from: node.scale(), to },
            AnimationTarget::Rotation(to) => AnimatedProperty::Rotation { from: node.rotation(), to },
            AnimationTarget::Euler(to) => AnimatedProperty::Euler { from: node.euler_angles(), to },
            AnimationTarget::Opacity(to) => AnimatedProperty::Opacity { from: node.opacity(), to },
        }
    }
}

impl ExecutableAnimation for PropertyAnimationGroup {
    fn execute(&mut self, node: &mut Node) {
        if node.has_property_animations_owned_by(self.tag) {
            node.set_property_animations_paused(self.tag, false);
            return;
        }
        for target in self.targets.clone() {
            let property = self.property_for(target, node);
            node.add_property_animation(
                PropertyAnimation::new(property, self.duration, self.timing).with_owner(self.tag),
            );
        }
    }

    fn pause(&mut self, node: &mut Node) {
        node.set_property_animations_paused(self.tag, true);
    }

    fn terminate(&mut self, node: &mut Node) {
        node.remove_property_animations_owned_by(self.tag);
    }

    fn is_running(&self, node: &Node) -> bool {
        node.has_property_animations_owned_by(self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timing_functions_hit_endpoints() {
        for timing in [
            TimingFunction::Linear,
            TimingFunction::EaseIn,
            TimingFunction::EaseOut,
            TimingFunction::EaseInEaseOut,
        ] {
            assert_eq!(timing.apply(0.0), 0.0);
            assert_eq!(timing.apply(1.0), 1.0);
        }
        assert!(TimingFunction::EaseIn.apply(0.5) < 0.5);
        assert!(TimingFunction::EaseOut.apply(0.5) > 0.5);
    }

    #[test]
    fn test_transaction_stack() {
        assert_eq!(Transaction::animation_duration(), 0.0);
        Transaction::begin();
        Transaction::set_animation_duration(2.0);
        Transaction::set_timing_function(TimingFunction::EaseIn);
        Transaction::begin();
        assert_eq!(Transaction::animation_duration(), 2.0);
        Transaction::set_animation_duration(0.5);
        assert_eq!(Transaction::animation_duration(), 0.5);
        Transaction::commit();
        assert_eq!(Transaction::animation_duration(), 2.0);
        assert_eq!(Transaction::timing_function(), TimingFunction::EaseIn);
        Transaction::commit();
        assert_eq!(Transaction::animation_duration(), 0.0);
    }

    #[test]
    fn test_zero_duration_applies_immediately() {
        let mut node = Node::new();
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(node.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_animated_position_progresses() {
        let mut node = Node::new();
        Transaction::animate(1.0, || node.set_position(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(node.position(), Vec3::zeros());

        node.advance_property_animations(0.5);
        assert_relative_eq!(node.position(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        node.advance_property_animations(0.75);
        assert_relative_eq!(node.position(), Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
        assert!(!node.has_property_animations());
    }

    #[test]
    fn test_new_value_replaces_running_animation() {
        let mut node = Node::new();
        Transaction::animate(1.0, || node.set_scale(Vec3::new(3.0, 3.0, 3.0)));
        node.set_scale(Vec3::new(0.5, 0.5, 0.5));
        node.advance_property_animations(1.0);
        assert_eq!(node.scale(), Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_group_pause_resume_terminate() {
        let mut node = Node::new();
        let mut group = PropertyAnimationGroup::new(1.0)
            .with_target(AnimationTarget::Position(Vec3::new(4.0, 0.0, 0.0)));

        group.execute(&mut node);
        assert!(group.is_running(&node));
        node.advance_property_animations(0.25);
        assert_relative_eq!(node.position().x, 1.0, epsilon = 1e-5);

        group.pause(&mut node);
        node.advance_property_animations(0.25);
        assert_relative_eq!(node.position().x, 1.0, epsilon = 1e-5);

        group.execute(&mut node);
        node.advance_property_animations(0.25);
        assert_relative_eq!(node.position().x, 2.0, epsilon = 1e-5);

        group.terminate(&mut node);
        assert!(!group.is_running(&node));
        node.advance_property_animations(1.0);
        assert_relative_eq!(node.position().x, 2.0, epsilon = 1e-5);
    }
}
