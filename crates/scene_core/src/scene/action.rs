//! Callbacks scheduled on a node
//!
//! Actions execute during the sort-key pass, once per frame, only for nodes
//! that are visible that frame.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scene::Node;

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle used to remove a running action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

impl ActionId {
    fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Scheduling policy of an action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionKind {
    /// Runs every frame until removed; the callback receives the frame delta
    PerFrame,
    /// Runs every frame for `duration` seconds; the callback receives progress in `[0, 1]`
    Timed {
        /// Total run time in seconds
        duration: f32,
    },
    /// Runs once at the next execution point; the callback receives 0
    Triggered,
}

/// Signature of an action body
pub type ActionCallback = Box<dyn FnMut(&mut Node, f32) + Send>;

/// A callback with its schedule
pub struct Action {
    id: ActionId,
    kind: ActionKind,
    elapsed: f32,
    finished: bool,
    callback: ActionCallback,
}

impl Action {
    /// Create an action
    pub fn new(kind: ActionKind, callback: impl FnMut(&mut Node, f32) + Send + 'static) -> Self {
        Self {
            id: ActionId::next(),
            kind,
            elapsed: 0.0,
            finished: false,
            callback: Box::new(callback),
        }
    }

    /// Handle for removal
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Scheduling policy
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Whether the action keeps running until explicitly removed
    pub fn is_repeating(&self) -> bool {
        matches!(self.kind, ActionKind::PerFrame)
    }

    /// Whether the action has run its course
    pub fn is_complete(&self) -> bool {
        self.finished
    }

    /// Run the callback once; returns whether the action should stay scheduled
    pub(crate) fn execute(&mut self, node: &mut Node, delta_time: f32) -> bool {
        match self.kind {
            ActionKind::PerFrame => (self.callback)(node, delta_time),
            ActionKind::Timed { duration } => {
                self.elapsed += delta_time.max(0.0);
                let progress = if duration <= 0.0 { 1.0 } else { (self.elapsed / duration).min(1.0) };
                (self.callback)(node, progress);
                self.finished = progress >= 1.0;
            }
            ActionKind::Triggered => {
                (self.callback)(node, 0.0);
                self.finished = true;
            }
        }
        !self.is_complete()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("elapsed", &self.elapsed)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
