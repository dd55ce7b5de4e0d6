//! Process-scoped diagnostic state
//!
//! Counters here are for debugging and profiling only. Nothing in the scene core
//! reads them to make decisions, and each has an explicit reset entry point.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

static LIVE_NODES: AtomicI64 = AtomicI64::new(0);
static DEBUG_SORT_INDEX: AtomicU32 = AtomicU32::new(0);

/// Record a node allocation
pub(crate) fn node_allocated() {
    LIVE_NODES.fetch_add(1, Ordering::Relaxed);
}

/// Record a node deallocation
pub(crate) fn node_released() {
    LIVE_NODES.fetch_sub(1, Ordering::Relaxed);
}

/// Number of nodes currently alive in this process (all graphs)
pub fn live_node_count() -> i64 {
    LIVE_NODES.load(Ordering::Relaxed)
}

/// Reset the live node counter
pub fn reset_live_node_count() {
    LIVE_NODES.store(0, Ordering::Relaxed);
}

/// Take the next debug sort index (used when sort-order debugging is enabled)
pub fn next_debug_sort_index() -> u32 {
    DEBUG_SORT_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// Reset the debug sort index, typically at the start of each frame
pub fn reset_debug_sort_index() {
    DEBUG_SORT_INDEX.store(0, Ordering::Relaxed);
}

/// Work counters for one frame of the scene pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Umbrella boxes classified against the frustum
    pub frustum_tests: u32,
    /// Nodes whose world transform was computed (including constraint recomputes)
    pub transforms_computed: u32,
    /// Visible nodes visited by the sort-key generator
    pub sort_key_visits: u32,
    /// Sort keys emitted
    pub sort_keys_emitted: u32,
    /// Actions executed
    pub actions_executed: u32,
}

impl FrameStats {
    /// Accumulate another set of counters into this one
    pub fn accumulate(&mut self, other: &FrameStats) {
        self.frustum_tests += other.frustum_tests;
        self.transforms_computed += other.transforms_computed;
        self.sort_key_visits += other.sort_key_visits;
        self.sort_keys_emitted += other.sort_keys_emitted;
        self.actions_executed += other.actions_executed;
    }
}
