//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scene core:
//! - Math types and operations
//! - Logging utilities
//! - Process-scoped diagnostics (allocation counters, debug sort index)

pub mod math;
pub mod logging;
pub mod diagnostics;
