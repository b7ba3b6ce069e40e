//! Shared utilities: Arrow column helpers and logging/progress reporting.

pub mod arrow;
pub mod logging;
