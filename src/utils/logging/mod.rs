//! Logging utilities for output and progress tracking
//!
//! This module provides standardized log lines for file operations and
//! `indicatif` progress bars for simulation runs.

pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_warning};
pub use progress::{
    add_draw_progress_bar, create_main_progress_bar, create_multi_progress, finish_progress_bar,
};
