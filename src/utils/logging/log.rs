//! Logging utilities
//!
//! This module provides standardized logging functions for file operations.

use std::path::Path;

/// Log the start of a file operation
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the file or directory being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log the completion of a file operation
///
/// # Arguments
/// * `operation` - Past-tense verb describing the operation ("read", "wrote")
/// * `path` - Path of the file or directory that was operated on
/// * `rows` - Number of rows processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    path: &Path,
    rows: usize,
    elapsed: Option<std::time::Duration>,
) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {} {} rows ({}) in {:?}",
            operation,
            rows,
            path.display(),
            duration
        ),
        None => log::info!("Successfully {} {} rows ({})", operation, rows, path.display()),
    }
}

/// Log a warning, optionally naming the path it concerns
///
/// # Arguments
/// * `message` - Warning message
/// * `path` - Optional path related to the warning
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}
