//! Utility functions for error handling
//!
//! Helpers that perform filesystem checks and attach the path and purpose
//! of the access to any resulting error.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, SimulationError};

/// Safely read a file to string with rich error information
///
/// # Arguments
/// * `path` - The path to the file to read
/// * `purpose` - Why the file is being read (for error context)
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    if !path.is_file() {
        return Err(SimulationError::io(
            format!("file not found, needed for {purpose}"),
            Some(path.to_path_buf()),
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    fs::read_to_string(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied - check file permissions".to_string(),
            io::ErrorKind::InvalidData => "file contains invalid UTF-8 data".to_string(),
            _ => format!("failed to read file for {purpose}"),
        };
        SimulationError::io(context, Some(path.to_path_buf()), e)
    })
}

/// Check that a directory exists and can be listed
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(SimulationError::io(
            format!("directory not found, needed for {purpose}"),
            Some(path.to_path_buf()),
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if !path.is_dir() {
        return Err(SimulationError::io(
            format!("expected a directory for {purpose}"),
            Some(path.to_path_buf()),
            io::Error::from(io::ErrorKind::InvalidInput),
        ));
    }

    fs::read_dir(path).map(|_| ()).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                "permission denied - check directory permissions".to_string()
            }
            _ => format!("failed to access directory for {purpose}"),
        };
        SimulationError::io(context, Some(path.to_path_buf()), e)
    })
}

/// Check that a directory exists and is not read-only
pub fn validate_writable_directory(path: &Path, purpose: &str) -> Result<()> {
    validate_directory(path, purpose)?;

    let metadata = fs::metadata(path)
        .map_err(|e| SimulationError::io("failed to read directory metadata", Some(path.to_path_buf()), e))?;
    if metadata.permissions().readonly() {
        return Err(SimulationError::io(
            format!("directory is read-only, needed for {purpose}"),
            Some(path.to_path_buf()),
            io::Error::from(io::ErrorKind::PermissionDenied),
        ));
    }
    Ok(())
}
