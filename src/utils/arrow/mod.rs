//! Arrow data handling utilities
//!
//! Helpers for extracting typed columns from artifact tables.

pub mod array_utils;

pub use array_utils::{downcast_array, ensure_no_nulls, get_column};
