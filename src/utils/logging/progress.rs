//! Progress reporting for simulation runs
//!
//! A single run advances one bar per simulated step. Concurrent draws share
//! a `MultiProgress` with one bar per draw under an overall bar counting
//! finished draws.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Style of the overall progress bar
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// Style of a per-draw progress bar
pub const DEFAULT_DRAW_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps ({percent}%) {msg}";

fn styled_bar(length: u64, template: &str, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to the default progress style: {e}"),
    }
    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }
    pb
}

/// Create a main progress bar with a standardized style
///
/// # Arguments
/// * `length` - Total length for the progress bar
/// * `description` - Optional description to display as the initial message
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    styled_bar(length, DEFAULT_MAIN_TEMPLATE, description)
}

/// Create a multi-progress setup with a main progress bar
///
/// # Returns
/// A tuple containing the `MultiProgress` instance and the main `ProgressBar`
#[must_use]
pub fn create_multi_progress(total: u64, description: Option<&str>) -> (MultiProgress, ProgressBar) {
    let mp = MultiProgress::new();
    let main_pb = mp.add(create_main_progress_bar(total, description));
    (mp, main_pb)
}

/// Add a per-draw progress bar to a `MultiProgress` instance
#[must_use]
pub fn add_draw_progress_bar(mp: &MultiProgress, steps: u64, description: Option<&str>) -> ProgressBar {
    mp.add(styled_bar(steps, DEFAULT_DRAW_TEMPLATE, description))
}

/// Finish a progress bar with a final message
pub fn finish_progress_bar(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(message.to_string());
}
