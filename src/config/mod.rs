//! Configuration trees, layered resolution and validation.
//!
//! The configuration of a run is assembled from component defaults, the
//! model specification document and per-run overrides. The core keys used
//! by the scheduler and output sink are declared here.

pub mod resolver;
pub mod schema;
pub mod tree;

pub use resolver::{ConfigLayer, ConfigurationResolver, VALIDATE_KEY, merge_layers};
pub use schema::{ConfigSchema, SchemaEntry, ValueKind, coerce};
pub use tree::{ConfigValue, ConfigurationTree};

/// Key holding the output file prefix
pub const OUTPUT_PREFIX_KEY: &str = "observer.output_prefix";
/// Key selecting the output format (`csv` or `parquet`)
pub const OUTPUT_FORMAT_KEY: &str = "observer.format";
/// Key holding the input artifact location
pub const ARTIFACT_PATH_KEY: &str = "input_data.artifact_path";
/// Key selecting the input draw used by lookup tables
pub const INPUT_DRAW_KEY: &str = "input_data.input_draw_number";

/// Defaults for the keys the engine itself reads
#[must_use]
pub fn core_defaults() -> ConfigurationTree {
    ConfigurationTree::new()
        .with("time.start.month", 1)
        .with("time.start.day", 1)
        .with("time.end.month", 1)
        .with("time.end.day", 1)
        .with("time.step_size", 365)
        .with(OUTPUT_PREFIX_KEY, "results/output")
        .with(OUTPUT_FORMAT_KEY, "csv")
        .with(INPUT_DRAW_KEY, 0)
}

/// Schema for the keys the engine itself reads
#[must_use]
pub fn core_schema() -> ConfigSchema {
    ConfigSchema::new()
        .required("time.start.year", ValueKind::Integer)
        .optional("time.start.month", ValueKind::Integer)
        .optional("time.start.day", ValueKind::Integer)
        .required("time.end.year", ValueKind::Integer)
        .optional("time.end.month", ValueKind::Integer)
        .optional("time.end.day", ValueKind::Integer)
        .required("time.step_size", ValueKind::Integer)
        .optional(OUTPUT_PREFIX_KEY, ValueKind::Path)
        .optional(OUTPUT_FORMAT_KEY, ValueKind::String)
        .optional(ARTIFACT_PATH_KEY, ValueKind::Path)
        .optional(INPUT_DRAW_KEY, ValueKind::Integer)
        .optional(VALIDATE_KEY, ValueKind::Bool)
}
