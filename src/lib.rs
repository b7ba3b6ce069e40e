//! A component-composition engine for discrete-time cohort (multi-state
//! life table) simulations.
//!
//! A model specification names components as constructor strings grouped
//! by category. The engine resolves them through a registry, merges a
//! layered configuration into one frozen tree, sets the components up in a
//! fixed order, steps them through simulated time and writes observer
//! output when the run completes.

pub mod artifact;
pub mod component;
pub mod components;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod population;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod spec;
pub mod time;
pub mod utils;

// Core types
pub use component::{Component, ReportContext, SetupContext, StepContext};
pub use config::{ConfigSchema, ConfigValue, ConfigurationResolver, ConfigurationTree, ValueKind};
pub use error::{Phase, Result, SimulationError};
pub use pipeline::{Pipeline, PipelineAssembler};
pub use registry::{ComponentRegistry, default_registry};
pub use scheduler::{RunState, RunSummary, Scheduler};
pub use spec::{Category, ComponentSpec, ModelSpecification};
pub use time::{SimTime, SimulationClock};

// Data access and output
pub use artifact::{ArtifactSource, InMemoryArtifact, LookupTable, ParquetArtifact};
pub use output::{OutputFormat, OutputRecord, OutputSink};
pub use population::{CohortTable, RatePipelines, Sex};

// Running
pub use runner::{DrawOutcome, RunReport, Simulation, run_draws};

// Arrow types
pub use arrow::record_batch::RecordBatch;
