//! Error handling for model composition and simulation runs.
//!
//! Every failure is surfaced to the caller with the component identifier,
//! simulated time or configuration key needed to diagnose it. Nothing is
//! retried at this layer.

pub mod util;

use std::fmt;
use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

use crate::config::ValueKind;
use crate::time::SimTime;

/// The hook a component was executing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The per-step state update
    Step,
    /// The observer report collected after all steps of a tick
    Report,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step => write!(f, "step"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// Specialized error type for composing and running simulations
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A model specification names a component with no registered factory
    #[error("Unknown component '{name}' (declared as '{declaration}')")]
    UnknownComponent { name: String, declaration: String },

    /// A configuration leaf does not match its declared kind
    #[error("Configuration key '{key}' expected {expected}, found {found}")]
    ConfigurationType {
        key: String,
        expected: ValueKind,
        found: String,
    },

    /// A required configuration key is absent after merging all layers
    #[error("Missing required configuration key '{key}'")]
    MissingConfiguration { key: String },

    /// A component failed while being set up; assembly was aborted
    #[error("Setup of component '{component}' failed: {source}")]
    Setup {
        component: String,
        #[source]
        source: Box<SimulationError>,
    },

    /// A component failed during a simulation step; the run was aborted
    #[error("Component '{component}' failed during {phase} at {time}: {source}")]
    Step {
        component: String,
        phase: Phase,
        time: SimTime,
        #[source]
        source: Box<SimulationError>,
    },

    /// Error opening, reading or writing a file
    #[error("IO error: {context}{}", path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    Io {
        context: String,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// The model specification document is malformed
    #[error("Invalid model specification: {0}")]
    Specification(String),

    /// YAML parsing or serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Arrow error while building or writing tables
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error while reading artifact tables or writing output
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Input artifact is missing a table, column or cohort
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Failure raised by a component's own logic
    #[error("{0}")]
    Component(String),

    /// An operation was attempted in the wrong scheduler state
    #[error("Cannot {action} while the scheduler is {state}")]
    InvalidState { action: String, state: String },
}

impl SimulationError {
    /// Create an IO error with context and an optional path
    pub fn io(context: impl Into<String>, path: Option<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path,
            source,
        }
    }

    /// Create a component-raised error
    pub fn component(message: impl Into<String>) -> Self {
        Self::Component(message.into())
    }

    /// Create an artifact error
    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact(message.into())
    }

    /// Wrap this error as a setup failure of `component`
    #[must_use]
    pub fn during_setup(self, component: &str) -> Self {
        Self::Setup {
            component: component.to_string(),
            source: Box::new(self),
        }
    }

    /// Wrap this error as a step failure of `component` at `time`
    #[must_use]
    pub fn during_step(self, component: &str, phase: Phase, time: SimTime) -> Self {
        Self::Step {
            component: component.to_string(),
            phase,
            time,
            source: Box::new(self),
        }
    }

    /// The component identifier attached to a setup or step failure
    #[must_use]
    pub fn component_name(&self) -> Option<&str> {
        match self {
            Self::Setup { component, .. } | Self::Step { component, .. } => Some(component),
            Self::UnknownComponent { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The simulated time attached to a step failure
    #[must_use]
    pub const fn failed_at(&self) -> Option<SimTime> {
        match self {
            Self::Step { time, .. } => Some(*time),
            _ => None,
        }
    }
}

impl From<io::Error> for SimulationError {
    fn from(error: io::Error) -> Self {
        Self::io("unexpected I/O failure", None, error)
    }
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimulationError>;
