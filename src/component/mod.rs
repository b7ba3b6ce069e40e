//! The capability set shared by every simulation component.
//!
//! A component is set up once with a frozen configuration, then stepped at
//! every tick of the clock. Observers additionally report a tabular record
//! after all components of a tick have stepped.

use std::fmt;
use std::sync::Arc;

use crate::artifact::{ArtifactSource, LookupTable};
use crate::config::{ConfigSchema, ConfigurationTree, INPUT_DRAW_KEY};
use crate::error::{Result, SimulationError};
use crate::output::OutputRecord;
use crate::population::{CohortTable, RatePipelines};
use crate::time::{SimTime, SimulationClock};

/// A live simulation component
///
/// Instances are owned by exactly one pipeline for the length of one run.
pub trait Component: Send + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Configuration keys this component provides defaults for
    ///
    /// Defaults form the lowest configuration layer and may be overridden by
    /// the model specification or per-run overrides.
    fn configuration_defaults(&self) -> ConfigurationTree {
        ConfigurationTree::new()
    }

    /// Typed keys this component reads; checked when validation is enabled
    fn configuration_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
    }

    /// Read configuration and artifact tables, create population columns and
    /// register rate modifiers
    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()>;

    /// Advance this component's state by one step
    fn on_step(&mut self, _context: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Produce this step's output record; only called for observers, which
    /// must return a record at every step
    fn report(&mut self, _context: &ReportContext<'_>) -> Result<Option<OutputRecord>> {
        Ok(None)
    }
}

/// Everything a component may touch while being set up
pub struct SetupContext<'a> {
    config: &'a Arc<ConfigurationTree>,
    artifact: Option<&'a dyn ArtifactSource>,
    clock: &'a SimulationClock,
    /// Shared cohort state
    pub population: &'a mut CohortTable,
    /// Rate pipelines accepting modifiers
    pub pipelines: &'a mut RatePipelines,
}

impl<'a> SetupContext<'a> {
    /// Create a setup context
    pub fn new(
        config: &'a Arc<ConfigurationTree>,
        artifact: Option<&'a dyn ArtifactSource>,
        clock: &'a SimulationClock,
        population: &'a mut CohortTable,
        pipelines: &'a mut RatePipelines,
    ) -> Self {
        Self {
            config,
            artifact,
            clock,
            population,
            pipelines,
        }
    }

    /// The frozen run configuration
    #[must_use]
    pub fn config(&self) -> &ConfigurationTree {
        self.config
    }

    /// A shareable handle to the run configuration
    #[must_use]
    pub fn shared_config(&self) -> Arc<ConfigurationTree> {
        Arc::clone(self.config)
    }

    /// The simulation clock, before the first step
    #[must_use]
    pub const fn clock(&self) -> &SimulationClock {
        self.clock
    }

    /// The input artifact
    ///
    /// # Errors
    /// Returns `Artifact` if the run was assembled without one
    pub fn artifact(&self) -> Result<&'a dyn ArtifactSource> {
        self.artifact.ok_or_else(|| {
            SimulationError::artifact("no input artifact configured (set input_data.artifact_path)")
        })
    }

    /// The input draw selected for this run
    pub fn input_draw(&self) -> Result<i64> {
        self.config.get_i64_or(INPUT_DRAW_KEY, 0)
    }

    /// Build a lookup table for the configured draw
    pub fn lookup(&self, key: &str) -> Result<LookupTable> {
        LookupTable::load(self.artifact()?, key, self.input_draw()?)
    }
}

impl fmt::Debug for SetupContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupContext")
            .field("clock", self.clock)
            .field("has_artifact", &self.artifact.is_some())
            .field("rows", &self.population.len())
            .finish_non_exhaustive()
    }
}

/// Everything a component may touch during a step
#[derive(Debug)]
pub struct StepContext<'a> {
    clock: &'a SimulationClock,
    /// Shared cohort state; later components see earlier components' writes
    pub population: &'a mut CohortTable,
    /// Rate pipelines, read-only after setup
    pub pipelines: &'a RatePipelines,
}

impl<'a> StepContext<'a> {
    /// Create a step context
    pub fn new(
        clock: &'a SimulationClock,
        population: &'a mut CohortTable,
        pipelines: &'a RatePipelines,
    ) -> Self {
        Self {
            clock,
            population,
            pipelines,
        }
    }

    /// The simulation clock
    #[must_use]
    pub const fn clock(&self) -> &SimulationClock {
        self.clock
    }

    /// Simulated time of this step
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.time()
    }

    /// Pass `rates` through the modifiers of `pipeline`
    pub fn apply_pipeline(&self, pipeline: &str, rates: &mut [f64]) -> Result<()> {
        self.pipelines
            .apply(pipeline, self.clock.time(), &*self.population, rates)
    }
}

/// Read-only view handed to observers
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    /// The simulation clock
    pub clock: &'a SimulationClock,
    /// Cohort state after every component has stepped
    pub population: &'a CohortTable,
}

impl ReportContext<'_> {
    /// Simulated time of the step being reported
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.time()
    }
}
