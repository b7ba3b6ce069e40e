//! The time-step scheduler.
//!
//! A run moves through `Initialized -> Running -> Completed | Failed`. At
//! each tick every component steps at the current simulated time in
//! category and declaration order, observers then report, and finally the
//! clock advances by one step. The first failure halts the run; there is no
//! rollback of the partially executed step and no retry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::ProgressBar;

use crate::component::{ReportContext, StepContext};
use crate::error::{Phase, Result, SimulationError};
use crate::output::{OutputFormat, OutputSink};
use crate::pipeline::Pipeline;
use crate::time::SimTime;

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Initialized,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps executed
    pub steps: u64,
    /// Simulated time at which the run stopped
    pub end_time: SimTime,
    /// Output records collected across all observers
    pub records: usize,
}

/// Drives an assembled pipeline through simulated time
pub struct Scheduler {
    pipeline: Pipeline,
    sink: OutputSink,
    state: RunState,
    steps: u64,
    progress: Option<ProgressBar>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Wrap an assembled pipeline; the run starts `Initialized`
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            sink: OutputSink::new(),
            state: RunState::Initialized,
            steps: 0,
            progress: None,
        }
    }

    /// Advance `progress` once per step
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        progress.set_length(self.pipeline.clock.total_steps());
        self.progress = Some(progress);
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Number of steps executed so far
    #[must_use]
    pub const fn steps_executed(&self) -> u64 {
        self.steps
    }

    /// The pipeline being driven
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Records collected so far
    #[must_use]
    pub const fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Run from the current time until the end time
    ///
    /// # Errors
    /// * `InvalidState` if the run is not `Initialized`
    /// * `Step` naming the failing component, phase and simulated time; the
    ///   run is left `Failed`
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state != RunState::Initialized {
            return Err(self.invalid_state("run"));
        }
        self.state = RunState::Running;
        let start = Instant::now();
        log::info!(
            "Running {} steps from {} to {}",
            self.pipeline.clock.total_steps(),
            self.pipeline.clock.start(),
            self.pipeline.clock.end()
        );

        while !self.pipeline.clock.is_complete() {
            if let Err(error) = self.tick() {
                self.state = RunState::Failed;
                if let Some(progress) = &self.progress {
                    progress.abandon_with_message("failed");
                }
                log::error!("Run failed after {} steps: {error}", self.steps);
                return Err(error);
            }
            self.steps += 1;
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
            self.pipeline.clock.advance();
        }

        self.state = RunState::Completed;
        if let Some(progress) = &self.progress {
            progress.finish_with_message("completed");
        }
        log::info!(
            "Completed {} steps in {:?}; {} output records",
            self.steps,
            start.elapsed(),
            self.sink.total_records()
        );
        Ok(RunSummary {
            steps: self.steps,
            end_time: self.pipeline.clock.time(),
            records: self.sink.total_records(),
        })
    }

    /// One tick: step every component, then collect observer reports
    fn tick(&mut self) -> Result<()> {
        let Pipeline {
            entries,
            clock,
            population,
            pipelines,
            ..
        } = &mut self.pipeline;
        let time = clock.time();

        for entry in entries.iter_mut() {
            let mut context = StepContext::new(clock, population, pipelines);
            entry
                .component
                .on_step(&mut context)
                .map_err(|e| e.during_step(&entry.identifier(), Phase::Step, time))?;
        }

        let context = ReportContext {
            clock,
            population,
        };
        for entry in entries.iter_mut().filter(|entry| entry.is_observer()) {
            entry
                .component
                .report(&context)
                .and_then(|record| {
                    record.ok_or_else(|| {
                        SimulationError::component("observer produced no output record")
                    })
                })
                .and_then(|record| self.sink.append(record))
                .map_err(|e| e.during_step(&entry.identifier(), Phase::Report, time))?;
        }
        Ok(())
    }

    /// Write collected output; only allowed once the run has `Completed`
    ///
    /// # Errors
    /// `InvalidState` before completion, `Io` if the destination is not
    /// writable
    pub fn flush(&self, prefix: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
        if self.state != RunState::Completed {
            return Err(self.invalid_state("flush output"));
        }
        self.sink.flush(prefix, format)
    }

    fn invalid_state(&self, action: &str) -> SimulationError {
        SimulationError::InvalidState {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }
}
