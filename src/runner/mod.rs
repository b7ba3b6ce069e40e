//! Running simulations end to end.
//!
//! [`Simulation`] ties the pieces together: model specification, component
//! registry, configuration overrides and the shared input artifact. A run
//! assembles a fresh pipeline, drives it to completion and flushes the
//! observer output. [`run_draws`] runs several input draws concurrently;
//! each draw owns its own pipeline, clock and configuration and only the
//! read-only artifact is shared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::artifact::{SharedArtifact, open_artifact};
use crate::config::{
    ARTIFACT_PATH_KEY, ConfigLayer, ConfigValue, ConfigurationTree, INPUT_DRAW_KEY,
    OUTPUT_FORMAT_KEY, OUTPUT_PREFIX_KEY, VALIDATE_KEY,
};
use crate::error::{Result, SimulationError};
use crate::output::OutputFormat;
use crate::pipeline::PipelineAssembler;
use crate::registry::{ComponentRegistry, default_registry};
use crate::scheduler::{RunState, RunSummary, Scheduler};
use crate::spec::ModelSpecification;
use crate::utils::logging::{add_draw_progress_bar, create_multi_progress, finish_progress_bar};

/// Result of a completed and flushed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Step count and end time
    pub summary: RunSummary,
    /// Files written by the output sink
    pub outputs: Vec<PathBuf>,
}

/// Result of one input draw
#[derive(Debug)]
pub struct DrawOutcome {
    /// The input draw number
    pub draw: i64,
    /// The draw's report, or the error that stopped it
    pub result: Result<RunReport>,
}

impl DrawOutcome {
    /// Final lifecycle state of the draw
    #[must_use]
    pub const fn state(&self) -> RunState {
        if self.result.is_ok() {
            RunState::Completed
        } else {
            RunState::Failed
        }
    }
}

/// Parse a `key=value` override; the value is read as a YAML scalar
///
/// # Errors
/// Returns `Specification` if there is no `=` or the key is empty
pub fn parse_override(text: &str) -> Result<(String, ConfigValue)> {
    let (key, value) = text.split_once('=').ok_or_else(|| {
        SimulationError::Specification(format!("override '{text}' must have the form key=value"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(SimulationError::Specification(format!(
            "override '{text}' has an empty key"
        )));
    }
    Ok((key.to_string(), ConfigValue::parse_scalar(value.trim())?))
}

/// A model specification ready to run
#[derive(Debug, Clone)]
pub struct Simulation {
    specification: ModelSpecification,
    registry: ComponentRegistry,
    overrides: ConfigurationTree,
    artifact: Option<SharedArtifact>,
    progress: Option<ProgressBar>,
}

impl Simulation {
    /// Create a simulation using the built-in component registry
    #[must_use]
    pub fn new(specification: ModelSpecification) -> Self {
        Self {
            specification,
            registry: default_registry(),
            overrides: ConfigurationTree::new(),
            artifact: None,
            progress: None,
        }
    }

    /// Load a model specification file
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ModelSpecification::load(path)?))
    }

    /// Resolve components from `registry` instead of the built-ins
    #[must_use]
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override one configuration key for this run
    #[must_use]
    pub fn with_override(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.overrides.set(key, value);
        self
    }

    /// Merge a tree of overrides, taking priority over earlier overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigurationTree) -> Self {
        self.overrides.merge_from(overrides);
        self
    }

    /// Skip schema validation, whatever the document says
    #[must_use]
    pub fn without_validation(self) -> Self {
        self.with_override(VALIDATE_KEY, false)
    }

    /// Share an already opened artifact
    #[must_use]
    pub fn with_artifact(mut self, artifact: SharedArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Report step progress on `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The model specification
    #[must_use]
    pub const fn specification(&self) -> &ModelSpecification {
        &self.specification
    }

    /// The component registry
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Configuration layers above the component defaults
    #[must_use]
    pub fn layers(&self) -> Vec<ConfigLayer> {
        vec![
            ConfigLayer {
                source: "model specification".to_string(),
                tree: self.specification.configuration.clone(),
            },
            ConfigLayer {
                source: "run overrides".to_string(),
                tree: self.overrides.clone(),
            },
        ]
    }

    fn assembler(&self) -> PipelineAssembler<'_> {
        let assembler = PipelineAssembler::new(&self.registry);
        match &self.artifact {
            Some(artifact) => assembler.with_artifact(Arc::clone(artifact)),
            None => assembler,
        }
    }

    /// Resolve and validate the configuration without setting anything up
    pub fn resolve_configuration(&self) -> Result<Arc<ConfigurationTree>> {
        self.assembler()
            .resolve_configuration(&self.specification.ordered_components(), &self.layers())
    }

    /// Assemble a pipeline and wrap it in an `Initialized` scheduler
    pub fn assemble(&self) -> Result<Scheduler> {
        let pipeline = self
            .assembler()
            .assemble(&self.specification.ordered_components(), &self.layers())?;
        let scheduler = Scheduler::new(pipeline);
        Ok(match &self.progress {
            Some(progress) => scheduler.with_progress(progress.clone()),
            None => scheduler,
        })
    }

    /// Assemble, run to completion and flush output
    ///
    /// Output is only written once the run has completed; a failed run
    /// writes nothing.
    pub fn run(&self) -> Result<RunReport> {
        let mut scheduler = self.assemble()?;
        let summary = scheduler.run()?;

        let config = scheduler.pipeline().config();
        let prefix = config.get_path(OUTPUT_PREFIX_KEY)?;
        let format: OutputFormat = config.get_string_or(OUTPUT_FORMAT_KEY, "csv")?.parse()?;
        let outputs = scheduler.flush(&prefix, format)?;
        for path in &outputs {
            log::info!("Wrote {}", path.display());
        }
        Ok(RunReport { summary, outputs })
    }
}

/// Output prefix for one draw: `<prefix>_draw<N>`
#[must_use]
pub fn draw_prefix(prefix: &Path, draw: i64) -> PathBuf {
    let mut name = prefix
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!("_draw{draw}"));
    prefix.with_file_name(name)
}

/// Run `draws` concurrently, each with its own pipeline
///
/// The artifact is opened once and shared read-only. Each draw writes to
/// `<output_prefix>_draw<N>_<observer>.<ext>`. A failing draw does not stop
/// the others; outcomes are returned in the order of `draws`.
///
/// # Arguments
/// * `simulation` - The simulation to repeat
/// * `draws` - Input draw numbers
/// * `jobs` - Worker threads; defaults to the number of CPUs
/// * `show_progress` - Draw one progress bar per draw
///
/// # Errors
/// Fails only if the shared configuration cannot be resolved or the
/// artifact cannot be opened; per-draw failures are reported in the
/// outcomes
pub fn run_draws(
    simulation: &Simulation,
    draws: &[i64],
    jobs: Option<usize>,
    show_progress: bool,
) -> Result<Vec<DrawOutcome>> {
    let base = simulation.resolve_configuration()?;
    let prefix = base.get_path(OUTPUT_PREFIX_KEY)?;

    let mut shared = simulation.clone();
    if shared.artifact.is_none() && base.contains(ARTIFACT_PATH_KEY) {
        shared.artifact = Some(open_artifact(&base.get_path(ARTIFACT_PATH_KEY)?)?);
    }
    let steps = crate::time::SimulationClock::from_configuration(&base)?.total_steps();

    let threads = jobs.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SimulationError::component(format!("failed to start worker pool: {e}")))?;
    log::info!("Running {} draws on {threads} threads", draws.len());

    let progress = show_progress.then(|| {
        create_multi_progress(draws.len() as u64, Some("draws completed"))
    });

    let outcomes = pool.install(|| {
        draws
            .par_iter()
            .map(|&draw| {
                let mut run = shared
                    .clone()
                    .with_override(INPUT_DRAW_KEY, draw)
                    .with_override(
                        OUTPUT_PREFIX_KEY,
                        draw_prefix(&prefix, draw).to_string_lossy().into_owned(),
                    );
                if let Some((mp, _)) = &progress {
                    let label = format!("draw {draw}");
                    run = run.with_progress(add_draw_progress_bar(mp, steps, Some(&label)));
                }
                let result = run.run();
                if let Err(e) = &result {
                    log::error!("Draw {draw} failed: {e}");
                }
                if let Some((_, main)) = &progress {
                    main.inc(1);
                }
                DrawOutcome { draw, result }
            })
            .collect::<Vec<_>>()
    });

    if let Some((_, main)) = &progress {
        finish_progress_bar(main, "all draws finished");
    }
    Ok(outcomes)
}
