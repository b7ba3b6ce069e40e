//! Pipeline assembly.
//!
//! Assembly turns an ordered list of component specs into a ready-to-run
//! [`Pipeline`]. It is all-or-nothing: every identifier is resolved before
//! any component is set up, and the first setup failure discards the
//! partially built pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::artifact::{SharedArtifact, open_artifact};
use crate::component::{Component, SetupContext};
use crate::config::{
    ARTIFACT_PATH_KEY, ConfigLayer, ConfigurationResolver, ConfigurationTree, core_defaults,
    core_schema,
};
use crate::error::{Result, SimulationError};
use crate::population::{CohortTable, RatePipelines};
use crate::registry::ComponentRegistry;
use crate::spec::{Category, ComponentSpec};
use crate::time::SimulationClock;

/// A component together with the spec it was built from
#[derive(Debug)]
pub struct PipelineEntry {
    /// The declaration this component was built from
    pub spec: ComponentSpec,
    /// The live component
    pub component: Box<dyn Component>,
}

impl PipelineEntry {
    /// Identifier used in error messages, e.g. `Disease('CHD')`
    #[must_use]
    pub fn identifier(&self) -> String {
        self.spec.declaration()
    }

    /// Whether this component reports output records
    #[must_use]
    pub fn is_observer(&self) -> bool {
        self.spec.category == Category::Observer
    }
}

/// Set-up components in execution order plus the state they share
pub struct Pipeline {
    pub(crate) entries: Vec<PipelineEntry>,
    pub(crate) config: Arc<ConfigurationTree>,
    pub(crate) clock: SimulationClock,
    pub(crate) population: CohortTable,
    pub(crate) pipelines: RatePipelines,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("components", &self.identifiers())
            .field("clock", &self.clock)
            .field("cohorts", &self.population.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// The frozen configuration the components were set up with
    #[must_use]
    pub fn config(&self) -> &Arc<ConfigurationTree> {
        &self.config
    }

    /// The simulation clock
    #[must_use]
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// The cohort table
    #[must_use]
    pub const fn population(&self) -> &CohortTable {
        &self.population
    }

    /// The rate pipelines with all registered modifiers
    #[must_use]
    pub const fn rate_pipelines(&self) -> &RatePipelines {
        &self.pipelines
    }

    /// Components in execution order
    #[must_use]
    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    /// Component identifiers in execution order
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.iter().map(PipelineEntry::identifier).collect()
    }

    /// Output names of the observers, in execution order
    #[must_use]
    pub fn observer_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_observer())
            .map(|entry| entry.component.name().to_string())
            .collect()
    }
}

/// Builds pipelines from component specs
#[derive(Debug, Clone)]
pub struct PipelineAssembler<'r> {
    registry: &'r ComponentRegistry,
    artifact: Option<SharedArtifact>,
}

impl<'r> PipelineAssembler<'r> {
    /// Create an assembler resolving components from `registry`
    #[must_use]
    pub const fn new(registry: &'r ComponentRegistry) -> Self {
        Self {
            registry,
            artifact: None,
        }
    }

    /// Use an already opened artifact instead of `input_data.artifact_path`
    #[must_use]
    pub fn with_artifact(mut self, artifact: SharedArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Resolve the configuration without setting anything up
    ///
    /// Components are instantiated to collect their defaults and schema,
    /// then dropped.
    pub fn resolve_configuration(
        &self,
        specs: &[ComponentSpec],
        layers: &[ConfigLayer],
    ) -> Result<Arc<ConfigurationTree>> {
        let entries = self.instantiate(specs)?;
        configuration_resolver(&entries, layers).resolve()
    }

    /// Assemble a pipeline
    ///
    /// # Arguments
    /// * `specs` - Component declarations; reordered by category, keeping
    ///   declaration order within each category
    /// * `layers` - Configuration layers above the component defaults,
    ///   lowest priority first (typically the document's `configuration`
    ///   block, then run overrides)
    ///
    /// # Errors
    /// * `UnknownComponent` if any identifier is unregistered; no component
    ///   has been set up at that point
    /// * `Specification` if two observers write to the same output name
    /// * `ConfigurationType` / `MissingConfiguration` from validation
    /// * `Setup` naming the first component whose setup failed
    pub fn assemble(&self, specs: &[ComponentSpec], layers: &[ConfigLayer]) -> Result<Pipeline> {
        let start = Instant::now();
        let mut entries = self.instantiate(specs)?;
        check_observer_names(&entries)?;
        let config = configuration_resolver(&entries, layers).resolve()?;
        let clock = SimulationClock::from_configuration(&config)?;

        let artifact = match (&self.artifact, config.contains(ARTIFACT_PATH_KEY)) {
            (Some(artifact), _) => Some(Arc::clone(artifact)),
            (None, true) => Some(open_artifact(&config.get_path(ARTIFACT_PATH_KEY)?)?),
            (None, false) => None,
        };

        let mut population = CohortTable::new();
        let mut pipelines = RatePipelines::new();
        for entry in &mut entries {
            let identifier = entry.identifier();
            log::debug!("Setting up {identifier}");
            let mut context = SetupContext::new(
                &config,
                artifact.as_deref(),
                &clock,
                &mut population,
                &mut pipelines,
            );
            entry
                .component
                .setup(&mut context)
                .map_err(|e| e.during_setup(&identifier))?;
        }

        log::info!(
            "Assembled {} components over {} cohorts in {:?}",
            entries.len(),
            population.len(),
            start.elapsed()
        );
        Ok(Pipeline {
            entries,
            config,
            clock,
            population,
            pipelines,
        })
    }

    /// Resolve every spec, in execution order, before anything is set up
    fn instantiate(&self, specs: &[ComponentSpec]) -> Result<Vec<PipelineEntry>> {
        self.registry.check(specs)?;

        let mut ordered = specs.to_vec();
        ordered.sort_by_key(|spec| spec.category);
        ordered
            .into_iter()
            .map(|spec| {
                let component = self
                    .registry
                    .resolve_spec(&spec)
                    .map_err(|e| e.during_setup(&spec.declaration()))?;
                Ok(PipelineEntry { spec, component })
            })
            .collect()
    }
}

/// Each observer must own its output file
fn check_observer_names(entries: &[PipelineEntry]) -> Result<()> {
    let mut owners: FxHashMap<&str, String> = FxHashMap::default();
    for entry in entries.iter().filter(|entry| entry.is_observer()) {
        let name = entry.component.name();
        if let Some(first) = owners.insert(name, entry.identifier()) {
            return Err(SimulationError::Specification(format!(
                "observers {first} and {} both write output '{name}'",
                entry.identifier()
            )));
        }
    }
    Ok(())
}

/// Core defaults, then component defaults in execution order, then `layers`
fn configuration_resolver(entries: &[PipelineEntry], layers: &[ConfigLayer]) -> ConfigurationResolver {
    let mut resolver = ConfigurationResolver::new()
        .with_layer("engine defaults", core_defaults())
        .with_schema(&core_schema());
    for entry in entries {
        let defaults = entry.component.configuration_defaults();
        if !defaults.is_empty() {
            resolver.push_layer(&format!("{} defaults", entry.identifier()), defaults);
        }
        resolver.extend_schema(&entry.component.configuration_schema());
    }
    for layer in layers {
        resolver.push_layer(&layer.source, layer.tree.clone());
    }
    resolver
}
