//! Named rate pipelines.
//!
//! A component that owns a rate (mortality, disease incidence, disability)
//! computes its base value each step and passes it through the pipeline of
//! the same name. Other components, typically interventions, register
//! modifiers on that pipeline during setup; they never touch the rate
//! directly.

use std::collections::BTreeMap;
use std::fmt;

use super::table::CohortTable;
use crate::error::{Result, SimulationError};
use crate::time::SimTime;

/// A modifier rewrites a rate vector in place; it sees the current time and
/// a read-only view of the cohort table
pub type RateModifier =
    Box<dyn Fn(SimTime, &CohortTable, &mut [f64]) -> Result<()> + Send + Sync>;

struct RegisteredModifier {
    source: String,
    modify: RateModifier,
}

/// Registry of modifiers keyed by pipeline name
#[derive(Default)]
pub struct RatePipelines {
    pipelines: BTreeMap<String, Vec<RegisteredModifier>>,
}

impl fmt::Debug for RatePipelines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, modifiers) in &self.pipelines {
            let sources: Vec<&str> = modifiers.iter().map(|m| m.source.as_str()).collect();
            map.entry(name, &sources);
        }
        map.finish()
    }
}

impl RatePipelines {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a modifier on `pipeline`, applied after those already registered
    pub fn register_modifier(&mut self, pipeline: &str, source: &str, modify: RateModifier) {
        log::debug!("Component '{source}' modifies rate pipeline '{pipeline}'");
        self.pipelines
            .entry(pipeline.to_string())
            .or_default()
            .push(RegisteredModifier {
                source: source.to_string(),
                modify,
            });
    }

    /// Apply every modifier of `pipeline` to `rates`
    ///
    /// # Errors
    /// Returns the first modifier failure, naming the component that
    /// registered it
    pub fn apply(
        &self,
        pipeline: &str,
        time: SimTime,
        population: &CohortTable,
        rates: &mut [f64],
    ) -> Result<()> {
        let Some(modifiers) = self.pipelines.get(pipeline) else {
            return Ok(());
        };
        for modifier in modifiers {
            (modifier.modify)(time, population, rates).map_err(|e| {
                SimulationError::component(format!(
                    "modifier from '{}' on pipeline '{pipeline}' failed: {e}",
                    modifier.source
                ))
            })?;
        }
        Ok(())
    }

    /// Whether any modifier is registered on `pipeline`
    #[must_use]
    pub fn is_modified(&self, pipeline: &str) -> bool {
        self.pipelines.get(pipeline).is_some_and(|m| !m.is_empty())
    }

    /// Components that registered modifiers on `pipeline`, in order
    #[must_use]
    pub fn sources(&self, pipeline: &str) -> Vec<&str> {
        self.pipelines
            .get(pipeline)
            .map(|modifiers| modifiers.iter().map(|m| m.source.as_str()).collect())
            .unwrap_or_default()
    }
}
