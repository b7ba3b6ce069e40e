//! Built-in multi-state life table components.
//!
//! These cover the component identifiers used by the bundled model
//! specifications: the base population with all-cause mortality and
//! disability, chronic diseases, rate-scaling interventions and the
//! observers that record per-cohort results.

pub mod disease;
pub mod intervention;
pub mod observer;
pub mod population;

pub use disease::Disease;
pub use intervention::{ModifyAllCauseMortality, ModifyDiseaseIncidence};
pub use observer::{DiseaseObserver, MorbidityMortality};
pub use population::{BasePopulation, Disability, Mortality};

use crate::error::{Result, SimulationError};
use crate::population::CohortTable;

/// Pipeline producing the all-cause mortality rate
pub const MORTALITY_PIPELINE: &str = "mortality_rate";
/// Pipeline producing the all-cause YLD rate
pub const YLD_PIPELINE: &str = "yld_rate";

/// Name of the incidence pipeline of `disease`
#[must_use]
pub fn incidence_pipeline(disease: &str) -> String {
    format!("{disease}.incidence")
}

/// Prefix applied to business-as-usual columns
pub const BAU_PREFIX: &str = "bau_";

/// Fail unless every column in `columns` exists
///
/// Components that read another component's columns call this during setup
/// so that an out-of-order declaration fails before the run starts.
pub(crate) fn require_columns(
    population: &CohortTable,
    component: &str,
    columns: &[&str],
    provider: &str,
) -> Result<()> {
    match columns.iter().find(|column| !population.has_column(column)) {
        Some(missing) => Err(SimulationError::component(format!(
            "{component} reads column '{missing}', which is created by {provider}; \
             declare {provider} before {component}"
        ))),
        None => Ok(()),
    }
}

/// Fail unless the cohort table has been initialised
pub(crate) fn require_population(population: &CohortTable, component: &str) -> Result<()> {
    if population.is_empty() {
        return Err(SimulationError::component(format!(
            "{component} needs an initialised population; declare BasePopulation() first"
        )));
    }
    Ok(())
}

/// Proportion of a cohort in the diseased state
#[must_use]
pub(crate) fn prevalence(susceptible: f64, diseased: f64) -> f64 {
    let total = susceptible + diseased;
    if total > 0.0 { diseased / total } else { 0.0 }
}
