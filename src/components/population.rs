//! Core demography: cohort structure, all-cause mortality and disability.
//!
//! Every quantity is tracked twice, once for the intervention scenario and
//! once for business as usual (BAU). The BAU scenario always uses the
//! unmodified artifact rates.

use crate::artifact::LookupTable;
use crate::artifact::lookup::{read_age_column, read_float_column, read_sex_column};
use crate::component::{Component, SetupContext, StepContext};
use crate::config::{ConfigSchema, ConfigurationTree, ValueKind};
use crate::error::{Result, SimulationError};
use crate::population::CohortTable;

use super::{
    BAU_PREFIX, MORTALITY_PIPELINE, YLD_PIPELINE, require_columns, require_population,
};

/// Artifact table holding the initial cohort sizes
pub const POPULATION_TABLE: &str = "population.structure";
/// Artifact table holding the all-cause mortality rate
pub const MORTALITY_TABLE: &str = "cause.all_causes.mortality";
/// Artifact table holding the all-cause YLD rate
pub const DISABILITY_TABLE: &str = "cause.all_causes.disability_rate";

const POPULATION_SIZE_KEY: &str = "population.population_size";
const MAX_AGE_KEY: &str = "population.max_age";
const DEFAULT_MAX_AGE: i64 = 110;

fn not_set_up(component: &str) -> SimulationError {
    SimulationError::component(format!("{component} stepped before setup"))
}

fn bau(column: &str) -> String {
    format!("{BAU_PREFIX}{column}")
}

/// Creates the cohorts, ages them and retires those past the maximum age
#[derive(Debug, Clone, Default)]
pub struct BasePopulation {
    max_age: f64,
}

impl BasePopulation {
    /// Create the component
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for BasePopulation {
    fn name(&self) -> &str {
        "base_population"
    }

    fn configuration_defaults(&self) -> ConfigurationTree {
        ConfigurationTree::new().with(MAX_AGE_KEY, DEFAULT_MAX_AGE)
    }

    fn configuration_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
            .required(POPULATION_SIZE_KEY, ValueKind::Integer)
            .optional(MAX_AGE_KEY, ValueKind::Float)
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        let table = context.artifact()?.load(POPULATION_TABLE)?;
        let ages = read_age_column(&table, POPULATION_TABLE)?;
        let sexes = read_sex_column(&table, POPULATION_TABLE)?;
        let sizes = read_float_column(&table, POPULATION_TABLE, "value")?;

        let expected = context.config().get_i64(POPULATION_SIZE_KEY)?;
        if usize::try_from(expected).ok() != Some(ages.len()) {
            return Err(SimulationError::component(format!(
                "{POPULATION_SIZE_KEY} is {expected} but '{POPULATION_TABLE}' has {} cohorts",
                ages.len()
            )));
        }
        self.max_age = context
            .config()
            .get_f64_or(MAX_AGE_KEY, DEFAULT_MAX_AGE as f64)?;

        let population = &mut *context.population;
        population.initialize(ages.into_iter().zip(sexes));
        for column in ["population", "bau_population"] {
            population.create_column(column);
            population.set_column(column, sizes.clone())?;
        }
        log::info!(
            "Initialised {} cohorts ({} people)",
            population.len(),
            sizes.iter().sum::<f64>()
        );
        Ok(())
    }

    fn on_step(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let step_years = context.clock().step_years();
        let first_step = context.clock().is_first_step();
        let population = &mut *context.population;

        let tracked: Vec<usize> = population.tracked_indices().collect();
        if !first_step {
            let ages = population.ages_mut();
            for &row in &tracked {
                ages[row] += step_years;
            }
        }
        let expired: Vec<usize> = tracked
            .into_iter()
            .filter(|&row| population.ages()[row] > self.max_age)
            .collect();
        for row in expired {
            population.retire(row);
        }
        Ok(())
    }
}

/// Reduces each cohort by the all-cause mortality rate
///
/// The intervention rate is read through the `mortality_rate` pipeline.
#[derive(Debug, Clone, Default)]
pub struct Mortality {
    acmr: Option<LookupTable>,
}

impl Mortality {
    /// Create the component
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

const MORTALITY_COLUMNS: [&str; 5] = ["acmr", "pr_death", "deaths", "person_years", "population"];

impl Component for Mortality {
    fn name(&self) -> &str {
        "mortality"
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        require_population(context.population, "Mortality")?;
        require_columns(
            context.population,
            "Mortality",
            &["population", "bau_population"],
            "BasePopulation()",
        )?;
        self.acmr = Some(context.lookup(MORTALITY_TABLE)?);
        for column in MORTALITY_COLUMNS {
            context.population.create_column(column);
            context.population.create_column(&bau(column));
        }
        Ok(())
    }

    fn on_step(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let acmr = self.acmr.as_ref().ok_or_else(|| not_set_up("Mortality"))?;
        let year = context.time().year();
        let step_years = context.clock().step_years();

        let bau_rates = acmr.values(context.population, year)?;
        let mut rates = bau_rates.clone();
        context.apply_pipeline(MORTALITY_PIPELINE, &mut rates)?;

        apply_mortality(context.population, "", rates, step_years)?;
        apply_mortality(context.population, BAU_PREFIX, bau_rates, step_years)
    }
}

/// Deaths, survivors and person-years for one scenario
fn apply_mortality(
    population: &mut CohortTable,
    prefix: &str,
    rates: Vec<f64>,
    step_years: f64,
) -> Result<()> {
    let column = |name: &str| format!("{prefix}{name}");
    let rows = population.len();
    let mut sizes = population.column(&column("population"))?.to_vec();
    let mut pr_death = vec![0.0; rows];
    let mut deaths = vec![0.0; rows];
    let mut person_years = vec![0.0; rows];

    for row in population.tracked_indices() {
        let probability = 1.0 - (-rates[row] * step_years).exp();
        let died = sizes[row] * probability;
        sizes[row] -= died;
        pr_death[row] = probability;
        deaths[row] = died;
        person_years[row] = (sizes[row] + 0.5 * died) * step_years;
    }

    population.set_column(&column("acmr"), rates)?;
    population.set_column(&column("pr_death"), pr_death)?;
    population.set_column(&column("deaths"), deaths)?;
    population.set_column(&column("person_years"), person_years)?;
    population.set_column(&column("population"), sizes)
}

/// Converts person-years into health-adjusted life years using the
/// all-cause YLD rate
#[derive(Debug, Clone, Default)]
pub struct Disability {
    yld: Option<LookupTable>,
}

impl Disability {
    /// Create the component
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for Disability {
    fn name(&self) -> &str {
        "disability"
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        require_population(context.population, "Disability")?;
        require_columns(
            context.population,
            "Disability",
            &["person_years", "bau_person_years"],
            "Mortality()",
        )?;
        self.yld = Some(context.lookup(DISABILITY_TABLE)?);
        for column in ["yld_rate", "HALY"] {
            context.population.create_column(column);
            context.population.create_column(&bau(column));
        }
        Ok(())
    }

    fn on_step(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let yld = self.yld.as_ref().ok_or_else(|| not_set_up("Disability"))?;
        let year = context.time().year();

        let bau_rates = yld.values(context.population, year)?;
        let mut rates = bau_rates.clone();
        context.apply_pipeline(YLD_PIPELINE, &mut rates)?;

        for (prefix, rates) in [("", rates), (BAU_PREFIX, bau_rates)] {
            let population = &mut *context.population;
            let person_years = population.column(&format!("{prefix}person_years"))?;
            let haly: Vec<f64> = person_years
                .iter()
                .zip(&rates)
                .map(|(py, rate)| py * (1.0 - rate))
                .collect();
            population.set_column(&format!("{prefix}HALY"), haly)?;
            population.set_column(&format!("{prefix}yld_rate"), rates)?;
        }
        Ok(())
    }
}
