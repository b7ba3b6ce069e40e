//! Chronic diseases modelled as a two-state (susceptible/diseased) process
//! with incidence, remission and excess mortality.
//!
//! Each cohort carries the proportion of people in each state for both the
//! intervention and BAU scenarios. Differences in prevalence between the
//! two scenarios feed back into all-cause mortality and morbidity through
//! rate pipeline modifiers.

use crate::artifact::LookupTable;
use crate::component::{Component, SetupContext, StepContext};
use crate::error::{Result, SimulationError};
use crate::population::CohortTable;
use crate::time::SimTime;

use super::{MORTALITY_PIPELINE, YLD_PIPELINE, incidence_pipeline, prevalence, require_population};

/// Transitions below this magnitude are integrated with a first-order step
const DEGENERATE_RATE: f64 = 1e-12;

#[derive(Debug, Clone)]
struct DiseaseRates {
    incidence: LookupTable,
    remission: LookupTable,
    mortality: LookupTable,
}

/// Column names for one disease
#[derive(Debug, Clone)]
pub struct DiseaseColumns {
    /// Susceptible proportion, intervention scenario
    pub susceptible: String,
    /// Diseased proportion, intervention scenario
    pub diseased: String,
    /// Susceptible proportion, BAU
    pub bau_susceptible: String,
    /// Diseased proportion, BAU
    pub bau_diseased: String,
    /// Incidence rate used this step, intervention scenario
    pub incidence: String,
    /// Incidence rate used this step, BAU
    pub bau_incidence: String,
}

impl DiseaseColumns {
    /// Columns of the disease `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            susceptible: format!("{name}_S"),
            diseased: format!("{name}_C"),
            bau_susceptible: format!("{name}_S_bau"),
            bau_diseased: format!("{name}_C_bau"),
            incidence: format!("{name}_incidence"),
            bau_incidence: format!("{name}_incidence_bau"),
        }
    }

    fn all(&self) -> [&str; 6] {
        [
            self.susceptible.as_str(),
            self.diseased.as_str(),
            self.bau_susceptible.as_str(),
            self.bau_diseased.as_str(),
            self.incidence.as_str(),
            self.bau_incidence.as_str(),
        ]
    }
}

/// A chronic disease, e.g. `Disease('CHD')`
#[derive(Debug, Clone)]
pub struct Disease {
    name: String,
    columns: DiseaseColumns,
    rates: Option<DiseaseRates>,
}

impl Disease {
    /// Create the disease `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: DiseaseColumns::new(name),
            rates: None,
        }
    }

    /// Disease name as declared
    #[must_use]
    pub fn disease(&self) -> &str {
        &self.name
    }

    fn table(&self, measure: &str) -> String {
        format!("chronic_disease.{}.{measure}", self.name)
    }

    fn source(&self) -> String {
        format!("Disease({})", self.name)
    }

    /// Register the modifier adding `measure * (prevalence - bau prevalence)`
    /// to `pipeline`
    fn register_prevalence_modifier(
        &self,
        context: &mut SetupContext<'_>,
        pipeline: &str,
        measure: LookupTable,
    ) {
        let columns = self.columns.clone();
        context.pipelines.register_modifier(
            pipeline,
            &self.source(),
            Box::new(move |time, population, rates| {
                add_prevalence_difference(&columns, &measure, time, population, rates)
            }),
        );
    }
}

fn add_prevalence_difference(
    columns: &DiseaseColumns,
    measure: &LookupTable,
    time: SimTime,
    population: &CohortTable,
    rates: &mut [f64],
) -> Result<()> {
    let s = population.column(&columns.susceptible)?;
    let c = population.column(&columns.diseased)?;
    let s_bau = population.column(&columns.bau_susceptible)?;
    let c_bau = population.column(&columns.bau_diseased)?;
    let year = time.year();

    for row in population.tracked_indices() {
        let delta = prevalence(s[row], c[row]) - prevalence(s_bau[row], c_bau[row]);
        if delta != 0.0 {
            let value = measure.value(population.sexes()[row], population.ages()[row], year)?;
            rates[row] += value * delta;
        }
    }
    Ok(())
}

impl Component for Disease {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        require_population(context.population, &self.source())?;

        let rates = DiseaseRates {
            incidence: context.lookup(&self.table("incidence"))?,
            remission: context.lookup(&self.table("remission"))?,
            mortality: context.lookup(&self.table("mortality"))?,
        };
        let morbidity = context.lookup(&self.table("morbidity"))?;
        let initial = context.lookup(&self.table("prevalence"))?;

        let start_year = context.clock().start().year();
        let diseased = initial.values(context.population, start_year)?;
        let susceptible: Vec<f64> = diseased.iter().map(|p| 1.0 - p).collect();

        let population = &mut *context.population;
        for column in self.columns.all() {
            population.create_column(column);
        }
        population.set_column(&self.columns.susceptible, susceptible.clone())?;
        population.set_column(&self.columns.bau_susceptible, susceptible)?;
        population.set_column(&self.columns.diseased, diseased.clone())?;
        population.set_column(&self.columns.bau_diseased, diseased)?;

        self.register_prevalence_modifier(context, MORTALITY_PIPELINE, rates.mortality.clone());
        self.register_prevalence_modifier(context, YLD_PIPELINE, morbidity);
        self.rates = Some(rates);
        log::debug!("Disease '{}' set up", self.name);
        Ok(())
    }

    fn on_step(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let rates = self.rates.as_ref().ok_or_else(|| {
            SimulationError::component(format!("{} stepped before setup", self.source()))
        })?;
        let year = context.time().year();
        let step_years = context.clock().step_years();

        let bau_incidence = rates.incidence.values(context.population, year)?;
        let mut incidence = bau_incidence.clone();
        context.apply_pipeline(&incidence_pipeline(&self.name), &mut incidence)?;
        let remission = rates.remission.values(context.population, year)?;
        let mortality = rates.mortality.values(context.population, year)?;

        let population = &mut *context.population;
        let scenarios = [
            (&self.columns.susceptible, &self.columns.diseased, &incidence),
            (
                &self.columns.bau_susceptible,
                &self.columns.bau_diseased,
                &bau_incidence,
            ),
        ];
        for (s_column, c_column, incidence) in scenarios {
            let mut s = population.column(s_column)?.to_vec();
            let mut c = population.column(c_column)?.to_vec();
            for row in population.tracked_indices() {
                (s[row], c[row]) = advance_chronic(
                    s[row],
                    c[row],
                    incidence[row],
                    remission[row],
                    mortality[row],
                    step_years,
                );
            }
            population.set_column(s_column, s)?;
            population.set_column(c_column, c)?;
        }
        population.set_column(&self.columns.incidence, incidence)?;
        population.set_column(&self.columns.bau_incidence, bau_incidence)?;
        Ok(())
    }
}

/// Advance the susceptible and diseased proportions over `dt` years
///
/// Closed-form solution of the two-state model with incidence `i`,
/// remission `r` and case fatality `f`. People who die leave both states.
#[must_use]
pub fn advance_chronic(s: f64, c: f64, i: f64, r: f64, f: f64, dt: f64) -> (f64, f64) {
    let l = i + r + f;
    let q = (i * i + r * r + f * f + 2.0 * i * r + 2.0 * f * r - 2.0 * i * f)
        .max(0.0)
        .sqrt();

    if q < DEGENERATE_RATE {
        let new_s = s + (r * c - i * s) * dt;
        let new_c = c + (i * s - (r + f) * c) * dt;
        return (new_s.max(0.0), new_c.max(0.0));
    }

    let w = (-(l + q) * dt / 2.0).exp();
    let v = (-(l - q) * dt / 2.0).exp();
    let new_s = (2.0 * (v - w) * (s * (f + r) + c * r) + s * (v * (q - l) + w * (q + l))) / (2.0 * q);
    let new_c =
        -((v - w) * (2.0 * ((f + r) * (s + c) - l * s) - l * c) - q * c * (v + w)) / (2.0 * q);
    (new_s, new_c)
}
