//! Observers recording one row per tracked cohort per step.

use crate::component::{Component, ReportContext, SetupContext};
use crate::error::Result;
use crate::output::{OutputRecord, cohort_record};

use super::disease::DiseaseColumns;
use super::{prevalence, require_columns};

const MORTALITY_METRICS: [&str; 8] = [
    "population",
    "bau_population",
    "deaths",
    "bau_deaths",
    "acmr",
    "bau_acmr",
    "person_years",
    "bau_person_years",
];
const DISABILITY_METRICS: [&str; 4] = ["yld_rate", "bau_yld_rate", "HALY", "bau_HALY"];

/// Population size, deaths, person-years and, when disability is modelled,
/// HALYs for both scenarios
#[derive(Debug, Clone, Default)]
pub struct MorbidityMortality {
    metrics: Vec<&'static str>,
}

impl MorbidityMortality {
    /// Output name of this observer
    pub const NAME: &'static str = "mm";

    /// Create the observer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for MorbidityMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        require_columns(
            context.population,
            "MorbidityMortality",
            &MORTALITY_METRICS,
            "Mortality()",
        )?;
        self.metrics = MORTALITY_METRICS.to_vec();
        if DISABILITY_METRICS
            .iter()
            .all(|column| context.population.has_column(column))
        {
            self.metrics.extend(DISABILITY_METRICS);
        } else {
            log::debug!("Disability() not declared; HALYs are not recorded");
        }
        Ok(())
    }

    fn report(&mut self, context: &ReportContext<'_>) -> Result<Option<OutputRecord>> {
        let columns = self
            .metrics
            .iter()
            .map(|name| Ok((*name, context.population.column(name)?)))
            .collect::<Result<Vec<_>>>()?;
        let batch = cohort_record(context.time(), context.population, &columns)?;
        Ok(Some(OutputRecord::new(Self::NAME, batch)))
    }
}

/// Susceptible and diseased proportions, incidence and prevalence of one
/// disease for both scenarios
#[derive(Debug, Clone)]
pub struct DiseaseObserver {
    disease: String,
    output_name: String,
    columns: DiseaseColumns,
}

impl DiseaseObserver {
    /// Create an observer of `disease`
    #[must_use]
    pub fn new(disease: &str) -> Self {
        Self {
            disease: disease.to_string(),
            output_name: disease.to_lowercase(),
            columns: DiseaseColumns::new(disease),
        }
    }
}

impl Component for DiseaseObserver {
    fn name(&self) -> &str {
        &self.output_name
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        require_columns(
            context.population,
            &format!("DiseaseObserver({})", self.disease),
            &[
                self.columns.susceptible.as_str(),
                self.columns.bau_susceptible.as_str(),
            ],
            &format!("Disease({})", self.disease),
        )
    }

    fn report(&mut self, context: &ReportContext<'_>) -> Result<Option<OutputRecord>> {
        let population = context.population;
        let columns = &self.columns;
        let s = population.column(&columns.susceptible)?;
        let c = population.column(&columns.diseased)?;
        let s_bau = population.column(&columns.bau_susceptible)?;
        let c_bau = population.column(&columns.bau_diseased)?;

        let prevalence_int: Vec<f64> = s.iter().zip(c).map(|(s, c)| prevalence(*s, *c)).collect();
        let prevalence_bau: Vec<f64> = s_bau
            .iter()
            .zip(c_bau)
            .map(|(s, c)| prevalence(*s, *c))
            .collect();

        let batch = cohort_record(
            context.time(),
            population,
            &[
                ("S", s),
                ("C", c),
                ("S_bau", s_bau),
                ("C_bau", c_bau),
                ("incidence", population.column(&columns.incidence)?),
                ("incidence_bau", population.column(&columns.bau_incidence)?),
                ("prevalence", prevalence_int.as_slice()),
                ("prevalence_bau", prevalence_bau.as_slice()),
            ],
        )?;
        Ok(Some(OutputRecord::new(&self.output_name, batch)))
    }
}
