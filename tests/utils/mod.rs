//! Shared fixtures: probe components that record what the engine does to
//! them, and an in-memory artifact with small life table inputs.

use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use mslt_composer::component::{Component, ReportContext, SetupContext, StepContext};
use mslt_composer::error::{Result, SimulationError};
use mslt_composer::output::OutputRecord;
use mslt_composer::registry::ComponentRegistry;
use mslt_composer::{InMemoryArtifact, default_registry};

/// Events recorded by probe components, in the order they happened
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Debug)]
enum Behaviour {
    Normal,
    FailSetup,
    FailAt(i32),
    Observe,
}

/// A component that logs its hooks and fails on demand
#[derive(Debug)]
pub struct Probe {
    label: String,
    behaviour: Behaviour,
    log: EventLog,
}

impl Probe {
    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl Component for Probe {
    fn name(&self) -> &str {
        &self.label
    }

    fn setup(&mut self, _context: &mut SetupContext<'_>) -> Result<()> {
        self.record(format!("setup {}", self.label));
        if matches!(self.behaviour, Behaviour::FailSetup) {
            return Err(SimulationError::component("refusing to set up"));
        }
        Ok(())
    }

    fn on_step(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let year = context.time().year();
        self.record(format!("step {} {year}", self.label));
        match self.behaviour {
            Behaviour::FailAt(at) if at == year => Err(SimulationError::component(format!(
                "{} cannot continue in {year}",
                self.label
            ))),
            _ => Ok(()),
        }
    }

    fn report(&mut self, context: &ReportContext<'_>) -> Result<Option<OutputRecord>> {
        if !matches!(self.behaviour, Behaviour::Observe) {
            return Ok(None);
        }
        let year = i64::from(context.time().year());
        self.record(format!("report {} {year}", self.label));
        let schema = Arc::new(Schema::new(vec![Field::new("year", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![year])) as ArrayRef])?;
        Ok(Some(OutputRecord::new(&self.label, batch)))
    }
}

fn probe_factory(
    log: &EventLog,
    behaviour: fn(&[String]) -> Behaviour,
) -> impl Fn(&[String]) -> Result<Box<dyn Component>> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |args: &[String]| {
        let label = args.first().cloned().unwrap_or_else(|| "probe".to_string());
        Ok(Box::new(Probe {
            label,
            behaviour: behaviour(args),
            log: Arc::clone(&log),
        }) as Box<dyn Component>)
    }
}

/// Registry with the built-ins plus `Probe(label)`, `BadSetup(label)`,
/// `FailAt(label, year)` and `StepObserver(name)`
pub fn probe_registry(log: &EventLog) -> ComponentRegistry {
    let mut registry = default_registry();
    registry.register("Probe", probe_factory(log, |_| Behaviour::Normal));
    registry.register("BadSetup", probe_factory(log, |_| Behaviour::FailSetup));
    registry.register(
        "FailAt",
        probe_factory(log, |args| {
            Behaviour::FailAt(args.get(1).and_then(|y| y.parse().ok()).unwrap_or(0))
        }),
    );
    registry.register("StepObserver", probe_factory(log, |_| Behaviour::Observe));
    registry
}

/// A model specification with the given component sections and a `time`
/// block from `start` to `end` (years) with `step_size` days
pub fn probe_spec(sections: &str, start: i32, end: i32, step_size: i64) -> String {
    format!(
        "components:\n{sections}configuration:\n  time:\n    start:\n      year: {start}\n    end:\n      year: {end}\n    step_size: {step_size}\n"
    )
}

const SEXES: [&str; 2] = ["male", "female"];

/// A table with `sex`, `age` and `value` columns, identical for both sexes
pub fn rate_table(ages: &[i64], values: &[f64]) -> RecordBatch {
    let sex: Vec<&str> = SEXES
        .iter()
        .flat_map(|s| std::iter::repeat_n(*s, ages.len()))
        .collect();
    let age: Vec<i64> = SEXES.iter().flat_map(|_| ages.iter().copied()).collect();
    let value: Vec<f64> = SEXES.iter().flat_map(|_| values.iter().copied()).collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("sex", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
        Field::new("value", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(sex)) as ArrayRef,
            Arc::new(Int64Array::from(age)),
            Arc::new(Float64Array::from(value)),
        ],
    )
    .unwrap()
}

/// Number of cohorts in [`mslt_artifact`]: single-year ages 0-109, both sexes
pub const COHORTS: i64 = 220;

/// Small but complete inputs for the built-in components, with one
/// chronic disease named `CHD`
pub fn mslt_artifact() -> InMemoryArtifact {
    let ages: Vec<i64> = (0..110).collect();
    let sizes = vec![1000.0; ages.len()];

    InMemoryArtifact::new()
        .with_table("population.structure", rate_table(&ages, &sizes))
        .with_table(
            "cause.all_causes.mortality",
            rate_table(&[0, 50, 80], &[0.001, 0.01, 0.1]),
        )
        .with_table("cause.all_causes.disability_rate", rate_table(&[0], &[0.1]))
        .with_table("chronic_disease.CHD.incidence", rate_table(&[0, 40], &[0.0, 0.01]))
        .with_table("chronic_disease.CHD.remission", rate_table(&[0], &[0.0]))
        .with_table("chronic_disease.CHD.mortality", rate_table(&[0, 40], &[0.0, 0.05]))
        .with_table("chronic_disease.CHD.morbidity", rate_table(&[0], &[0.2]))
        .with_table("chronic_disease.CHD.prevalence", rate_table(&[0, 40], &[0.0, 0.05]))
}

/// The full life table model: population, CHD, an incidence intervention
/// and both observers
pub fn mslt_spec(start: i32, end: i32, population_size: i64) -> String {
    format!(
        r"components:
  mslt:
    population:
      - BasePopulation()
      - Mortality()
      - Disability()
    disease:
      - Disease('CHD')
    intervention:
      - ModifyDiseaseIncidence('reduce_chd', 'CHD')
    observer:
      - MorbidityMortality()
      - DiseaseObserver('CHD')
configuration:
  population:
    population_size: {population_size}
  time:
    start:
      year: {start}
    end:
      year: {end}
    step_size: 365
  intervention:
    reduce_chd:
      CHD_incidence_scale: 0.5
"
    )
}
