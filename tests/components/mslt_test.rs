use std::sync::Arc;

use mslt_composer::runner::Simulation;
use mslt_composer::scheduler::{RunState, Scheduler};
use mslt_composer::spec::ModelSpecification;

use crate::utils::{COHORTS, mslt_artifact, mslt_spec};

fn simulation(document: &str) -> Simulation {
    let spec = ModelSpecification::from_yaml_str(document).unwrap();
    Simulation::new(spec).with_artifact(Arc::new(mslt_artifact()))
}

fn run(document: &str) -> Scheduler {
    let mut scheduler = simulation(document).assemble().unwrap();
    scheduler.run().unwrap();
    scheduler
}

fn prevalence(s: f64, c: f64) -> f64 {
    if s + c > 0.0 { c / (s + c) } else { 0.0 }
}

#[test]
fn century_life_table_completes() {
    let scheduler = run(&mslt_spec(2011, 2120, COHORTS));
    assert_eq!(scheduler.state(), RunState::Completed);
    assert_eq!(scheduler.steps_executed(), 109);
    assert_eq!(scheduler.sink().record_count("mm"), 109);
    assert_eq!(scheduler.sink().record_count("chd"), 109);

    let mm = scheduler.sink().table("mm").unwrap().unwrap();
    assert!(mm.schema().field_with_name("HALY").is_ok());
    assert!(mm.schema().field_with_name("bau_population").is_ok());
    // First step reports every cohort
    assert!(mm.num_rows() > COHORTS as usize);
}

#[test]
fn cohorts_age_and_retire_past_the_maximum_age() {
    let scheduler = run(&mslt_spec(2011, 2015, COHORTS));
    let population = scheduler.pipeline().population();

    assert_eq!(population.len(), COHORTS as usize);
    // Ages advance on every step after the first; 108 and 109 year olds
    // have passed 110 after four steps
    assert_eq!(population.tracked_count(), 216);
    let youngest = population
        .tracked_indices()
        .map(|row| population.ages()[row])
        .fold(f64::INFINITY, f64::min);
    assert!((youngest - 3.0).abs() < 1e-9);
}

#[test]
fn mortality_shrinks_every_cohort() {
    let scheduler = run(&mslt_spec(2011, 2021, COHORTS));
    let population = scheduler.pipeline().population();
    let sizes = population.column("population").unwrap();
    let deaths = population.column("deaths").unwrap();

    for row in population.tracked_indices() {
        assert!(sizes[row] < 1000.0);
        assert!(sizes[row] > 0.0);
        assert!(deaths[row] > 0.0);
    }
}

#[test]
fn incidence_intervention_lowers_prevalence_and_deaths() {
    let scheduler = run(&mslt_spec(2011, 2021, COHORTS));
    let population = scheduler.pipeline().population();
    let s = population.column("CHD_S").unwrap();
    let c = population.column("CHD_C").unwrap();
    let s_bau = population.column("CHD_S_bau").unwrap();
    let c_bau = population.column("CHD_C_bau").unwrap();
    let sizes = population.column("population").unwrap();
    let bau_sizes = population.column("bau_population").unwrap();

    let mut compared = 0;
    for row in population.tracked_indices() {
        if population.ages()[row] < 45.0 {
            continue;
        }
        assert!(prevalence(s[row], c[row]) < prevalence(s_bau[row], c_bau[row]));
        // Lower prevalence means less excess mortality
        assert!(sizes[row] > bau_sizes[row]);
        compared += 1;
    }
    assert!(compared > 0);

    // Below 40 there is no incidence and nothing to prevent
    for row in population.tracked_indices() {
        if population.ages()[row] < 30.0 {
            assert_eq!(c[row], c_bau[row]);
        }
    }
}

#[test]
fn all_cause_mortality_intervention_grows_the_population() {
    let document = mslt_spec(2011, 2016, COHORTS).replace(
        "      - ModifyDiseaseIncidence('reduce_chd', 'CHD')\n",
        "      - ModifyDiseaseIncidence('reduce_chd', 'CHD')\n      - ModifyAllCauseMortality('halve_deaths')\n",
    );
    let spec = ModelSpecification::from_yaml_str(&document).unwrap();
    let mut scheduler = Simulation::new(spec)
        .with_artifact(Arc::new(mslt_artifact()))
        .with_override("intervention.halve_deaths.scale", 0.5)
        .assemble()
        .unwrap();
    scheduler.run().unwrap();

    let population = scheduler.pipeline().population();
    let sizes = population.column("population").unwrap();
    let bau_sizes = population.column("bau_population").unwrap();
    for row in population.tracked_indices() {
        assert!(sizes[row] > bau_sizes[row]);
    }
}

#[test]
fn population_size_must_match_the_artifact() {
    let err = simulation(&mslt_spec(2011, 2120, 100)).assemble().unwrap_err();
    assert_eq!(err.component_name(), Some("BasePopulation()"));
    assert!(err.to_string().contains("population.population_size"));
}

#[test]
fn mortality_requires_the_base_population() {
    let document = mslt_spec(2011, 2021, COHORTS).replace(
        "      - BasePopulation()\n      - Mortality()\n",
        "      - Mortality()\n      - BasePopulation()\n",
    );
    let err = simulation(&document).assemble().unwrap_err();
    assert_eq!(err.component_name(), Some("Mortality()"));
}

#[test]
fn missing_intervention_scale_is_reported_by_key() {
    let document = mslt_spec(2011, 2021, COHORTS).replace("      CHD_incidence_scale: 0.5\n", "");
    let err = simulation(&document).assemble().unwrap_err();
    assert!(matches!(
        err,
        mslt_composer::SimulationError::MissingConfiguration { ref key }
            if key == "intervention.reduce_chd.CHD_incidence_scale"
    ));
}

#[test]
fn disease_observer_cannot_reuse_the_life_table_output_name() {
    let document = mslt_spec(2011, 2021, COHORTS).replace(
        "      - DiseaseObserver('CHD')\n",
        "      - DiseaseObserver('CHD')\n      - DiseaseObserver('MM')\n",
    );
    let err = simulation(&document).assemble().unwrap_err();
    assert!(matches!(err, mslt_composer::SimulationError::Specification(_)));
    assert!(err.to_string().contains("MorbidityMortality()"));
    assert!(err.to_string().contains("DiseaseObserver('MM')"));
}
