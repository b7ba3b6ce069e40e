use std::fs;
use std::sync::Arc;

use parquet::arrow::ArrowWriter;

use mslt_composer::ArtifactSource;
use mslt_composer::runner::{Simulation, run_draws};
use mslt_composer::scheduler::RunState;
use mslt_composer::spec::ModelSpecification;

use crate::utils::{COHORTS, mslt_artifact, mslt_spec, new_log, probe_registry, probe_spec};

fn mslt_simulation(prefix: &std::path::Path) -> Simulation {
    let spec = ModelSpecification::from_yaml_str(&mslt_spec(2011, 2016, COHORTS)).unwrap();
    Simulation::new(spec)
        .with_artifact(Arc::new(mslt_artifact()))
        .with_override("observer.output_prefix", prefix.to_string_lossy().into_owned())
}

#[test]
fn completed_run_writes_one_file_per_observer() {
    let dir = tempfile::tempdir().unwrap();
    let report = mslt_simulation(&dir.path().join("mslt")).run().unwrap();

    assert_eq!(report.summary.steps, 5);
    assert_eq!(
        report.outputs,
        vec![dir.path().join("mslt_chd.csv"), dir.path().join("mslt_mm.csv")]
    );

    let mm = fs::read_to_string(dir.path().join("mslt_mm.csv")).unwrap();
    let header = mm.lines().next().unwrap();
    assert!(header.starts_with("year,age,sex,population,bau_population"));
    assert!(header.ends_with("HALY,bau_HALY"));
    assert!(mm.lines().skip(1).any(|line| line.starts_with("2015,")));
}

#[test]
fn parquet_artifact_directory_drives_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("artifact");
    let tables = mslt_artifact();
    for key in tables.keys().unwrap() {
        let path = key
            .split('.')
            .fold(root.clone(), |path, part| path.join(part))
            .with_extension("parquet");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let table = tables.load(&key).unwrap();
        let mut writer =
            ArrowWriter::try_new(fs::File::create(&path).unwrap(), table.schema(), None).unwrap();
        writer.write(&table).unwrap();
        writer.close().unwrap();
    }
    assert!(root.join("chronic_disease").join("CHD").join("incidence.parquet").is_file());

    let spec = ModelSpecification::from_yaml_str(&mslt_spec(2011, 2016, COHORTS)).unwrap();
    let report = Simulation::new(spec)
        .with_override("input_data.artifact_path", root.to_string_lossy().into_owned())
        .with_override(
            "observer.output_prefix",
            dir.path().join("mslt").to_string_lossy().into_owned(),
        )
        .run()
        .unwrap();

    assert_eq!(report.summary.steps, 5);
    assert_eq!(
        report.outputs,
        vec![dir.path().join("mslt_chd.csv"), dir.path().join("mslt_mm.csv")]
    );

    // Same inputs read from memory give the same life table
    let from_parquet = fs::read_to_string(dir.path().join("mslt_mm.csv")).unwrap();
    let reference = tempfile::tempdir().unwrap();
    mslt_simulation(&reference.path().join("mslt")).run().unwrap();
    assert_eq!(
        from_parquet,
        fs::read_to_string(reference.path().join("mslt_mm.csv")).unwrap()
    );
}

#[test]
fn output_format_can_be_switched_to_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let report = mslt_simulation(&dir.path().join("mslt"))
        .with_override("observer.format", "parquet")
        .run()
        .unwrap();
    assert!(report.outputs.contains(&dir.path().join("mslt_mm.parquet")));
}

#[test]
fn failed_run_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let log = new_log();
    let document = probe_spec(
        "  test:
    population:
      - FailAt('broken', 2015)
    observer:
      - StepObserver('watch')
",
        2011,
        2120,
        365,
    );
    let err = Simulation::new(ModelSpecification::from_yaml_str(&document).unwrap())
        .with_registry(probe_registry(&log))
        .with_override(
            "observer.output_prefix",
            dir.path().join("run").to_string_lossy().into_owned(),
        )
        .run()
        .unwrap_err();

    assert_eq!(err.failed_at().map(|time| time.year()), Some(2015));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn unwritable_output_directory_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let err = mslt_simulation(&dir.path().join("missing").join("mslt"))
        .run()
        .unwrap_err();
    assert!(matches!(err, mslt_composer::SimulationError::Io { .. }));
}

#[test]
fn draws_run_concurrently_with_separate_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let simulation = mslt_simulation(&dir.path().join("mslt"));
    let outcomes = run_draws(&simulation, &[0, 1], Some(2), false).unwrap();

    assert_eq!(outcomes.len(), 2);
    for (outcome, draw) in outcomes.iter().zip([0, 1]) {
        assert_eq!(outcome.draw, draw);
        assert_eq!(outcome.state(), RunState::Completed);
    }
    for name in ["mslt_draw0_mm.csv", "mslt_draw1_mm.csv", "mslt_draw0_chd.csv"] {
        assert!(dir.path().join(name).is_file(), "{name} was not written");
    }
    // Draws never write to the undecorated prefix
    assert!(!dir.path().join("mslt_mm.csv").exists());
}

#[test]
fn failed_draws_are_reported_per_draw() {
    let dir = tempfile::tempdir().unwrap();
    let document = mslt_spec(2011, 2013, COHORTS);
    let failing = Simulation::new(ModelSpecification::from_yaml_str(&document).unwrap())
        .with_artifact(Arc::new(mslt_artifact()))
        .with_override("population.population_size", 10)
        .with_override(
            "observer.output_prefix",
            dir.path().join("mslt").to_string_lossy().into_owned(),
        );
    let outcomes = run_draws(&failing, &[0, 1, 2], Some(2), false).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|outcome| outcome.state() == RunState::Failed));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
