use mslt_composer::config::ConfigLayer;
use mslt_composer::error::SimulationError;
use mslt_composer::pipeline::PipelineAssembler;
use mslt_composer::runner::Simulation;
use mslt_composer::spec::{Category, ComponentSpec, ModelSpecification};

use crate::utils::{events, new_log, probe_registry, probe_spec};

fn simulation(sections: &str) -> (Simulation, crate::utils::EventLog) {
    let log = new_log();
    let spec = ModelSpecification::from_yaml_str(&probe_spec(sections, 2011, 2014, 365)).unwrap();
    (Simulation::new(spec).with_registry(probe_registry(&log)), log)
}

#[test]
fn setup_follows_category_then_declaration_order() {
    let (simulation, log) = simulation(
        "  test:
    observer:
      - StepObserver('watch')
    intervention:
      - Probe('policy')
    population:
      - Probe('people')
      - Probe('deaths')
    disease:
      - Probe('chd')
",
    );
    let scheduler = simulation.assemble().unwrap();
    assert_eq!(
        events(&log),
        vec![
            "setup people",
            "setup deaths",
            "setup chd",
            "setup policy",
            "setup watch"
        ]
    );
    assert_eq!(
        scheduler.pipeline().identifiers(),
        vec![
            "Probe('people')",
            "Probe('deaths')",
            "Probe('chd')",
            "Probe('policy')",
            "StepObserver('watch')"
        ]
    );
    assert_eq!(scheduler.pipeline().observer_names(), vec!["watch"]);
}

#[test]
fn unknown_component_fails_before_any_setup() {
    let (simulation, log) = simulation(
        "  test:
    population:
      - Probe('people')
    disease:
      - Diseaze('CHD')
",
    );
    let err = simulation.assemble().unwrap_err();
    match err {
        SimulationError::UnknownComponent { name, declaration } => {
            assert_eq!(name, "Diseaze");
            assert_eq!(declaration, "Diseaze('CHD')");
        }
        other => panic!("expected an unknown component error, got {other}"),
    }
    assert!(events(&log).is_empty(), "no component may be set up");
}

#[test]
fn setup_failure_aborts_assembly_and_names_the_component() {
    let (simulation, log) = simulation(
        "  test:
    population:
      - Probe('people')
      - BadSetup('broken')
    observer:
      - StepObserver('watch')
",
    );
    let err = simulation.assemble().unwrap_err();
    assert!(matches!(err, SimulationError::Setup { .. }));
    assert_eq!(err.component_name(), Some("BadSetup('broken')"));
    // Components after the failing one are never set up
    assert_eq!(events(&log), vec!["setup people", "setup broken"]);
}

#[test]
fn observers_sharing_an_output_name_are_rejected_before_setup() {
    let (simulation, log) = simulation(
        "  test:
    population:
      - Probe('people')
    observer:
      - StepObserver('watch')
      - StepObserver('watch')
",
    );
    let err = simulation.assemble().unwrap_err();
    assert!(matches!(err, SimulationError::Specification(_)));
    assert!(err.to_string().contains("'watch'"));
    assert!(events(&log).is_empty(), "no component may be set up");
}

#[test]
fn configuration_errors_surface_before_setup() {
    let log = new_log();
    let registry = probe_registry(&log);
    let specs = vec![ComponentSpec::new("Probe", &["people"], Category::Population)];
    let layers = vec![ConfigLayer {
        source: "document".to_string(),
        tree: mslt_composer::ConfigurationTree::new()
            .with("time.start.year", "twenty eleven")
            .with("time.end.year", 2020),
    }];

    let err = PipelineAssembler::new(&registry)
        .assemble(&specs, &layers)
        .unwrap_err();
    assert!(
        matches!(err, SimulationError::ConfigurationType { ref key, .. } if key == "time.start.year")
    );
    assert!(events(&log).is_empty());
}

#[test]
fn component_defaults_are_the_lowest_layer() {
    let spec = ModelSpecification::from_yaml_str(
        "components:
  mslt:
    population:
      - BasePopulation()
configuration:
  population:
    population_size: 220
  time:
    start: {year: 2011}
    end: {year: 2012}
",
    )
    .unwrap();

    let resolved = Simulation::new(spec.clone()).resolve_configuration().unwrap();
    assert_eq!(resolved.get_f64("population.max_age").unwrap(), 110.0);
    assert_eq!(resolved.get_i64("time.step_size").unwrap(), 365);

    let overridden = Simulation::new(spec)
        .with_override("population.max_age", 90)
        .resolve_configuration()
        .unwrap();
    assert_eq!(overridden.get_f64("population.max_age").unwrap(), 90.0);
}
