use chrono::NaiveDate;

use mslt_composer::config::{
    ConfigSchema, ConfigValue, ConfigurationResolver, ConfigurationTree, ValueKind, merge_layers,
};
use mslt_composer::error::SimulationError;

fn layer_a() -> ConfigurationTree {
    ConfigurationTree::new()
        .with("population.population_size", 44)
        .with("population.max_age", 110)
        .with("time.start.year", 2011)
}

fn layer_b() -> ConfigurationTree {
    ConfigurationTree::new()
        .with("population.population_size", 220)
        .with("time.start.year", 2015)
}

fn resolve(layers: &[ConfigurationTree]) -> ConfigurationTree {
    let mut resolver = ConfigurationResolver::new();
    for (i, layer) in layers.iter().enumerate() {
        resolver.push_layer(&format!("layer {i}"), layer.clone());
    }
    resolver.resolve().unwrap().as_ref().clone()
}

#[test]
fn later_layers_override_without_dropping_siblings() {
    let merged = resolve(&[layer_a(), layer_b()]);
    assert_eq!(merged.get_i64("population.population_size").unwrap(), 220);
    assert_eq!(merged.get_i64("population.max_age").unwrap(), 110);
    assert_eq!(merged.get_i64("time.start.year").unwrap(), 2015);
}

#[test]
fn repeating_a_layer_is_idempotent() {
    assert_eq!(
        resolve(&[layer_a(), layer_b()]),
        resolve(&[layer_a(), layer_b(), layer_b()])
    );
    assert_eq!(
        merge_layers([&layer_a(), &layer_b()]),
        merge_layers([&layer_a(), &layer_b(), &layer_b()])
    );
}

#[test]
fn merge_order_matters_for_conflicting_keys() {
    assert_ne!(
        resolve(&[layer_a(), layer_b()]),
        resolve(&[layer_b(), layer_a()])
    );
}

#[test]
fn schema_mismatch_names_the_key() {
    let resolver = ConfigurationResolver::new()
        .with_layer(
            "document",
            ConfigurationTree::new().with("population.population_size", "two hundred"),
        )
        .with_schema(&ConfigSchema::new().required("population.population_size", ValueKind::Integer));

    match resolver.resolve() {
        Err(SimulationError::ConfigurationType { key, expected, .. }) => {
            assert_eq!(key, "population.population_size");
            assert_eq!(expected, ValueKind::Integer);
        }
        other => panic!("expected a configuration type error, got {other:?}"),
    }
}

#[test]
fn numeric_strings_are_coerced_when_validating() {
    let resolved = ConfigurationResolver::new()
        .with_layer(
            "overrides",
            ConfigurationTree::new()
                .with("population.population_size", "220")
                .with("intervention.reduce_chd.CHD_incidence_scale", 1),
        )
        .with_schema(
            &ConfigSchema::new()
                .required("population.population_size", ValueKind::Integer)
                .required("intervention.reduce_chd.CHD_incidence_scale", ValueKind::Float),
        )
        .resolve()
        .unwrap();

    assert_eq!(
        resolved.get("population.population_size"),
        Some(&ConfigValue::Integer(220))
    );
    assert_eq!(
        resolved.get("intervention.reduce_chd.CHD_incidence_scale"),
        Some(&ConfigValue::Float(1.0))
    );
}

#[test]
fn validation_can_be_switched_off_by_the_document() {
    let tree = ConfigurationTree::new()
        .with("population.population_size", "two hundred")
        .with("interpolation.validate", false);
    let schema = ConfigSchema::new().required("population.population_size", ValueKind::Integer);

    let resolved = ConfigurationResolver::new()
        .with_layer("document", tree.clone())
        .with_schema(&schema)
        .resolve()
        .unwrap();
    assert_eq!(
        resolved.get_string("population.population_size").unwrap(),
        "two hundred"
    );

    // The resolver flag is only a default; an explicit document key wins
    let forced = ConfigurationResolver::new()
        .with_layer("document", tree.with("interpolation.validate", true))
        .with_schema(&schema)
        .with_validation(false)
        .resolve();
    assert!(forced.is_err());
}

#[test]
fn missing_required_key_is_reported() {
    let result = ConfigurationResolver::new()
        .with_schema(&ConfigSchema::new().required("time.end.year", ValueKind::Integer))
        .resolve();
    assert!(
        matches!(result, Err(SimulationError::MissingConfiguration { ref key }) if key == "time.end.year")
    );
}

#[test]
fn yaml_round_trip_preserves_the_tree() {
    let tree = ConfigurationTree::from_yaml_str(
        r"
input_data:
  artifact_path: artifacts/mslt.parquet.d
population:
  population_size: 220
  max_age: 110
time:
  start: {year: 2011}
  end: {year: 2120}
  step_size: 365
intervention:
  reduce_chd:
    CHD_incidence_scale: 0.8
    year: 2020
    enabled: true
",
    )
    .unwrap();

    let text = tree.to_yaml_string().unwrap();
    let reparsed = ConfigurationTree::from_yaml_str(&text).unwrap();
    assert_eq!(tree, reparsed);
    assert_eq!(
        reparsed.get_f64("intervention.reduce_chd.CHD_incidence_scale").unwrap(),
        0.8
    );
}

#[test]
fn date_like_strings_and_dates_survive_a_round_trip() {
    let date = NaiveDate::from_ymd_opt(2011, 1, 15).unwrap();
    let tree = ConfigurationTree::new()
        .with("scenario.label", "2011-01-15")
        .with("scenario.start", date);

    let text = tree.to_yaml_string().unwrap();
    assert!(text.contains("!date"));
    let reparsed = ConfigurationTree::from_yaml_str(&text).unwrap();
    assert_eq!(reparsed, tree);
    assert_eq!(
        reparsed.get("scenario.label"),
        Some(&ConfigValue::String("2011-01-15".to_string()))
    );
    assert_eq!(reparsed.get("scenario.start"), Some(&ConfigValue::Date(date)));

    // Quoting is respected; a declared date key still reads the string
    let quoted = ConfigurationTree::from_yaml_str("scenario:\n  label: '2011-01-15'\n").unwrap();
    assert_eq!(
        quoted.get("scenario.label"),
        Some(&ConfigValue::String("2011-01-15".to_string()))
    );
    assert_eq!(quoted.get_date("scenario.label").unwrap(), date);

    let err = ConfigurationTree::from_yaml_str("start: !date fifteenth\n").unwrap_err();
    assert!(matches!(err, SimulationError::Specification(_)));
}

#[test]
fn dotted_keys_expand_into_subtrees() {
    let tree = ConfigurationTree::from_yaml_str("tobacco_eradication.year: 2011\n").unwrap();
    assert_eq!(tree.get_i64("tobacco_eradication.year").unwrap(), 2011);
    assert!(tree.subtree("tobacco_eradication").is_some());
}
