use mslt_composer::error::SimulationError;
use mslt_composer::spec::{Category, ComponentSpec, ModelSpecification, parse_constructor};

const DOCUMENT: &str = r"
components:
  vivarium_public_health:
    mslt:
      observer:
        - MorbidityMortality()
      population:
        - BasePopulation()
        - Mortality()
      disease:
        - Disease('CHD')
        - Disease('Stroke')
      intervention:
        - ModifyDiseaseIncidence('reduce_chd', 'CHD')
configuration:
  input_data:
    artifact_path: artifacts/mslt_tobacco_maori.d
  population:
    population_size: 44
  time.start.year: 2011
  time.end.year: 2120
  time.step_size: 365
";

#[test]
fn document_sections_are_parsed() {
    let spec = ModelSpecification::from_yaml_str(DOCUMENT).unwrap();
    assert_eq!(spec.components.len(), 6);

    let disease = &spec.components[3];
    assert_eq!(disease.name, "Disease");
    assert_eq!(disease.args.as_slice(), ["CHD".to_string()]);
    assert_eq!(disease.category, Category::Disease);
    assert_eq!(disease.module, "vivarium_public_health.mslt.disease");

    assert_eq!(spec.configuration.get_i64("time.end.year").unwrap(), 2120);
    assert_eq!(
        spec.configuration.get_i64("population.population_size").unwrap(),
        44
    );
}

#[test]
fn execution_order_is_category_then_declaration() {
    let spec = ModelSpecification::from_yaml_str(DOCUMENT).unwrap();
    let order: Vec<String> = spec
        .ordered_components()
        .iter()
        .map(ComponentSpec::declaration)
        .collect();
    assert_eq!(
        order,
        vec![
            "BasePopulation()",
            "Mortality()",
            "Disease('CHD')",
            "Disease('Stroke')",
            "ModifyDiseaseIncidence('reduce_chd', 'CHD')",
            "MorbidityMortality()",
        ]
    );
}

#[test]
fn specification_round_trips_through_yaml() {
    let spec = ModelSpecification::from_yaml_str(DOCUMENT).unwrap();
    let text = spec.to_yaml_string().unwrap();
    let reparsed = ModelSpecification::from_yaml_str(&text).unwrap();
    assert_eq!(spec.ordered_components(), reparsed.ordered_components());
    assert_eq!(spec.configuration, reparsed.configuration);
}

#[test]
fn constructor_arguments_are_kept_verbatim() {
    let (name, args) = parse_constructor(r#"Disease("Lung cancer")"#).unwrap();
    assert_eq!(name, "Disease");
    assert_eq!(args.as_slice(), ["Lung cancer".to_string()]);

    let (name, args) = parse_constructor("Tobacco").unwrap();
    assert_eq!(name, "Tobacco");
    assert!(args.is_empty());
}

#[test]
fn malformed_documents_are_rejected() {
    assert!(matches!(
        ModelSpecification::from_yaml_str("components:\n  population:\n    - Disease('CHD'\n"),
        Err(SimulationError::Specification(_))
    ));
    assert!(matches!(
        ModelSpecification::from_yaml_str("components:\n  pets:\n    - Dog()\n"),
        Err(SimulationError::Specification(_))
    ));
    assert!(ModelSpecification::from_yaml_str("configuration: {}\n").is_err());
}
