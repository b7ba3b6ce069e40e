//! Factories for the built-in components
//!
//! Each factory checks its own argument count; argument values are used
//! verbatim as disease and intervention names.

use super::ComponentRegistry;
use crate::component::Component;
use crate::components::{
    BasePopulation, Disability, Disease, DiseaseObserver, ModifyAllCauseMortality,
    ModifyDiseaseIncidence, MorbidityMortality, Mortality,
};
use crate::error::{Result, SimulationError};

/// Fail unless `args` has exactly `N` entries, returning them as an array
fn arguments<'a, const N: usize>(component: &str, args: &'a [String]) -> Result<[&'a str; N]> {
    let values: Vec<&str> = args.iter().map(|arg| arg.trim()).collect();
    values.try_into().map_err(|values: Vec<&str>| {
        SimulationError::Specification(format!(
            "{component} takes {N} argument{}, got {}",
            if N == 1 { "" } else { "s" },
            values.len()
        ))
    })
}

/// Create a component by identifier
pub fn component_from_name(name: &str, args: &[String]) -> Result<Box<dyn Component>> {
    match name {
        "BasePopulation" => {
            let [] = arguments::<0>(name, args)?;
            Ok(Box::new(BasePopulation::new()))
        }
        "Mortality" => {
            let [] = arguments::<0>(name, args)?;
            Ok(Box::new(Mortality::new()))
        }
        "Disability" => {
            let [] = arguments::<0>(name, args)?;
            Ok(Box::new(Disability::new()))
        }
        "Disease" => {
            let [disease] = arguments::<1>(name, args)?;
            Ok(Box::new(Disease::new(disease)))
        }
        "ModifyAllCauseMortality" => {
            let [intervention] = arguments::<1>(name, args)?;
            Ok(Box::new(ModifyAllCauseMortality::new(intervention)))
        }
        "ModifyDiseaseIncidence" => {
            let [intervention, disease] = arguments::<2>(name, args)?;
            Ok(Box::new(ModifyDiseaseIncidence::new(intervention, disease)))
        }
        "MorbidityMortality" => {
            let [] = arguments::<0>(name, args)?;
            Ok(Box::new(MorbidityMortality::new()))
        }
        "DiseaseObserver" => {
            let [disease] = arguments::<1>(name, args)?;
            Ok(Box::new(DiseaseObserver::new(disease)))
        }
        _ => Err(SimulationError::UnknownComponent {
            name: name.to_string(),
            declaration: crate::spec::format_constructor(name, args),
        }),
    }
}

/// Identifiers of the built-in components
pub const BUILTIN_COMPONENTS: [&str; 8] = [
    "BasePopulation",
    "Mortality",
    "Disability",
    "Disease",
    "ModifyAllCauseMortality",
    "ModifyDiseaseIncidence",
    "MorbidityMortality",
    "DiseaseObserver",
];

/// A registry holding every built-in component
#[must_use]
pub fn default_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    for name in BUILTIN_COMPONENTS {
        registry.register(name, move |args| component_from_name(name, args));
    }
    registry
}
