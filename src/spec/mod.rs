//! Model specification documents.
//!
//! A model specification has two top-level keys: `components`, a nested
//! mapping `<package>.<module>.<category>: [constructor, ...]`, and
//! `configuration`, a nested mapping of configuration overrides.
//!
//! ```yaml
//! components:
//!   mslt:
//!     population:
//!       - BasePopulation()
//!       - Mortality()
//!     disease:
//!       - Disease('CHD')
//! configuration:
//!   population:
//!     population_size: 220
//! ```

pub mod constructor;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::config::ConfigurationTree;
use crate::error::util::safe_read_to_string;
use crate::error::{Result, SimulationError};

pub use constructor::{ConstructorArgs, format_constructor, parse_constructor};

/// Component category; the declaration order of the variants is the fixed
/// cross-category execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Population,
    Disease,
    Intervention,
    Observer,
}

impl Category {
    /// All categories in execution order
    pub const ALL: [Self; 4] = [
        Self::Population,
        Self::Disease,
        Self::Intervention,
        Self::Observer,
    ];

    /// Name used in model specification documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::Disease => "disease",
            Self::Intervention => "intervention",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| {
                SimulationError::Specification(format!(
                    "unknown component category '{s}' (expected population, disease, intervention or observer)"
                ))
            })
    }
}

/// One declared component: identifier, verbatim arguments and category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Registry identifier, e.g. `Disease`
    pub name: String,
    /// Constructor arguments, passed verbatim to the factory
    pub args: ConstructorArgs,
    /// Category the component was declared under
    pub category: Category,
    /// Dotted module path the component was declared under, e.g. `mslt.disease`
    pub module: String,
}

impl ComponentSpec {
    /// Create a spec directly, without a document
    #[must_use]
    pub fn new(name: &str, args: &[&str], category: Category) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            category,
            module: category.as_str().to_string(),
        }
    }

    /// Parse a constructor string declared under `module`
    pub fn parse(declaration: &str, category: Category, module: &str) -> Result<Self> {
        let (name, args) = parse_constructor(declaration)?;
        Ok(Self {
            name,
            args,
            category,
            module: module.to_string(),
        })
    }

    /// The declaration in constructor syntax
    #[must_use]
    pub fn declaration(&self) -> String {
        format_constructor(&self.name, &self.args)
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declaration())
    }
}

/// A parsed model specification document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSpecification {
    /// Components in document declaration order
    pub components: Vec<ComponentSpec>,
    /// The document's configuration overrides
    pub configuration: ConfigurationTree,
}

impl ModelSpecification {
    /// Load and parse a model specification file
    pub fn load(path: &Path) -> Result<Self> {
        crate::utils::logging::log_operation_start("Loading model specification", path);
        let text = safe_read_to_string(path, "model specification")?;
        let spec = Self::from_yaml_str(&text)?;
        log::info!(
            "Model specification declares {} components and {} configuration values",
            spec.components.len(),
            spec.configuration.leaves().len()
        );
        Ok(spec)
    }

    /// Parse a model specification from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(root) = document else {
            return Err(SimulationError::Specification(
                "document must be a mapping with 'components' and 'configuration' keys".to_string(),
            ));
        };

        let mut spec = Self::default();
        for (key, node) in &root {
            match key.as_str() {
                Some("components") => collect_components(node, &mut Vec::new(), &mut spec.components)?,
                Some("configuration") => spec.configuration = ConfigurationTree::from_yaml(node)?,
                Some(other) => log::warn!("Ignoring unknown model specification key '{other}'"),
                None => {
                    return Err(SimulationError::Specification(format!(
                        "top-level keys must be strings, found {key:?}"
                    )));
                }
            }
        }

        if !root.contains_key("components") {
            return Err(SimulationError::Specification(
                "missing 'components' section".to_string(),
            ));
        }
        Ok(spec)
    }

    /// Components ordered for execution: by category, then declaration order
    #[must_use]
    pub fn ordered_components(&self) -> Vec<ComponentSpec> {
        let mut ordered = self.components.clone();
        // Stable sort keeps declaration order within a category.
        ordered.sort_by_key(|spec| spec.category);
        ordered
    }

    /// Serialize back into a YAML document
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut components = Mapping::new();
        for spec in &self.components {
            let mut path: Vec<&str> = spec.module.split('.').filter(|s| !s.is_empty()).collect();
            if path.last() != Some(&spec.category.as_str()) {
                path.push(spec.category.as_str());
            }
            insert_declaration(&mut components, &path, spec.declaration())?;
        }

        let mut root = Mapping::new();
        root.insert(Value::from("components"), Value::Mapping(components));
        root.insert(
            Value::from("configuration"),
            self.configuration.to_yaml_value(),
        );
        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }
}

fn collect_components<'a>(
    node: &'a Value,
    path: &mut Vec<&'a str>,
    out: &mut Vec<ComponentSpec>,
) -> Result<()> {
    match node {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let key = key.as_str().ok_or_else(|| {
                    SimulationError::Specification(format!(
                        "component section keys must be strings, found {key:?}"
                    ))
                })?;
                let depth = path.len();
                path.extend(key.split('.'));
                collect_components(child, path, out)?;
                path.truncate(depth);
            }
            Ok(())
        }
        Value::Sequence(items) => {
            let category_name = path.last().ok_or_else(|| {
                SimulationError::Specification(
                    "component lists must be nested under a category key".to_string(),
                )
            })?;
            let category: Category = category_name.parse()?;
            let module = path.join(".");
            for item in items {
                let declaration = item.as_str().ok_or_else(|| {
                    SimulationError::Specification(format!(
                        "component declarations under '{module}' must be strings, found {item:?}"
                    ))
                })?;
                out.push(ComponentSpec::parse(declaration, category, &module)?);
            }
            Ok(())
        }
        Value::Null => Ok(()),
        other => Err(SimulationError::Specification(format!(
            "unexpected value under component section '{}': {other:?}",
            path.join(".")
        ))),
    }
}

fn insert_declaration(mapping: &mut Mapping, path: &[&str], declaration: String) -> Result<()> {
    let Some((head, rest)) = path.split_first() else {
        return Err(SimulationError::Specification(
            "component module path is empty".to_string(),
        ));
    };
    let key = Value::from(*head);
    let empty = if rest.is_empty() {
        Value::Sequence(Vec::new())
    } else {
        Value::Mapping(Mapping::new())
    };
    if !mapping.contains_key(&key) {
        mapping.insert(key.clone(), empty);
    }

    match (mapping.get_mut(&key), rest.is_empty()) {
        (Some(Value::Sequence(items)), true) => {
            items.push(Value::from(declaration));
            Ok(())
        }
        (Some(Value::Mapping(child)), false) => insert_declaration(child, rest, declaration),
        _ => Err(SimulationError::Specification(format!(
            "component section '{head}' is both a list and a mapping"
        ))),
    }
}
