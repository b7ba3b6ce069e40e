//! Component registry: maps identifiers to factory constructors.
//!
//! Model specifications name components as constructor strings such as
//! `Disease('CHD')`. The registry looks the name up and hands the argument
//! strings, verbatim, to the registered factory. It performs no type
//! checking of its own.

pub mod factory;

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::component::Component;
use crate::error::{Result, SimulationError};
use crate::spec::{ComponentSpec, format_constructor};

pub use factory::default_registry;

/// Builds a component from its constructor arguments
pub type ComponentFactory = Arc<dyn Fn(&[String]) -> Result<Box<dyn Component>> + Send + Sync>;

/// A name-to-factory table
///
/// Registries are cheap to clone and can be shared across concurrent runs.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: FxHashMap<String, ComponentFactory>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names())
            .finish()
    }
}

impl ComponentRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous factory
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(name.to_string(), Arc::new(factory))
            .is_some()
        {
            log::debug!("Replaced factory for component '{name}'");
        }
    }

    /// Builder-style variant of [`ComponentRegistry::register`]
    #[must_use]
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&[String]) -> Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Whether a factory is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).sorted().collect()
    }

    /// Instantiate the component `name` with `args`
    ///
    /// # Errors
    /// Returns `UnknownComponent` if no factory is registered under `name`,
    /// otherwise whatever the factory returns
    pub fn resolve(&self, name: &str, args: &[String]) -> Result<Box<dyn Component>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SimulationError::UnknownComponent {
                name: name.to_string(),
                declaration: format_constructor(name, args),
            })?;
        factory(args)
    }

    /// Instantiate the component described by `spec`
    pub fn resolve_spec(&self, spec: &ComponentSpec) -> Result<Box<dyn Component>> {
        self.resolve(&spec.name, &spec.args)
    }

    /// Check that every spec names a registered component
    ///
    /// # Errors
    /// Returns `UnknownComponent` for the first unresolvable spec
    pub fn check(&self, specs: &[ComponentSpec]) -> Result<()> {
        match specs.iter().find(|spec| !self.contains(&spec.name)) {
            Some(spec) => Err(SimulationError::UnknownComponent {
                name: spec.name.clone(),
                declaration: spec.declaration(),
            }),
            None => Ok(()),
        }
    }
}
