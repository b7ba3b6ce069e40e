//! Layered configuration resolution.
//!
//! Layers are merged lowest priority first. The merged tree is validated
//! against the declared schema (unless validation is switched off) and
//! frozen behind an `Arc` so every component sees the same snapshot.

use std::sync::Arc;

use super::schema::{ConfigSchema, coerce};
use super::tree::{ConfigValue, ConfigurationTree};
use crate::error::{Result, SimulationError};

/// Document key that switches schema validation on or off
pub const VALIDATE_KEY: &str = "interpolation.validate";

/// Merge layers key by key, later layers taking priority
#[must_use]
pub fn merge_layers<'a, I>(layers: I) -> ConfigurationTree
where
    I: IntoIterator<Item = &'a ConfigurationTree>,
{
    let mut merged = ConfigurationTree::new();
    for layer in layers {
        merged.merge_from(layer);
    }
    merged
}

/// A named configuration layer
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Where the layer came from, used in log output
    pub source: String,
    /// The layer's values
    pub tree: ConfigurationTree,
}

/// Resolves ordered configuration layers into one immutable tree
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    layers: Vec<ConfigLayer>,
    schema: ConfigSchema,
    validate: bool,
}

impl Default for ConfigurationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationResolver {
    /// Create a resolver with validation enabled and no layers
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            schema: ConfigSchema::new(),
            validate: true,
        }
    }

    /// Append a layer with higher priority than all existing layers
    #[must_use]
    pub fn with_layer(mut self, source: &str, tree: ConfigurationTree) -> Self {
        self.push_layer(source, tree);
        self
    }

    /// Append a layer in place
    pub fn push_layer(&mut self, source: &str, tree: ConfigurationTree) {
        self.layers.push(ConfigLayer {
            source: source.to_string(),
            tree,
        });
    }

    /// Add schema declarations
    #[must_use]
    pub fn with_schema(mut self, schema: &ConfigSchema) -> Self {
        self.schema.extend(schema);
        self
    }

    /// Add schema declarations in place
    pub fn extend_schema(&mut self, schema: &ConfigSchema) {
        self.schema.extend(schema);
    }

    /// Enable or disable schema validation
    ///
    /// A `interpolation.validate` key in the merged tree takes precedence.
    #[must_use]
    pub const fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// The layers in priority order
    #[must_use]
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// The accumulated schema
    #[must_use]
    pub const fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Merge all layers and validate the result
    ///
    /// # Errors
    /// Returns `ConfigurationType` or `MissingConfiguration` when validation
    /// is enabled and a declared key does not conform
    pub fn resolve(&self) -> Result<Arc<ConfigurationTree>> {
        let mut merged = merge_layers(self.layers.iter().map(|layer| &layer.tree));
        for layer in &self.layers {
            log::debug!(
                "Merged configuration layer '{}' ({} leaves)",
                layer.source,
                layer.tree.leaves().len()
            );
        }

        let validate = merged.get_bool_or(VALIDATE_KEY, self.validate)?;
        if validate {
            self.validate_into(&mut merged)?;
        } else {
            log::warn!("Configuration validation is disabled");
        }

        Ok(Arc::new(merged))
    }

    /// Check every declared key, replacing present values with their
    /// coerced form so each leaf ends up with a single resolved kind
    fn validate_into(&self, tree: &mut ConfigurationTree) -> Result<()> {
        for (key, entry) in self.schema.iter() {
            let Some(value) = tree.get(key) else {
                if entry.required {
                    return Err(SimulationError::MissingConfiguration { key: key.clone() });
                }
                continue;
            };

            let coerced: ConfigValue =
                coerce(value, entry.kind).ok_or_else(|| SimulationError::ConfigurationType {
                    key: key.clone(),
                    expected: entry.kind,
                    found: value.describe(),
                })?;
            if &coerced != value {
                log::debug!("Coerced configuration key '{key}' to {}", entry.kind);
                tree.set(key, coerced);
            }
        }
        Ok(())
    }
}
