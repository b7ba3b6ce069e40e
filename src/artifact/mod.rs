//! Read-only access to the input data artifact.
//!
//! The artifact is an externally produced store of named tables (life
//! tables, disease rates, population structure). Components load the tables
//! they need once, during setup. Implementations are `Send + Sync` so a
//! single artifact can be shared by concurrent runs behind an `Arc`.

pub mod lookup;
pub mod parquet;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::error::{Result, SimulationError};

pub use self::lookup::LookupTable;
pub use self::parquet::ParquetArtifact;

/// A read-only tabular store addressed by dotted table keys
pub trait ArtifactSource: Send + Sync + fmt::Debug {
    /// Load a whole table
    ///
    /// # Errors
    /// Returns `Artifact` when the key does not exist
    fn load(&self, key: &str) -> Result<RecordBatch>;

    /// All table keys, sorted
    fn keys(&self) -> Result<Vec<String>>;

    /// Whether a table exists
    fn contains(&self, key: &str) -> bool;
}

/// Shared handle to an artifact
pub type SharedArtifact = Arc<dyn ArtifactSource>;

/// An artifact held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifact {
    tables: BTreeMap<String, RecordBatch>,
}

impl InMemoryArtifact {
    /// Create an empty artifact
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table
    #[must_use]
    pub fn with_table(mut self, key: &str, table: RecordBatch) -> Self {
        self.insert(key, table);
        self
    }

    /// Add or replace a table in place
    pub fn insert(&mut self, key: &str, table: RecordBatch) {
        self.tables.insert(key.to_string(), table);
    }
}

impl ArtifactSource for InMemoryArtifact {
    fn load(&self, key: &str) -> Result<RecordBatch> {
        self.tables
            .get(key)
            .cloned()
            .ok_or_else(|| missing_table(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn contains(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }
}

/// Open the artifact at `path`
///
/// Only directories of Parquet tables are supported.
pub fn open_artifact(path: &Path) -> Result<SharedArtifact> {
    Ok(Arc::new(ParquetArtifact::open(path)?))
}

pub(crate) fn missing_table(key: &str) -> SimulationError {
    SimulationError::artifact(format!("table '{key}' not found in artifact"))
}
