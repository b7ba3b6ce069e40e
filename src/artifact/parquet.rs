//! Artifacts stored as a directory of Parquet tables.
//!
//! Table key `cause.all_causes.mortality` lives at
//! `<root>/cause/all_causes/mortality.parquet`. Files are only ever opened
//! for reading, so any number of runs may share one artifact.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{ArtifactSource, missing_table};
use crate::error::util::validate_directory;
use crate::error::{Result, SimulationError};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

const TABLE_EXTENSION: &str = "parquet";

/// A directory of Parquet files addressed by dotted keys
#[derive(Debug, Clone)]
pub struct ParquetArtifact {
    root: PathBuf,
}

impl ParquetArtifact {
    /// Open an artifact rooted at `root`
    ///
    /// # Errors
    /// Returns an `Io` error if `root` is not an existing directory
    pub fn open(root: &Path) -> Result<Self> {
        validate_directory(root, "input artifact")?;
        let artifact = Self {
            root: root.to_path_buf(),
        };
        let tables = artifact.keys()?.len();
        if tables == 0 {
            log_warning("Input artifact holds no Parquet tables", Some(root));
        }
        log::info!("Opened input artifact at {} ({tables} tables)", root.display());
        Ok(artifact)
    }

    /// Root directory of the artifact
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the table `key`
    #[must_use]
    pub fn table_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('.') {
            path.push(part);
        }
        path.set_extension(TABLE_EXTENSION);
        path
    }
}

impl ArtifactSource for ParquetArtifact {
    fn load(&self, key: &str) -> Result<RecordBatch> {
        let path = self.table_path(key);
        if !path.is_file() {
            return Err(missing_table(key));
        }
        read_table(&path)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.root, &mut Vec::new(), &mut keys)?;
        Ok(keys.into_iter().sorted().collect_vec())
    }

    fn contains(&self, key: &str) -> bool {
        self.table_path(key).is_file()
    }
}

/// Read every row group of a Parquet file into a single batch
fn read_table(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading artifact table", path);

    let file = File::open(path)
        .map_err(|e| SimulationError::io("failed to open artifact table", Some(path.into()), e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    let table = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, table.num_rows(), Some(start.elapsed()));
    Ok(table)
}

fn collect_keys(dir: &Path, prefix: &mut Vec<String>, keys: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| SimulationError::io("failed to list artifact directory", Some(dir.into()), e))?;
    for entry in entries {
        let path = entry?.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if path.is_dir() {
            prefix.push(stem);
            collect_keys(&path, prefix, keys)?;
            prefix.pop();
        } else if path.extension().is_some_and(|ext| ext == TABLE_EXTENSION) {
            keys.push(prefix.iter().chain(std::iter::once(&stem)).join("."));
        }
    }
    Ok(())
}
