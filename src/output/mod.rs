//! Observer output collection and persistence.
//!
//! Observers append one [`OutputRecord`] per step to the [`OutputSink`].
//! Nothing touches the filesystem until [`OutputSink::flush`], which writes
//! one file per observer named `<output_prefix>_<observer>.<ext>`.

pub mod record;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::WriterBuilder;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::error::util::validate_writable_directory;
use crate::error::{Result, SimulationError};
use crate::utils::logging::log_operation_complete;

pub use record::cohort_record;

/// One observer's tabular result for one step: rows are cohorts, columns
/// are metrics
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    observer: String,
    batch: RecordBatch,
}

impl OutputRecord {
    /// Create a record for `observer`
    #[must_use]
    pub fn new(observer: &str, batch: RecordBatch) -> Self {
        Self {
            observer: observer.to_string(),
            batch,
        }
    }

    /// Name of the observer that produced this record
    #[must_use]
    pub fn observer(&self) -> &str {
        &self.observer
    }

    /// The record's rows
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

/// File format used when flushing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    /// File extension, without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => Err(SimulationError::ConfigurationType {
                key: crate::config::OUTPUT_FORMAT_KEY.to_string(),
                expected: crate::config::ValueKind::String,
                found: format!("'{other}' (expected 'csv' or 'parquet')"),
            }),
        }
    }
}

/// Accumulates observer records until the run completes
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    records: BTreeMap<String, Vec<RecordBatch>>,
}

impl OutputSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to its observer's set
    ///
    /// # Errors
    /// Returns an Arrow `InvalidArgumentError` if the record's schema differs
    /// from the records this observer appended before; the sink is unchanged
    pub fn append(&mut self, record: OutputRecord) -> Result<()> {
        let batches = self.records.entry(record.observer).or_default();
        if let Some(first) = batches.first() {
            if first.schema() != record.batch.schema() {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "record schema {:?} does not match earlier records {:?}",
                    field_names(&record.batch),
                    field_names(first)
                ))
                .into());
            }
        }
        batches.push(record.batch);
        Ok(())
    }

    /// Names of observers that have appended records, sorted
    pub fn observers(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Number of records appended by `observer`
    #[must_use]
    pub fn record_count(&self, observer: &str) -> usize {
        self.records.get(observer).map_or(0, Vec::len)
    }

    /// Total number of records across observers
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Whether nothing has been appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Concatenate all records of `observer` into one table
    pub fn table(&self, observer: &str) -> Result<Option<RecordBatch>> {
        let Some(batches) = self.records.get(observer) else {
            return Ok(None);
        };
        let Some(first) = batches.first() else {
            return Ok(None);
        };
        Ok(Some(concat_batches(&first.schema(), batches)?))
    }

    /// Path of the file `observer` is flushed to
    #[must_use]
    pub fn output_path(prefix: &Path, observer: &str, format: OutputFormat) -> PathBuf {
        let mut name = prefix.file_name().map_or_else(
            || std::ffi::OsString::from("output"),
            std::ffi::OsStr::to_os_string,
        );
        name.push(format!("_{observer}.{}", format.extension()));
        prefix.with_file_name(name)
    }

    /// Write each observer's records to `<prefix>_<observer>.<ext>`
    ///
    /// # Returns
    /// The paths written, in observer name order
    ///
    /// # Errors
    /// Returns `Io` if the prefix's directory does not exist or is not
    /// writable, and propagates writer failures
    pub fn flush(&self, prefix: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
        let directory = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        validate_writable_directory(directory, "output")?;

        let mut written = Vec::with_capacity(self.records.len());
        for observer in self.records.keys() {
            let Some(table) = self.table(observer)? else {
                continue;
            };
            let path = Self::output_path(prefix, observer, format);
            let start = Instant::now();
            match format {
                OutputFormat::Csv => write_csv(&path, &table)?,
                OutputFormat::Parquet => write_parquet(&path, &table)?,
            }
            log_operation_complete("wrote", &path, table.num_rows(), Some(start.elapsed()));
            written.push(path);
        }
        Ok(written)
    }
}

fn field_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path)
        .map_err(|e| SimulationError::io("failed to create output file", Some(path.into()), e))
}

fn write_csv(path: &Path, table: &RecordBatch) -> Result<()> {
    let file = create_file(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(table)?;
    Ok(())
}

fn write_parquet(path: &Path, table: &RecordBatch) -> Result<()> {
    let file = create_file(path)?;
    let mut writer = ArrowWriter::try_new(file, table.schema(), None)?;
    writer.write(table)?;
    writer.close()?;
    Ok(())
}
