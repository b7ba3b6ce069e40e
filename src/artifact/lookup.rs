//! Cohort-indexed lookup tables built from artifact tables.
//!
//! A lookup table maps `(sex, age, year)` to a value. Ages and years are
//! bin starts: a cohort aged 52.0 reads the row whose age bin starts at or
//! below 52. Years outside the table's range are clamped to the nearest
//! year present, so rates from the last year of data carry forward.

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use super::ArtifactSource;
use crate::error::{Result, SimulationError};
use crate::population::{CohortTable, Sex};
use crate::utils::arrow::{downcast_array, ensure_no_nulls, get_column};

const SEX_COLUMN: &str = "sex";
const AGE_COLUMNS: [&str; 2] = ["age", "age_start"];
const YEAR_COLUMNS: [&str; 2] = ["year", "year_start"];
const DRAW_COLUMN: &str = "draw";
const VALUE_COLUMN: &str = "value";

/// Values for one age bin, sorted by year
#[derive(Debug, Clone, Default)]
struct YearSeries {
    years: Vec<i64>,
    values: Vec<f64>,
}

impl YearSeries {
    fn value_at(&self, year: i64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let idx = self.years.partition_point(|y| *y <= year);
        Some(self.values[idx.saturating_sub(1)])
    }
}

/// Age bins of one sex, sorted by bin start
#[derive(Debug, Clone, Default)]
struct AgeBins {
    starts: Vec<f64>,
    series: Vec<YearSeries>,
}

/// An in-memory `(sex, age, year) -> value` lookup
#[derive(Debug, Clone)]
pub struct LookupTable {
    key: String,
    by_sex: FxHashMap<Sex, AgeBins>,
    has_year: bool,
    rows: usize,
}

impl LookupTable {
    /// Load a table from an artifact and build the lookup
    ///
    /// # Arguments
    /// * `artifact` - Source of the table
    /// * `key` - Dotted table key
    /// * `draw` - Input draw to select when the table has a `draw` column
    ///
    /// # Errors
    /// Returns `Artifact` if the table is missing, lacks required columns,
    /// or has no rows for the requested draw
    pub fn load(artifact: &dyn ArtifactSource, key: &str, draw: i64) -> Result<Self> {
        let batch = artifact.load(key)?;
        Self::from_batch(key, &batch, draw)
    }

    /// Build a lookup from a record batch
    ///
    /// Expects a string `sex` column, a numeric `age` (or `age_start`)
    /// column and a numeric `value` column. `year` (or `year_start`) and
    /// `draw` columns are optional.
    pub fn from_batch(key: &str, batch: &RecordBatch, draw: i64) -> Result<Self> {
        let sexes = read_sex_column(batch, key)?;
        let ages = read_age_column(batch, key)?;
        let values = read_float_column(batch, key, VALUE_COLUMN)?;
        let years = read_first_float_column(batch, key, &YEAR_COLUMNS)?;
        let draws = read_optional_float_column(batch, key, DRAW_COLUMN)?;

        let mut grouped: FxHashMap<Sex, Vec<(f64, i64, f64)>> = FxHashMap::default();
        let mut rows = 0;
        for row in 0..batch.num_rows() {
            if let Some(draws) = &draws {
                if draws[row].round() as i64 != draw {
                    continue;
                }
            }
            let year = years.as_ref().map_or(0, |y| y[row].round() as i64);
            grouped
                .entry(sexes[row])
                .or_default()
                .push((ages[row], year, values[row]));
            rows += 1;
        }

        if rows == 0 {
            let detail = if draws.is_some() {
                format!(" for draw {draw}")
            } else {
                String::new()
            };
            return Err(SimulationError::artifact(format!(
                "table '{key}' has no rows{detail}"
            )));
        }

        let by_sex = grouped
            .into_iter()
            .map(|(sex, entries)| (sex, build_bins(entries)))
            .collect();

        log::debug!("Built lookup table '{key}' from {rows} rows");
        Ok(Self {
            key: key.to_string(),
            by_sex,
            has_year: years.is_some(),
            rows,
        })
    }

    /// Key of the artifact table this lookup was built from
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether values vary by year
    #[must_use]
    pub const fn has_year(&self) -> bool {
        self.has_year
    }

    /// Number of rows used to build the lookup
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows
    }

    /// Whether the lookup holds no rows
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Value for a single cohort
    ///
    /// # Errors
    /// Returns `Artifact` if the table has no rows for `sex` or `age` lies
    /// below the first age bin
    pub fn value(&self, sex: Sex, age: f64, year: i32) -> Result<f64> {
        let bins = self.by_sex.get(&sex).ok_or_else(|| self.absent(sex, age))?;
        let idx = bins.starts.partition_point(|start| *start <= age);
        if idx == 0 {
            return Err(self.absent(sex, age));
        }
        bins.series[idx - 1]
            .value_at(i64::from(year))
            .ok_or_else(|| self.absent(sex, age))
    }

    /// Values for every row of the cohort table; untracked rows read zero
    pub fn values(&self, population: &CohortTable, year: i32) -> Result<Vec<f64>> {
        population
            .ages()
            .iter()
            .zip(population.sexes())
            .zip(population.tracked())
            .map(|((age, sex), tracked)| {
                if *tracked {
                    self.value(*sex, *age, year)
                } else {
                    Ok(0.0)
                }
            })
            .collect()
    }

    fn absent(&self, sex: Sex, age: f64) -> SimulationError {
        SimulationError::artifact(format!(
            "table '{}' has no value for {sex} cohort aged {age}",
            self.key
        ))
    }
}

fn build_bins(mut entries: Vec<(f64, i64, f64)>) -> AgeBins {
    entries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut bins = AgeBins::default();
    for (age, year, value) in entries {
        if bins.starts.last().is_none_or(|last| *last != age) {
            bins.starts.push(age);
            bins.series.push(YearSeries::default());
        }
        if let Some(series) = bins.series.last_mut() {
            // Duplicate (age, year) rows keep the last value
            if series.years.last() == Some(&year) {
                if let Some(last) = series.values.last_mut() {
                    *last = value;
                }
            } else {
                series.years.push(year);
                series.values.push(value);
            }
        }
    }
    bins
}

/// Read the `sex` column of a table
pub(crate) fn read_sex_column(batch: &RecordBatch, table: &str) -> Result<Vec<Sex>> {
    let column = get_column(batch, table, SEX_COLUMN, &DataType::Utf8, true)?
        .ok_or_else(|| SimulationError::artifact(format!("table '{table}' has no 'sex' column")))?;
    ensure_no_nulls(&column, table, SEX_COLUMN)?;
    let strings = downcast_array::<StringArray>(&column, table, SEX_COLUMN)?;
    strings.iter().flatten().map(str::parse).collect()
}

/// Read a required numeric column as `f64`
pub(crate) fn read_float_column(batch: &RecordBatch, table: &str, name: &str) -> Result<Vec<f64>> {
    read_optional_float_column(batch, table, name)?
        .ok_or_else(|| SimulationError::artifact(format!("table '{table}' has no '{name}' column")))
}

/// Read an optional numeric column as `f64`
pub(crate) fn read_optional_float_column(
    batch: &RecordBatch,
    table: &str,
    name: &str,
) -> Result<Option<Vec<f64>>> {
    let Some(column) = get_column(batch, table, name, &DataType::Float64, false)? else {
        return Ok(None);
    };
    ensure_no_nulls(&column, table, name)?;
    let floats = downcast_array::<Float64Array>(&column, table, name)?;
    Ok(Some(floats.values().to_vec()))
}

/// Read the `age` (or `age_start`) column of a table
pub(crate) fn read_age_column(batch: &RecordBatch, table: &str) -> Result<Vec<f64>> {
    read_first_float_column(batch, table, &AGE_COLUMNS)?.ok_or_else(|| {
        SimulationError::artifact(format!("table '{table}' has no 'age' or 'age_start' column"))
    })
}

fn read_first_float_column(
    batch: &RecordBatch,
    table: &str,
    names: &[&str],
) -> Result<Option<Vec<f64>>> {
    for name in names {
        if let Some(values) = read_optional_float_column(batch, table, name)? {
            return Ok(Some(values));
        }
    }
    Ok(None)
}
