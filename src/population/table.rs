//! Cohort state table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimulationError};

/// Sex of a cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Label used in artifact tables and output files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            other => Err(SimulationError::artifact(format!("unrecognised sex '{other}'"))),
        }
    }
}

/// One row per cohort with its age, sex and tracked flag, plus named
/// numeric columns created by components during setup
///
/// Rows never move: retiring a cohort clears its tracked flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortTable {
    age: Vec<f64>,
    sex: Vec<Sex>,
    tracked: Vec<bool>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl CohortTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all rows with the given cohorts, all tracked
    ///
    /// Existing columns are kept and reset to zero.
    pub fn initialize(&mut self, cohorts: impl IntoIterator<Item = (f64, Sex)>) {
        let (age, sex): (Vec<f64>, Vec<Sex>) = cohorts.into_iter().unzip();
        let rows = age.len();
        self.age = age;
        self.sex = sex;
        self.tracked = vec![true; rows];
        for values in self.columns.values_mut() {
            *values = vec![0.0; rows];
        }
    }

    /// Number of cohort rows, tracked or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.age.len()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.age.is_empty()
    }

    /// Number of tracked cohorts
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.iter().filter(|t| **t).count()
    }

    /// Indices of tracked cohorts
    pub fn tracked_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.tracked
            .iter()
            .enumerate()
            .filter_map(|(i, tracked)| tracked.then_some(i))
    }

    /// Cohort ages in years
    #[must_use]
    pub fn ages(&self) -> &[f64] {
        &self.age
    }

    /// Mutable cohort ages
    pub fn ages_mut(&mut self) -> &mut [f64] {
        &mut self.age
    }

    /// Cohort sexes
    #[must_use]
    pub fn sexes(&self) -> &[Sex] {
        &self.sex
    }

    /// Tracked flags
    #[must_use]
    pub fn tracked(&self) -> &[bool] {
        &self.tracked
    }

    /// Stop tracking a cohort
    pub fn retire(&mut self, row: usize) {
        if let Some(flag) = self.tracked.get_mut(row) {
            *flag = false;
        }
    }

    /// Create a zero-filled column; creating an existing column is a no-op
    pub fn create_column(&mut self, name: &str) {
        let rows = self.len();
        self.columns
            .entry(name.to_string())
            .or_insert_with(|| vec![0.0; rows]);
    }

    /// Whether a column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Names of all numeric columns, sorted
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Read a column
    ///
    /// # Errors
    /// Returns a component error if no component created the column
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| unknown_column(name))
    }

    /// Mutably borrow a column
    pub fn column_mut(&mut self, name: &str) -> Result<&mut [f64]> {
        self.columns
            .get_mut(name)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| unknown_column(name))
    }

    /// Overwrite a column with new values of the same length
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(SimulationError::component(format!(
                "column '{name}' has {} values but the table has {} cohorts",
                values.len(),
                self.len()
            )));
        }
        let slot = self.columns.get_mut(name).ok_or_else(|| unknown_column(name))?;
        *slot = values;
        Ok(())
    }
}

fn unknown_column(name: &str) -> SimulationError {
    SimulationError::component(format!(
        "population column '{name}' does not exist; a component must create it during setup"
    ))
}
