//! Simulated calendar and clock.
//!
//! Simulated time is counted in whole days on a 365-day calendar with no
//! leap days, so a step of 365 days always lands on the same calendar date
//! one year later. Month and day arithmetic goes through `chrono` using a
//! fixed non-leap reference year.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::config::ConfigurationTree;
use crate::error::{Result, SimulationError};

/// Number of days in one simulated year
pub const DAYS_PER_YEAR: i64 = 365;

/// Any non-leap year works; only its month lengths are used
const REFERENCE_YEAR: i32 = 2001;

/// Date formats accepted when coercing strings to dates
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Parse a date string, trying each of [`DATE_FORMATS`] in turn
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// A point in simulated time, in days since 0000-01-01 on the 365-day calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(i64);

impl SimTime {
    /// Create a time from a calendar date
    ///
    /// Returns `None` for invalid dates, including February 29.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        let reference = NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, day)?;
        Some(Self(
            i64::from(year) * DAYS_PER_YEAR + i64::from(reference.ordinal0()),
        ))
    }

    /// January 1 of `year`
    #[must_use]
    pub fn from_year(year: i32) -> Self {
        Self(i64::from(year) * DAYS_PER_YEAR)
    }

    /// Convert a `chrono` date, rejecting February 29
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        Self::from_ymd(date.year(), date.month(), date.day())
    }

    /// Raw day count
    #[must_use]
    pub const fn days(self) -> i64 {
        self.0
    }

    /// Calendar year
    #[must_use]
    pub fn year(self) -> i32 {
        // Bounded by the i32 year used to construct every SimTime.
        i32::try_from(self.0.div_euclid(DAYS_PER_YEAR)).unwrap_or(i32::MAX)
    }

    /// Zero-based day within the year
    #[must_use]
    pub fn day_of_year(self) -> u32 {
        u32::try_from(self.0.rem_euclid(DAYS_PER_YEAR)).unwrap_or(0)
    }

    /// Calendar month and day
    #[must_use]
    pub fn month_day(self) -> (u32, u32) {
        NaiveDate::from_yo_opt(REFERENCE_YEAR, self.day_of_year() + 1)
            .map_or((1, 1), |d| (d.month(), d.day()))
    }

    /// This time shifted by `days`, saturating at the ends of the day range
    #[must_use]
    pub const fn add_days(self, days: i64) -> Self {
        Self(self.0.saturating_add(days))
    }

    /// Fractional years elapsed since `earlier`
    #[must_use]
    pub fn years_since(self, earlier: Self) -> f64 {
        (self.0 - earlier.0) as f64 / DAYS_PER_YEAR as f64
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (month, day) = self.month_day();
        write!(f, "{:04}-{month:02}-{day:02}", self.year())
    }
}

/// The simulation clock: current time, fixed step size and end time
///
/// Only the scheduler mutates the clock; components receive it by shared
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    start: SimTime,
    current: SimTime,
    end: SimTime,
    step_days: i64,
}

impl SimulationClock {
    /// Create a clock at `start`
    ///
    /// # Errors
    /// Returns an error if `step_days` is not positive or `end` precedes `start`
    pub fn new(start: SimTime, end: SimTime, step_days: i64) -> Result<Self> {
        if step_days <= 0 {
            return Err(SimulationError::ConfigurationType {
                key: "time.step_size".to_string(),
                expected: crate::config::ValueKind::Integer,
                found: format!("{step_days} (must be a positive number of days)"),
            });
        }
        if end < start {
            return Err(SimulationError::Specification(format!(
                "time.end ({end}) precedes time.start ({start})"
            )));
        }
        Ok(Self {
            start,
            current: start,
            end,
            step_days,
        })
    }

    /// Build a clock from the `time` subtree of a resolved configuration
    pub fn from_configuration(config: &ConfigurationTree) -> Result<Self> {
        let start = read_date(config, "time.start")?;
        let end = read_date(config, "time.end")?;
        let step_days = config.get_i64_or("time.step_size", DAYS_PER_YEAR)?;
        Self::new(start, end, step_days)
    }

    /// Start of the run
    #[must_use]
    pub const fn start(&self) -> SimTime {
        self.start
    }

    /// Current simulated time
    #[must_use]
    pub const fn time(&self) -> SimTime {
        self.current
    }

    /// End of the run
    #[must_use]
    pub const fn end(&self) -> SimTime {
        self.end
    }

    /// Step size in days
    #[must_use]
    pub const fn step_days(&self) -> i64 {
        self.step_days
    }

    /// Step size in years
    #[must_use]
    pub fn step_years(&self) -> f64 {
        self.step_days as f64 / DAYS_PER_YEAR as f64
    }

    /// Whether the clock has reached the end time
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.end
    }

    /// Whether the current time is the first step of the run
    #[must_use]
    pub fn is_first_step(&self) -> bool {
        self.current == self.start
    }

    /// Total number of steps from start to end: `ceil((end - start) / step)`
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        let span = self.end.days() - self.start.days();
        let steps = span / self.step_days + i64::from(span % self.step_days != 0);
        u64::try_from(steps).unwrap_or(0)
    }

    /// Advance by one step
    pub(crate) fn advance(&mut self) {
        self.current = self.current.add_days(self.step_days);
    }
}

fn read_date(config: &ConfigurationTree, prefix: &str) -> Result<SimTime> {
    let year = config.get_i64(&format!("{prefix}.year"))?;
    let month = config.get_i64_or(&format!("{prefix}.month"), 1)?;
    let day = config.get_i64_or(&format!("{prefix}.day"), 1)?;

    let invalid = || SimulationError::ConfigurationType {
        key: prefix.to_string(),
        expected: crate::config::ValueKind::Date,
        found: format!("{year}-{month}-{day}"),
    };
    let year = i32::try_from(year).map_err(|_| invalid())?;
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let day = u32::try_from(day).map_err(|_| invalid())?;
    SimTime::from_ymd(year, month, day).ok_or_else(invalid)
}
