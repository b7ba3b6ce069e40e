//! Simulation state shared by components: the cohort table and the rate
//! pipelines that interventions hook into.

pub mod rates;
pub mod table;

pub use rates::{RateModifier, RatePipelines};
pub use table::{CohortTable, Sex};
