//! Processing stages of the survey pipeline
//!
//! The stages run in a fixed order: the household table is joined onto the
//! individual table, categorical columns are derived from raw measurements,
//! and the derived tables are aggregated into summary tables.

pub mod aggregate;
pub mod derive;
pub mod join;
pub mod pyramid;
pub mod summary;

pub use aggregate::{Aggregation, Metric, aggregate, format_percent, format_quotient_percent};
pub use derive::{DerivationReport, Derived, Deriver};
pub use join::{JoinOutput, left_join};
pub use pyramid::{mirror_counts, population_pyramid, pyramid_magnitude};
pub use summary::SummaryTable;
