//! Hand-off of summary tables to output
//!
//! A [`Presenter`] receives finished summary tables together with a
//! [`ChartSpec`]. Presenters only format and write; they never regroup or
//! recompute what they are given.

pub mod chart;
pub mod console;
pub mod csv;

pub use chart::ChartSpec;
pub use console::ConsolePresenter;
pub use csv::CsvPresenter;

use crate::algorithm::summary::SummaryTable;
use crate::error::Result;

/// Trait for sinks of summary tables
pub trait Presenter: std::fmt::Debug {
    /// Present one summary table
    fn present(&self, summary: &SummaryTable, chart: &ChartSpec) -> Result<()>;
}
