//! A Rust library for turning household survey exports into summary tables:
//! schema-checked loading, a household/individual join, categorical
//! derivations and grouped aggregation.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod present;
pub mod report;
pub mod schema;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ColumnNames, DuplicateKeyPolicy, PipelineConfig};
pub use error::{Result, SurveyError};
pub use pipeline::{Pipeline, PipelineOutput};
pub use report::DataQualityReport;
pub use schema::{LoadedTable, MissingValues, TableSchema};

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Stages
pub use algorithm::{
    Aggregation, Deriver, JoinOutput, Metric, SummaryTable, aggregate, format_percent, left_join,
    population_pyramid,
};
pub use loader::{Loader, load_table, read_table};

// Categories
pub use models::categories::{
    AgeGroup, ChildAgeGroup, HouseholdSizeCategory, OrderedCategory, Sex, WastingStatus,
};

// Filtering and presentation
pub use filter::{Expr, LiteralValue};
pub use present::{ChartSpec, ConsolePresenter, CsvPresenter, Presenter};
