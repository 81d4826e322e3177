//! Error handling for the survey pipeline.
//!
//! Configuration problems (missing columns, impossible casts, unknown metric
//! references) and rejected data-quality problems surface as [`SurveyError`].
//! Non-fatal findings are collected in [`crate::report::DataQualityReport`]
//! instead.

use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors that abort a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    /// A column the schema requires is absent from a table
    #[error("Column '{column}' not found in {table} table")]
    MissingColumn {
        /// Table the column was expected in
        table: String,
        /// Name of the missing column
        column: String,
    },

    /// A column exists but cannot be used as the requested type
    #[error("Column '{column}' has type {found}, expected {expected}")]
    ColumnType {
        /// Name of the offending column
        column: String,
        /// Human readable expected type
        expected: String,
        /// Arrow type actually found
        found: String,
    },

    /// The one side of a join carries repeated keys
    #[error("Duplicate values in join key '{column}': {}", .keys.join(", "))]
    DuplicateKeys {
        /// Join key column
        column: String,
        /// Key values seen more than once
        keys: Vec<String>,
    },

    /// Invalid pipeline or aggregation configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The input file extension is not a supported tabular container
    #[error("Unsupported input format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SurveyError {
    /// Build a configuration error from any message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Build a missing column error
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Whether this error is a configuration error, raised before any derivation runs
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. }
                | Self::ColumnType { .. }
                | Self::Config(_)
                | Self::UnsupportedFormat(_)
        )
    }
}

/// Result type for survey pipeline operations
pub type Result<T> = std::result::Result<T, SurveyError>;
