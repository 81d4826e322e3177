//! System-missing versus user-missing values.
//!
//! Survey exports distinguish a question that was never asked (a null, the
//! "system-missing" value) from a question that was asked but not answered,
//! recorded as a sentinel code such as `-999999999` ("user-missing").

use serde::{Deserialize, Serialize};

/// Sentinel code most survey exports use for user-missing numerics
pub const DEFAULT_USER_MISSING_CODE: f64 = -999_999_999.0;

/// Kind of a missing value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingKind {
    /// Null in the source: the question was skipped by survey logic
    System,
    /// Sentinel code: the question was asked but left unanswered
    User,
}

/// User-missing codes applied to numeric columns at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingValues {
    /// Numeric values treated as user-missing
    pub user_missing_codes: Vec<f64>,
}

impl Default for MissingValues {
    fn default() -> Self {
        Self {
            user_missing_codes: vec![DEFAULT_USER_MISSING_CODE],
        }
    }
}

/// Classify a numeric cell; `None` means the value is present
#[must_use]
pub fn classify_missing(value: Option<f64>, user_missing_codes: &[f64]) -> Option<MissingKind> {
    match value {
        None => Some(MissingKind::System),
        Some(v) if user_missing_codes.contains(&v) => Some(MissingKind::User),
        Some(_) => None,
    }
}

/// Missing-value counts of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMissing {
    /// Table the column belongs to
    pub table: String,
    /// Column name
    pub column: String,
    /// Nulls present in the source
    pub system_missing: usize,
    /// Sentinel codes converted to null
    pub user_missing: usize,
    /// Values that could not be read as the declared type
    pub unrecognised: usize,
}

impl ColumnMissing {
    /// Total number of cells that ended up null
    #[must_use]
    pub fn total(&self) -> usize {
        self.system_missing + self.user_missing + self.unrecognised
    }
}
