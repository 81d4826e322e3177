//! Data-quality findings collected during a run
//!
//! None of these findings abort the pipeline; they are gathered from every
//! stage, logged once at the end and returned with the results.

use std::fmt;

use serde::Serialize;

use crate::algorithm::derive::DerivationReport;
use crate::schema::ColumnMissing;
use crate::utils::logging::log_warning;

/// Rows a summary table left out because a grouping value was missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRows {
    /// Summary table name
    pub summary: String,
    /// Number of input rows left out
    pub rows: usize,
}

/// Data-quality findings of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQualityReport {
    /// Household keys seen more than once (first occurrence kept)
    pub duplicate_household_keys: Vec<String>,
    /// Individuals whose key matched no household
    pub unmatched_individuals: usize,
    /// Missing-value counts per loaded column
    pub missing: Vec<ColumnMissing>,
    /// Outcome of each derived column
    pub derivations: Vec<DerivationReport>,
    /// Rows left out of summaries
    pub excluded: Vec<ExcludedRows>,
}

impl DataQualityReport {
    /// Whether any finding deserves attention
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.duplicate_household_keys.is_empty()
            || self.unmatched_individuals > 0
            || self.missing.iter().any(|m| m.user_missing > 0 || m.unrecognised > 0)
            || self.derivations.iter().any(|d| d.out_of_range > 0)
    }

    /// Record rows a summary excluded
    pub fn record_excluded(&mut self, summary: &str, rows: usize) {
        if rows > 0 {
            self.excluded.push(ExcludedRows {
                summary: summary.to_string(),
                rows,
            });
        }
    }

    /// Log every finding at warning level, detail at debug level
    pub fn log_summary(&self) {
        if !self.duplicate_household_keys.is_empty() {
            log_warning(
                &format!(
                    "Duplicate household keys kept at first occurrence: {}",
                    self.duplicate_household_keys.join(", ")
                ),
                None,
            );
        }
        if self.unmatched_individuals > 0 {
            log_warning(
                &format!("{} individuals have no household", self.unmatched_individuals),
                None,
            );
        }
        for missing in &self.missing {
            if missing.unrecognised > 0 {
                log_warning(
                    &format!(
                        "{} unreadable values in table '{}' set to missing",
                        missing.unrecognised, missing.table
                    ),
                    Some(&missing.column),
                );
            }
            if missing.total() > 0 {
                log::debug!(
                    "{}.{}: {} system-missing, {} user-missing",
                    missing.table,
                    missing.column,
                    missing.system_missing,
                    missing.user_missing
                );
            }
        }
        for derivation in &self.derivations {
            if derivation.out_of_range > 0 {
                log_warning(
                    &format!("{} values fall in no category", derivation.out_of_range),
                    Some(&derivation.column),
                );
            }
        }
        for excluded in &self.excluded {
            log::debug!(
                "{}: {} rows with missing grouping values excluded",
                excluded.summary,
                excluded.rows
            );
        }
    }
}

impl fmt::Display for DataQualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data Quality:")?;
        writeln!(
            f,
            "  Duplicate Household Keys: {}",
            self.duplicate_household_keys.len()
        )?;
        writeln!(f, "  Unmatched Individuals: {}", self.unmatched_individuals)?;
        let user_missing: usize = self.missing.iter().map(|m| m.user_missing).sum();
        let unrecognised: usize = self.missing.iter().map(|m| m.unrecognised).sum();
        writeln!(f, "  User-Missing Values: {user_missing}")?;
        writeln!(f, "  Unreadable Values: {unrecognised}")?;
        let out_of_range: usize = self.derivations.iter().map(|d| d.out_of_range).sum();
        writeln!(f, "  Uncategorised Values: {out_of_range}")?;
        Ok(())
    }
}
