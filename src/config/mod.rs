//! Configuration for the survey pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::aggregate::Aggregation;
use crate::error::Result;
use crate::filter::LiteralValue;
use crate::models::categories::Sex;
use crate::schema::MissingValues;

/// Environment variable overriding the household table path
pub const HOUSEHOLD_PATH_ENV: &str = "SURVEY_HOUSEHOLD_PATH";
/// Environment variable overriding the individual table path
pub const INDIVIDUAL_PATH_ENV: &str = "SURVEY_INDIVIDUAL_PATH";
/// Environment variable overriding the output directory
pub const OUTPUT_DIR_ENV: &str = "SURVEY_OUTPUT_DIR";

/// What to do when the household table repeats a join key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Abort the run with [`crate::SurveyError::DuplicateKeys`]
    #[default]
    Reject,
    /// Keep the first occurrence and report the repeated keys
    Flag,
}

/// Names of source and derived columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Key shared by both tables
    pub join_key: String,
    /// Number of household members
    pub household_size: String,
    /// Sub-population counts carried by each household
    pub household_counts: Vec<String>,
    /// Age of an individual in completed years
    pub age_years: String,
    /// Age of a child in months
    pub age_months: String,
    /// Numeric sex code
    pub sex: String,
    /// Weight-for-height z-score
    pub wasting_z: String,
    /// Consent or response code
    pub consent: String,

    /// Derived household size category
    pub size_category: String,
    /// Derived five-year age band
    pub age_group: String,
    /// Derived child age band
    pub child_age_group: String,
    /// Derived sex label
    pub sex_label: String,
    /// Derived wasting status
    pub wasting: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            join_key: "interview_id".to_string(),
            household_size: "hh_size".to_string(),
            household_counts: vec!["hh_under5".to_string(), "hh_women_15_49".to_string()],
            age_years: "age_years".to_string(),
            age_months: "age_months".to_string(),
            sex: "sex".to_string(),
            wasting_z: "wfhz".to_string(),
            consent: "consent".to_string(),
            size_category: "hh_size_cat".to_string(),
            age_group: "age_group".to_string(),
            child_age_group: "child_age_group".to_string(),
            sex_label: "sex_label".to_string(),
            wasting: "wasting".to_string(),
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Household-level export
    pub household_path: PathBuf,
    /// Individual-level export
    pub individual_path: PathBuf,
    /// Source and derived column names
    pub columns: ColumnNames,
    /// User-missing sentinel codes
    pub missing_values: MissingValues,
    /// Handling of repeated household keys
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Decimals kept when formatting percentages
    pub percent_precision: u32,
    /// Sex whose counts are negated in the population pyramid
    pub pyramid_negated_sex: Sex,
    /// Consent value counted as a response
    pub consent_value: LiteralValue,
    /// Individuals younger than this many months count as children
    pub child_age_ceiling_months: f64,
    /// Directory receiving one CSV per summary table
    pub output_dir: Option<PathBuf>,
    /// Additional aggregations run on the joined table
    pub aggregations: Vec<Aggregation>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            household_path: PathBuf::from("data/household.parquet"),
            individual_path: PathBuf::from("data/individual.parquet"),
            columns: ColumnNames::default(),
            missing_values: MissingValues::default(),
            duplicate_keys: DuplicateKeyPolicy::default(),
            percent_precision: 1,
            pyramid_negated_sex: Sex::Male,
            consent_value: LiteralValue::String("yes".to_string()),
            child_age_ceiling_months: 60.0,
            output_dir: None,
            aggregations: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply path overrides from the environment
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(HOUSEHOLD_PATH_ENV) {
            self.household_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(INDIVIDUAL_PATH_ENV) {
            self.individual_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Household Table: {}", self.household_path.display())?;
        writeln!(f, "  Individual Table: {}", self.individual_path.display())?;
        writeln!(f, "  Join Key: {}", self.columns.join_key)?;
        writeln!(f, "  Duplicate Keys: {:?}", self.duplicate_keys)?;
        writeln!(
            f,
            "  User-Missing Codes: {:?}",
            self.missing_values.user_missing_codes
        )?;
        writeln!(f, "  Percent Precision: {}", self.percent_precision)?;
        writeln!(f, "  Pyramid Negated Sex: {}", self.pyramid_negated_sex)?;
        writeln!(f, "  Child Age Ceiling: {} months", self.child_age_ceiling_months)?;
        if let Some(dir) = &self.output_dir {
            writeln!(f, "  Output Directory: {}", dir.display())?;
        }
        if !self.aggregations.is_empty() {
            writeln!(f, "  Extra Aggregations: {}", self.aggregations.len())?;
        }
        Ok(())
    }
}
