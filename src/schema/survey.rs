//! Schemas of the household and individual exports.

use crate::config::ColumnNames;
use crate::schema::{SemanticType, TableSchema};

/// Name used for the household table in errors and reports
pub const HOUSEHOLD_TABLE: &str = "household";
/// Name used for the individual table in errors and reports
pub const INDIVIDUAL_TABLE: &str = "individual";

/// Household export: one row per surveyed dwelling
#[must_use]
pub fn household_schema(columns: &ColumnNames) -> TableSchema {
    let schema = TableSchema::new(HOUSEHOLD_TABLE)
        .required(&columns.join_key, SemanticType::Text)
        .required(&columns.household_size, SemanticType::Integer);

    columns
        .household_counts
        .iter()
        .fold(schema, |schema, name| schema.optional(name, SemanticType::Integer))
}

/// Individual export: one row per person, keyed to its household
#[must_use]
pub fn individual_schema(columns: &ColumnNames) -> TableSchema {
    TableSchema::new(INDIVIDUAL_TABLE)
        .required(&columns.join_key, SemanticType::Text)
        .required(&columns.sex, SemanticType::Integer)
        .required(&columns.age_years, SemanticType::Real)
        .optional(&columns.age_months, SemanticType::NullableReal)
        .optional(&columns.wasting_z, SemanticType::NullableReal)
        .optional(&columns.consent, SemanticType::Text)
}
