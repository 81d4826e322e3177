//! Row-wise recoding of survey columns into ordered categories
//!
//! Each rule is a pure, total function from an optional input value to an
//! optional category: it never panics, and any input without a matching
//! bucket yields `None` (a missing category) rather than an error. The
//! [`Deriver`] applies a list of rules to a batch and returns a new batch.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::config::ColumnNames;
use crate::error::{Result, SurveyError};
use crate::models::categories::{
    AgeGroup, ChildAgeGroup, HouseholdSizeCategory, OrderedCategory, Sex, WastingStatus,
    categorical_array, categorical_data_type,
};
use crate::utils::arrow::{float_column, int_column};
use crate::utils::logging::log_warning;

/// Household size bins: 1-4, 5-6, 7-9, >=10
///
/// Sizes up to four (including zero) fall in the first bin; negative sizes
/// have no bin.
#[must_use]
pub fn household_size_category(size: Option<i64>) -> Option<HouseholdSizeCategory> {
    match size? {
        s if s < 0 => None,
        0..=4 => Some(HouseholdSizeCategory::UpToFour),
        5..=6 => Some(HouseholdSizeCategory::FiveToSix),
        7..=9 => Some(HouseholdSizeCategory::SevenToNine),
        _ => Some(HouseholdSizeCategory::TenOrMore),
    }
}

/// Five-year age band over half-open intervals `[5k, 5k + 5)`, with `95+` last
#[must_use]
pub fn age_group(years: Option<f64>) -> Option<AgeGroup> {
    let years = years?;
    if years.is_nan() || years < 0.0 {
        return None;
    }
    // Float to int casts saturate, so very large ages land in 95+
    Some(AgeGroup::from_years(years.floor() as u32))
}

/// Child age band in months; ages outside 0 to 59 months have no band
#[must_use]
pub fn child_age_group(months: Option<f64>) -> Option<ChildAgeGroup> {
    let months = months?;
    if months.is_nan() || months < 0.0 {
        return None;
    }
    ChildAgeGroup::UPPER_BOUNDS
        .iter()
        .position(|upper| months < f64::from(*upper))
        .and_then(ChildAgeGroup::from_ordinal)
}

/// Binary sex recode: code 1 is male, any other code female
///
/// A null code stays missing instead of defaulting to female.
#[must_use]
pub fn sex_label(code: Option<i64>) -> Option<Sex> {
    match code? {
        1 => Some(Sex::Male),
        _ => Some(Sex::Female),
    }
}

/// Wasting classification of a weight-for-height z-score
///
/// Bands are half-open: `z >= -2` is no wasting, `-3 <= z < -2` moderate and
/// `z < -3` severe. A score of exactly -3.0 is therefore moderate. Some survey
/// guidance lists -3.0 as severe; that reading conflicts with the half-open
/// WHO cut-offs and is not followed here.
#[must_use]
pub fn wasting_status(z_score: Option<f64>) -> Option<WastingStatus> {
    let z = z_score?;
    if z.is_nan() {
        None
    } else if z >= -2.0 {
        Some(WastingStatus::NoWasting)
    } else if z >= -3.0 {
        Some(WastingStatus::Moderate)
    } else {
        Some(WastingStatus::Severe)
    }
}

/// Recoding rule behind a derived column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationRule {
    /// [`household_size_category`] over an integer column
    HouseholdSize,
    /// [`age_group`] over ages in years
    AgeGroup,
    /// [`child_age_group`] over ages in months
    ChildAgeGroup,
    /// [`sex_label`] over a numeric sex code
    SexLabel,
    /// [`wasting_status`] over a z-score
    Wasting,
}

impl DerivationRule {
    /// Ordered label set the rule produces
    #[must_use]
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::HouseholdSize => HouseholdSizeCategory::LABELS,
            Self::AgeGroup => AgeGroup::LABELS,
            Self::ChildAgeGroup => ChildAgeGroup::LABELS,
            Self::SexLabel => Sex::LABELS,
            Self::Wasting => WastingStatus::LABELS,
        }
    }
}

/// A column to add to a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedColumn {
    /// Name of the output column
    pub name: String,
    /// Name of the input column
    pub input: String,
    /// Rule mapping input to output
    pub rule: DerivationRule,
}

impl DerivedColumn {
    /// Create a derived column definition
    #[must_use]
    pub fn new(name: impl Into<String>, input: impl Into<String>, rule: DerivationRule) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            rule,
        }
    }
}

/// Per-column outcome of a derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationReport {
    /// Output column
    pub column: String,
    /// Rows whose input was null
    pub missing_input: usize,
    /// Rows with a present input that fell in no bucket
    pub out_of_range: usize,
}

/// A table with derived columns and what happened while deriving them
#[derive(Debug, Clone)]
pub struct Derived {
    /// Input columns plus the derived ones
    pub batch: RecordBatch,
    /// One report per derived column
    pub reports: Vec<DerivationReport>,
}

/// Applies a fixed list of derivations to a table
#[derive(Debug, Clone)]
pub struct Deriver {
    table: String,
    columns: Vec<DerivedColumn>,
}

impl Deriver {
    /// Create a deriver for a named table
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Vec<DerivedColumn>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Household-level derivations
    #[must_use]
    pub fn for_households(table: impl Into<String>, names: &ColumnNames) -> Self {
        Self::new(
            table,
            vec![DerivedColumn::new(
                &names.size_category,
                &names.household_size,
                DerivationRule::HouseholdSize,
            )],
        )
    }

    /// Person-level derivations, plus the household ones carried by the join
    #[must_use]
    pub fn for_joined(table: impl Into<String>, names: &ColumnNames) -> Self {
        Self::new(
            table,
            vec![
                DerivedColumn::new(&names.size_category, &names.household_size, DerivationRule::HouseholdSize),
                DerivedColumn::new(&names.age_group, &names.age_years, DerivationRule::AgeGroup),
                DerivedColumn::new(&names.child_age_group, &names.age_months, DerivationRule::ChildAgeGroup),
                DerivedColumn::new(&names.sex_label, &names.sex, DerivationRule::SexLabel),
                DerivedColumn::new(&names.wasting, &names.wasting_z, DerivationRule::Wasting),
            ],
        )
    }

    /// Derived column definitions
    #[must_use]
    pub fn columns(&self) -> &[DerivedColumn] {
        &self.columns
    }

    /// Return a new batch with every derived column added
    ///
    /// All input columns are checked before anything is computed. A derived
    /// column that already exists is replaced in place, so applying the same
    /// deriver twice gives the same batch.
    pub fn apply(&self, batch: &RecordBatch) -> Result<Derived> {
        let schema = batch.schema();
        for column in &self.columns {
            if schema.index_of(&column.input).is_err() {
                return Err(SurveyError::missing_column(&self.table, &column.input));
            }
        }

        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
        let mut reports = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let (array, report) = self.derive_column(batch, column)?;
            if report.out_of_range > 0 {
                log_warning(
                    &format!(
                        "{} values of '{}' fall outside every {} bucket",
                        report.out_of_range, column.input, column.name
                    ),
                    Some(&column.input),
                );
            }

            let field = Field::new(&column.name, categorical_data_type(), true);
            match fields.iter().position(|f| f.name() == &column.name) {
                Some(idx) => {
                    fields[idx] = field;
                    arrays[idx] = array;
                }
                None => {
                    fields.push(field);
                    arrays.push(array);
                }
            }
            reports.push(report);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Derived { batch, reports })
    }

    fn derive_column(&self, batch: &RecordBatch, column: &DerivedColumn) -> Result<(ArrayRef, DerivationReport)> {
        let mut report = DerivationReport {
            column: column.name.clone(),
            missing_input: 0,
            out_of_range: 0,
        };

        let array = match column.rule {
            DerivationRule::HouseholdSize => {
                let input = int_column(batch, &self.table, &column.input)?;
                categorical_array(&recode(input.iter(), household_size_category, &mut report))?
            }
            DerivationRule::SexLabel => {
                let input = int_column(batch, &self.table, &column.input)?;
                categorical_array(&recode(input.iter(), sex_label, &mut report))?
            }
            DerivationRule::AgeGroup => {
                let input = float_column(batch, &self.table, &column.input)?;
                categorical_array(&recode(input.iter(), age_group, &mut report))?
            }
            DerivationRule::ChildAgeGroup => {
                let input = float_column(batch, &self.table, &column.input)?;
                categorical_array(&recode(input.iter(), child_age_group, &mut report))?
            }
            DerivationRule::Wasting => {
                let input = float_column(batch, &self.table, &column.input)?;
                categorical_array(&recode(input.iter(), wasting_status, &mut report))?
            }
        };

        Ok((array, report))
    }
}

fn recode<T: Copy, C: OrderedCategory>(
    inputs: impl Iterator<Item = Option<T>>,
    rule: fn(Option<T>) -> Option<C>,
    report: &mut DerivationReport,
) -> Vec<Option<C>> {
    inputs
        .map(|value| {
            let category = rule(value);
            match (value, category) {
                (None, _) => report.missing_input += 1,
                (Some(_), None) => report.out_of_range += 1,
                (Some(_), Some(_)) => {}
            }
            category
        })
        .collect()
}
