use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use survey_pipeline::{ColumnNames, PipelineConfig};

/// One person in a test individual table
#[derive(Debug, Clone, Copy)]
pub struct Person<'a> {
    pub household: Option<&'a str>,
    pub sex: Option<i64>,
    pub age_years: Option<f64>,
    pub age_months: Option<f64>,
    pub wfhz: Option<f64>,
    pub consent: Option<&'a str>,
}

impl<'a> Person<'a> {
    /// An adult who consented
    #[must_use]
    pub fn adult(household: &'a str, sex: i64, age_years: f64) -> Self {
        Self {
            household: Some(household),
            sex: Some(sex),
            age_years: Some(age_years),
            age_months: None,
            wfhz: None,
            consent: Some("yes"),
        }
    }

    /// A measured child under five
    #[must_use]
    pub fn child(household: &'a str, sex: i64, age_months: f64, wfhz: Option<f64>) -> Self {
        Self {
            household: Some(household),
            sex: Some(sex),
            age_years: Some((age_months / 12.0).floor()),
            age_months: Some(age_months),
            wfhz,
            consent: Some("yes"),
        }
    }

    #[must_use]
    pub fn consent(mut self, consent: Option<&'a str>) -> Self {
        self.consent = consent;
        self
    }
}

fn column(name: &str, array: impl Array + 'static) -> (&str, ArrayRef) {
    (name, Arc::new(array))
}

fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid test batch")
}

/// Household table with the default column names
#[must_use]
pub fn household_batch(households: &[(&str, i64, i64)]) -> RecordBatch {
    let names = ColumnNames::default();
    batch(vec![
        column(names.join_key.as_str(), StringArray::from_iter_values(households.iter().map(|h| h.0))),
        column(names.household_size.as_str(), Int64Array::from_iter_values(households.iter().map(|h| h.1))),
        column("hh_under5", Int64Array::from_iter_values(households.iter().map(|h| h.2))),
    ])
}

/// Individual table with the default column names
#[must_use]
pub fn individual_batch(people: &[Person<'_>]) -> RecordBatch {
    let names = ColumnNames::default();
    batch(vec![
        column(names.join_key.as_str(), people.iter().map(|p| p.household).collect::<StringArray>()),
        column(names.sex.as_str(), people.iter().map(|p| p.sex).collect::<Int64Array>()),
        column(names.age_years.as_str(), people.iter().map(|p| p.age_years).collect::<Float64Array>()),
        column(names.age_months.as_str(), people.iter().map(|p| p.age_months).collect::<Float64Array>()),
        column(names.wasting_z.as_str(), people.iter().map(|p| p.wfhz).collect::<Float64Array>()),
        column(names.consent.as_str(), people.iter().map(|p| p.consent).collect::<StringArray>()),
    ])
}

/// Two households and three individuals, one of them without a household
#[must_use]
pub fn small_survey() -> (RecordBatch, RecordBatch) {
    let households = household_batch(&[("A", 3, 1), ("B", 6, 0)]);
    let individuals = individual_batch(&[
        Person::child("A", 1, 20.0, Some(-2.4)),
        Person::adult("A", 2, 31.0),
        Person::adult("C", 1, 45.0).consent(Some("no")),
    ]);
    (households, individuals)
}

/// Write a test CSV file
pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test csv");
    path
}

/// Configuration reading two files from a directory
#[must_use]
pub fn file_config(household_path: PathBuf, individual_path: PathBuf) -> PipelineConfig {
    PipelineConfig {
        household_path,
        individual_path,
        ..PipelineConfig::default()
    }
}
