//! Declared table schemas, checked once at load time.
//!
//! A [`TableSchema`] lists the columns a table must (or may) carry together
//! with their semantic type. [`TableSchema::coerce`] validates a freshly read
//! batch against it and casts every declared column to its canonical Arrow
//! type, turning user-missing sentinel codes into nulls while counting them
//! separately from system-missing nulls.

pub mod missing;
pub mod survey;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, new_null_array};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, warn};

use crate::error::{Result, SurveyError};
use crate::models::categories::categorical_data_type;

pub use missing::{ColumnMissing, MissingKind, MissingValues, classify_missing};

/// Semantic type of a column, independent of how the export stored it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Whole numbers, stored as `Int64`
    Integer,
    /// Real numbers expected to be present, stored as `Float64`
    Real,
    /// Real numbers where nulls are expected (skipped questions), stored as `Float64`
    NullableReal,
    /// Free text or identifiers, stored as `Utf8`
    Text,
    /// One of a fixed, ordered label set, stored as an `Int8` dictionary
    Categorical(&'static [&'static str]),
}

impl SemanticType {
    /// Canonical Arrow type for this semantic type
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Real | Self::NullableReal => DataType::Float64,
            Self::Text => DataType::Utf8,
            Self::Categorical(_) => categorical_data_type(),
        }
    }

    /// Whether user-missing sentinel codes apply to this type
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Real | Self::NullableReal)
    }
}

/// A single declared column
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Column name in the export
    pub name: String,
    /// Semantic type the column is coerced to
    pub semantic_type: SemanticType,
    /// Whether a missing column aborts the load
    pub required: bool,
}

/// Declared schema of one input table
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name used in errors and reports
    pub table: String,
    /// Declared columns
    pub columns: Vec<ColumnSpec>,
}

/// A batch that passed schema validation, with its missing-value counts
#[derive(Debug, Clone)]
pub struct LoadedTable {
    /// Coerced data
    pub batch: RecordBatch,
    /// System- and user-missing counts for each declared column
    pub missing: Vec<ColumnMissing>,
}

impl TableSchema {
    /// Create an empty schema for a named table
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Declare a required column
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            semantic_type,
            required: true,
        });
        self
    }

    /// Declare an optional column
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            semantic_type,
            required: false,
        });
        self
    }

    /// Look up a declared column
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check that every required column is present, without converting anything
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for spec in self.columns.iter().filter(|c| c.required) {
            if schema.index_of(&spec.name).is_err() {
                return Err(SurveyError::missing_column(&self.table, &spec.name));
            }
        }
        Ok(())
    }

    /// Validate a batch and cast its declared columns to canonical types
    ///
    /// Undeclared columns pass through unchanged. Optional columns that are
    /// absent are appended as all-null columns.
    pub fn coerce(&self, batch: &RecordBatch, missing_values: &MissingValues) -> Result<LoadedTable> {
        self.validate(&batch.schema())?;

        let schema = batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
        let mut missing = Vec::with_capacity(self.columns.len());

        for spec in &self.columns {
            let target = spec.semantic_type.data_type();
            match schema.index_of(&spec.name) {
                Ok(idx) => {
                    let (array, counts) = coerce_column(
                        &self.table,
                        spec,
                        batch.column(idx),
                        &target,
                        missing_values,
                    )?;
                    fields[idx] = Field::new(&spec.name, target, true);
                    columns[idx] = array;
                    missing.push(counts);
                }
                Err(_) => {
                    warn!(
                        "Optional column '{}' not found in {} table, filling with nulls",
                        spec.name, self.table
                    );
                    fields.push(Field::new(&spec.name, target.clone(), true));
                    columns.push(new_null_array(&target, batch.num_rows()));
                    missing.push(ColumnMissing {
                        table: self.table.clone(),
                        column: spec.name.clone(),
                        system_missing: batch.num_rows(),
                        user_missing: 0,
                        unrecognised: 0,
                    });
                }
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(LoadedTable { batch, missing })
    }
}

fn coerce_column(
    table: &str,
    spec: &ColumnSpec,
    source: &ArrayRef,
    target: &DataType,
    missing_values: &MissingValues,
) -> Result<(ArrayRef, ColumnMissing)> {
    let type_error = || SurveyError::ColumnType {
        column: spec.name.clone(),
        expected: target.to_string(),
        found: source.data_type().to_string(),
    };

    let mut counts = ColumnMissing {
        table: table.to_string(),
        column: spec.name.clone(),
        system_missing: source.null_count(),
        user_missing: 0,
        unrecognised: 0,
    };

    let array: ArrayRef = match spec.semantic_type {
        SemanticType::Integer | SemanticType::Real | SemanticType::NullableReal => {
            if !can_cast_types(source.data_type(), &DataType::Float64) {
                return Err(type_error());
            }
            let as_float = cast(source, &DataType::Float64)?;
            let as_float = as_float.as_primitive::<arrow::datatypes::Float64Type>();
            let whole_numbers = spec.semantic_type == SemanticType::Integer;
            let cleaned: Float64Array = as_float
                .iter()
                .map(|v| match classify_missing(v, &missing_values.user_missing_codes) {
                    Some(MissingKind::User) => {
                        counts.user_missing += 1;
                        None
                    }
                    Some(MissingKind::System) => None,
                    // Codes and counts are never fractional; casting would truncate
                    None if whole_numbers => v.filter(|x| x.is_finite() && x.fract() == 0.0),
                    None => v,
                })
                .collect();
            // Unparseable text cells and fractional integers become nulls here
            counts.unrecognised = cleaned
                .null_count()
                .saturating_sub(counts.system_missing + counts.user_missing);
            cast(&cleaned, target)?
        }
        SemanticType::Text => {
            if !can_cast_types(source.data_type(), target) {
                return Err(type_error());
            }
            cast(source, target)?
        }
        SemanticType::Categorical(labels) => {
            if !can_cast_types(source.data_type(), &DataType::Utf8) {
                return Err(type_error());
            }
            let text = cast(source, &DataType::Utf8)?;
            let text = text.as_string::<i32>();
            let keys: arrow::array::Int8Array = text
                .iter()
                .map(|v| {
                    v.and_then(|label| {
                        let ordinal = labels.iter().position(|l| *l == label.trim());
                        if ordinal.is_none() {
                            counts.unrecognised += 1;
                        }
                        ordinal.map(|o| o as i8)
                    })
                })
                .collect();
            let dictionary: ArrayRef = Arc::new(arrow::array::StringArray::from(labels.to_vec()));
            Arc::new(arrow::array::DictionaryArray::<arrow::datatypes::Int8Type>::try_new(
                keys, dictionary,
            )?)
        }
    };

    if counts.user_missing > 0 || counts.unrecognised > 0 {
        debug!(
            "Column '{}' in {} table: {} system-missing, {} user-missing, {} unrecognised",
            counts.column, table, counts.system_missing, counts.user_missing, counts.unrecognised
        );
    }

    Ok((array, counts))
}
