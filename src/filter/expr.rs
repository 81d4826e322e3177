//! Expression-based row predicates
//!
//! This module provides a small expression language evaluated against Arrow
//! record batches. Expressions select the rows an aggregation looks at and
//! the rows a count metric counts. They deserialize from JSON so that
//! aggregations can be declared in the pipeline configuration.

use std::cmp::Ordering;
use std::collections::HashSet;

use arrow::array::{Array, BooleanArray};
use arrow::compute::{and, not, or};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::utils::arrow::{float_column, get_column, text_column};

/// Table name used in errors raised while evaluating predicates
const PREDICATE_TABLE: &str = "joined";

/// Represents a predicate over the columns of a record batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Column equals a literal value
    Eq(String, LiteralValue),

    /// Column not equals a literal value
    NotEq(String, LiteralValue),

    /// Column is greater than a literal value
    Gt(String, LiteralValue),

    /// Column is greater than or equal to a literal value
    GtEq(String, LiteralValue),

    /// Column is less than a literal value
    Lt(String, LiteralValue),

    /// Column is less than or equal to a literal value
    LtEq(String, LiteralValue),

    /// Column is in a set of values
    In(String, Vec<LiteralValue>),

    /// Column is null
    IsNull(String),

    /// Column is not null
    IsNotNull(String),

    /// Logical AND of expressions
    And(Vec<Expr>),

    /// Logical OR of expressions
    Or(Vec<Expr>),

    /// Logical NOT of an expression
    Not(Box<Expr>),

    /// Always evaluates to true
    AlwaysTrue,
}

/// Represents a literal value that can be used in expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// Boolean value
    Boolean(bool),

    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// String value
    String(String),

    /// Null value
    Null,
}

impl Expr {
    /// Returns a set of all column names required by this expression
    #[must_use]
    pub fn required_columns(&self) -> HashSet<String> {
        let mut columns = HashSet::new();
        self.collect_required_columns(&mut columns);
        columns
    }

    /// Helper method to collect column names
    fn collect_required_columns(&self, columns: &mut HashSet<String>) {
        match self {
            Self::Eq(col, _)
            | Self::NotEq(col, _)
            | Self::Gt(col, _)
            | Self::GtEq(col, _)
            | Self::Lt(col, _)
            | Self::LtEq(col, _)
            | Self::In(col, _)
            | Self::IsNull(col)
            | Self::IsNotNull(col) => {
                columns.insert(col.clone());
            }
            Self::And(exprs) | Self::Or(exprs) => {
                for expr in exprs {
                    expr.collect_required_columns(columns);
                }
            }
            Self::Not(expr) => {
                expr.collect_required_columns(columns);
            }
            Self::AlwaysTrue => {}
        }
    }

    /// Evaluate the expression against a record batch
    ///
    /// The result has no nulls: a comparison against a null cell is false.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        match self {
            Self::AlwaysTrue => Ok(BooleanArray::from(vec![true; batch.num_rows()])),

            Self::Eq(col, value) => compare(batch, col, value, Ordering::is_eq),
            Self::NotEq(col, value) => compare(batch, col, value, Ordering::is_ne),
            Self::Gt(col, value) => compare(batch, col, value, Ordering::is_gt),
            Self::GtEq(col, value) => compare(batch, col, value, Ordering::is_ge),
            Self::Lt(col, value) => compare(batch, col, value, Ordering::is_lt),
            Self::LtEq(col, value) => compare(batch, col, value, Ordering::is_le),

            Self::In(col, values) => {
                let mut result = BooleanArray::from(vec![false; batch.num_rows()]);
                for value in values {
                    let matches = compare(batch, col, value, Ordering::is_eq)?;
                    result = or(&result, &matches)?;
                }
                Ok(result)
            }

            Self::IsNull(col) => {
                let array = get_column(batch, PREDICATE_TABLE, col)?;
                Ok((0..array.len()).map(|i| Some(array.is_null(i))).collect())
            }

            Self::IsNotNull(col) => {
                let array = get_column(batch, PREDICATE_TABLE, col)?;
                Ok((0..array.len()).map(|i| Some(array.is_valid(i))).collect())
            }

            Self::And(exprs) => {
                let mut result = BooleanArray::from(vec![true; batch.num_rows()]);
                for expr in exprs {
                    result = and(&result, &expr.evaluate(batch)?)?;
                }
                Ok(result)
            }

            Self::Or(exprs) => {
                let mut result = BooleanArray::from(vec![false; batch.num_rows()]);
                for expr in exprs {
                    result = or(&result, &expr.evaluate(batch)?)?;
                }
                Ok(result)
            }

            Self::Not(expr) => Ok(not(&expr.evaluate(batch)?)?),
        }
    }
}

/// Compare every cell of a column with a literal; null cells never match
fn compare(
    batch: &RecordBatch,
    column: &str,
    value: &LiteralValue,
    accept: fn(Ordering) -> bool,
) -> Result<BooleanArray> {
    let result = match value {
        LiteralValue::Null => {
            // Comparisons with null are never true
            get_column(batch, PREDICATE_TABLE, column)?;
            BooleanArray::from(vec![false; batch.num_rows()])
        }
        LiteralValue::String(expected) => {
            let text = text_column(batch, PREDICATE_TABLE, column)?;
            text.iter()
                .map(|v| Some(v.is_some_and(|v| accept(v.cmp(expected.as_str())))))
                .collect()
        }
        LiteralValue::Boolean(expected) => {
            let text = text_column(batch, PREDICATE_TABLE, column)?;
            text.iter()
                .map(|v| {
                    Some(
                        v.and_then(|v| v.parse::<bool>().ok())
                            .is_some_and(|v| accept(v.cmp(expected))),
                    )
                })
                .collect()
        }
        LiteralValue::Int(expected) => numeric_compare(batch, column, *expected as f64, accept)?,
        LiteralValue::Float(expected) => numeric_compare(batch, column, *expected, accept)?,
    };
    Ok(result)
}

fn numeric_compare(
    batch: &RecordBatch,
    column: &str,
    expected: f64,
    accept: fn(Ordering) -> bool,
) -> Result<BooleanArray> {
    let values = float_column(batch, PREDICATE_TABLE, column)?;
    Ok(values
        .iter()
        .map(|v| {
            Some(
                v.and_then(|v| v.partial_cmp(&expected))
                    .is_some_and(accept),
            )
        })
        .collect())
}

/// A filter that keeps the rows an expression accepts
#[derive(Debug, Clone)]
pub struct ExpressionFilter {
    /// The expression to evaluate
    expr: Expr,
}

impl ExpressionFilter {
    /// Create a new expression filter
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

impl BatchFilter for ExpressionFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mask = self.expr.evaluate(batch)?;
        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        self.expr.required_columns()
    }
}
