//! Grouped summary statistics
//!
//! An [`Aggregation`] groups the rows of a table by one or more categorical
//! (or integer/text) columns and evaluates a list of named [`Metric`]s for
//! each group present in the data. Metrics are evaluated in declaration order
//! and may refer to earlier metrics by name.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::algorithm::summary::{GroupLevels, SummaryTable, TOTAL_LABEL};
use crate::error::{Result, SurveyError};
use crate::filter::{BatchFilter, Expr, ExpressionFilter};
use crate::models::categories::CategoricalColumn;
use crate::utils::arrow::{float_column, get_column};

/// Default number of decimals for percentages
pub const DEFAULT_PERCENT_PRECISION: u32 = 1;

/// Largest supported number of decimals for percentages
pub const MAX_PERCENT_PRECISION: u32 = 6;

/// Text shown for an undefined ratio
pub const UNDEFINED_LABEL: &str = "NA";

fn default_precision() -> u32 {
    DEFAULT_PERCENT_PRECISION
}

/// A named value computed for every group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    /// Rows where `column` (if given) is present and `predicate` (if given) holds
    Count {
        /// Output column
        name: String,
        /// Only rows with a non-null value here are counted
        #[serde(default)]
        column: Option<String>,
        /// Only rows satisfying this predicate are counted
        #[serde(default)]
        predicate: Option<Expr>,
    },
    /// Sum of the non-null values of a numeric column
    Sum {
        /// Output column
        name: String,
        /// Numeric input column
        column: String,
    },
    /// One earlier metric divided by another
    Ratio {
        /// Output column
        name: String,
        /// Metric used as numerator
        numerator: String,
        /// Metric used as denominator
        denominator: String,
    },
    /// An earlier count or sum divided by its total over all groups
    Share {
        /// Output column
        name: String,
        /// Count or sum metric to take the share of
        metric: String,
    },
    /// An earlier ratio or share rendered as a percentage string
    Percent {
        /// Output column
        name: String,
        /// Ratio or share metric to format
        ratio: String,
        /// Decimals kept after rounding half away from zero
        #[serde(default = "default_precision")]
        precision: u32,
    },
}

impl Metric {
    /// Count every row
    #[must_use]
    pub fn count(name: impl Into<String>) -> Self {
        Self::Count {
            name: name.into(),
            column: None,
            predicate: None,
        }
    }

    /// Count rows where a column is not null
    #[must_use]
    pub fn count_present(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Count {
            name: name.into(),
            column: Some(column.into()),
            predicate: None,
        }
    }

    /// Count rows satisfying a predicate
    #[must_use]
    pub fn count_where(name: impl Into<String>, predicate: Expr) -> Self {
        Self::Count {
            name: name.into(),
            column: None,
            predicate: Some(predicate),
        }
    }

    /// Sum a numeric column, ignoring nulls
    #[must_use]
    pub fn sum(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Sum {
            name: name.into(),
            column: column.into(),
        }
    }

    /// Divide two earlier metrics
    #[must_use]
    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self::Ratio {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    /// Share of an earlier count or sum in its total
    #[must_use]
    pub fn share(name: impl Into<String>, metric: impl Into<String>) -> Self {
        Self::Share {
            name: name.into(),
            metric: metric.into(),
        }
    }

    /// Format an earlier ratio as a percentage
    #[must_use]
    pub fn percent(name: impl Into<String>, ratio: impl Into<String>, precision: u32) -> Self {
        Self::Percent {
            name: name.into(),
            ratio: ratio.into(),
            precision,
        }
    }

    /// Output column name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Count { name, .. }
            | Self::Sum { name, .. }
            | Self::Ratio { name, .. }
            | Self::Share { name, .. }
            | Self::Percent { name, .. } => name,
        }
    }
}

/// A grouped summary over one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Name of the resulting summary table
    pub name: String,
    /// Rows considered at all; others are dropped before grouping
    #[serde(default)]
    pub filter: Option<Expr>,
    /// Grouping columns; empty means a single group of all rows
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Metrics in evaluation order
    pub metrics: Vec<Metric>,
    /// Append a totals row
    #[serde(default)]
    pub totals: bool,
}

impl Aggregation {
    /// Start an aggregation with no groups and no metrics
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
            group_by: Vec::new(),
            metrics: Vec::new(),
            totals: false,
        }
    }

    /// Restrict the rows considered
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    /// Add a grouping column
    #[must_use]
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    /// Add a metric
    #[must_use]
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Append a totals row
    #[must_use]
    pub fn with_totals(mut self) -> Self {
        self.totals = true;
        self
    }

    /// Check metric names and references before touching any data
    pub fn validate(&self) -> Result<()> {
        fn lookup<'m>(
            seen: &BTreeMap<&str, &'m Metric>,
            table: &str,
            owner: &str,
            reference: &str,
        ) -> Result<&'m Metric> {
            seen.get(reference).copied().ok_or_else(|| {
                SurveyError::config(format!(
                    "Metric '{owner}' in '{table}' refers to unknown metric '{reference}'"
                ))
            })
        }

        let mut seen: BTreeMap<&str, &Metric> = BTreeMap::new();

        for metric in &self.metrics {
            if self.group_by.iter().any(|g| g == metric.name()) {
                return Err(SurveyError::config(format!(
                    "Metric '{}' in '{}' has the same name as a grouping column",
                    metric.name(),
                    self.name
                )));
            }
            match metric {
                Metric::Count { .. } | Metric::Sum { .. } => {}
                Metric::Ratio {
                    name,
                    numerator,
                    denominator,
                } => {
                    for reference in [numerator, denominator] {
                        if matches!(lookup(&seen, &self.name, name, reference)?, Metric::Percent { .. }) {
                            return Err(SurveyError::config(format!(
                                "Ratio '{name}' cannot divide the percentage '{reference}'"
                            )));
                        }
                    }
                }
                Metric::Share { name, metric } => {
                    if !matches!(lookup(&seen, &self.name, name, metric)?, Metric::Count { .. } | Metric::Sum { .. }) {
                        return Err(SurveyError::config(format!(
                            "Share '{name}' needs a count or sum, '{metric}' is neither"
                        )));
                    }
                }
                Metric::Percent { name, ratio, .. } => {
                    if !matches!(lookup(&seen, &self.name, name, ratio)?, Metric::Ratio { .. } | Metric::Share { .. }) {
                        return Err(SurveyError::config(format!(
                            "Percent '{name}' needs a ratio or share, '{ratio}' is neither"
                        )));
                    }
                }
            }
            if seen.insert(metric.name(), metric).is_some() {
                return Err(SurveyError::config(format!(
                    "Metric '{}' is defined twice in '{}'",
                    metric.name(),
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Columns of the input table this aggregation reads
    #[must_use]
    pub fn required_columns(&self) -> HashSet<String> {
        let mut columns: HashSet<String> = self.group_by.iter().cloned().collect();
        if let Some(filter) = &self.filter {
            columns.extend(filter.required_columns());
        }
        for metric in &self.metrics {
            match metric {
                Metric::Count { column, predicate, .. } => {
                    columns.extend(column.iter().cloned());
                    if let Some(predicate) = predicate {
                        columns.extend(predicate.required_columns());
                    }
                }
                Metric::Sum { column, .. } => {
                    columns.insert(column.clone());
                }
                _ => {}
            }
        }
        columns
    }
}

/// Format a ratio as a percentage with a literal `%` suffix
///
/// The shortest decimal text of the ratio is shifted to an integer number of
/// `10^-precision` percent and rounded half away from zero on its digits, so
/// a ratio such as 0.145 reads as the tie it is written as. An undefined
/// ratio renders as `NA`.
#[must_use]
pub fn format_percent(ratio: Option<f64>, precision: u32) -> String {
    let Some(ratio) = ratio.filter(|r| r.is_finite()) else {
        return UNDEFINED_LABEL.to_string();
    };
    let precision = precision.min(MAX_PERCENT_PRECISION);

    let text = format!("{:e}", ratio.abs());
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return UNDEFINED_LABEL.to_string();
    };
    let Ok(exponent) = exponent.parse::<i64>() else {
        return UNDEFINED_LABEL.to_string();
    };
    let digits: Vec<u8> = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();

    // ratio = digits * 10^(exponent - len + 1); percent units add 2 + precision
    let shift = exponent - digits.len() as i64 + 1 + 2 + i64::from(precision);
    let magnitude = if shift >= 0 {
        digits
            .iter()
            .chain(std::iter::repeat_n(&0, shift as usize))
            .try_fold(0_u128, |acc, &d| acc.checked_mul(10)?.checked_add(u128::from(d)))
    } else {
        let kept = digits.len() as i64 + shift;
        let whole = digits
            .iter()
            .take(kept.max(0) as usize)
            .try_fold(0_u128, |acc, &d| acc.checked_mul(10)?.checked_add(u128::from(d)));
        let first_dropped = usize::try_from(kept).ok().and_then(|k| digits.get(k)).copied().unwrap_or(0);
        whole.map(|w| if first_dropped >= 5 { w + 1 } else { w })
    };

    match magnitude {
        Some(magnitude) => render_percent(ratio < 0.0, magnitude, precision),
        None => UNDEFINED_LABEL.to_string(),
    }
}

/// Format `numerator / denominator` as a percentage
///
/// Whole-number operands (counts, sums of counts) are rounded exactly in
/// integer arithmetic; anything else goes through [`format_percent`]. A zero
/// or missing denominator renders as `NA`.
#[must_use]
pub fn format_quotient_percent(numerator: f64, denominator: f64, precision: u32) -> String {
    let precision = precision.min(MAX_PERCENT_PRECISION);
    match (exact_integer(numerator), exact_integer(denominator)) {
        (Some(_), Some(0)) => UNDEFINED_LABEL.to_string(),
        (Some(n), Some(d)) => {
            let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
            let scaled = n.unsigned_abs() * 100 * 10_u128.pow(precision);
            let d = d.unsigned_abs();
            render_percent(n < 0, (2 * scaled + d) / (2 * d), precision)
        }
        _ => format_percent(safe_ratio(Some(numerator), Some(denominator)), precision),
    }
}

/// Whole-number value of a float that is represented exactly
fn exact_integer(value: f64) -> Option<i128> {
    const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;
    (value.fract() == 0.0 && value.abs() <= EXACT_LIMIT).then_some(value as i128)
}

/// Text of a percentage held as an integer number of `10^-precision` percent
fn render_percent(negative: bool, magnitude: u128, precision: u32) -> String {
    let sign = if negative && magnitude > 0 { "-" } else { "" };
    if precision == 0 {
        return format!("{sign}{magnitude}%");
    }
    let scale = 10_u128.pow(precision);
    let width = precision as usize;
    format!("{sign}{}.{:0width$}%", magnitude / scale, magnitude % scale)
}

/// Divide two optional values; a zero denominator gives `None`
#[must_use]
pub fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Sortable value of a grouping cell
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Ordinal(usize),
    Int(i64),
    Text(String),
}

/// A grouping column decoded for key extraction
enum KeyColumn {
    Categorical(CategoricalColumn),
    Integer(Int64Array),
    Text(StringArray),
}

impl KeyColumn {
    fn from_array(column: &str, array: &ArrayRef) -> Result<Self> {
        match array.data_type() {
            DataType::Dictionary(_, _) => Ok(Self::Categorical(CategoricalColumn::from_array(
                column,
                array.as_ref(),
            )?)),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => {
                let values = cast(array, &DataType::Int64)?;
                Ok(Self::Integer(values.as_primitive::<Int64Type>().clone()))
            }
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean => {
                let values = cast(array, &DataType::Utf8)?;
                Ok(Self::Text(values.as_string::<i32>().clone()))
            }
            other => Err(SurveyError::ColumnType {
                column: column.to_string(),
                expected: "categorical, integer or text grouping column".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn key(&self, row: usize) -> Option<GroupKey> {
        match self {
            Self::Categorical(c) => c.ordinals[row].map(GroupKey::Ordinal),
            Self::Integer(a) => a.is_valid(row).then(|| GroupKey::Int(a.value(row))),
            Self::Text(a) => a.is_valid(row).then(|| GroupKey::Text(a.value(row).to_string())),
        }
    }

    fn label(&self, key: &GroupKey) -> String {
        match (self, key) {
            (Self::Categorical(c), GroupKey::Ordinal(o)) => c.levels[*o].clone(),
            (_, GroupKey::Int(v)) => v.to_string(),
            (_, GroupKey::Text(t)) => t.clone(),
            (_, GroupKey::Ordinal(o)) => o.to_string(),
        }
    }

    fn levels(&self) -> Option<&[String]> {
        match self {
            Self::Categorical(c) => Some(&c.levels),
            _ => None,
        }
    }
}

/// Operands of a defined ratio, kept so percentages round from them
#[derive(Debug, Clone, Copy)]
struct Quotient {
    numerator: f64,
    denominator: f64,
}

impl Quotient {
    fn of(numerator: Option<f64>, denominator: Option<f64>) -> Option<Self> {
        match (numerator, denominator) {
            (Some(numerator), Some(denominator)) if denominator != 0.0 => Some(Self {
                numerator,
                denominator,
            }),
            _ => None,
        }
    }

    fn value(self) -> f64 {
        self.numerator / self.denominator
    }
}

/// Evaluated values of one metric, one entry per output row
#[derive(Debug, Clone)]
enum MetricValues {
    Count(Vec<i64>),
    Sum(Vec<f64>),
    Ratio(Vec<Option<Quotient>>),
    Percent(Vec<Option<String>>),
}

impl MetricValues {
    fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            Self::Count(v) => Some(v[row] as f64),
            Self::Sum(v) => Some(v[row]),
            Self::Ratio(v) => v[row].map(Quotient::value),
            Self::Percent(_) => None,
        }
    }

    fn percent(&self, row: usize, precision: u32) -> String {
        match self {
            Self::Ratio(v) => match v[row] {
                Some(q) => format_quotient_percent(q.numerator, q.denominator, precision),
                None => UNDEFINED_LABEL.to_string(),
            },
            other => format_percent(other.as_f64(row), precision),
        }
    }

    fn into_array(self) -> (DataType, ArrayRef) {
        match self {
            Self::Count(v) => (DataType::Int64, Arc::new(Int64Array::from(v)) as ArrayRef),
            Self::Sum(v) => (DataType::Float64, Arc::new(Float64Array::from(v)) as ArrayRef),
            Self::Ratio(v) => {
                let values: Float64Array = v.into_iter().map(|q| q.map(Quotient::value)).collect();
                (DataType::Float64, Arc::new(values) as ArrayRef)
            }
            Self::Percent(v) => (DataType::Utf8, Arc::new(StringArray::from(v)) as ArrayRef),
        }
    }
}

/// Run an aggregation over a table
///
/// Produces one row per combination of grouping values present in the data,
/// ordered by the declared category order (integers numerically, text
/// lexically), followed by a totals row when requested. Rows with a missing
/// grouping value are excluded and counted.
pub fn aggregate(batch: &RecordBatch, aggregation: &Aggregation) -> Result<SummaryTable> {
    aggregation.validate()?;
    let table = aggregation.name.as_str();

    for column in aggregation.required_columns() {
        get_column(batch, table, &column)?;
    }

    let filtered;
    let batch = match &aggregation.filter {
        Some(expr) => {
            filtered = ExpressionFilter::new(expr.clone()).filter(batch)?;
            &filtered
        }
        None => batch,
    };

    let key_columns: Vec<KeyColumn> = aggregation
        .group_by
        .iter()
        .map(|name| KeyColumn::from_array(name, get_column(batch, table, name)?))
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<Vec<GroupKey>, Vec<usize>> = BTreeMap::new();
    let mut excluded_rows = 0;
    for row in 0..batch.num_rows() {
        let key: Option<Vec<GroupKey>> = key_columns.iter().map(|c| c.key(row)).collect();
        match key {
            Some(key) => groups.entry(key).or_default().push(row),
            None => excluded_rows += 1,
        }
    }
    if key_columns.is_empty() && groups.is_empty() {
        // A table without grouping columns always has its single overall row
        groups.insert(Vec::new(), Vec::new());
    }

    let group_count = groups.len();
    let mut row_sets: Vec<Vec<usize>> = groups.values().cloned().collect();
    if aggregation.totals {
        row_sets.push(groups.values().flatten().copied().sorted().collect());
    }

    let metric_values = evaluate_metrics(batch, table, &aggregation.metrics, &row_sets, group_count)?;

    let mut fields = Vec::with_capacity(key_columns.len() + metric_values.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());
    for (idx, (name, key_column)) in aggregation.group_by.iter().zip(&key_columns).enumerate() {
        let mut labels: Vec<String> = groups
            .keys()
            .map(|key| key_column.label(&key[idx]))
            .collect();
        if aggregation.totals {
            labels.push(TOTAL_LABEL.to_string());
        }
        fields.push(Field::new(name, DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from(labels)));
    }
    for (metric, values) in aggregation.metrics.iter().zip(metric_values) {
        let (data_type, array) = values.into_array();
        fields.push(Field::new(metric.name(), data_type, true));
        columns.push(array);
    }

    let summary_batch = if columns.is_empty() {
        RecordBatch::new_empty(Arc::new(Schema::empty()))
    } else {
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?
    };

    let levels = aggregation
        .group_by
        .iter()
        .zip(&key_columns)
        .filter_map(|(column, key_column)| {
            key_column.levels().map(|labels| GroupLevels {
                column: column.clone(),
                labels: labels.to_vec(),
            })
        })
        .collect();

    if excluded_rows > 0 {
        log::debug!(
            "{excluded_rows} rows excluded from '{table}' because a grouping value is missing"
        );
    }

    Ok(SummaryTable {
        name: aggregation.name.clone(),
        batch: summary_batch,
        group_columns: aggregation.group_by.clone(),
        levels,
        excluded_rows,
    })
}

fn find_metric(evaluated: &[(&str, MetricValues)], name: &str) -> Result<MetricValues> {
    evaluated
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| SurveyError::config(format!("Unknown metric '{name}'")))
}

/// Evaluate every metric over every row set
///
/// The first `group_count` row sets are the groups; any further row set is the
/// totals row, which shares use as its own base.
fn evaluate_metrics(
    batch: &RecordBatch,
    table: &str,
    metrics: &[Metric],
    row_sets: &[Vec<usize>],
    group_count: usize,
) -> Result<Vec<MetricValues>> {
    let mut evaluated: Vec<(&str, MetricValues)> = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let values = match metric {
            Metric::Count { column, predicate, .. } => {
                let mut mask = vec![true; batch.num_rows()];
                if let Some(column) = column {
                    let array = get_column(batch, table, column)?;
                    for (row, keep) in mask.iter_mut().enumerate() {
                        *keep &= array.is_valid(row);
                    }
                }
                if let Some(predicate) = predicate {
                    let accepted = predicate.evaluate(batch)?;
                    for (row, keep) in mask.iter_mut().enumerate() {
                        *keep &= accepted.is_valid(row) && accepted.value(row);
                    }
                }
                MetricValues::Count(
                    row_sets
                        .iter()
                        .map(|rows| rows.iter().filter(|&&r| mask[r]).count() as i64)
                        .collect(),
                )
            }
            Metric::Sum { column, .. } => {
                let values = float_column(batch, table, column)?;
                MetricValues::Sum(
                    row_sets
                        .iter()
                        .map(|rows| {
                            rows.iter()
                                .filter(|&&r| values.is_valid(r))
                                .map(|&r| values.value(r))
                                .sum::<f64>()
                        })
                        .collect(),
                )
            }
            Metric::Ratio {
                numerator,
                denominator,
                ..
            } => {
                let numerator = find_metric(&evaluated, numerator)?;
                let denominator = find_metric(&evaluated, denominator)?;
                MetricValues::Ratio(
                    (0..row_sets.len())
                        .map(|row| Quotient::of(numerator.as_f64(row), denominator.as_f64(row)))
                        .collect(),
                )
            }
            Metric::Share { metric, .. } => {
                let base = find_metric(&evaluated, metric)?;
                let total: f64 = (0..group_count).filter_map(|row| base.as_f64(row)).sum();
                MetricValues::Ratio(
                    (0..row_sets.len())
                        .map(|row| Quotient::of(base.as_f64(row), Some(total)))
                        .collect(),
                )
            }
            Metric::Percent {
                ratio, precision, ..
            } => {
                let ratio = find_metric(&evaluated, ratio)?;
                MetricValues::Percent(
                    (0..row_sets.len())
                        .map(|row| Some(ratio.percent(row, *precision)))
                        .collect(),
                )
            }
        };
        evaluated.push((metric.name(), values));
    }

    Ok(evaluated.into_iter().map(|(_, values)| values).collect())
}
