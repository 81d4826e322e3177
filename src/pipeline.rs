//! End-to-end survey pipeline
//!
//! Loads both exports, joins them, derives categorical columns and computes
//! the standard summary tables plus any configured aggregations. Every stage
//! returns a new table; an error at any stage aborts the whole run.

use std::time::Instant;

use arrow::record_batch::RecordBatch;

use crate::algorithm::aggregate::{Aggregation, Metric, aggregate};
use crate::algorithm::derive::Deriver;
use crate::algorithm::join::left_join;
use crate::algorithm::pyramid::population_pyramid;
use crate::algorithm::summary::SummaryTable;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::filter::{Expr, LiteralValue};
use crate::loader::Loader;
use crate::present::{ChartSpec, Presenter};
use crate::report::DataQualityReport;
use crate::schema::LoadedTable;
use crate::schema::survey::{HOUSEHOLD_TABLE, household_schema, individual_schema};

/// Name of the joined table in errors and logs
pub const JOINED_TABLE: &str = "joined";

/// Everything a pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Household table with derived columns
    pub households: RecordBatch,
    /// Individuals with household columns and derived columns
    pub joined: RecordBatch,
    /// Standard summaries followed by configured aggregations
    pub summaries: Vec<SummaryTable>,
    /// Data-quality findings
    pub report: DataQualityReport,
}

impl PipelineOutput {
    /// Look up a summary by name
    #[must_use]
    pub fn summary(&self, name: &str) -> Option<&SummaryTable> {
        self.summaries.iter().find(|s| s.name == name)
    }

    /// Hand every summary to a presenter with its chart settings
    pub fn present(&self, presenter: &dyn Presenter, config: &PipelineConfig) -> Result<()> {
        for summary in &self.summaries {
            presenter.present(summary, &ChartSpec::for_summary(&summary.name, &config.columns))?;
        }
        Ok(())
    }
}

/// Runs the survey stages in order for one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load both files named in the configuration and process them
    pub fn run(&self) -> Result<PipelineOutput> {
        self.validate_aggregations()?;
        let loader = Loader::new(&self.config);
        let households = loader.load_households()?;
        let individuals = loader.load_individuals()?;
        self.process(households, individuals)
    }

    /// Process tables already in memory
    ///
    /// The tables are checked and coerced against their declared schemas
    /// exactly as loaded files are.
    pub fn run_tables(&self, households: &RecordBatch, individuals: &RecordBatch) -> Result<PipelineOutput> {
        self.validate_aggregations()?;
        let columns = &self.config.columns;
        let missing = &self.config.missing_values;
        let households = household_schema(columns).coerce(households, missing)?;
        let individuals = individual_schema(columns).coerce(individuals, missing)?;
        self.process(households, individuals)
    }

    fn validate_aggregations(&self) -> Result<()> {
        self.config.aggregations.iter().try_for_each(Aggregation::validate)
    }

    fn process(&self, households: LoadedTable, individuals: LoadedTable) -> Result<PipelineOutput> {
        let start = Instant::now();
        let columns = &self.config.columns;
        let mut report = DataQualityReport::default();
        report.missing.extend(households.missing);
        report.missing.extend(individuals.missing);

        let joined = left_join(
            &individuals.batch,
            &households.batch,
            &columns.join_key,
            self.config.duplicate_keys,
        )?;
        report.duplicate_household_keys = joined.duplicate_keys;
        report.unmatched_individuals = joined.unmatched;

        let households = Deriver::for_households(HOUSEHOLD_TABLE, columns).apply(&households.batch)?;
        let joined = Deriver::for_joined(JOINED_TABLE, columns).apply(&joined.batch)?;
        report.derivations.extend(households.reports);
        report.derivations.extend(joined.reports);

        let mut summaries = vec![
            aggregate(&households.batch, &self.household_size())?,
            aggregate(&households.batch, &self.household_composition())?,
            population_pyramid(
                &joined.batch,
                &columns.sex_label,
                &columns.age_group,
                self.config.pyramid_negated_sex,
            )?,
            aggregate(&joined.batch, &self.children_by_age())?,
            aggregate(&joined.batch, &self.wasting())?,
            aggregate(&joined.batch, &self.response())?,
        ];
        for aggregation in &self.config.aggregations {
            summaries.push(aggregate(&joined.batch, aggregation)?);
        }

        for summary in &summaries {
            report.record_excluded(&summary.name, summary.excluded_rows);
        }
        report.log_summary();

        log::info!(
            "Produced {} summaries from {} households and {} individuals in {:?}",
            summaries.len(),
            households.batch.num_rows(),
            joined.batch.num_rows(),
            start.elapsed()
        );

        Ok(PipelineOutput {
            households: households.batch,
            joined: joined.batch,
            summaries,
            report,
        })
    }

    /// Individuals young enough to count as children
    fn children(&self) -> Expr {
        let months = &self.config.columns.age_months;
        Expr::And(vec![
            Expr::GtEq(months.clone(), LiteralValue::Float(0.0)),
            Expr::Lt(
                months.clone(),
                LiteralValue::Float(self.config.child_age_ceiling_months),
            ),
        ])
    }

    fn household_size(&self) -> Aggregation {
        Aggregation::new("household_size")
            .group_by(&self.config.columns.size_category)
            .metric(Metric::count("households"))
            .metric(Metric::share("share", "households"))
            .metric(Metric::percent("percent", "share", self.config.percent_precision))
            .with_totals()
    }

    fn household_composition(&self) -> Aggregation {
        let columns = &self.config.columns;
        let aggregation = Aggregation::new("household_composition")
            .metric(Metric::count("households"))
            .metric(Metric::sum("members", &columns.household_size));

        columns
            .household_counts
            .iter()
            .fold(aggregation, |aggregation, column| {
                aggregation.metric(Metric::sum(column, column))
            })
            .metric(Metric::ratio("mean_size", "members", "households"))
    }

    fn children_by_age(&self) -> Aggregation {
        let columns = &self.config.columns;
        Aggregation::new("children_by_age")
            .filter(self.children())
            .group_by(&columns.child_age_group)
            .group_by(&columns.sex_label)
            .metric(Metric::count("children"))
    }

    fn wasting(&self) -> Aggregation {
        Aggregation::new("wasting")
            .filter(self.children())
            .group_by(&self.config.columns.wasting)
            .metric(Metric::count("children"))
            .metric(Metric::share("share", "children"))
            .metric(Metric::percent("percent", "share", self.config.percent_precision))
            .with_totals()
    }

    fn response(&self) -> Aggregation {
        Aggregation::new("response")
            .metric(Metric::count("individuals"))
            .metric(Metric::count_where(
                "responded",
                Expr::Eq(self.config.columns.consent.clone(), self.config.consent_value.clone()),
            ))
            .metric(Metric::ratio("response_rate", "responded", "individuals"))
            .metric(Metric::percent(
                "response_percent",
                "response_rate",
                self.config.percent_precision,
            ))
    }
}
