//! CSV export of summary tables

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::csv::WriterBuilder;

use crate::algorithm::summary::SummaryTable;
use crate::error::Result;
use crate::present::{ChartSpec, Presenter};
use crate::utils::logging::log_operation_complete;

/// Writes each summary to `<output_dir>/<summary name>.csv`
#[derive(Debug, Clone)]
pub struct CsvPresenter {
    output_dir: PathBuf,
}

impl CsvPresenter {
    /// Create a presenter writing into a directory, created on first use
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Target directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File a summary is written to
    #[must_use]
    pub fn path_for(&self, summary: &SummaryTable) -> PathBuf {
        self.output_dir.join(format!("{}.csv", summary.name))
    }
}

impl Presenter for CsvPresenter {
    fn present(&self, summary: &SummaryTable, _chart: &ChartSpec) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(summary);

        let file = File::create(&path)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(&summary.batch)?;

        log_operation_complete(
            "wrote",
            &path.display().to_string(),
            summary.num_rows(),
            None,
        );
        Ok(())
    }
}
