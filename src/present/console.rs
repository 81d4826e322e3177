//! Console output of summary tables

use arrow::util::pretty::pretty_format_batches;

use crate::algorithm::pyramid::pyramid_magnitude;
use crate::algorithm::summary::SummaryTable;
use crate::error::Result;
use crate::present::{ChartSpec, Presenter};

/// Prints each summary as a titled text table on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    /// Text printed for one summary
    ///
    /// A mirrored chart shows the magnitudes of its `y` column; the sign only
    /// places a bar on one side of the axis.
    pub fn render(summary: &SummaryTable, chart: &ChartSpec) -> Result<String> {
        let mut text = format!("{}\n{}\n", chart.title, "=".repeat(chart.title.chars().count()));
        let shown = if chart.mirror_axis {
            text.push_str(&format!(
                "({} of one {} drawn left of the axis)\n",
                chart.y_label.to_lowercase(),
                chart.fill.as_deref().unwrap_or("group")
            ));
            pyramid_magnitude(summary, &chart.y)?
        } else {
            summary.clone()
        };
        text.push_str(&pretty_format_batches(std::slice::from_ref(&shown.batch))?.to_string());
        text.push('\n');
        if summary.excluded_rows > 0 {
            text.push_str(&format!(
                "{} rows with missing values not shown\n",
                summary.excluded_rows
            ));
        }
        Ok(text)
    }
}

impl Presenter for ConsolePresenter {
    fn present(&self, summary: &SummaryTable, chart: &ChartSpec) -> Result<()> {
        println!("{}", Self::render(summary, chart)?);
        Ok(())
    }
}
