//! Chart settings passed to presenters

use serde::{Deserialize, Serialize};

use crate::config::ColumnNames;

/// Colours used when a chart spec names none
pub const DEFAULT_PALETTE: &[&str] = &["#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e"];

/// How a summary table should be drawn
///
/// A spec is a plain value handed to [`super::Presenter::present`] with every
/// table; presenters never keep chart settings of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart title
    pub title: String,
    /// Column shown along the x axis
    pub x: String,
    /// Value column shown along the y axis
    pub y: String,
    /// Axis label of x
    pub x_label: String,
    /// Axis label of y
    pub y_label: String,
    /// Column mapped to bar colour
    pub fill: Option<String>,
    /// Column splitting the chart into panels
    pub facet: Option<String>,
    /// Fill colours in category order
    pub palette: Vec<String>,
    /// Bars of negated values are drawn left of a shared axis
    pub mirror_axis: bool,
}

impl ChartSpec {
    /// A bar chart of `y` against `x`
    #[must_use]
    pub fn bar(title: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        let x = x.into();
        let y = y.into();
        Self {
            title: title.into(),
            x_label: x.clone(),
            y_label: y.clone(),
            x,
            y,
            fill: None,
            facet: None,
            palette: DEFAULT_PALETTE.iter().map(|c| (*c).to_string()).collect(),
            mirror_axis: false,
        }
    }

    /// Set both axis labels
    #[must_use]
    pub fn labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// Colour bars by a column
    #[must_use]
    pub fn fill(mut self, column: impl Into<String>) -> Self {
        self.fill = Some(column.into());
        self
    }

    /// Split into one panel per value of a column
    #[must_use]
    pub fn facet(mut self, column: impl Into<String>) -> Self {
        self.facet = Some(column.into());
        self
    }

    /// Replace the palette
    #[must_use]
    pub fn palette<I, S>(mut self, colours: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.palette = colours.into_iter().map(Into::into).collect();
        self
    }

    /// Draw negated values left of the axis
    #[must_use]
    pub fn mirrored(mut self) -> Self {
        self.mirror_axis = true;
        self
    }

    /// Spec for a summary produced by the pipeline, falling back to a plain
    /// table-named chart for configured aggregations
    #[must_use]
    pub fn for_summary(name: &str, columns: &ColumnNames) -> Self {
        match name {
            "household_size" => Self::bar("Household size", &columns.size_category, "households")
                .labels("Household members", "Households"),
            "household_composition" => Self::bar("Household composition", "members", "households")
                .labels("", "Persons"),
            "population_pyramid" => Self::bar("Population pyramid", &columns.age_group, "people")
                .labels("Age group", "People")
                .fill(&columns.sex_label)
                .palette(["#2c7fb8", "#f03b20"])
                .mirrored(),
            "children_by_age" => Self::bar("Children under five", &columns.child_age_group, "children")
                .labels("Age (months)", "Children")
                .fill(&columns.sex_label),
            "wasting" => Self::bar("Acute malnutrition", &columns.wasting, "children")
                .labels("Weight-for-height", "Children")
                .palette(["#1a9641", "#fdae61", "#d7191c"]),
            "response" => Self::bar("Response", "individuals", "responded").labels("", "Individuals"),
            other => Self::bar(other, "", ""),
        }
    }
}
