//! Ordered categorical labels
//!
//! Every derived variable has a fixed, finite label set with a display order
//! that differs from lexical order ("5-9" sorts after "10-14" as text). The
//! [`OrderedCategory`] trait carries that order, and [`categorical_array`]
//! stores values as an Arrow dictionary whose dictionary is the full label set
//! in declared order, so the order travels with the column.

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, DictionaryArray, Int8Array, StringArray};
use arrow::datatypes::{DataType, Int8Type};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SurveyError};

/// A categorical value with a declared, non-alphabetic display order
pub trait OrderedCategory: Copy + Sized + 'static {
    /// All labels in display order
    const LABELS: &'static [&'static str];

    /// Position of this value in [`Self::LABELS`]
    fn ordinal(self) -> usize;

    /// Inverse of [`Self::ordinal`]
    fn from_ordinal(ordinal: usize) -> Option<Self>;

    /// Display label
    fn label(self) -> &'static str {
        Self::LABELS[self.ordinal()]
    }

    /// Look a value up by its display label
    fn from_label(label: &str) -> Option<Self> {
        Self::LABELS
            .iter()
            .position(|l| *l == label)
            .and_then(Self::from_ordinal)
    }

    /// Every value in display order
    #[must_use]
    fn all() -> Vec<Self> {
        (0..Self::LABELS.len())
            .filter_map(Self::from_ordinal)
            .collect()
    }
}

/// Household size bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HouseholdSizeCategory {
    /// One to four members
    UpToFour,
    /// Five or six members
    FiveToSix,
    /// Seven to nine members
    SevenToNine,
    /// Ten members or more
    TenOrMore,
}

impl OrderedCategory for HouseholdSizeCategory {
    const LABELS: &'static [&'static str] = &["1-4", "5-6", "7-9", ">=10"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::UpToFour),
            1 => Some(Self::FiveToSix),
            2 => Some(Self::SevenToNine),
            3 => Some(Self::TenOrMore),
            _ => None,
        }
    }
}

/// Five-year age band, `0-4` through `90-94`, plus a terminal `95+`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgeGroup(u8);

impl AgeGroup {
    /// Number of five-year bands below the terminal band
    pub const BANDS: u8 = 19;

    /// Band containing a whole number of years
    #[must_use]
    pub fn from_years(years: u32) -> Self {
        Self((years / 5).min(u32::from(Self::BANDS)) as u8)
    }

    /// Lower bound of the band in years
    #[must_use]
    pub fn lower_bound(self) -> u32 {
        u32::from(self.0) * 5
    }

    /// Upper bound in years, exclusive; `None` for the terminal band
    #[must_use]
    pub fn upper_bound(self) -> Option<u32> {
        (self.0 < Self::BANDS).then(|| self.lower_bound() + 5)
    }
}

impl OrderedCategory for AgeGroup {
    const LABELS: &'static [&'static str] = &[
        "0-4", "5-9", "10-14", "15-19", "20-24", "25-29", "30-34", "35-39", "40-44", "45-49",
        "50-54", "55-59", "60-64", "65-69", "70-74", "75-79", "80-84", "85-89", "90-94", "95+",
    ];

    fn ordinal(self) -> usize {
        usize::from(self.0)
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        (ordinal <= usize::from(Self::BANDS)).then(|| Self(ordinal as u8))
    }
}

/// Age bands used for children under five, in months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildAgeGroup {
    /// 0 to 5 months
    Months0To5,
    /// 6 to 11 months
    Months6To11,
    /// 12 to 23 months
    Months12To23,
    /// 24 to 35 months
    Months24To35,
    /// 36 to 47 months
    Months36To47,
    /// 48 to 59 months
    Months48To59,
}

impl ChildAgeGroup {
    /// Exclusive upper bounds of each band, in months
    pub const UPPER_BOUNDS: [u32; 6] = [6, 12, 24, 36, 48, 60];
}

impl OrderedCategory for ChildAgeGroup {
    const LABELS: &'static [&'static str] = &["0-5", "6-11", "12-23", "24-35", "36-47", "48-59"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Months0To5),
            1 => Some(Self::Months6To11),
            2 => Some(Self::Months12To23),
            3 => Some(Self::Months24To35),
            4 => Some(Self::Months36To47),
            5 => Some(Self::Months48To59),
            _ => None,
        }
    }
}

/// Sex of an individual after recoding the numeric survey code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    /// Survey code 1
    Male,
    /// Any other non-null survey code
    Female,
}

impl OrderedCategory for Sex {
    const LABELS: &'static [&'static str] = &["Male", "Female"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Male),
            1 => Some(Self::Female),
            _ => None,
        }
    }
}

/// Acute malnutrition classification from a weight-for-height z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WastingStatus {
    /// z-score of -2 or above
    NoWasting,
    /// z-score in [-3, -2)
    Moderate,
    /// z-score below -3
    Severe,
}

impl OrderedCategory for WastingStatus {
    const LABELS: &'static [&'static str] = &["No wasting", "Moderate wasting", "Severe wasting"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::NoWasting),
            1 => Some(Self::Moderate),
            2 => Some(Self::Severe),
            _ => None,
        }
    }
}

macro_rules! display_as_label {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )*
    };
}

display_as_label!(HouseholdSizeCategory, AgeGroup, ChildAgeGroup, Sex, WastingStatus);

/// Arrow type used for every categorical column
#[must_use]
pub fn categorical_data_type() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int8), Box::new(DataType::Utf8))
}

/// Build a dictionary column from category values
///
/// The dictionary always holds the complete label set in display order, so
/// the dictionary key of a value equals its ordinal.
pub fn categorical_array<C: OrderedCategory>(values: &[Option<C>]) -> Result<ArrayRef> {
    let keys: Int8Array = values
        .iter()
        .map(|v| v.map(|c| c.ordinal() as i8))
        .collect();
    let dictionary: ArrayRef = Arc::new(StringArray::from(C::LABELS.to_vec()));
    let array = DictionaryArray::<Int8Type>::try_new(keys, dictionary)?;
    Ok(Arc::new(array))
}

/// A categorical column decoded into ordinals and its label set
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    /// Label set in display order
    pub levels: Vec<String>,
    /// Ordinal of each row, `None` for missing
    pub ordinals: Vec<Option<usize>>,
}

impl CategoricalColumn {
    /// Decode an `Int8` dictionary array
    pub fn from_array(column: &str, array: &dyn Array) -> Result<Self> {
        let dictionary = array.as_dictionary_opt::<Int8Type>().ok_or_else(|| {
            SurveyError::ColumnType {
                column: column.to_string(),
                expected: "categorical".to_string(),
                found: array.data_type().to_string(),
            }
        })?;
        let values = dictionary
            .values()
            .as_string_opt::<i32>()
            .ok_or_else(|| SurveyError::ColumnType {
                column: column.to_string(),
                expected: "categorical with text labels".to_string(),
                found: dictionary.values().data_type().to_string(),
            })?;

        let levels = (0..values.len())
            .map(|i| values.value(i).to_string())
            .collect();
        let ordinals = dictionary
            .keys()
            .iter()
            .map(|k| k.and_then(|k| usize::try_from(k).ok()))
            .collect();

        Ok(Self { levels, ordinals })
    }

    /// Label of a row, `None` for missing
    #[must_use]
    pub fn label(&self, row: usize) -> Option<&str> {
        self.ordinals[row].map(|o| self.levels[o].as_str())
    }

    /// Typed value of a row
    #[must_use]
    pub fn value<C: OrderedCategory>(&self, row: usize) -> Option<C> {
        self.label(row).and_then(C::from_label)
    }
}
