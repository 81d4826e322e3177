//! Domain models for the survey tables
//!
//! Tables themselves are Arrow record batches; this module holds the ordered
//! categorical types derived from them.

pub mod categories;

// Re-export commonly used types
pub use categories::{
    AgeGroup, CategoricalColumn, ChildAgeGroup, HouseholdSizeCategory, OrderedCategory, Sex,
    WastingStatus, categorical_array, categorical_data_type,
};
