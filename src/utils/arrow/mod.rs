//! Arrow helpers shared by the pipeline stages

pub mod array_utils;

pub use array_utils::{float_column, get_column, get_column_index, int_column, text_column};
