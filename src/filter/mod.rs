//! Row filtering for record batches
//!
//! - [`core`]: the `BatchFilter` trait and mask application
//! - [`expr`]: the predicate expression language used by aggregations

pub mod core;
pub mod expr;

pub use self::core::{BatchFilter, filter_record_batch};
pub use expr::{Expr, ExpressionFilter, LiteralValue};
