//! Shared utilities: Arrow column access and logging helpers

pub mod arrow;
pub mod logging;

pub use logging::{log_operation_complete, log_operation_start, log_warning};
