//! Logging utilities
//!
//! This module provides standardized logging functions for pipeline stages.

use std::path::Path;

/// Log an operation start with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the file being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log an operation completion with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `subject` - What was operated on (a path or table name)
/// * `rows` - Number of rows produced
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    subject: &str,
    rows: usize,
    elapsed: Option<std::time::Duration>,
) {
    if let Some(duration) = elapsed {
        log::info!("Successfully {operation} {rows} rows from {subject} in {duration:?}");
    } else {
        log::info!("Successfully {operation} {rows} rows from {subject}");
    }
}

/// Log a data-quality warning with consistent format
///
/// # Arguments
/// * `message` - Warning message
/// * `column` - Optional column related to the warning
pub fn log_warning(message: &str, column: Option<&str>) {
    if let Some(column) = column {
        log::warn!("{message}: column '{column}'");
    } else {
        log::warn!("{message}");
    }
}
