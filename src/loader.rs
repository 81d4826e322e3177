//! Loading of the survey exports
//!
//! Reads a Parquet or CSV file into a single Arrow record batch and checks it
//! against its declared [`TableSchema`]. Survey tables are small, so every
//! batch of a file is concatenated and held in memory.

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::config::PipelineConfig;
use crate::error::{Result, SurveyError};
use crate::schema::survey::{household_schema, individual_schema};
use crate::schema::{LoadedTable, MissingValues, TableSchema};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Number of CSV records inspected when inferring column types
pub const CSV_INFERENCE_RECORDS: usize = 1000;

/// Tabular containers the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Apache Parquet
    Parquet,
    /// Comma separated values with a header row
    Csv,
}

impl InputFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("parquet" | "pq") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            _ => Err(SurveyError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Open a file, reporting a missing file with its path
fn open_file(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(SurveyError::FileNotFound(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

/// Read a parquet file into Arrow record batches
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = open_file(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Read a CSV file with a header row into Arrow record batches
///
/// Column types are inferred from the first [`CSV_INFERENCE_RECORDS`] rows;
/// empty cells are read as nulls.
pub fn read_csv(path: &Path) -> Result<Vec<RecordBatch>> {
    let mut file = open_file(path)?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, Some(CSV_INFERENCE_RECORDS))?;
    file.rewind()?;

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .build(file)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Read a whole file into one record batch
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    let batches = match InputFormat::from_path(path)? {
        InputFormat::Parquet => read_parquet(path)?,
        InputFormat::Csv => read_csv(path)?,
    };

    let Some(first) = batches.first() else {
        log_warning(&format!("No record batches read from {}", path.display()), None);
        return Ok(RecordBatch::new_empty(Arc::new(arrow::datatypes::Schema::empty())));
    };
    let schema = first.schema();
    Ok(concat_batches(&schema, &batches)?)
}

/// Read a file and validate it against its declared schema
pub fn load_table(path: &Path, schema: &TableSchema, missing: &MissingValues) -> Result<LoadedTable> {
    log_operation_start(&format!("Loading {} table from", schema.table), path);
    let start = Instant::now();

    let batch = read_table(path)?;
    let loaded = schema.coerce(&batch, missing)?;

    log_operation_complete(
        "loaded",
        &path.display().to_string(),
        loaded.batch.num_rows(),
        Some(start.elapsed()),
    );
    Ok(loaded)
}

/// Loads both survey tables as described by a pipeline configuration
#[derive(Debug, Clone, Copy)]
pub struct Loader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Loader<'a> {
    /// Create a loader for a configuration
    #[must_use]
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Load the household table
    pub fn load_households(&self) -> Result<LoadedTable> {
        load_table(
            &self.config.household_path,
            &household_schema(&self.config.columns),
            &self.config.missing_values,
        )
    }

    /// Load the individual table
    pub fn load_individuals(&self) -> Result<LoadedTable> {
        load_table(
            &self.config.individual_path,
            &individual_schema(&self.config.columns),
            &self.config.missing_values,
        )
    }
}
