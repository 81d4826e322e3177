use std::fs::File;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use parquet::arrow::ArrowWriter;
use survey_pipeline::loader::Loader;
use survey_pipeline::schema::survey::{household_schema, individual_schema};
use survey_pipeline::{ColumnNames, MissingValues, SurveyError, load_table};

use crate::utils::{file_config, household_batch, write_csv};

#[test]
fn test_csv_user_missing_codes_become_nulls() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(
        dir.path(),
        "individual.csv",
        "interview_id,sex,age_years,age_months,wfhz,consent\n\
         A,1,1,20,-2.4,yes\n\
         A,2,31,,-999999999,yes\n\
         B,-999999999,4,50,,no\n",
    );

    let loaded = load_table(
        &path,
        &individual_schema(&ColumnNames::default()),
        &MissingValues::default(),
    )?;
    assert_eq!(loaded.batch.num_rows(), 3);

    let wfhz = loaded.batch.column_by_name("wfhz").unwrap();
    assert_eq!(wfhz.data_type(), &DataType::Float64);
    let wfhz = wfhz.as_primitive::<Float64Type>();
    assert_eq!(wfhz.value(0), -2.4);
    assert!(wfhz.is_null(1));
    assert!(wfhz.is_null(2));

    let sex = loaded.batch.column_by_name("sex").unwrap().as_primitive::<Int64Type>();
    assert!(sex.is_null(2));

    let wfhz_missing = loaded.missing.iter().find(|m| m.column == "wfhz").unwrap();
    assert_eq!(wfhz_missing.user_missing, 1);
    assert_eq!(wfhz_missing.system_missing, 1);
    let months_missing = loaded.missing.iter().find(|m| m.column == "age_months").unwrap();
    assert_eq!(months_missing.system_missing, 1);
    Ok(())
}

#[test]
fn test_parquet_and_csv_load_the_same_table() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let households = household_batch(&[("A", 3, 1), ("B", 6, 0)]);

    let parquet_path = dir.path().join("household.parquet");
    let mut writer = ArrowWriter::try_new(File::create(&parquet_path)?, households.schema(), None)?;
    writer.write(&households)?;
    writer.close()?;

    let csv_path = write_csv(
        dir.path(),
        "household.csv",
        "interview_id,hh_size,hh_under5\nA,3,1\nB,6,0\n",
    );

    let schema = household_schema(&ColumnNames::default());
    let from_parquet = load_table(&parquet_path, &schema, &MissingValues::default())?;
    let from_csv = load_table(&csv_path, &schema, &MissingValues::default())?;

    assert_eq!(from_parquet.batch.num_rows(), 2);
    for column in ["interview_id", "hh_size", "hh_under5", "hh_women_15_49"] {
        let parquet_column = from_parquet.batch.column_by_name(column).unwrap();
        let csv_column = from_csv.batch.column_by_name(column).unwrap();
        assert_eq!(parquet_column.data_type(), csv_column.data_type(), "{column}");
        assert_eq!(parquet_column.to_data(), csv_column.to_data(), "{column}");
    }
    // Optional column absent from both files is filled with nulls
    assert_eq!(
        from_csv.batch.column_by_name("hh_women_15_49").unwrap().null_count(),
        2
    );
    Ok(())
}

#[test]
fn test_missing_required_column_names_the_column() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "household.csv", "interview_id,members\nA,3\n");

    let err = load_table(
        &path,
        &household_schema(&ColumnNames::default()),
        &MissingValues::default(),
    )
    .unwrap_err();
    match err {
        SurveyError::MissingColumn { table, column } => {
            assert_eq!(table, "household");
            assert_eq!(column, "hh_size");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_loader_reads_configured_paths() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = file_config(
        dir.path().join("missing_household.csv"),
        dir.path().join("individual.txt"),
    );
    let loader = Loader::new(&config);

    assert!(matches!(
        loader.load_households().unwrap_err(),
        SurveyError::FileNotFound(_)
    ));
    assert!(matches!(
        loader.load_individuals().unwrap_err(),
        SurveyError::UnsupportedFormat(_)
    ));
    Ok(())
}
