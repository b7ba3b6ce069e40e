use std::fs;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use mslt_composer::error::SimulationError;
use mslt_composer::output::{OutputFormat, OutputRecord, OutputSink};

fn record(observer: &str, year: i64, values: &[f64]) -> OutputRecord {
    let schema = Arc::new(Schema::new(vec![
        Field::new("year", DataType::Int64, false),
        Field::new("deaths", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![year; values.len()])) as ArrayRef,
            Arc::new(Float64Array::from(values.to_vec())),
        ],
    )
    .unwrap();
    OutputRecord::new(observer, batch)
}

fn filled_sink() -> OutputSink {
    let mut sink = OutputSink::new();
    sink.append(record("mm", 2011, &[1.0, 2.0])).unwrap();
    sink.append(record("mm", 2012, &[3.0, 4.0])).unwrap();
    sink.append(record("chd", 2011, &[0.5])).unwrap();
    sink
}

#[test]
fn records_accumulate_per_observer() {
    let sink = filled_sink();
    assert_eq!(sink.record_count("mm"), 2);
    assert_eq!(sink.record_count("chd"), 1);
    assert_eq!(sink.record_count("absent"), 0);
    assert_eq!(sink.total_records(), 3);
    assert_eq!(sink.observers().collect::<Vec<_>>(), vec!["chd", "mm"]);
    assert_eq!(sink.table("mm").unwrap().unwrap().num_rows(), 4);
    assert!(sink.table("absent").unwrap().is_none());
}

#[test]
fn mismatched_schema_is_rejected_and_flush_still_works() {
    let mut sink = filled_sink();
    let schema = Arc::new(Schema::new(vec![Field::new("prevalence", DataType::Float64, false)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(vec![0.1, 0.2, 0.3])) as ArrayRef],
    )
    .unwrap();

    let err = sink.append(OutputRecord::new("mm", batch)).unwrap_err();
    assert!(matches!(err, SimulationError::Arrow(_)));
    assert!(err.to_string().contains("prevalence"));
    assert_eq!(sink.record_count("mm"), 2);

    let dir = tempfile::tempdir().unwrap();
    let written = sink.flush(&dir.path().join("run"), OutputFormat::Csv).unwrap();
    assert_eq!(written.len(), 2);
}

#[test]
fn csv_files_are_named_after_the_observer() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("run");
    let written = filled_sink().flush(&prefix, OutputFormat::Csv).unwrap();

    assert_eq!(
        written,
        vec![dir.path().join("run_chd.csv"), dir.path().join("run_mm.csv")]
    );
    let mm = fs::read_to_string(dir.path().join("run_mm.csv")).unwrap();
    let lines: Vec<&str> = mm.lines().collect();
    assert_eq!(lines[0], "year,deaths");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("2011,1"));
    assert!(lines[4].starts_with("2012,4"));
}

#[test]
fn parquet_output_keeps_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("run");
    let written = filled_sink().flush(&prefix, OutputFormat::Parquet).unwrap();
    assert_eq!(written.len(), 2);

    let file = fs::File::open(dir.path().join("run_mm.parquet")).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(rows, 4);
}

#[test]
fn missing_destination_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("does_not_exist").join("run");
    let err = filled_sink().flush(&prefix, OutputFormat::Csv).unwrap_err();
    assert!(matches!(err, SimulationError::Io { .. }));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn empty_sink_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let written = OutputSink::new()
        .flush(&dir.path().join("run"), OutputFormat::Csv)
        .unwrap();
    assert!(written.is_empty());
}
