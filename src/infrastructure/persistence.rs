use crate::application::{BatchReport, MeterReading};
use crate::domain::Formula;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid formula file - {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV - {0}")]
    Csv(#[from] csv::Error),
}

/// Reads and writes formula definitions as JSON documents, using the same
/// field names as the formula API.
pub struct FileRepository;

impl FileRepository {
    pub fn save_formula(formula: &Formula, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(formula)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_formula(path: impl AsRef<Path>) -> Result<Formula, StorageError> {
        let content = fs::read_to_string(path)?;
        let mut formula: Formula = serde_json::from_str(&content)?;
        formula.normalize();
        Ok(formula)
    }
}

/// Value written for a column that could not be evaluated.
pub const ERROR_CELL: &str = "#ERROR";

/// CSV input of meter readings and output of invoice lines.
pub struct CsvRepository;

impl CsvRepository {
    /// Reads `meter_id,subscriber,consumption` records; `subscriber` may be
    /// omitted.
    pub fn read_readings<R: io::Read>(reader: R) -> Result<Vec<MeterReading>, StorageError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let readings = csv_reader
            .deserialize()
            .collect::<Result<Vec<MeterReading>, _>>()?;
        Ok(readings)
    }

    pub fn load_readings(path: impl AsRef<Path>) -> Result<Vec<MeterReading>, StorageError> {
        Self::read_readings(fs::File::open(path)?)
    }

    /// Writes one row per reading in batch order. Failed meters have an
    /// empty amount and their error in the `error` column.
    pub fn write_invoices<W: io::Write>(report: &BatchReport, writer: W) -> Result<(), StorageError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["meter_id", "subscriber", "consumption", "amount"];
        header.extend(report.headers.iter().map(String::as_str));
        header.push("error");
        csv_writer.write_record(&header)?;

        for outcome in &report.outcomes {
            let record = match outcome {
                Ok(line) => {
                    let mut record = vec![
                        line.meter_id.clone(),
                        line.subscriber.clone(),
                        line.consumption.to_string(),
                        line.amount.to_string(),
                    ];
                    record.extend(line.columns.cells.iter().map(|cell| match &cell.result {
                        Ok(value) => value.to_string(),
                        Err(_) => ERROR_CELL.to_string(),
                    }));
                    record.push(String::new());
                    record
                }
                Err(failure) => {
                    let mut record = vec![
                        failure.meter_id.clone(),
                        failure.subscriber.clone(),
                        String::new(),
                        String::new(),
                    ];
                    record.extend(report.headers.iter().map(|_| String::new()));
                    record.push(failure.error.to_string());
                    record
                }
            };
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn save_invoices(report: &BatchReport, path: impl AsRef<Path>) -> Result<(), StorageError> {
        Self::write_invoices(report, fs::File::create(path)?)
    }
}
