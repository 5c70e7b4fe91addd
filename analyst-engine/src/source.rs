//! Data sources.
//!
//! Raw file reading stays behind the `DataSource` seam: the engine only ever
//! sees an untyped `Table`. The CSV implementation reads headers, trims
//! cells, and infers nothing beyond null/number/text.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use analyst_core::{AnalystError, AnalystResult, Row, Table, Value};

/// Produces one raw table per load.
pub trait DataSource {
    fn load(&self) -> AnalystResult<Table>;

    /// Human-readable origin for log and error messages.
    fn describe(&self) -> String;
}

/// Reads a table from a CSV file on disk.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvSource {
    fn load(&self) -> AnalystResult<Table> {
        let file = File::open(&self.path).map_err(|e| {
            AnalystError::DataValidation(format!(
                "failed to open '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        let table = read_csv(file)?;
        if table.is_empty() {
            return Err(AnalystError::DataValidation(format!(
                "CSV file is empty: {}",
                self.path.display()
            )));
        }
        Ok(table)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse CSV from any reader into an untyped table.
pub fn read_csv<R: Read>(reader: R) -> AnalystResult<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AnalystError::DataValidation(format!("failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<String>>();

    let mut table = Table::new(headers.clone());
    for (line_number, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| {
            AnalystError::DataValidation(format!(
                "CSV parse error at line {}: {}",
                line_number + 2,
                e
            ))
        })?;
        let mut row = Row::new();
        for (column, cell) in headers.iter().zip(record.iter()) {
            row.set(column, Value::parse(cell));
        }
        table.push(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
product_id,product_name,quantity,price
P1,Widget,10,2.50
P2,Gadget,,3.00
P3,Left Handed Hammer,5,12
";

    #[test]
    fn csv_cells_are_inferred_as_null_number_text() {
        let table = read_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.columns(),
            &["product_id", "product_name", "quantity", "price"]
        );

        let first = &table.rows()[0];
        assert_eq!(first.text("product_id"), Some("P1"));
        assert_eq!(first.number("quantity"), Some(10.0));
        assert_eq!(first.number("price"), Some(2.5));

        let second = &table.rows()[1];
        assert!(second.is_null("quantity"));

        let third = &table.rows()[2];
        assert_eq!(third.text("product_name"), Some("Left Handed Hammer"));
    }

    #[test]
    fn short_records_read_missing_cells_as_null() {
        let csv_data = "product_id,quantity,price\nP1,5\n";
        let table = read_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].number("quantity"), Some(5.0));
        assert!(table.rows()[0].is_null("price"));
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let source = CsvSource::new("/nonexistent/inventory.csv");
        let err = source.load().unwrap_err();
        assert!(matches!(err, AnalystError::DataValidation(_)));
        assert!(err.to_string().contains("failed to open"));
    }
}
