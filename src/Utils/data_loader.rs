//! Reading and writing of measured step responses.
//!
//! The files have two `;`-separated columns, x and y, one sample per line, as exported by
//! spreadsheet programs: the decimal separator may be a comma or a dot. Lines starting with
//! `#` are comments.
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::info;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("line {line}: expected 2 columns, found {found}")]
    ColumnCount { line: u64, found: usize },
    #[error("line {line}: `{value}` is not a number")]
    InvalidNumber { line: u64, value: String },
    #[error("no samples in the data")]
    Empty,
}

fn parse_decimal(value: &str, line: u64) -> Result<f64, DataError> {
    value
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| DataError::InvalidNumber {
            line,
            value: value.to_string(),
        })
}

fn read_samples<R: std::io::Read>(reader: R) -> Result<(Vec<f64>, Vec<f64>), DataError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut x = Vec::new();
    let mut y = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() != 2 {
            return Err(DataError::ColumnCount {
                line,
                found: record.len(),
            });
        }
        x.push(parse_decimal(&record[0], line)?);
        y.push(parse_decimal(&record[1], line)?);
    }
    if x.is_empty() {
        return Err(DataError::Empty);
    }
    Ok((x, y))
}

/// Loads x and y from a `;`-separated file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<(Vec<f64>, Vec<f64>), DataError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(csv::Error::from)?;
    let (x, y) = read_samples(file)?;
    info!("loaded {} samples from {}", x.len(), path.display());
    Ok((x, y))
}

/// Same as [`load_csv`] on text in memory.
pub fn load_csv_str(text: &str) -> Result<(Vec<f64>, Vec<f64>), DataError> {
    read_samples(text.as_bytes())
}

/// Writes x and y as a `;`-separated file with dot decimals.
pub fn save_csv(path: impl AsRef<Path>, x: &[f64], y: &[f64]) -> Result<(), DataError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path.as_ref())?;
    for (xi, yi) in x.iter().zip(y.iter()) {
        writer.write_record([xi.to_string(), yi.to_string()])?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
