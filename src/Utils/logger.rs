//! logging setup and saving of computed curves
use chrono::Local;
use csv::Writer;
use log::{LevelFilter, debug, info};
use simplelog::*;
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("loglevel must be debug, info, warn, error, off or none, got `{0}`")]
    UnknownLevel(String),
    #[error("cannot create log file: {0}")]
    File(#[from] io::Error),
}

/// level filter of a loglevel name; `None` means info
pub fn level_filter(loglevel: Option<&str>) -> Result<LevelFilter, LoggerError> {
    match loglevel.map(|level| level.to_lowercase()) {
        None => Ok(LevelFilter::Info),
        Some(level) => match level.as_str() {
            "trace" => Ok(LevelFilter::Trace),
            "debug" => Ok(LevelFilter::Debug),
            "info" => Ok(LevelFilter::Info),
            "warn" => Ok(LevelFilter::Warn),
            "error" => Ok(LevelFilter::Error),
            "off" | "none" => Ok(LevelFilter::Off),
            _ => Err(LoggerError::UnknownLevel(level)),
        },
    }
}

/// Terminal logger plus, if `log_to_file`, a file `log_<date>_<time>.txt` in the working
/// directory. A logger installed earlier stays in place.
pub fn init_logger(loglevel: Option<&str>, log_to_file: bool) -> Result<(), LoggerError> {
    let level = level_filter(loglevel)?;
    if level == LevelFilter::Off {
        return Ok(());
    }
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if log_to_file {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let name = format!("log_{}.txt", date_and_time);
        loggers.push(WriteLogger::new(level, Config::default(), File::create(name)?));
    }
    match CombinedLogger::init(loggers) {
        Ok(()) => info!("logger initialized at level {}", level),
        Err(_) => debug!("logger was already initialized"),
    }
    Ok(())
}

/// Writes curves column by column into a csv file with a header row.
pub fn save_curves_to_csv(
    filename: impl AsRef<Path>,
    headers: &[&str],
    columns: &[&[f64]],
) -> io::Result<()> {
    if headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} headers for {} columns", headers.len(), columns.len()),
        ));
    }
    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut writer = Writer::from_path(filename.as_ref())?;
    writer.write_record(headers)?;
    // shorter columns leave empty cells
    for i in 0..rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| column.get(i).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!(
        "saved {} rows to {}",
        rows,
        filename.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(None).unwrap(), LevelFilter::Info);
        assert_eq!(level_filter(Some("warn")).unwrap(), LevelFilter::Warn);
        assert_eq!(level_filter(Some("DEBUG")).unwrap(), LevelFilter::Debug);
        assert_eq!(level_filter(Some("none")).unwrap(), LevelFilter::Off);
        assert!(matches!(
            level_filter(Some("loud")),
            Err(LoggerError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_logging_off_installs_nothing() {
        assert!(init_logger(Some("off"), true).is_ok());
    }

    #[test]
    fn test_save_curves_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.csv");
        let x: &[f64] = &[0.0, 0.5, 1.0];
        let y: &[f64] = &[1.0, 2.5];
        save_curves_to_csv(&path, &["x", "y"], &[x, y]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "x,y\n0,1\n0.5,2.5\n1,\n");
        assert!(save_curves_to_csv(&path, &["x"], &[x, y]).is_err());
    }
}
