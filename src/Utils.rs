//! different utility modules used throughout the project
/// parse model catalog documents with structure "[title] key = value" into sections
pub mod catalog_parser;
/// tiny module to read and write measured step responses (';'-separated, comma or dot decimals)
pub mod data_loader;
/// logger setup and saving of curves into csv files
pub mod logger;
/// tiny module to plot identification results into PNG files
pub mod plots;
/// pretty-printing of identification results as tables
pub mod report;
