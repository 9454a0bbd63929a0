//! File formats and stream plumbing.

pub mod compression;
pub mod csv;

pub use csv::{CsvFile, CsvOptions, CsvWriter, RowCallback, Tokenizer, read_csv, write_csv};
