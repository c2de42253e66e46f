//! `snapfix-dataset`: Golden dataset model.
//!
//! Parses the golden text format into typed expected records and writes
//! tables back into the same format. No database or comparison logic.

pub mod error;
pub mod model;
pub mod parser;
pub mod writer;

pub use error::DatasetError;
pub use model::{Dataset, DatasetRecord, DatasetTable, FieldValue, KeyStrategy, Record};
pub use parser::{parse, parse_file};
pub use writer::{write_dataset, write_table};
