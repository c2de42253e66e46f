use std::fmt;

#[derive(Debug)]
pub enum DatasetError {
    /// Bad golden-data syntax. `line` is 1-based.
    Malformed { line: u64, message: String },
    /// The same table name opens two sections.
    DuplicateTable { line: u64, table: String },
    /// CSV tokenizer error (unterminated quote, invalid UTF-8, ...).
    Csv(String),
    /// IO error (file read/write).
    Io(String),
}

impl DatasetError {
    pub(crate) fn malformed(line: u64, message: impl Into<String>) -> Self {
        Self::Malformed { line, message: message.into() }
    }

    /// True for every variant that describes bad input rather than bad IO.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line, message } => {
                write!(f, "malformed dataset at line {line}: {message}")
            }
            Self::DuplicateTable { line, table } => {
                write!(f, "malformed dataset at line {line}: table '{table}' is defined twice")
            }
            Self::Csv(msg) => write!(f, "malformed dataset: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
