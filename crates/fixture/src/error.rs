use std::fmt;

use snapfix_config::ConfigError;
use snapfix_dataset::DatasetError;

/// A dataset assertion that did not hold. `message` is the rendered report
/// covering every failing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub message: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AssertionFailure {}

#[derive(Debug)]
pub enum FixtureError {
    /// Snapshot image or manifest could not be written or read.
    SnapshotIo { identity: String, message: String },
    /// Restore requested for an identity that was never snapshotted.
    SnapshotNotFound { identity: String },
    /// Second `create` for the same identity.
    SnapshotExists { identity: String },
    /// Stored image digest no longer matches the manifest.
    SnapshotTampered { identity: String },
    /// Database access failed.
    Connection(String),
    /// The fresh-build callback failed.
    Build(String),
    /// An earlier build for this identity failed; its tests are not run.
    SetupAborted { identity: String, cause: String },
    Dataset(DatasetError),
    Config(ConfigError),
    Assertion(AssertionFailure),
}

impl FixtureError {
    pub(crate) fn snapshot_io(identity: &impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::SnapshotIo {
            identity: identity.to_string(),
            message: message.to_string(),
        }
    }

    /// Everything except a failed assertion aborts the test run's setup.
    pub fn is_setup_error(&self) -> bool {
        !matches!(self, Self::Assertion(_))
    }
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotIo { identity, message } => {
                write!(f, "snapshot {identity}: {message}")
            }
            Self::SnapshotNotFound { identity } => write!(f, "no snapshot for {identity}"),
            Self::SnapshotExists { identity } => {
                write!(f, "snapshot {identity} already exists")
            }
            Self::SnapshotTampered { identity } => {
                write!(f, "snapshot {identity} was modified after it was created")
            }
            Self::Connection(msg) => write!(f, "database error: {msg}"),
            Self::Build(msg) => write!(f, "fixture build failed: {msg}"),
            Self::SetupAborted { identity, cause } => {
                write!(f, "setup for {identity} aborted after earlier failure: {cause}")
            }
            Self::Dataset(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::Assertion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FixtureError {}

impl From<DatasetError> for FixtureError {
    fn from(e: DatasetError) -> Self {
        Self::Dataset(e)
    }
}

impl From<ConfigError> for FixtureError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AssertionFailure> for FixtureError {
    fn from(e: AssertionFailure) -> Self {
        Self::Assertion(e)
    }
}

impl From<rusqlite::Error> for FixtureError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Connection(e.to_string())
    }
}
