//! `snapfix-fixture`: Test fixture lifecycle.
//!
//! Tracks which test class owns the database instance, builds it once per
//! class, snapshots it and restores the snapshot before every later test.
//! Dataset assertions run the reconciliation engine against a live connection.

pub mod connection;
pub mod context;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod memory;
pub mod snapshot;
pub mod sqlite;

pub use connection::{Connection, Platform};
pub use context::{FixtureContext, SetUp};
pub use error::{AssertionFailure, FixtureError};
pub use identity::TestIdentity;
pub use lifecycle::LifecycleTracker;
pub use memory::MemoryConnection;
pub use snapshot::{Snapshot, SnapshotManager};
pub use sqlite::SqliteConnection;
