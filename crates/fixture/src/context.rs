// Fixture context: owns the lifecycle tracker, the snapshot registry and the
// differ. One per process via `process_wide()`, or built explicitly.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use snapfix_config::FixtureConfig;
use snapfix_dataset::{parse_file, Dataset};
use snapfix_recon::{render_with, Differ, DiffReport, RenderOptions};

use crate::connection::Connection;
use crate::error::{AssertionFailure, FixtureError};
use crate::identity::TestIdentity;
use crate::lifecycle::LifecycleTracker;
use crate::snapshot::SnapshotManager;

/// What `set_up` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetUp {
    /// Built from scratch and snapshotted.
    Fresh,
    Restored,
}

pub struct FixtureContext {
    config: FixtureConfig,
    tracker: LifecycleTracker,
    snapshots: SnapshotManager,
    differ: Differ,
    /// Identities whose build or snapshot failed, with the first error.
    failed: HashMap<TestIdentity, String>,
}

impl FixtureContext {
    pub fn new(config: FixtureConfig) -> Self {
        let snapshots = SnapshotManager::from_config(&config);
        Self {
            config,
            tracker: LifecycleTracker::new(),
            snapshots,
            differ: Differ::default(),
            failed: HashMap::new(),
        }
    }

    pub fn with_differ(mut self, differ: Differ) -> Self {
        self.differ = differ;
        self
    }

    /// Config discovered from the working directory.
    pub fn discover() -> Result<Self, FixtureError> {
        let cwd = std::env::current_dir()
            .map_err(|e| FixtureError::Build(format!("no working directory: {e}")))?;
        Ok(Self::new(FixtureConfig::discover(&cwd)?))
    }

    /// Shared context for every test thread in this process. A broken config
    /// file falls back to defaults with a warning.
    pub fn process_wide() -> &'static Mutex<FixtureContext> {
        static CONTEXT: OnceLock<Mutex<FixtureContext>> = OnceLock::new();
        CONTEXT.get_or_init(|| {
            let ctx = Self::discover().unwrap_or_else(|e| {
                log::warn!("fixture config ignored: {e}");
                Self::new(FixtureConfig::default())
            });
            Mutex::new(ctx)
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotManager {
        &mut self.snapshots
    }

    /// Prepare `conn` for a test of `test_class`.
    ///
    /// The first test of a class without a snapshot runs `build` and
    /// snapshots the result. Every other test restores that snapshot, including
    /// a class that regains ownership after another class ran in between.
    ///
    /// A failed build leaves the connection half populated, so every later
    /// `set_up` of that class fails with `SetupAborted` without touching it.
    pub fn set_up<C, F, E>(
        &mut self,
        test_class: &str,
        conn: &mut C,
        build: F,
    ) -> Result<SetUp, FixtureError>
    where
        C: Connection,
        F: FnOnce(&mut C) -> Result<(), E>,
        E: fmt::Display,
    {
        let identity = TestIdentity::for_class(test_class);
        if let Some(cause) = self.failed.get(&identity) {
            return Err(FixtureError::SetupAborted {
                identity: identity.to_string(),
                cause: cause.clone(),
            });
        }
        let first = self.tracker.is_first_test(test_class);

        if first && !self.snapshots.has_snapshot(&identity) {
            log::debug!("building fixture for {test_class}");
            let built = build(conn)
                .map_err(|e| FixtureError::Build(e.to_string()))
                .and_then(|()| self.snapshots.create(&identity, &*conn));
            if let Err(e) = built {
                log::error!("fixture for {test_class} failed, skipping its remaining tests: {e}");
                self.failed.insert(identity, e.to_string());
                return Err(e);
            }
            return Ok(SetUp::Fresh);
        }

        self.snapshots.restore(&identity, conn)?;
        Ok(SetUp::Restored)
    }

    /// Reconcile every table the dataset names against `conn`.
    pub fn reconcile(
        &self,
        dataset: &Dataset,
        conn: &dyn Connection,
    ) -> Result<DiffReport, FixtureError> {
        let mut actual = HashMap::new();
        for name in dataset.table_names() {
            actual.insert(name.to_string(), conn.query(name)?);
        }
        Ok(self.differ.reconcile_dataset(dataset, &actual))
    }

    /// Fails with the rendered report when any table differs.
    pub fn assert_dataset(&self, dataset: &Dataset, conn: &dyn Connection) -> Result<(), FixtureError> {
        let report = self.reconcile(dataset, conn)?;
        if report.is_clean() {
            return Ok(());
        }
        let options = RenderOptions {
            max_value_width: self.config.report.max_value_width,
        };
        let message = render_with(&report, &options, self.differ.comparator());
        Err(AssertionFailure { message }.into())
    }

    /// Parse `path` and assert it. A malformed file is a setup error.
    pub fn assert_dataset_file(&self, path: &Path, conn: &dyn Connection) -> Result<(), FixtureError> {
        let dataset = parse_file(path)?;
        self.assert_dataset(&dataset, conn)
    }
}
