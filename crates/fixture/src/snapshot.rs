// Snapshot manager: one database image per test identity.
//
// Layout: <root>/<identity>/{database.sqlite | dump.json, manifest.json}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snapfix_config::FixtureConfig;

use crate::connection::{Connection, Platform};
use crate::error::FixtureError;
use crate::identity::TestIdentity;

pub const MANIFEST_FILE: &str = "manifest.json";

const PARTIAL_SUFFIX: &str = ".partial";

/// Manifest written next to every image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub identity: String,
    pub test_class: String,
    pub platform: Platform,
    pub image: PathBuf,
    /// `blake3:<hex>` of the image file.
    pub digest: String,
    pub size_bytes: u64,
    /// RFC 3339.
    pub created_at: String,
}

#[derive(Debug)]
pub struct SnapshotManager {
    root: PathBuf,
    verify_digest: bool,
    snapshots: HashMap<TestIdentity, Snapshot>,
}

impl SnapshotManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            verify_digest: true,
            snapshots: HashMap::new(),
        }
    }

    pub fn from_config(config: &FixtureConfig) -> Self {
        Self::new(config.snapshot_root()).with_digest_verification(config.snapshot.verify_digest)
    }

    pub fn with_digest_verification(mut self, enabled: bool) -> Self {
        self.verify_digest = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_snapshot(&self, identity: &TestIdentity) -> bool {
        self.snapshots.contains_key(identity)
    }

    pub fn get(&self, identity: &TestIdentity) -> Option<&Snapshot> {
        self.snapshots.get(identity)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Capture the full state of `source` for `identity`.
    ///
    /// The image is written beside its final path and renamed into place once
    /// synced, so a restore never sees a partial image.
    pub fn create(
        &mut self,
        identity: &TestIdentity,
        source: &dyn Connection,
    ) -> Result<Snapshot, FixtureError> {
        if self.has_snapshot(identity) {
            return Err(FixtureError::SnapshotExists {
                identity: identity.to_string(),
            });
        }

        let dir = identity.dir_in(&self.root);
        let io = |e: std::io::Error| FixtureError::snapshot_io(identity, e);
        fs::create_dir_all(&dir).map_err(io)?;

        let platform = source.platform();
        let image = dir.join(platform.image_file_name());
        let partial = dir.join(format!("{}{PARTIAL_SUFFIX}", platform.image_file_name()));
        if partial.exists() {
            fs::remove_file(&partial).map_err(io)?;
        }

        source
            .write_image(&partial)
            .map_err(|e| FixtureError::snapshot_io(identity, e))?;
        fs::File::open(&partial).and_then(|f| f.sync_all()).map_err(io)?;
        fs::rename(&partial, &image).map_err(io)?;

        let (digest, size_bytes) = digest_file(&image).map_err(io)?;
        let snapshot = Snapshot {
            identity: identity.to_string(),
            test_class: identity.class_name().to_string(),
            platform,
            image,
            digest,
            size_bytes,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let manifest = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| FixtureError::snapshot_io(identity, e))?;
        fs::write(dir.join(MANIFEST_FILE), manifest).map_err(io)?;

        log::info!(
            "snapshot {} created for {} at {}",
            identity,
            identity.class_name(),
            snapshot.image.display()
        );
        log::debug!("snapshot {identity}: {platform} image, {size_bytes} bytes, {}", snapshot.digest);
        self.snapshots.insert(identity.clone(), snapshot.clone());
        Ok(snapshot)
    }

    /// Bring `target` back to the exact state captured for `identity`.
    pub fn restore(
        &self,
        identity: &TestIdentity,
        target: &mut dyn Connection,
    ) -> Result<(), FixtureError> {
        let snapshot = self
            .snapshots
            .get(identity)
            .ok_or_else(|| FixtureError::SnapshotNotFound {
                identity: identity.to_string(),
            })?;
        self.restore_snapshot(snapshot, target)
    }

    pub fn restore_snapshot(
        &self,
        snapshot: &Snapshot,
        target: &mut dyn Connection,
    ) -> Result<(), FixtureError> {
        let identity = &snapshot.identity;
        if target.platform() != snapshot.platform {
            return Err(FixtureError::snapshot_io(
                identity,
                format!(
                    "image is {} but the target connection is {}",
                    snapshot.platform,
                    target.platform()
                ),
            ));
        }
        if !snapshot.image.is_file() {
            return Err(FixtureError::snapshot_io(
                identity,
                format!("image {} is missing", snapshot.image.display()),
            ));
        }
        if !self.verify_digest {
            log::warn!("digest check disabled, restoring snapshot {identity} unverified");
        } else {
            let (digest, _) = digest_file(&snapshot.image)
                .map_err(|e| FixtureError::snapshot_io(identity, e))?;
            if digest != snapshot.digest {
                return Err(FixtureError::SnapshotTampered {
                    identity: identity.clone(),
                });
            }
        }

        target
            .read_image(&snapshot.image)
            .map_err(|e| FixtureError::snapshot_io(identity, e))?;

        if !snapshot.platform.is_file_backed() {
            for table in target.tables()? {
                target.reset_sequences(&table)?;
            }
        }

        log::info!(
            "snapshot {identity} restored for {} from {}",
            snapshot.test_class,
            snapshot.image.display()
        );
        Ok(())
    }

    /// Read a manifest back from disk.
    pub fn read_manifest(dir: &Path) -> Result<Snapshot, FixtureError> {
        let path = dir.join(MANIFEST_FILE);
        let label = dir.display();
        let bytes = fs::read(&path).map_err(|e| FixtureError::snapshot_io(&label, e))?;
        serde_json::from_slice(&bytes).map_err(|e| FixtureError::snapshot_io(&label, e))
    }

    /// Manifests of every snapshot directory under `root`, sorted by identity.
    pub fn scan(root: &Path) -> Result<Vec<Snapshot>, FixtureError> {
        let label = root.display();
        let entries = fs::read_dir(root).map_err(|e| FixtureError::snapshot_io(&label, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let dir = entry.map_err(|e| FixtureError::snapshot_io(&label, e))?.path();
            if dir.join(MANIFEST_FILE).is_file() {
                out.push(Self::read_manifest(&dir)?);
            }
        }
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(out)
    }

    /// Delete every snapshot this manager created.
    pub fn purge(&mut self) -> Result<(), FixtureError> {
        for (identity, _) in self.snapshots.drain() {
            let dir = identity.dir_in(&self.root);
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| FixtureError::snapshot_io(&identity, e))?;
            }
        }
        log::debug!("snapshots under {} purged", self.root.display());
        Ok(())
    }
}

fn digest_file(path: &Path) -> std::io::Result<(String, u64)> {
    let bytes = fs::read(path)?;
    let hash = blake3::hash(&bytes);
    Ok((format!("blake3:{}", hash.to_hex()), bytes.len() as u64))
}
