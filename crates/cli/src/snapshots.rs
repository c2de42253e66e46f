//! `snapfix snapshots`: list snapshot manifests left under a root.

use std::path::{Path, PathBuf};

use snapfix_fixture::SnapshotManager;

use crate::{load_config, CliError};

pub fn cmd_snapshots(root: Option<PathBuf>, json: bool, config_path: Option<&Path>) -> Result<(), CliError> {
    let root = match root {
        Some(r) => r,
        None => load_config(config_path)?.snapshot_root(),
    };
    if !root.is_dir() {
        return Err(CliError::io(format!("no snapshot root at {}", root.display()))
            .with_hint("snapshots live only as long as the test run unless snapshot.root is set"));
    }

    let snapshots = SnapshotManager::scan(&root)?;
    if json {
        let out = serde_json::to_string_pretty(&snapshots)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    for s in &snapshots {
        println!(
            "{}  {:<9}  {:>10} B  {}  {}",
            s.identity, s.platform.to_string(), s.size_bytes, s.created_at, s.test_class
        );
    }
    eprintln!("{} snapshot(s) under {}", snapshots.len(), root.display());
    Ok(())
}
