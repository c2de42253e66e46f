// Fixture settings
// Loaded from snapfix.toml (project) or ~/.config/snapfix/config.toml (user)

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Project config file, searched from the working directory upwards.
pub const CONFIG_FILE_NAME: &str = "snapfix.toml";

/// Overrides `snapshot.root`.
pub const SNAPSHOT_ROOT_ENV: &str = "SNAPFIX_SNAPSHOT_ROOT";

const MIN_VALUE_WIDTH: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    pub snapshot: SnapshotSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSettings {
    /// Snapshot storage root. `None` = a per-process directory under the system temp dir.
    pub root: Option<PathBuf>,

    /// Check the stored image digest before every restore.
    pub verify_digest: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            root: None,
            verify_digest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    /// Wider values are replaced by "[see diff]" in aligned tables.
    pub max_value_width: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { max_value_width: 40 }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl FixtureConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: FixtureConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report.max_value_width < MIN_VALUE_WIDTH {
            return Err(ConfigError::Validation(format!(
                "report.max_value_width must be at least {MIN_VALUE_WIDTH}, got {}",
                self.report.max_value_width
            )));
        }
        if let Some(root) = &self.snapshot.root {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::Validation("snapshot.root must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Load a config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&contents)?;
        config.override_root(std::env::var_os(SNAPSHOT_ROOT_ENV));
        Ok(config)
    }

    /// First `snapfix.toml` in `start` or its ancestors, then the user config
    /// file, then defaults. Environment overrides apply in every case.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        let found = start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|p| p.is_file())
            .or_else(|| Self::user_config_path().filter(|p| p.is_file()));

        match found {
            Some(path) => {
                log::debug!("using config {}", path.display());
                Self::load(&path)
            }
            None => {
                let mut config = Self::default();
                config.override_root(std::env::var_os(SNAPSHOT_ROOT_ENV));
                Ok(config)
            }
        }
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("snapfix").join("config.toml"))
    }

    /// Effective snapshot root. The default is unique per process so parallel
    /// worker processes never share storage.
    pub fn snapshot_root(&self) -> PathBuf {
        match &self.snapshot.root {
            Some(root) => root.clone(),
            None => std::env::temp_dir().join(format!("snapfix-{}", std::process::id())),
        }
    }

    fn override_root(&mut self, value: Option<OsString>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.snapshot.root = Some(PathBuf::from(v));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = FixtureConfig::from_toml(
            r#"
[snapshot]
root = "/var/tmp/snapfix"
verify_digest = false

[report]
max_value_width = 60
"#,
        )
        .unwrap();
        assert_eq!(config.snapshot.root, Some(PathBuf::from("/var/tmp/snapfix")));
        assert!(!config.snapshot.verify_digest);
        assert_eq!(config.report.max_value_width, 60);
        assert_eq!(config.snapshot_root(), PathBuf::from("/var/tmp/snapfix"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = FixtureConfig::from_toml("").unwrap();
        assert_eq!(config, FixtureConfig::default());
        assert!(config.snapshot.verify_digest);
        assert_eq!(config.report.max_value_width, 40);
        let root = config.snapshot_root();
        assert!(root.starts_with(std::env::temp_dir()));
        assert!(root.to_string_lossy().contains(&std::process::id().to_string()));
    }

    #[test]
    fn reject_unknown_key() {
        let err = FixtureConfig::from_toml("[snapshot]\nverfiy_digest = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reject_narrow_value_width() {
        let err = FixtureConfig::from_toml("[report]\nmax_value_width = 3\n").unwrap_err();
        assert!(err.to_string().contains("at least 8"));
    }

    #[test]
    fn env_root_overrides_file() {
        let mut config = FixtureConfig::from_toml("[snapshot]\nroot = \"/a\"\n").unwrap();
        config.override_root(Some(OsString::from("/b")));
        assert_eq!(config.snapshot_root(), PathBuf::from("/b"));
        config.override_root(Some(OsString::new()));
        assert_eq!(config.snapshot_root(), PathBuf::from("/b"));
    }

    #[test]
    fn discover_finds_project_file_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[report]\nmax_value_width = 72\n",
        )
        .unwrap();
        let nested = dir.path().join("tests").join("functional");
        fs::create_dir_all(&nested).unwrap();

        let config = FixtureConfig::discover(&nested).unwrap();
        assert_eq!(config.report.max_value_width, 72);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FixtureConfig::load(Path::new("/nonexistent/snapfix.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
