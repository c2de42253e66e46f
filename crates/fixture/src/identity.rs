// Test identity: short stable hash of the test class name.
// Namespaces snapshot directories and per-class database names.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

const HASH_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestIdentity {
    hash: String,
    class: String,
}

impl TestIdentity {
    pub fn for_class(test_class: &str) -> Self {
        let digest = Sha256::digest(test_class.as_bytes());
        let mut hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hash.truncate(HASH_LEN);
        Self {
            hash,
            class: test_class.to_string(),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// `base` suffixed with the identity, e.g. `app_test_ft1a2b3c4d`.
    pub fn namespace(&self, base: &str) -> String {
        format!("{base}_ft{}", self.hash)
    }

    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.hash)
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}
