/// Tracks which test class owns the current database instance.
///
/// Only the transition between classes matters: class X, then Y, then X
/// again reports a first test three times.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    current_owner: Option<String>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `test_class` differs from the previous caller. Records
    /// `test_class` as the new owner either way.
    pub fn is_first_test(&mut self, test_class: &str) -> bool {
        if self.current_owner.as_deref() == Some(test_class) {
            return false;
        }
        log::debug!(
            "instance owner {} -> {test_class}",
            self.current_owner.as_deref().unwrap_or("<none>")
        );
        self.current_owner = Some(test_class.to_string());
        true
    }

    pub fn current_owner(&self) -> Option<&str> {
        self.current_owner.as_deref()
    }

    pub fn reset(&mut self) {
        self.current_owner = None;
    }
}
