use serde::{Deserialize, Serialize};
use std::fmt;

/// The default group name used when a caller does not specify one.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Group reserved for ad-hoc triggers created by `trigger_job`.
pub const MANUAL_TRIGGER_GROUP: &str = "MANUAL_TRIGGER";

/// Group reserved for triggers rewritten by the startup recovery pass.
pub const RECOVERING_JOBS_GROUP: &str = "RECOVERING_JOBS";

/// Group reserved for jobs rescheduled after a failed-over node.
pub const FAILED_OVER_JOBS_GROUP: &str = "FAILED_OVER_JOBS";

/// A `(name, group)` pair identifying a stored object.
///
/// Both `name` and `group` must be non-empty; `group` defaults to
/// [`DEFAULT_GROUP`]. A name is unique only within its group, so the pair
/// together is the true identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    name: String,
    group: String,
}

impl Key {
    /// Create a key in the given group.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `group` is empty — callers that accept external
    /// input should validate before constructing a `Key`.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        let name = name.into();
        let group = group.into();
        assert!(!name.is_empty(), "key name must not be empty");
        assert!(!group.is_empty(), "key group must not be empty");
        Self { name, group }
    }

    /// Create a key in [`DEFAULT_GROUP`].
    pub fn with_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    /// The key's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key's group.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Identity of a [`crate::job::JobDetail`].
pub type JobKey = Key;

/// Identity of a [`crate::trigger::Trigger`].
pub type TriggerKey = Key;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_group_dot_name() {
        let k = Key::new("nightly-report", "reports");
        assert_eq!(k.to_string(), "reports.nightly-report");
    }

    #[test]
    fn default_group_constructor() {
        let k = Key::with_default_group("job1");
        assert_eq!(k.group(), DEFAULT_GROUP);
    }

    #[test]
    #[should_panic(expected = "key name must not be empty")]
    fn empty_name_panics() {
        Key::new("", "g");
    }

    #[test]
    #[should_panic(expected = "key group must not be empty")]
    fn empty_group_panics() {
        Key::new("n", "");
    }

    #[test]
    fn ordering_is_group_then_name() {
        let a = Key::new("b", "g1");
        let b = Key::new("a", "g2");
        assert!(a < b);
    }
}
