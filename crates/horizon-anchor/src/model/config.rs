//! Configuration for persistent index bookkeeping.

/// What happens to a persistent index when the model cannot resolve the
/// position it should move to after a structural change.
///
/// This indicates a defect in the model's `index()` implementation. The
/// record is never reinserted into the registry either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveFailurePolicy {
    /// Keep the record attached to the model but pointing at the invalid index.
    #[default]
    Orphan,
    /// Treat the record like a removed item: invalid and detached.
    Detach,
}

/// Configuration for a model's persistent index registry.
///
/// # Example
///
/// ```
/// use horizon_anchor::model::{PersistenceConfig, ResolveFailurePolicy};
///
/// let config = PersistenceConfig::default()
///     .with_max_ancestor_depth(64)
///     .with_resolve_failure(ResolveFailurePolicy::Detach)
///     .with_strict_checks(false);
/// assert_eq!(config.max_ancestor_depth, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Maximum number of parent hops taken while classifying a record during
    /// removal. Walks that exceed it leave the record unaffected and log an
    /// error; a cyclic `parent()` implementation is the usual cause.
    pub max_ancestor_depth: usize,
    /// Handling of records whose new position cannot be resolved.
    pub resolve_failure: ResolveFailurePolicy,
    /// Panic on protocol usage errors and registry consistency violations
    /// instead of logging them. Enabled by default in debug builds.
    pub strict_checks: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_ancestor_depth: 4096,
            resolve_failure: ResolveFailurePolicy::default(),
            strict_checks: cfg!(debug_assertions),
        }
    }
}

impl PersistenceConfig {
    /// Creates a configuration that only logs violations, regardless of build
    /// profile.
    pub fn lenient() -> Self {
        Self {
            strict_checks: false,
            ..Default::default()
        }
    }

    /// Sets the maximum ancestor walk depth.
    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth;
        self
    }

    /// Sets the resolve failure policy.
    pub fn with_resolve_failure(mut self, policy: ResolveFailurePolicy) -> Self {
        self.resolve_failure = policy;
        self
    }

    /// Enables or disables strict checks.
    pub fn with_strict_checks(mut self, strict: bool) -> Self {
        self.strict_checks = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PersistenceConfig::default();
        assert_eq!(config.max_ancestor_depth, 4096);
        assert_eq!(config.resolve_failure, ResolveFailurePolicy::Orphan);
        assert_eq!(config.strict_checks, cfg!(debug_assertions));
    }

    #[test]
    fn test_lenient() {
        let config = PersistenceConfig::lenient();
        assert!(!config.strict_checks);
        assert_eq!(config.max_ancestor_depth, 4096);
    }
}
