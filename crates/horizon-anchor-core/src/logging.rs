//! Logging facilities for Horizon Anchor.
//!
//! Horizon Anchor uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_anchor::persistent=debug")
//!         .init();
//! }
//! ```
//!
//! Model diagnostics are emitted under the targets in [`targets`]. Resolver
//! inconsistencies are logged at `warn`, protocol and bookkeeping violations at
//! `error`, and every registry sweep runs inside a `trace`-level span.

/// Span names used throughout Horizon Anchor for tracing.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// Signal emission span.
    pub const SIGNAL: &str = "horizon_anchor::signal";
    /// Performance measurement span.
    pub const PERF: &str = "horizon_anchor::perf";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_anchor_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_anchor_core::signal";
    /// Model protocol target (begin/end brackets, usage errors).
    pub const MODEL: &str = "horizon_anchor::model";
    /// Persistent index registry target.
    pub const PERSISTENT: &str = "horizon_anchor::persistent";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to measure the duration of registry sweeps.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::trace_span!(target: span_names::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        // Just ensure it doesn't panic with a subscriber installed
        let _span = PerfSpan::new("test_operation");
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::SIGNAL, targets::MODEL, targets::PERSISTENT] {
            assert!(target.starts_with("horizon_anchor"));
        }
        assert_eq!(span_names::PERF, "horizon_anchor::perf");
    }
}
