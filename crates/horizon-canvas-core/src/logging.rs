//! Tracing targets used by the canvas core.
//!
//! Horizon Canvas uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_canvas_core::history=debug")
//!     .init();
//! ```
//!
//! Every log statement in this crate names one of the [`targets`] below, so
//! subsystems can be filtered independently.

/// Target names for log filtering.
pub mod targets {
    /// Layer store mutations.
    pub const STORE: &str = "horizon_canvas_core::store";
    /// Filter recomputation.
    pub const FILTER: &str = "horizon_canvas_core::filter";
    /// Export compositing and live preview.
    pub const COMPOSITE: &str = "horizon_canvas_core::composite";
    /// Snapshot capture and undo/redo.
    pub const HISTORY: &str = "horizon_canvas_core::history";
    /// Editor session operations.
    pub const SESSION: &str = "horizon_canvas_core::session";
    /// Canvas tools (brush, eraser, crop, move, scale).
    pub const TOOLS: &str = "horizon_canvas_core::tools";
    /// Timing spans around whole-buffer work.
    pub const PERF: &str = "horizon_canvas_core::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used around whole-buffer work (export compositing, blur) to time it.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new performance span named after `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_crate_paths() {
        let crate_name = module_path!().split("::").next().unwrap();
        for target in [
            targets::STORE,
            targets::FILTER,
            targets::COMPOSITE,
            targets::HISTORY,
            targets::SESSION,
            targets::TOOLS,
            targets::PERF,
        ] {
            assert!(target.starts_with(&format!("{crate_name}::")), "{target}");
        }
    }

    #[test]
    fn test_perf_span_enters() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let guard = PerfSpan::new("test");
        drop(guard);
    }
}
