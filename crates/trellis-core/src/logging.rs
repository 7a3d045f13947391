//! Logging and debugging facilities for Trellis.
//!
//! This module provides:
//! - Target and span names for filtering the `tracing` output of each subsystem
//! - Formatting options shared by the data-source tree visualiser
//! - Performance tracing hooks for profiling flushes and loads
//!
//! # Tracing Integration
//!
//! Trellis uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("trellis::update=trace,trellis::loading=debug")
//!     .init();
//! ```

/// Span names used throughout Trellis for tracing.
pub mod span_names {
    /// Flushing a pending update queue to a list-control sink.
    pub const FLUSH: &str = "trellis::flush";
    /// Starting a content load.
    pub const LOAD: &str = "trellis::load";
    /// Running an explicit batch update scope.
    pub const BATCH: &str = "trellis::batch";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "trellis::signal";
    /// Data-source tree structure (creation, ownership, destruction).
    pub const TREE: &str = "trellis::tree";
    /// Mutation notification channel and batching.
    pub const UPDATE: &str = "trellis::update";
    /// Index path remapping between composites and their children.
    pub const REMAP: &str = "trellis::remap";
    /// Loading state machine transitions.
    pub const LOADING: &str = "trellis::loading";
    /// Performance spans.
    pub const PERF: &str = "trellis::perf";
}

/// Style options for tree visualisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact dash-prefixed representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualisation.
    pub style: TreeStyle,
    /// Whether to show node ids.
    pub show_ids: bool,
    /// Whether to show loading states.
    pub show_states: bool,
    /// Whether to show section counts.
    pub show_counts: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            show_states: true,
            show_counts: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_ids: true,
            ..Default::default()
        }
    }

    /// Options for minimal output: titles and structure only.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_states: false,
            show_counts: false,
            ..Default::default()
        }
    }

    /// Build the line prefix for a node at `depth`.
    pub fn prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to measure how long flushes and loads take.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[macro_export]
macro_rules! trellis_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "trellis", $($arg)*)
    };
}

#[macro_export]
macro_rules! trellis_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "trellis", $($arg)*)
    };
}

#[macro_export]
macro_rules! trellis_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "trellis", $($arg)*)
    };
}
