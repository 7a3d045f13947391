//! Prelude module for Trellis.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use trellis::prelude::*;
//! ```
//!
//! This provides access to:
//! - The data-source arena (`DataSourceTree`, `DataSourceId`)
//! - Locations (`IndexPath`, `SectionSet`)
//! - Content sources (`ContentProvider`, `LoadRequest`, `StaticContent`)
//! - List control delivery (`ListControlSink`, `UpdateOperation`)

// ============================================================================
// Errors and Signals
// ============================================================================

pub use crate::{DataSourceError, LoadFailure, Result, Signal};

// ============================================================================
// Data Sources
// ============================================================================

pub use crate::model::{
    Capabilities, DataSourceEvent, DataSourceId, DataSourceKind, DataSourceTree, TreeConfig,
};

// ============================================================================
// Locations and Updates
// ============================================================================

pub use crate::model::{IndexPath, SectionSet, UpdateOperation};

// ============================================================================
// Content and Loading
// ============================================================================

pub use crate::model::{
    ContentProvider, LoadOutcome, LoadRequest, LoadingState, Placeholder, StaticContent,
};

// ============================================================================
// List Control Delivery
// ============================================================================

pub use crate::model::{ListControlSink, RecordingSink};
