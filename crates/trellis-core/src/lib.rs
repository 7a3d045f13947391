//! Core systems for Trellis.
//!
//! This crate provides the infrastructure the data-source layer is built on:
//!
//! - **Signal/Slot System**: Synchronous observer notifications for hosts
//! - **Errors**: The error taxonomy shared by every data-source operation
//! - **Logging**: `tracing` targets, span names and tree formatting options
//!
//! # Signal/Slot Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! let sections_changed = Signal::<usize>::new();
//!
//! let conn_id = sections_changed.connect(|count| {
//!     println!("Now showing {} sections", count);
//! });
//!
//! sections_changed.emit(3);
//! sections_changed.disconnect(conn_id);
//! ```

mod error;
pub mod logging;
pub mod signal;

pub use error::{DataSourceError, LoadFailure, Result};
pub use logging::{PerfSpan, TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
