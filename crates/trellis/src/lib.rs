//! Trellis - composable data sources for list and grid controls.
//!
//! This is the main umbrella crate. It re-exports the core systems from
//! `trellis-core` and provides the data-source layer in [`model`].
//!
//! # Example
//!
//! ```no_run
//! use trellis::prelude::*;
//!
//! fn main() -> trellis::Result<()> {
//!     let mut tree = DataSourceTree::new();
//!     let tabs = tree.create_segmented("Tabs");
//!     let recent = tree.create_static("Recent", vec![vec!["a", "b"]]);
//!     let starred = tree.create_static("Starred", vec![vec!["c"]]);
//!     tree.add_data_source(tabs, recent)?;
//!     tree.add_data_source(tabs, starred)?;
//!
//!     tree.set_sink(tabs, RecordingSink::new())?;
//!     tree.set_selected_index(tabs, 1)?;
//!     assert_eq!(tree.number_of_items(tabs, 0)?, 1);
//!     Ok(())
//! }
//! ```

pub use trellis_core::*;

pub mod model;
pub mod prelude;
