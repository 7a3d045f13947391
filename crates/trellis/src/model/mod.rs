//! Composable data sources for list and grid controls.
//!
//! A list control asks one *root* data source for sections and items. The
//! root may be a plain leaf, or a composite built from other data sources:
//!
//! - a **segmented** composite shows one child at a time (think tabs),
//! - an **aggregate** composite shows all its children's sections in order.
//!
//! Every data source lives in a [`DataSourceTree`] and is addressed by its
//! [`DataSourceId`]. Mutations are reported by the data source that made them
//! in its own coordinates; the tree translates them into root coordinates and
//! delivers them to the root's [`ListControlSink`] in atomic batches.
//!
//! # Core Types
//!
//! - [`IndexPath`], [`SectionSet`]: locations in a data source
//! - [`LoadingState`], [`LoadingStateMachine`]: the content loading lifecycle
//! - [`UpdateOperation`], [`PendingUpdateQueue`]: batched mutations
//! - [`SectionMap`]: section remapping for aggregates
//! - [`ContentProvider`], [`LoadRequest`]: where leaf content comes from
//! - [`Placeholder`]: what to show instead of items
//!
//! # Example
//!
//! ```no_run
//! use trellis::model::{DataSourceTree, IndexPath, RecordingSink, StaticContent};
//!
//! let mut tree = DataSourceTree::new();
//! let root = tree.create_aggregate("Library");
//! let books = tree.create_leaf("Books", StaticContent::single_section(vec!["Dune", "Emma"]));
//! let films = tree.create_static("Films", vec![vec!["Alien"]]);
//!
//! let sink = RecordingSink::new();
//! tree.set_sink(root, sink.clone())?;
//! tree.add_data_source(root, books)?;
//! tree.add_data_source(root, films)?;
//!
//! assert_eq!(tree.number_of_sections(root)?, 2);
//! assert_eq!(*tree.item(root, IndexPath::new(1, 0))?, "Alien");
//!
//! // Films inserts an item in its own section 0, which is section 1 of the root.
//! tree.insert_items(films, 0, 1, vec!["Brazil"])?;
//! # Ok::<(), trellis_core::DataSourceError>(())
//! ```
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────┐ local ops ┌─────────────┐ global ops ┌──────────────┐
//! │   Leaf   │──────────>│  Composite  │───────────>│ Root queue   │
//! │ (items)  │           │ (SectionMap)│            │ (batching)   │
//! └──────────┘           └─────────────┘            └──────┬───────┘
//!                                                          │ flush
//!                                                   ┌──────▼───────┐
//!                                                   │ ListControl  │
//!                                                   │    Sink      │
//!                                                   └──────────────┘
//! ```

mod aggregate;
mod config;
mod content;
mod debug;
mod index;
mod lifecycle;
mod loading;
mod placeholder;
mod provider;
mod remap;
mod segmented;
mod sink;
mod tree;
mod update;

pub use config::{TreeConfig, TreeConfigBuilder};
pub use debug::DataSourceTreeDebug;
pub use index::{IndexPath, SectionSet};
pub use loading::{LoadOutcome, LoadingState, LoadingStateMachine, WhenLoaded};
pub use placeholder::{Placeholder, PlaceholderContent};
pub use provider::{ContentProvider, LoadRequest, LoadResult, Sections, StaticContent};
pub use remap::SectionMap;
pub use sink::{ListControlSink, RecordingSink, SinkEvent, UpdateCompletion};
pub use tree::{Capabilities, DataSourceEvent, DataSourceId, DataSourceKind, DataSourceTree};
pub use update::{ApplyOrder, BatchScope, OperationKind, PendingUpdateQueue, Transaction, UpdateOperation};
