//! The data-source tree.
//!
//! A [`DataSourceTree`] owns every data source of one or more list controls
//! in an arena. Leaves own their items; segmented and aggregate composites
//! own their children by id, and each child refers back to its composite
//! through a non-owning parent id. Destroying a composite destroys its whole
//! subtree.
//!
//! Mutations are reported by the data source that made them, in its own
//! (local) coordinates. The tree relays them upward, remapping sections at
//! every aggregate on the way, and collects them in the root's
//! [`PendingUpdateQueue`]. When the root's batch scope closes, the queue is
//! flushed to the root's [`ListControlSink`] as one transaction.
//!
//! ```text
//!        root (aggregate) ──flush──> ListControlSink
//!         │            ▲
//!   leaf A│  leaf B    │ sections + offset(B)
//!         │    └───────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crossbeam_channel::{Receiver, Sender};
use slotmap::{SlotMap, new_key_type};

use trellis_core::logging::{span_names, targets};
use trellis_core::{DataSourceError, LoadFailure, PerfSpan, Result, Signal};

use super::config::TreeConfig;
use super::index::{IndexPath, SectionSet};
use super::loading::LoadingStateMachine;
use super::placeholder::PlaceholderContent;
use super::provider::{Completion, ContentProvider, Sections};
use super::remap::SectionMap;
use super::sink::{ListControlSink, UpdateCompletion};
use super::update::{BatchScope, OperationKind, PendingUpdateQueue, Transaction, UpdateOperation};

new_key_type! {
    /// Identifies a data source within its [`DataSourceTree`].
    ///
    /// Ids stay valid until the data source is destroyed, either directly or
    /// by removal from its composite. Lookups with a stale id fail with
    /// [`DataSourceError::InvalidDataSource`].
    pub struct DataSourceId;
}

/// The three kinds of data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceKind {
    /// Owns sections of items.
    Leaf,
    /// Shows exactly one of its children at a time.
    Segmented,
    /// Shows all of its children's sections one after the other.
    Aggregate,
}

impl DataSourceKind {
    /// Returns `true` for segmented and aggregate data sources.
    pub fn is_composite(self) -> bool {
        self != Self::Leaf
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Segmented => write!(f, "segmented"),
            Self::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// What the user may do with a leaf's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Items may be deleted through [`DataSourceTree::remove_item`].
    pub editable: bool,
    /// Items may be reordered through [`DataSourceTree::move_item`].
    pub movable: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            editable: true,
            movable: false,
        }
    }
}

impl Capabilities {
    /// Neither editable nor movable.
    pub fn read_only() -> Self {
        Self {
            editable: false,
            movable: false,
        }
    }

    /// Sets whether items can be moved.
    pub fn with_movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    /// Sets whether items can be deleted.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }
}

/// Events emitted through [`DataSourceTree::events`].
///
/// Update events carry root coordinates and are emitted when a transaction
/// is flushed, whether or not a sink is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceEvent {
    /// A batch scope was opened or announced on a root.
    WillBatchUpdate {
        /// The root whose scope opened.
        root: DataSourceId,
    },
    /// One operation of a flushed transaction.
    Update {
        /// The root that flushed.
        root: DataSourceId,
        /// The operation, in root coordinates.
        operation: UpdateOperation,
    },
    /// A root flushed a full reload.
    DidReloadData {
        /// The root that reloaded.
        root: DataSourceId,
    },
    /// A data source entered the loading state.
    WillLoadContent {
        /// The data source being loaded.
        source: DataSourceId,
    },
    /// A data source's load cycle ended.
    DidLoadContent {
        /// The data source that finished.
        source: DataSourceId,
        /// The failure, if the load failed.
        error: Option<LoadFailure>,
    },
    /// Whether a data source is hidden behind a placeholder changed.
    PlaceholderChanged {
        /// The affected data source.
        source: DataSourceId,
        /// `true` if it is now obscured.
        obscured: bool,
    },
    /// A segmented data source changed its selected child.
    SelectionChanged {
        /// The segmented data source.
        source: DataSourceId,
        /// The new selected index.
        selected: Option<usize>,
    },
}

pub(super) enum Content<T> {
    Leaf {
        sections: Sections<T>,
        provider: Option<Box<dyn ContentProvider<T>>>,
    },
    Segmented {
        children: Vec<DataSourceId>,
        selected: Option<usize>,
    },
    Aggregate {
        children: Vec<DataSourceId>,
    },
}

impl<T> Content<T> {
    pub(super) fn kind(&self) -> DataSourceKind {
        match self {
            Self::Leaf { .. } => DataSourceKind::Leaf,
            Self::Segmented { .. } => DataSourceKind::Segmented,
            Self::Aggregate { .. } => DataSourceKind::Aggregate,
        }
    }

    pub(super) fn children(&self) -> &[DataSourceId] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Segmented { children, .. } | Self::Aggregate { children } => children,
        }
    }
}

/// An aggregate's children and section layout as they were when the root's
/// batch scope opened.
pub(super) struct FrozenLayout {
    children: Vec<DataSourceId>,
    map: SectionMap,
}

impl FrozenLayout {
    fn range_of(&self, child: DataSourceId) -> Option<Range<usize>> {
        let ordinal = self.children.iter().position(|&c| c == child)?;
        self.map.child_range(ordinal).ok()
    }
}

/// Work passed to `perform_update` while its data source was loading.
pub(super) struct DeferredUpdate<T> {
    pub(super) work: Box<dyn FnOnce(&mut DataSourceTree<T>) -> Result<()>>,
    pub(super) on_complete: Option<UpdateCompletion>,
}

pub(super) struct Node<T> {
    pub(super) title: String,
    pub(super) parent: Option<DataSourceId>,
    pub(super) content: Content<T>,
    pub(super) loading: LoadingStateMachine,
    pub(super) capabilities: Capabilities,
    pub(super) no_content: PlaceholderContent,
    pub(super) error: PlaceholderContent,
    /// Last obscured flag reported through `PlaceholderChanged`.
    pub(super) obscured: bool,
    pub(super) needs_load: bool,
    pub(super) deferred: Vec<DeferredUpdate<T>>,
    // Only used while the node is a root.
    pub(super) queue: PendingUpdateQueue,
    pub(super) sink: Option<Box<dyn ListControlSink>>,
    pub(super) layouts: HashMap<DataSourceId, FrozenLayout>,
}

impl<T> Node<T> {
    fn new(title: String, content: Content<T>) -> Self {
        Self {
            title,
            parent: None,
            content,
            loading: LoadingStateMachine::new(),
            capabilities: Capabilities::default(),
            no_content: PlaceholderContent::default(),
            error: PlaceholderContent::default(),
            obscured: false,
            needs_load: false,
            deferred: Vec::new(),
            queue: PendingUpdateQueue::new(),
            sink: None,
            layouts: HashMap::new(),
        }
    }
}

/// Logs a rejected operation at the level matching its error.
pub(super) fn log_failure(operation: &'static str) -> impl Fn(&DataSourceError) {
    move |error| {
        if error.is_programming_error() {
            tracing::warn!(target: targets::TREE, operation, %error, "data source operation rejected");
        } else {
            tracing::debug!(target: targets::TREE, operation, %error, "data source operation failed");
        }
    }
}

/// One section operation of `kind` per section in `sections`.
pub(super) fn section_ops(kind: OperationKind, sections: std::ops::Range<usize>) -> Vec<UpdateOperation> {
    UpdateOperation::sections_of(kind, &SectionSet::from(sections))
}

/// Arena owning a forest of data sources.
///
/// All operations take data source ids. Queries and item-level edits accept
/// any data source and address items in its coordinate space; composites
/// forward them to the child that owns the addressed section.
pub struct DataSourceTree<T> {
    pub(super) nodes: SlotMap<DataSourceId, Node<T>>,
    pub(super) config: TreeConfig,
    pub(super) events: Signal<DataSourceEvent>,
    pub(super) sender: Sender<Completion<T>>,
    pub(super) receiver: Receiver<Completion<T>>,
}

impl<T: 'static> Default for DataSourceTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> DataSourceTree<T> {
    /// Creates an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Creates an empty tree.
    pub fn with_config(config: TreeConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        trellis_core::trellis_debug!(
            apply_order = ?config.apply_order,
            drain_completions_on_load = config.drain_completions_on_load,
            "data source tree created"
        );
        Self {
            nodes: SlotMap::with_key(),
            config,
            events: Signal::new(),
            sender,
            receiver,
        }
    }

    /// The tree's configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The signal every [`DataSourceEvent`] is emitted through.
    pub fn events(&self) -> &Signal<DataSourceEvent> {
        &self.events
    }

    /// Number of live data sources.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds no data source.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` refers to a live data source.
    pub fn contains(&self, id: DataSourceId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every data source without a parent.
    pub fn roots(&self) -> Vec<DataSourceId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Creation and destruction
    // ------------------------------------------------------------------

    /// Creates a leaf whose content comes from `provider`.
    ///
    /// The leaf starts empty and in the `Initial` state.
    pub fn create_leaf<P>(&mut self, title: impl Into<String>, provider: P) -> DataSourceId
    where
        P: ContentProvider<T> + 'static,
    {
        self.insert_node(
            title.into(),
            Content::Leaf {
                sections: Vec::new(),
                provider: Some(Box::new(provider)),
            },
        )
    }

    /// Creates a leaf that already holds `sections`.
    ///
    /// Loading a static leaf completes immediately with the content it holds
    /// at that moment.
    pub fn create_static(&mut self, title: impl Into<String>, sections: Sections<T>) -> DataSourceId {
        self.insert_node(
            title.into(),
            Content::Leaf {
                sections,
                provider: None,
            },
        )
    }

    /// Creates an empty segmented composite.
    pub fn create_segmented(&mut self, title: impl Into<String>) -> DataSourceId {
        self.insert_node(
            title.into(),
            Content::Segmented {
                children: Vec::new(),
                selected: None,
            },
        )
    }

    /// Creates an empty aggregate composite.
    pub fn create_aggregate(&mut self, title: impl Into<String>) -> DataSourceId {
        self.insert_node(
            title.into(),
            Content::Aggregate {
                children: Vec::new(),
            },
        )
    }

    fn insert_node(&mut self, title: String, content: Content<T>) -> DataSourceId {
        let kind = content.kind();
        let id = self.nodes.insert(Node::new(title, content));
        tracing::trace!(target: targets::TREE, ?id, %kind, "created data source");
        id
    }

    /// Destroys a data source and everything beneath it.
    ///
    /// A data source that belongs to a composite is removed from it first,
    /// with the same notifications as [`remove_data_source`].
    ///
    /// [`remove_data_source`]: Self::remove_data_source
    #[tracing::instrument(skip(self), target = "trellis::tree", level = "trace")]
    pub fn destroy(&mut self, id: DataSourceId) -> Result<()> {
        match self.node(id)?.parent {
            Some(parent) => self.remove_data_source(parent, id),
            None => {
                self.destroy_subtree(id);
                Ok(())
            }
        }
    }

    /// Removes `id` and its descendants from the arena without notifying.
    pub(super) fn destroy_subtree(&mut self, id: DataSourceId) {
        let mut doomed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                stack.extend_from_slice(node.content.children());
                doomed.push(current);
            }
        }
        tracing::trace!(target: targets::TREE, ?id, count = doomed.len(), "destroying data source subtree");
        for current in doomed {
            self.nodes.remove(current);
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub(super) fn node(&self, id: DataSourceId) -> Result<&Node<T>> {
        self.nodes.get(id).ok_or(DataSourceError::InvalidDataSource)
    }

    pub(super) fn node_mut(&mut self, id: DataSourceId) -> Result<&mut Node<T>> {
        self.nodes.get_mut(id).ok_or(DataSourceError::InvalidDataSource)
    }

    /// The kind of a data source.
    pub fn kind(&self, id: DataSourceId) -> Result<DataSourceKind> {
        Ok(self.node(id)?.content.kind())
    }

    /// The composite `id` belongs to, if any.
    pub fn parent(&self, id: DataSourceId) -> Result<Option<DataSourceId>> {
        Ok(self.node(id)?.parent)
    }

    /// A composite's children in order. Leaves have none.
    pub fn children(&self, id: DataSourceId) -> Result<&[DataSourceId]> {
        Ok(self.node(id)?.content.children())
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: DataSourceId) -> Result<DataSourceId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: DataSourceId, id: DataSourceId) -> bool {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|node| node.parent);
        }
        false
    }

    /// The display title.
    pub fn title(&self, id: DataSourceId) -> Result<&str> {
        Ok(&self.node(id)?.title)
    }

    /// Changes the display title.
    pub fn set_title(&mut self, id: DataSourceId, title: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.title = title.into();
        Ok(())
    }

    /// The data source's editing capabilities.
    pub fn capabilities(&self, id: DataSourceId) -> Result<Capabilities> {
        Ok(self.node(id)?.capabilities)
    }

    /// Replaces the data source's editing capabilities.
    pub fn set_capabilities(&mut self, id: DataSourceId, capabilities: Capabilities) -> Result<()> {
        self.node_mut(id)?.capabilities = capabilities;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Composite membership
    // ------------------------------------------------------------------

    /// Appends `child` to a composite.
    ///
    /// # Errors
    ///
    /// - [`DataSourceError::NotAComposite`] if `composite` is a leaf.
    /// - [`DataSourceError::AlreadyOwned`] if `child` belongs to a composite.
    /// - [`DataSourceError::CircularOwnership`] if `child` is `composite` or
    ///   one of its ancestors.
    pub fn add_data_source(&mut self, composite: DataSourceId, child: DataSourceId) -> Result<()> {
        let result = match self.kind(composite)? {
            DataSourceKind::Leaf => Err(DataSourceError::NotAComposite),
            DataSourceKind::Segmented => self.add_segment(composite, child),
            DataSourceKind::Aggregate => {
                let end = self.children(composite)?.len();
                self.insert_data_source(composite, end, child)
            }
        };
        result.inspect_err(log_failure("add_data_source"))
    }

    /// Removes `child` from a composite and destroys it.
    pub fn remove_data_source(&mut self, composite: DataSourceId, child: DataSourceId) -> Result<()> {
        let result = match self.kind(composite)? {
            DataSourceKind::Leaf => Err(DataSourceError::NotAComposite),
            DataSourceKind::Segmented => self.remove_segment(composite, child),
            DataSourceKind::Aggregate => self.remove_aggregated(composite, child),
        };
        result.inspect_err(log_failure("remove_data_source"))
    }

    /// Removes and destroys every child of a composite.
    pub fn remove_all_data_sources(&mut self, composite: DataSourceId) -> Result<()> {
        let result = match self.kind(composite)? {
            DataSourceKind::Leaf => Err(DataSourceError::NotAComposite),
            DataSourceKind::Segmented => self.remove_all_segments(composite),
            DataSourceKind::Aggregate => self.remove_all_aggregated(composite),
        };
        result.inspect_err(log_failure("remove_all_data_sources"))
    }

    /// Checks that `child` may become a member of `composite`.
    pub(super) fn check_adoption(&self, composite: DataSourceId, child: DataSourceId) -> Result<()> {
        self.node(composite)?;
        let node = self.node(child)?;
        if child == composite || self.is_ancestor(child, composite) {
            return Err(DataSourceError::CircularOwnership);
        }
        if node.parent.is_some() {
            return Err(DataSourceError::AlreadyOwned);
        }
        Ok(())
    }

    /// Makes `composite` the parent of `child`.
    ///
    /// Anything the child collected as a root is flushed to its own sink
    /// first, and the sink is then released.
    pub(super) fn adopt(&mut self, composite: DataSourceId, child: DataSourceId) -> Result<()> {
        if self.node(child)?.queue.is_collecting() {
            self.flush(child, None)?;
        }
        let node = self.node_mut(child)?;
        node.parent = Some(composite);
        if node.sink.take().is_some() {
            tracing::debug!(target: targets::TREE, ?child, "released sink of adopted data source");
        }
        tracing::debug!(target: targets::TREE, ?composite, ?child, "data source adopted");
        Ok(())
    }

    /// Position of `child` in `composite`'s children.
    pub(super) fn position_of(&self, composite: DataSourceId, child: DataSourceId) -> Result<usize> {
        self.children(composite)?
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| DataSourceError::invalid_argument("data source is not a child of the composite"))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Section count of a live data source, zero for unknown ids.
    pub(super) fn section_count(&self, id: DataSourceId) -> usize {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        match &node.content {
            Content::Leaf { sections, .. } => sections.len(),
            Content::Segmented { children, selected } => selected
                .and_then(|i| children.get(i))
                .map_or(0, |&child| self.section_count(child)),
            Content::Aggregate { children } => children.iter().map(|&child| self.section_count(child)).sum(),
        }
    }

    /// Number of sections the data source presents.
    ///
    /// A segmented composite presents its selected child's sections; an
    /// aggregate presents the sum of its children's.
    pub fn number_of_sections(&self, id: DataSourceId) -> Result<usize> {
        self.node(id)?;
        Ok(self.section_count(id))
    }

    /// Number of items in `section`.
    ///
    /// Counts are reported even while the data source is obscured by a
    /// placeholder; hosts check [`obscured_by_placeholder`] first.
    ///
    /// [`obscured_by_placeholder`]: Self::obscured_by_placeholder
    pub fn number_of_items(&self, id: DataSourceId, section: usize) -> Result<usize> {
        let (leaf, local) = self.resolve_section(id, section)?;
        Ok(self.leaf_sections(leaf)?.get(local).map_or(0, Vec::len))
    }

    /// The item at `path`.
    pub fn item(&self, id: DataSourceId, path: IndexPath) -> Result<&T> {
        let (leaf, local) = self.resolve_index_path(id, path)?;
        let sections = self.leaf_sections(leaf)?;
        sections
            .get(local.section())
            .and_then(|items| items.get(local.item()))
            .ok_or(DataSourceError::IndexOutOfRange {
                section: path.section(),
                item: path.item(),
            })
    }

    /// The leaf owning `section` of `id`. A leaf returns itself.
    pub fn data_source_for_section(&self, id: DataSourceId, section: usize) -> Result<DataSourceId> {
        self.resolve_section(id, section).map(|(leaf, _)| leaf)
    }

    /// The layout of an aggregate's children.
    pub fn section_map(&self, aggregate: DataSourceId) -> Result<SectionMap> {
        match &self.node(aggregate)?.content {
            Content::Aggregate { children } => Ok(SectionMap::new(
                children.iter().map(|&child| self.section_count(child)),
            )),
            _ => Err(DataSourceError::invalid_argument("not an aggregate data source")),
        }
    }

    /// Maps a composite path to the direct child owning it and the child's
    /// local path.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::NotAComposite`] for leaves, and
    /// [`DataSourceError::SectionOutOfRange`] when no child owns the section.
    pub fn local_index_path(&self, composite: DataSourceId, global: IndexPath) -> Result<(DataSourceId, IndexPath)> {
        match &self.node(composite)?.content {
            Content::Leaf { .. } => Err(DataSourceError::NotAComposite),
            Content::Segmented { children, selected } => selected
                .and_then(|i| children.get(i))
                .map(|&child| (child, global))
                .ok_or(DataSourceError::SectionOutOfRange {
                    section: global.section(),
                    count: 0,
                }),
            Content::Aggregate { children } => {
                let (ordinal, local) = self.section_map(composite)?.local_index_path(global)?;
                let child = children.get(ordinal).copied().ok_or(DataSourceError::InvalidDataSource)?;
                Ok((child, local))
            }
        }
    }

    /// Maps a path all the way down to the owning leaf.
    pub fn resolve_index_path(&self, id: DataSourceId, path: IndexPath) -> Result<(DataSourceId, IndexPath)> {
        let (leaf, section) = self.resolve_section(id, path.section())?;
        let count = self.leaf_sections(leaf)?.get(section).map_or(0, Vec::len);
        if path.item() >= count {
            return Err(DataSourceError::IndexOutOfRange {
                section: path.section(),
                item: path.item(),
            });
        }
        Ok((leaf, path.with_section(section)))
    }

    /// Maps a data source's local path to its root's coordinates.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::InvalidArgument`] if the data source is not
    /// displayed because a segmented ancestor selects a different child.
    pub fn global_index_path(&self, id: DataSourceId, local: IndexPath) -> Result<IndexPath> {
        match self.lift(id)? {
            Some((_, offset)) => Ok(local.offset_section(offset)),
            None => Err(DataSourceError::invalid_argument("data source is not displayed")),
        }
    }

    /// Descends from `id` to the leaf owning `section`.
    pub(super) fn resolve_section(&self, id: DataSourceId, section: usize) -> Result<(DataSourceId, usize)> {
        let mut current = id;
        let mut section = section;
        loop {
            match &self.node(current)?.content {
                Content::Leaf { sections, .. } => {
                    if section >= sections.len() {
                        return Err(DataSourceError::SectionOutOfRange {
                            section,
                            count: sections.len(),
                        });
                    }
                    return Ok((current, section));
                }
                Content::Segmented { children, selected } => {
                    current = selected
                        .and_then(|i| children.get(i))
                        .copied()
                        .ok_or(DataSourceError::SectionOutOfRange { section, count: 0 })?;
                }
                Content::Aggregate { children } => {
                    let (ordinal, local) = self.section_map(current)?.local_section(section)?;
                    current = children.get(ordinal).copied().ok_or(DataSourceError::InvalidDataSource)?;
                    section = local;
                }
            }
        }
    }

    pub(super) fn leaf_sections(&self, id: DataSourceId) -> Result<&Sections<T>> {
        match &self.node(id)?.content {
            Content::Leaf { sections, .. } => Ok(sections),
            _ => Err(DataSourceError::NotALeaf),
        }
    }

    pub(super) fn leaf_sections_mut(&mut self, id: DataSourceId) -> Result<&mut Sections<T>> {
        match &mut self.node_mut(id)?.content {
            Content::Leaf { sections, .. } => Ok(sections),
            _ => Err(DataSourceError::NotALeaf),
        }
    }

    /// The root of `id` and the section offset of `id` within it, or `None`
    /// when a segmented ancestor hides `id`.
    ///
    /// While a batch scope is open, aggregates that existed when it opened
    /// report the offsets they had at that moment.
    pub(super) fn lift(&self, id: DataSourceId) -> Result<Option<(DataSourceId, usize)>> {
        let root = self.root_of(id)?;
        let frozen = &self.node(root)?.layouts;
        let mut current = id;
        let mut offset = 0;
        while let Some(parent) = self.node(current)?.parent {
            match &self.node(parent)?.content {
                Content::Segmented { children, selected } => {
                    if selected.and_then(|i| children.get(i)) != Some(&current) {
                        return Ok(None);
                    }
                }
                Content::Aggregate { .. } => {
                    offset += match frozen.get(&parent).and_then(|layout| layout.range_of(current)) {
                        Some(range) => range.start,
                        None => {
                            let ordinal = self.position_of(parent, current)?;
                            self.section_map(parent)?.offset(ordinal)?
                        }
                    };
                }
                Content::Leaf { .. } => return Err(DataSourceError::InvalidDataSource),
            }
            current = parent;
        }
        Ok(Some((current, offset)))
    }

    /// Global sections `child` occupies within `aggregate`, as frozen when
    /// the batch scope opened if it was a child then.
    pub(super) fn frozen_range(&self, aggregate: DataSourceId, child: DataSourceId) -> Result<Range<usize>> {
        let root = self.root_of(aggregate)?;
        match self
            .node(root)?
            .layouts
            .get(&aggregate)
            .and_then(|layout| layout.range_of(child))
        {
            Some(range) => Ok(range),
            None => self.child_section_range(aggregate, child),
        }
    }

    /// Total sections of `aggregate` as frozen when the batch scope opened.
    pub(super) fn frozen_section_count(&self, aggregate: DataSourceId) -> Result<usize> {
        let root = self.root_of(aggregate)?;
        Ok(match self.node(root)?.layouts.get(&aggregate) {
            Some(layout) => layout.map.total_sections(),
            None => self.section_count(aggregate),
        })
    }

    /// Records the layout of every aggregate below `root`, so that
    /// operations reported during the scope are remapped into the
    /// coordinates that existed before it.
    fn freeze_layouts(&mut self, root: DataSourceId) -> Result<()> {
        let mut layouts = HashMap::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if let Content::Aggregate { children } = &node.content {
                layouts.insert(
                    id,
                    FrozenLayout {
                        children: children.clone(),
                        map: self.section_map(id)?,
                    },
                );
            }
            stack.extend_from_slice(node.content.children());
        }
        tracing::trace!(target: targets::REMAP, ?root, aggregates = layouts.len(), "layouts frozen");
        self.node_mut(root)?.layouts = layouts;
        Ok(())
    }

    /// Every path of `id` holding an item equal to `item`.
    pub fn index_paths_for_item(&self, id: DataSourceId, item: &T) -> Result<Vec<IndexPath>>
    where
        T: PartialEq,
    {
        match &self.node(id)?.content {
            Content::Leaf { sections, .. } => Ok(sections
                .iter()
                .enumerate()
                .flat_map(|(section, items)| {
                    items
                        .iter()
                        .enumerate()
                        .filter(move |(_, candidate)| *candidate == item)
                        .map(move |(index, _)| IndexPath::new(section, index))
                })
                .collect()),
            Content::Segmented { children, selected } => match selected.and_then(|i| children.get(i)) {
                Some(&child) => self.index_paths_for_item(child, item),
                None => Ok(Vec::new()),
            },
            Content::Aggregate { children } => {
                let map = self.section_map(id)?;
                let mut paths = Vec::new();
                for (ordinal, &child) in children.iter().enumerate() {
                    let offset = map.offset(ordinal)?;
                    paths.extend(
                        self.index_paths_for_item(child, item)?
                            .into_iter()
                            .map(|path| path.offset_section(offset)),
                    );
                }
                Ok(paths)
            }
        }
    }

    /// The first path of `id` holding an item equal to `item`.
    pub fn index_path_for_item(&self, id: DataSourceId, item: &T) -> Result<Option<IndexPath>>
    where
        T: PartialEq,
    {
        Ok(self.index_paths_for_item(id, item)?.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Sinks
    // ------------------------------------------------------------------

    /// Attaches the sink that receives `root`'s flushed transactions.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::InvalidArgument`] if `root` belongs to a composite.
    pub fn set_sink(&mut self, root: DataSourceId, sink: impl ListControlSink + 'static) -> Result<()> {
        let node = self.node_mut(root)?;
        if node.parent.is_some() {
            let error = DataSourceError::invalid_argument("sinks attach to root data sources only");
            log_failure("set_sink")(&error);
            return Err(error);
        }
        node.sink = Some(Box::new(sink));
        tracing::debug!(target: targets::TREE, ?root, "sink attached");
        Ok(())
    }

    /// Detaches and returns `root`'s sink.
    pub fn take_sink(&mut self, root: DataSourceId) -> Result<Option<Box<dyn ListControlSink>>> {
        Ok(self.node_mut(root)?.sink.take())
    }

    // ------------------------------------------------------------------
    // Notification channel
    // ------------------------------------------------------------------

    /// Reports items inserted at `paths`.
    pub fn notify_items_inserted(&mut self, id: DataSourceId, paths: &[IndexPath]) -> Result<()> {
        self.relay(id, UpdateOperation::items(OperationKind::Insert, paths))
    }

    /// Reports items removed from `paths`.
    pub fn notify_items_removed(&mut self, id: DataSourceId, paths: &[IndexPath]) -> Result<()> {
        self.relay(id, UpdateOperation::items(OperationKind::Remove, paths))
    }

    /// Reports items changed in place at `paths`.
    pub fn notify_items_refreshed(&mut self, id: DataSourceId, paths: &[IndexPath]) -> Result<()> {
        self.relay(id, UpdateOperation::items(OperationKind::Refresh, paths))
    }

    /// Reports an item moved from `from` to `to`.
    pub fn notify_item_moved(&mut self, id: DataSourceId, from: IndexPath, to: IndexPath) -> Result<()> {
        self.relay(id, vec![UpdateOperation::MoveItem { from, to }])
    }

    /// Reports sections inserted.
    pub fn notify_sections_inserted(&mut self, id: DataSourceId, sections: &SectionSet) -> Result<()> {
        self.relay(id, UpdateOperation::sections_of(OperationKind::Insert, sections))
    }

    /// Reports sections removed.
    pub fn notify_sections_removed(&mut self, id: DataSourceId, sections: &SectionSet) -> Result<()> {
        self.relay(id, UpdateOperation::sections_of(OperationKind::Remove, sections))
    }

    /// Reports sections changed in place.
    pub fn notify_sections_refreshed(&mut self, id: DataSourceId, sections: &SectionSet) -> Result<()> {
        self.relay(id, UpdateOperation::sections_of(OperationKind::Refresh, sections))
    }

    /// Reports a section moved from `from` to `to`.
    pub fn notify_section_moved(&mut self, id: DataSourceId, from: usize, to: usize) -> Result<()> {
        self.relay(id, vec![UpdateOperation::MoveSection { from, to }])
    }

    /// Reports that the content changed beyond incremental description.
    ///
    /// Every operation pending at the root, and every operation reported
    /// later in the same batch scope, is replaced by one full reload.
    pub fn notify_did_reload_data(&mut self, id: DataSourceId) -> Result<()> {
        match self.lift(id)? {
            Some((root, _)) => {
                tracing::trace!(target: targets::UPDATE, ?id, ?root, "reload requested");
                self.deliver(root, PendingUpdateQueue::request_reload)
            }
            None => {
                tracing::trace!(target: targets::UPDATE, ?id, "dropping reload of hidden data source");
                Ok(())
            }
        }
    }

    /// Announces that a batch update is about to run.
    ///
    /// Notifications reported before the batch runs are collected instead of
    /// flushed, and are delivered with the batch.
    pub fn notify_will_batch_update(&mut self, id: DataSourceId) -> Result<()> {
        let root = self.root_of(id)?;
        let queue = &mut self.node_mut(root)?.queue;
        if queue.scope() == BatchScope::Closed {
            queue.announce();
            self.freeze_layouts(root)?;
            self.events.emit(DataSourceEvent::WillBatchUpdate { root });
        }
        Ok(())
    }

    /// Runs `work` inside one batch scope and flushes everything it reported
    /// as a single transaction.
    ///
    /// `on_complete` runs once the root's sink has applied the transaction,
    /// or right away when there is nothing to apply or no sink. If `work`
    /// fails, whatever it reported is still flushed and its error returned.
    ///
    /// Operations reported by children of an aggregate are remapped using
    /// the aggregate's layout from when the scope opened, so every index
    /// path in the transaction refers to the content before the batch no
    /// matter in which order `work` edits siblings.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::ReentrantBatch`] if a batch update is already
    /// running for the same root. `work` is not run.
    pub fn notify_batch_update<W>(
        &mut self,
        id: DataSourceId,
        work: W,
        on_complete: Option<UpdateCompletion>,
    ) -> Result<()>
    where
        W: FnOnce(&mut Self) -> Result<()>,
    {
        let root = self.root_of(id)?;
        let queue = &mut self.node_mut(root)?.queue;
        let announced = queue.scope() == BatchScope::Announced;
        queue.open().inspect_err(log_failure("notify_batch_update"))?;
        if !announced {
            self.freeze_layouts(root)?;
            self.events.emit(DataSourceEvent::WillBatchUpdate { root });
        }

        let result = {
            let _perf = PerfSpan::new(span_names::BATCH);
            work(self)
        };

        if self.nodes.contains_key(root) {
            self.flush(root, on_complete)?;
        }
        result
    }

    /// Returns `true` if `id`'s root has operations or a reload waiting.
    pub fn has_pending_updates(&self, id: DataSourceId) -> Result<bool> {
        let queue = &self.node(self.root_of(id)?)?.queue;
        Ok(!queue.is_empty() || queue.reload_pending())
    }

    /// Moves `operations` from `id`'s coordinates to its root's queue.
    pub(super) fn relay(&mut self, id: DataSourceId, operations: Vec<UpdateOperation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        let Some((root, offset)) = self.lift(id)? else {
            tracing::trace!(
                target: targets::UPDATE,
                ?id,
                dropped = operations.len(),
                "dropping operations of hidden data source"
            );
            return Ok(());
        };
        if offset > 0 {
            tracing::trace!(target: targets::REMAP, ?id, ?root, offset, "remapping operations");
        }
        let operations = operations.into_iter().map(move |op| op.map_sections(|s| s + offset));
        self.deliver(root, move |queue| queue.enqueue(operations))
    }

    /// Hands work to `root`'s queue, wrapping it in a batch of its own when
    /// no scope is open.
    fn deliver<F>(&mut self, root: DataSourceId, f: F) -> Result<()>
    where
        F: FnOnce(&mut PendingUpdateQueue),
    {
        let queue = &mut self.node_mut(root)?.queue;
        if queue.is_collecting() {
            f(queue);
            return Ok(());
        }
        queue.open()?;
        f(queue);
        self.flush(root, None)
    }

    /// Closes `root`'s scope and sends the transaction to observers and to
    /// the sink.
    #[tracing::instrument(skip(self, on_complete), target = "trellis::update", level = "trace")]
    pub(super) fn flush(&mut self, root: DataSourceId, on_complete: Option<UpdateCompletion>) -> Result<()> {
        let _perf = PerfSpan::new(span_names::FLUSH);
        let node = self.nodes.get_mut(root).ok_or(DataSourceError::InvalidDataSource)?;
        let transaction = node.queue.close(self.config.apply_order);
        node.layouts.clear();

        match &transaction {
            Transaction::Empty => {
                tracing::trace!(target: targets::UPDATE, ?root, "nothing to flush");
            }
            Transaction::Reload => {
                tracing::trace!(target: targets::UPDATE, ?root, "flushing reload");
                self.events.emit(DataSourceEvent::DidReloadData { root });
            }
            Transaction::Apply(operations) => {
                tracing::trace!(target: targets::UPDATE, ?root, count = operations.len(), "flushing operations");
                for &operation in operations {
                    self.events.emit(DataSourceEvent::Update { root, operation });
                }
            }
        }

        let on_complete = on_complete.unwrap_or_else(|| Box::new(|| {}));
        match (transaction, node.sink.as_mut()) {
            (Transaction::Apply(operations), Some(sink)) => {
                sink.begin_updates();
                sink.apply_operations(&operations);
                sink.end_updates(on_complete);
            }
            (Transaction::Reload, Some(sink)) => {
                sink.reload_all();
                on_complete();
            }
            _ => on_complete(),
        }
        Ok(())
    }
}

impl<T> fmt::Debug for DataSourceTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceTree")
            .field("data_sources", &self.nodes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
