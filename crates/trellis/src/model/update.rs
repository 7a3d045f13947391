//! Mutation operations and the pending update queue.
//!
//! Data sources describe every content change as a sequence of
//! [`UpdateOperation`]s. The root of a data-source tree collects them in a
//! [`PendingUpdateQueue`] and hands them to the list-control sink as one
//! atomic transaction when the batch scope closes.
//!
//! All index paths and sections inside one transaction are expressed in the
//! coordinate space that existed immediately before the transaction began.

use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use trellis_core::logging::targets;
use trellis_core::{DataSourceError, Result};

use super::index::{IndexPath, SectionSet};

/// A single item- or section-level mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateOperation {
    /// An item was inserted at the path.
    InsertItem(IndexPath),
    /// The item at the path was removed.
    RemoveItem(IndexPath),
    /// The item at the path changed in place.
    RefreshItem(IndexPath),
    /// An item moved.
    MoveItem {
        /// Location before the move.
        from: IndexPath,
        /// Location after the move.
        to: IndexPath,
    },
    /// A section was inserted.
    InsertSection(usize),
    /// A section was removed.
    RemoveSection(usize),
    /// A section changed in place.
    RefreshSection(usize),
    /// A section moved.
    MoveSection {
        /// Section number before the move.
        from: usize,
        /// Section number after the move.
        to: usize,
    },
}

/// The kind of an [`UpdateOperation`], independent of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Insertion.
    Insert,
    /// Removal.
    Remove,
    /// Move.
    Move,
    /// In-place refresh.
    Refresh,
}

impl UpdateOperation {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::InsertItem(_) | Self::InsertSection(_) => OperationKind::Insert,
            Self::RemoveItem(_) | Self::RemoveSection(_) => OperationKind::Remove,
            Self::RefreshItem(_) | Self::RefreshSection(_) => OperationKind::Refresh,
            Self::MoveItem { .. } | Self::MoveSection { .. } => OperationKind::Move,
        }
    }

    /// Returns `true` for section-level operations.
    pub fn is_section(&self) -> bool {
        matches!(
            self,
            Self::InsertSection(_)
                | Self::RemoveSection(_)
                | Self::RefreshSection(_)
                | Self::MoveSection { .. }
        )
    }

    /// Returns a copy with every section number passed through `map`.
    pub fn map_sections<F>(self, map: F) -> Self
    where
        F: Fn(usize) -> usize,
    {
        let path = |p: IndexPath| p.with_section(map(p.section()));
        match self {
            Self::InsertItem(p) => Self::InsertItem(path(p)),
            Self::RemoveItem(p) => Self::RemoveItem(path(p)),
            Self::RefreshItem(p) => Self::RefreshItem(path(p)),
            Self::MoveItem { from, to } => Self::MoveItem {
                from: path(from),
                to: path(to),
            },
            Self::InsertSection(s) => Self::InsertSection(map(s)),
            Self::RemoveSection(s) => Self::RemoveSection(map(s)),
            Self::RefreshSection(s) => Self::RefreshSection(map(s)),
            Self::MoveSection { from, to } => Self::MoveSection {
                from: map(from),
                to: map(to),
            },
        }
    }

    /// Every section number this operation refers to.
    pub fn sections(&self) -> impl Iterator<Item = usize> {
        let (first, second) = match *self {
            Self::InsertItem(p) | Self::RemoveItem(p) | Self::RefreshItem(p) => (p.section(), None),
            Self::MoveItem { from, to } => (from.section(), Some(to.section())),
            Self::InsertSection(s) | Self::RemoveSection(s) | Self::RefreshSection(s) => (s, None),
            Self::MoveSection { from, to } => (from, Some(to)),
        };
        std::iter::once(first).chain(second)
    }

    /// One operation per path.
    pub fn items(kind: OperationKind, paths: &[IndexPath]) -> Vec<Self> {
        paths
            .iter()
            .filter_map(|&p| match kind {
                OperationKind::Insert => Some(Self::InsertItem(p)),
                OperationKind::Remove => Some(Self::RemoveItem(p)),
                OperationKind::Refresh => Some(Self::RefreshItem(p)),
                OperationKind::Move => None,
            })
            .collect()
    }

    /// One operation per section.
    pub fn sections_of(kind: OperationKind, sections: &SectionSet) -> Vec<Self> {
        sections
            .iter()
            .filter_map(|s| match kind {
                OperationKind::Insert => Some(Self::InsertSection(s)),
                OperationKind::Remove => Some(Self::RemoveSection(s)),
                OperationKind::Refresh => Some(Self::RefreshSection(s)),
                OperationKind::Move => None,
            })
            .collect()
    }

    /// Position of this operation's group in the canonical apply order.
    fn phase(&self) -> u8 {
        match self {
            Self::RemoveSection(_) => 0,
            Self::RemoveItem(_) => 1,
            Self::MoveSection { .. } => 2,
            Self::MoveItem { .. } => 3,
            Self::InsertSection(_) => 4,
            Self::InsertItem(_) => 5,
            Self::RefreshSection(_) => 6,
            Self::RefreshItem(_) => 7,
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.phase().cmp(&other.phase()).then_with(|| match (self, other) {
            (Self::RemoveSection(a), Self::RemoveSection(b)) => b.cmp(a),
            (Self::RemoveItem(a), Self::RemoveItem(b)) => b.cmp(a),
            (Self::InsertSection(a), Self::InsertSection(b)) => a.cmp(b),
            (Self::InsertItem(a), Self::InsertItem(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
    }
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertItem(p) => write!(f, "insert item {p}"),
            Self::RemoveItem(p) => write!(f, "remove item {p}"),
            Self::RefreshItem(p) => write!(f, "refresh item {p}"),
            Self::MoveItem { from, to } => write!(f, "move item {from} -> {to}"),
            Self::InsertSection(s) => write!(f, "insert section {s}"),
            Self::RemoveSection(s) => write!(f, "remove section {s}"),
            Self::RefreshSection(s) => write!(f, "refresh section {s}"),
            Self::MoveSection { from, to } => write!(f, "move section {from} -> {to}"),
        }
    }
}

/// The order in which a flushed transaction's operations reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApplyOrder {
    /// List-diff order: section removals then item removals (both by
    /// descending index), section moves, item moves, section insertions then
    /// item insertions (both by ascending index), then refreshes. Operations
    /// with equal keys keep the order they were enqueued in.
    #[default]
    Canonical,
    /// Exactly the order the operations were enqueued in.
    Enqueued,
}

impl ApplyOrder {
    /// Orders `operations` in place.
    pub fn arrange(self, operations: &mut [UpdateOperation]) {
        if self == Self::Canonical {
            operations.sort_by(UpdateOperation::canonical_cmp);
        }
    }
}

/// What a closing batch scope hands to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Nothing was enqueued.
    Empty,
    /// A full reload replaces every incremental operation.
    Reload,
    /// Operations to apply atomically, already arranged.
    Apply(Vec<UpdateOperation>),
}

/// State of a root's batch scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchScope {
    /// No scope is open. Single notifications are flushed immediately.
    #[default]
    Closed,
    /// A batch was announced; notifications are collected until it runs.
    Announced,
    /// A batch update is running.
    Running,
}

/// Operations awaiting the close of the current batch scope.
#[derive(Debug, Default)]
pub struct PendingUpdateQueue {
    operations: Vec<UpdateOperation>,
    reload: bool,
    scope: BatchScope,
}

impl PendingUpdateQueue {
    /// Creates an empty queue with a closed scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current scope state.
    pub fn scope(&self) -> BatchScope {
        self.scope
    }

    /// Returns `true` while notifications are being collected.
    pub fn is_collecting(&self) -> bool {
        self.scope != BatchScope::Closed
    }

    /// Number of operations waiting to be flushed.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no operation is waiting.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns `true` if a full reload is pending.
    pub fn reload_pending(&self) -> bool {
        self.reload
    }

    /// Marks a batch as announced. Has no effect on an open scope.
    pub fn announce(&mut self) {
        if self.scope == BatchScope::Closed {
            self.scope = BatchScope::Announced;
        }
    }

    /// Opens a running batch scope, adopting an announced one.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::ReentrantBatch`] if a batch is already
    /// running.
    pub fn open(&mut self) -> Result<()> {
        if self.scope == BatchScope::Running {
            return Err(DataSourceError::ReentrantBatch);
        }
        self.scope = BatchScope::Running;
        Ok(())
    }

    /// Appends operations. They are void if a reload is already pending.
    pub fn enqueue(&mut self, operations: impl IntoIterator<Item = UpdateOperation>) {
        if self.reload {
            let dropped = operations.into_iter().count();
            tracing::trace!(target: targets::UPDATE, dropped, "reload pending, dropping operations");
            return;
        }
        self.operations.extend(operations);
    }

    /// Discards every pending operation in favour of a full reload.
    pub fn request_reload(&mut self) {
        if !self.operations.is_empty() {
            tracing::trace!(
                target: targets::UPDATE,
                discarded = self.operations.len(),
                "reload discards pending operations"
            );
        }
        self.operations.clear();
        self.reload = true;
    }

    /// Closes the scope and takes everything collected in it.
    pub fn close(&mut self, order: ApplyOrder) -> Transaction {
        self.scope = BatchScope::Closed;
        if std::mem::take(&mut self.reload) {
            self.operations.clear();
            return Transaction::Reload;
        }
        if self.operations.is_empty() {
            return Transaction::Empty;
        }
        let mut operations = std::mem::take(&mut self.operations);
        order.arrange(&mut operations);
        Transaction::Apply(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(section: usize, item: usize) -> IndexPath {
        IndexPath::new(section, item)
    }

    #[test]
    fn test_operation_kind() {
        assert_eq!(UpdateOperation::InsertItem(ip(0, 0)).kind(), OperationKind::Insert);
        assert_eq!(UpdateOperation::RemoveSection(3).kind(), OperationKind::Remove);
        assert!(UpdateOperation::MoveSection { from: 0, to: 1 }.is_section());
        assert!(!UpdateOperation::RefreshItem(ip(1, 1)).is_section());
    }

    #[test]
    fn test_map_sections() {
        let op = UpdateOperation::MoveItem {
            from: ip(0, 2),
            to: ip(1, 0),
        };
        assert_eq!(
            op.map_sections(|s| s + 5),
            UpdateOperation::MoveItem {
                from: ip(5, 2),
                to: ip(6, 0),
            }
        );
        assert_eq!(
            UpdateOperation::InsertSection(0).map_sections(|s| s + 2),
            UpdateOperation::InsertSection(2)
        );
        assert_eq!(op.sections().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_canonical_order() {
        let mut ops = vec![
            UpdateOperation::InsertItem(ip(0, 3)),
            UpdateOperation::RemoveItem(ip(0, 1)),
            UpdateOperation::InsertItem(ip(0, 1)),
            UpdateOperation::RefreshSection(2),
            UpdateOperation::RemoveItem(ip(0, 4)),
            UpdateOperation::InsertSection(1),
            UpdateOperation::RemoveSection(0),
            UpdateOperation::RemoveSection(2),
        ];
        ApplyOrder::Canonical.arrange(&mut ops);

        assert_eq!(
            ops,
            vec![
                UpdateOperation::RemoveSection(2),
                UpdateOperation::RemoveSection(0),
                UpdateOperation::RemoveItem(ip(0, 4)),
                UpdateOperation::RemoveItem(ip(0, 1)),
                UpdateOperation::InsertSection(1),
                UpdateOperation::InsertItem(ip(0, 1)),
                UpdateOperation::InsertItem(ip(0, 3)),
                UpdateOperation::RefreshSection(2),
            ]
        );
    }

    #[test]
    fn test_canonical_order_keeps_moves_in_enqueue_order() {
        let first = UpdateOperation::MoveItem {
            from: ip(0, 5),
            to: ip(0, 0),
        };
        let second = UpdateOperation::MoveItem {
            from: ip(0, 1),
            to: ip(0, 4),
        };
        let mut ops = vec![first, second];
        ApplyOrder::Canonical.arrange(&mut ops);
        assert_eq!(ops, vec![first, second]);
    }

    #[test]
    fn test_enqueued_order_is_untouched() {
        let mut ops = vec![
            UpdateOperation::InsertItem(ip(0, 0)),
            UpdateOperation::RemoveItem(ip(0, 0)),
        ];
        let before = ops.clone();
        ApplyOrder::Enqueued.arrange(&mut ops);
        assert_eq!(ops, before);
    }

    #[test]
    fn test_queue_close_returns_everything_once() {
        let mut queue = PendingUpdateQueue::new();
        queue.open().unwrap();
        queue.enqueue(UpdateOperation::items(OperationKind::Insert, &[ip(0, 0), ip(0, 1)]));
        queue.enqueue([UpdateOperation::RemoveItem(ip(0, 5))]);
        assert_eq!(queue.len(), 3);

        match queue.close(ApplyOrder::Canonical) {
            Transaction::Apply(ops) => assert_eq!(ops.len(), 3),
            other => panic!("unexpected transaction {other:?}"),
        }
        assert_eq!(queue.close(ApplyOrder::Canonical), Transaction::Empty);
        assert_eq!(queue.scope(), BatchScope::Closed);
    }

    #[test]
    fn test_reload_discards_operations() {
        let mut queue = PendingUpdateQueue::new();
        queue.open().unwrap();
        queue.enqueue([UpdateOperation::InsertSection(0)]);
        queue.request_reload();
        queue.enqueue([UpdateOperation::InsertSection(1)]);

        assert!(queue.is_empty());
        assert_eq!(queue.close(ApplyOrder::Canonical), Transaction::Reload);
        assert!(!queue.reload_pending());
    }

    #[test]
    fn test_reentrant_open_fails() {
        let mut queue = PendingUpdateQueue::new();
        queue.announce();
        assert_eq!(queue.scope(), BatchScope::Announced);
        assert!(queue.open().is_ok());
        assert_eq!(queue.open(), Err(DataSourceError::ReentrantBatch));
        assert_eq!(queue.scope(), BatchScope::Running);
    }

    #[test]
    fn test_section_operations_from_set() {
        let ops = UpdateOperation::sections_of(OperationKind::Refresh, &SectionSet::from([2, 0]));
        assert_eq!(
            ops,
            vec![
                UpdateOperation::RefreshSection(0),
                UpdateOperation::RefreshSection(2)
            ]
        );
    }
}
