//! Aggregate composites: every child's sections, one after the other.

use std::ops::Range;

use trellis_core::logging::targets;
use trellis_core::{DataSourceError, Result};

use super::loading::LoadingState;
use super::tree::{Content, DataSourceId, DataSourceTree, log_failure, section_ops};
use super::update::OperationKind;

impl<T: 'static> DataSourceTree<T> {
    fn aggregated_mut(&mut self, aggregate: DataSourceId) -> Result<&mut Vec<DataSourceId>> {
        match &mut self.node_mut(aggregate)?.content {
            Content::Aggregate { children } => Ok(children),
            Content::Leaf { .. } => Err(DataSourceError::NotAComposite),
            Content::Segmented { .. } => Err(DataSourceError::invalid_argument(
                "not an aggregate data source",
            )),
        }
    }

    /// Inserts `child` at `index` among an aggregate's children.
    ///
    /// The child's sections appear at its global offset in one transaction.
    /// A child that has never been loaded is loaded right away.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::InvalidArgument`] if `index` is past the end, plus
    /// the ownership errors of [`add_data_source`](Self::add_data_source).
    pub fn insert_data_source(&mut self, aggregate: DataSourceId, index: usize, child: DataSourceId) -> Result<()> {
        self.insert_aggregated(aggregate, index, child)
            .inspect_err(log_failure("insert_data_source"))
    }

    fn insert_aggregated(&mut self, aggregate: DataSourceId, index: usize, child: DataSourceId) -> Result<()> {
        let count = self.aggregated_mut(aggregate)?.len();
        if index > count {
            return Err(DataSourceError::invalid_argument(format!(
                "insertion index {index} past the end ({count} children)"
            )));
        }
        self.check_adoption(aggregate, child)?;
        self.adopt(aggregate, child)?;
        self.aggregated_mut(aggregate)?.insert(index, child);

        let range = self.section_map(aggregate)?.child_range(index)?;
        tracing::debug!(target: targets::TREE, ?aggregate, ?child, index, sections = ?range, "data source aggregated");
        self.relay(aggregate, section_ops(OperationKind::Insert, range))?;
        self.refresh_states_from(aggregate);

        if *self.node(child)?.loading.state() == LoadingState::Initial {
            self.load_content(child)?;
        }
        Ok(())
    }

    pub(super) fn remove_aggregated(&mut self, aggregate: DataSourceId, child: DataSourceId) -> Result<()> {
        let ordinal = self.position_of(aggregate, child)?;
        let range = self.frozen_range(aggregate, child)?;
        self.aggregated_mut(aggregate)?.remove(ordinal);
        self.node_mut(child)?.parent = None;
        tracing::debug!(target: targets::TREE, ?aggregate, ?child, sections = ?range, "data source removed from aggregate");

        self.relay(aggregate, section_ops(OperationKind::Remove, range))?;
        self.destroy_subtree(child);
        self.refresh_states_from(aggregate);
        Ok(())
    }

    pub(super) fn remove_all_aggregated(&mut self, aggregate: DataSourceId) -> Result<()> {
        let removed = self.frozen_section_count(aggregate)?;
        let children = std::mem::take(self.aggregated_mut(aggregate)?);
        for &child in &children {
            self.node_mut(child)?.parent = None;
        }
        tracing::debug!(target: targets::TREE, ?aggregate, count = children.len(), "aggregate emptied");

        self.relay(aggregate, section_ops(OperationKind::Remove, 0..removed))?;
        for child in children {
            self.destroy_subtree(child);
        }
        self.refresh_states_from(aggregate);
        Ok(())
    }

    /// Global sections occupied by one of an aggregate's children.
    pub fn child_section_range(&self, aggregate: DataSourceId, child: DataSourceId) -> Result<Range<usize>> {
        let ordinal = self.position_of(aggregate, child)?;
        self.section_map(aggregate)?.child_range(ordinal)
    }
}
