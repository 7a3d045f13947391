//! Segmented composites: one visible child at a time.
//!
//! A segmented data source presents exactly the sections of its selected
//! child, so nothing is remapped. Changing the selection replaces the
//! displayed sections in a single transaction, and a child that has never
//! been loaded is loaded when it first becomes visible.

use trellis_core::logging::targets;
use trellis_core::{DataSourceError, Result};

use super::loading::LoadingState;
use super::tree::{Content, DataSourceEvent, DataSourceId, DataSourceTree, log_failure, section_ops};
use super::update::{OperationKind, UpdateOperation};

impl<T: 'static> DataSourceTree<T> {
    fn segments(&self, segmented: DataSourceId) -> Result<(&[DataSourceId], Option<usize>)> {
        match &self.node(segmented)?.content {
            Content::Segmented { children, selected } => Ok((children, *selected)),
            Content::Leaf { .. } => Err(DataSourceError::NotAComposite),
            Content::Aggregate { .. } => Err(DataSourceError::invalid_argument(
                "not a segmented data source",
            )),
        }
    }

    fn segments_mut(&mut self, segmented: DataSourceId) -> Result<(&mut Vec<DataSourceId>, &mut Option<usize>)> {
        match &mut self.node_mut(segmented)?.content {
            Content::Segmented { children, selected } => Ok((children, selected)),
            Content::Leaf { .. } => Err(DataSourceError::NotAComposite),
            Content::Aggregate { .. } => Err(DataSourceError::invalid_argument(
                "not a segmented data source",
            )),
        }
    }

    /// Index of the displayed child.
    pub fn selected_index(&self, segmented: DataSourceId) -> Result<Option<usize>> {
        self.segments(segmented).map(|(_, selected)| selected)
    }

    /// The displayed child.
    pub fn selected_data_source(&self, segmented: DataSourceId) -> Result<Option<DataSourceId>> {
        let (children, selected) = self.segments(segmented)?;
        Ok(selected.and_then(|i| children.get(i)).copied())
    }

    /// Displays the child at `index`.
    ///
    /// The old child's sections are removed and the new child's inserted in
    /// one transaction. Selecting the displayed child does nothing.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::InvalidArgument`] if `index` is out of bounds. The
    /// selection is left unchanged.
    pub fn set_selected_index(&mut self, segmented: DataSourceId, index: usize) -> Result<()> {
        self.select(segmented, index)
            .inspect_err(log_failure("set_selected_index"))
    }

    /// Displays `child`, which must be one of the composite's children.
    pub fn set_selected_data_source(&mut self, segmented: DataSourceId, child: DataSourceId) -> Result<()> {
        let index = self
            .position_of(segmented, child)
            .inspect_err(log_failure("set_selected_data_source"))?;
        self.set_selected_index(segmented, index)
    }

    fn select(&mut self, segmented: DataSourceId, index: usize) -> Result<()> {
        let (children, selected) = self.segments(segmented)?;
        let Some(&child) = children.get(index) else {
            return Err(DataSourceError::invalid_argument(format!(
                "segment {index} out of bounds ({} segments)",
                children.len()
            )));
        };
        if selected == Some(index) {
            return Ok(());
        }
        let previous = selected.and_then(|i| children.get(i)).copied();

        let removed = previous.map_or(0, |previous| self.section_count(previous));
        let inserted = self.section_count(child);
        *self.segments_mut(segmented)?.1 = Some(index);
        tracing::debug!(target: targets::TREE, ?segmented, index, ?child, "segment selected");

        self.relay(segmented, swap_ops(removed, inserted))?;
        self.events.emit(DataSourceEvent::SelectionChanged {
            source: segmented,
            selected: Some(index),
        });
        self.refresh_states_from(segmented);
        self.load_if_initial(child)
    }

    pub(super) fn add_segment(&mut self, segmented: DataSourceId, child: DataSourceId) -> Result<()> {
        self.segments(segmented)?;
        self.check_adoption(segmented, child)?;
        self.adopt(segmented, child)?;

        let (children, selected) = self.segments_mut(segmented)?;
        children.push(child);
        let became_selected = selected.is_none();
        if became_selected {
            *selected = Some(children.len() - 1);
        }
        let selected = *selected;
        tracing::debug!(target: targets::TREE, ?segmented, ?child, became_selected, "segment added");

        if became_selected {
            let inserted = self.section_count(child);
            self.relay(segmented, section_ops(OperationKind::Insert, 0..inserted))?;
            self.events.emit(DataSourceEvent::SelectionChanged {
                source: segmented,
                selected,
            });
        }
        self.refresh_states_from(segmented);
        if became_selected {
            self.load_if_initial(child)?;
        }
        Ok(())
    }

    /// Removes `child`, moving the selection to the following sibling, else
    /// the preceding one, else nowhere.
    pub(super) fn remove_segment(&mut self, segmented: DataSourceId, child: DataSourceId) -> Result<()> {
        let ordinal = self.position_of(segmented, child)?;
        let (_, selected) = self.segments(segmented)?;
        let was_displayed = selected == Some(ordinal);
        let removed = if was_displayed { self.section_count(child) } else { 0 };

        let (children, selected) = self.segments_mut(segmented)?;
        children.remove(ordinal);
        *selected = match *selected {
            Some(current) if current == ordinal => {
                if children.is_empty() {
                    None
                } else {
                    Some(ordinal.min(children.len() - 1))
                }
            }
            Some(current) if current > ordinal => Some(current - 1),
            other => other,
        };
        let selected = *selected;
        let replacement = if was_displayed {
            selected.and_then(|i| children.get(i)).copied()
        } else {
            None
        };
        self.node_mut(child)?.parent = None;
        tracing::debug!(target: targets::TREE, ?segmented, ?child, ?selected, "segment removed");

        if was_displayed {
            let inserted = replacement.map_or(0, |replacement| self.section_count(replacement));
            self.relay(segmented, swap_ops(removed, inserted))?;
            self.events.emit(DataSourceEvent::SelectionChanged {
                source: segmented,
                selected,
            });
        }
        self.destroy_subtree(child);
        self.refresh_states_from(segmented);
        match replacement {
            Some(replacement) => self.load_if_initial(replacement),
            None => Ok(()),
        }
    }

    pub(super) fn remove_all_segments(&mut self, segmented: DataSourceId) -> Result<()> {
        let removed = self.section_count(segmented);
        let (children, selected) = self.segments_mut(segmented)?;
        let children = std::mem::take(children);
        let had_selection = selected.take().is_some();
        for &child in &children {
            self.node_mut(child)?.parent = None;
        }
        tracing::debug!(target: targets::TREE, ?segmented, count = children.len(), "all segments removed");

        self.relay(segmented, section_ops(OperationKind::Remove, 0..removed))?;
        if had_selection {
            self.events.emit(DataSourceEvent::SelectionChanged {
                source: segmented,
                selected: None,
            });
        }
        for child in children {
            self.destroy_subtree(child);
        }
        self.refresh_states_from(segmented);
        Ok(())
    }

    fn load_if_initial(&mut self, id: DataSourceId) -> Result<()> {
        if *self.node(id)?.loading.state() == LoadingState::Initial {
            self.load_content(id)?;
        }
        Ok(())
    }
}

/// Removal of the old displayed sections followed by insertion of the new.
fn swap_ops(removed: usize, inserted: usize) -> Vec<UpdateOperation> {
    let mut operations = section_ops(OperationKind::Remove, 0..removed);
    operations.extend(section_ops(OperationKind::Insert, 0..inserted));
    operations
}
