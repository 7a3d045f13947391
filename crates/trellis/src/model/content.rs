//! Content edits.
//!
//! Leaf edits take the leaf's own coordinates: they mutate the leaf's
//! sections and report the change through the notification channel. Item
//! edits ([`remove_item`], [`move_item`]) accept any data source and first
//! resolve the path down to the owning leaf, the way a list control's
//! delete and reorder gestures arrive at the root.
//!
//! [`remove_item`]: DataSourceTree::remove_item
//! [`move_item`]: DataSourceTree::move_item

use trellis_core::logging::targets;
use trellis_core::{DataSourceError, Result};

use super::index::{IndexPath, SectionSet};
use super::provider::Sections;
use super::tree::{DataSourceId, DataSourceTree, log_failure};

fn check_section<T>(sections: &Sections<T>, section: usize) -> Result<()> {
    if section >= sections.len() {
        return Err(DataSourceError::SectionOutOfRange {
            section,
            count: sections.len(),
        });
    }
    Ok(())
}

fn check_path<T>(sections: &Sections<T>, path: IndexPath) -> Result<()> {
    check_section(sections, path.section())?;
    if path.item() >= sections[path.section()].len() {
        return Err(DataSourceError::IndexOutOfRange {
            section: path.section(),
            item: path.item(),
        });
    }
    Ok(())
}

impl<T: 'static> DataSourceTree<T> {
    /// A leaf's sections.
    pub fn sections(&self, leaf: DataSourceId) -> Result<&[Vec<T>]> {
        self.leaf_sections(leaf).map(Vec::as_slice)
    }

    /// Inserts `items` into `section` starting at `index`.
    pub fn insert_items(&mut self, leaf: DataSourceId, section: usize, index: usize, items: Vec<T>) -> Result<()> {
        let sections = self.leaf_sections_mut(leaf)?;
        check_section(sections, section)?;
        let target = &mut sections[section];
        if index > target.len() {
            return Err(DataSourceError::IndexOutOfRange { section, item: index });
        }
        let paths: Vec<IndexPath> = (index..index + items.len())
            .map(|item| IndexPath::new(section, item))
            .collect();
        target.splice(index..index, items);

        tracing::trace!(target: targets::TREE, ?leaf, section, index, count = paths.len(), "items inserted");
        self.notify_items_inserted(leaf, &paths)?;
        self.settle_after_edit(leaf);
        Ok(())
    }

    /// Appends `items` to the end of `section`.
    pub fn append_items(&mut self, leaf: DataSourceId, section: usize, items: Vec<T>) -> Result<()> {
        let sections = self.leaf_sections(leaf)?;
        check_section(sections, section)?;
        let end = sections[section].len();
        self.insert_items(leaf, section, end, items)
    }

    /// Removes the items at `paths` and returns them in index path order.
    ///
    /// Duplicate paths are removed once. Nothing is removed if any path is
    /// out of range.
    pub fn remove_items(&mut self, leaf: DataSourceId, paths: &[IndexPath]) -> Result<Vec<T>> {
        let mut paths = paths.to_vec();
        paths.sort_unstable();
        paths.dedup();

        let sections = self.leaf_sections_mut(leaf)?;
        for &path in &paths {
            check_path(sections, path)?;
        }
        let mut removed: Vec<T> = paths
            .iter()
            .rev()
            .map(|path| sections[path.section()].remove(path.item()))
            .collect();
        removed.reverse();

        tracing::trace!(target: targets::TREE, ?leaf, count = removed.len(), "items removed");
        self.notify_items_removed(leaf, &paths)?;
        self.settle_after_edit(leaf);
        Ok(removed)
    }

    /// Replaces the item at `path` and returns the old one.
    pub fn replace_item(&mut self, leaf: DataSourceId, path: IndexPath, item: T) -> Result<T> {
        let sections = self.leaf_sections_mut(leaf)?;
        check_path(sections, path)?;
        let old = std::mem::replace(&mut sections[path.section()][path.item()], item);
        self.notify_items_refreshed(leaf, &[path])?;
        Ok(old)
    }

    /// Reports that the items at `paths` changed in place.
    pub fn refresh_items(&mut self, leaf: DataSourceId, paths: &[IndexPath]) -> Result<()> {
        let sections = self.leaf_sections(leaf)?;
        for &path in paths {
            check_path(sections, path)?;
        }
        self.notify_items_refreshed(leaf, paths)
    }

    /// Inserts a new section holding `items` at `index`.
    pub fn insert_section(&mut self, leaf: DataSourceId, index: usize, items: Vec<T>) -> Result<()> {
        let sections = self.leaf_sections_mut(leaf)?;
        if index > sections.len() {
            return Err(DataSourceError::SectionOutOfRange {
                section: index,
                count: sections.len(),
            });
        }
        sections.insert(index, items);

        tracing::trace!(target: targets::TREE, ?leaf, index, "section inserted");
        self.notify_sections_inserted(leaf, &SectionSet::single(index))?;
        self.settle_after_edit(leaf);
        Ok(())
    }

    /// Removes `sections` and returns their items in section order.
    pub fn remove_sections(&mut self, leaf: DataSourceId, sections: &SectionSet) -> Result<Vec<Vec<T>>> {
        let current = self.leaf_sections_mut(leaf)?;
        if let Some(last) = sections.last() {
            check_section(current, last)?;
        }
        let mut removed: Vec<Vec<T>> = sections.iter().rev().map(|section| current.remove(section)).collect();
        removed.reverse();

        tracing::trace!(target: targets::TREE, ?leaf, count = removed.len(), "sections removed");
        self.notify_sections_removed(leaf, sections)?;
        self.settle_after_edit(leaf);
        Ok(removed)
    }

    /// Moves section `from` so that it ends up at `to`.
    pub fn move_section(&mut self, leaf: DataSourceId, from: usize, to: usize) -> Result<()> {
        let sections = self.leaf_sections_mut(leaf)?;
        check_section(sections, from)?;
        check_section(sections, to)?;
        if from == to {
            return Ok(());
        }
        let moved = sections.remove(from);
        sections.insert(to, moved);

        tracing::trace!(target: targets::TREE, ?leaf, from, to, "section moved");
        self.notify_section_moved(leaf, from, to)
    }

    /// Replaces all of a leaf's content and reloads it.
    pub fn set_sections(&mut self, leaf: DataSourceId, sections: Sections<T>) -> Result<()> {
        *self.leaf_sections_mut(leaf)? = sections;
        self.notify_did_reload_data(leaf)?;
        self.settle_after_edit(leaf);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Item-level edits through any data source
    // ------------------------------------------------------------------

    /// Returns `true` if the item at `path` may be deleted.
    pub fn can_edit_item(&self, id: DataSourceId, path: IndexPath) -> bool {
        self.resolve_index_path(id, path)
            .and_then(|(leaf, _)| self.capabilities(leaf))
            .is_ok_and(|capabilities| capabilities.editable)
    }

    /// Returns `true` if the item at `path` may be moved.
    pub fn can_move_item(&self, id: DataSourceId, path: IndexPath) -> bool {
        self.resolve_index_path(id, path)
            .and_then(|(leaf, _)| self.capabilities(leaf))
            .is_ok_and(|capabilities| capabilities.movable)
    }

    /// Returns `true` if the item at `from` may be moved to `to`.
    ///
    /// Both paths must lie in the same leaf. `to` is the position after the
    /// move, so it may equal the length of a different destination section.
    pub fn can_move_item_to(&self, id: DataSourceId, from: IndexPath, to: IndexPath) -> bool {
        self.resolve_move(id, from, to).is_ok()
    }

    /// Deletes the item at `path` on behalf of the user.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::NotEditable`] if the owning leaf does not allow
    /// deletion, or a range error for a stale path.
    pub fn remove_item(&mut self, id: DataSourceId, path: IndexPath) -> Result<T> {
        let (leaf, local) = self
            .resolve_index_path(id, path)
            .inspect_err(log_failure("remove_item"))?;
        if !self.capabilities(leaf)?.editable {
            return Err(DataSourceError::NotEditable);
        }
        let mut removed = self.remove_items(leaf, &[local])?;
        removed.pop().ok_or(DataSourceError::IndexOutOfRange {
            section: path.section(),
            item: path.item(),
        })
    }

    /// Moves the item at `from` to `to` on behalf of the user.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::NotMovable`] if the owning leaf does not allow
    /// reordering, or a range error if either path is out of range or the
    /// paths lie in different leaves.
    pub fn move_item(&mut self, id: DataSourceId, from: IndexPath, to: IndexPath) -> Result<()> {
        let (leaf, local_from, local_to) = self
            .resolve_move(id, from, to)
            .inspect_err(log_failure("move_item"))?;

        let sections = self.leaf_sections_mut(leaf)?;
        let item = sections[local_from.section()].remove(local_from.item());
        sections[local_to.section()].insert(local_to.item(), item);

        tracing::trace!(target: targets::TREE, ?leaf, %local_from, %local_to, "item moved");
        self.notify_item_moved(leaf, local_from, local_to)
    }

    fn resolve_move(&self, id: DataSourceId, from: IndexPath, to: IndexPath) -> Result<(DataSourceId, IndexPath, IndexPath)> {
        let (leaf, local_from) = self.resolve_index_path(id, from)?;
        if !self.capabilities(leaf)?.movable {
            return Err(DataSourceError::NotMovable);
        }
        let (target, to_section) = self.resolve_section(id, to.section())?;
        if target != leaf {
            return Err(DataSourceError::invalid_argument("items cannot move between data sources"));
        }

        let mut limit = self.leaf_sections(leaf)?[to_section].len();
        if to_section == local_from.section() {
            limit -= 1;
        }
        if to.item() > limit {
            return Err(DataSourceError::IndexOutOfRange {
                section: to.section(),
                item: to.item(),
            });
        }
        Ok((leaf, local_from, to.with_section(to_section)))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Capabilities, DataSourceTree, IndexPath, LoadingState, RecordingSink, SectionSet, UpdateOperation,
    };
    use trellis_core::DataSourceError;

    fn ip(section: usize, item: usize) -> IndexPath {
        IndexPath::new(section, item)
    }

    #[test]
    fn test_insert_and_append() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Letters", vec![vec!["a", "d"]]);
        let sink = RecordingSink::new();
        tree.set_sink(leaf, sink.clone()).unwrap();

        tree.insert_items(leaf, 0, 1, vec!["b", "c"]).unwrap();
        tree.append_items(leaf, 0, vec!["e"]).unwrap();

        assert_eq!(tree.sections(leaf).unwrap(), &[vec!["a", "b", "c", "d", "e"]]);
        assert_eq!(
            sink.transactions(),
            vec![
                vec![UpdateOperation::InsertItem(ip(0, 1)), UpdateOperation::InsertItem(ip(0, 2))],
                vec![UpdateOperation::InsertItem(ip(0, 4))],
            ]
        );
        assert_eq!(
            tree.insert_items(leaf, 0, 9, vec!["z"]),
            Err(DataSourceError::IndexOutOfRange { section: 0, item: 9 })
        );
    }

    #[test]
    fn test_remove_items_in_one_batch() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Letters", vec![vec!["a", "b", "c", "d"]]);
        let sink = RecordingSink::new();
        tree.set_sink(leaf, sink.clone()).unwrap();

        let removed = tree.remove_items(leaf, &[ip(0, 3), ip(0, 1), ip(0, 3)]).unwrap();

        assert_eq!(removed, vec!["b", "d"]);
        assert_eq!(tree.sections(leaf).unwrap(), &[vec!["a", "c"]]);
        assert_eq!(
            sink.transactions(),
            vec![vec![UpdateOperation::RemoveItem(ip(0, 3)), UpdateOperation::RemoveItem(ip(0, 1))]]
        );
    }

    #[test]
    fn test_invalid_removal_changes_nothing() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Letters", vec![vec!["a"]]);
        assert!(tree.remove_items(leaf, &[ip(0, 0), ip(0, 5)]).is_err());
        assert_eq!(tree.number_of_items(leaf, 0).unwrap(), 1);
    }

    #[test]
    fn test_section_edits() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Sections", vec![vec![1], vec![2]]);
        let sink = RecordingSink::new();
        tree.set_sink(leaf, sink.clone()).unwrap();

        tree.insert_section(leaf, 1, vec![9]).unwrap();
        tree.move_section(leaf, 0, 2).unwrap();
        let removed = tree.remove_sections(leaf, &SectionSet::from([0])).unwrap();

        assert_eq!(removed, vec![vec![9]]);
        assert_eq!(tree.sections(leaf).unwrap(), &[vec![2], vec![1]]);
        assert_eq!(
            sink.transactions(),
            vec![
                vec![UpdateOperation::InsertSection(1)],
                vec![UpdateOperation::MoveSection { from: 0, to: 2 }],
                vec![UpdateOperation::RemoveSection(0)],
            ]
        );
    }

    #[test]
    fn test_set_sections_reloads() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Leaf", vec![vec![1]]);
        let sink = RecordingSink::new();
        tree.set_sink(leaf, sink.clone()).unwrap();

        tree.set_sections(leaf, vec![vec![4, 5], vec![6]]).unwrap();

        assert_eq!(sink.reload_count(), 1);
        assert_eq!(tree.number_of_sections(leaf).unwrap(), 2);
    }

    #[test]
    fn test_edits_settle_loading_state() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Leaf", vec![vec![1]]);
        tree.load_content(leaf).unwrap();

        tree.remove_items(leaf, &[ip(0, 0)]).unwrap();
        assert_eq!(*tree.loading_state(leaf).unwrap(), LoadingState::NoContent);
        assert!(tree.obscured_by_placeholder(leaf).unwrap());

        tree.append_items(leaf, 0, vec![2]).unwrap();
        assert_eq!(*tree.loading_state(leaf).unwrap(), LoadingState::ContentLoaded);
    }

    #[test]
    fn test_remove_item_through_aggregate() {
        let mut tree = DataSourceTree::new();
        let aggregate = tree.create_aggregate("All");
        let a = tree.create_static("A", vec![vec!["a1"]]);
        let b = tree.create_static("B", vec![vec!["b1", "b2"]]);
        tree.add_data_source(aggregate, a).unwrap();
        tree.add_data_source(aggregate, b).unwrap();
        let sink = RecordingSink::new();
        tree.set_sink(aggregate, sink.clone()).unwrap();

        assert!(tree.can_edit_item(aggregate, ip(1, 1)));
        assert_eq!(tree.remove_item(aggregate, ip(1, 1)).unwrap(), "b2");
        assert_eq!(sink.transactions(), vec![vec![UpdateOperation::RemoveItem(ip(1, 1))]]);

        tree.set_capabilities(a, Capabilities::read_only()).unwrap();
        assert!(!tree.can_edit_item(aggregate, ip(0, 0)));
        assert_eq!(tree.remove_item(aggregate, ip(0, 0)), Err(DataSourceError::NotEditable));
    }

    #[test]
    fn test_move_item_requires_movable() {
        let mut tree = DataSourceTree::new();
        let leaf = tree.create_static("Leaf", vec![vec!["a", "b", "c"], vec!["d"]]);
        assert!(!tree.can_move_item(leaf, ip(0, 0)));
        assert_eq!(tree.move_item(leaf, ip(0, 0), ip(0, 2)), Err(DataSourceError::NotMovable));

        tree.set_capabilities(leaf, Capabilities::default().with_movable(true)).unwrap();
        assert!(tree.can_move_item(leaf, ip(0, 0)));
        assert!(tree.can_move_item_to(leaf, ip(0, 0), ip(0, 2)));
        assert!(!tree.can_move_item_to(leaf, ip(0, 0), ip(0, 3)));
        assert!(tree.can_move_item_to(leaf, ip(0, 0), ip(1, 1)));

        tree.move_item(leaf, ip(0, 0), ip(0, 2)).unwrap();
        assert_eq!(tree.sections(leaf).unwrap()[0], vec!["b", "c", "a"]);
        tree.move_item(leaf, ip(0, 0), ip(1, 1)).unwrap();
        assert_eq!(tree.sections(leaf).unwrap(), &[vec!["c", "a"], vec!["d", "b"]]);
    }

    #[test]
    fn test_move_between_leaves_is_rejected() {
        let mut tree = DataSourceTree::new();
        let aggregate = tree.create_aggregate("All");
        let a = tree.create_static("A", vec![vec!["a1"]]);
        let b = tree.create_static("B", vec![vec!["b1"]]);
        tree.add_data_source(aggregate, a).unwrap();
        tree.add_data_source(aggregate, b).unwrap();
        tree.set_capabilities(a, Capabilities::default().with_movable(true)).unwrap();

        assert!(!tree.can_move_item_to(aggregate, ip(0, 0), ip(1, 0)));
        assert!(matches!(
            tree.move_item(aggregate, ip(0, 0), ip(1, 0)),
            Err(DataSourceError::InvalidArgument(_))
        ));
    }
}
