//! Index path remapping between a composite and its children.
//!
//! An aggregate composite lays its children's sections out one after the
//! other. `SectionMap` is a snapshot of the children's section counts that
//! translates in both directions:
//!
//! ```text
//!  child 0 (2 sections)   child 1 (0)   child 2 (1 section)
//! ┌─────────┬─────────┐                ┌─────────┐
//! │ local 0 │ local 1 │                │ local 0 │
//! ├─────────┼─────────┤                ├─────────┤
//! │global 0 │global 1 │                │global 2 │
//! └─────────┴─────────┘                └─────────┘
//! ```
//!
//! Segmented composites never remap: only the selected child is visible and
//! it always starts at section 0.

use std::ops::Range;

use trellis_core::logging::targets;
use trellis_core::{DataSourceError, Result};

use super::index::IndexPath;

/// Section layout of an aggregate composite's children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMap {
    /// Global section where each child starts, plus the total at the end.
    starts: Vec<usize>,
}

impl Default for SectionMap {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl SectionMap {
    /// Builds a map from the children's section counts, in child order.
    pub fn new(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut starts = vec![0];
        let mut total = 0;
        for count in counts {
            total += count;
            starts.push(total);
        }
        Self { starts }
    }

    /// Number of children in the map.
    pub fn child_count(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    /// Total number of sections across all children.
    pub fn total_sections(&self) -> usize {
        self.starts.last().copied().unwrap_or(0)
    }

    /// Number of sections contributed by `child`.
    pub fn section_count(&self, child: usize) -> Result<usize> {
        self.child_range(child).map(|range| range.len())
    }

    /// Global sections occupied by `child`.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::InvalidArgument`] for an unknown child.
    pub fn child_range(&self, child: usize) -> Result<Range<usize>> {
        if child >= self.child_count() {
            return Err(DataSourceError::invalid_argument(format!(
                "child {child} out of bounds ({} children)",
                self.child_count()
            )));
        }
        Ok(self.starts[child]..self.starts[child + 1])
    }

    /// Global section offset of `child`: the number of sections of every
    /// child before it.
    pub fn offset(&self, child: usize) -> Result<usize> {
        self.child_range(child).map(|range| range.start)
    }

    /// Maps a child's local section to the composite's section.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::SectionOutOfRange`] if `local` is not a
    /// section of `child`.
    pub fn global_section(&self, child: usize, local: usize) -> Result<usize> {
        let range = self.child_range(child)?;
        if local >= range.len() {
            return Err(DataSourceError::SectionOutOfRange {
                section: local,
                count: range.len(),
            });
        }
        Ok(range.start + local)
    }

    /// Maps a child's local index path to the composite's index path.
    pub fn global_index_path(&self, child: usize, local: IndexPath) -> Result<IndexPath> {
        let section = self.global_section(child, local.section())?;
        Ok(local.with_section(section))
    }

    /// Finds the child owning a global section and the section's local number.
    ///
    /// Children with no sections are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::SectionOutOfRange`] if no child owns
    /// `global`, which includes every lookup on a map with no sections.
    pub fn local_section(&self, global: usize) -> Result<(usize, usize)> {
        if global >= self.total_sections() {
            tracing::trace!(target: targets::REMAP, global, total = self.total_sections(), "section maps to no child");
            return Err(DataSourceError::SectionOutOfRange {
                section: global,
                count: self.total_sections(),
            });
        }
        // Last start not greater than `global`; empty children share their
        // start with the next child and are passed over.
        let child = self.starts.partition_point(|&start| start <= global) - 1;
        Ok((child, global - self.starts[child]))
    }

    /// Maps a composite index path to the owning child and its local path.
    pub fn local_index_path(&self, global: IndexPath) -> Result<(usize, IndexPath)> {
        let (child, section) = self.local_section(global.section())?;
        Ok((child, global.with_section(section)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let map = SectionMap::new([2, 0, 1]);
        assert_eq!(map.child_count(), 3);
        assert_eq!(map.total_sections(), 3);
        assert_eq!(map.offset(0).unwrap(), 0);
        assert_eq!(map.offset(1).unwrap(), 2);
        assert_eq!(map.offset(2).unwrap(), 2);
        assert_eq!(map.child_range(2).unwrap(), 2..3);
        assert_eq!(map.section_count(1).unwrap(), 0);
    }

    #[test]
    fn test_global_section() {
        let map = SectionMap::new([2, 1]);
        assert_eq!(map.global_section(1, 0).unwrap(), 2);
        assert_eq!(
            map.global_index_path(0, IndexPath::new(1, 4)).unwrap(),
            IndexPath::new(1, 4)
        );
        assert!(matches!(
            map.global_section(1, 1),
            Err(DataSourceError::SectionOutOfRange { section: 1, count: 1 })
        ));
        assert!(map.global_section(2, 0).is_err());
    }

    #[test]
    fn test_local_section_skips_empty_children() {
        let map = SectionMap::new([0, 2, 0, 0, 1]);
        assert_eq!(map.local_section(0).unwrap(), (1, 0));
        assert_eq!(map.local_section(1).unwrap(), (1, 1));
        assert_eq!(map.local_section(2).unwrap(), (4, 0));
        assert!(map.local_section(3).is_err());
    }

    #[test]
    fn test_empty_map_never_remaps() {
        let map = SectionMap::new(std::iter::empty());
        assert_eq!(map.child_count(), 0);
        assert_eq!(map.total_sections(), 0);
        assert!(map.local_section(0).is_err());
        assert!(map.offset(0).is_err());
    }

    #[test]
    fn test_default_map_is_empty() {
        let map = SectionMap::default();
        assert_eq!(map, SectionMap::new(std::iter::empty()));
        assert_eq!(map.child_count(), 0);
        assert!(map.child_range(0).is_err());
        assert!(map.section_count(0).is_err());
        assert!(map.local_section(0).is_err());
    }

    #[test]
    fn test_round_trip_for_every_valid_path() {
        let counts = [3, 0, 1, 2];
        let map = SectionMap::new(counts);

        for (child, &count) in counts.iter().enumerate() {
            for section in 0..count {
                for item in 0..3 {
                    let local = IndexPath::new(section, item);
                    let global = map.global_index_path(child, local).unwrap();
                    assert_eq!(map.local_index_path(global).unwrap(), (child, local));
                }
            }
        }

        for section in 0..map.total_sections() {
            let global = IndexPath::new(section, 1);
            let (child, local) = map.local_index_path(global).unwrap();
            assert_eq!(map.global_index_path(child, local).unwrap(), global);
        }
    }
}
