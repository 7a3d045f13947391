//! Index paths and section sets for addressing data-source content.
//!
//! An [`IndexPath`] locates one item as a `(section, item)` pair. A
//! [`SectionSet`] is an ordered, de-duplicated set of section numbers used by
//! the section-level notifications.
//!
//! Both are plain values: equality, ordering and hashing are structural, and
//! an index path is only meaningful in the coordinate space of the data
//! source that produced it, at the time it was produced.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The location of an item within a data source.
///
/// Index paths order by section first, then by item, which is the order a
/// list control lays items out in.
///
/// # Example
///
/// ```
/// use trellis::model::IndexPath;
///
/// let path = IndexPath::new(1, 4);
/// assert_eq!(path.section(), 1);
/// assert_eq!(path.item(), 4);
/// assert!(IndexPath::new(0, 9) < path);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexPath {
    section: usize,
    item: usize,
}

impl IndexPath {
    /// Creates an index path for `item` within `section`.
    #[inline]
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }

    /// Returns the section number.
    #[inline]
    pub const fn section(&self) -> usize {
        self.section
    }

    /// Returns the item number within the section.
    #[inline]
    pub const fn item(&self) -> usize {
        self.item
    }

    /// Returns a copy of this path moved to another section.
    #[inline]
    pub const fn with_section(self, section: usize) -> Self {
        Self {
            section,
            item: self.item,
        }
    }

    /// Returns a copy of this path with its section shifted by `offset`.
    #[inline]
    pub const fn offset_section(self, offset: usize) -> Self {
        self.with_section(self.section + offset)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, item): (usize, usize)) -> Self {
        Self::new(section, item)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.item)
    }
}

/// An ordered set of section numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectionSet {
    sections: BTreeSet<usize>,
}

impl SectionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set containing a single section.
    pub fn single(section: usize) -> Self {
        let mut set = Self::new();
        set.insert(section);
        set
    }

    /// Creates a set containing every section in `range`.
    pub fn from_range(range: Range<usize>) -> Self {
        range.collect()
    }

    /// Adds a section. Returns `false` if it was already present.
    pub fn insert(&mut self, section: usize) -> bool {
        self.sections.insert(section)
    }

    /// Returns `true` if the set contains `section`.
    pub fn contains(&self, section: usize) -> bool {
        self.sections.contains(&section)
    }

    /// Returns the number of sections in the set.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Returns the smallest section, if any.
    pub fn first(&self) -> Option<usize> {
        self.sections.first().copied()
    }

    /// Returns the largest section, if any.
    pub fn last(&self) -> Option<usize> {
        self.sections.last().copied()
    }

    /// Iterates over the sections in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.sections.iter().copied()
    }

    /// Returns a new set with every section shifted by `offset`.
    pub fn offset(&self, offset: usize) -> Self {
        self.iter().map(|section| section + offset).collect()
    }
}

impl FromIterator<usize> for SectionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[usize; N]> for SectionSet {
    fn from(sections: [usize; N]) -> Self {
        sections.into_iter().collect()
    }
}

impl From<Range<usize>> for SectionSet {
    fn from(range: Range<usize>) -> Self {
        Self::from_range(range)
    }
}

impl IntoIterator for SectionSet {
    type Item = usize;
    type IntoIter = std::collections::btree_set::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.into_iter()
    }
}

impl fmt::Display for SectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, section) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{section}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path_accessors() {
        let path = IndexPath::new(2, 5);
        assert_eq!(path.section(), 2);
        assert_eq!(path.item(), 5);
        assert_eq!(path, IndexPath::from((2, 5)));
        assert_eq!(path.to_string(), "[2, 5]");
    }

    #[test]
    fn test_index_path_ordering() {
        let a = IndexPath::new(0, 3);
        let b = IndexPath::new(1, 0);
        let c = IndexPath::new(1, 2);

        assert!(a < b);
        assert!(b < c);

        let mut paths = vec![c, a, b];
        paths.sort();
        assert_eq!(paths, vec![a, b, c]);
    }

    #[test]
    fn test_index_path_offset() {
        let path = IndexPath::new(1, 7);
        assert_eq!(path.offset_section(3), IndexPath::new(4, 7));
        assert_eq!(path.with_section(0), IndexPath::new(0, 7));
    }

    #[test]
    fn test_section_set_dedup_and_order() {
        let set: SectionSet = [4, 1, 4, 2].into();
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(set.first(), Some(1));
        assert_eq!(set.last(), Some(4));
        assert_eq!(set.to_string(), "{1, 2, 4}");
    }

    #[test]
    fn test_section_set_range_and_offset() {
        let set = SectionSet::from_range(0..3);
        assert_eq!(set.offset(2), SectionSet::from([2, 3, 4]));
        assert!(SectionSet::from_range(3..3).is_empty());
        assert!(SectionSet::single(9).contains(9));
    }
}
