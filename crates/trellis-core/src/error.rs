//! Error types for Trellis.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result type alias for data-source operations.
pub type Result<T> = std::result::Result<T, DataSourceError>;

/// A content load that did not succeed.
///
/// Load failures are never returned from tree operations. They move the
/// failing data source into the `Error` loading state, where the host shows
/// the error placeholder until the next explicit load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error("{reason}")]
pub struct LoadFailure {
    reason: String,
}

impl LoadFailure {
    /// Create a failure with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason supplied by the content provider.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors reported by data-source operations.
///
/// Apart from [`Load`](Self::Load), every variant signals a programming error
/// in the composing application: a stale index path, an unknown data source,
/// or misuse of the batching protocol. The operation that reports one leaves
/// the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataSourceError {
    /// A content load failed.
    #[error("Content load failed: {0}")]
    Load(#[from] LoadFailure),

    /// An index path does not address an existing item.
    #[error("Index path ({section}, {item}) is out of range")]
    IndexOutOfRange { section: usize, item: usize },

    /// A section number does not address an existing section.
    #[error("Section {section} is out of range ({count} sections)")]
    SectionOutOfRange { section: usize, count: usize },

    /// An argument was rejected, for example a selection index past the end.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch update scope was opened while one is already running.
    #[error("A batch update is already in progress for this data source tree")]
    ReentrantBatch,

    /// The data source id is unknown or the data source has been destroyed.
    #[error("Invalid or destroyed data source")]
    InvalidDataSource,

    /// The data source already belongs to a composite.
    #[error("Data source already belongs to a composite")]
    AlreadyOwned,

    /// Adding the data source would make a composite its own descendant.
    #[error("Cannot add a composite beneath itself")]
    CircularOwnership,

    /// The operation requires a segmented or aggregate data source.
    #[error("Data source is not a composite")]
    NotAComposite,

    /// The operation requires a leaf data source that owns its items.
    #[error("Data source does not own its items")]
    NotALeaf,

    /// The data source does not allow removing items.
    #[error("Data source does not allow editing")]
    NotEditable,

    /// The data source does not allow moving items.
    #[error("Data source does not allow moving items")]
    NotMovable,
}

impl DataSourceError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns `true` for errors that indicate a bug in the caller rather
    /// than an expected runtime condition.
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, Self::Load(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DataSourceError::IndexOutOfRange { section: 2, item: 7 };
        assert_eq!(err.to_string(), "Index path (2, 7) is out of range");

        let err = DataSourceError::invalid_argument("selected index 4 out of bounds");
        assert_eq!(
            err.to_string(),
            "Invalid argument: selected index 4 out of bounds"
        );
    }

    #[test]
    fn test_load_failure_conversion() {
        let failure = LoadFailure::new("offline");
        assert_eq!(failure.reason(), "offline");

        let err: DataSourceError = failure.clone().into();
        assert_eq!(err, DataSourceError::Load(failure));
        assert!(!err.is_programming_error());
        assert!(DataSourceError::ReentrantBatch.is_programming_error());
    }
}
