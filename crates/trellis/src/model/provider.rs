//! Content providers: where leaf data sources get their items from.
//!
//! A leaf data source never fetches anything itself. When a load cycle starts
//! it hands a [`LoadRequest`] to its [`ContentProvider`], which completes the
//! request now or later, possibly from another thread. Completions travel back
//! over a channel and are applied when the owning tree processes them on its
//! own thread.

use crossbeam_channel::Sender;

use trellis_core::LoadFailure;

use super::tree::DataSourceId;

/// Items grouped by section.
pub type Sections<T> = Vec<Vec<T>>;

/// The result of a content load.
pub type LoadResult<T> = Result<Sections<T>, LoadFailure>;

/// A finished load travelling back to the tree.
pub(crate) struct Completion<T> {
    pub(crate) source: DataSourceId,
    pub(crate) generation: u64,
    pub(crate) result: LoadResult<T>,
}

/// A request to load content for one load cycle of one data source.
///
/// Completing consumes the request, so each cycle completes at most once. A
/// request that is dropped without completing leaves the data source loading
/// until the next cycle starts.
pub struct LoadRequest<T> {
    source: DataSourceId,
    generation: u64,
    sender: Sender<Completion<T>>,
}

impl<T> LoadRequest<T> {
    pub(crate) fn new(source: DataSourceId, generation: u64, sender: Sender<Completion<T>>) -> Self {
        Self {
            source,
            generation,
            sender,
        }
    }

    /// The data source being loaded.
    pub fn source(&self) -> DataSourceId {
        self.source
    }

    /// The load cycle this request belongs to.
    ///
    /// Requests from older cycles are still accepted by `complete`, but the
    /// tree ignores their results.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Completes the load.
    pub fn complete(self, result: LoadResult<T>) {
        let completion = Completion {
            source: self.source,
            generation: self.generation,
            result,
        };
        if self.sender.send(completion).is_err() {
            tracing::debug!(
                target: trellis_core::logging::targets::LOADING,
                source = ?self.source,
                "data source tree dropped before load completed"
            );
        }
    }

    /// Completes the load successfully with `sections`.
    pub fn succeed(self, sections: Sections<T>) {
        self.complete(Ok(sections));
    }

    /// Completes the load with a failure.
    pub fn fail(self, reason: impl Into<String>) {
        self.complete(Err(LoadFailure::new(reason)));
    }
}

impl<T> std::fmt::Debug for LoadRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("source", &self.source)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Supplies content to a leaf data source.
///
/// `load` may be called many times, including while an earlier request is
/// still outstanding. Only the completion of the latest request is applied.
pub trait ContentProvider<T> {
    /// Starts loading content for `request`.
    fn load(&mut self, request: LoadRequest<T>);
}

impl<T, F> ContentProvider<T> for F
where
    F: FnMut(LoadRequest<T>),
{
    fn load(&mut self, request: LoadRequest<T>) {
        self(request)
    }
}

/// A provider that completes immediately with a fixed set of sections.
#[derive(Debug, Clone, Default)]
pub struct StaticContent<T> {
    sections: Sections<T>,
}

impl<T: Clone> StaticContent<T> {
    /// Creates a provider that always yields `sections`.
    pub fn new(sections: Sections<T>) -> Self {
        Self { sections }
    }

    /// Creates a provider with a single section of `items`.
    pub fn single_section(items: Vec<T>) -> Self {
        Self::new(vec![items])
    }
}

impl<T: Clone> ContentProvider<T> for StaticContent<T> {
    fn load(&mut self, request: LoadRequest<T>) {
        request.succeed(self.sections.clone());
    }
}
