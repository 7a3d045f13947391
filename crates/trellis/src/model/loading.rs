//! Content loading lifecycle.
//!
//! Every data source carries a [`LoadingStateMachine`]. It tracks whether the
//! content has been requested, is in flight, or has settled, and it decides
//! when the data source must be hidden behind a placeholder.
//!
//! ```text
//!            begin_load              complete
//! Initial ─────────────> LoadingContent ─────> ContentLoaded
//!    ^                        ^          ├───> NoContent
//!    │ reset                  │          └───> Error(reason)
//!    └── any state            └── begin_load from any settled state
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use trellis_core::LoadFailure;
use trellis_core::logging::targets;

/// The loading state of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LoadingState {
    /// Content has never been requested.
    #[default]
    Initial,
    /// A load cycle is in flight.
    LoadingContent,
    /// The last load produced at least one item.
    ContentLoaded,
    /// The last load succeeded with zero items.
    NoContent,
    /// The last load failed.
    Error(LoadFailure),
}

impl LoadingState {
    /// Returns `true` for the states that end a load cycle.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::ContentLoaded | Self::NoContent | Self::Error(_))
    }

    /// Returns `true` while the data source should be hidden behind a
    /// placeholder (activity indicator, empty or error display).
    pub fn shows_placeholder(&self) -> bool {
        matches!(self, Self::LoadingContent | Self::NoContent | Self::Error(_))
    }

    /// Returns the outcome for a settled state.
    pub fn outcome(&self) -> Option<LoadOutcome> {
        match self {
            Self::ContentLoaded => Some(LoadOutcome::ContentLoaded),
            Self::NoContent => Some(LoadOutcome::NoContent),
            Self::Error(failure) => Some(LoadOutcome::Error(failure.clone())),
            Self::Initial | Self::LoadingContent => None,
        }
    }

    /// Returns the failure when in the error state.
    pub fn error(&self) -> Option<&LoadFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::LoadingContent => write!(f, "loading"),
            Self::ContentLoaded => write!(f, "loaded"),
            Self::NoContent => write!(f, "no content"),
            Self::Error(failure) => write!(f, "error: {failure}"),
        }
    }
}

/// How a load cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Content was loaded.
    ContentLoaded,
    /// The load succeeded but produced no items.
    NoContent,
    /// The load failed.
    Error(LoadFailure),
}

impl LoadOutcome {
    /// Returns the failure, if the load failed.
    pub fn error(&self) -> Option<&LoadFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// The settled state corresponding to this outcome.
    pub fn into_state(self) -> LoadingState {
        match self {
            Self::ContentLoaded => LoadingState::ContentLoaded,
            Self::NoContent => LoadingState::NoContent,
            Self::Error(failure) => LoadingState::Error(failure),
        }
    }
}

/// A continuation registered with [`LoadingStateMachine::when_loaded`].
pub type WhenLoaded = Box<dyn FnOnce(&LoadOutcome)>;

/// Tracks the lifecycle of a data source's content.
///
/// Each load cycle gets a new generation number. Completions are accepted only
/// for the current generation while a load is in flight, so a completion that
/// raced with a newer cycle or with a reset is ignored.
pub struct LoadingStateMachine {
    state: LoadingState,
    generation: u64,
    continuations: Vec<WhenLoaded>,
}

impl Default for LoadingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingStateMachine {
    /// Creates a machine in the `Initial` state.
    pub fn new() -> Self {
        Self {
            state: LoadingState::Initial,
            generation: 0,
            continuations: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &LoadingState {
        &self.state
    }

    /// Returns the generation of the current (or last) load cycle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the number of continuations waiting for the next settled state.
    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    /// Starts a new load cycle from any state and returns its generation.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.transition(LoadingState::LoadingContent);
        self.generation
    }

    /// Completes the load cycle identified by `generation`.
    ///
    /// `result` carries the number of items the load produced, or the reason
    /// it failed. Returns the outcome, or `None` when the completion is stale.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<usize, LoadFailure>,
    ) -> Option<LoadOutcome> {
        if generation != self.generation || self.state != LoadingState::LoadingContent {
            tracing::debug!(
                target: targets::LOADING,
                generation,
                current = self.generation,
                state = %self.state,
                "ignoring stale load completion"
            );
            return None;
        }

        let outcome = match result {
            Ok(0) => LoadOutcome::NoContent,
            Ok(_) => LoadOutcome::ContentLoaded,
            Err(failure) => LoadOutcome::Error(failure),
        };
        self.transition(outcome.clone().into_state());
        Some(outcome)
    }

    /// Returns to `Initial`. Any load in flight becomes stale.
    ///
    /// Registered continuations stay registered for the next settled state.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.transition(LoadingState::Initial);
    }

    /// Replaces the state with one derived from other machines.
    ///
    /// Composites do not load anything themselves; their state follows their
    /// children. Returns `true` if the state changed.
    pub fn set_derived(&mut self, state: LoadingState) -> bool {
        if self.state == state {
            return false;
        }
        self.transition(state);
        true
    }

    /// Runs `continuation` once the state is settled.
    ///
    /// If the state is already settled the continuation runs immediately.
    /// Otherwise it runs exactly once, on the next transition into
    /// `ContentLoaded`, `NoContent` or `Error`.
    pub fn when_loaded(&mut self, continuation: WhenLoaded) {
        match self.state.outcome() {
            Some(outcome) => continuation(&outcome),
            None => self.continuations.push(continuation),
        }
    }

    fn transition(&mut self, state: LoadingState) {
        tracing::debug!(
            target: targets::LOADING,
            from = %self.state,
            to = %state,
            generation = self.generation,
            "loading state transition"
        );
        self.state = state;

        if let Some(outcome) = self.state.outcome() {
            for continuation in std::mem::take(&mut self.continuations) {
                continuation(&outcome);
            }
        }
    }
}

impl fmt::Debug for LoadingStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingStateMachine")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("continuations", &self.continuations.len())
            .finish()
    }
}
