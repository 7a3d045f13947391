//! Configuration for a data-source tree.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::update::ApplyOrder;

/// Settings shared by every data source in a [`DataSourceTree`].
///
/// [`DataSourceTree`]: super::DataSourceTree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeConfig {
    /// Order in which a flushed transaction's operations reach the sink.
    pub apply_order: ApplyOrder,
    /// Apply load completions as soon as `load_content` returns, so that
    /// providers answering synchronously settle within the same call. When
    /// disabled, completions wait for an explicit `process_completions`.
    pub drain_completions_on_load: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            apply_order: ApplyOrder::Canonical,
            drain_completions_on_load: true,
        }
    }
}

/// Builder for [`TreeConfig`].
#[derive(Debug, Default)]
pub struct TreeConfigBuilder {
    config: TreeConfig,
}

impl TreeConfigBuilder {
    /// Starts from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the apply order of flushed transactions.
    pub fn apply_order(mut self, order: ApplyOrder) -> Self {
        self.config.apply_order = order;
        self
    }

    /// Sets whether completions are drained right after a load starts.
    pub fn drain_completions_on_load(mut self, drain: bool) -> Self {
        self.config.drain_completions_on_load = drain;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> TreeConfig {
        self.config
    }
}
