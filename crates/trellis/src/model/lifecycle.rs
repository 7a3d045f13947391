//! Content loading and placeholder bookkeeping across a tree.
//!
//! Leaves load through their providers; composites never load anything
//! themselves. A composite's loading state is derived from its children every
//! time one of them changes, and the obscured flag of every data source below
//! the affected root is recomputed afterwards.

use trellis_core::logging::{span_names, targets};
use trellis_core::{DataSourceError, LoadFailure, PerfSpan, Result};

use super::loading::{LoadOutcome, LoadingState};
use super::placeholder::{Placeholder, PlaceholderContent};
use super::provider::{LoadRequest, Sections};
use super::sink::UpdateCompletion;
use super::tree::{Content, DataSourceEvent, DataSourceId, DataSourceKind, DataSourceTree, DeferredUpdate};
use super::update::BatchScope;

/// Total number of items across all sections.
fn item_total<T>(sections: &Sections<T>) -> usize {
    sections.iter().map(Vec::len).sum()
}

/// Loading state of an aggregate whose children are in `states`.
fn aggregate_state(states: &[&LoadingState]) -> LoadingState {
    if states.iter().all(|state| **state == LoadingState::Initial) {
        return LoadingState::Initial;
    }
    if states.iter().any(|state| **state == LoadingState::LoadingContent) {
        return LoadingState::LoadingContent;
    }
    if let Some(failure) = states.iter().find_map(|state| state.error()) {
        return LoadingState::Error(failure.clone());
    }
    if states
        .iter()
        .filter(|state| state.is_settled())
        .all(|state| **state == LoadingState::NoContent)
    {
        LoadingState::NoContent
    } else {
        LoadingState::ContentLoaded
    }
}

impl<T: 'static> DataSourceTree<T> {
    /// The data source's loading state.
    pub fn loading_state(&self, id: DataSourceId) -> Result<&LoadingState> {
        Ok(self.node(id)?.loading.state())
    }

    /// Starts a new load cycle.
    ///
    /// A leaf asks its provider for content; a static leaf completes at once
    /// with what it holds. A segmented composite loads its selected child and
    /// an aggregate loads every child. Loading is never retried on failure.
    #[tracing::instrument(skip(self), target = "trellis::loading", level = "debug")]
    pub fn load_content(&mut self, id: DataSourceId) -> Result<()> {
        let _perf = PerfSpan::new(span_names::LOAD);
        self.start_load(id)?;
        if self.config.drain_completions_on_load {
            self.process_completions();
        }
        Ok(())
    }

    fn start_load(&mut self, id: DataSourceId) -> Result<()> {
        let node = self.node_mut(id)?;
        node.needs_load = false;
        match node.content.kind() {
            DataSourceKind::Leaf => self.start_leaf_load(id),
            DataSourceKind::Segmented => match self.selected_data_source(id)? {
                Some(child) => self.start_load(child),
                None => Ok(()),
            },
            DataSourceKind::Aggregate => {
                for child in self.children(id)?.to_vec() {
                    self.start_load(child)?;
                }
                Ok(())
            }
        }
    }

    fn start_leaf_load(&mut self, id: DataSourceId) -> Result<()> {
        let sender = self.sender.clone();
        let generation = self.node_mut(id)?.loading.begin_load();
        self.events.emit(DataSourceEvent::WillLoadContent { source: id });
        self.refresh_states_from(id);

        let request = LoadRequest::new(id, generation, sender);
        let Content::Leaf { provider, .. } = &mut self.node_mut(id)?.content else {
            return Err(DataSourceError::NotALeaf);
        };
        match provider.as_mut() {
            Some(provider) => {
                tracing::trace!(target: targets::LOADING, ?id, generation, "requesting content");
                provider.load(request);
            }
            None => {
                drop(request);
                self.finish_load(id, generation, Ok(None));
            }
        }
        Ok(())
    }

    /// Applies every load completion received so far and returns how many
    /// were processed, stale ones included.
    ///
    /// Hosts whose providers complete on other threads call this from the
    /// thread that owns the tree.
    pub fn process_completions(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.finish_load(completion.source, completion.generation, completion.result.map(Some));
            processed += 1;
        }
        if processed > 0 {
            trellis_core::trellis_trace!(processed, "load completions applied");
        }
        processed
    }

    /// Ends a leaf's load cycle. `Ok(None)` keeps the current content.
    fn finish_load(&mut self, id: DataSourceId, generation: u64, result: std::result::Result<Option<Sections<T>>, LoadFailure>) {
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::debug!(target: targets::LOADING, ?id, "completion for destroyed data source");
            return;
        };
        let Content::Leaf { sections, .. } = &mut node.content else {
            return;
        };
        let counted = match &result {
            Ok(Some(loaded)) => Ok(item_total(loaded)),
            Ok(None) => Ok(item_total(sections)),
            Err(failure) => Err(failure.clone()),
        };
        let Some(outcome) = node.loading.complete(generation, counted) else {
            return;
        };

        let replaced = match result {
            Ok(Some(loaded)) => {
                *sections = loaded;
                true
            }
            _ => false,
        };
        tracing::debug!(target: targets::LOADING, ?id, generation, ?outcome, replaced, "load finished");

        if replaced {
            if let Err(error) = self.notify_did_reload_data(id) {
                tracing::warn!(target: targets::LOADING, ?id, %error, "could not announce loaded content");
            }
        }
        self.events.emit(DataSourceEvent::DidLoadContent {
            source: id,
            error: outcome.error().cloned(),
        });
        self.refresh_states_from(id);
    }

    /// Runs `work` as a batch update of `id`, or holds it until `id` stops
    /// loading.
    ///
    /// While `id` is `LoadingContent`, `work` is queued on it and nothing is
    /// reported. Queued work runs in order, each in its own batch, right
    /// after the load cycle ends and the new content has been announced.
    /// Inside a running batch of the same root, `work` joins that batch.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::InvalidDataSource`] for unknown ids, or whatever
    /// `work` returns when it runs immediately. Errors from queued work are
    /// logged.
    pub fn perform_update<W>(&mut self, id: DataSourceId, work: W, on_complete: Option<UpdateCompletion>) -> Result<()>
    where
        W: FnOnce(&mut Self) -> Result<()> + 'static,
    {
        let node = self.node_mut(id)?;
        if *node.loading.state() == LoadingState::LoadingContent {
            node.deferred.push(DeferredUpdate {
                work: Box::new(work),
                on_complete,
            });
            tracing::trace!(target: targets::UPDATE, ?id, queued = node.deferred.len(), "update deferred until loaded");
            return Ok(());
        }
        self.perform_update_now(id, Box::new(work), on_complete)
    }

    /// Returns the number of updates waiting for `id` to finish loading.
    pub fn deferred_update_count(&self, id: DataSourceId) -> Result<usize> {
        Ok(self.node(id)?.deferred.len())
    }

    fn perform_update_now(
        &mut self,
        id: DataSourceId,
        work: Box<dyn FnOnce(&mut Self) -> Result<()>>,
        on_complete: Option<UpdateCompletion>,
    ) -> Result<()> {
        let root = self.root_of(id)?;
        if self.node(root)?.queue.scope() == BatchScope::Running {
            work(self)?;
            if let Some(on_complete) = on_complete {
                on_complete();
            }
            return Ok(());
        }
        self.notify_batch_update(id, work, on_complete)
    }

    /// Runs the updates queued on `id` once it is no longer loading.
    fn run_deferred_updates(&mut self, id: DataSourceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.deferred.is_empty() || *node.loading.state() == LoadingState::LoadingContent {
            return;
        }
        let mut queued = std::mem::take(&mut node.deferred).into_iter();
        tracing::debug!(target: targets::UPDATE, ?id, count = queued.len(), "running deferred updates");

        while let Some(update) = queued.next() {
            if let Err(error) = self.perform_update_now(id, update.work, update.on_complete) {
                trellis_core::trellis_warn!(?id, %error, "deferred update failed");
            }
            // Work that restarts loading sends the rest back to wait.
            match self.nodes.get_mut(id) {
                Some(node) if *node.loading.state() == LoadingState::LoadingContent => {
                    let later = std::mem::replace(&mut node.deferred, queued.collect());
                    node.deferred.extend(later);
                    return;
                }
                Some(_) => {}
                None => return,
            }
        }
    }

    /// Marks a data source to be loaded by the next [`load_if_needed`].
    ///
    /// Marking several times before that pass loads once.
    ///
    /// [`load_if_needed`]: Self::load_if_needed
    pub fn set_needs_load_content(&mut self, id: DataSourceId) -> Result<()> {
        self.node_mut(id)?.needs_load = true;
        tracing::trace!(target: targets::LOADING, ?id, "load scheduled");
        Ok(())
    }

    /// Returns `true` if the data source is marked for loading.
    pub fn needs_load_content(&self, id: DataSourceId) -> Result<bool> {
        Ok(self.node(id)?.needs_load)
    }

    /// Loads every data source marked with [`set_needs_load_content`] and
    /// returns how many load cycles were started.
    ///
    /// [`set_needs_load_content`]: Self::set_needs_load_content
    pub fn load_if_needed(&mut self) -> Result<usize> {
        let marked: Vec<DataSourceId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.needs_load)
            .map(|(id, _)| id)
            .collect();

        let mut started = 0;
        for id in marked {
            // Loading a composite may already have loaded a marked child.
            if self.nodes.get(id).is_some_and(|node| node.needs_load) {
                self.start_load(id)?;
                started += 1;
            }
        }
        if started > 0 && self.config.drain_completions_on_load {
            self.process_completions();
        }
        Ok(started)
    }

    /// Clears content and returns the data source, and everything beneath
    /// it, to `Initial`. Loads in flight become stale.
    pub fn reset_content(&mut self, id: DataSourceId) -> Result<()> {
        self.reset_subtree(id)?;
        self.refresh_states_from(id);
        Ok(())
    }

    fn reset_subtree(&mut self, id: DataSourceId) -> Result<()> {
        let node = self.node_mut(id)?;
        node.loading.reset();
        node.needs_load = false;
        let (cleared, children) = match &mut node.content {
            Content::Leaf { sections, .. } => {
                let cleared = !sections.is_empty();
                sections.clear();
                (cleared, Vec::new())
            }
            composite => (false, composite.children().to_vec()),
        };
        tracing::debug!(target: targets::LOADING, ?id, "content reset");

        if cleared {
            self.notify_did_reload_data(id)?;
        }
        for child in children {
            self.reset_subtree(child)?;
        }
        Ok(())
    }

    /// Runs `continuation` once the data source's state is settled.
    ///
    /// Runs immediately if it already is; otherwise exactly once, on the next
    /// transition into `ContentLoaded`, `NoContent` or `Error`.
    pub fn when_loaded<F>(&mut self, id: DataSourceId, continuation: F) -> Result<()>
    where
        F: FnOnce(&LoadOutcome) + 'static,
    {
        self.node_mut(id)?.loading.when_loaded(Box::new(continuation));
        Ok(())
    }

    /// Returns `true` if the data source or any ancestor shows a placeholder.
    pub fn obscured_by_placeholder(&self, id: DataSourceId) -> Result<bool> {
        let mut current = Some(id);
        while let Some(source) = current {
            let node = self.node(source)?;
            if node.loading.state().shows_placeholder() {
                return Ok(true);
            }
            current = node.parent;
        }
        Ok(false)
    }

    /// What the data source itself should display instead of its items.
    ///
    /// Returns `None` when it shows items, and also when an ancestor already
    /// displays a placeholder covering it.
    pub fn placeholder(&self, id: DataSourceId) -> Result<Option<Placeholder>> {
        let node = self.node(id)?;
        let mut ancestor = node.parent;
        while let Some(source) = ancestor {
            let ancestor_node = self.node(source)?;
            if ancestor_node.loading.state().shows_placeholder() {
                return Ok(None);
            }
            ancestor = ancestor_node.parent;
        }

        Ok(match node.loading.state() {
            LoadingState::LoadingContent => Some(Placeholder::Loading),
            LoadingState::NoContent => Some(Placeholder::NoContent(node.no_content.clone())),
            LoadingState::Error(failure) => Some(Placeholder::error(&node.error, failure)),
            LoadingState::Initial | LoadingState::ContentLoaded => None,
        })
    }

    /// Sets what to display when a load yields no items.
    pub fn set_no_content_placeholder(&mut self, id: DataSourceId, content: PlaceholderContent) -> Result<()> {
        self.node_mut(id)?.no_content = content;
        Ok(())
    }

    /// Sets what to display when a load fails.
    pub fn set_error_placeholder(&mut self, id: DataSourceId, content: PlaceholderContent) -> Result<()> {
        self.node_mut(id)?.error = content;
        Ok(())
    }

    /// Moves a settled leaf between `ContentLoaded` and `NoContent` when an
    /// edit empties or fills it.
    pub(super) fn settle_after_edit(&mut self, leaf: DataSourceId) {
        let Some(node) = self.nodes.get_mut(leaf) else {
            return;
        };
        let Content::Leaf { sections, .. } = &node.content else {
            return;
        };
        let has_items = item_total(sections) > 0;
        let settled = match node.loading.state() {
            LoadingState::ContentLoaded if !has_items => LoadingState::NoContent,
            LoadingState::NoContent if has_items => LoadingState::ContentLoaded,
            _ => return,
        };
        node.loading.set_derived(settled);
        self.refresh_states_from(leaf);
    }

    /// Re-derives the state of `id` (if it is a composite) and of each of its
    /// ancestors, recomputes placeholders below the root, then runs updates
    /// deferred on any of them that stopped loading.
    pub(super) fn refresh_states_from(&mut self, id: DataSourceId) {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(source) = current {
            self.update_derived_state(source);
            chain.push(source);
            current = self.nodes.get(source).and_then(|node| node.parent);
        }
        if let Ok(root) = self.root_of(id) {
            self.refresh_placeholders(root);
        }
        for source in chain {
            self.run_deferred_updates(source);
        }
    }

    fn derived_state(&self, id: DataSourceId) -> Option<LoadingState> {
        match &self.nodes.get(id)?.content {
            Content::Leaf { .. } => None,
            Content::Segmented { children, selected } => Some(
                selected
                    .and_then(|i| children.get(i))
                    .and_then(|&child| self.nodes.get(child))
                    .map(|child| child.loading.state().clone())
                    .unwrap_or_default(),
            ),
            Content::Aggregate { children } => {
                let states: Vec<&LoadingState> = children
                    .iter()
                    .filter_map(|&child| self.nodes.get(child))
                    .map(|child| child.loading.state())
                    .collect();
                Some(aggregate_state(&states))
            }
        }
    }

    fn update_derived_state(&mut self, id: DataSourceId) {
        let Some(derived) = self.derived_state(id) else {
            return;
        };
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !node.loading.set_derived(derived) {
            return;
        }
        match node.loading.state() {
            LoadingState::LoadingContent => {
                self.events.emit(DataSourceEvent::WillLoadContent { source: id });
            }
            state if state.is_settled() => {
                let error = state.error().cloned();
                self.events.emit(DataSourceEvent::DidLoadContent { source: id, error });
            }
            _ => {}
        }
    }

    fn refresh_placeholders(&mut self, root: DataSourceId) {
        let mut stack = vec![(root, false)];
        while let Some((id, covered)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let obscured = covered || node.loading.state().shows_placeholder();
            if node.obscured != obscured {
                node.obscured = obscured;
                tracing::trace!(target: targets::LOADING, ?id, obscured, "placeholder visibility changed");
                self.events.emit(DataSourceEvent::PlaceholderChanged { source: id, obscured });
            }
            stack.extend(node.content.children().iter().map(|&child| (child, obscured)));
        }
    }
}
