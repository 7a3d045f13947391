//! The list-control side of the notification channel.
//!
//! A [`ListControlSink`] is whatever applies flushed transactions to an actual
//! table or collection control. Trellis only requires that the sink applies
//! everything between `begin_updates` and `end_updates` as one visual update.

use std::sync::Arc;

use parking_lot::Mutex;

use super::update::UpdateOperation;

/// Callback run once the sink has applied a transaction.
pub type UpdateCompletion = Box<dyn FnOnce()>;

/// Receives batched mutations from the root of a data-source tree.
pub trait ListControlSink {
    /// Starts an atomic update transaction.
    fn begin_updates(&mut self);

    /// Applies the transaction's operations, in the order given.
    fn apply_operations(&mut self, operations: &[UpdateOperation]);

    /// Ends the transaction. `on_complete` must be called once the update has
    /// been applied (possibly after an animation finishes).
    fn end_updates(&mut self, on_complete: UpdateCompletion);

    /// Discards all incremental state and reloads everything.
    fn reload_all(&mut self);
}

/// What a [`RecordingSink`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// `begin_updates` was called.
    BeginUpdates,
    /// `apply_operations` was called with these operations.
    Apply(Vec<UpdateOperation>),
    /// `end_updates` was called.
    EndUpdates,
    /// `reload_all` was called.
    ReloadAll,
}

/// A sink that records every call, for hosts without a real control and for
/// tests.
///
/// Clones share the same log, so one clone can be handed to the tree while
/// another is kept for inspection. Completions run immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    /// Creates a sink with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call seen so far, in order.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// The operations of each applied transaction, in order.
    pub fn transactions(&self) -> Vec<Vec<UpdateOperation>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Apply(ops) => Some(ops.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `begin_updates` calls.
    pub fn begin_count(&self) -> usize {
        self.count(|event| *event == SinkEvent::BeginUpdates)
    }

    /// Number of `reload_all` calls.
    pub fn reload_count(&self) -> usize {
        self.count(|event| *event == SinkEvent::ReloadAll)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

impl ListControlSink for RecordingSink {
    fn begin_updates(&mut self) {
        self.events.lock().push(SinkEvent::BeginUpdates);
    }

    fn apply_operations(&mut self, operations: &[UpdateOperation]) {
        self.events.lock().push(SinkEvent::Apply(operations.to_vec()));
    }

    fn end_updates(&mut self, on_complete: UpdateCompletion) {
        self.events.lock().push(SinkEvent::EndUpdates);
        on_complete();
    }

    fn reload_all(&mut self) {
        self.events.lock().push(SinkEvent::ReloadAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexPath;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_recording_sink_shares_log_between_clones() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();

        let done = Rc::new(Cell::new(false));
        let done_clone = done.clone();

        handle.begin_updates();
        handle.apply_operations(&[UpdateOperation::InsertItem(IndexPath::new(0, 0))]);
        handle.end_updates(Box::new(move || done_clone.set(true)));
        handle.reload_all();

        assert!(done.get());
        assert_eq!(sink.begin_count(), 1);
        assert_eq!(sink.reload_count(), 1);
        assert_eq!(
            sink.transactions(),
            vec![vec![UpdateOperation::InsertItem(IndexPath::new(0, 0))]]
        );
        assert_eq!(sink.events().len(), 4);

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
