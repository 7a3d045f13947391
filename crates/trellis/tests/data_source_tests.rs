//! Tests for composed data sources as seen by a list control.

use std::sync::Arc;

use parking_lot::Mutex;
use trellis::model::{ApplyOrder, SinkEvent, TreeConfigBuilder};
use trellis::prelude::*;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ip(section: usize, item: usize) -> IndexPath {
    IndexPath::new(section, item)
}

/// A leaf whose loads stay in flight until the test completes them.
fn deferred_leaf(
    tree: &mut DataSourceTree<u32>,
    title: &str,
) -> (DataSourceId, Arc<Mutex<Vec<LoadRequest<u32>>>>) {
    let pending = Arc::new(Mutex::new(Vec::new()));
    let parked = pending.clone();
    let leaf = tree.create_leaf(title, move |request: LoadRequest<u32>| {
        parked.lock().push(request);
    });
    (leaf, pending)
}

fn total_child_sections(tree: &DataSourceTree<u32>, aggregate: DataSourceId) -> usize {
    tree.children(aggregate)
        .unwrap()
        .iter()
        .map(|&child| tree.number_of_sections(child).unwrap())
        .sum()
}

#[test]
fn test_aggregate_sections_track_membership() {
    init_logging();
    let mut tree = DataSourceTree::new();
    let aggregate = tree.create_aggregate("All");
    let mut children = Vec::new();

    for (index, sections) in [2usize, 0, 3, 1].into_iter().enumerate() {
        let content = (0..sections).map(|s| vec![s as u32]).collect();
        let child = tree.create_static(format!("Child {index}"), content);
        tree.add_data_source(aggregate, child).unwrap();
        children.push(child);
        assert_eq!(
            tree.number_of_sections(aggregate).unwrap(),
            total_child_sections(&tree, aggregate)
        );
    }
    assert_eq!(tree.number_of_sections(aggregate).unwrap(), 6);

    for child in [children[2], children[0]] {
        tree.remove_data_source(aggregate, child).unwrap();
        assert_eq!(
            tree.number_of_sections(aggregate).unwrap(),
            total_child_sections(&tree, aggregate)
        );
    }
    assert_eq!(tree.number_of_sections(aggregate).unwrap(), 1);
    assert!(!tree.contains(children[2]));
}

#[test]
fn test_remapping_round_trips() {
    let mut tree = DataSourceTree::new();
    let aggregate = tree.create_aggregate("All");
    let a = tree.create_static("A", vec![vec![1, 2], vec![3]]);
    let empty = tree.create_static("Empty", Vec::new());
    let b = tree.create_static("B", vec![vec![4, 5, 6]]);
    for child in [a, empty, b] {
        tree.add_data_source(aggregate, child).unwrap();
    }

    for section in 0..tree.number_of_sections(aggregate).unwrap() {
        for item in 0..tree.number_of_items(aggregate, section).unwrap() {
            let global = ip(section, item);
            let (child, local) = tree.local_index_path(aggregate, global).unwrap();
            assert_eq!(tree.global_index_path(child, local).unwrap(), global);
            assert_eq!(tree.item(child, local).unwrap(), tree.item(aggregate, global).unwrap());
        }
    }

    assert!(matches!(
        tree.local_index_path(aggregate, ip(3, 0)),
        Err(DataSourceError::SectionOutOfRange { section: 3, count: 3 })
    ));
}

#[test]
fn test_child_section_insert_is_offset_on_root() {
    let mut tree = DataSourceTree::new();
    let root = tree.create_aggregate("Root");
    let a = tree.create_static("A", vec![vec![1], vec![2]]);
    let b = tree.create_static("B", vec![vec![3]]);
    tree.add_data_source(root, a).unwrap();
    tree.add_data_source(root, b).unwrap();
    assert_eq!(tree.number_of_sections(root).unwrap(), 3);

    let sink = RecordingSink::new();
    tree.set_sink(root, sink.clone()).unwrap();
    tree.insert_section(b, 0, vec![9]).unwrap();

    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::BeginUpdates,
            SinkEvent::Apply(vec![UpdateOperation::InsertSection(2)]),
            SinkEvent::EndUpdates,
        ]
    );
    assert_eq!(tree.number_of_sections(root).unwrap(), 4);
    assert_eq!(*tree.item(root, ip(2, 0)).unwrap(), 9);
}

#[test]
fn test_segmented_selection_follows_removals() {
    let mut tree = DataSourceTree::new();
    let tabs = tree.create_segmented("Tabs");
    assert_eq!(tree.selected_index(tabs).unwrap(), None);

    let a = tree.create_static("A", vec![vec![1]]);
    let b = tree.create_static("B", vec![vec![2]]);
    let c = tree.create_static("C", vec![vec![3]]);
    for child in [a, b, c] {
        tree.add_data_source(tabs, child).unwrap();
        assert_eq!(tree.selected_index(tabs).unwrap(), Some(0));
    }

    tree.set_selected_data_source(tabs, b).unwrap();
    tree.remove_data_source(tabs, b).unwrap();
    assert_eq!(tree.selected_data_source(tabs).unwrap(), Some(c));
    assert_eq!(tree.selected_index(tabs).unwrap(), Some(1));

    tree.remove_data_source(tabs, c).unwrap();
    assert_eq!(tree.selected_data_source(tabs).unwrap(), Some(a));

    assert!(matches!(
        tree.set_selected_index(tabs, 1),
        Err(DataSourceError::InvalidArgument(_))
    ));
    assert_eq!(tree.selected_index(tabs).unwrap(), Some(0));

    tree.remove_data_source(tabs, a).unwrap();
    assert_eq!(tree.selected_index(tabs).unwrap(), None);
}

#[test]
fn test_batch_flushes_as_one_transaction() {
    let mut tree = DataSourceTree::new();
    let root = tree.create_aggregate("Root");
    let a = tree.create_static("A", vec![vec![1, 2, 3]]);
    let b = tree.create_static("B", vec![vec![4, 5]]);
    tree.add_data_source(root, a).unwrap();
    tree.add_data_source(root, b).unwrap();
    let sink = RecordingSink::new();
    tree.set_sink(root, sink.clone()).unwrap();

    let completed = Arc::new(Mutex::new(0));
    let counter = completed.clone();
    tree.notify_batch_update(
        root,
        |tree| {
            tree.insert_items(a, 0, 3, vec![7, 8])?;
            tree.append_items(b, 0, vec![9])?;
            tree.remove_items(b, &[ip(0, 0), ip(0, 1)])?;
            Ok(())
        },
        Some(Box::new(move || *counter.lock() += 1)),
    )
    .unwrap();

    assert_eq!(sink.begin_count(), 1);
    let transactions = sink.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].len(), 5);
    assert_eq!(*completed.lock(), 1);
    assert!(!tree.has_pending_updates(root).unwrap());
}

#[test]
fn test_canonical_order_within_a_transaction() {
    let mut tree = DataSourceTree::new();
    let leaf = tree.create_static("Leaf", vec![vec![1, 2, 3], vec![4]]);
    let sink = RecordingSink::new();
    tree.set_sink(leaf, sink.clone()).unwrap();

    tree.notify_batch_update(
        leaf,
        |tree| {
            tree.notify_items_inserted(leaf, &[ip(0, 1)])?;
            tree.notify_items_removed(leaf, &[ip(0, 0), ip(0, 2)])?;
            tree.notify_sections_removed(leaf, &SectionSet::single(1))?;
            Ok(())
        },
        None,
    )
    .unwrap();

    assert_eq!(
        sink.transactions(),
        vec![vec![
            UpdateOperation::RemoveSection(1),
            UpdateOperation::RemoveItem(ip(0, 2)),
            UpdateOperation::RemoveItem(ip(0, 0)),
            UpdateOperation::InsertItem(ip(0, 1)),
        ]]
    );
}

#[test]
fn test_enqueued_order_is_preserved_when_configured() {
    let config = TreeConfigBuilder::new().apply_order(ApplyOrder::Enqueued).build();
    let mut tree = DataSourceTree::with_config(config);
    let leaf = tree.create_static("Leaf", vec![vec![1, 2, 3]]);
    let sink = RecordingSink::new();
    tree.set_sink(leaf, sink.clone()).unwrap();

    tree.notify_batch_update(
        leaf,
        |tree| {
            tree.notify_items_inserted(leaf, &[ip(0, 1)])?;
            tree.notify_items_removed(leaf, &[ip(0, 0)])?;
            Ok(())
        },
        None,
    )
    .unwrap();

    assert_eq!(
        sink.transactions(),
        vec![vec![
            UpdateOperation::InsertItem(ip(0, 1)),
            UpdateOperation::RemoveItem(ip(0, 0)),
        ]]
    );
}

#[test]
fn test_reload_discards_pending_operations() {
    let mut tree = DataSourceTree::new();
    let root = tree.create_aggregate("Root");
    let a = tree.create_static("A", vec![vec![1]]);
    tree.add_data_source(root, a).unwrap();
    let sink = RecordingSink::new();
    tree.set_sink(root, sink.clone()).unwrap();

    tree.notify_batch_update(
        root,
        |tree| {
            tree.append_items(a, 0, vec![2, 3])?;
            tree.notify_did_reload_data(a)?;
            Ok(())
        },
        None,
    )
    .unwrap();

    assert_eq!(sink.events(), vec![SinkEvent::ReloadAll]);
    assert_eq!(tree.number_of_items(root, 0).unwrap(), 3);
}

#[test]
fn test_nested_batch_is_rejected() {
    let mut tree: DataSourceTree<u32> = DataSourceTree::new();
    let leaf = tree.create_static("Leaf", vec![vec![1]]);

    let result = tree.notify_batch_update(
        leaf,
        |tree| tree.notify_batch_update(leaf, |_| Ok(()), None),
        None,
    );
    assert_eq!(result, Err(DataSourceError::ReentrantBatch));
}

#[test]
fn test_empty_load_settles_to_no_content() {
    init_logging();
    let mut tree = DataSourceTree::new();
    let (leaf, pending) = deferred_leaf(&mut tree, "Inbox");
    assert_eq!(*tree.loading_state(leaf).unwrap(), LoadingState::Initial);

    tree.load_content(leaf).unwrap();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let recorded = outcomes.clone();
    tree.when_loaded(leaf, move |outcome: &LoadOutcome| recorded.lock().push(outcome.clone()))
        .unwrap();

    let request = pending.lock().pop().unwrap();
    request.succeed(Vec::new());
    tree.process_completions();

    assert_eq!(*tree.loading_state(leaf).unwrap(), LoadingState::NoContent);
    assert!(tree.obscured_by_placeholder(leaf).unwrap());
    assert!(matches!(tree.placeholder(leaf).unwrap(), Some(Placeholder::NoContent(_))));

    let outcomes = outcomes.lock();
    assert_eq!(*outcomes, vec![LoadOutcome::NoContent]);
    assert!(outcomes[0].error().is_none());
}

#[test]
fn test_failed_load_surfaces_as_error_state() {
    let mut tree = DataSourceTree::new();
    let root = tree.create_aggregate("Root");
    let (leaf, pending) = deferred_leaf(&mut tree, "Remote");
    tree.add_data_source(root, leaf).unwrap();

    let request = pending.lock().pop().unwrap();
    std::thread::spawn(move || request.fail("offline"))
        .join()
        .unwrap();
    assert_eq!(tree.process_completions(), 1);

    let failure = LoadFailure::new("offline");
    assert_eq!(*tree.loading_state(leaf).unwrap(), LoadingState::Error(failure.clone()));
    assert_eq!(*tree.loading_state(root).unwrap(), LoadingState::Error(failure));
    assert_eq!(tree.placeholder(leaf).unwrap(), None);
    assert!(matches!(tree.placeholder(root).unwrap(), Some(Placeholder::Error { .. })));

    tree.load_content(leaf).unwrap();
    assert_eq!(*tree.loading_state(root).unwrap(), LoadingState::LoadingContent);
}

#[test]
fn test_events_reach_observers() {
    let mut tree = DataSourceTree::new();
    let tabs = tree.create_segmented("Tabs");
    let a = tree.create_static("A", vec![vec![1]]);
    let b = tree.create_static("B", vec![vec![2]]);
    tree.add_data_source(tabs, a).unwrap();
    tree.add_data_source(tabs, b).unwrap();

    let selections = Arc::new(Mutex::new(Vec::new()));
    let recorded = selections.clone();
    tree.events().connect(move |event: &DataSourceEvent| {
        if let DataSourceEvent::SelectionChanged { selected, .. } = event {
            recorded.lock().push(*selected);
        }
    });

    tree.set_selected_index(tabs, 1).unwrap();
    tree.set_selected_index(tabs, 1).unwrap();
    assert_eq!(*selections.lock(), vec![Some(1)]);
}

#[test]
fn test_batch_paths_do_not_depend_on_edit_order() {
    let build = || {
        let mut tree = DataSourceTree::new();
        let root = tree.create_aggregate("Root");
        let a = tree.create_static("A", vec![vec![1], vec![2]]);
        let b = tree.create_static("B", vec![vec![3]]);
        tree.add_data_source(root, a).unwrap();
        tree.add_data_source(root, b).unwrap();
        let sink = RecordingSink::new();
        tree.set_sink(root, sink.clone()).unwrap();
        (tree, root, a, b, sink)
    };
    let expected = vec![vec![UpdateOperation::RemoveSection(0), UpdateOperation::RemoveItem(ip(2, 0))]];

    let (mut tree, root, a, b, sink) = build();
    tree.notify_batch_update(
        root,
        |tree| {
            tree.remove_items(b, &[ip(0, 0)])?;
            tree.remove_sections(a, &SectionSet::single(0))?;
            Ok(())
        },
        None,
    )
    .unwrap();
    assert_eq!(sink.transactions(), expected);

    let (mut tree, root, a, b, sink) = build();
    tree.notify_will_batch_update(root).unwrap();
    tree.remove_sections(a, &SectionSet::single(0)).unwrap();
    tree.notify_batch_update(root, |tree| tree.remove_items(b, &[ip(0, 0)]).map(drop), None)
        .unwrap();
    assert_eq!(sink.transactions(), expected);
}

#[test]
fn test_update_during_load_is_applied_after_content_arrives() {
    init_logging();
    let mut tree = DataSourceTree::new();
    let root = tree.create_aggregate("Root");
    let first = tree.create_static("First", vec![vec![10]]);
    let (feed, pending) = deferred_leaf(&mut tree, "Feed");
    tree.add_data_source(root, first).unwrap();
    tree.add_data_source(root, feed).unwrap();
    let sink = RecordingSink::new();
    tree.set_sink(root, sink.clone()).unwrap();
    assert_eq!(*tree.loading_state(feed).unwrap(), LoadingState::LoadingContent);

    tree.perform_update(feed, move |tree| tree.insert_items(feed, 0, 0, vec![99]), None)
        .unwrap();
    assert!(sink.events().is_empty());

    let request = pending.lock().pop().unwrap();
    request.succeed(vec![vec![1, 2]]);
    tree.process_completions();

    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::ReloadAll,
            SinkEvent::BeginUpdates,
            SinkEvent::Apply(vec![UpdateOperation::InsertItem(ip(1, 0))]),
            SinkEvent::EndUpdates,
        ]
    );
    assert_eq!(*tree.item(root, ip(1, 0)).unwrap(), 99);
    assert_eq!(tree.deferred_update_count(feed).unwrap(), 0);
}
