//! Integration tests for the reconciliation engine.

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use syncflow_engine::{EngineError, EngineStatus, SyncConfig, SyncEngine, SyncEvent, SyncEventKind};
use syncflow_store::{
    MemoryStore, NewOperation, Operation, OperationStatus, OperationType, SyncStore,
};
use syncflow_testkit::prelude::*;
use tokio::sync::mpsc;

fn config() -> SyncConfig {
    SyncConfig::new([TODO]).with_auto_start(false)
}

fn memory_engine(config: SyncConfig) -> SyncEngine<MemoryStore> {
    SyncEngine::new(Arc::new(MemoryStore::new()), config).unwrap()
}

fn faulty_engine(config: SyncConfig) -> SyncEngine<FaultyStore<MemoryStore>> {
    SyncEngine::new(Arc::new(FaultyStore::new(MemoryStore::new())), config).unwrap()
}

async fn operation<S: SyncStore>(engine: &SyncEngine<S>, id: &str) -> Operation {
    engine
        .store()
        .get_operations()
        .await
        .unwrap()
        .into_iter()
        .find(|op| op.id == id)
        .unwrap()
}

fn store<S: SyncStore>(engine: &SyncEngine<S>) -> &S {
    engine.store()
}

fn pending(op_type: OperationType, entity: &str, data: serde_json::Value) -> NewOperation {
    NewOperation::pending(op_type, entity, data)
}

/// Collects every event of one kind.
fn record<S: SyncStore>(engine: &SyncEngine<S>, kind: SyncEventKind) -> Arc<Mutex<Vec<SyncEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.add_listener(kind, move |event| sink.lock().push(event.clone()));
    events
}

#[tokio::test]
async fn create_is_applied_in_one_cycle() {
    let engine = memory_engine(config());
    let op = seed(
        store(&engine),
        vec![pending(OperationType::Create, TODO, json!({"id": "t1", "title": "Test"}))],
    )
    .await
    .remove(0);

    engine.sync().await;

    assert_eq!(
        engine.get_entities(TODO).await.unwrap(),
        vec![entity(json!({"id": "t1", "title": "Test"}))]
    );
    assert_eq!(
        operation(&engine, &op.id).await.status,
        OperationStatus::Completed
    );
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[tokio::test]
async fn cycle_emits_lifecycle_events_in_order() {
    let engine = memory_engine(config());
    seed(store(&engine), vec![create_todo("t1", "A")]).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        SyncEventKind::SyncStart,
        SyncEventKind::OperationComplete,
        SyncEventKind::SyncComplete,
    ] {
        let sink = Arc::clone(&order);
        engine.add_listener(kind, move |event| sink.lock().push(event.kind()));
    }
    let completed = record(&engine, SyncEventKind::OperationComplete);

    engine.sync().await;

    assert_eq!(
        *order.lock(),
        vec![
            SyncEventKind::SyncStart,
            SyncEventKind::OperationComplete,
            SyncEventKind::SyncComplete
        ]
    );
    let completed = completed.lock();
    match &completed[0] {
        SyncEvent::OperationComplete(op) => assert_eq!(op.status, OperationStatus::Completed),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn operations_apply_in_queue_order() {
    let engine = memory_engine(config());
    seed(
        store(&engine),
        vec![
            create_todo("t1", "First"),
            create_todo("t2", "Second"),
            update_todo("t1", json!({"completed": true})),
            delete_todo("t2"),
        ],
    )
    .await;

    engine.sync().await;

    assert_eq!(
        engine.get_entities(TODO).await.unwrap(),
        vec![entity(json!({"id": "t1", "title": "First", "completed": true}))]
    );
    assert!(engine.get_pending_operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn completion_failure_exhausts_retries() {
    let engine = faulty_engine(config().with_retry_limit(2));
    let op = seed(store(&engine), vec![create_todo("t1", "Test")])
        .await
        .remove(0);
    engine.store().enable(Fault::CompleteOperation);

    engine.sync().await;
    let after_first = operation(&engine, &op.id).await;
    assert_eq!(after_first.retry_count, 1);
    assert_eq!(after_first.status, OperationStatus::Pending);

    engine.sync().await;
    let after_second = operation(&engine, &op.id).await;
    assert_eq!(after_second.retry_count, 2);
    assert_eq!(after_second.status, OperationStatus::Error);

    engine.sync().await;
    let after_third = operation(&engine, &op.id).await;
    assert_eq!(after_third, after_second);

    let stats = engine.stats();
    assert_eq!(stats.operations_failed, 2);
    assert_eq!(stats.operations_exhausted, 1);
    assert_eq!(stats.cycles_completed, 3);
}

#[tokio::test]
async fn save_failure_leaves_snapshot_untouched() {
    let engine = faulty_engine(config());
    let op = seed(store(&engine), vec![create_todo("t1", "Test")])
        .await
        .remove(0);
    engine.store().fail_next(Fault::SaveEntities, 1);

    engine.sync().await;
    assert!(engine.get_entities(TODO).await.unwrap().is_empty());
    assert_eq!(operation(&engine, &op.id).await.retry_count, 1);

    engine.sync().await;
    assert_eq!(engine.get_entities(TODO).await.unwrap().len(), 1);
    let op = operation(&engine, &op.id).await;
    assert_eq!(op.status, OperationStatus::Completed);
    assert_eq!(op.retry_count, 1);
}

#[tokio::test]
async fn failures_are_isolated_per_operation() {
    let engine = memory_engine(config());
    let ops = seed(
        store(&engine),
        vec![
            create_todo("t1", "A"),
            pending(OperationType::Update, TODO, json!({"title": "no id"})),
            create_todo("t2", "B"),
        ],
    )
    .await;

    engine.sync().await;

    assert_eq!(
        operation(&engine, &ops[0].id).await.status,
        OperationStatus::Completed
    );
    let bad = operation(&engine, &ops[1].id).await;
    assert_eq!(bad.status, OperationStatus::Pending);
    assert_eq!(bad.retry_count, 1);
    assert_eq!(
        operation(&engine, &ops[2].id).await.status,
        OperationStatus::Completed
    );
    assert_eq!(engine.get_entities(TODO).await.unwrap().len(), 2);
}

#[tokio::test]
async fn retry_bookkeeping_failure_does_not_abort_batch() {
    let engine = faulty_engine(config());
    let ops = seed(
        store(&engine),
        vec![create_todo("t1", "A"), create_todo("t2", "B")],
    )
    .await;
    engine.store().enable(Fault::AllUpdates);

    engine.sync().await;

    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(engine.stats().operations_failed, 2);
    for op in &ops {
        let stored = operation(&engine, &op.id).await;
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.status, OperationStatus::Pending);
    }
}

#[tokio::test]
async fn listing_failure_fails_the_cycle() {
    let engine = faulty_engine(config());
    seed(store(&engine), vec![create_todo("t1", "Test")]).await;
    let errors = record(&engine, SyncEventKind::SyncError);
    let completes = record(&engine, SyncEventKind::SyncComplete);
    engine.store().enable(Fault::ListOperations);

    engine.sync().await;

    assert_eq!(engine.status(), EngineStatus::Error);
    assert_eq!(completes.lock().len(), 0);
    {
        let errors = errors.lock();
        match &errors[0] {
            SyncEvent::SyncError(cause) => assert!(matches!(**cause, EngineError::Store(_))),
            other => panic!("unexpected event {other:?}"),
        }
    }
    let stats = engine.stats();
    assert_eq!(stats.cycles_failed, 1);
    assert!(stats.last_error.is_some());

    engine.store().disable(Fault::ListOperations);
    engine.sync().await;
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert!(engine.get_pending_operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_sync_is_a_noop() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(50)));
    let engine = SyncEngine::new(Arc::clone(&store), config()).unwrap();
    let starts = record(&engine, SyncEventKind::SyncStart);

    tokio::join!(engine.sync(), engine.sync(), engine.sync());

    assert_eq!(store.fetch_count(), 1);
    assert_eq!(store.max_concurrent_fetches(), 1);
    assert_eq!(starts.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sync_across_tasks() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(20)));
    let engine = SyncEngine::new(Arc::clone(&store), config()).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sync().await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.max_concurrent_fetches(), 1);
    assert!(store.fetch_count() >= 1);
}

#[tokio::test]
async fn remove_pending_returns_exactly_the_removed_set() {
    let (store, ops) = mixed_status_store().await;
    let engine = SyncEngine::new(Arc::new(store), config()).unwrap();

    let removed = engine.remove_pending_operations().await.unwrap();
    assert_eq!(removed, vec![ops[0].clone()]);

    let remaining = engine.store().get_operations().await.unwrap();
    assert_eq!(remaining, vec![ops[1].clone(), ops[2].clone()]);
    assert!(engine.remove_pending_operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn entity_listeners() {
    let engine = memory_engine(config());
    assert!(matches!(
        engine.add_entity_listener("note", |_| {}),
        Err(EngineError::UnknownEntityType(t)) if t == "note"
    ));

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let id = engine
        .add_entity_listener(TODO, move |entities| sink.lock().push(entities.to_vec()))
        .unwrap();
    seed(
        store(&engine),
        vec![create_todo("t1", "A"), create_todo("t2", "B")],
    )
    .await;

    engine.sync().await;
    assert_eq!(
        *snapshots.lock(),
        vec![
            vec![todo_entity("t1", "A")],
            vec![todo_entity("t1", "A"), todo_entity("t2", "B")],
        ]
    );

    engine.remove_entity_listener(TODO, id);
    engine.remove_entity_listener(TODO, id);
    seed(store(&engine), vec![delete_todo("t1")]).await;
    engine.sync().await;
    assert_eq!(snapshots.lock().len(), 2);
}

#[tokio::test]
async fn unregistered_entity_types_still_apply() {
    let engine = memory_engine(config());
    seed(
        store(&engine),
        vec![pending(OperationType::Create, "note", json!({"id": "n1"}))],
    )
    .await;

    engine.sync().await;

    assert_eq!(engine.get_entities("note").await.unwrap().len(), 1);
    assert_eq!(engine.entity_types(), [TODO]);
}

#[tokio::test]
async fn stopped_engine_applies_but_keeps_pending() {
    let engine = memory_engine(config());
    engine.stop();
    let op = seed(store(&engine), vec![create_todo("t1", "Test")])
        .await
        .remove(0);
    let completed = record(&engine, SyncEventKind::OperationComplete);

    engine.sync().await;

    assert_eq!(
        engine.get_entities(TODO).await.unwrap(),
        vec![todo_entity("t1", "Test")]
    );
    let stored = operation(&engine, &op.id).await;
    assert_eq!(stored.status, OperationStatus::Pending);
    assert_eq!(stored.retry_count, 0);
    assert_eq!(completed.lock().len(), 1);
    assert_eq!(engine.status(), EngineStatus::Offline);
}

#[tokio::test]
async fn timer_drives_cycles() {
    let engine = memory_engine(config().with_sync_interval(Duration::from_millis(20)));
    seed(store(&engine), vec![create_todo("t1", "Test")]).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.add_listener(SyncEventKind::SyncComplete, move |_| {
        let _ = tx.send(());
    });

    engine.start().unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timer never ran a cycle");
    engine.stop();

    assert!(engine.get_pending_operations().await.unwrap().is_empty());
    assert_eq!(engine.get_entities(TODO).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stop_halts_timer() {
    let engine = memory_engine(config().with_sync_interval(Duration::from_millis(10)));
    let starts = record(&engine, SyncEventKind::SyncStart);

    engine.start().unwrap();
    engine.stop();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(starts.lock().is_empty());
    assert_eq!(engine.status(), EngineStatus::Offline);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let fixture = TestFileStore::new();

    {
        let engine = SyncEngine::new(fixture.shared(), config()).unwrap();
        seed(
            store(&engine),
            vec![create_todo("t1", "A"), create_todo("t2", "B")],
        )
        .await;
        engine.sync().await;
        assert_eq!(engine.cleanup_completed_operations().await.unwrap(), 2);
        seed(store(&engine), vec![delete_todo("t1")]).await;
    }

    let fixture = fixture.reopen();
    let engine = SyncEngine::new(fixture.shared(), config()).unwrap();
    assert_eq!(engine.get_pending_operations().await.unwrap().len(), 1);
    engine.sync().await;
    assert_eq!(
        engine.get_entities(TODO).await.unwrap(),
        vec![todo_entity("t2", "B")]
    );
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn retry_count_tracks_failed_cycles(retry_limit in 1u32..6, cycles in 0usize..8) {
        let (retry_count, status) = runtime().block_on(async {
            let engine = faulty_engine(config().with_retry_limit(retry_limit));
            let op = seed(store(&engine), vec![create_todo("t1", "Test")])
                .await
                .remove(0);
            engine.store().enable(Fault::CompleteOperation);

            for _ in 0..cycles {
                engine.sync().await;
            }
            let stored = operation(&engine, &op.id).await;
            (stored.retry_count, stored.status)
        });

        let expected = (cycles as u32).min(retry_limit);
        prop_assert_eq!(retry_count, expected);
        if cycles as u32 >= retry_limit {
            prop_assert_eq!(status, OperationStatus::Error);
        } else {
            prop_assert_eq!(status, OperationStatus::Pending);
        }
    }

    #[test]
    fn finished_operations_are_never_selected(
        ops in prop::collection::vec(stored_operation_strategy(TODO, 3), 1..10),
    ) {
        let (before, after) = runtime().block_on(async {
            let engine = memory_engine(config().with_batch_size(20));
            let before = seed(store(&engine), ops).await;
            engine.sync().await;
            let after = engine.store().get_operations().await.unwrap();
            (before, after)
        });

        prop_assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(&after) {
            if old.is_pending() {
                prop_assert_eq!(new.status, OperationStatus::Completed);
                prop_assert_eq!(new.retry_count, old.retry_count);
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn clean_batches_complete_in_bounded_cycles(
        batch in operation_batch_strategy(TODO, 1, 12),
        batch_size in 1usize..5,
    ) {
        let (pending, completed) = runtime().block_on(async {
            let engine = memory_engine(config().with_batch_size(batch_size));
            let ops = seed(store(&engine), batch.clone()).await;

            let cycles = ops.len().div_ceil(batch_size);
            for _ in 0..cycles {
                engine.sync().await;
            }
            let pending = engine.get_pending_operations().await.unwrap().len();
            (pending, engine.stats().operations_completed)
        });

        prop_assert_eq!(pending, 0);
        prop_assert_eq!(completed, batch.len() as u64);
    }
}
