mod common;

use common::*;
use eth_tx_lifecycle::config::TrackerConfig;
use eth_tx_lifecycle::models::domain::TransactionState;
use eth_tx_lifecycle::repositories::TransactionStore;
use ethers_core::types::Address;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn processing_a_settled_record_twice_is_a_no_op() {
    let h = Harness::new(MockBackend::new("primary"));
    let id = hash("0x01");
    let record = aged_record(id, 0, 5);
    h.store.add(record.clone()).await.unwrap();
    h.backend().set_receipt(id, Some(1));
    let mut rx = h.events.subscribe();

    assert_eq!(
        h.tracker.process(&record).await.unwrap(),
        Some(TransactionState::Completed)
    );
    // 旧快照仍是 Pending：CAS 防止重复变更
    assert_eq!(h.tracker.process(&record).await.unwrap(), None);
    // 最新快照已是终态：直接跳过
    let settled = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(h.tracker.process(&settled).await.unwrap(), None);

    let events = drain(&mut rx);
    assert_eq!(state_changes(&events).len(), 1);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn unseen_record_is_dropped_only_after_grace_window() {
    let backend = MockBackend::new("primary");
    backend.mempool.store(false, Ordering::SeqCst);
    let h = Harness::new(backend);

    let old = aged_record(hash("0x61"), 0, 61);
    let fresh = aged_record(hash("0x30"), 1, 30);
    h.store.add(old.clone()).await.unwrap();
    h.store.add(fresh.clone()).await.unwrap();
    let mut rx = h.events.subscribe();

    assert_eq!(h.tracker.tick().await, 1);

    let old = h.store.get(old.id).await.unwrap().unwrap();
    let fresh = h.store.get(fresh.id).await.unwrap().unwrap();
    assert_eq!(old.state, TransactionState::Dropped);
    assert_eq!(fresh.state, TransactionState::Pending);
    assert_eq!(
        state_changes(&drain(&mut rx)),
        vec![(old.id, TransactionState::Pending, TransactionState::Dropped)]
    );
    assert_eq!(
        h.notifier.seen.lock().unwrap().clone(),
        vec![(old.id, TransactionState::Dropped)]
    );
}

#[tokio::test]
async fn record_still_in_mempool_stays_pending() {
    let h = Harness::new(MockBackend::new("primary"));
    let record = aged_record(hash("0x0f"), 0, 600);
    h.store.add(record.clone()).await.unwrap();
    h.backend().known.lock().unwrap().insert(record.id);

    assert_eq!(h.tracker.tick().await, 0);
    let stored = h.store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TransactionState::Pending);
}

#[tokio::test]
async fn receipt_status_selects_terminal_state() {
    let h = Harness::new(MockBackend::new("primary"));
    let reverted = aged_record(hash("0x0a"), 0, 5);
    let unknown = aged_record(hash("0x0b"), 1, 5);
    h.store.add(reverted.clone()).await.unwrap();
    h.store.add(unknown.clone()).await.unwrap();
    h.backend().set_receipt(reverted.id, Some(0));
    h.backend().set_receipt(unknown.id, None);

    assert_eq!(h.tracker.tick().await, 2);
    let reverted = h.store.get(reverted.id).await.unwrap().unwrap();
    let unknown = h.store.get(unknown.id).await.unwrap().unwrap();
    assert_eq!(reverted.state, TransactionState::Failed);
    assert_eq!(unknown.state, TransactionState::Error);
    assert_eq!(h.notifier.count(), 2);
}

#[tokio::test]
async fn gateway_errors_are_retried_next_tick() {
    let h = Harness::new(MockBackend::new("primary"));
    let record = aged_record(hash("0x0c"), 0, 120);
    h.store.add(record.clone()).await.unwrap();
    h.backend().fail_queries.store(true, Ordering::SeqCst);
    let mut rx = h.events.subscribe();

    assert_eq!(h.tracker.tick().await, 0);
    assert_eq!(h.tracker.tick().await, 0);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(
        h.store.get(record.id).await.unwrap().unwrap().state,
        TransactionState::Pending
    );

    h.backend().fail_queries.store(false, Ordering::SeqCst);
    h.backend().set_receipt(record.id, Some(1));
    assert_eq!(h.tracker.tick().await, 1);
}

#[tokio::test]
async fn completion_reconciles_nonce_upward() {
    let h = Harness::new(MockBackend::new("primary"));
    let record = aged_record(hash("0x0d"), 0, 5);
    h.store.add(record.clone()).await.unwrap();
    h.backend().set_receipt(record.id, Some(1));
    // 其他客户端用同一账户发过交易
    *h.backend().pending_nonce.lock().unwrap() = 4;

    h.tracker.tick().await;
    assert_eq!(h.nonce.current(), 4);
}

#[tokio::test]
async fn terminal_records_are_collected_after_retention() {
    let h = Harness::new(MockBackend::new("primary"));
    let tracker = h.tracker_with(TrackerConfig {
        poll_interval_secs: 10,
        drop_grace_secs: 60,
        retention_secs: 0,
    });
    let done = aged_record(hash("0x0e"), 0, 5);
    let waiting = aged_record(hash("0x1e"), 1, 5);
    h.store.add(done.clone()).await.unwrap();
    h.store.add(waiting.clone()).await.unwrap();
    h.backend().set_receipt(done.id, Some(1));
    h.backend().known.lock().unwrap().insert(waiting.id);

    tracker.tick().await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    tracker.tick().await;

    assert!(h.store.get(done.id).await.unwrap().is_none());
    assert!(h.store.get(waiting.id).await.unwrap().is_some());
}

#[tokio::test]
async fn tracker_ignores_other_accounts() {
    let h = Harness::new(MockBackend::new("primary"));
    let mut foreign = aged_record(hash("0x2e"), 0, 5);
    foreign.from = Address::repeat_byte(0xbb);
    h.store.add(foreign.clone()).await.unwrap();
    h.backend().set_receipt(foreign.id, Some(1));

    assert_eq!(h.tracker.tick().await, 0);
    assert_eq!(
        h.store.get(foreign.id).await.unwrap().unwrap().state,
        TransactionState::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn polling_loop_runs_until_stopped() {
    let h = Harness::new(MockBackend::new("primary"));
    let first = aged_record(hash("0x3e"), 0, 5);
    h.store.add(first.clone()).await.unwrap();
    h.backend().known.lock().unwrap().insert(first.id);

    h.tracker.start().await;
    assert!(h.tracker.is_running().await);
    h.backend().set_receipt(first.id, Some(1));
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(
        h.store.get(first.id).await.unwrap().unwrap().state,
        TransactionState::Completed
    );

    h.tracker.stop().await;
    assert!(!h.tracker.is_running().await);

    let second = aged_record(hash("0x4e"), 1, 5);
    h.store.add(second.clone()).await.unwrap();
    h.backend().set_receipt(second.id, Some(1));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        h.store.get(second.id).await.unwrap().unwrap().state,
        TransactionState::Pending
    );
}
