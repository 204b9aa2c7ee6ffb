//! Integration tests for the queue store lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use repair_queue::clock::ManualClock;
use repair_queue::event::EventKind;
use repair_queue::model::*;
use repair_queue::storage::MemorySlots;
use repair_queue::store::{QueueStore, StoreOptions};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

fn test_store(policy: ClearPolicy) -> (QueueStore, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new(start()));
    let store = QueueStore::open(
        MemorySlots::new(),
        Rc::clone(&clock),
        StoreOptions {
            clear_policy: policy,
        },
    );
    (store, clock)
}

/// Alice and Bob checked in, Alice called.
fn alice_called_bob_waiting(policy: ClearPolicy) -> (QueueStore, CustomerId, CustomerId) {
    let (mut store, clock) = test_store(policy);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");
    clock.advance(Duration::minutes(1));
    let bob = store.add_customer("Bob", "Pixel 7", "555-0101");
    clock.advance(Duration::minutes(10));
    store.call_customer(alice.id).expect("alice is present");
    (store, alice.id, bob.id)
}

// ---------------------------------------------------------------------------
// Check-in
// ---------------------------------------------------------------------------

#[test]
fn add_customer_creates_waiting_record() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);

    let record = store.add_customer("Alice", "iPhone 13", "555-0100");

    assert_eq!(record.status, CustomerStatus::Waiting);
    assert_eq!(record.checked_in_at, start());
    assert_eq!(record.called_at, None);
    assert_eq!(store.get(record.id), Some(&record));
}

#[test]
fn total_today_tracks_record_count() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);

    for n in 0..25 {
        store.add_customer(format!("Customer {n}"), "Laptop", "555-0000");
        assert_eq!(store.stats().total_today, store.customers().len());
    }
    assert_eq!(store.stats().total_today, 25);
}

#[test]
fn ids_are_unique_under_rapid_check_in() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);

    // Same timestamp for every record: ids must still differ.
    let ids: std::collections::HashSet<_> = (0..100)
        .map(|_| store.add_customer("Same", "Same", "Same").id)
        .collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn add_customer_accepts_empty_strings() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);

    let record = store.add_customer("", "", "");
    assert_eq!(record.name, "");
    assert_eq!(store.stats().waiting, 1);
}

#[test]
fn check_in_stores_trimmed_fields() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);

    let record = store.check_in(CheckIn::new("  Alice ", "iPhone 13\n", " 555-0100").unwrap());
    assert_eq!(record.name, "Alice");
    assert_eq!(record.device, "iPhone 13");
    assert_eq!(record.phone_number, "555-0100");
}

#[test]
fn check_in_rejects_blank_fields() {
    let err = CheckIn::new("Alice", "   ", "555-0100").unwrap_err();
    assert!(err.to_string().contains("device"));
    assert!(CheckIn::new("", "Pixel 7", "555-0101").is_err());
    assert!(CheckIn::new("Bob", "Pixel 7", "").is_err());
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

#[test]
fn scenario_alice_and_bob() {
    let (mut store, clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");
    let bob = store.add_customer("Bob", "Pixel 7", "555-0101");

    let stats = store.stats();
    assert_eq!((stats.waiting, stats.called, stats.total_today), (2, 0, 2));

    clock.advance(Duration::minutes(5));
    let called = store.call_customer(alice.id).unwrap();
    assert_eq!(called.status, CustomerStatus::Called);

    let stats = store.stats();
    assert_eq!((stats.waiting, stats.called, stats.total_today), (1, 1, 2));
    assert_eq!(store.next_customer().map(|c| c.id), Some(bob.id));
}

#[test]
fn call_stamps_called_at_after_check_in() {
    let (mut store, clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");

    clock.advance(Duration::minutes(7));
    let called = store.call_customer(alice.id).unwrap();

    assert_eq!(called.called_at, Some(start() + Duration::minutes(7)));
    assert!(called.called_at.unwrap() >= called.checked_in_at);
}

#[test]
fn call_again_restamps_called_at() {
    let (mut store, clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");

    clock.advance(Duration::minutes(2));
    let first = store.call_customer(alice.id).unwrap().called_at.unwrap();
    clock.advance(Duration::minutes(3));
    let second = store.call_customer(alice.id).unwrap().called_at.unwrap();

    assert!(second > first);
    assert_eq!(store.stats().called, 1);
}

#[test]
fn called_at_never_moves_backwards() {
    let (mut store, clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");

    clock.advance(Duration::minutes(10));
    let first = store.call_customer(alice.id).unwrap().called_at.unwrap();

    // Clock steps back past both the call and the check-in.
    clock.set(start() - Duration::hours(1));
    let second = store.call_customer(alice.id).unwrap().called_at.unwrap();

    assert_eq!(second, first);
    assert!(second >= store.get(alice.id).unwrap().checked_in_at);
}

#[test]
fn call_unknown_id_is_silent_noop() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    store.add_customer("Alice", "iPhone 13", "555-0100");
    let before = store.customers().to_vec();

    assert!(store.call_customer(CustomerId::new()).is_none());
    assert_eq!(store.customers(), before.as_slice());
}

// ---------------------------------------------------------------------------
// Complete / remove / next
// ---------------------------------------------------------------------------

#[test]
fn complete_customer_reaches_completed() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");

    let done = store.complete_customer(alice.id).unwrap();
    assert_eq!(done.status, CustomerStatus::Completed);
    assert_eq!(store.stats().completed, 1);
    assert_eq!(store.stats().waiting, 0);
}

#[test]
fn completed_customer_cannot_be_called() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");
    store.complete_customer(alice.id).unwrap();

    assert!(store.call_customer(alice.id).is_none());
    assert!(store.complete_customer(alice.id).is_none());
    assert_eq!(
        store.get(alice.id).unwrap().status,
        CustomerStatus::Completed
    );
}

#[test]
fn remove_customer_deletes_regardless_of_status() {
    let (mut store, alice, bob) = alice_called_bob_waiting(ClearPolicy::WaitingOnly);

    let removed = store.remove_customer(alice).unwrap();
    assert_eq!(removed.status, CustomerStatus::Called);
    assert!(store.remove_customer(bob).is_some());

    assert!(store.get(alice).is_none());
    assert!(store.get(bob).is_none());
    assert!(store.next_customer().is_none());
    assert!(store.customers().iter().all(|c| c.id != alice && c.id != bob));
    assert_eq!(store.stats(), QueueStats::default());
}

#[test]
fn remove_unknown_id_is_silent_noop() {
    let (mut store, _alice, _bob) = alice_called_bob_waiting(ClearPolicy::WaitingOnly);
    assert!(store.remove_customer(CustomerId::new()).is_none());
    assert_eq!(store.stats().total_today, 2);
}

#[test]
fn next_customer_is_earliest_waiting() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    assert!(store.next_customer().is_none());

    let a = store.add_customer("A", "d", "p");
    let b = store.add_customer("B", "d", "p");
    let c = store.add_customer("C", "d", "p");

    assert_eq!(store.next_customer().unwrap().id, a.id);
    store.call_customer(a.id);
    assert_eq!(store.next_customer().unwrap().id, b.id);
    store.remove_customer(b.id);
    assert_eq!(store.next_customer().unwrap().id, c.id);
    store.call_customer(c.id);
    assert!(store.next_customer().is_none());
}

// ---------------------------------------------------------------------------
// Clear
// ---------------------------------------------------------------------------

#[test]
fn clear_waiting_only_keeps_called() {
    let (mut store, alice, _bob) = alice_called_bob_waiting(ClearPolicy::WaitingOnly);

    assert_eq!(store.clear_queue(), 1);

    assert_eq!(store.customers().len(), 1);
    assert_eq!(store.customers()[0].id, alice);
    assert_eq!(store.customers()[0].status, CustomerStatus::Called);
    assert_eq!(store.stats().total_today, 1);
}

#[test]
fn clear_all_empties_store() {
    let (mut store, _alice, _bob) = alice_called_bob_waiting(ClearPolicy::All);

    assert_eq!(store.clear_queue(), 2);
    assert!(store.customers().is_empty());
    assert_eq!(store.stats(), QueueStats::default());
}

#[test]
fn clear_waiting_only_keeps_completed() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    let done = store.add_customer("Done", "d", "p");
    store.complete_customer(done.id);
    store.add_customer("Waiting", "d", "p");

    assert_eq!(store.clear_queue(), 1);
    assert_eq!(store.customers()[0].id, done.id);
}

// ---------------------------------------------------------------------------
// Lookups, snapshot, events
// ---------------------------------------------------------------------------

#[test]
fn find_by_prefix_resolves_unique_prefix() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");

    let found = store.find_by_prefix(&alice.id.short()).unwrap();
    assert_eq!(found.id, alice.id);
    assert!(store.find_by_prefix("zzzz").is_err());
    assert!(store.find_by_prefix("  ").is_err());
}

#[test]
fn export_snapshot_does_not_mutate() {
    let (store, _alice, _bob) = alice_called_bob_waiting(ClearPolicy::WaitingOnly);
    let before = store.customers().to_vec();

    let snapshot = store.export_snapshot();

    assert_eq!(snapshot.customers, before);
    assert_eq!(snapshot.stats, store.stats());
    assert_eq!(snapshot.exported_at, start() + Duration::minutes(11));
    assert_eq!(snapshot.date, "02/06/2025");
    assert_eq!(store.customers(), before.as_slice());
}

#[test]
fn listeners_receive_events_in_order() {
    let (mut store, _clock) = test_store(ClearPolicy::WaitingOnly);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    let alice = store.add_customer("Alice", "iPhone 13", "555-0100");
    store.call_customer(alice.id);
    store.call_customer(alice.id);
    store.call_customer(CustomerId::new()); // no-op, no event
    store.clear_queue(); // nothing waiting, no event

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen.iter().map(|e| e.seq).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(matches!(seen[0].kind, EventKind::CustomerCheckedIn { .. }));
    assert!(matches!(
        seen[1].kind,
        EventKind::CustomerCalled { recall: false, .. }
    ));
    assert!(matches!(
        seen[2].kind,
        EventKind::CustomerCalled { recall: true, .. }
    ));
}
