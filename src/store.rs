//! The queue store. Sole owner of the customer record set.
//!
//! All mutations go through here. Each one recomputes the derived stats,
//! writes both durable slots, then notifies listeners. Persistence failures
//! are logged and swallowed: the in-memory state stays authoritative for the
//! running session, and no operation surfaces an error to the caller.

use opentelemetry::KeyValue;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, Listener};
use crate::export::ExportSnapshot;
use crate::model::*;
use crate::storage::{MemorySlots, RECORDS_SLOT, STATS_SLOT, SlotStore};
use crate::telemetry::metrics;
use crate::telemetry::store::{record_status_transition, start_store_span};

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// What `clear_queue` removes. Fixed for the lifetime of the store.
    pub clear_policy: ClearPolicy,
}

/// The queue store. Owns the records, the stats, and the slot backend.
pub struct QueueStore {
    slots: Box<dyn SlotStore>,
    clock: Box<dyn Clock>,
    options: StoreOptions,
    customers: Vec<CustomerRecord>,
    stats: QueueStats,
    /// Stats as found in the stats slot at open. Diagnostic only.
    last_persisted_stats: Option<QueueStats>,
    next_seq: u64,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("options", &self.options)
            .field("customers", &self.customers.len())
            .field("stats", &self.stats)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl QueueStore {
    /// Open a store over the given slots, rehydrating any saved state.
    ///
    /// Missing or malformed slot content is treated as empty. Nothing is
    /// written until the first mutation, so a failed read never clobbers
    /// data that might still be recoverable by hand.
    pub fn open(
        slots: impl SlotStore + 'static,
        clock: impl Clock + 'static,
        options: StoreOptions,
    ) -> Self {
        let customers = load_records(&slots);
        let last_persisted_stats = load_stats(&slots);
        let stats = QueueStats::from_records(&customers);

        if let Some(saved) = last_persisted_stats.filter(|saved| *saved != stats) {
            warn!(
                ?saved,
                derived = ?stats,
                "persisted stats disagree with records; using derived stats"
            );
        }

        info!(
            customers = customers.len(),
            waiting = stats.waiting,
            called = stats.called,
            clear_policy = %options.clear_policy,
            "queue store opened"
        );

        Self {
            slots: Box::new(slots),
            clock: Box::new(clock),
            options,
            customers,
            stats,
            last_persisted_stats,
            next_seq: 1,
            listeners: Vec::new(),
        }
    }

    /// Create a store with in-memory slots and the system clock.
    pub fn in_memory() -> Self {
        Self::open(MemorySlots::new(), SystemClock, StoreOptions::default())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All records in check-in order.
    pub fn customers(&self) -> &[CustomerRecord] {
        &self.customers
    }

    pub fn get(&self, id: CustomerId) -> Option<&CustomerRecord> {
        self.customers.iter().find(|c| c.id == id)
    }

    /// Records with the given status, in check-in order.
    pub fn with_status(&self, status: CustomerStatus) -> impl Iterator<Item = &CustomerRecord> {
        self.customers.iter().filter(move |c| c.status == status)
    }

    pub fn waiting(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.with_status(CustomerStatus::Waiting)
    }

    pub fn called(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.with_status(CustomerStatus::Called)
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn last_persisted_stats(&self) -> Option<QueueStats> {
        self.last_persisted_stats
    }

    pub fn clear_policy(&self) -> ClearPolicy {
        self.options.clear_policy
    }

    /// The slot backend (read access for diagnostics and tests).
    pub fn slots(&self) -> &dyn SlotStore {
        &*self.slots
    }

    /// The next customer to serve: earliest check-in still waiting.
    pub fn next_customer(&self) -> Option<&CustomerRecord> {
        self.customers.iter().find(|c| c.is_waiting())
    }

    /// Resolve a full ID or unique ID prefix to a record.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&CustomerRecord> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(Error::NotFound("empty id".to_string()));
        }
        let matches: Vec<_> = self
            .customers
            .iter()
            .filter(|c| c.id.to_string().starts_with(&prefix))
            .collect();
        match matches.as_slice() {
            [] => Err(Error::NotFound(prefix)),
            [one] => Ok(*one),
            many => Err(Error::Other(format!(
                "{} customers match prefix '{prefix}', be more specific",
                many.len()
            ))),
        }
    }

    /// Point-in-time export of every record plus stats. Does not mutate.
    pub fn export_snapshot(&self) -> ExportSnapshot {
        ExportSnapshot::new(self.customers.clone(), self.stats, self.clock.now())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Register a listener notified after every persisted mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Check in a validated customer.
    pub fn check_in(&mut self, check_in: CheckIn) -> CustomerRecord {
        self.add_customer(check_in.name, check_in.device, check_in.phone_number)
    }

    /// Append a new waiting customer and return it.
    ///
    /// Input is taken as given: validation belongs to the caller (see
    /// [`CheckIn`]). Empty strings are stored as-is.
    pub fn add_customer(
        &mut self,
        name: impl Into<String>,
        device: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> CustomerRecord {
        let mut id = CustomerId::new();
        while self.get(id).is_some() {
            id = CustomerId::new();
        }

        let span = start_store_span("add_customer", &id);
        let _entered = span.enter();

        let record = CustomerRecord {
            id,
            name: name.into(),
            device: device.into(),
            phone_number: phone_number.into(),
            checked_in_at: self.clock.now(),
            status: CustomerStatus::Waiting,
            called_at: None,
        };
        self.customers.push(record.clone());
        self.persist();

        metrics::customers_checked_in().add(1, &[]);
        self.count_operation("add_customer");
        info!(id = %record.id, name = %record.name, device = %record.device, "customer checked in");

        self.emit(EventKind::CustomerCheckedIn {
            id,
            name: record.name.clone(),
            device: record.device.clone(),
        });
        record
    }

    /// Mark a customer as called and stamp `called_at`.
    ///
    /// Calling an already-called customer re-stamps `called_at` ("call
    /// again"). The stamp never precedes check-in or the previous call.
    /// Returns `None` if the customer is absent or already completed.
    pub fn call_customer(&mut self, id: CustomerId) -> Option<CustomerRecord> {
        let span = start_store_span("call_customer", &id);
        let _entered = span.enter();

        let now = self.clock.now();
        let Some(record) = self.customers.iter_mut().find(|c| c.id == id) else {
            debug!(%id, "call ignored: customer not found");
            return None;
        };

        let from = record.status;
        if !from.can_transition_to(CustomerStatus::Called) {
            debug!(%id, status = %from, "call ignored: invalid transition");
            return None;
        }

        let floor = record
            .called_at
            .map_or(record.checked_in_at, |prev| prev.max(record.checked_in_at));
        record.status = CustomerStatus::Called;
        record.called_at = Some(now.max(floor));
        let updated = record.clone();

        record_status_transition(&span, from, CustomerStatus::Called);
        self.persist();

        let recall = from == CustomerStatus::Called;
        metrics::customers_called().add(1, &[KeyValue::new("recall", recall)]);
        self.count_operation("call_customer");
        info!(%id, name = %updated.name, recall, "customer called");

        self.emit(EventKind::CustomerCalled {
            id,
            name: updated.name.clone(),
            device: updated.device.clone(),
            recall,
        });
        Some(updated)
    }

    /// Mark a customer as completed.
    ///
    /// Nothing else in the queue flow reaches this status; it is kept so a
    /// consumer can close out served customers explicitly.
    pub fn complete_customer(&mut self, id: CustomerId) -> Option<CustomerRecord> {
        let span = start_store_span("complete_customer", &id);
        let _entered = span.enter();

        let Some(record) = self.customers.iter_mut().find(|c| c.id == id) else {
            debug!(%id, "complete ignored: customer not found");
            return None;
        };

        let from = record.status;
        if !from.can_transition_to(CustomerStatus::Completed) {
            debug!(%id, status = %from, "complete ignored: invalid transition");
            return None;
        }
        record.status = CustomerStatus::Completed;
        let updated = record.clone();

        record_status_transition(&span, from, CustomerStatus::Completed);
        self.persist();
        self.count_operation("complete_customer");
        info!(%id, "customer completed");

        self.emit(EventKind::CustomerCompleted { id });
        Some(updated)
    }

    /// Delete a customer regardless of status.
    pub fn remove_customer(&mut self, id: CustomerId) -> Option<CustomerRecord> {
        let span = start_store_span("remove_customer", &id);
        let _entered = span.enter();

        let Some(pos) = self.customers.iter().position(|c| c.id == id) else {
            debug!(%id, "remove ignored: customer not found");
            return None;
        };
        let removed = self.customers.remove(pos);
        self.persist();
        self.count_operation("remove_customer");
        info!(%id, status = %removed.status, "customer removed");

        self.emit(EventKind::CustomerRemoved {
            id,
            status: removed.status,
        });
        Some(removed)
    }

    /// Bulk-delete according to the configured [`ClearPolicy`].
    /// Returns how many records were removed.
    pub fn clear_queue(&mut self) -> usize {
        let policy = self.options.clear_policy;
        let before = self.customers.len();
        self.customers.retain(|c| !policy.clears(c.status));
        let removed = before - self.customers.len();

        if removed == 0 {
            debug!(%policy, "clear ignored: nothing to remove");
            return 0;
        }

        self.persist();
        self.count_operation("clear_queue");
        info!(%policy, removed, remaining = self.customers.len(), "queue cleared");

        self.emit(EventKind::QueueCleared { policy, removed });
        removed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Recompute stats and write both slots. Failures are logged only.
    fn persist(&mut self) {
        self.stats = QueueStats::from_records(&self.customers);

        match serde_json::to_string(&self.customers) {
            Ok(json) => self.write_slot(RECORDS_SLOT, &json),
            Err(e) => persistence_failure(RECORDS_SLOT, "serialize", &e.to_string()),
        }
        match serde_json::to_string(&self.stats) {
            Ok(json) => self.write_slot(STATS_SLOT, &json),
            Err(e) => persistence_failure(STATS_SLOT, "serialize", &e.to_string()),
        }
    }

    fn write_slot(&mut self, slot: &str, json: &str) {
        if let Err(e) = self.slots.write(slot, json) {
            persistence_failure(slot, "write", &e.to_string());
        }
    }

    fn emit(&mut self, kind: EventKind) {
        let event = Event {
            seq: self.next_seq,
            timestamp: self.clock.now(),
            kind,
        };
        self.next_seq += 1;
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    fn count_operation(&self, operation: &'static str) {
        metrics::queue_operations().add(1, &[KeyValue::new("operation", operation)]);
    }
}

// ---------------------------------------------------------------------------
// Rehydration
// ---------------------------------------------------------------------------

fn load_records(slots: &dyn SlotStore) -> Vec<CustomerRecord> {
    let raw = match slots.read(RECORDS_SLOT) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            persistence_failure(RECORDS_SLOT, "read", &e.to_string());
            return Vec::new();
        }
    };

    let records: Vec<CustomerRecord> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            persistence_failure(RECORDS_SLOT, "parse", &e.to_string());
            return Vec::new();
        }
    };

    // Keep the first occurrence of any duplicated id.
    let mut seen = std::collections::HashSet::new();
    let before = records.len();
    let records: Vec<_> = records.into_iter().filter(|r| seen.insert(r.id)).collect();
    if records.len() != before {
        warn!(
            dropped = before - records.len(),
            "dropped records with duplicate ids"
        );
    }
    records
}

fn load_stats(slots: &dyn SlotStore) -> Option<QueueStats> {
    match slots.read(STATS_SLOT) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(stats) => Some(stats),
            Err(e) => {
                persistence_failure(STATS_SLOT, "parse", &e.to_string());
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            persistence_failure(STATS_SLOT, "read", &e.to_string());
            None
        }
    }
}

fn persistence_failure(slot: &str, stage: &'static str, reason: &str) {
    error!(slot, stage, reason, "slot persistence failed");
    metrics::persistence_failures().add(
        1,
        &[
            KeyValue::new("slot", slot.to_string()),
            KeyValue::new("stage", stage),
        ],
    );
}
