//! Structured events emitted by the store after every mutation.
//!
//! Listeners use them to refresh a view, announce a call, or keep an audit
//! trail. Events are delivered only after the new state has been persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ClearPolicy, CustomerId, CustomerStatus};

/// A structured event emitted by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number within one store instance.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CustomerCheckedIn {
        id: CustomerId,
        name: String,
        device: String,
    },
    CustomerCalled {
        id: CustomerId,
        name: String,
        device: String,
        /// True when the customer had already been called before.
        recall: bool,
    },
    CustomerCompleted {
        id: CustomerId,
    },
    CustomerRemoved {
        id: CustomerId,
        status: CustomerStatus,
    },
    QueueCleared {
        policy: ClearPolicy,
        removed: usize,
    },
}

/// Callback registered with [`crate::store::QueueStore::subscribe`].
pub type Listener = Box<dyn FnMut(&Event)>;
