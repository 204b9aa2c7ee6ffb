//! Core data model.
//!
//! A customer record is one walk-in at the repair counter. It has identity,
//! contact details, the device being repaired, and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Customer Record
// ---------------------------------------------------------------------------

/// A customer checked in at the counter.
///
/// Serialized with camelCase keys so the records slot stays readable by
/// anything that consumed the browser-era `localStorage` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    /// Unique identifier.
    pub id: CustomerId,

    pub name: String,
    pub device: String,
    pub phone_number: String,

    /// Set at check-in. Never changes afterwards.
    pub checked_in_at: DateTime<Utc>,

    /// Current lifecycle status.
    pub status: CustomerStatus,

    /// Last time the customer was called. Re-calls overwrite it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_at: Option<DateTime<Utc>>,
}

impl CustomerRecord {
    pub fn is_waiting(&self) -> bool {
        self.status == CustomerStatus::Waiting
    }
}

/// Customer identifier.
///
/// New records get a UUID. Records written by the browser app carry the
/// creation time in epoch milliseconds as a decimal string; those load as
/// `Legacy` and keep their original value. Both serialize as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerId {
    Uuid(Uuid),
    Legacy(u64),
}

impl CustomerId {
    pub fn new() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Short display form: first 8 chars of a UUID, or the whole legacy id.
    /// Legacy ids share their leading digits, so a prefix of one is rarely unique.
    pub fn short(&self) -> String {
        match self {
            Self::Uuid(uuid) => uuid.to_string()[..8].to_string(),
            Self::Legacy(millis) => millis.to_string(),
        }
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uuid(uuid) => write!(f, "{uuid}"),
            Self::Legacy(millis) => write!(f, "{millis}"),
        }
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for CustomerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(uuid) = Uuid::parse_str(s) {
            return Ok(Self::Uuid(uuid));
        }
        s.parse::<u64>()
            .map(Self::Legacy)
            .map_err(|_| Error::Validation(format!("invalid customer id: {s}")))
    }
}

impl Serialize for CustomerId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CustomerId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Millis(u64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawId::Millis(millis) => Ok(Self::Legacy(millis)),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a customer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    /// Checked in, device not ready yet.
    Waiting,
    /// Device ready, customer has been called to the counter.
    Called,
    /// Served. Terminal.
    Completed,
}

impl CustomerStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: CustomerStatus) -> bool {
        use CustomerStatus::*;
        matches!(
            (self, to),
            (Waiting, Called)
                | (Called, Called)      // call again
                | (Waiting, Completed)
                | (Called, Completed)
        )
    }
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CustomerStatus::Waiting => "waiting",
            CustomerStatus::Called => "called",
            CustomerStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(CustomerStatus::Waiting),
            "called" => Ok(CustomerStatus::Called),
            "completed" => Ok(CustomerStatus::Completed),
            other => Err(Error::Other(format!("unknown status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counts by status plus the total number of records held.
///
/// "Today" means everything currently in the store; there is no date rollover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub waiting: usize,
    pub called: usize,
    pub completed: usize,
    pub total_today: usize,
}

impl QueueStats {
    /// Derive stats from a record set.
    pub fn from_records(records: &[CustomerRecord]) -> Self {
        let mut stats = QueueStats {
            total_today: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.status {
                CustomerStatus::Waiting => stats.waiting += 1,
                CustomerStatus::Called => stats.called += 1,
                CustomerStatus::Completed => stats.completed += 1,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Clear policy
// ---------------------------------------------------------------------------

/// Scope of a bulk `clear_queue`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Drop waiting customers only; called and completed ones stay.
    #[default]
    WaitingOnly,
    /// Drop every record.
    All,
}

impl ClearPolicy {
    /// Should a record with this status be dropped by a clear?
    pub fn clears(self, status: CustomerStatus) -> bool {
        match self {
            ClearPolicy::WaitingOnly => status == CustomerStatus::Waiting,
            ClearPolicy::All => true,
        }
    }
}

impl std::fmt::Display for ClearPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClearPolicy::WaitingOnly => "waiting_only",
            ClearPolicy::All => "all",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ClearPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting_only" | "waiting-only" | "waiting" => Ok(ClearPolicy::WaitingOnly),
            "all" => Ok(ClearPolicy::All),
            other => Err(Error::Config(format!("unknown clear policy: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Check-in
// ---------------------------------------------------------------------------

/// Validated check-in input. The front desk builds one of these before
/// touching the store; the store itself does not re-validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub(crate) name: String,
    pub(crate) device: String,
    pub(crate) phone_number: String,
}

impl CheckIn {
    /// Trim every field and reject blanks.
    pub fn new(
        name: impl AsRef<str>,
        device: impl AsRef<str>,
        phone_number: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: required("name", name.as_ref())?,
            device: required("device", device.as_ref())?,
            phone_number: required("phone number", phone_number.as_ref())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
