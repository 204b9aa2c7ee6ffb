//! Durable slot storage.
//!
//! A slot is a named key holding one JSON text document. The queue store
//! keeps its records and its stats in two independent slots. Backends are
//! injected into the store so tests can run fully in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Slot holding the serialized record array.
pub const RECORDS_SLOT: &str = "repair-queue";

/// Slot holding the serialized stats object.
pub const STATS_SLOT: &str = "repair-queue-stats";

/// Storage backend for named text slots.
pub trait SlotStore {
    /// Read a slot. `Ok(None)` means the slot has never been written.
    fn read(&self, slot: &str) -> Result<Option<String>>;

    /// Replace a slot's content.
    fn write(&mut self, slot: &str, value: &str) -> Result<()>;
}

impl<S: SlotStore + ?Sized> SlotStore for Box<S> {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        (**self).read(slot)
    }

    fn write(&mut self, slot: &str, value: &str) -> Result<()> {
        (**self).write(slot, value)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Slots held in a map. Lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemorySlots {
    slots: HashMap<String, String>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot (for seeding tests with existing data).
    pub fn with_slot(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(slot.into(), value.into());
        self
    }
}

impl SlotStore for MemorySlots {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.get(slot).cloned())
    }

    fn write(&mut self, slot: &str, value: &str) -> Result<()> {
        self.slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Slots stored as `<dir>/<slot>.json`.
///
/// Writes go to a temp file in the same directory and are renamed over the
/// target, so a crash mid-write leaves the previous content intact.
#[derive(Debug, Clone)]
pub struct DirSlots {
    dir: PathBuf,
}

impl DirSlots {
    /// Open or create a slot directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

impl SlotStore for DirSlots {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(slot)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::PersistenceRead {
                slot: slot.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn write(&mut self, slot: &str, value: &str) -> Result<()> {
        let target = self.path_for(slot);
        let tmp = self.dir.join(format!(".{slot}.json.tmp"));
        let to_write_error = |e: std::io::Error| Error::PersistenceWrite {
            slot: slot.to_string(),
            reason: e.to_string(),
        };
        std::fs::write(&tmp, value).map_err(to_write_error)?;
        std::fs::rename(&tmp, &target).map_err(to_write_error)?;
        Ok(())
    }
}
