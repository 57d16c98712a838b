//! Persistence boundary for finished recordings
//!
//! The engine treats storage as an opaque keyed slot table. Slot names are
//! restricted to a filesystem-safe alphabet so every store implementation
//! can use them as keys directly.

use crate::error::StoreError;
use crate::model::Recording;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing entry for one saved slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: String,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub track_name: String,
    pub total_duration: f32,
    pub total_frames: usize,
    pub event_count: usize,
    pub clip_count: usize,
    pub size_bytes: u64,
}

impl SlotInfo {
    pub fn describe(slot: &str, recording: &Recording) -> Self {
        Self {
            slot: slot.to_string(),
            name: recording.name.clone(),
            recorded_at: recording.recorded_at,
            track_name: recording.track_name.clone(),
            total_duration: recording.total_duration,
            total_frames: recording.total_frames,
            event_count: recording.events.len(),
            clip_count: recording.clips.len(),
            size_bytes: recording.size_bytes,
        }
    }
}

pub trait RecordingStore: Send + Sync {
    fn save(&mut self, slot: &str, recording: &Recording) -> Result<(), StoreError>;

    fn load(&self, slot: &str) -> Result<Recording, StoreError>;

    /// Remove a slot; `Ok(false)` when it did not exist
    fn delete(&mut self, slot: &str) -> Result<bool, StoreError>;

    fn list(&self) -> Result<Vec<SlotInfo>, StoreError>;
}

/// Reject empty names and anything outside `[A-Za-z0-9_-]`
pub fn validate_slot(slot: &str) -> Result<(), StoreError> {
    let valid = !slot.is_empty()
        && slot.len() <= 128
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSlot(slot.to_string()))
    }
}

/// Process-local store, used by tests and hosts without a data directory
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: BTreeMap<String, Recording>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordingStore for MemoryStore {
    fn save(&mut self, slot: &str, recording: &Recording) -> Result<(), StoreError> {
        validate_slot(slot)?;
        self.slots.insert(slot.to_string(), recording.clone());
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Recording, StoreError> {
        validate_slot(slot)?;
        self.slots
            .get(slot)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(slot.to_string()))
    }

    fn delete(&mut self, slot: &str) -> Result<bool, StoreError> {
        validate_slot(slot)?;
        Ok(self.slots.remove(slot).is_some())
    }

    fn list(&self) -> Result<Vec<SlotInfo>, StoreError> {
        Ok(self
            .slots
            .iter()
            .map(|(slot, rec)| SlotInfo::describe(slot, rec))
            .collect())
    }
}
