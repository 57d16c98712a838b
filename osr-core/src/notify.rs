//! Domain notifications
//!
//! The engine publishes notifications into a bounded queue instead of
//! calling subscribers; hosts drain the queue once per tick and fan the
//! notifications out however they like.

use crate::model::{Clip, RecordingSummary, ReplayEvent};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_MAX_PENDING: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayNotification {
    RecordingStarted {
        recording_id: Uuid,
    },
    RecordingStopped(RecordingSummary),
    PlaybackStarted,
    PlaybackStopped,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackProgress {
        progress: f32,
        current_time: f32,
    },
    EventDetected(ReplayEvent),
    ClipCreated(Clip),
    ExportProgress {
        progress: f32,
    },
    ExportComplete {
        output_path: String,
    },
    ExportFailed {
        reason: String,
    },
    PersistenceFailed {
        slot: String,
        reason: String,
    },
}

#[derive(Debug)]
pub struct NotificationBus {
    pending: VecDeque<ReplayNotification>,
    max_pending: usize,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl NotificationBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            pending: VecDeque::with_capacity(max_pending.min(DEFAULT_MAX_PENDING)),
            max_pending,
        }
    }

    /// Queue a notification, dropping the oldest when full
    pub fn publish(&mut self, notification: ReplayNotification) {
        if self.pending.len() >= self.max_pending {
            warn!(
                "Notification queue full ({} pending), dropping oldest",
                self.max_pending
            );
            self.pending.pop_front();
        }
        self.pending.push_back(notification);
    }

    pub fn drain(&mut self) -> Vec<ReplayNotification> {
        self.pending.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
