//! Application state management

use osr_core::feed::SimulationFeed;
use osr_core::{ReplayConfig, ReplayEngine, ReplayNotification};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

const NOTIFICATION_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The single replay engine; every mutation happens under the write lock
    pub engine: Arc<RwLock<ReplayEngine>>,

    /// All registered simulation feeds
    pub feeds: Arc<RwLock<Vec<Box<dyn SimulationFeed>>>>,

    /// Name of the currently active feed
    pub active_feed: Arc<RwLock<Option<String>>>,

    /// Broadcast channel for engine notifications
    /// Multiple consumers can subscribe to receive them
    pub notification_tx: broadcast::Sender<ReplayNotification>,

    /// Stops the tick loop
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: ReplayEngine) -> Self {
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            engine: Arc::new(RwLock::new(engine)),
            feeds: Arc::new(RwLock::new(Vec::new())),
            active_feed: Arc::new(RwLock::new(None)),
            notification_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// State backed by an in-memory store, for tests and ephemeral hosts
    pub fn in_memory() -> Self {
        Self::new(ReplayEngine::in_memory(ReplayConfig::default()))
    }

    /// Register a feed
    pub async fn register_feed(&self, feed: Box<dyn SimulationFeed>) {
        let mut feeds = self.feeds.write().await;
        feeds.push(feed);
    }

    /// Subscribe to engine notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ReplayNotification> {
        self.notification_tx.subscribe()
    }

    /// Move queued engine notifications onto the broadcast channel
    pub async fn flush_notifications(&self) -> usize {
        let pending = self.engine.write().await.drain_notifications();
        let count = pending.len();
        for notification in pending {
            // No receivers is fine; they will get the next one
            let _ = self.notification_tx.send(notification);
        }
        count
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
