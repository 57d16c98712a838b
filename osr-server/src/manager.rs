//! Feed lifecycle and engine tick loop
//!
//! This module handles:
//! - Polling feeds for simulation detection
//! - Starting/stopping feeds when simulations appear/exit
//! - Pushing each feed step into the engine
//! - Ticking the engine and broadcasting its notifications

use crate::state::AppState;
use anyhow::Result;
use osr_adapters::DemoRace;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

const DETECTION_INTERVAL: Duration = Duration::from_secs(1);
pub const TICK_INTERVAL: Duration = Duration::from_millis(16); // ~60Hz

/// Main manager loop; returns when the state's shutdown token is cancelled
pub async fn run(state: AppState) {
    state.register_feed(Box::new(DemoRace::new())).await;

    info!("Feed manager started");

    let mut last_detection: Option<Instant> = None;
    let mut last_tick = Instant::now();

    loop {
        // Rate limit detection checks to once per second
        if last_detection.map_or(true, |t| t.elapsed() >= DETECTION_INTERVAL) {
            last_detection = Some(Instant::now());
            if let Err(e) = detection_cycle(&state).await {
                error!("Error in detection cycle: {}", e);
            }
        }

        if let Err(e) = feed_read_cycle(&state).await {
            error!("Error reading feed: {}", e);
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;
        state.engine.write().await.tick(dt);
        state.flush_notifications().await;

        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = sleep(TICK_INTERVAL) => {}
        }
    }

    info!("Feed manager stopped");
}

/// Check all feeds for simulation detection
pub async fn detection_cycle(state: &AppState) -> Result<()> {
    let mut feeds = state.feeds.write().await;
    let mut active_feed = state.active_feed.write().await;

    // If we have an active feed, check if it's still detected
    if let Some(ref active_name) = *active_feed {
        if let Some(feed) = feeds.iter_mut().find(|f| f.name() == active_name) {
            if !feed.detect() {
                info!("Simulation {} no longer detected, stopping feed", active_name);
                if let Err(e) = feed.stop() {
                    error!("Error stopping feed {}: {}", active_name, e);
                }
                *active_feed = None;
            }
            return Ok(());
        }
    }

    // No active feed, look for detected simulations
    for feed in feeds.iter_mut() {
        if feed.detect() && !feed.is_active() {
            info!("Simulation {} detected, starting feed", feed.name());
            match feed.start() {
                Ok(_) => {
                    if let Some(session) = feed.session() {
                        state.engine.write().await.apply_session(&session);
                    }
                    *active_feed = Some(feed.name().to_string());
                    info!("Feed {} started successfully", feed.name());
                    break;
                }
                Err(e) => {
                    error!("Failed to start feed {}: {}", feed.name(), e);
                }
            }
        }
    }

    Ok(())
}

/// Read one step from the active feed and push it into the engine
pub async fn feed_read_cycle(state: &AppState) -> Result<()> {
    let Some(active_name) = state.active_feed.read().await.clone() else {
        return Ok(());
    };

    let sample = {
        let mut feeds = state.feeds.write().await;
        let Some(feed) = feeds.iter_mut().find(|f| f.name() == active_name) else {
            return Ok(());
        };
        match feed.read_tick() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Error reading tick from {}: {}", active_name, e);
                None
            }
        }
    };

    if let Some(sample) = sample {
        // Ignored outside Recording; the feed keeps running for the next capture
        state.engine.write().await.ingest(sample);
    }

    Ok(())
}
