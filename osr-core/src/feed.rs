//! Simulation feed trait definition

use crate::math::Transform;
use crate::model::{EventType, Participant, VehicleId, VehicleSnapshot};
use anyhow::Result;

/// One simulation step as pushed into the engine
#[derive(Debug, Clone, Default)]
pub struct TickSample {
    /// Simulated seconds since the previous sample
    pub delta_time: f32,

    pub vehicles: Vec<(VehicleId, VehicleSnapshot)>,

    /// Broadcast camera pose and field of view, when the simulation has one
    pub camera: Option<(Transform, f32)>,

    /// Externally reported moments (race start/finish, laps, collisions)
    pub events: Vec<ReportedEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportedEvent {
    pub event_type: EventType,
    pub vehicle_id: Option<VehicleId>,
    pub description: String,
}

impl ReportedEvent {
    pub fn new(event_type: EventType, vehicle_id: Option<VehicleId>, description: impl Into<String>) -> Self {
        Self {
            event_type,
            vehicle_id,
            description: description.into(),
        }
    }
}

/// Track and entrant details a feed knows up front
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub track_id: String,
    pub track_name: String,
    pub game_mode: String,
    pub participants: Vec<Participant>,
}

/// Source of per-tick world state
///
/// Each feed is responsible for:
/// - Detecting if its simulation is available
/// - Producing vehicle and camera state each step
/// - Reporting moments the replay engine cannot infer (race start, laps)
pub trait SimulationFeed: Send + Sync {
    /// Display name of this feed (e.g., "Demo Race")
    fn name(&self) -> &str;

    /// Lightweight availability check
    fn detect(&self) -> bool;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Read the next step
    ///
    /// Returns:
    /// - `Ok(Some(sample))` if a new step is available
    /// - `Ok(None)` if no new data (non-blocking)
    /// - `Err(_)` if an error occurred
    fn read_tick(&mut self) -> Result<Option<TickSample>>;

    fn is_active(&self) -> bool;

    /// Session metadata, if the simulation exposes it
    fn session(&self) -> Option<SessionInfo> {
        None
    }
}
