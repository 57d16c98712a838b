//! Replay data model
//!
//! Defines the snapshot vocabulary shared by every replay component: vehicle
//! snapshots, frames, detected/reported events, clips and recordings.
//!
//! All timestamps are seconds since the start of the owning recording.
//! Positions are world-space meters, speeds are m/s, angles are degrees
//! unless a field says otherwise.

use crate::math::{Transform, Vec3};
use crate::seek::{find_frame_index_at_time, floor_frame_index};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Identifier of a vehicle inside one recording
pub type VehicleId = u32;

/// Complete recorded state of one vehicle at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub transform: Transform,

    /// Linear velocity in world space (m/s)
    pub velocity: Vec3,

    /// Angular velocity (rad/s)
    pub angular_velocity: Vec3,

    /// Speed (magnitude of velocity) in m/s
    pub speed: f32,

    /// Throttle input (0.0 to 1.0)
    pub throttle: f32,

    /// Brake input (0.0 to 1.0)
    pub brake: f32,

    /// Steering input (-1.0 = full left, 1.0 = full right)
    pub steering: f32,

    /// Current gear (-1 = reverse, 0 = neutral, 1+ = forward gears)
    pub gear: i8,

    pub rpm: f32,

    pub drifting: bool,

    /// Slip angle between heading and travel direction (degrees)
    pub drift_angle: f32,

    pub nitro_active: bool,

    /// Remaining nitro (0.0 to 1.0)
    pub nitro_amount: f32,

    pub airborne: bool,

    /// Distance travelled along the track centre line, when the feed knows it
    pub track_progress: Option<f32>,

    /// Wheel rotation angles (FL, FR, RL, RR)
    pub wheel_rotations: Vec<f32>,

    /// Suspension compression per wheel (0.0 to 1.0)
    pub suspension_compressions: Vec<f32>,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            speed: 0.0,
            throttle: 0.0,
            brake: 0.0,
            steering: 0.0,
            gear: 0,
            rpm: 0.0,
            drifting: false,
            drift_angle: 0.0,
            nitro_active: false,
            nitro_amount: 0.0,
            airborne: false,
            track_progress: None,
            wheel_rotations: Vec::new(),
            suspension_compressions: Vec::new(),
        }
    }
}

impl VehicleSnapshot {
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }
}

/// Recorded state of all vehicles plus the camera at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic capture counter, survives eviction of older frames
    pub frame_number: u32,

    /// Seconds since recording start
    pub timestamp: f32,

    /// Simulation step that produced this frame
    pub delta_time: f32,

    pub vehicles: BTreeMap<VehicleId, VehicleSnapshot>,

    pub camera_transform: Transform,

    /// Camera field of view in degrees
    pub camera_fov: f32,

    /// Frame flagged as a full-data anchor
    pub keyframe: bool,

    /// Approximate bytes charged against the buffer budget
    pub accounted_size: u64,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            frame_number: 0,
            timestamp: 0.0,
            delta_time: 0.0,
            vehicles: BTreeMap::new(),
            camera_transform: Transform::default(),
            camera_fov: 90.0,
            keyframe: false,
            accounted_size: 0,
        }
    }
}

impl Frame {
    pub fn new(frame_number: u32, timestamp: f32) -> Self {
        Self {
            frame_number,
            timestamp,
            ..Self::default()
        }
    }

    pub fn with_vehicle(mut self, id: VehicleId, snapshot: VehicleSnapshot) -> Self {
        self.vehicles.insert(id, snapshot);
        self
    }

    pub fn snapshot(&self, id: VehicleId) -> Option<&VehicleSnapshot> {
        self.vehicles.get(&id)
    }
}

/// Budget heuristic for one frame: struct size plus one snapshot per vehicle.
///
/// This is not a real memory measurement; heap storage behind the wheel
/// arrays is ignored.
pub fn estimated_frame_size(vehicle_count: usize) -> u64 {
    (std::mem::size_of::<Frame>() + vehicle_count * std::mem::size_of::<VehicleSnapshot>()) as u64
}

/// Replay camera modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraMode {
    #[default]
    FollowCar,
    Cinematic,
    TrackSide,
    Helicopter,
    Bumper,
    Hood,
    Cockpit,
    FreeCam,
    Drone,
    Director,
    Orbit,
    Photo,
}

impl CameraMode {
    pub const ALL: [CameraMode; 12] = [
        CameraMode::FollowCar,
        CameraMode::Cinematic,
        CameraMode::TrackSide,
        CameraMode::Helicopter,
        CameraMode::Bumper,
        CameraMode::Hood,
        CameraMode::Cockpit,
        CameraMode::FreeCam,
        CameraMode::Drone,
        CameraMode::Director,
        CameraMode::Orbit,
        CameraMode::Photo,
    ];

    /// Next mode in cycling order, wrapping after the last
    pub fn next(self) -> CameraMode {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Kinds of noteworthy replay moments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    RaceStart,
    RaceFinish,
    LapComplete,
    Overtake,
    Collision,
    DriftStart,
    DriftEnd,
    BigAir,
    TrickLanded,
    NearMiss,
    NitroActivated,
    BestSector,
    PersonalBest,
    Wreck,
    Respawn,
    ItemPickup,
    ItemUsed,
    PhotoOpportunity,
}

impl EventType {
    /// Highlight-reel rank in [0, 1]
    pub fn importance(self) -> f32 {
        match self {
            EventType::RaceStart | EventType::RaceFinish | EventType::PersonalBest => 1.0,
            EventType::Overtake | EventType::BigAir | EventType::TrickLanded => 0.8,
            EventType::LapComplete | EventType::DriftEnd | EventType::NitroActivated => 0.6,
            EventType::Collision | EventType::NearMiss => 0.5,
            _ => 0.4,
        }
    }

    /// Suggested camera mode and distance (meters) for replaying this moment
    pub fn framing(self) -> (CameraMode, f32) {
        match self {
            EventType::BigAir | EventType::TrickLanded => (CameraMode::Orbit, 15.0),
            EventType::DriftStart | EventType::DriftEnd => (CameraMode::Orbit, 8.0),
            EventType::Collision | EventType::Wreck => (CameraMode::TrackSide, 20.0),
            EventType::NearMiss | EventType::Overtake => (CameraMode::FollowCar, 8.0),
            EventType::RaceStart | EventType::RaceFinish => (CameraMode::Helicopter, 30.0),
            _ => (CameraMode::FollowCar, 10.0),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            EventType::RaceStart => "Race Start",
            EventType::RaceFinish => "Race Finish",
            EventType::LapComplete => "Lap Complete",
            EventType::Overtake => "Overtake",
            EventType::Collision => "Collision",
            EventType::DriftStart => "Drift Start",
            EventType::DriftEnd => "Drift End",
            EventType::BigAir => "Big Air",
            EventType::TrickLanded => "Trick Landed",
            EventType::NearMiss => "Near Miss",
            EventType::NitroActivated => "Nitro Activated",
            EventType::BestSector => "Best Sector",
            EventType::PersonalBest => "Personal Best",
            EventType::Wreck => "Wreck",
            EventType::Respawn => "Respawn",
            EventType::ItemPickup => "Item Pickup",
            EventType::ItemUsed => "Item Used",
            EventType::PhotoOpportunity => "Photo Opportunity",
        }
    }
}

/// A noteworthy moment inside a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub timestamp: f32,

    /// Capture counter of the frame this event belongs to
    pub frame_number: u32,

    pub vehicle_id: Option<VehicleId>,
    pub location: Vec3,
    pub description: String,

    /// Rank in [0, 1] used for highlight selection
    pub importance: f32,

    pub recommended_camera_distance: f32,
    pub recommended_camera_mode: CameraMode,
}

impl ReplayEvent {
    /// New event with importance and framing taken from the type tables
    pub fn new(event_type: EventType) -> Self {
        let (mode, distance) = event_type.framing();
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: 0.0,
            frame_number: 0,
            vehicle_id: None,
            location: Vec3::zeros(),
            description: String::new(),
            importance: event_type.importance(),
            recommended_camera_distance: distance,
            recommended_camera_mode: mode,
        }
    }

    pub fn at(mut self, timestamp: f32, frame_number: u32) -> Self {
        self.timestamp = timestamp;
        self.frame_number = frame_number;
        self
    }

    pub fn for_vehicle(mut self, vehicle_id: VehicleId, location: Vec3) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self.location = location;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A named time-range view into a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: Uuid,
    pub name: String,
    pub start_time: f32,
    pub end_time: f32,

    /// Last frame at or before `start_time`
    pub start_frame: usize,

    /// First frame at or after `end_time`
    pub end_frame: usize,

    pub camera_mode: CameraMode,
    pub focus_vehicle: VehicleId,

    /// Events whose timestamp lies in `[start_time, end_time]`
    pub events: Vec<ReplayEvent>,

    pub favorite: bool,
    pub created_at: DateTime<Utc>,
}

impl Clip {
    pub fn duration(&self) -> f32 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// A registered race participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub vehicle_id: VehicleId,
    pub player_name: String,
    pub vehicle_type: String,
}

/// A captured session: frames, events and saved clips
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub name: String,
    pub recorded_at: DateTime<Utc>,

    pub track_id: String,
    pub track_name: String,
    pub game_mode: String,
    pub participants: Vec<Participant>,

    /// Span between first and last frame (seconds), set on finalize
    pub total_duration: f32,
    pub total_frames: usize,
    pub frame_rate: f32,

    /// Approximate buffer bytes at finalize
    pub size_bytes: u64,
    pub thumbnail_path: String,

    /// Ordered by timestamp
    pub events: Vec<ReplayEvent>,
    pub clips: Vec<Clip>,

    pub version: u32,

    /// Ordered by strictly ascending timestamp
    pub frames: VecDeque<Frame>,
}

impl Default for Recording {
    fn default() -> Self {
        Self::new("")
    }
}

impl Recording {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            recorded_at: Utc::now(),
            track_id: String::new(),
            track_name: String::new(),
            game_mode: String::new(),
            participants: Vec::new(),
            total_duration: 0.0,
            total_frames: 0,
            frame_rate: 60.0,
            size_bytes: 0,
            thumbnail_path: String::new(),
            events: Vec::new(),
            clips: Vec::new(),
            version: 1,
            frames: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Live span between the oldest and newest retained frame
    pub fn span(&self) -> f32 {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Vehicle ids present in the first retained frame, ascending
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.frames
            .front()
            .map(|f| f.vehicles.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Shift frames, events and clips so the oldest retained frame sits at
    /// 0.0. Clips ending before that frame are dropped; the rest are clamped
    /// to it and have their frame indices resolved again.
    pub fn rebase_timeline(&mut self) {
        let Some(origin) = self.frames.front().map(|f| f.timestamp) else {
            return;
        };
        if origin == 0.0 {
            return;
        }
        for frame in self.frames.iter_mut() {
            frame.timestamp -= origin;
        }
        for event in self.events.iter_mut() {
            event.timestamp = (event.timestamp - origin).max(0.0);
        }

        let mut clips = std::mem::take(&mut self.clips);
        clips.retain(|clip| clip.end_time >= origin);
        for clip in clips.iter_mut() {
            clip.start_time = (clip.start_time - origin).max(0.0);
            clip.end_time -= origin;
            clip.events.retain(|e| e.timestamp >= origin);
            for event in clip.events.iter_mut() {
                event.timestamp -= origin;
            }
            clip.start_frame = floor_frame_index(self, clip.start_time);
            clip.end_frame = find_frame_index_at_time(self, clip.end_time);
        }
        self.clips = clips;
    }

    /// Metadata view without frame data
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            id: self.id,
            name: self.name.clone(),
            recorded_at: self.recorded_at,
            track_name: self.track_name.clone(),
            game_mode: self.game_mode.clone(),
            total_duration: self.total_duration,
            total_frames: self.total_frames,
            event_count: self.events.len(),
            clip_count: self.clips.len(),
            size_bytes: self.size_bytes,
        }
    }

    /// Copy of this recording with frame data stripped
    pub fn without_frames(&self) -> Recording {
        Recording {
            frames: VecDeque::new(),
            ..self.clone()
        }
    }
}

/// Serializable recording metadata for notifications and listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: Uuid,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub track_name: String,
    pub game_mode: String,
    pub total_duration: f32,
    pub total_frames: usize,
    pub event_count: usize,
    pub clip_count: usize,
    pub size_bytes: u64,
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayState {
    #[default]
    Idle,
    Recording,
    Paused,
    Playing,
    Scrubbing,
    Exporting,
}

/// Cursor over the recording being played back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub state: ReplayState,
    pub current_time: f32,
    pub current_frame: usize,
    pub speed: f32,
    pub looping: bool,
    pub camera_mode: CameraMode,
    pub focus_vehicle: VehicleId,
    pub total_duration: f32,
    pub total_frames: usize,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            state: ReplayState::Idle,
            current_time: 0.0,
            current_frame: 0,
            speed: 1.0,
            looping: false,
            camera_mode: CameraMode::FollowCar,
            focus_vehicle: 0,
            total_duration: 0.0,
            total_frames: 0,
        }
    }
}

impl PlaybackState {
    /// Fraction of the recording already played, in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.current_time / self.total_duration).clamp(0.0, 1.0)
    }
}
