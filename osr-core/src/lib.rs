//! OpenSimReplay Core Library
//!
//! This crate provides the replay data model, the circular recording buffer,
//! seek and interpolation, post-capture event detection, camera resolution
//! and the tick-driven replay engine that ties them together.

pub mod buffer;
pub mod camera;
pub mod clip;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod export;
pub mod feed;
pub mod math;
pub mod model;
pub mod notify;
pub mod seek;
pub mod store;

pub use buffer::RecordingBuffer;
pub use camera::{CameraKeyframe, CameraRig, CameraView};
pub use config::{DetectionThresholds, ReplayConfig};
pub use detect::EventDetector;
pub use engine::ReplayEngine;
pub use error::{ExportError, StoreError};
pub use export::{ExportEncoder, ExportFormat, ExportSettings, SimulatedEncoder};
pub use feed::{ReportedEvent, SessionInfo, SimulationFeed, TickSample};
pub use math::{Quat, Transform, Vec3};
pub use model::{
    CameraMode, Clip, EventType, Frame, Participant, PlaybackState, Recording, RecordingSummary,
    ReplayEvent, ReplayState, VehicleId, VehicleSnapshot,
};
pub use notify::ReplayNotification;
pub use store::{MemoryStore, RecordingStore, SlotInfo};
