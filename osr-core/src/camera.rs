//! Replay camera resolution
//!
//! [`resolve_camera`] turns the playback cursor, the camera rig and the
//! recording into a viewing transform. It is a pure function; the rig is the
//! only camera state and is mutated by the engine's camera controls.

use crate::math::{lerp, look_at, slerp, span_alpha, Transform, Vec3};
use crate::model::{CameraMode, PlaybackState, Recording, VehicleId};
use crate::seek::{floor_frame_index, interpolate_vehicle_snapshot};
use serde::{Deserialize, Serialize};

/// Follow camera offset: behind and above the car
const FOLLOW_OFFSET: Vec3 = Vec3::new(0.0, 2.0, -5.0);
const BUMPER_OFFSET: Vec3 = Vec3::new(0.0, 0.5, 0.5);
const HOOD_OFFSET: Vec3 = Vec3::new(0.0, 0.8, 1.0);
const COCKPIT_OFFSET: Vec3 = Vec3::new(-0.35, 1.1, 0.1);
const DRONE_OFFSET: Vec3 = Vec3::new(0.0, 4.0, -9.0);
const HELICOPTER_HEIGHT: f32 = 10.0;
const HELICOPTER_TRAIL: f32 = 3.0;
const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_HEIGHT: f32 = 2.0;

/// Orbit angular speed (rad per second of playback time)
const ORBIT_RATE: f32 = 0.5;

/// One authored camera pose on the cinematic track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraKeyframe {
    pub time: f32,
    pub transform: Transform,
    pub fov: f32,
    pub focus_distance: f32,
    pub aperture: f32,
    pub depth_of_field: bool,
    pub motion_blur: f32,
    pub chromatic_aberration: f32,
    pub vignette: f32,
    pub target_vehicle: Option<VehicleId>,
    pub target_offset: Vec3,
    pub interpolate_to_next: bool,
}

impl Default for CameraKeyframe {
    fn default() -> Self {
        Self {
            time: 0.0,
            transform: Transform::default(),
            fov: 90.0,
            focus_distance: 1000.0,
            aperture: 2.8,
            depth_of_field: false,
            motion_blur: 0.5,
            chromatic_aberration: 0.0,
            vignette: 0.0,
            target_vehicle: None,
            target_offset: Vec3::zeros(),
            interpolate_to_next: true,
        }
    }
}

impl CameraKeyframe {
    pub fn new(time: f32, transform: Transform, fov: f32) -> Self {
        Self {
            time,
            transform,
            fov,
            ..Self::default()
        }
    }
}

/// Resolved camera pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub transform: Transform,
    pub fov: f32,
}

/// Cinematic keyframes plus the externally driven free-camera pose
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraRig {
    keyframes: Vec<CameraKeyframe>,
    pub free_transform: Transform,
}

impl CameraRig {
    /// Keyframes ordered by time
    pub fn keyframes(&self) -> &[CameraKeyframe] {
        &self.keyframes
    }

    /// Insert keeping time order; equal times keep insertion order
    pub fn add_keyframe(&mut self, keyframe: CameraKeyframe) {
        let idx = self.keyframes.partition_point(|k| k.time <= keyframe.time);
        self.keyframes.insert(idx, keyframe);
    }

    pub fn clear_keyframes(&mut self) {
        self.keyframes.clear();
    }

    /// Blended keyframe pose at `time`, or `None` outside the keyframed range
    pub fn cinematic_view(&self, time: f32) -> Option<CameraView> {
        let (first, last) = (self.keyframes.first()?, self.keyframes.last()?);
        if self.keyframes.len() < 2 || time < first.time || time > last.time {
            return None;
        }

        let idx = self
            .keyframes
            .partition_point(|k| k.time <= time)
            .clamp(1, self.keyframes.len() - 1);
        let (a, b) = (&self.keyframes[idx - 1], &self.keyframes[idx]);
        if !a.interpolate_to_next {
            return Some(CameraView {
                transform: a.transform,
                fov: a.fov,
            });
        }

        let alpha = span_alpha(time, a.time, b.time).clamp(0.0, 1.0);
        Some(CameraView {
            transform: Transform {
                position: a.transform.position.lerp(&b.transform.position, alpha),
                rotation: slerp(&a.transform.rotation, &b.transform.rotation, alpha),
                scale: a.transform.scale,
            },
            fov: lerp(a.fov, b.fov, alpha),
        })
    }
}

/// Viewing transform for the playback cursor.
///
/// Free camera returns the rig's free pose. Cinematic uses keyframes inside
/// their range and otherwise falls back to the per-mode rules. Every other
/// mode is a fixed rule applied to the focus vehicle's interpolated pose.
pub fn resolve_camera(state: &PlaybackState, recording: &Recording, rig: &CameraRig) -> CameraView {
    let fov = recording
        .frames
        .get(floor_frame_index(recording, state.current_time))
        .map(|f| f.camera_fov)
        .unwrap_or(90.0);

    match state.camera_mode {
        CameraMode::FreeCam => {
            return CameraView {
                transform: rig.free_transform,
                fov,
            }
        }
        CameraMode::Cinematic => {
            if let Some(view) = rig.cinematic_view(state.current_time) {
                return view;
            }
        }
        _ => {}
    }

    let vehicle =
        interpolate_vehicle_snapshot(recording, state.focus_vehicle, state.current_time).transform;
    CameraView {
        transform: mode_transform(state.camera_mode, &vehicle, state.current_time),
        fov,
    }
}

/// Closed-form camera pose for `mode` relative to a vehicle pose
pub fn mode_transform(mode: CameraMode, vehicle: &Transform, time: f32) -> Transform {
    let target = vehicle.position;
    let chase = |position: Vec3| Transform::new(position, look_at(&position, &target, vehicle.rotation));
    let mounted = |offset: Vec3| Transform::new(vehicle.offset_point(offset), vehicle.rotation);

    match mode {
        CameraMode::FollowCar => chase(vehicle.offset_point(FOLLOW_OFFSET)),
        CameraMode::Drone => chase(vehicle.offset_point(DRONE_OFFSET)),
        CameraMode::Bumper => mounted(BUMPER_OFFSET),
        CameraMode::Hood => mounted(HOOD_OFFSET),
        CameraMode::Cockpit => mounted(COCKPIT_OFFSET),
        CameraMode::Helicopter => {
            let position = target
                + Vec3::new(0.0, HELICOPTER_HEIGHT, 0.0)
                + vehicle.rotation * Vec3::new(0.0, 0.0, -HELICOPTER_TRAIL);
            chase(position)
        }
        CameraMode::Orbit => {
            let angle = time * ORBIT_RATE;
            let position = target
                + Vec3::new(angle.cos() * ORBIT_RADIUS, ORBIT_HEIGHT, angle.sin() * ORBIT_RADIUS);
            chase(position)
        }
        _ => *vehicle,
    }
}
