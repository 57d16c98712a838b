//! Time-to-frame lookup and snapshot interpolation
//!
//! Every routine here relies on frames being stored in strictly ascending
//! timestamp order and never mutates the recording.

use crate::math::{lerp, span_alpha};
use crate::model::{Frame, Recording, VehicleId, VehicleSnapshot};

/// Index of the first frame whose timestamp is >= `time`.
///
/// Times past the newest frame resolve to the last index; an empty
/// recording resolves to 0.
pub fn find_frame_index_at_time(recording: &Recording, time: f32) -> usize {
    let frames = &recording.frames;
    if frames.is_empty() {
        return 0;
    }
    frames
        .partition_point(|f| f.timestamp < time)
        .min(frames.len() - 1)
}

/// Index of the last frame whose timestamp is <= `time` (0 when `time`
/// precedes every frame).
pub fn floor_frame_index(recording: &Recording, time: f32) -> usize {
    let idx = find_frame_index_at_time(recording, time);
    match recording.frames.get(idx) {
        Some(frame) if idx > 0 && frame.timestamp > time => idx - 1,
        _ => idx,
    }
}

/// Frame at `index`, or a default frame when out of range
pub fn frame_or_default(recording: &Recording, index: usize) -> Frame {
    recording.frames.get(index).cloned().unwrap_or_default()
}

pub fn frame_at_time(recording: &Recording, time: f32) -> Frame {
    frame_or_default(recording, find_frame_index_at_time(recording, time))
}

/// Raw (uninterpolated) snapshot of a vehicle in the frame found for `time`
pub fn vehicle_snapshot_at_time(
    recording: &Recording,
    vehicle_id: VehicleId,
    time: f32,
) -> VehicleSnapshot {
    let idx = find_frame_index_at_time(recording, time);
    recording
        .frames
        .get(idx)
        .and_then(|f| f.snapshot(vehicle_id))
        .cloned()
        .unwrap_or_default()
}

/// Smoothly blended vehicle state at `time`.
///
/// Uses the frame pair bracketing `time`. When only one of the pair holds
/// the vehicle, that snapshot is returned as is; when neither does, a
/// default snapshot is returned.
pub fn interpolate_vehicle_snapshot(
    recording: &Recording,
    vehicle_id: VehicleId,
    time: f32,
) -> VehicleSnapshot {
    let frames = &recording.frames;
    let i = floor_frame_index(recording, time);
    let Some(a) = frames.get(i) else {
        return VehicleSnapshot::default();
    };
    let Some(b) = frames.get(i + 1) else {
        return a.snapshot(vehicle_id).cloned().unwrap_or_default();
    };

    let alpha = span_alpha(time, a.timestamp, b.timestamp).clamp(0.0, 1.0);
    match (a.snapshot(vehicle_id), b.snapshot(vehicle_id)) {
        (Some(sa), Some(sb)) => lerp_snapshot(sa, sb, alpha),
        (Some(only), None) | (None, Some(only)) => only.clone(),
        (None, None) => VehicleSnapshot::default(),
    }
}

/// Blend two snapshots.
///
/// Continuous values are linear, rotation is spherical and discrete state
/// (gear, drift/nitro/airborne flags) switches at alpha 0.5. Endpoints are
/// returned exactly.
pub fn lerp_snapshot(a: &VehicleSnapshot, b: &VehicleSnapshot, alpha: f32) -> VehicleSnapshot {
    if alpha <= 0.0 {
        return a.clone();
    }
    if alpha >= 1.0 {
        return b.clone();
    }
    let step = alpha >= 0.5;

    VehicleSnapshot {
        transform: a.transform.blend(&b.transform, alpha),
        velocity: a.velocity.lerp(&b.velocity, alpha),
        angular_velocity: a.angular_velocity.lerp(&b.angular_velocity, alpha),
        speed: lerp(a.speed, b.speed, alpha),
        throttle: lerp(a.throttle, b.throttle, alpha),
        brake: lerp(a.brake, b.brake, alpha),
        steering: lerp(a.steering, b.steering, alpha),
        gear: if step { b.gear } else { a.gear },
        rpm: lerp(a.rpm, b.rpm, alpha),
        drifting: if step { b.drifting } else { a.drifting },
        drift_angle: lerp(a.drift_angle, b.drift_angle, alpha),
        nitro_active: if step { b.nitro_active } else { a.nitro_active },
        nitro_amount: lerp(a.nitro_amount, b.nitro_amount, alpha),
        airborne: if step { b.airborne } else { a.airborne },
        track_progress: match (a.track_progress, b.track_progress) {
            (Some(pa), Some(pb)) => Some(lerp(pa, pb, alpha)),
            _ if step => b.track_progress,
            _ => a.track_progress,
        },
        wheel_rotations: lerp_slices(&a.wheel_rotations, &b.wheel_rotations, alpha),
        suspension_compressions: lerp_slices(
            &a.suspension_compressions,
            &b.suspension_compressions,
            alpha,
        ),
    }
}

// Only indices present in both inputs survive
fn lerp_slices(a: &[f32], b: &[f32], alpha: f32) -> Vec<f32> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| lerp(*x, *y, alpha))
        .collect()
}
