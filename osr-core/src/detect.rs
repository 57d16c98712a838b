//! Post-capture event detection
//!
//! A single forward pass over consecutive frame pairs that infers drift
//! start/end, big air, overtakes, nitro activation and near misses from raw
//! snapshots. Runs on finished recordings only; the recording is never
//! mutated here, callers merge the returned events.
//!
//! Per-vehicle state is seeded from the first frame a vehicle appears in, so
//! edges are only reported between two consecutive sightings.

use crate::config::DetectionThresholds;
use crate::math::Vec3;
use crate::model::{EventType, Frame, Recording, ReplayEvent, VehicleId, VehicleSnapshot};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Rolling per-vehicle state carried between frames
#[derive(Debug, Clone, Default)]
struct VehicleTrack {
    drifting: bool,
    airborne: bool,
    takeoff: Option<Takeoff>,
}

#[derive(Debug, Clone, Copy)]
struct Takeoff {
    time: f32,
    frame_number: u32,
    location: Vec3,
}

#[derive(Debug, Clone)]
pub struct EventDetector {
    thresholds: DetectionThresholds,
    min_importance: f32,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(DetectionThresholds::default())
    }
}

impl EventDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self {
            thresholds,
            min_importance: 0.0,
        }
    }

    /// Drop detected events ranked below `importance`
    pub fn with_min_importance(mut self, importance: f32) -> Self {
        self.min_importance = importance;
        self
    }

    fn is_drifting(&self, snapshot: &VehicleSnapshot) -> bool {
        snapshot.drifting || snapshot.drift_angle.abs() >= self.thresholds.drift_angle
    }

    fn baseline(&self, snapshot: &VehicleSnapshot, frame: &Frame) -> VehicleTrack {
        VehicleTrack {
            drifting: self.is_drifting(snapshot),
            airborne: snapshot.airborne,
            takeoff: snapshot.airborne.then(|| Takeoff {
                time: frame.timestamp,
                frame_number: frame.frame_number,
                location: snapshot.position(),
            }),
        }
    }

    /// Detect events over the whole recording, ordered by timestamp
    pub fn analyze(&self, recording: &Recording) -> Vec<ReplayEvent> {
        let frames = &recording.frames;
        let mut events = Vec::new();
        let Some(first) = frames.front() else {
            return events;
        };
        if frames.len() < 2 {
            return events;
        }

        let mut tracks: BTreeMap<VehicleId, VehicleTrack> = first
            .vehicles
            .iter()
            .map(|(id, snap)| (*id, self.baseline(snap, first)))
            .collect();

        for (prev, current) in frames.iter().zip(frames.iter().skip(1)) {
            // Positions are compared over the cars seen in both frames, so a
            // car dropping out or joining never reads as a pass
            let in_both = |id: VehicleId| prev.vehicles.contains_key(&id) && current.vehicles.contains_key(&id);
            let ranks_before = rank_vehicles_where(prev, in_both);
            let ranks_now = rank_vehicles_where(current, in_both);

            for (&id, snap) in &current.vehicles {
                let Some(prev_snap) = prev.snapshot(id) else {
                    tracks.insert(id, self.baseline(snap, current));
                    continue;
                };
                let track = tracks
                    .entry(id)
                    .or_insert_with(|| self.baseline(prev_snap, prev));

                self.detect_drift(track, id, snap, current, &mut events);
                self.detect_big_air(track, id, snap, current, &mut events);

                if let (Some(before), Some(&now)) = (ranks_before.get(&id), ranks_now.get(&id)) {
                    if now < *before {
                        events.push(
                            event_at(EventType::Overtake, current, id, snap.position())
                                .described(format!("Vehicle {} moved up to P{}", id, now)),
                        );
                    }
                }

                if snap.nitro_active && !prev_snap.nitro_active {
                    events.push(
                        event_at(EventType::NitroActivated, current, id, snap.position())
                            .described(format!("Vehicle {} fired nitro", id)),
                    );
                }
            }

            self.detect_near_misses(current, &mut events);
        }

        events.retain(|e| e.importance >= self.min_importance);
        // Big air is stamped at takeoff, so restore time order
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        debug!(
            "Event detection found {} events over {} frames",
            events.len(),
            frames.len()
        );
        events
    }

    fn detect_drift(
        &self,
        track: &mut VehicleTrack,
        id: VehicleId,
        snap: &VehicleSnapshot,
        frame: &Frame,
        events: &mut Vec<ReplayEvent>,
    ) {
        let drifting = self.is_drifting(snap);
        if drifting && !track.drifting {
            events.push(
                event_at(EventType::DriftStart, frame, id, snap.position())
                    .described(format!("Vehicle {} started drifting", id)),
            );
        } else if !drifting && track.drifting {
            events.push(
                event_at(EventType::DriftEnd, frame, id, snap.position())
                    .described(format!("Vehicle {} ended a drift", id)),
            );
        }
        track.drifting = drifting;
    }

    fn detect_big_air(
        &self,
        track: &mut VehicleTrack,
        id: VehicleId,
        snap: &VehicleSnapshot,
        frame: &Frame,
        events: &mut Vec<ReplayEvent>,
    ) {
        if snap.airborne && !track.airborne {
            track.takeoff = Some(Takeoff {
                time: frame.timestamp,
                frame_number: frame.frame_number,
                location: snap.position(),
            });
        } else if !snap.airborne && track.airborne {
            if let Some(takeoff) = track.takeoff.take() {
                let airtime = frame.timestamp - takeoff.time;
                if airtime >= self.thresholds.min_airtime {
                    events.push(
                        ReplayEvent::new(EventType::BigAir)
                            .at(takeoff.time, takeoff.frame_number)
                            .for_vehicle(id, takeoff.location)
                            .described(format!("Vehicle {} was airborne for {:.2}s", id, airtime)),
                    );
                }
            }
        }
        track.airborne = snap.airborne;
    }

    // Pairwise scan; quadratic in the field size
    fn detect_near_misses(&self, frame: &Frame, events: &mut Vec<ReplayEvent>) {
        let min_speed = self.thresholds.near_miss_min_speed;
        let vehicles: Vec<(&VehicleId, &VehicleSnapshot)> = frame.vehicles.iter().collect();
        for (i, (id_a, a)) in vehicles.iter().enumerate() {
            for (id_b, b) in vehicles.iter().skip(i + 1) {
                let distance = (a.position() - b.position()).norm();
                if distance < self.thresholds.near_miss_distance
                    && a.speed > min_speed
                    && b.speed > min_speed
                {
                    events.push(
                        event_at(EventType::NearMiss, frame, **id_a, a.position()).described(
                            format!("Vehicles {} and {} passed {:.2}m apart", id_a, id_b, distance),
                        ),
                    );
                }
            }
        }
    }
}

fn event_at(event_type: EventType, frame: &Frame, id: VehicleId, location: Vec3) -> ReplayEvent {
    ReplayEvent::new(event_type)
        .at(frame.timestamp, frame.frame_number)
        .for_vehicle(id, location)
}

/// Race position per vehicle (1 = leader).
///
/// Ranks by track progress when every vehicle in the frame reports it,
/// otherwise by distance from the world origin. Ties go to the lower id.
pub fn rank_vehicles(frame: &Frame) -> HashMap<VehicleId, usize> {
    rank_vehicles_where(frame, |_| true)
}

/// Race position among the vehicles of `frame` accepted by `include`
pub fn rank_vehicles_where(frame: &Frame, include: impl Fn(VehicleId) -> bool) -> HashMap<VehicleId, usize> {
    let field: Vec<(&VehicleId, &VehicleSnapshot)> =
        frame.vehicles.iter().filter(|(id, _)| include(**id)).collect();
    let use_progress = field.iter().all(|(_, s)| s.track_progress.is_some());
    let mut order: Vec<(VehicleId, f32)> = field
        .into_iter()
        .map(|(id, s)| {
            let metric = match s.track_progress {
                Some(progress) if use_progress => progress,
                _ => s.position().norm(),
            };
            (*id, metric)
        })
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    order
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| (id, i + 1))
        .collect()
}
