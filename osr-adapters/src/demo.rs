//! Demo feed that simulates a small race for testing
//!
//! Four cars lap a circuit of straights, braking zones, drift corners and a
//! jump. Cars run at slightly different pace from a staggered grid so the
//! field reshuffles, which gives the event detector overtakes, drifts, big
//! air and nitro bursts to find without an actual game.

use anyhow::Result;
use osr_core::feed::{ReportedEvent, SessionInfo, SimulationFeed, TickSample};
use osr_core::math::{lerp, Quat, Transform, Vec3};
use osr_core::model::{EventType, Participant, VehicleId, VehicleSnapshot};
use tracing::debug;

/// Fixed simulation step
pub const DEMO_STEP: f32 = 1.0 / 60.0;

const DEFAULT_LAPS: u32 = 3;
const WHEEL_RADIUS: f32 = 0.33;
const GRID_SPACING: f32 = 10.0;

// =============================================================================
// Track definition: a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy, PartialEq)]
enum SegmentKind {
    Straight, // Full throttle, nitro burst mid-way
    Braking,  // Heavy braking into a corner
    Corner,   // Sliding through, drift angle follows the steering envelope
    Accel,    // Accelerating out of a corner
    Jump,     // Crest that launches the car
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f32,     // seconds to traverse at reference pace
    target_speed: f32, // m/s at end of segment
    steering: f32,     // peak steering angle in radians (signed: + = right)
    drift_angle: f32,  // peak slip angle in degrees
}

/// A short rally-cross style loop: ~40s lap
fn demo_track() -> Vec<TrackSegment> {
    vec![
        // Start/finish straight
        TrackSegment { kind: SegmentKind::Straight, duration: 6.0, target_speed: 62.0, steering: 0.0,   drift_angle: 0.0 },
        // T1: hairpin right, full slide
        TrackSegment { kind: SegmentKind::Braking,  duration: 2.0, target_speed: 30.0, steering: 0.03,  drift_angle: 0.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.0, target_speed: 26.0, steering: 0.40,  drift_angle: 28.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0, target_speed: 45.0, steering: 0.08,  drift_angle: 6.0 },
        // Crest jump
        TrackSegment { kind: SegmentKind::Jump,     duration: 1.6, target_speed: 44.0, steering: 0.0,   drift_angle: 0.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 2.5, target_speed: 52.0, steering: 0.0,   drift_angle: 0.0 },
        // Back straight
        TrackSegment { kind: SegmentKind::Straight, duration: 7.0, target_speed: 66.0, steering: 0.0,   drift_angle: 0.0 },
        // T2: sweeping left, mild slide
        TrackSegment { kind: SegmentKind::Braking,  duration: 1.5, target_speed: 42.0, steering: -0.02, drift_angle: 0.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.5, target_speed: 40.0, steering: -0.30, drift_angle: 18.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0, target_speed: 55.0, steering: -0.05, drift_angle: 4.0 },
        // Run to start/finish
        TrackSegment { kind: SegmentKind::Straight, duration: 5.0, target_speed: 62.0, steering: 0.0,   drift_angle: 0.0 },
    ]
}

// =============================================================================
// Interpolation state derived from track position
// =============================================================================

struct LapState {
    speed: f32,
    throttle: f32,
    brake: f32,
    steering: f32,
    drift_angle: f32,
    airborne: bool,
    height: f32,
    nitro: bool,
}

fn compute_lap_state(track: &[TrackSegment], lap_time: f32) -> LapState {
    let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
    let t = lap_time % lap_duration;

    // Find current segment
    let mut elapsed = 0.0_f32;
    let mut seg_idx = track.len() - 1;
    for (i, seg) in track.iter().enumerate() {
        if elapsed + seg.duration > t {
            seg_idx = i;
            break;
        }
        elapsed += seg.duration;
    }

    let seg = track[seg_idx];
    let seg_t = ((t - elapsed) / seg.duration).clamp(0.0, 1.0);

    // Previous segment's target speed (for interpolation start)
    let prev_target_speed = track[(seg_idx + track.len() - 1) % track.len()].target_speed;

    let smooth_t = smoothstep(seg_t);
    let speed = lerp(prev_target_speed, seg.target_speed, smooth_t);

    let (throttle, brake) = match seg.kind {
        SegmentKind::Straight => (0.95 + 0.05 * (1.0 - seg_t), 0.0),
        SegmentKind::Braking => (0.0, (1.0 - smooth_t * 0.3).clamp(0.0, 1.0)),
        SegmentKind::Corner => (0.4 + 0.3 * seg_t, 0.0),
        SegmentKind::Accel => (0.5 + 0.5 * smooth_t, 0.0),
        SegmentKind::Jump => (0.6, 0.0),
    };

    // Steering and slip ramp in during the first half, out during the second
    let steer_envelope = if seg_t < 0.5 {
        smoothstep(seg_t * 2.0)
    } else {
        smoothstep((1.0 - seg_t) * 2.0)
    };

    // Wheels leave the ground for the middle of the crest
    let airborne = seg.kind == SegmentKind::Jump && seg_t > 0.15 && seg_t < 0.85;
    let height = if airborne {
        let u = (seg_t - 0.15) / 0.7;
        4.0 * 3.5 * u * (1.0 - u)
    } else {
        0.0
    };

    LapState {
        speed,
        throttle,
        brake,
        steering: seg.steering * steer_envelope,
        drift_angle: seg.drift_angle * steer_envelope,
        airborne,
        height,
        nitro: seg.kind == SegmentKind::Straight && seg_t > 0.2 && seg_t < 0.6,
    }
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn speed_to_gear(speed_ms: f32) -> i8 {
    let kph = speed_ms * 3.6;
    match kph {
        x if x < 40.0 => 1,
        x if x < 80.0 => 2,
        x if x < 120.0 => 3,
        x if x < 170.0 => 4,
        x if x < 230.0 => 5,
        _ => 6,
    }
}

fn speed_to_rpm(speed_ms: f32, gear: i8) -> f32 {
    let base_ratio = match gear {
        1 => 130.0,
        2 => 85.0,
        3 => 60.0,
        4 => 45.0,
        5 => 36.0,
        _ => 30.0,
    };
    (speed_ms * base_ratio + 1200.0).clamp(1200.0, 8000.0)
}

/// Simple deterministic noise from a seed
fn noise(seed: f32) -> f32 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f32, amplitude: f32) -> f32 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// Cars
// =============================================================================

struct DemoCar {
    id: VehicleId,
    driver: &'static str,
    vehicle_type: &'static str,
    pace: f32,       // multiplier on reference pace
    grid_offset: f32, // meters behind the start line
    position: Vec3,
    heading: f32,
    distance: f32,
    laps_completed: u32,
    wheel_angle: f32,
    nitro_amount: f32,
}

impl DemoCar {
    fn new(slot: usize, id: VehicleId, driver: &'static str, vehicle_type: &'static str, pace: f32) -> Self {
        let grid_offset = slot as f32 * GRID_SPACING;
        let lateral = if slot % 2 == 0 { -2.0 } else { 2.0 };
        Self {
            id,
            driver,
            vehicle_type,
            pace,
            grid_offset,
            position: Vec3::new(lateral, 0.0, -grid_offset),
            heading: 0.0,
            distance: 0.0,
            laps_completed: 0,
            wheel_angle: 0.0,
            nitro_amount: 1.0,
        }
    }

    /// Advance one step; returns the snapshot and whether a lap was just completed
    fn step(&mut self, track: &[TrackSegment], lap_duration: f32, race_time: f32, seed: f32) -> (VehicleSnapshot, bool) {
        let car_time = race_time * self.pace;
        let state = compute_lap_state(track, car_time);
        let n = seed + self.id as f32 * 101.0;

        let speed = ((state.speed + jitter(n, 0.3)) * self.pace).max(0.0);
        let yaw_rate = state.steering * speed * 0.02;
        self.heading += yaw_rate * DEMO_STEP;

        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), self.heading);
        let forward = rotation * Vec3::z();
        let velocity = forward * speed;
        self.position += velocity * DEMO_STEP;
        self.position.y = state.height;
        self.distance += speed * DEMO_STEP;
        self.wheel_angle = (self.wheel_angle + speed * DEMO_STEP / WHEEL_RADIUS) % std::f32::consts::TAU;

        self.nitro_amount = if state.nitro {
            (self.nitro_amount - DEMO_STEP * 0.25).max(0.0)
        } else {
            (self.nitro_amount + DEMO_STEP * 0.05).min(1.0)
        };
        let nitro_active = state.nitro && self.nitro_amount > 0.0;

        let lap = (car_time / lap_duration) as u32;
        let lap_done = lap > self.laps_completed;
        if lap_done {
            self.laps_completed = lap;
        }

        let drift_angle = state.drift_angle + jitter(n * 1.7, 0.5);
        let gear = speed_to_gear(speed);
        // Suspension: base travel plus body roll from the slide
        let roll_load = state.steering * 0.3;
        let compression = |is_left: bool| {
            if state.airborne {
                0.0
            } else {
                (0.5 + if is_left { -roll_load } else { roll_load }).clamp(0.0, 1.0)
            }
        };

        let snapshot = VehicleSnapshot {
            transform: Transform::new(self.position, rotation),
            velocity,
            angular_velocity: Vec3::new(0.0, yaw_rate, 0.0),
            speed,
            throttle: (state.throttle + jitter(n * 1.2, 0.02)).clamp(0.0, 1.0),
            brake: (state.brake + jitter(n * 1.3, 0.02)).clamp(0.0, 1.0),
            steering: state.steering,
            gear,
            rpm: speed_to_rpm(speed, gear),
            drifting: drift_angle.abs() >= 15.0,
            drift_angle,
            nitro_active,
            nitro_amount: self.nitro_amount,
            airborne: state.airborne,
            track_progress: Some(self.distance - self.grid_offset),
            wheel_rotations: vec![self.wheel_angle; 4],
            suspension_compressions: vec![
                compression(true),
                compression(false),
                compression(true),
                compression(false),
            ],
        };
        (snapshot, lap_done)
    }
}

fn demo_grid() -> Vec<DemoCar> {
    // Slowest car on pole so the field reshuffles
    vec![
        DemoCar::new(0, 1, "Demo Player", "Rally GT", 0.97),
        DemoCar::new(1, 2, "Kit Moreno", "Rally GT", 0.99),
        DemoCar::new(2, 3, "Sam Okafor", "Buggy", 1.01),
        DemoCar::new(3, 4, "Ren Ishida", "Buggy", 1.03),
    ]
}

// =============================================================================
// DemoRace
// =============================================================================

pub struct DemoRace {
    active: bool,
    race_time: f32,
    tick_count: u64,
    track: Vec<TrackSegment>,
    lap_duration: f32,
    total_laps: u32,
    finished: bool,
    cars: Vec<DemoCar>,
}

impl DemoRace {
    pub fn new() -> Self {
        let track = demo_track();
        let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
        Self {
            active: false,
            race_time: 0.0,
            tick_count: 0,
            track,
            lap_duration,
            total_laps: DEFAULT_LAPS,
            finished: false,
            cars: demo_grid(),
        }
    }

    pub fn with_laps(mut self, laps: u32) -> Self {
        self.total_laps = laps.max(1);
        self
    }

    /// Reference lap time in seconds
    pub fn lap_duration(&self) -> f32 {
        self.lap_duration
    }

    pub fn race_time(&self) -> f32 {
        self.race_time
    }

    fn generate_tick(&mut self) -> TickSample {
        self.tick_count += 1;
        self.race_time += DEMO_STEP;
        let n = self.tick_count as f32;

        let mut events = Vec::new();
        if self.tick_count == 1 {
            events.push(ReportedEvent::new(EventType::RaceStart, None, "Lights out"));
        }

        let mut vehicles = Vec::with_capacity(self.cars.len());
        for car in self.cars.iter_mut() {
            let (snapshot, lap_done) = car.step(&self.track, self.lap_duration, self.race_time, n);
            if lap_done {
                debug!("{} completed lap {}", car.driver, car.laps_completed);
                events.push(ReportedEvent::new(
                    EventType::LapComplete,
                    Some(car.id),
                    format!("{} completed lap {}", car.driver, car.laps_completed),
                ));
                if !self.finished && car.laps_completed >= self.total_laps {
                    self.finished = true;
                    events.push(ReportedEvent::new(
                        EventType::RaceFinish,
                        Some(car.id),
                        format!("{} takes the win", car.driver),
                    ));
                }
            }
            vehicles.push((car.id, snapshot));
        }

        let camera = leader(&vehicles).map(|snapshot| {
            let eye = snapshot.transform.offset_point(Vec3::new(0.0, 3.0, -8.0));
            (Transform::new(eye, snapshot.transform.rotation), 70.0)
        });

        TickSample {
            delta_time: DEMO_STEP,
            vehicles,
            camera,
            events,
        }
    }
}

fn leader(vehicles: &[(VehicleId, VehicleSnapshot)]) -> Option<&VehicleSnapshot> {
    vehicles
        .iter()
        .map(|(_, s)| s)
        .max_by(|a, b| {
            a.track_progress
                .unwrap_or(0.0)
                .total_cmp(&b.track_progress.unwrap_or(0.0))
        })
}

impl Default for DemoRace {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationFeed for DemoRace {
    fn name(&self) -> &str {
        "Demo Race"
    }

    fn detect(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<()> {
        self.active = true;
        self.race_time = 0.0;
        self.tick_count = 0;
        self.finished = false;
        self.cars = demo_grid();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    fn read_tick(&mut self) -> Result<Option<TickSample>> {
        if !self.active {
            return Ok(None);
        }

        Ok(Some(self.generate_tick()))
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn session(&self) -> Option<SessionInfo> {
        Some(SessionInfo {
            track_id: "demo_loop".to_string(),
            track_name: "Demo Loop".to_string(),
            game_mode: format!("race_{}_laps", self.total_laps),
            participants: self
                .cars
                .iter()
                .map(|car| Participant {
                    vehicle_id: car.id,
                    player_name: car.driver.to_string(),
                    vehicle_type: car.vehicle_type.to_string(),
                })
                .collect(),
        })
    }
}
