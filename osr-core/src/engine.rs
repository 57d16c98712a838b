//! Replay engine
//!
//! Owns the recording under capture, the playback session and the camera
//! rig, and moves between idle, recording, paused, playing, scrubbing and
//! exporting. The engine is single-threaded and tick-driven: hosts push
//! simulation state in and call [`ReplayEngine::tick`] once per frame.
//!
//! Playback never reads the live buffer. Starting playback (or an instant
//! replay) takes a snapshot copy of the recording, so capture can resume
//! without sharing frames between reader and writer.
//!
//! Control calls made from an incompatible state are ignored. Collaborator
//! failures (persistence, export) are reported as notifications.

use crate::buffer::RecordingBuffer;
use crate::camera::{resolve_camera, CameraKeyframe, CameraRig, CameraView};
use crate::clip::{self, HIGHLIGHT_PADDING};
use crate::config::{clamp_playback_speed, ReplayConfig};
use crate::detect::EventDetector;
use crate::export::{ExportEncoder, ExportRequest, ExportSettings, ExportStatus, JobId, SimulatedEncoder};
use crate::feed::{SessionInfo, TickSample};
use crate::math::{Transform, Vec3};
use crate::model::{
    CameraMode, Clip, EventType, Frame, Participant, PlaybackState, Recording, ReplayEvent,
    ReplayState, VehicleId, VehicleSnapshot,
};
use crate::notify::{NotificationBus, ReplayNotification};
use crate::seek;
use crate::store::{MemoryStore, RecordingStore, SlotInfo};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tick time between export polls (seconds)
pub const EXPORT_POLL_INTERVAL: f32 = 0.1;

/// Events closer than this to the cursor are skipped by next/previous jumps
const EVENT_JUMP_HYSTERESIS: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
struct InstantReplay {
    prior_state: ReplayState,
    prior_speed: f32,
}

#[derive(Debug, Clone, Copy)]
struct ExportJob {
    job: JobId,
    since_poll: f32,
}

#[derive(Debug, Clone, Default)]
struct SessionMeta {
    track_id: String,
    track_name: String,
    game_mode: String,
}

pub struct ReplayEngine {
    config: ReplayConfig,
    state: ReplayState,
    buffer: RecordingBuffer,
    pending: Frame,
    playback: Option<Recording>,
    cursor: PlaybackState,
    rig: CameraRig,
    instant_replay: Option<InstantReplay>,
    clip_end: Option<f32>,
    export: Option<ExportJob>,
    participants: BTreeMap<VehicleId, Participant>,
    session: SessionMeta,
    bus: NotificationBus,
    store: Box<dyn RecordingStore>,
    encoder: Box<dyn ExportEncoder>,
}

impl ReplayEngine {
    pub fn new(
        config: ReplayConfig,
        store: Box<dyn RecordingStore>,
        encoder: Box<dyn ExportEncoder>,
    ) -> Self {
        Self {
            config,
            state: ReplayState::Idle,
            buffer: RecordingBuffer::default(),
            pending: Frame::default(),
            playback: None,
            cursor: PlaybackState::default(),
            rig: CameraRig::default(),
            instant_replay: None,
            clip_end: None,
            export: None,
            participants: BTreeMap::new(),
            session: SessionMeta::default(),
            bus: NotificationBus::default(),
            store,
            encoder,
        }
    }

    /// Engine backed by an in-memory store and the simulated encoder
    pub fn in_memory(config: ReplayConfig) -> Self {
        Self::new(
            config,
            Box::new(MemoryStore::new()),
            Box::new(SimulatedEncoder::default()),
        )
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Settings changes apply to frames captured afterwards
    pub fn config_mut(&mut self) -> &mut ReplayConfig {
        &mut self.config
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn playback_state(&self) -> &PlaybackState {
        &self.cursor
    }

    pub fn is_recording(&self) -> bool {
        self.state == ReplayState::Recording
    }

    pub fn in_instant_replay(&self) -> bool {
        self.instant_replay.is_some()
    }

    pub fn current_recording(&self) -> &Recording {
        self.buffer.recording()
    }

    pub fn playback_recording(&self) -> Option<&Recording> {
        self.playback.as_ref()
    }

    pub fn drain_notifications(&mut self) -> Vec<ReplayNotification> {
        self.bus.drain()
    }

    fn transition(&mut self, state: ReplayState) {
        if self.state != state {
            debug!("Replay state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.cursor.state = state;
    }

    fn publish(&mut self, notification: ReplayNotification) {
        self.bus.publish(notification);
    }

    fn recording_paused(&self) -> bool {
        self.state == ReplayState::Paused && self.playback.is_none()
    }

    fn has_playback_session(&self) -> bool {
        self.playback.is_some()
            && matches!(
                self.state,
                ReplayState::Playing | ReplayState::Paused | ReplayState::Scrubbing
            )
    }

    // --- Session metadata ---

    pub fn register_participant(&mut self, vehicle_id: VehicleId, player_name: &str, vehicle_type: &str) {
        self.participants.insert(
            vehicle_id,
            Participant {
                vehicle_id,
                player_name: player_name.to_string(),
                vehicle_type: vehicle_type.to_string(),
            },
        );
    }

    pub fn unregister_participant(&mut self, vehicle_id: VehicleId) {
        self.participants.remove(&vehicle_id);
    }

    pub fn set_session_info(&mut self, track_id: &str, track_name: &str, game_mode: &str) {
        self.session = SessionMeta {
            track_id: track_id.to_string(),
            track_name: track_name.to_string(),
            game_mode: game_mode.to_string(),
        };
    }

    /// Adopt a feed's session details and entrant list
    pub fn apply_session(&mut self, info: &SessionInfo) {
        self.set_session_info(&info.track_id, &info.track_name, &info.game_mode);
        for p in &info.participants {
            self.register_participant(p.vehicle_id, &p.player_name, &p.vehicle_type);
        }
    }

    // --- Recording ---

    pub fn start_recording(&mut self, name: &str) {
        if self.state != ReplayState::Idle {
            debug!("Ignoring start_recording while {:?}", self.state);
            return;
        }

        let name = if name.is_empty() {
            format!("Recording_{}", Utc::now().format("%Y%m%d_%H%M%S"))
        } else {
            name.to_string()
        };
        let mut recording = Recording::new(name);
        recording.frame_rate = self.config.target_frame_rate;
        recording.track_id = self.session.track_id.clone();
        recording.track_name = self.session.track_name.clone();
        recording.game_mode = self.session.game_mode.clone();
        recording.participants = self.participants.values().cloned().collect();

        let recording_id = recording.id;
        info!("Recording started: {} ({})", recording.name, recording_id);
        self.buffer = RecordingBuffer::new(recording);
        self.pending = Frame::default();
        self.transition(ReplayState::Recording);
        self.publish(ReplayNotification::RecordingStarted { recording_id });
    }

    /// Finalize the current recording: rebase its timeline, fill in totals
    /// and run event detection
    pub fn stop_recording(&mut self) {
        if self.state != ReplayState::Recording && !self.recording_paused() {
            return;
        }
        self.transition(ReplayState::Idle);
        self.pending = Frame::default();

        let byte_size = self.buffer.byte_size();
        let recording = self.buffer.recording_mut();
        recording.rebase_timeline();
        recording.total_duration = recording.span();
        recording.total_frames = recording.frames.len();
        recording.size_bytes = byte_size;

        let mut detected = Vec::new();
        if !recording.is_empty() {
            recording.thumbnail_path = format!("thumbnails/{}.png", recording.id);
            if self.config.auto_detect_events {
                detected = EventDetector::new(self.config.thresholds)
                    .with_min_importance(self.config.min_event_importance)
                    .analyze(recording);
                recording.events.extend(detected.iter().cloned());
                recording
                    .events
                    .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            }
        }

        let summary = recording.summary();
        info!(
            "Recording stopped: {} ({:.2}s, {} frames, {} events detected)",
            summary.name,
            summary.total_duration,
            summary.total_frames,
            detected.len()
        );
        for event in detected {
            self.publish(ReplayNotification::EventDetected(event));
        }
        self.publish(ReplayNotification::RecordingStopped(summary));
    }

    pub fn pause_recording(&mut self) {
        if self.state == ReplayState::Recording {
            self.transition(ReplayState::Paused);
            info!("Recording paused");
        }
    }

    pub fn resume_recording(&mut self) {
        if self.recording_paused() {
            self.transition(ReplayState::Recording);
            info!("Recording resumed");
        }
    }

    /// Drop the current recording without finalizing it
    pub fn discard_recording(&mut self) {
        if self.playback.is_some() || self.state == ReplayState::Exporting {
            return;
        }
        info!("Discarding recording '{}'", self.buffer.recording().name);
        self.buffer = RecordingBuffer::default();
        self.pending = Frame::default();
        self.transition(ReplayState::Idle);
    }

    /// Seconds between the oldest and newest captured frame
    pub fn recording_duration(&self) -> f32 {
        self.buffer.recording().span()
    }

    pub fn recorded_frame_count(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer a vehicle's state for the frame being assembled
    pub fn record_vehicle_state(&mut self, vehicle_id: VehicleId, snapshot: VehicleSnapshot) {
        if self.state == ReplayState::Recording {
            self.pending.vehicles.insert(vehicle_id, snapshot);
        }
    }

    pub fn record_camera_state(&mut self, transform: Transform, fov: f32) {
        if self.state == ReplayState::Recording {
            self.pending.camera_transform = transform;
            self.pending.camera_fov = fov;
        }
    }

    /// Commit the assembled frame, `delta_time` seconds after the previous
    /// one. The first frame of a recording is stamped 0.0.
    pub fn record_frame(&mut self, delta_time: f32) -> bool {
        if self.state != ReplayState::Recording {
            return false;
        }
        let mut frame = std::mem::take(&mut self.pending);
        frame.delta_time = delta_time;
        frame.timestamp = match self.buffer.last_timestamp() {
            Some(last) => last + delta_time,
            None => 0.0,
        };
        self.buffer.push(frame, &self.config)
    }

    /// Push one simulation step: vehicles, camera, frame commit, then any
    /// reported events stamped at the new frame
    pub fn ingest(&mut self, sample: TickSample) -> bool {
        if self.state != ReplayState::Recording {
            return false;
        }
        for (id, snapshot) in sample.vehicles {
            self.record_vehicle_state(id, snapshot);
        }
        if let Some((transform, fov)) = sample.camera {
            self.record_camera_state(transform, fov);
        }
        let committed = self.record_frame(sample.delta_time);
        if committed {
            for reported in sample.events {
                self.record_event_simple(reported.event_type, reported.vehicle_id, &reported.description);
            }
        }
        committed
    }

    /// Add an externally reported event, stamped with the newest frame's
    /// time and number
    pub fn record_event(&mut self, mut event: ReplayEvent) -> Option<ReplayEvent> {
        if self.state != ReplayState::Recording {
            return None;
        }
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
        }
        let (timestamp, frame_number) = self
            .buffer
            .recording()
            .frames
            .back()
            .map(|f| (f.timestamp, f.frame_number))
            .unwrap_or((0.0, 0));
        event.timestamp = timestamp;
        event.frame_number = frame_number;

        debug!("Event recorded: {:?} at {:.3}s", event.event_type, timestamp);
        self.buffer.push_event(event.clone());
        self.publish(ReplayNotification::EventDetected(event.clone()));
        Some(event)
    }

    /// Record an event with importance and framing from the type tables
    pub fn record_event_simple(
        &mut self,
        event_type: EventType,
        vehicle_id: Option<VehicleId>,
        description: &str,
    ) -> Option<ReplayEvent> {
        let location = vehicle_id
            .and_then(|id| {
                self.buffer
                    .recording()
                    .frames
                    .back()
                    .and_then(|f| f.snapshot(id))
                    .map(|s| s.position())
            })
            .unwrap_or_else(Vec3::zeros);
        let mut event = ReplayEvent::new(event_type).described(description);
        event.vehicle_id = vehicle_id;
        event.location = location;
        self.record_event(event)
    }

    // --- Playback ---

    fn begin_playback(&mut self, mut recording: Recording) {
        recording.rebase_timeline();
        recording.total_duration = recording.span();
        recording.total_frames = recording.frames.len();

        let ids = recording.vehicle_ids();
        let focus_vehicle = if ids.is_empty() || ids.contains(&self.cursor.focus_vehicle) {
            self.cursor.focus_vehicle
        } else {
            ids[0]
        };
        self.cursor = PlaybackState {
            state: ReplayState::Playing,
            current_time: 0.0,
            current_frame: 0,
            speed: self.cursor.speed,
            looping: self.cursor.looping,
            camera_mode: self.cursor.camera_mode,
            focus_vehicle,
            total_duration: recording.total_duration,
            total_frames: recording.total_frames,
        };
        info!(
            "Playback started: {} ({:.2}s, {} frames)",
            recording.name, recording.total_duration, recording.total_frames
        );
        self.playback = Some(recording);
        self.clip_end = None;
        self.transition(ReplayState::Playing);
        self.publish(ReplayNotification::PlaybackStarted);
    }

    /// Play the current (finished) recording from the start
    pub fn start_playback(&mut self) -> bool {
        if self.state != ReplayState::Idle || self.buffer.is_empty() {
            return false;
        }
        let snapshot = self.buffer.recording().clone();
        self.begin_playback(snapshot);
        true
    }

    /// Play an arbitrary recording, e.g. one loaded elsewhere
    pub fn play_recording(&mut self, recording: Recording) -> bool {
        if self.state != ReplayState::Idle || recording.is_empty() {
            return false;
        }
        self.begin_playback(recording);
        true
    }

    pub fn stop_playback(&mut self) {
        if !self.has_playback_session() {
            return;
        }
        self.playback = None;
        self.clip_end = None;
        match self.instant_replay.take() {
            Some(replay) => {
                self.cursor.speed = replay.prior_speed;
                self.transition(replay.prior_state);
                info!("Instant replay finished, back to {:?}", replay.prior_state);
            }
            None => {
                self.transition(ReplayState::Idle);
                info!("Playback stopped");
            }
        }
        self.publish(ReplayNotification::PlaybackStopped);
    }

    pub fn pause_playback(&mut self) {
        if self.state == ReplayState::Playing && self.playback.is_some() {
            self.transition(ReplayState::Paused);
            self.publish(ReplayNotification::PlaybackPaused);
        }
    }

    pub fn resume_playback(&mut self) {
        if self.playback.is_some()
            && matches!(self.state, ReplayState::Paused | ReplayState::Scrubbing)
        {
            self.transition(ReplayState::Playing);
            self.publish(ReplayNotification::PlaybackResumed);
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            ReplayState::Playing => self.pause_playback(),
            ReplayState::Paused | ReplayState::Scrubbing => self.resume_playback(),
            _ => {}
        }
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        self.cursor.speed = clamp_playback_speed(speed);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.cursor.looping = looping;
    }

    pub fn playback_progress(&self) -> f32 {
        self.cursor.progress()
    }

    fn publish_progress(&mut self) {
        let progress = self.cursor.progress();
        let current_time = self.cursor.current_time;
        self.publish(ReplayNotification::PlaybackProgress {
            progress,
            current_time,
        });
    }

    /// Move the cursor to `time`, clamped to the recording, and enter
    /// scrubbing
    pub fn seek_to_time(&mut self, time: f32) {
        if !self.has_playback_session() {
            return;
        }
        let time = if time.is_nan() {
            0.0
        } else {
            time.clamp(0.0, self.cursor.total_duration)
        };
        self.cursor.current_time = time;
        self.cursor.current_frame = self
            .playback
            .as_ref()
            .map(|r| seek::find_frame_index_at_time(r, time))
            .unwrap_or(0);
        self.transition(ReplayState::Scrubbing);
        self.publish_progress();
    }

    pub fn seek_to_frame(&mut self, frame: usize) {
        if !self.has_playback_session() {
            return;
        }
        let index = frame.min(self.cursor.total_frames.saturating_sub(1));
        let time = self
            .playback
            .as_ref()
            .and_then(|r| r.frames.get(index))
            .map(|f| f.timestamp)
            .unwrap_or(0.0);
        self.cursor.current_frame = index;
        self.cursor.current_time = time;
        self.transition(ReplayState::Scrubbing);
        self.publish_progress();
    }

    pub fn seek_to_event(&mut self, event_id: Uuid) {
        let time = self
            .playback
            .as_ref()
            .and_then(|r| r.events.iter().find(|e| e.id == event_id))
            .map(|e| e.timestamp);
        if let Some(time) = time {
            self.seek_to_time(time);
        }
    }

    pub fn skip_forward(&mut self, seconds: f32) {
        self.seek_to_time(self.cursor.current_time + seconds);
    }

    pub fn skip_backward(&mut self, seconds: f32) {
        self.seek_to_time(self.cursor.current_time - seconds);
    }

    pub fn jump_to_next_event(&mut self) {
        let threshold = self.cursor.current_time + EVENT_JUMP_HYSTERESIS;
        let next = self
            .playback
            .as_ref()
            .and_then(|r| r.events.iter().find(|e| e.timestamp > threshold))
            .map(|e| e.timestamp);
        if let Some(time) = next {
            self.seek_to_time(time);
        }
    }

    pub fn jump_to_previous_event(&mut self) {
        let threshold = self.cursor.current_time - EVENT_JUMP_HYSTERESIS;
        let previous = self
            .playback
            .as_ref()
            .and_then(|r| r.events.iter().rev().find(|e| e.timestamp < threshold))
            .map(|e| e.timestamp);
        if let Some(time) = previous {
            self.seek_to_time(time);
        }
    }

    /// Replay the trailing `seconds` (default from config) of the current
    /// recording at the instant-replay speed, then return to the prior state
    pub fn trigger_instant_replay(&mut self, seconds: Option<f32>) -> bool {
        if !matches!(self.state, ReplayState::Recording | ReplayState::Idle) || self.buffer.is_empty() {
            return false;
        }
        let requested = seconds
            .filter(|s| s.is_finite())
            .unwrap_or(self.config.instant_replay_duration)
            .max(0.0);

        let prior = InstantReplay {
            prior_state: self.state,
            prior_speed: self.cursor.speed,
        };
        let snapshot = self.buffer.recording().clone();
        // Capture stops feeding frames while the replay runs
        self.transition(ReplayState::Idle);
        self.begin_playback(snapshot);
        self.instant_replay = Some(prior);

        let start = (self.cursor.total_duration - requested).max(0.0);
        self.cursor.current_time = start;
        self.cursor.current_frame = self
            .playback
            .as_ref()
            .map(|r| seek::find_frame_index_at_time(r, start))
            .unwrap_or(0);
        self.cursor.speed = clamp_playback_speed(self.config.instant_replay_speed);
        info!(
            "Instant replay of last {:.1}s from {:.2}s",
            requested, start
        );
        true
    }

    /// Advance playback by `delta_time` seconds of host time
    pub fn update_playback(&mut self, delta_time: f32) {
        if self.state != ReplayState::Playing || self.playback.is_none() {
            return;
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return;
        }

        let mut time = self.cursor.current_time + delta_time * self.cursor.speed;
        if let Some(end) = self.clip_end {
            if time >= end {
                self.cursor.current_time = end.min(self.cursor.total_duration);
                self.stop_playback();
                return;
            }
        }
        if time > self.cursor.total_duration {
            if self.cursor.looping && self.instant_replay.is_none() {
                time = 0.0;
            } else {
                self.cursor.current_time = self.cursor.total_duration;
                self.stop_playback();
                return;
            }
        }

        self.cursor.current_time = time;
        self.cursor.current_frame = self
            .playback
            .as_ref()
            .map(|r| seek::find_frame_index_at_time(r, time))
            .unwrap_or(0);
        self.publish_progress();
    }

    /// Advance the engine by one host tick
    pub fn tick(&mut self, delta_time: f32) {
        self.update_playback(delta_time);
        self.poll_export(delta_time);
    }

    // --- Camera ---

    pub fn set_camera_mode(&mut self, mode: CameraMode) {
        self.cursor.camera_mode = mode;
    }

    pub fn set_focus_vehicle(&mut self, vehicle_id: VehicleId) {
        self.cursor.focus_vehicle = vehicle_id;
    }

    pub fn cycle_camera_mode(&mut self) -> CameraMode {
        self.cursor.camera_mode = self.cursor.camera_mode.next();
        self.cursor.camera_mode
    }

    /// Focus the next vehicle present in the first frame, wrapping around
    pub fn cycle_focus_vehicle(&mut self) -> VehicleId {
        let ids = self
            .playback
            .as_ref()
            .unwrap_or_else(|| self.buffer.recording())
            .vehicle_ids();
        if let Some(first) = ids.first() {
            self.cursor.focus_vehicle = ids
                .iter()
                .find(|id| **id > self.cursor.focus_vehicle)
                .copied()
                .unwrap_or(*first);
        }
        self.cursor.focus_vehicle
    }

    pub fn camera_keyframes(&self) -> &[CameraKeyframe] {
        self.rig.keyframes()
    }

    pub fn add_camera_keyframe(&mut self, keyframe: CameraKeyframe) {
        self.rig.add_keyframe(keyframe);
    }

    pub fn clear_camera_keyframes(&mut self) {
        self.rig.clear_keyframes();
    }

    /// Switch to cinematic mode; needs at least two keyframes
    pub fn start_cinematic_mode(&mut self) -> bool {
        if self.rig.keyframes().len() < 2 {
            return false;
        }
        self.cursor.camera_mode = CameraMode::Cinematic;
        true
    }

    pub fn set_free_camera_transform(&mut self, transform: Transform) {
        self.rig.free_transform = transform;
    }

    /// Camera pose for the current cursor
    pub fn camera_view(&self) -> CameraView {
        let recording = self
            .playback
            .as_ref()
            .unwrap_or_else(|| self.buffer.recording());
        resolve_camera(&self.cursor, recording, &self.rig)
    }

    // --- Frame access ---

    fn viewed_recording(&self) -> &Recording {
        self.playback
            .as_ref()
            .unwrap_or_else(|| self.buffer.recording())
    }

    pub fn frame(&self, index: usize) -> Frame {
        seek::frame_or_default(self.viewed_recording(), index)
    }

    pub fn frame_at_time(&self, time: f32) -> Frame {
        seek::frame_at_time(self.viewed_recording(), time)
    }

    pub fn vehicle_snapshot_at_time(&self, vehicle_id: VehicleId, time: f32) -> VehicleSnapshot {
        seek::vehicle_snapshot_at_time(self.viewed_recording(), vehicle_id, time)
    }

    /// Smoothly interpolated state of a vehicle at the cursor
    pub fn interpolated_snapshot(&self, vehicle_id: VehicleId) -> VehicleSnapshot {
        seek::interpolate_vehicle_snapshot(self.viewed_recording(), vehicle_id, self.cursor.current_time)
    }

    // --- Events ---

    pub fn events(&self) -> &[ReplayEvent] {
        &self.buffer.recording().events
    }

    pub fn events_of_type(&self, event_type: EventType) -> Vec<ReplayEvent> {
        clip::events_of_type(self.buffer.recording(), event_type)
    }

    pub fn events_in_range(&self, start: f32, end: f32) -> Vec<ReplayEvent> {
        clip::events_in_range(self.buffer.recording(), start, end)
    }

    pub fn nearest_event(&self, time: f32) -> Option<ReplayEvent> {
        clip::nearest_event(self.buffer.recording(), time).cloned()
    }

    // --- Clips ---

    /// Save a clip of the current recording using the cursor's camera mode
    /// and focus vehicle
    pub fn create_clip(&mut self, name: &str, start_time: f32, end_time: f32) -> Clip {
        let clip = clip::build_clip(
            self.buffer.recording(),
            name,
            start_time,
            end_time,
            self.cursor.camera_mode,
            self.cursor.focus_vehicle,
        );
        debug!(
            "Clip '{}' created for {:.2}s..{:.2}s with {} events",
            clip.name,
            clip.start_time,
            clip.end_time,
            clip.events.len()
        );
        self.buffer.recording_mut().clips.push(clip.clone());
        self.publish(ReplayNotification::ClipCreated(clip.clone()));
        clip
    }

    /// Clip around an event, clamped to the recording
    pub fn create_clip_from_event(&mut self, event: &ReplayEvent, padding_before: f32, padding_after: f32) -> Clip {
        let recording = self.buffer.recording();
        let bound = recording
            .frames
            .back()
            .map(|f| f.timestamp)
            .unwrap_or(recording.total_duration);
        let (start, end) = clip::event_window(event, padding_before, padding_after, bound);
        let name = clip::event_clip_name(event.event_type);
        self.create_clip(&name, start, end)
    }

    pub fn delete_clip(&mut self, clip_id: Uuid) -> bool {
        let clips = &mut self.buffer.recording_mut().clips;
        let before = clips.len();
        clips.retain(|c| c.id != clip_id);
        clips.len() != before
    }

    pub fn set_clip_favorite(&mut self, clip_id: Uuid, favorite: bool) -> bool {
        match self
            .buffer
            .recording_mut()
            .clips
            .iter_mut()
            .find(|c| c.id == clip_id)
        {
            Some(clip) => {
                clip.favorite = favorite;
                true
            }
            None => false,
        }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.buffer.recording().clips
    }

    pub fn favorite_clips(&self) -> Vec<Clip> {
        self.clips().iter().filter(|c| c.favorite).cloned().collect()
    }

    /// Play a saved clip with its camera settings; playback stops at the
    /// clip end
    pub fn play_clip(&mut self, clip_id: Uuid) -> bool {
        if self.instant_replay.is_some() {
            return false;
        }
        let Some(clip) = self.clips().iter().find(|c| c.id == clip_id).cloned() else {
            return false;
        };
        if self.playback.is_none() && !self.start_playback() {
            return false;
        }
        if !self.has_playback_session() {
            return false;
        }

        self.cursor.camera_mode = clip.camera_mode;
        self.cursor.focus_vehicle = clip.focus_vehicle;
        self.seek_to_time(clip.start_time);
        self.resume_playback();
        self.clip_end = Some(clip.end_time);
        info!("Playing clip '{}'", clip.name);
        true
    }

    /// Clip the most important events of the current recording, padded
    /// either side, until `max_duration` seconds of clips exist
    pub fn generate_highlight_reel(&mut self, max_duration: f32) -> Vec<Clip> {
        let picked = clip::highlight_events(
            self.buffer.recording(),
            self.config.min_event_importance,
            max_duration,
        );
        picked
            .iter()
            .map(|event| self.create_clip_from_event(event, HIGHLIGHT_PADDING, HIGHLIGHT_PADDING))
            .collect()
    }

    // --- Persistence ---

    fn persistence_failed(&mut self, slot: &str, reason: String) {
        error!("Replay storage failed for slot '{}': {}", slot, reason);
        self.publish(ReplayNotification::PersistenceFailed {
            slot: slot.to_string(),
            reason,
        });
    }

    /// Save the current recording; the oldest saves beyond the configured
    /// cap are deleted afterwards
    pub fn save_recording(&mut self, slot: &str) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        if let Err(e) = self.store.save(slot, self.buffer.recording()) {
            self.persistence_failed(slot, e.to_string());
            return false;
        }
        info!("Saved recording '{}' to slot '{}'", self.buffer.recording().name, slot);
        self.enforce_save_cap();
        true
    }

    fn enforce_save_cap(&mut self) {
        let mut saved = match self.store.list() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Could not list saved recordings: {}", e);
                return;
            }
        };
        let cap = self.config.max_saved_recordings.max(1);
        if saved.len() <= cap {
            return;
        }
        saved.sort_by_key(|info| info.recorded_at);
        let excess = saved.len() - cap;
        for info in saved.into_iter().take(excess) {
            match self.store.delete(&info.slot) {
                Ok(_) => debug!("Evicted saved recording '{}'", info.slot),
                Err(e) => warn!("Could not evict saved recording '{}': {}", info.slot, e),
            }
        }
    }

    /// Replace the current recording with a saved one
    pub fn load_recording(&mut self, slot: &str) -> bool {
        if self.state != ReplayState::Idle {
            return false;
        }
        match self.store.load(slot) {
            Ok(mut recording) => {
                recording.rebase_timeline();
                info!("Loaded recording '{}' from slot '{}'", recording.name, slot);
                self.buffer = RecordingBuffer::new(recording);
                true
            }
            Err(e) => {
                self.persistence_failed(slot, e.to_string());
                false
            }
        }
    }

    pub fn delete_saved_recording(&mut self, slot: &str) -> bool {
        match self.store.delete(slot) {
            Ok(existed) => existed,
            Err(e) => {
                self.persistence_failed(slot, e.to_string());
                false
            }
        }
    }

    pub fn saved_recordings(&self) -> Vec<SlotInfo> {
        self.store.list().unwrap_or_else(|e| {
            warn!("Could not list saved recordings: {}", e);
            Vec::new()
        })
    }

    /// Metadata, events and clips of a saved recording without frame data
    pub fn saved_recording_info(&self, slot: &str) -> Option<Recording> {
        self.store.load(slot).ok().map(|r| r.without_frames())
    }

    // --- Export ---

    fn export_failed(&mut self, reason: String) {
        warn!("Export failed: {}", reason);
        self.publish(ReplayNotification::ExportFailed { reason });
    }

    /// Hand the current recording to the encoder; progress is polled from
    /// [`ReplayEngine::tick`]
    pub fn export_replay(&mut self, settings: &ExportSettings) -> bool {
        if self.state != ReplayState::Idle {
            return false;
        }
        let request = match ExportRequest::resolve(settings, self.buffer.recording()) {
            Ok(request) => request,
            Err(e) => {
                self.export_failed(e.to_string());
                return false;
            }
        };
        match self.encoder.begin(self.buffer.recording(), &request) {
            Ok(job) => {
                info!(
                    "Export started: {:?} {:.2}s..{:.2}s",
                    request.settings.format, request.start_time, request.end_time
                );
                self.export = Some(ExportJob { job, since_poll: 0.0 });
                self.transition(ReplayState::Exporting);
                true
            }
            Err(e) => {
                self.export_failed(e.to_string());
                false
            }
        }
    }

    pub fn export_clip(&mut self, clip_id: Uuid, settings: &ExportSettings) -> bool {
        let Some(clip) = self.clips().iter().find(|c| c.id == clip_id).cloned() else {
            return false;
        };
        let settings = ExportSettings {
            start_time: Some(clip.start_time),
            end_time: Some(clip.end_time),
            ..settings.clone()
        };
        self.export_replay(&settings)
    }

    pub fn cancel_export(&mut self) {
        if self.state != ReplayState::Exporting {
            return;
        }
        if let Some(export) = self.export.take() {
            self.encoder.cancel(export.job);
        }
        self.transition(ReplayState::Idle);
        self.export_failed("Export cancelled by user".to_string());
    }

    fn poll_export(&mut self, delta_time: f32) {
        if self.state != ReplayState::Exporting || !delta_time.is_finite() || delta_time <= 0.0 {
            return;
        }
        let Some(mut export) = self.export else {
            return;
        };
        export.since_poll += delta_time;
        while export.since_poll >= EXPORT_POLL_INTERVAL {
            export.since_poll -= EXPORT_POLL_INTERVAL;
            match self.encoder.poll(export.job) {
                Ok(ExportStatus::InProgress(progress)) => {
                    self.publish(ReplayNotification::ExportProgress { progress });
                }
                Ok(ExportStatus::Complete { output_path }) => {
                    info!("Export complete: {}", output_path);
                    self.export = None;
                    self.transition(ReplayState::Idle);
                    self.publish(ReplayNotification::ExportComplete { output_path });
                    return;
                }
                Err(e) => {
                    self.export = None;
                    self.transition(ReplayState::Idle);
                    self.export_failed(e.to_string());
                    return;
                }
            }
        }
        self.export = Some(export);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.5;

    fn car(x: f32, speed: f32) -> VehicleSnapshot {
        VehicleSnapshot {
            transform: Transform::from_position(Vec3::new(x, 0.0, 0.0)),
            speed,
            ..VehicleSnapshot::default()
        }
    }

    /// Engine holding a stopped recording of `frames` frames, `DT` apart
    fn recorded(frames: usize) -> ReplayEngine {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("test");
        for i in 0..frames {
            engine.record_vehicle_state(1, car(i as f32 * 10.0, 20.0));
            engine.record_frame(DT);
        }
        engine.stop_recording();
        engine.drain_notifications();
        engine
    }

    #[test]
    fn test_record_frame_ignored_when_idle() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.record_vehicle_state(1, car(0.0, 0.0));
        assert!(!engine.record_frame(DT));
        assert_eq!(engine.recorded_frame_count(), 0);
    }

    #[test]
    fn test_frames_are_stamped_from_deltas() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("clock");
        for _ in 0..3 {
            engine.record_frame(0.25);
        }
        let times: Vec<f32> = engine.current_recording().frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5]);
    }

    #[test]
    fn test_stop_finalizes_and_notifies() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("");
        for _ in 0..5 {
            engine.record_frame(DT);
        }
        engine.stop_recording();

        let rec = engine.current_recording();
        assert_eq!(engine.state(), ReplayState::Idle);
        assert_eq!(rec.total_frames, 5);
        assert_eq!(rec.total_duration, 2.0);
        assert!(rec.name.starts_with("Recording_"));
        assert_eq!(rec.thumbnail_path, format!("thumbnails/{}.png", rec.id));

        let notes = engine.drain_notifications();
        assert!(matches!(notes[0], ReplayNotification::RecordingStarted { .. }));
        assert!(matches!(notes.last(), Some(ReplayNotification::RecordingStopped(_))));
    }

    #[test]
    fn test_stop_rebases_after_eviction() {
        let mut config = ReplayConfig::default();
        config.set_max_buffer_duration(2.0);
        let mut engine = ReplayEngine::in_memory(config);
        engine.start_recording("evict");
        for _ in 0..10 {
            engine.record_frame(DT);
        }
        engine.stop_recording();
        let rec = engine.current_recording();
        assert_eq!(rec.frames[0].timestamp, 0.0);
        assert_eq!(rec.total_duration, 2.0);
    }

    #[test]
    fn test_live_clip_follows_rebase_after_eviction() {
        let mut config = ReplayConfig::default();
        config.set_max_buffer_duration(5.0);
        let mut engine = ReplayEngine::in_memory(config);
        engine.start_recording("live clip");
        for i in 0..10 {
            engine.record_vehicle_state(1, car(i as f32, 20.0));
            engine.record_frame(1.0);
        }
        engine.create_clip("live", 6.0, 8.0);
        engine.stop_recording();

        let rec = engine.current_recording();
        assert_eq!(rec.frames[0].timestamp, 0.0);
        assert_eq!(rec.total_duration, 5.0);

        let clip = &rec.clips[0];
        assert_eq!((clip.start_time, clip.end_time), (2.0, 4.0));
        assert_eq!((clip.start_frame, clip.end_frame), (2, 4));
        assert!(clip.end_time <= rec.total_duration);

        let start = seek::interpolate_vehicle_snapshot(rec, 1, clip.start_time);
        let end = seek::interpolate_vehicle_snapshot(rec, 1, clip.end_time);
        assert_eq!(start.transform.position.x, 6.0);
        assert_eq!(end.transform.position.x, 8.0);
    }

    #[test]
    fn test_pause_rules() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.pause_recording();
        assert_eq!(engine.state(), ReplayState::Idle);

        engine.start_recording("p");
        engine.record_frame(DT);
        engine.pause_recording();
        assert_eq!(engine.state(), ReplayState::Paused);
        assert!(!engine.record_frame(DT));
        engine.resume_recording();
        assert!(engine.record_frame(DT));
        assert_eq!(engine.recorded_frame_count(), 2);
    }

    #[test]
    fn test_record_event_stamped_at_newest_frame() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        assert!(engine.record_event_simple(EventType::RaceStart, None, "go").is_none());

        engine.start_recording("events");
        engine.record_vehicle_state(3, car(42.0, 0.0));
        engine.record_frame(DT);
        engine.record_vehicle_state(3, car(43.0, 0.0));
        engine.record_frame(DT);
        let event = engine
            .record_event_simple(EventType::LapComplete, Some(3), "Lap 1")
            .unwrap();
        assert_eq!(event.timestamp, DT);
        assert_eq!(event.frame_number, 1);
        assert_eq!(event.importance, 0.6);
        assert_eq!(event.location.x, 43.0);
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn test_seek_clamps_to_recording() {
        // 61 frames half a second apart: 30 s
        let mut engine = recorded(61);
        assert!(engine.start_playback());
        assert_eq!(engine.playback_state().total_duration, 30.0);

        engine.seek_to_time(-5.0);
        assert_eq!(engine.playback_state().current_time, 0.0);
        assert_eq!(engine.state(), ReplayState::Scrubbing);

        engine.seek_to_time(100.0);
        assert_eq!(engine.playback_state().current_time, 30.0);
        assert_eq!(engine.playback_state().current_frame, 60);
    }

    #[test]
    fn test_seek_without_session_is_noop() {
        let mut engine = recorded(4);
        engine.seek_to_time(1.0);
        assert_eq!(engine.state(), ReplayState::Idle);
        assert_eq!(engine.playback_state().current_time, 0.0);
    }

    #[test]
    fn test_playback_advances_and_stops_at_end() {
        let mut engine = recorded(5);
        engine.start_playback();
        engine.set_playback_speed(2.0);
        engine.tick(0.5);
        assert_eq!(engine.playback_state().current_time, 1.0);
        assert_eq!(engine.playback_state().current_frame, 2);

        engine.tick(1.0);
        assert_eq!(engine.state(), ReplayState::Idle);
        let notes = engine.drain_notifications();
        assert!(notes.contains(&ReplayNotification::PlaybackStopped));
    }

    #[test]
    fn test_looping_wraps_to_zero() {
        let mut engine = recorded(5);
        engine.set_looping(true);
        engine.start_playback();
        engine.tick(1.9);
        engine.tick(0.2);
        assert_eq!(engine.state(), ReplayState::Playing);
        assert_eq!(engine.playback_state().current_time, 0.0);
    }

    #[test]
    fn test_pause_resume_playback() {
        let mut engine = recorded(5);
        engine.start_playback();
        engine.toggle_pause();
        assert_eq!(engine.state(), ReplayState::Paused);
        engine.tick(1.0);
        assert_eq!(engine.playback_state().current_time, 0.0);
        // Playback pause is not a recording pause
        engine.resume_recording();
        assert_eq!(engine.state(), ReplayState::Paused);
        engine.toggle_pause();
        assert_eq!(engine.state(), ReplayState::Playing);
        engine.seek_to_time(1.0);
        engine.resume_playback();
        assert_eq!(engine.state(), ReplayState::Playing);
    }

    #[test]
    fn test_instant_replay_restores_recording() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("live");
        for _ in 0..21 {
            engine.record_frame(DT);
        }
        engine.set_playback_speed(1.5);
        assert!(engine.trigger_instant_replay(Some(4.0)));
        assert!(engine.in_instant_replay());
        assert_eq!(engine.state(), ReplayState::Playing);
        assert_eq!(engine.playback_state().current_time, 6.0);
        assert_eq!(engine.playback_state().speed, 0.5);

        // Capture is suspended during the replay
        assert!(!engine.record_frame(DT));

        engine.set_looping(true);
        engine.tick(10.0);
        assert!(!engine.in_instant_replay());
        assert_eq!(engine.state(), ReplayState::Recording);
        assert_eq!(engine.playback_state().speed, 1.5);
        assert!(engine.record_frame(DT));
        assert_eq!(engine.recorded_frame_count(), 22);
    }

    #[test]
    fn test_instant_replay_stopped_early_restores() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("live");
        for _ in 0..5 {
            engine.record_frame(DT);
        }
        engine.trigger_instant_replay(None);
        assert_eq!(engine.playback_state().current_time, 0.0);
        engine.stop_playback();
        assert_eq!(engine.state(), ReplayState::Recording);
    }

    #[test]
    fn test_instant_replay_needs_frames() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("empty");
        assert!(!engine.trigger_instant_replay(None));
        assert_eq!(engine.state(), ReplayState::Recording);
    }

    #[test]
    fn test_jump_between_events() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("jumps");
        for i in 0..11 {
            engine.record_frame(DT);
            if i == 2 || i == 6 {
                engine.record_event_simple(EventType::LapComplete, None, "lap");
            }
        }
        engine.stop_recording();
        engine.start_playback();

        engine.jump_to_next_event();
        assert_eq!(engine.playback_state().current_time, 1.0);
        engine.jump_to_next_event();
        assert_eq!(engine.playback_state().current_time, 3.0);
        engine.jump_to_next_event();
        assert_eq!(engine.playback_state().current_time, 3.0);
        engine.jump_to_previous_event();
        assert_eq!(engine.playback_state().current_time, 1.0);
    }

    #[test]
    fn test_clip_playback_stops_at_clip_end() {
        let mut engine = recorded(21);
        let clip = engine.create_clip("mid", 2.0, 4.0);
        assert_eq!(engine.clips().len(), 1);

        assert!(engine.play_clip(clip.id));
        assert_eq!(engine.state(), ReplayState::Playing);
        assert_eq!(engine.playback_state().current_time, 2.0);
        engine.tick(1.0);
        assert_eq!(engine.state(), ReplayState::Playing);
        engine.tick(1.5);
        assert_eq!(engine.state(), ReplayState::Idle);
    }

    #[test]
    fn test_clip_management() {
        let mut engine = recorded(10);
        let a = engine.create_clip("a", 0.0, 1.0);
        let b = engine.create_clip("b", 1.0, 2.0);
        assert!(engine.set_clip_favorite(b.id, true));
        assert_eq!(engine.favorite_clips().len(), 1);
        assert!(engine.delete_clip(a.id));
        assert!(!engine.delete_clip(a.id));
        assert_eq!(engine.clips().len(), 1);
        assert!(!engine.set_clip_favorite(Uuid::new_v4(), true));
    }

    #[test]
    fn test_clip_from_event_clamps() {
        let mut engine = recorded(9);
        let event = ReplayEvent::new(EventType::Overtake).at(3.5, 7);
        let clip = engine.create_clip_from_event(&event, 3.0, 3.0);
        assert_eq!((clip.start_time, clip.end_time), (0.5, 4.0));
        assert!(clip.name.starts_with("Overtake_"));
    }

    #[test]
    fn test_highlight_reel_from_events() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("reel");
        for i in 0..41 {
            engine.record_frame(DT);
            match i {
                0 => {
                    engine.record_event_simple(EventType::RaceStart, None, "start");
                }
                20 => {
                    engine.record_event_simple(EventType::Collision, Some(1), "bump");
                }
                40 => {
                    engine.record_event_simple(EventType::RaceFinish, None, "finish");
                }
                _ => {}
            }
        }
        engine.stop_recording();
        let clips = engine.generate_highlight_reel(12.0);
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].events[0].event_type, EventType::RaceStart);
        assert_eq!(clips[1].events[0].event_type, EventType::RaceFinish);
    }

    #[test]
    fn test_camera_controls() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("cam");
        for _ in 0..3 {
            engine.record_vehicle_state(2, car(0.0, 0.0));
            engine.record_vehicle_state(5, car(10.0, 0.0));
            engine.record_frame(DT);
        }
        engine.stop_recording();
        engine.start_playback();
        assert_eq!(engine.playback_state().focus_vehicle, 2);
        assert_eq!(engine.cycle_focus_vehicle(), 5);
        assert_eq!(engine.cycle_focus_vehicle(), 2);

        assert_eq!(engine.cycle_camera_mode(), CameraMode::Cinematic);
        assert!(!engine.start_cinematic_mode());
        engine.add_camera_keyframe(CameraKeyframe::new(0.0, Transform::default(), 60.0));
        engine.add_camera_keyframe(CameraKeyframe::new(1.0, Transform::default(), 80.0));
        engine.set_camera_mode(CameraMode::FollowCar);
        assert!(engine.start_cinematic_mode());
        engine.seek_to_time(0.5);
        assert!((engine.camera_view().fov - 70.0).abs() < 1e-4);

        let free = Transform::from_position(Vec3::new(7.0, 7.0, 7.0));
        engine.set_free_camera_transform(free);
        engine.set_camera_mode(CameraMode::FreeCam);
        assert_eq!(engine.camera_view().transform, free);
    }

    #[test]
    fn test_save_load_and_cap() {
        let mut engine = recorded(4);
        engine.config_mut().set_max_saved_recordings(2);
        assert!(engine.save_recording("one"));
        assert!(engine.save_recording("two"));
        assert!(engine.save_recording("three"));
        // Saves share recorded_at, so only the count is checked
        assert_eq!(engine.saved_recordings().len(), 2);

        assert!(!engine.save_recording("bad slot"));
        let notes = engine.drain_notifications();
        assert!(matches!(
            notes.last(),
            Some(ReplayNotification::PersistenceFailed { .. })
        ));

        let slot = engine.saved_recordings()[0].slot.clone();
        let info = engine.saved_recording_info(&slot).unwrap();
        assert!(info.frames.is_empty());
        assert_eq!(info.total_frames, 4);

        engine.discard_recording();
        assert_eq!(engine.recorded_frame_count(), 0);
        assert!(engine.load_recording(&slot));
        assert_eq!(engine.recorded_frame_count(), 4);
        assert!(!engine.load_recording("missing"));
        assert!(engine.delete_saved_recording(&slot));
        assert!(!engine.delete_saved_recording(&slot));
    }

    #[test]
    fn test_save_requires_frames() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        assert!(!engine.save_recording("empty"));
        assert!(engine.drain_notifications().is_empty());
    }

    #[test]
    fn test_export_lifecycle() {
        let mut engine = recorded(4);
        assert!(engine.export_replay(&ExportSettings::default()));
        assert_eq!(engine.state(), ReplayState::Exporting);
        // Not reachable while exporting
        assert!(!engine.start_playback());

        for _ in 0..60 {
            engine.tick(0.1);
        }
        assert_eq!(engine.state(), ReplayState::Idle);
        let notes = engine.drain_notifications();
        assert!(notes
            .iter()
            .any(|n| matches!(n, ReplayNotification::ExportProgress { .. })));
        assert!(notes.contains(&ReplayNotification::ExportComplete {
            output_path: "Export/replay_output.mp4".to_string()
        }));
    }

    #[test]
    fn test_export_with_nan_start_uses_full_range() {
        let mut engine = recorded(4);
        let settings = ExportSettings {
            start_time: Some(f32::NAN),
            ..ExportSettings::default()
        };
        assert!(engine.export_replay(&settings));
        assert_eq!(engine.state(), ReplayState::Exporting);
    }

    #[test]
    fn test_export_cancel_and_empty() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        assert!(!engine.export_replay(&ExportSettings::default()));
        assert_eq!(engine.state(), ReplayState::Idle);
        assert!(matches!(
            engine.drain_notifications().last(),
            Some(ReplayNotification::ExportFailed { .. })
        ));

        let mut engine = recorded(4);
        let clip = engine.create_clip("c", 0.0, 1.0);
        assert!(engine.export_clip(clip.id, &ExportSettings::default()));
        engine.cancel_export();
        assert_eq!(engine.state(), ReplayState::Idle);
        assert_eq!(
            engine.drain_notifications().last(),
            Some(&ReplayNotification::ExportFailed {
                reason: "Export cancelled by user".to_string()
            })
        );
    }

    #[test]
    fn test_auto_detection_runs_on_stop() {
        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("nitro");
        for i in 0..4 {
            let mut snap = car(i as f32 * 10.0, 20.0);
            snap.nitro_active = i >= 2;
            engine.record_vehicle_state(1, snap);
            engine.record_frame(DT);
        }
        engine.stop_recording();
        let nitro = engine.events_of_type(EventType::NitroActivated);
        assert_eq!(nitro.len(), 1);
        assert_eq!(nitro[0].timestamp, 1.0);
        assert!(engine
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, ReplayNotification::EventDetected(_))));
    }

    #[test]
    fn test_ingest_records_sample() {
        use crate::feed::ReportedEvent;

        let mut engine = ReplayEngine::in_memory(ReplayConfig::default());
        engine.start_recording("feed");
        let sample = TickSample {
            delta_time: DT,
            vehicles: vec![(1, car(0.0, 10.0)), (2, car(5.0, 10.0))],
            camera: Some((Transform::default(), 75.0)),
            events: vec![ReportedEvent::new(EventType::RaceStart, None, "Lights out")],
        };
        assert!(engine.ingest(sample));
        let frame = engine.frame(0);
        assert_eq!(frame.vehicles.len(), 2);
        assert_eq!(frame.camera_fov, 75.0);
        assert_eq!(engine.events()[0].description, "Lights out");
        assert_eq!(engine.frame(99), Frame::default());
    }
}
