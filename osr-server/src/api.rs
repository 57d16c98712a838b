//! REST API and SSE routes

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use osr_core::clip::HIGHLIGHT_PADDING;
use osr_core::config::clamp_playback_speed;
use osr_core::store::{validate_slot, SlotInfo};
use osr_core::{
    CameraKeyframe, CameraMode, CameraView, Clip, EventType, ExportSettings, Frame,
    PlaybackState, RecordingSummary, ReplayConfig, ReplayEngine, ReplayEvent, ReplayState,
    Transform, VehicleId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

type ApiError = (StatusCode, String);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/adapters", get(list_feeds))
        .route("/api/notifications/stream", get(notification_stream))
        .route("/api/status", get(status))
        .route("/api/config", get(get_config).put(update_config))
        // Recording
        .route("/api/recording", get(recording_summary))
        .route("/api/recording/:action", post(recording_action))
        // Playback
        .route("/api/playback", get(playback_state))
        .route("/api/playback/control", post(playback_control))
        .route("/api/frame", get(frame_at_time))
        // Events and clips
        .route("/api/events", get(list_events))
        .route("/api/events/nearest", get(nearest_event))
        .route("/api/clips", get(list_clips).post(create_clip))
        .route("/api/clips/:id", axum::routing::delete(delete_clip))
        .route("/api/clips/:id/favorite", post(favorite_clip))
        .route("/api/clips/:id/play", post(play_clip))
        .route("/api/highlights", post(highlight_reel))
        // Camera
        .route("/api/camera", get(camera_view).put(camera_update))
        .route(
            "/api/camera/keyframes",
            get(list_keyframes).post(add_keyframe).delete(clear_keyframes),
        )
        // Saved recordings
        .route("/api/saves", get(list_saves))
        .route("/api/saves/:slot", get(save_info).post(save_slot).delete(delete_save))
        .route("/api/saves/:slot/load", post(load_slot))
        // Export
        .route("/api/export", post(export_replay).delete(cancel_export))
        .route("/api/export/clip/:id", post(export_clip))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn conflict(state: ReplayState, what: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        format!("Cannot {} while {:?}", what, state),
    )
}

// === Feed Endpoints ===

#[derive(Serialize)]
struct FeedInfo {
    name: String,
    detected: bool,
    active: bool,
}

async fn list_feeds(State(state): State<AppState>) -> Json<Vec<FeedInfo>> {
    let feeds = state.feeds.read().await;
    let active_name = state.active_feed.read().await;

    let info: Vec<FeedInfo> = feeds
        .iter()
        .map(|feed| FeedInfo {
            name: feed.name().to_string(),
            detected: feed.detect(),
            active: feed.is_active()
                || active_name
                    .as_ref()
                    .map(|n| n == feed.name())
                    .unwrap_or(false),
        })
        .collect();

    Json(info)
}

// === Notification Stream Endpoint ===

#[derive(Deserialize)]
struct StreamQuery {
    /// Comma-separated notification types, e.g. `event_detected,clip_created`
    types: Option<String>,
}

async fn notification_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let wanted: Option<HashSet<String>> = query.types.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let wanted = wanted.clone();
        async move {
            match result {
                Ok(notification) => {
                    let value = match serde_json::to_value(&notification) {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::error!("Failed to serialize notification: {}", e);
                            return None;
                        }
                    };
                    let kind = value["type"].as_str().unwrap_or_default().to_string();
                    if wanted.as_ref().is_some_and(|w| !w.contains(&kind)) {
                        return None;
                    }
                    Some(Ok(Event::default().event(kind).data(value.to_string())))
                }
                Err(e) => {
                    tracing::warn!("Broadcast stream error: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// === Status and Config Endpoints ===

#[derive(Serialize)]
struct StatusResponse {
    state: ReplayState,
    recording: bool,
    instant_replay: bool,
    recording_duration: f32,
    recorded_frames: usize,
    active_feed: Option<String>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let active_feed = state.active_feed.read().await.clone();
    let engine = state.engine.read().await;
    Json(StatusResponse {
        state: engine.state(),
        recording: engine.is_recording(),
        instant_replay: engine.in_instant_replay(),
        recording_duration: engine.recording_duration(),
        recorded_frames: engine.recorded_frame_count(),
        active_feed,
    })
}

async fn get_config(State(state): State<AppState>) -> Json<ReplayConfig> {
    Json(state.engine.read().await.config().clone())
}

/// Partial update; every value goes through the clamping setters
#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigUpdate {
    max_buffer_duration: Option<f32>,
    max_buffer_bytes: Option<u64>,
    target_frame_rate: Option<f32>,
    keyframe_interval: Option<u32>,
    circular_buffer: Option<bool>,
    auto_detect_events: Option<bool>,
    instant_replay_duration: Option<f32>,
    instant_replay_speed: Option<f32>,
    min_event_importance: Option<f32>,
    max_saved_recordings: Option<usize>,
}

async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Json<ReplayConfig> {
    let mut engine = state.engine.write().await;
    let config = engine.config_mut();
    if let Some(v) = update.max_buffer_duration {
        config.set_max_buffer_duration(v);
    }
    if let Some(v) = update.max_buffer_bytes {
        config.set_max_buffer_bytes(v);
    }
    if let Some(v) = update.target_frame_rate {
        config.set_target_frame_rate(v);
    }
    if let Some(v) = update.keyframe_interval {
        config.set_keyframe_interval(v);
    }
    if let Some(v) = update.circular_buffer {
        config.circular_buffer = v;
    }
    if let Some(v) = update.auto_detect_events {
        config.auto_detect_events = v;
    }
    if let Some(v) = update.instant_replay_duration {
        config.set_instant_replay_duration(v);
    }
    if let Some(v) = update.instant_replay_speed {
        config.instant_replay_speed = clamp_playback_speed(v);
    }
    if let Some(v) = update.min_event_importance {
        config.set_min_event_importance(v);
    }
    if let Some(v) = update.max_saved_recordings {
        config.set_max_saved_recordings(v);
    }
    Json(config.clone())
}

// === Recording Endpoints ===

async fn recording_summary(State(state): State<AppState>) -> Json<RecordingSummary> {
    Json(state.engine.read().await.current_recording().summary())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RecordingRequest {
    name: String,
}

async fn recording_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    body: Option<Json<RecordingRequest>>,
) -> Result<Json<StatusResponse>, ApiError> {
    {
        let mut engine = state.engine.write().await;
        let before = engine.state();
        let accepted = match action.as_str() {
            "start" => {
                let name = body.map(|Json(b)| b.name).unwrap_or_default();
                engine.start_recording(&name);
                before == ReplayState::Idle && engine.state() == ReplayState::Recording
            }
            "stop" => {
                engine.stop_recording();
                before != engine.state() && engine.state() == ReplayState::Idle
            }
            "pause" => {
                engine.pause_recording();
                engine.state() == ReplayState::Paused && before == ReplayState::Recording
            }
            "resume" => {
                engine.resume_recording();
                engine.state() == ReplayState::Recording && before == ReplayState::Paused
            }
            "discard" => {
                engine.discard_recording();
                engine.state() == ReplayState::Idle
            }
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("Unknown action: {}", action),
                ))
            }
        };
        if !accepted {
            return Err(conflict(before, &format!("{} recording", action)));
        }
    }

    state.flush_notifications().await;
    Ok(status(State(state)).await)
}

// === Playback Endpoints ===

async fn playback_state(State(state): State<AppState>) -> Json<PlaybackState> {
    Json(state.engine.read().await.playback_state().clone())
}

#[derive(Deserialize)]
struct PlaybackControlRequest {
    action: String,
    value: Option<f64>,
    event_id: Option<Uuid>,
}

async fn playback_control(
    State(state): State<AppState>,
    Json(request): Json<PlaybackControlRequest>,
) -> Result<Json<PlaybackState>, ApiError> {
    let mut engine = state.engine.write().await;
    let before = engine.state();
    let value = |name: &str| {
        request
            .value
            .map(|v| v as f32)
            .ok_or((StatusCode::BAD_REQUEST, format!("Missing 'value' for {}", name)))
    };

    match request.action.as_str() {
        "play" => {
            if !engine.start_playback() {
                return Err(conflict(before, "start playback"));
            }
        }
        "stop" => engine.stop_playback(),
        "pause" => engine.pause_playback(),
        "resume" => engine.resume_playback(),
        "toggle" => engine.toggle_pause(),
        "seek" => engine.seek_to_time(value("seek")?),
        "seek_frame" => engine.seek_to_frame(value("seek_frame")?.max(0.0) as usize),
        "seek_event" => {
            let id = request
                .event_id
                .ok_or((StatusCode::BAD_REQUEST, "Missing 'event_id' for seek_event".to_string()))?;
            engine.seek_to_event(id);
        }
        "skip" => {
            let seconds = value("skip")?;
            if seconds >= 0.0 {
                engine.skip_forward(seconds);
            } else {
                engine.skip_backward(-seconds);
            }
        }
        "speed" => engine.set_playback_speed(value("speed")?),
        "loop" => engine.set_looping(value("loop")? != 0.0),
        "next_event" => engine.jump_to_next_event(),
        "previous_event" => engine.jump_to_previous_event(),
        "instant_replay" => {
            if !engine.trigger_instant_replay(request.value.map(|v| v as f32)) {
                return Err(conflict(before, "start an instant replay"));
            }
        }
        "cinematic" => {
            if !engine.start_cinematic_mode() {
                return Err((
                    StatusCode::CONFLICT,
                    "Cinematic mode needs at least two keyframes".to_string(),
                ));
            }
        }
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown action: {}", request.action),
            ))
        }
    }

    let playback = engine.playback_state().clone();
    drop(engine);
    state.flush_notifications().await;
    Ok(Json(playback))
}

#[derive(Deserialize)]
struct FrameQuery {
    time: f32,
}

async fn frame_at_time(State(state): State<AppState>, Query(query): Query<FrameQuery>) -> Json<Frame> {
    Json(state.engine.read().await.frame_at_time(query.time))
}

// === Event Endpoints ===

#[derive(Deserialize)]
struct EventsQuery {
    #[serde(rename = "type")]
    event_type: Option<EventType>,
    start: Option<f32>,
    end: Option<f32>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<ReplayEvent>> {
    let engine = state.engine.read().await;
    let events = match (query.start, query.end) {
        (None, None) => engine.events().to_vec(),
        (start, end) => engine.events_in_range(start.unwrap_or(f32::MIN), end.unwrap_or(f32::MAX)),
    };
    let events = match query.event_type {
        Some(kind) => events.into_iter().filter(|e| e.event_type == kind).collect(),
        None => events,
    };
    Json(events)
}

async fn nearest_event(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
) -> Result<Json<ReplayEvent>, ApiError> {
    state
        .engine
        .read()
        .await
        .nearest_event(query.time)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "No events recorded".to_string()))
}

// === Clip Endpoints ===

async fn list_clips(State(state): State<AppState>) -> Json<Vec<Clip>> {
    Json(state.engine.read().await.clips().to_vec())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CreateClipRequest {
    name: String,
    start_time: Option<f32>,
    end_time: Option<f32>,
    event_id: Option<Uuid>,
    before: Option<f32>,
    after: Option<f32>,
}

async fn create_clip(
    State(state): State<AppState>,
    Json(request): Json<CreateClipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let clip = {
        let mut engine = state.engine.write().await;
        if let Some(event_id) = request.event_id {
            let event = engine
                .events()
                .iter()
                .find(|e| e.id == event_id)
                .cloned()
                .ok_or((StatusCode::NOT_FOUND, format!("Unknown event {}", event_id)))?;
            engine.create_clip_from_event(
                &event,
                request.before.unwrap_or(HIGHLIGHT_PADDING),
                request.after.unwrap_or(HIGHLIGHT_PADDING),
            )
        } else {
            let (Some(start), Some(end)) = (request.start_time, request.end_time) else {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Provide 'event_id' or both 'start_time' and 'end_time'".to_string(),
                ));
            };
            engine.create_clip(&request.name, start, end)
        }
    };

    state.flush_notifications().await;
    Ok((StatusCode::CREATED, Json(clip)))
}

async fn delete_clip(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.engine.write().await.delete_clip(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct FavoriteRequest {
    favorite: bool,
}

async fn favorite_clip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FavoriteRequest>,
) -> StatusCode {
    if state.engine.write().await.set_clip_favorite(id, request.favorite) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn play_clip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaybackState>, ApiError> {
    let playback = {
        let mut engine = state.engine.write().await;
        if !engine.clips().iter().any(|c| c.id == id) {
            return Err((StatusCode::NOT_FOUND, format!("Unknown clip {}", id)));
        }
        let before = engine.state();
        if !engine.play_clip(id) {
            return Err(conflict(before, "play clip"));
        }
        engine.playback_state().clone()
    };
    state.flush_notifications().await;
    Ok(Json(playback))
}

#[derive(Deserialize)]
struct HighlightRequest {
    #[serde(default = "default_reel_duration")]
    max_duration: f32,
}

fn default_reel_duration() -> f32 {
    60.0
}

async fn highlight_reel(
    State(state): State<AppState>,
    Json(request): Json<HighlightRequest>,
) -> Json<Vec<Clip>> {
    let clips = state
        .engine
        .write()
        .await
        .generate_highlight_reel(request.max_duration);
    state.flush_notifications().await;
    Json(clips)
}

// === Camera Endpoints ===

async fn camera_view(State(state): State<AppState>) -> Json<CameraView> {
    Json(state.engine.read().await.camera_view())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CameraUpdate {
    mode: Option<CameraMode>,
    focus_vehicle: Option<VehicleId>,
    cycle_mode: bool,
    cycle_focus: bool,
    free_transform: Option<Transform>,
}

async fn camera_update(
    State(state): State<AppState>,
    Json(update): Json<CameraUpdate>,
) -> Json<PlaybackState> {
    let mut engine = state.engine.write().await;
    if let Some(mode) = update.mode {
        engine.set_camera_mode(mode);
    }
    if let Some(vehicle) = update.focus_vehicle {
        engine.set_focus_vehicle(vehicle);
    }
    if update.cycle_mode {
        engine.cycle_camera_mode();
    }
    if update.cycle_focus {
        engine.cycle_focus_vehicle();
    }
    if let Some(transform) = update.free_transform {
        engine.set_free_camera_transform(transform);
    }
    Json(engine.playback_state().clone())
}

async fn list_keyframes(State(state): State<AppState>) -> Json<Vec<CameraKeyframe>> {
    Json(state.engine.read().await.camera_keyframes().to_vec())
}

#[derive(Deserialize)]
struct KeyframeRequest {
    time: f32,
    #[serde(default)]
    transform: Option<Transform>,
    #[serde(default)]
    fov: Option<f32>,
}

async fn add_keyframe(
    State(state): State<AppState>,
    Json(request): Json<KeyframeRequest>,
) -> (StatusCode, Json<Vec<CameraKeyframe>>) {
    let mut engine = state.engine.write().await;
    engine.add_camera_keyframe(CameraKeyframe::new(
        request.time,
        request.transform.unwrap_or_default(),
        request.fov.unwrap_or(90.0),
    ));
    (StatusCode::CREATED, Json(engine.camera_keyframes().to_vec()))
}

async fn clear_keyframes(State(state): State<AppState>) -> StatusCode {
    state.engine.write().await.clear_camera_keyframes();
    StatusCode::NO_CONTENT
}

// === Saved Recording Endpoints ===

async fn list_saves(State(state): State<AppState>) -> Json<Vec<SlotInfo>> {
    Json(state.engine.read().await.saved_recordings())
}

fn check_slot(slot: &str) -> Result<(), ApiError> {
    validate_slot(slot).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

/// Run an engine call that touches the recording store on the blocking pool.
/// The engine stays write-locked for the duration of the call.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut ReplayEngine) -> T + Send + 'static,
    T: Send + 'static,
{
    let mut engine = state.engine.clone().write_owned().await;
    tokio::task::spawn_blocking(move || f(&mut *engine))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Store task failed: {}", e)))
}

async fn save_info(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<Json<RecordingSummary>, ApiError> {
    check_slot(&slot)?;
    state
        .engine
        .read()
        .await
        .saved_recording_info(&slot)
        .map(|r| Json(r.summary()))
        .ok_or((StatusCode::NOT_FOUND, format!("No saved recording in slot '{}'", slot)))
}

async fn save_slot(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_slot(&slot)?;
    let saved = {
        let slot = slot.clone();
        with_store(&state, move |engine| engine.save_recording(&slot)).await?
    };
    state.flush_notifications().await;
    if saved {
        Ok((StatusCode::CREATED, Json(serde_json::json!({"status": "saved", "slot": slot}))))
    } else {
        Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Could not save to slot '{}'", slot),
        ))
    }
}

async fn delete_save(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<StatusCode, ApiError> {
    check_slot(&slot)?;
    let deleted = {
        let slot = slot.clone();
        with_store(&state, move |engine| engine.delete_saved_recording(&slot)).await?
    };
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("No saved recording in slot '{}'", slot)))
    }
}

async fn load_slot(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<Json<RecordingSummary>, ApiError> {
    check_slot(&slot)?;
    let summary = {
        let slot = slot.clone();
        with_store(&state, move |engine| {
            let before = engine.state();
            if before != ReplayState::Idle {
                return Err(conflict(before, "load a recording"));
            }
            Ok(engine
                .load_recording(&slot)
                .then(|| engine.current_recording().summary()))
        })
        .await??
    };
    state.flush_notifications().await;
    summary
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("Could not load slot '{}'", slot)))
}

// === Export Endpoints ===

async fn export_replay(
    State(state): State<AppState>,
    Json(settings): Json<ExportSettings>,
) -> Result<impl IntoResponse, ApiError> {
    let started = {
        let mut engine = state.engine.write().await;
        let before = engine.state();
        if before != ReplayState::Idle {
            return Err(conflict(before, "export"));
        }
        engine.export_replay(&settings)
    };
    state.flush_notifications().await;
    if started {
        Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "exporting", "output": settings.output_file()})),
        ))
    } else {
        Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Export rejected; see the export_failed notification".to_string(),
        ))
    }
}

async fn export_clip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ExportSettings>>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = body.map(|Json(s)| s).unwrap_or_default();
    let started = {
        let mut engine = state.engine.write().await;
        if !engine.clips().iter().any(|c| c.id == id) {
            return Err((StatusCode::NOT_FOUND, format!("Unknown clip {}", id)));
        }
        let before = engine.state();
        if before != ReplayState::Idle {
            return Err(conflict(before, "export"));
        }
        engine.export_clip(id, &settings)
    };
    state.flush_notifications().await;
    if started {
        Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"status": "exporting"}))))
    } else {
        Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Export rejected; see the export_failed notification".to_string(),
        ))
    }
}

async fn cancel_export(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    {
        let mut engine = state.engine.write().await;
        let before = engine.state();
        if before != ReplayState::Exporting {
            return Err(conflict(before, "cancel export"));
        }
        engine.cancel_export();
    }
    state.flush_notifications().await;
    Ok(StatusCode::NO_CONTENT)
}
