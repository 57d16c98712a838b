//! Clip extraction and event queries
//!
//! Clips are time-range views into a recording: they carry resolved frame
//! indices and the contained events but never copy frame data.

use crate::model::{CameraMode, Clip, EventType, Recording, ReplayEvent, VehicleId};
use crate::seek::{find_frame_index_at_time, floor_frame_index};
use chrono::Utc;
use uuid::Uuid;

/// Length of a highlight-reel clip (seconds)
pub const HIGHLIGHT_CLIP_LENGTH: f32 = 6.0;

/// Padding either side of a highlight event (seconds)
pub const HIGHLIGHT_PADDING: f32 = 3.0;

/// Build a clip over `[start_time, end_time]` of `recording`.
///
/// A reversed range is swapped. The start frame is the last frame at or
/// before the start and the end frame the first at or after the end, so the
/// frame range always covers the requested span.
pub fn build_clip(
    recording: &Recording,
    name: impl Into<String>,
    start_time: f32,
    end_time: f32,
    camera_mode: CameraMode,
    focus_vehicle: VehicleId,
) -> Clip {
    let (start_time, end_time) = if end_time < start_time {
        (end_time, start_time)
    } else {
        (start_time, end_time)
    };

    Clip {
        id: Uuid::new_v4(),
        name: name.into(),
        start_time,
        end_time,
        start_frame: floor_frame_index(recording, start_time),
        end_frame: find_frame_index_at_time(recording, end_time),
        camera_mode,
        focus_vehicle,
        events: events_in_range(recording, start_time, end_time),
        favorite: false,
        created_at: Utc::now(),
    }
}

/// Padded window around an event, clamped to `[0, total_duration]`
pub fn event_window(event: &ReplayEvent, before: f32, after: f32, total_duration: f32) -> (f32, f32) {
    let start = (event.timestamp - before.max(0.0)).max(0.0);
    let end = (event.timestamp + after.max(0.0)).min(total_duration.max(0.0));
    (start.min(end), end)
}

/// Clip name for an event, e.g. `Big Air_142501`
pub fn event_clip_name(event_type: EventType) -> String {
    format!("{}_{}", event_type.display_name(), Utc::now().format("%H%M%S"))
}

/// Events with timestamps in `[start, end]`
pub fn events_in_range(recording: &Recording, start: f32, end: f32) -> Vec<ReplayEvent> {
    recording
        .events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp <= end)
        .cloned()
        .collect()
}

pub fn events_of_type(recording: &Recording, event_type: EventType) -> Vec<ReplayEvent> {
    recording
        .events
        .iter()
        .filter(|e| e.event_type == event_type)
        .cloned()
        .collect()
}

/// Event closest in time to `time`; the earlier one wins a tie
pub fn nearest_event(recording: &Recording, time: f32) -> Option<&ReplayEvent> {
    recording.events.iter().fold(None, |best: Option<&ReplayEvent>, e| match best {
        Some(b) if (b.timestamp - time).abs() <= (e.timestamp - time).abs() => Some(b),
        _ => Some(e),
    })
}

/// Events chosen for a highlight reel, most important first.
///
/// Events below `min_importance` are skipped and selection stops once
/// another fixed-length clip would exceed `max_duration`.
pub fn highlight_events(recording: &Recording, min_importance: f32, max_duration: f32) -> Vec<ReplayEvent> {
    let mut ranked: Vec<&ReplayEvent> = recording
        .events
        .iter()
        .filter(|e| e.importance >= min_importance)
        .collect();
    // Stable sort keeps time order among equally important events
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let mut total = 0.0;
    let mut picked = Vec::new();
    for event in ranked {
        if total + HIGHLIGHT_CLIP_LENGTH > max_duration {
            break;
        }
        total += HIGHLIGHT_CLIP_LENGTH;
        picked.push(event.clone());
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frame;

    fn recording() -> Recording {
        let mut rec = Recording::new("clips");
        for i in 0..=10 {
            rec.frames.push_back(Frame::new(i, i as f32));
        }
        rec.total_duration = 10.0;
        rec.events = vec![
            ReplayEvent::new(EventType::RaceStart).at(0.0, 0),
            ReplayEvent::new(EventType::DriftStart).at(2.5, 2),
            ReplayEvent::new(EventType::Overtake).at(4.0, 4),
            ReplayEvent::new(EventType::NearMiss).at(6.0, 6),
            ReplayEvent::new(EventType::RaceFinish).at(10.0, 10),
        ];
        rec
    }

    #[test]
    fn test_clip_contains_events_in_closed_range() {
        let rec = recording();
        let clip = build_clip(&rec, "mid", 2.5, 6.0, CameraMode::Orbit, 3);
        let types: Vec<EventType> = clip.events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::DriftStart, EventType::Overtake, EventType::NearMiss]);
        assert_eq!(clip.camera_mode, CameraMode::Orbit);
        assert_eq!(clip.focus_vehicle, 3);
    }

    #[test]
    fn test_clip_frames_bracket_range() {
        let rec = recording();
        let clip = build_clip(&rec, "frac", 2.4, 5.6, CameraMode::FollowCar, 0);
        assert_eq!(clip.start_frame, 2);
        assert_eq!(clip.end_frame, 6);
        assert!(rec.frames[clip.start_frame].timestamp <= clip.start_time);
        assert!(rec.frames[clip.end_frame].timestamp >= clip.end_time);
    }

    #[test]
    fn test_reversed_range_is_swapped() {
        let clip = build_clip(&recording(), "rev", 5.0, 1.0, CameraMode::FollowCar, 0);
        assert_eq!((clip.start_time, clip.end_time), (1.0, 5.0));
    }

    #[test]
    fn test_event_window_clamps() {
        let rec = recording();
        assert_eq!(event_window(&rec.events[0], 3.0, 3.0, 10.0), (0.0, 3.0));
        assert_eq!(event_window(&rec.events[4], 3.0, 3.0, 10.0), (7.0, 10.0));
        assert_eq!(event_window(&rec.events[2], 1.0, 2.0, 10.0), (3.0, 6.0));
    }

    #[test]
    fn test_nearest_event() {
        let rec = recording();
        assert_eq!(nearest_event(&rec, 5.2).map(|e| e.event_type), Some(EventType::NearMiss));
        assert_eq!(nearest_event(&rec, 5.0).map(|e| e.event_type), Some(EventType::Overtake));
        assert!(nearest_event(&Recording::new("none"), 1.0).is_none());
    }

    #[test]
    fn test_events_of_type() {
        let rec = recording();
        assert_eq!(events_of_type(&rec, EventType::Overtake).len(), 1);
        assert!(events_of_type(&rec, EventType::Wreck).is_empty());
    }

    #[test]
    fn test_highlights_ranked_and_capped() {
        let rec = recording();
        let picked = highlight_events(&rec, 0.45, 18.0);
        let types: Vec<EventType> = picked.iter().map(|e| e.event_type).collect();
        // DriftStart (0.4) is skipped; three 6 s clips fit in 18 s
        assert_eq!(types, vec![EventType::RaceStart, EventType::RaceFinish, EventType::Overtake]);
    }

    #[test]
    fn test_event_clip_name_uses_display_name() {
        assert!(event_clip_name(EventType::BigAir).starts_with("Big Air_"));
    }
}
