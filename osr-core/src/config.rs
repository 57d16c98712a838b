//! Replay subsystem configuration
//!
//! Set once when the engine is built and adjustable through clamping
//! setters. Changes never rewrite frames that were already captured.

use serde::{Deserialize, Serialize};

pub const MIN_BUFFER_DURATION: f32 = 1.0;
pub const MAX_BUFFER_DURATION: f32 = 3600.0;
pub const MIN_FRAME_RATE: f32 = 15.0;
pub const MAX_FRAME_RATE: f32 = 120.0;
pub const MIN_BUFFER_BYTES: u64 = 64 * 1024;
pub const MIN_PLAYBACK_SPEED: f32 = 0.1;
pub const MAX_PLAYBACK_SPEED: f32 = 8.0;

/// Clamp a requested playback speed into the supported range
pub fn clamp_playback_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
}

/// Thresholds used by the post-capture event detection pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// Slip angle (degrees) at which a vehicle counts as drifting
    pub drift_angle: f32,

    /// Minimum airtime (seconds) for a jump to count as big air
    pub min_airtime: f32,

    /// Distance (meters) under which two vehicles count as a near miss
    pub near_miss_distance: f32,

    /// Both vehicles must exceed this speed (m/s) for a near miss
    pub near_miss_min_speed: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            drift_angle: 15.0,
            min_airtime: 0.5,
            near_miss_distance: 2.0,
            near_miss_min_speed: 13.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Longest span (seconds) the circular buffer retains
    pub max_buffer_duration: f32,

    /// Approximate byte budget for retained frames
    pub max_buffer_bytes: u64,

    pub target_frame_rate: f32,

    /// Every Nth captured frame is flagged as a keyframe
    pub keyframe_interval: u32,

    /// Evict the oldest frames once a cap is exceeded
    pub circular_buffer: bool,

    /// Run event detection when capture stops
    pub auto_detect_events: bool,

    /// Default trailing window (seconds) for instant replay
    pub instant_replay_duration: f32,

    /// Playback speed forced during instant replay
    pub instant_replay_speed: f32,

    /// Events ranked below this are dropped by detection and highlight selection
    pub min_event_importance: f32,

    pub max_saved_recordings: usize,

    pub thresholds: DetectionThresholds,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_buffer_duration: 300.0,
            max_buffer_bytes: 512 * 1024 * 1024,
            target_frame_rate: 60.0,
            keyframe_interval: 30,
            circular_buffer: true,
            auto_detect_events: true,
            instant_replay_duration: 15.0,
            instant_replay_speed: 0.5,
            min_event_importance: 0.3,
            max_saved_recordings: 50,
            thresholds: DetectionThresholds::default(),
        }
    }
}

impl ReplayConfig {
    pub fn set_max_buffer_duration(&mut self, seconds: f32) {
        self.max_buffer_duration = if seconds.is_nan() {
            MIN_BUFFER_DURATION
        } else {
            seconds.clamp(MIN_BUFFER_DURATION, MAX_BUFFER_DURATION)
        };
    }

    pub fn set_max_buffer_bytes(&mut self, bytes: u64) {
        self.max_buffer_bytes = bytes.max(MIN_BUFFER_BYTES);
    }

    pub fn set_target_frame_rate(&mut self, fps: f32) {
        self.target_frame_rate = if fps.is_nan() {
            MIN_FRAME_RATE
        } else {
            fps.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
        };
    }

    pub fn set_keyframe_interval(&mut self, interval: u32) {
        self.keyframe_interval = interval.max(1);
    }

    pub fn set_max_saved_recordings(&mut self, count: usize) {
        self.max_saved_recordings = count.max(1);
    }

    pub fn set_min_event_importance(&mut self, importance: f32) {
        self.min_event_importance = if importance.is_nan() {
            0.0
        } else {
            importance.clamp(0.0, 1.0)
        };
    }

    pub fn set_instant_replay_duration(&mut self, seconds: f32) {
        self.instant_replay_duration = if seconds.is_nan() {
            MIN_BUFFER_DURATION
        } else {
            seconds.clamp(MIN_BUFFER_DURATION, MAX_BUFFER_DURATION)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.max_buffer_duration, 300.0);
        assert_eq!(config.max_buffer_bytes, 512 * 1024 * 1024);
        assert_eq!(config.keyframe_interval, 30);
        assert!(config.circular_buffer);
        assert_eq!(config.max_saved_recordings, 50);
    }

    #[test]
    fn test_setters_clamp() {
        let mut config = ReplayConfig::default();

        config.set_max_buffer_duration(-5.0);
        assert_eq!(config.max_buffer_duration, MIN_BUFFER_DURATION);
        config.set_max_buffer_duration(1.0e9);
        assert_eq!(config.max_buffer_duration, MAX_BUFFER_DURATION);

        config.set_target_frame_rate(500.0);
        assert_eq!(config.target_frame_rate, MAX_FRAME_RATE);
        config.set_target_frame_rate(1.0);
        assert_eq!(config.target_frame_rate, MIN_FRAME_RATE);

        config.set_keyframe_interval(0);
        assert_eq!(config.keyframe_interval, 1);

        config.set_max_buffer_bytes(10);
        assert_eq!(config.max_buffer_bytes, MIN_BUFFER_BYTES);

        config.set_max_saved_recordings(0);
        assert_eq!(config.max_saved_recordings, 1);
    }

    #[test]
    fn test_playback_speed_clamp() {
        assert_eq!(clamp_playback_speed(0.0), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_playback_speed(100.0), MAX_PLAYBACK_SPEED);
        assert_eq!(clamp_playback_speed(2.0), 2.0);
        assert_eq!(clamp_playback_speed(f32::NAN), 1.0);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: ReplayConfig =
            serde_json::from_str(r#"{"max_buffer_duration": 60.0}"#).unwrap();
        assert_eq!(config.max_buffer_duration, 60.0);
        assert_eq!(config.target_frame_rate, 60.0);
        assert_eq!(config.thresholds.min_airtime, 0.5);
    }
}
