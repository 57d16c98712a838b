//! Circular recording buffer
//!
//! Owns the recording under capture. Frames are appended in strictly
//! ascending timestamp order; when the buffer is circular the oldest frames
//! are evicted until both the duration cap and the byte budget hold again
//! (never below one frame), and events older than the oldest retained frame
//! are dropped with them.

use crate::config::ReplayConfig;
use crate::model::{estimated_frame_size, Frame, Recording, ReplayEvent};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct RecordingBuffer {
    recording: Recording,
    byte_size: u64,
    next_frame_number: u32,
}

impl RecordingBuffer {
    pub fn new(recording: Recording) -> Self {
        let byte_size = recording.frames.iter().map(|f| f.accounted_size).sum();
        let next_frame_number = recording
            .frames
            .back()
            .map(|f| f.frame_number + 1)
            .unwrap_or(0);
        Self {
            recording,
            byte_size,
            next_frame_number,
        }
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    pub fn recording_mut(&mut self) -> &mut Recording {
        &mut self.recording
    }

    pub fn into_recording(self) -> Recording {
        self.recording
    }

    /// Running total of accounted frame sizes
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Capture counter the next appended frame will receive
    pub fn next_frame_number(&self) -> u32 {
        self.next_frame_number
    }

    pub fn len(&self) -> usize {
        self.recording.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recording.frames.is_empty()
    }

    /// Timestamp of the newest frame, if any
    pub fn last_timestamp(&self) -> Option<f32> {
        self.recording.frames.back().map(|f| f.timestamp)
    }

    /// Append a frame, then trim when the buffer is circular.
    ///
    /// The buffer assigns the frame number, keyframe flag and accounted size.
    /// Frames that would break ascending timestamp order are dropped and
    /// `false` is returned.
    pub fn push(&mut self, mut frame: Frame, config: &ReplayConfig) -> bool {
        if !frame.timestamp.is_finite() {
            warn!("Dropping frame with non-finite timestamp");
            return false;
        }
        if let Some(last) = self.last_timestamp() {
            if frame.timestamp <= last {
                warn!(
                    "Dropping out-of-order frame at {:.3}s (newest is {:.3}s)",
                    frame.timestamp, last
                );
                return false;
            }
        }

        let interval = config.keyframe_interval.max(1);
        frame.frame_number = self.next_frame_number;
        frame.keyframe = self.next_frame_number % interval == 0;
        frame.accounted_size = estimated_frame_size(frame.vehicles.len());

        self.byte_size += frame.accounted_size;
        self.next_frame_number = self.next_frame_number.wrapping_add(1);
        self.recording.frames.push_back(frame);

        if config.circular_buffer {
            self.trim(config);
        }
        true
    }

    /// Evict oldest frames until the duration and byte caps hold, then prune
    /// events that precede the new oldest frame. Returns the eviction count.
    pub fn trim(&mut self, config: &ReplayConfig) -> usize {
        let mut evicted = 0;
        while self.recording.frames.len() > 1 {
            let over_duration = self.recording.span() > config.max_buffer_duration;
            let over_bytes = self.byte_size > config.max_buffer_bytes;
            if !over_duration && !over_bytes {
                break;
            }
            if let Some(oldest) = self.recording.frames.pop_front() {
                self.byte_size = self.byte_size.saturating_sub(oldest.accounted_size);
                evicted += 1;
            }
        }

        if let Some(oldest_time) = self.recording.frames.front().map(|f| f.timestamp) {
            let before = self.recording.events.len();
            self.recording.events.retain(|e| e.timestamp >= oldest_time);
            let pruned = before - self.recording.events.len();
            if evicted > 0 || pruned > 0 {
                debug!(
                    "Trimmed {} frames and {} events, buffer now {:.2}s / {} bytes",
                    evicted,
                    pruned,
                    self.recording.span(),
                    self.byte_size
                );
            }
        }
        evicted
    }

    /// Insert an event keeping the list ordered by timestamp
    pub fn push_event(&mut self, event: ReplayEvent) {
        let idx = self
            .recording
            .events
            .partition_point(|e| e.timestamp <= event.timestamp);
        self.recording.events.insert(idx, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, VehicleSnapshot};

    fn config_with_duration(max: f32) -> ReplayConfig {
        ReplayConfig {
            max_buffer_duration: max,
            ..ReplayConfig::default()
        }
    }

    fn frame_at(t: f32) -> Frame {
        Frame::new(0, t).with_vehicle(1, VehicleSnapshot::default())
    }

    #[test]
    fn test_duration_cap_keeps_last_six_frames() {
        let config = config_with_duration(5.0);
        let mut buffer = RecordingBuffer::default();
        for i in 0..10 {
            assert!(buffer.push(frame_at(i as f32), &config));
        }

        let timestamps: Vec<f32> = buffer.recording().frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_frame_numbers_survive_eviction() {
        let config = config_with_duration(2.0);
        let mut buffer = RecordingBuffer::default();
        for i in 0..6 {
            buffer.push(frame_at(i as f32), &config);
        }
        let numbers: Vec<u32> = buffer.recording().frames.iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![3, 4, 5]);
        assert_eq!(buffer.next_frame_number(), 6);
    }

    #[test]
    fn test_byte_cap_evicts_but_keeps_one_frame() {
        let one_frame = estimated_frame_size(1);
        let config = ReplayConfig {
            max_buffer_bytes: one_frame * 2,
            ..ReplayConfig::default()
        };
        let mut buffer = RecordingBuffer::default();
        for i in 0..5 {
            buffer.push(frame_at(i as f32), &config);
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.byte_size(), one_frame * 2);

        // A single frame over budget is still retained
        let tiny = ReplayConfig {
            max_buffer_bytes: 1,
            ..ReplayConfig::default()
        };
        let mut buffer = RecordingBuffer::default();
        buffer.push(frame_at(0.0), &tiny);
        buffer.push(frame_at(1.0), &tiny);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.recording().frames[0].timestamp, 1.0);
    }

    #[test]
    fn test_non_circular_buffer_never_evicts() {
        let config = ReplayConfig {
            max_buffer_duration: 1.0,
            circular_buffer: false,
            ..ReplayConfig::default()
        };
        let mut buffer = RecordingBuffer::default();
        for i in 0..10 {
            buffer.push(frame_at(i as f32), &config);
        }
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_out_of_order_frames_are_dropped() {
        let config = ReplayConfig::default();
        let mut buffer = RecordingBuffer::default();
        assert!(buffer.push(frame_at(1.0), &config));
        assert!(!buffer.push(frame_at(1.0), &config));
        assert!(!buffer.push(frame_at(0.5), &config));
        assert!(!buffer.push(frame_at(f32::NAN), &config));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_keyframe_interval() {
        let config = ReplayConfig {
            keyframe_interval: 3,
            ..ReplayConfig::default()
        };
        let mut buffer = RecordingBuffer::default();
        for i in 0..7 {
            buffer.push(frame_at(i as f32), &config);
        }
        let flags: Vec<bool> = buffer.recording().frames.iter().map(|f| f.keyframe).collect();
        assert_eq!(flags, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_trim_prunes_events_older_than_oldest_frame() {
        let config = config_with_duration(3.0);
        let mut buffer = RecordingBuffer::default();
        buffer.push(frame_at(0.0), &config);
        buffer.push_event(ReplayEvent::new(EventType::RaceStart).at(0.0, 0));
        buffer.push(frame_at(1.0), &config);
        buffer.push_event(ReplayEvent::new(EventType::Overtake).at(1.5, 1));
        for i in 2..6 {
            buffer.push(frame_at(i as f32), &config);
        }

        let oldest = buffer.recording().frames[0].timestamp;
        assert_eq!(oldest, 2.0);
        assert!(buffer.recording().events.is_empty());
    }

    #[test]
    fn test_push_event_keeps_order() {
        let mut buffer = RecordingBuffer::default();
        buffer.push_event(ReplayEvent::new(EventType::Overtake).at(2.0, 0));
        buffer.push_event(ReplayEvent::new(EventType::NearMiss).at(1.0, 0));
        buffer.push_event(ReplayEvent::new(EventType::BigAir).at(3.0, 0));
        let times: Vec<f32> = buffer.recording().events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_new_from_recording_restores_accounting() {
        let config = ReplayConfig::default();
        let mut buffer = RecordingBuffer::default();
        for i in 0..4 {
            buffer.push(frame_at(i as f32), &config);
        }
        let bytes = buffer.byte_size();
        let restored = RecordingBuffer::new(buffer.into_recording());
        assert_eq!(restored.byte_size(), bytes);
        assert_eq!(restored.next_frame_number(), 4);
    }
}
