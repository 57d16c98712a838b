//! Export boundary
//!
//! The engine never encodes pixels. It resolves the time range to export,
//! hands it to an [`ExportEncoder`] and polls the job on its tick.

use crate::error::ExportError;
use crate::model::Recording;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Video,
    Gif,
    ImageSequence,
    ReplayFile,
    Thumbnail,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Video => "mp4",
            ExportFormat::Gif => "gif",
            ExportFormat::ImageSequence => "png",
            ExportFormat::ReplayFile => "osr",
            ExportFormat::Thumbnail => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,

    /// Target bitrate in kbit/s
    pub bitrate: u32,

    pub include_ui: bool,
    pub include_audio: bool,
    pub playback_speed: f32,

    /// Range to export; `None` means from the start / to the end
    pub start_time: Option<f32>,
    pub end_time: Option<f32>,

    pub output_path: String,
    pub file_name: String,
    pub add_watermark: bool,
    pub watermark_text: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Video,
            quality: ExportQuality::High,
            width: 1920,
            height: 1080,
            frame_rate: 60.0,
            bitrate: 20_000,
            include_ui: false,
            include_audio: true,
            playback_speed: 1.0,
            start_time: None,
            end_time: None,
            output_path: "Export".to_string(),
            file_name: "replay_output".to_string(),
            add_watermark: false,
            watermark_text: String::new(),
        }
    }
}

impl ExportSettings {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExportError::InvalidSettings(format!(
                "resolution {}x{} is empty",
                self.width, self.height
            )));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(ExportError::InvalidSettings(format!(
                "frame rate {} must be positive",
                self.frame_rate
            )));
        }
        if !(self.playback_speed.is_finite() && self.playback_speed > 0.0) {
            return Err(ExportError::InvalidSettings(format!(
                "playback speed {} must be positive",
                self.playback_speed
            )));
        }
        if self.file_name.is_empty() {
            return Err(ExportError::InvalidSettings("file name is empty".to_string()));
        }
        Ok(())
    }

    /// Output location, e.g. `Export/replay_output.mp4`
    pub fn output_file(&self) -> String {
        format!("{}/{}.{}", self.output_path, self.file_name, self.format.extension())
    }
}

/// A validated export of one time range
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub settings: ExportSettings,
    pub start_time: f32,
    pub end_time: f32,
}

impl ExportRequest {
    /// Resolve the settings' range against `recording`, clamped to its span
    pub fn resolve(settings: &ExportSettings, recording: &Recording) -> Result<Self, ExportError> {
        if recording.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        settings.validate()?;

        let duration = recording.span();
        // Non-finite bounds fall back to the full span
        let start = settings
            .start_time
            .filter(|t| t.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, duration);
        let end = settings
            .end_time
            .filter(|t| t.is_finite())
            .unwrap_or(duration)
            .clamp(start, duration);
        Ok(Self {
            settings: settings.clone(),
            start_time: start,
            end_time: end,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportStatus {
    InProgress(f32),
    Complete { output_path: String },
}

pub trait ExportEncoder: Send + Sync {
    fn begin(&mut self, recording: &Recording, request: &ExportRequest) -> Result<JobId, ExportError>;

    fn poll(&mut self, job: JobId) -> Result<ExportStatus, ExportError>;

    fn cancel(&mut self, job: JobId);
}

#[derive(Debug)]
struct SimulatedJob {
    steps: u32,
    output_path: String,
}

/// Encoder stand-in that advances a fixed amount per poll and writes nothing
#[derive(Debug)]
pub struct SimulatedEncoder {
    step: f32,
    next_job: JobId,
    jobs: HashMap<JobId, SimulatedJob>,
}

impl Default for SimulatedEncoder {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl SimulatedEncoder {
    pub fn new(step: f32) -> Self {
        Self {
            step: if step.is_finite() { step.clamp(0.001, 1.0) } else { 0.02 },
            next_job: 1,
            jobs: HashMap::new(),
        }
    }

    fn total_steps(&self) -> u32 {
        (1.0 / self.step).ceil() as u32
    }
}

impl ExportEncoder for SimulatedEncoder {
    fn begin(&mut self, recording: &Recording, request: &ExportRequest) -> Result<JobId, ExportError> {
        let job = self.next_job;
        self.next_job += 1;
        debug!(
            "Export job {} for '{}' covering {:.2}s..{:.2}s",
            job, recording.name, request.start_time, request.end_time
        );
        self.jobs.insert(
            job,
            SimulatedJob {
                steps: 0,
                output_path: request.settings.output_file(),
            },
        );
        Ok(job)
    }

    fn poll(&mut self, job: JobId) -> Result<ExportStatus, ExportError> {
        let total = self.total_steps();
        let step = self.step;
        let state = self.jobs.get_mut(&job).ok_or(ExportError::UnknownJob(job))?;
        state.steps += 1;
        if state.steps < total {
            return Ok(ExportStatus::InProgress(state.steps as f32 * step));
        }
        let output_path = state.output_path.clone();
        self.jobs.remove(&job);
        Ok(ExportStatus::Complete { output_path })
    }

    fn cancel(&mut self, job: JobId) {
        self.jobs.remove(&job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frame;

    fn recording(seconds: u32) -> Recording {
        let mut rec = Recording::new("export");
        for i in 0..=seconds {
            rec.frames.push_back(Frame::new(i, i as f32));
        }
        rec
    }

    #[test]
    fn test_resolve_clamps_range() {
        let settings = ExportSettings {
            start_time: Some(-3.0),
            end_time: Some(50.0),
            ..ExportSettings::default()
        };
        let request = ExportRequest::resolve(&settings, &recording(10)).unwrap();
        assert_eq!((request.start_time, request.end_time), (0.0, 10.0));
    }

    #[test]
    fn test_resolve_ignores_non_finite_bounds() {
        let settings = ExportSettings {
            start_time: Some(f32::NAN),
            end_time: Some(f32::INFINITY),
            ..ExportSettings::default()
        };
        let request = ExportRequest::resolve(&settings, &recording(4)).unwrap();
        assert_eq!((request.start_time, request.end_time), (0.0, 4.0));

        let settings = ExportSettings {
            start_time: Some(1.0),
            end_time: Some(f32::NAN),
            ..ExportSettings::default()
        };
        let request = ExportRequest::resolve(&settings, &recording(4)).unwrap();
        assert_eq!((request.start_time, request.end_time), (1.0, 4.0));
    }

    #[test]
    fn test_resolve_rejects_empty_recording_and_bad_settings() {
        let err = ExportRequest::resolve(&ExportSettings::default(), &Recording::new("e"));
        assert!(matches!(err, Err(ExportError::NothingToExport)));

        let bad = ExportSettings {
            width: 0,
            ..ExportSettings::default()
        };
        assert!(matches!(
            ExportRequest::resolve(&bad, &recording(2)),
            Err(ExportError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_simulated_encoder_completes_after_fixed_polls() {
        let rec = recording(2);
        let request = ExportRequest::resolve(&ExportSettings::default(), &rec).unwrap();
        let mut encoder = SimulatedEncoder::new(0.25);
        let job = encoder.begin(&rec, &request).unwrap();

        let mut statuses = Vec::new();
        for _ in 0..4 {
            statuses.push(encoder.poll(job).unwrap());
        }
        assert_eq!(statuses[0], ExportStatus::InProgress(0.25));
        assert_eq!(
            statuses[3],
            ExportStatus::Complete {
                output_path: "Export/replay_output.mp4".to_string()
            }
        );
        assert!(matches!(encoder.poll(job), Err(ExportError::UnknownJob(_))));
    }

    #[test]
    fn test_cancelled_job_is_forgotten() {
        let rec = recording(2);
        let request = ExportRequest::resolve(&ExportSettings::default(), &rec).unwrap();
        let mut encoder = SimulatedEncoder::default();
        let job = encoder.begin(&rec, &request).unwrap();
        encoder.cancel(job);
        assert!(encoder.poll(job).is_err());
    }
}
