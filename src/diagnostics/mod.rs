//! Per-frame and per-session reports.
//!
//! Every processed eye frame yields a [`FrameReport`] describing what
//! happened to it, including the normal non-error outcomes (no pupil, not
//! calibrated, gaze off the surface). Reports serialize to JSON for offline
//! inspection by the replay tool.

pub mod timing;

pub use timing::{StageTiming, StageTimer, TimingBreakdown};

use crate::gaze::GazeSample;
use crate::pupil::{DetectionMiss, PupilCandidate};
use serde::Serialize;

/// Fate of one eye frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Detector found no pupil.
    Miss { reason: DetectionMiss },
    /// Pupil found but no calibration model is active.
    Uncalibrated,
    /// A calibration sequence is running; projection is paused.
    Calibrating,
    /// Detection score below the projector's confidence floor.
    LowConfidence { score: f32 },
    Deposited { col: usize, row: usize },
    OffSurface,
    /// Model and heatmap disagree on the surface mode.
    ModeMismatch,
}

impl FrameOutcome {
    pub fn produced_sample(&self) -> bool {
        matches!(
            self,
            FrameOutcome::Deposited { .. } | FrameOutcome::OffSurface
        )
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub timestamp_s: f64,
    pub params_version: u64,
    /// Raw detector output, before jitter filtering.
    pub candidate: Option<PupilCandidate>,
    pub sample: Option<GazeSample>,
    pub outcome: FrameOutcome,
    /// Scene frame time offset, when one was paired.
    pub scene_skew_s: Option<f64>,
    pub timing: TimingBreakdown,
}

/// Outcome counts over a batch of frames.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub frames: u64,
    pub misses: u64,
    pub uncalibrated: u64,
    pub calibrating: u64,
    pub low_confidence: u64,
    pub deposited: u64,
    pub off_surface: u64,
    pub mode_mismatch: u64,
}

impl SessionSummary {
    pub fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        let slot = match outcome {
            FrameOutcome::Miss { .. } => &mut self.misses,
            FrameOutcome::Uncalibrated => &mut self.uncalibrated,
            FrameOutcome::Calibrating => &mut self.calibrating,
            FrameOutcome::LowConfidence { .. } => &mut self.low_confidence,
            FrameOutcome::Deposited { .. } => &mut self.deposited,
            FrameOutcome::OffSurface => &mut self.off_surface,
            FrameOutcome::ModeMismatch => &mut self.mode_mismatch,
        };
        *slot += 1;
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a FrameReport>) -> Self {
        let mut summary = Self::default();
        for r in reports {
            summary.record(&r.outcome);
        }
        summary
    }
}
