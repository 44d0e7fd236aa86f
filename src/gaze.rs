//! Pupil candidate + calibration model → gaze sample.
//!
//! Projection is a pure function of its inputs. A frame without a pupil
//! never reaches this stage, and a sample below the confidence floor is
//! dropped, so the sample stream has gaps that downstream stages must not
//! paper over.

use crate::calibration::{CalibrationModel, SurfaceMode};
use crate::pupil::PupilCandidate;
use serde::{Deserialize, Serialize};

/// One resolved gaze event in normalized surface coordinates.
///
/// `u`/`v` may fall outside `[0, 1]` when the subject looks off the surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub u: f32,
    pub v: f32,
    pub timestamp_s: f64,
    /// Detector shape score in `[0, 1]`.
    pub confidence: f32,
    pub mode: SurfaceMode,
}

impl GazeSample {
    pub fn on_surface(&self) -> bool {
        (0.0..=1.0).contains(&self.u) && (0.0..=1.0).contains(&self.v)
    }

    /// Position in the surface unit (pixels or millimetres).
    pub fn surface_position(&self) -> [f32; 2] {
        let [w, h] = self.mode.extent();
        [self.u * w, self.v * h]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeProjector {
    /// Candidates scoring below this are not projected.
    pub min_confidence: f32,
}

impl Default for GazeProjector {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
        }
    }
}

impl GazeProjector {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn project(
        &self,
        candidate: &PupilCandidate,
        model: &CalibrationModel,
        timestamp_s: f64,
    ) -> Option<GazeSample> {
        let confidence = candidate.score;
        if !confidence.is_finite() || confidence < self.min_confidence {
            return None;
        }
        let point = model.apply(candidate.center);
        if !point.u.is_finite() || !point.v.is_finite() {
            return None;
        }
        Some(GazeSample {
            u: point.u,
            v: point.v,
            timestamp_s,
            confidence,
            mode: point.mode,
        })
    }
}
