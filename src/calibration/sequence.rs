//! Interactive 9-point capture driven by calibration UI events.
//!
//! The UI arms one target at a time, the operator fixates it and the current
//! pupil candidate is captured. Points can be re-armed and re-captured in any
//! order; the fit runs once every target holds a pupil position.

use super::{CalibrationModel, CalibrationPoint, FitOptions, SurfaceMode, CALIBRATION_POINTS};
use crate::error::CalibrationError;
use crate::pupil::PupilCandidate;
use log::debug;

/// Row-major 3×3 target layout over the unit square. `margin` insets the
/// outer ring, `0.0` puts targets on the corners, edge midpoints and centre.
pub fn grid_targets(margin: f32) -> [[f32; 2]; CALIBRATION_POINTS] {
    let m = margin.clamp(0.0, 0.49);
    let steps = [m, 0.5, 1.0 - m];
    let mut out = [[0.0; 2]; CALIBRATION_POINTS];
    for (r, &v) in steps.iter().enumerate() {
        for (c, &u) in steps.iter().enumerate() {
            out[r * 3 + c] = [u, v];
        }
    }
    out
}

#[derive(Clone, Debug)]
pub struct CalibrationSequence {
    mode: SurfaceMode,
    targets: [[f32; 2]; CALIBRATION_POINTS],
    captured: [Option<[f32; 2]>; CALIBRATION_POINTS],
    armed: Option<usize>,
}

impl CalibrationSequence {
    pub fn new(mode: SurfaceMode) -> Self {
        Self::with_targets(mode, grid_targets(0.0))
    }

    pub fn with_targets(mode: SurfaceMode, targets: [[f32; 2]; CALIBRATION_POINTS]) -> Self {
        Self {
            mode,
            targets,
            captured: [None; CALIBRATION_POINTS],
            armed: None,
        }
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub fn target(&self, index: usize) -> Option<[f32; 2]> {
        self.targets.get(index).copied()
    }

    pub fn armed(&self) -> Option<usize> {
        self.armed
    }

    /// Mark `index` as the point the operator is now fixating.
    pub fn arm(&mut self, index: usize) -> Result<[f32; 2], CalibrationError> {
        let target = self
            .target(index)
            .ok_or(CalibrationError::PointOutOfRange { index })?;
        self.armed = Some(index);
        debug!("calibration point {index} armed at {target:?}");
        Ok(target)
    }

    /// Record the pupil for the armed point. Disarms on success.
    pub fn capture(
        &mut self,
        index: usize,
        candidate: Option<&PupilCandidate>,
    ) -> Result<CalibrationPoint, CalibrationError> {
        let target = self
            .target(index)
            .ok_or(CalibrationError::PointOutOfRange { index })?;
        if self.armed != Some(index) {
            return Err(CalibrationError::NotArmed { index });
        }
        let candidate = candidate.ok_or(CalibrationError::NoPupil { index })?;
        self.captured[index] = Some(candidate.center);
        self.armed = None;
        debug!(
            "calibration point {index} captured pupil {:?}",
            candidate.center
        );
        Ok(CalibrationPoint::new(candidate.center, target))
    }

    /// Indices without a captured pupil, ascending.
    pub fn missing(&self) -> Vec<usize> {
        self.captured
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_none().then_some(i))
            .collect()
    }

    pub fn captured_count(&self) -> usize {
        CALIBRATION_POINTS - self.missing().len()
    }

    /// Captured points in target order, or the missing indices.
    pub fn points(&self) -> Result<Vec<CalibrationPoint>, CalibrationError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(CalibrationError::MissingPoints { missing });
        }
        Ok(self
            .captured
            .iter()
            .zip(&self.targets)
            .filter_map(|(pupil, target)| pupil.map(|p| CalibrationPoint::new(p, *target)))
            .collect())
    }

    /// Fit a model from the captured points.
    pub fn complete(&self, options: &FitOptions) -> Result<CalibrationModel, CalibrationError> {
        let points = self.points()?;
        Ok(CalibrationModel::fit(&points, self.mode, options)?)
    }
}
