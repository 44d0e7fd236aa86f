//! Planar pupil→surface calibration.
//!
//! A session is calibrated against nine known targets laid out on a 3×3
//! grid. The fitted [`CalibrationModel`] maps raw pupil centres (eye-frame
//! pixels) to normalized surface coordinates, where `[0, 1]²` is the nominal
//! extent of the screen or physical plane. Mapping outside that square is
//! valid and expected: gaze leaves the calibrated region.
//!
//! Fits are all-or-nothing. Degenerate inputs and excessive residuals are
//! rejected with a [`CalibrationFitError`] naming the offending point, and a
//! rejected fit never replaces an existing model.

mod homography;
mod normalize;
mod polynomial;
pub mod sequence;

use crate::error::CalibrationFitError;
use log::{debug, info};
use nalgebra::{Matrix2, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use homography::HomographyMapping;
pub use normalize::PointNormalization;
pub use polynomial::QuadraticMapping;
pub use sequence::{grid_targets, CalibrationSequence};

/// Number of targets in a calibration sequence.
pub const CALIBRATION_POINTS: usize = 9;

/// Which surface the gaze is mapped onto, with its physical extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceMode {
    /// A digital display, extent in pixels.
    Screen { width_px: f32, height_px: f32 },
    /// A flat physical target such as a drawing sheet, extent in millimetres.
    Plane { width_mm: f32, height_mm: f32 },
}

impl Default for SurfaceMode {
    fn default() -> Self {
        // A4 landscape, the sheet size the drawing-analysis rig ships with.
        SurfaceMode::Plane {
            width_mm: 297.0,
            height_mm: 210.0,
        }
    }
}

impl SurfaceMode {
    pub fn tag(&self) -> &'static str {
        match self {
            SurfaceMode::Screen { .. } => "screen",
            SurfaceMode::Plane { .. } => "plane",
        }
    }

    /// Surface width and height in the mode's unit.
    pub fn extent(&self) -> [f32; 2] {
        match *self {
            SurfaceMode::Screen {
                width_px,
                height_px,
            } => [width_px, height_px],
            SurfaceMode::Plane {
                width_mm,
                height_mm,
            } => [width_mm, height_mm],
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SurfaceMode::Screen { .. } => "px",
            SurfaceMode::Plane { .. } => "mm",
        }
    }
}

/// One captured (pupil, target) pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Pupil centre in eye-frame pixels.
    pub pupil: [f32; 2],
    /// Known target in normalized surface coordinates.
    pub target: [f32; 2],
}

impl CalibrationPoint {
    pub fn new(pupil: [f32; 2], target: [f32; 2]) -> Self {
        Self { pupil, target }
    }
}

/// Mapping family used by the fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Second-order polynomial per axis.
    #[default]
    Quadratic,
    /// Projective 3×3 transform.
    Homography,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub method: FitMethod,
    /// Ridge term added to the polynomial normal equations.
    pub ridge: f64,
    /// Largest accepted per-point residual, in normalized surface units.
    pub max_residual: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            method: FitMethod::Quadratic,
            ridge: 1e-6,
            max_residual: 0.05,
        }
    }
}

impl FitOptions {
    pub fn with_method(mut self, method: FitMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_max_residual(mut self, max_residual: f64) -> Self {
        self.max_residual = max_residual;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Mapping {
    Quadratic(QuadraticMapping),
    Homography(HomographyMapping),
}

impl Mapping {
    fn apply(&self, pupil: [f64; 2]) -> [f64; 2] {
        match self {
            Mapping::Quadratic(m) => m.apply(pupil),
            Mapping::Homography(m) => m.apply(pupil),
        }
    }

    pub fn method(&self) -> FitMethod {
        match self {
            Mapping::Quadratic(_) => FitMethod::Quadratic,
            Mapping::Homography(_) => FitMethod::Homography,
        }
    }
}

/// A surface coordinate tagged with the mode it was produced in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SurfacePoint {
    pub u: f32,
    pub v: f32,
    pub mode: SurfaceMode,
}

impl SurfacePoint {
    /// Inside the nominal `[0, 1]²` extent.
    pub fn on_surface(&self) -> bool {
        (0.0..=1.0).contains(&self.u) && (0.0..=1.0).contains(&self.v)
    }
}

/// Fitted pupil→surface mapping. Immutable; recalibration builds a new one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    mode: SurfaceMode,
    mapping: Mapping,
    /// Root-mean-square residual over the calibration points.
    rmse: f64,
    /// Worst per-point residual.
    max_residual: f64,
}

impl CalibrationModel {
    pub fn fit(
        points: &[CalibrationPoint],
        mode: SurfaceMode,
        options: &FitOptions,
    ) -> Result<Self, CalibrationFitError> {
        validate_points(points)?;
        let pupils: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [p.pupil[0] as f64, p.pupil[1] as f64])
            .collect();
        let targets: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [p.target[0] as f64, p.target[1] as f64])
            .collect();
        if is_collinear(&pupils) {
            return Err(CalibrationFitError::Degenerate { what: "pupil" });
        }
        if is_collinear(&targets) {
            return Err(CalibrationFitError::Degenerate { what: "target" });
        }

        let mapping = match options.method {
            FitMethod::Quadratic => QuadraticMapping::fit(&pupils, &targets, options.ridge)
                .map(Mapping::Quadratic),
            FitMethod::Homography => {
                HomographyMapping::fit(&pupils, &targets).map(Mapping::Homography)
            }
        }
        .ok_or(CalibrationFitError::Singular)?;

        let mut sum_sq = 0.0;
        let mut worst = (0usize, 0.0f64);
        for (i, (p, t)) in pupils.iter().zip(&targets).enumerate() {
            let m = mapping.apply(*p);
            let residual = ((m[0] - t[0]).powi(2) + (m[1] - t[1]).powi(2)).sqrt();
            if !residual.is_finite() {
                return Err(CalibrationFitError::Singular);
            }
            sum_sq += residual * residual;
            if residual > worst.1 {
                worst = (i, residual);
            }
        }
        let rmse = (sum_sq / points.len() as f64).sqrt();
        debug!(
            "calibration fit ({:?}): rmse={:.5} worst point {} residual={:.5}",
            options.method, rmse, worst.0, worst.1
        );
        if worst.1 > options.max_residual {
            return Err(CalibrationFitError::ResidualTooLarge {
                index: worst.0,
                residual: worst.1,
                bound: options.max_residual,
            });
        }
        info!(
            "calibration accepted: {} mode, rmse {:.4} ({:.2} {})",
            mode.tag(),
            rmse,
            rmse * mode.extent()[0] as f64,
            mode.unit()
        );
        Ok(Self {
            mode,
            mapping,
            rmse,
            max_residual: worst.1,
        })
    }

    /// Map a pupil centre to the surface. Extrapolates outside the
    /// calibrated hull instead of failing.
    pub fn apply(&self, pupil: [f32; 2]) -> SurfacePoint {
        let [u, v] = self.mapping.apply([pupil[0] as f64, pupil[1] as f64]);
        SurfacePoint {
            u: u as f32,
            v: v as f32,
            mode: self.mode,
        }
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub fn method(&self) -> FitMethod {
        self.mapping.method()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn rmse(&self) -> f64 {
        self.rmse
    }

    pub fn max_residual(&self) -> f64 {
        self.max_residual
    }

    /// Persist the model as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<(), String> {
        crate::image::io::write_json_file(path, self)
    }

    pub fn load_json(path: &Path) -> Result<Self, String> {
        let data = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read calibration {}: {e}", path.display()))?;
        serde_json::from_str(&data)
            .map_err(|e| format!("Failed to parse calibration {}: {e}", path.display()))
    }
}

fn validate_points(points: &[CalibrationPoint]) -> Result<(), CalibrationFitError> {
    if points.len() < CALIBRATION_POINTS {
        return Err(CalibrationFitError::InsufficientPoints {
            got: points.len(),
            required: CALIBRATION_POINTS,
        });
    }
    for (index, p) in points.iter().enumerate() {
        if p.pupil.iter().chain(&p.target).any(|v| !v.is_finite()) {
            return Err(CalibrationFitError::NonFinite { index });
        }
    }
    for (first, a) in points.iter().enumerate() {
        for (offset, b) in points[first + 1..].iter().enumerate() {
            let second = first + 1 + offset;
            if a.target == b.target {
                return Err(CalibrationFitError::DuplicateTarget { first, second });
            }
            if a.pupil == b.pupil {
                return Err(CalibrationFitError::DuplicatePupil { first, second });
            }
        }
    }
    Ok(())
}

/// True when the point cloud has (numerically) no spread in one direction.
fn is_collinear(points: &[[f64; 2]]) -> bool {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p[0] - mx;
        let dy = p[1] - my;
        cxx += dx * dx;
        cyy += dy * dy;
        cxy += dx * dy;
    }
    let eig = SymmetricEigen::new(Matrix2::new(cxx / n, cxy / n, cxy / n, cyy / n));
    let lmax = eig.eigenvalues[0].max(eig.eigenvalues[1]);
    let lmin = eig.eigenvalues[0].min(eig.eigenvalues[1]);
    lmax <= 1e-12 || lmin <= 1e-9 * lmax
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_default(points: &[CalibrationPoint]) -> Result<CalibrationModel, CalibrationFitError> {
        CalibrationModel::fit(points, SurfaceMode::default(), &FitOptions::default())
    }

    fn affine_points() -> Vec<CalibrationPoint> {
        grid_targets(0.0)
            .iter()
            .map(|t| {
                let pupil = [250.0 + 120.0 * t[0] + 10.0 * t[1], 180.0 - 8.0 * t[0] + 90.0 * t[1]];
                CalibrationPoint::new(pupil, *t)
            })
            .collect()
    }

    #[test]
    fn quadratic_fit_reproduces_targets() {
        let points = affine_points();
        let model = fit_default(&points).expect("fit");
        for p in &points {
            let s = model.apply(p.pupil);
            assert!((s.u - p.target[0]).abs() < 1e-3, "{s:?} vs {:?}", p.target);
            assert!((s.v - p.target[1]).abs() < 1e-3, "{s:?} vs {:?}", p.target);
        }
        assert!(model.rmse() < 1e-3);
    }

    #[test]
    fn homography_fit_reproduces_targets() {
        let points = affine_points();
        let options = FitOptions::default().with_method(FitMethod::Homography);
        let model = CalibrationModel::fit(&points, SurfaceMode::default(), &options)
            .expect("fit");
        assert_eq!(model.method(), FitMethod::Homography);
        for p in &points {
            let s = model.apply(p.pupil);
            assert!((s.u - p.target[0]).abs() < 1e-3);
            assert!((s.v - p.target[1]).abs() < 1e-3);
        }
    }

    #[test]
    fn eight_points_are_insufficient() {
        let points = affine_points();
        let err = fit_default(&points[..8]).unwrap_err();
        assert_eq!(
            err,
            CalibrationFitError::InsufficientPoints {
                got: 8,
                required: 9
            }
        );
    }

    #[test]
    fn duplicate_target_is_named() {
        let mut points = affine_points();
        points[7].target = points[2].target;
        let err = fit_default(&points).unwrap_err();
        assert_eq!(
            err,
            CalibrationFitError::DuplicateTarget {
                first: 2,
                second: 7
            }
        );
    }

    #[test]
    fn collinear_pupils_are_degenerate() {
        let points: Vec<_> = grid_targets(0.0)
            .iter()
            .enumerate()
            .map(|(i, t)| CalibrationPoint::new([100.0 + 10.0 * i as f32, 50.0 + 5.0 * i as f32], *t))
            .collect();
        let err = fit_default(&points).unwrap_err();
        assert_eq!(err, CalibrationFitError::Degenerate { what: "pupil" });
    }

    #[test]
    fn non_finite_point_is_rejected() {
        let mut points = affine_points();
        points[4].pupil[0] = f32::NAN;
        let err = fit_default(&points).unwrap_err();
        assert_eq!(err, CalibrationFitError::NonFinite { index: 4 });
    }

    #[test]
    fn noisy_point_exceeds_residual_bound() {
        let mut points = affine_points();
        points[4].pupil[0] += 30.0;
        let options = FitOptions::default().with_max_residual(1e-3);
        let err = CalibrationModel::fit(&points, SurfaceMode::default(), &options).unwrap_err();
        assert!(
            matches!(err, CalibrationFitError::ResidualTooLarge { bound, .. } if bound == 1e-3),
            "unexpected {err:?}"
        );
    }

    #[test]
    fn extrapolation_stays_finite() {
        let model = fit_default(&affine_points()).unwrap();
        let far = model.apply([900.0, -400.0]);
        assert!(far.u.is_finite() && far.v.is_finite());
        assert!(!far.on_surface());
    }
}
