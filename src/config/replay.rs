//! JSON configuration of the `gaze_replay` tool.
//!
//! ```json
//! {
//!   "session": { "cols": 64, "rows": 48, "mode": { "kind": "plane", "width_mm": 297, "height_mm": 210 } },
//!   "params": { "detect": { "threshold": 60 }, "smoothing": { "sigma_cells": 2.0 } },
//!   "input": { "kind": "synthetic", "frames_per_fixation": 30 },
//!   "output": { "obj": "out/relief.obj", "json": "out/heatmap.json" }
//! }
//! ```
use super::params::Params;
use crate::calibration::CALIBRATION_POINTS;
use crate::frame::{CameraMapping, FrameSyncConfig};
use crate::session::SessionConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub sync: FrameSyncConfig,
    #[serde(default)]
    pub cameras: CameraMapping,
    /// Load this model instead of running the calibration sequence.
    #[serde(default)]
    pub calibration_file: Option<PathBuf>,
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputConfig {
    /// Recorded eye frames on disk.
    Frames {
        /// One eye frame per calibration target, row-major over the 3×3 grid.
        #[serde(default)]
        calibration: Vec<PathBuf>,
        tracking: Vec<TrackedFrame>,
    },
    /// Scripted session rendered on the fly.
    Synthetic(SyntheticConfig),
}

#[derive(Debug, Deserialize)]
pub struct TrackedFrame {
    pub path: PathBuf,
    pub timestamp_s: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub width: usize,
    pub height: usize,
    pub pupil_radius: f32,
    /// Eye-frame pupil position when looking at the surface centre.
    pub pupil_center: [f32; 2],
    /// Pupil displacement in pixels across the full surface width/height.
    pub pupil_span: [f32; 2],
    pub frame_rate_hz: f64,
    pub frames_per_fixation: usize,
    /// Normalized fixation targets visited in order.
    pub fixations: Vec<[f32; 2]>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            pupil_radius: 12.0,
            pupil_center: [160.0, 120.0],
            pupil_span: [120.0, 80.0],
            frame_rate_hz: 60.0,
            frames_per_fixation: 20,
            fixations: vec![[0.3, 0.3], [0.7, 0.35], [0.5, 0.6], [0.25, 0.8], [0.8, 0.75]],
        }
    }
}

impl SyntheticConfig {
    /// Pupil position for a gaze at normalized `(u, v)`.
    pub fn pupil_for(&self, target: [f32; 2]) -> [f32; 2] {
        [
            self.pupil_center[0] + self.pupil_span[0] * (target[0] - 0.5),
            self.pupil_center[1] + self.pupil_span[1] * (target[1] - 0.5),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub obj: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub overlay_png: Option<PathBuf>,
    /// Overlay size in pixels; defaults to the grid resolution ×8.
    pub overlay_size: Option<[usize; 2]>,
    pub calibration_json: Option<PathBuf>,
    pub samples_json: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
    pub include_gaze_path: bool,
    pub mesh_in_surface_units: bool,
    pub relief_height: Option<f32>,
}

pub fn load_config(path: &Path) -> Result<ReplayConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: ReplayConfig = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    if let InputConfig::Frames { calibration, .. } = &config.input {
        if config.calibration_file.is_none() && calibration.len() != CALIBRATION_POINTS {
            return Err(format!(
                "Config {} lists {} calibration frames, expected {CALIBRATION_POINTS}",
                path.display(),
                calibration.len()
            ));
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn synthetic_config_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "input": {{ "kind": "synthetic", "frames_per_fixation": 5 }},
                 "output": {{ "obj": "relief.obj" }} }}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        match config.input {
            InputConfig::Synthetic(s) => {
                assert_eq!(s.frames_per_fixation, 5);
                assert_eq!(s.width, 320);
            }
            other => panic!("unexpected input {other:?}"),
        }
        assert_eq!(config.output.obj, Some(PathBuf::from("relief.obj")));
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn frames_input_requires_nine_calibration_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "input": {{ "kind": "frames", "calibration": ["a.png"], "tracking": [] }} }}"#
        )
        .unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.contains("expected 9"), "{err}");
    }

    #[test]
    fn pupil_for_centre_is_pupil_center() {
        let s = SyntheticConfig::default();
        assert_eq!(s.pupil_for([0.5, 0.5]), s.pupil_center);
    }
}
