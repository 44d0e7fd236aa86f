//! nTopology density-grid JSON document.
//!
//! Layout follows the drawing-analysis export: a `metadata` block, an
//! optional `gaze_path` in surface units and a `heatmap` block with the grid
//! resolution, cell size and row-major values (`values[row][col]`).
use crate::calibration::{CalibrationModel, FitMethod};
use crate::gaze::GazeSample;
use crate::heatmap::DensityField;
use serde::{Deserialize, Serialize};

/// Optional context attached to a JSON export.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportMeta<'a> {
    pub calibration: Option<&'a CalibrationModel>,
    pub gaze_path: Option<&'a [GazeSample]>,
}

impl<'a> ExportMeta<'a> {
    pub fn with_calibration(mut self, model: &'a CalibrationModel) -> Self {
        self.calibration = Some(model);
        self
    }

    pub fn with_gaze_path(mut self, samples: &'a [GazeSample]) -> Self {
        self.gaze_path = Some(samples);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub method: FitMethod,
    pub rmse: f64,
    pub max_residual: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// `"screen"` or `"plane"`.
    pub mode: String,
    pub unit: String,
    pub width: f32,
    pub height: f32,
    pub total_samples: u64,
    pub off_surface_samples: u64,
    pub smoothing_sigma_cells: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub calibration: Option<CalibrationSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GazePathPoint {
    pub x: f32,
    pub y: f32,
    pub t: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSection {
    pub resolution_x: usize,
    pub resolution_y: usize,
    pub cell_size_x: f32,
    pub cell_size_y: f32,
    pub values: Vec<Vec<f32>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NTopologyDocument {
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub gaze_path: Vec<GazePathPoint>,
    pub heatmap: HeatmapSection,
}

impl NTopologyDocument {
    pub fn from_field(field: &DensityField, off_surface: u64, meta: &ExportMeta<'_>) -> Self {
        let [width, height] = field.mode.extent();
        let (cols, rows) = (field.cols(), field.rows());
        let values = field
            .as_slice()
            .chunks(cols.max(1))
            .map(|row| row.to_vec())
            .collect();
        let gaze_path = meta
            .gaze_path
            .unwrap_or_default()
            .iter()
            .filter(|s| s.mode == field.mode)
            .map(|s| {
                let [x, y] = s.surface_position();
                GazePathPoint {
                    x,
                    y,
                    t: s.timestamp_s,
                }
            })
            .collect();
        Self {
            metadata: Metadata {
                mode: field.mode.tag().to_string(),
                unit: field.mode.unit().to_string(),
                width,
                height,
                total_samples: field.samples,
                off_surface_samples: off_surface,
                smoothing_sigma_cells: field.smoothing.sigma_cells,
                calibration: meta.calibration.map(|m| CalibrationSummary {
                    method: m.method(),
                    rmse: m.rmse(),
                    max_residual: m.max_residual(),
                }),
            },
            gaze_path,
            heatmap: HeatmapSection {
                resolution_x: cols,
                resolution_y: rows,
                cell_size_x: width / cols as f32,
                cell_size_y: height / rows as f32,
                values,
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
