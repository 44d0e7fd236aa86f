//! Error taxonomy of the gaze pipeline.
//!
//! Detection misses are not errors: they are reported through
//! [`crate::pupil::DetectionMiss`] and simply produce no gaze sample. The
//! enums below cover the operations that can fail and must be retried by the
//! operator. Stream starvation is surfaced as [`crate::frame::StreamStatus`].
use thiserror::Error;

/// Reasons a 9-point calibration fit is rejected.
///
/// Indices refer to the calibration point order (row-major over the 3×3
/// target grid).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationFitError {
    #[error("calibration needs {required} points, got {got}")]
    InsufficientPoints { got: usize, required: usize },
    #[error("calibration point {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("calibration points {first} and {second} share the same target")]
    DuplicateTarget { first: usize, second: usize },
    #[error("calibration points {first} and {second} share the same pupil position")]
    DuplicatePupil { first: usize, second: usize },
    #[error("calibration {what} positions are collinear")]
    Degenerate { what: &'static str },
    #[error("calibration system is singular")]
    Singular,
    #[error("calibration point {index} residual {residual:.4} exceeds bound {bound:.4}")]
    ResidualTooLarge {
        index: usize,
        residual: f64,
        bound: f64,
    },
}

/// Misuse of the interactive calibration sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration point {index} is out of range (0..9)")]
    PointOutOfRange { index: usize },
    #[error("calibration point {index} was captured without being armed")]
    NotArmed { index: usize },
    #[error("no pupil available while capturing calibration point {index}")]
    NoPupil { index: usize },
    #[error("no calibration sequence is in progress")]
    NotCalibrating,
    #[error("calibration points {missing:?} were never captured")]
    MissingPoints { missing: Vec<usize> },
    #[error(transparent)]
    Fit(#[from] CalibrationFitError),
}

/// Rejected heatmap deposits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeatmapError {
    #[error("sample surface mode {sample} does not match grid mode {grid}")]
    ModeMismatch {
        sample: &'static str,
        grid: &'static str,
    },
    #[error("heatmap grid must have at least one cell, got {cols}x{rows}")]
    EmptyGrid { cols: usize, rows: usize },
}

/// Failures of the export path.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: {samples} samples accumulated")]
    EmptySession { samples: u64 },
    #[error("export I/O failed: {0}")]
    Io(String),
    #[error("failed to serialize export document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}
