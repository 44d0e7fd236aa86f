#![doc = include_str!("../README.md")]

// Pipeline stages, leaves first.
pub mod calibration;
pub mod export;
pub mod filter;
pub mod frame;
pub mod gaze;
pub mod heatmap;
pub mod pupil;

// Glue and support.
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod session;

// --- High-level re-exports -------------------------------------------------

pub use crate::calibration::{CalibrationModel, CalibrationPoint, FitOptions, SurfaceMode};
pub use crate::error::{CalibrationError, CalibrationFitError, ExportError, HeatmapError};
pub use crate::gaze::{GazeProjector, GazeSample};
pub use crate::heatmap::{DensityField, HeatmapGrid, Smoothing};
pub use crate::pupil::{DetectParams, PupilCandidate, PupilDetection, PupilDetector};
pub use crate::session::{Session, SessionConfig};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use gaze_heatmap::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::new(SessionConfig::default(), Params::default())?;
/// let sync = FrameSync::default();
/// // ... push frames from the capture threads, run calibration ...
/// let reports = session.process_pending(&sync);
/// println!("{} frames, {} samples", reports.len(), session.sample_count());
/// let mesh = session.export_mesh(&MeshOptions::default())?;
/// println!("{}", mesh.to_obj());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::config::Params;
    pub use crate::export::{MeshOptions, MeshUnits};
    pub use crate::frame::{Frame, FrameSync};
    pub use crate::image::ImageU8;
    pub use crate::{
        CalibrationModel, GazeSample, HeatmapGrid, Session, SessionConfig, Smoothing, SurfaceMode,
    };
}
