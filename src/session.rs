//! Live tracking session.
//!
//! A [`Session`] owns everything one recording needs: the active calibration
//! model, the heatmap grid, the sample log and the live parameters. All
//! methods take `&self`, so capture, UI and export threads can share one
//! session behind an `Arc`.
//!
//! Lock order is `tracker → calibration → grid → samples`; no method takes
//! them in another order.

use crate::calibration::{
    grid_targets, CalibrationModel, CalibrationPoint, CalibrationSequence, FitOptions, SurfaceMode,
};
use crate::config::{ParameterStore, Params, ParamsSnapshot};
use crate::diagnostics::{FrameOutcome, FrameReport, StageTimer};
use crate::error::{CalibrationError, ExportError, HeatmapError};
use crate::export::{self, ExportMeta, MeshOptions, NTopologyDocument, ObjMesh};
use crate::filter::JitterFilter;
use crate::frame::{Frame, FrameSync};
use crate::gaze::GazeSample;
use crate::heatmap::{Deposit, DensityField, DepositWeight, HeatmapGrid, ReplayStats, Smoothing};
use crate::image::io::{save_heatmap_png, write_json_file};
use crate::pupil::{PupilCandidate, PupilDetection, PupilDetector};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cols: usize,
    pub rows: usize,
    pub mode: SurfaceMode,
    pub weight: DepositWeight,
    pub fit: FitOptions,
    /// Inset of the outer calibration targets from the surface edge.
    pub calibration_margin: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cols: 64,
            rows: 48,
            mode: SurfaceMode::default(),
            weight: DepositWeight::default(),
            fit: FitOptions::default(),
            calibration_margin: 0.0,
        }
    }
}

struct TrackerState {
    detector: PupilDetector,
    filter: JitterFilter,
    /// Most recent raw detection, consumed by calibration captures.
    latest: Option<PupilCandidate>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Keeps projection paused between taking a finished sequence and swapping
/// in its model. Clears the flag on every exit path.
struct FitPause<'a>(&'a AtomicBool);

impl Drop for FitPause<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Consistent copy of everything an export reads.
#[derive(Clone, Debug)]
pub struct ExportSnapshot {
    pub grid: HeatmapGrid,
    pub smoothing: Smoothing,
    pub params_version: u64,
    pub model: Option<Arc<CalibrationModel>>,
    pub samples: Vec<GazeSample>,
}

impl ExportSnapshot {
    pub fn render(&self) -> DensityField {
        self.grid.render(self.smoothing)
    }

    pub fn mesh(&self, options: &MeshOptions) -> Result<ObjMesh, ExportError> {
        export::export_mesh(&self.grid, self.smoothing, options)
    }

    fn meta(&self, include_gaze_path: bool) -> ExportMeta<'_> {
        let mut meta = ExportMeta::default();
        if let Some(model) = &self.model {
            meta = meta.with_calibration(model);
        }
        if include_gaze_path {
            meta = meta.with_gaze_path(&self.samples);
        }
        meta
    }

    pub fn json(&self, include_gaze_path: bool) -> Result<NTopologyDocument, ExportError> {
        export::export_json(&self.grid, self.smoothing, &self.meta(include_gaze_path))
    }

    pub fn write_mesh(&self, options: &MeshOptions, path: &Path) -> Result<ObjMesh, ExportError> {
        export::write_mesh(&self.grid, self.smoothing, options, path)
    }

    pub fn write_json(
        &self,
        include_gaze_path: bool,
        path: &Path,
    ) -> Result<NTopologyDocument, ExportError> {
        export::write_json(
            &self.grid,
            self.smoothing,
            &self.meta(include_gaze_path),
            path,
        )
    }

    /// Jet-coloured overlay of the same density the mesh and JSON carry.
    pub fn write_overlay_png(
        &self,
        width: usize,
        height: usize,
        path: &Path,
    ) -> Result<(), ExportError> {
        if self.grid.sample_count() == 0 {
            return Err(ExportError::EmptySession { samples: 0 });
        }
        let field = self.render();
        save_heatmap_png(&field.values, width, height, 0.8, path).map_err(ExportError::Io)
    }
}

pub struct Session {
    config: SessionConfig,
    params: Arc<ParameterStore>,
    tracker: Mutex<TrackerState>,
    calibration: Mutex<Option<CalibrationSequence>>,
    /// Set while a completed sequence is being fitted.
    fitting: AtomicBool,
    model: RwLock<Option<Arc<CalibrationModel>>>,
    grid: Mutex<HeatmapGrid>,
    samples: Mutex<Vec<GazeSample>>,
}

impl Session {
    pub fn new(config: SessionConfig, params: Params) -> Result<Self, HeatmapError> {
        Self::with_store(config, Arc::new(ParameterStore::new(params)))
    }

    /// Share an existing parameter store, e.g. one a UI thread edits.
    pub fn with_store(
        config: SessionConfig,
        params: Arc<ParameterStore>,
    ) -> Result<Self, HeatmapError> {
        let grid =
            HeatmapGrid::new(config.cols, config.rows, config.mode)?.with_weight(config.weight);
        let filter = JitterFilter::new(params.snapshot().params.filter.clone());
        Ok(Self {
            config,
            params,
            tracker: Mutex::new(TrackerState {
                detector: PupilDetector::new(),
                filter,
                latest: None,
            }),
            calibration: Mutex::new(None),
            fitting: AtomicBool::new(false),
            model: RwLock::new(None),
            grid: Mutex::new(grid),
            samples: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn model(&self) -> Option<Arc<CalibrationModel>> {
        self.model.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True from `begin_calibration` until the new model is active or the
    /// sequence has ended without one.
    pub fn is_calibrating(&self) -> bool {
        let slot = lock(&self.calibration);
        slot.is_some() || self.fitting.load(Ordering::Acquire)
    }

    /// Install a model, e.g. one loaded from disk. The heatmap follows the
    /// model's surface mode and is cleared if that mode changes.
    pub fn set_model(&self, model: CalibrationModel) -> Arc<CalibrationModel> {
        let model = Arc::new(model);
        {
            let mut grid = lock(&self.grid);
            if grid.mode() != model.mode() {
                grid.set_mode(model.mode());
                lock(&self.samples).clear();
            }
        }
        *self.model.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&model));
        lock(&self.tracker).filter.reset();
        model
    }

    // --- calibration events -------------------------------------------------

    /// Enter calibration. Projection pauses until the sequence completes or
    /// is aborted. Restarting discards points captured so far.
    pub fn begin_calibration(&self) {
        self.begin_calibration_for(self.grid_mode());
    }

    /// Enter calibration for another surface. The heatmap switches mode only
    /// once the new model is accepted.
    pub fn begin_calibration_for(&self, mode: SurfaceMode) {
        let targets = grid_targets(self.config.calibration_margin);
        *lock(&self.calibration) = Some(CalibrationSequence::with_targets(mode, targets));
        info!("calibration started ({} mode)", mode.tag());
    }

    fn grid_mode(&self) -> SurfaceMode {
        lock(&self.grid).mode()
    }

    pub fn arm_calibration_point(&self, index: usize) -> Result<[f32; 2], CalibrationError> {
        lock(&self.calibration)
            .as_mut()
            .ok_or(CalibrationError::NotCalibrating)?
            .arm(index)
    }

    /// Capture the latest detected pupil against target `index`.
    pub fn capture_calibration_point(
        &self,
        index: usize,
    ) -> Result<CalibrationPoint, CalibrationError> {
        let latest = lock(&self.tracker).latest.clone();
        lock(&self.calibration)
            .as_mut()
            .ok_or(CalibrationError::NotCalibrating)?
            .capture(index, latest.as_ref())
    }

    /// Fit and activate a model. On failure the sequence ends and the
    /// previous model, if any, stays active.
    pub fn complete_calibration(&self) -> Result<Arc<CalibrationModel>, CalibrationError> {
        let (sequence, _pause) = self.take_for_fit()?;
        match sequence.complete(&self.config.fit) {
            Ok(model) => Ok(self.set_model(model)),
            Err(err) => {
                warn!("calibration rejected: {err}");
                Err(err)
            }
        }
    }

    fn take_for_fit(&self) -> Result<(CalibrationSequence, FitPause<'_>), CalibrationError> {
        let mut slot = lock(&self.calibration);
        let sequence = slot.take().ok_or(CalibrationError::NotCalibrating)?;
        self.fitting.store(true, Ordering::Release);
        Ok((sequence, FitPause(&self.fitting)))
    }

    pub fn abort_calibration(&self) -> Result<(), CalibrationError> {
        let sequence = lock(&self.calibration)
            .take()
            .ok_or(CalibrationError::NotCalibrating)?;
        info!(
            "calibration aborted after {} of 9 points",
            sequence.captured_count()
        );
        Ok(())
    }

    // --- tracking -----------------------------------------------------------

    /// Run one eye frame through detection, filtering, projection and
    /// accumulation. Reads one parameter snapshot for the whole frame.
    pub fn process_frame(&self, frame: &Frame) -> FrameReport {
        let snapshot = self.params.snapshot();
        self.process_with(frame, &snapshot, None)
    }

    fn process_with(
        &self,
        frame: &Frame,
        snapshot: &ParamsSnapshot,
        scene_skew_s: Option<f64>,
    ) -> FrameReport {
        let params = &snapshot.params;
        let mut timer = StageTimer::start();
        let mut tracker = lock(&self.tracker);

        let detection = tracker.detector.detect(&frame.view(), &params.detect);
        timer.lap("detect");
        let report = |candidate: Option<PupilCandidate>,
                      sample: Option<GazeSample>,
                      outcome: FrameOutcome,
                      timer: StageTimer| FrameReport {
            timestamp_s: frame.timestamp_s,
            params_version: snapshot.version,
            candidate,
            sample,
            outcome,
            scene_skew_s,
            timing: timer.finish(),
        };

        let raw = match detection {
            PupilDetection::Found(candidate) => candidate,
            PupilDetection::Miss(reason) => {
                tracker.latest = None;
                return report(None, None, FrameOutcome::Miss { reason }, timer);
            }
        };
        tracker.latest = Some(raw.clone());
        tracker.filter.set_params(&params.filter);
        let filtered = tracker.filter.apply_candidate(&raw, frame.timestamp_s);
        timer.lap("filter");

        if self.is_calibrating() {
            return report(Some(raw), None, FrameOutcome::Calibrating, timer);
        }
        let Some(model) = self.model() else {
            return report(Some(raw), None, FrameOutcome::Uncalibrated, timer);
        };
        let Some(sample) = params
            .projector
            .project(&filtered, &model, frame.timestamp_s)
        else {
            let score = filtered.score;
            return report(Some(raw), None, FrameOutcome::LowConfidence { score }, timer);
        };
        timer.lap("project");

        let outcome = {
            let mut grid = lock(&self.grid);
            match grid.accumulate(&sample) {
                Ok(deposit) => {
                    lock(&self.samples).push(sample);
                    match deposit {
                        Deposit::Deposited { col, row } => FrameOutcome::Deposited { col, row },
                        Deposit::OffSurface => FrameOutcome::OffSurface,
                    }
                }
                Err(err) => {
                    warn!("dropping gaze sample: {err}");
                    FrameOutcome::ModeMismatch
                }
            }
        };
        timer.lap("accumulate");
        let sample = outcome.produced_sample().then_some(sample);
        report(Some(raw), sample, outcome, timer)
    }

    /// Drain every queued eye frame from `sync`.
    pub fn process_pending(&self, sync: &FrameSync) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        while let Some(pair) = sync.next_pair() {
            let snapshot = self.params.snapshot();
            reports.push(self.process_with(&pair.eye, &snapshot, pair.skew_s()));
        }
        reports
    }

    // --- heatmap & export ---------------------------------------------------

    pub fn sample_count(&self) -> u64 {
        lock(&self.grid).sample_count()
    }

    /// Copy of the recorded gaze samples in arrival order.
    pub fn samples(&self) -> Vec<GazeSample> {
        lock(&self.samples).clone()
    }

    /// Live view with the current smoothing.
    pub fn render(&self) -> DensityField {
        let smoothing = self.params.snapshot().params.smoothing;
        lock(&self.grid).render(smoothing)
    }

    /// Grid, log and smoothing as of one instant.
    pub fn export_snapshot(&self) -> ExportSnapshot {
        let snapshot = self.params.snapshot();
        let model = self.model();
        let grid = lock(&self.grid);
        let samples = lock(&self.samples).clone();
        ExportSnapshot {
            grid: grid.clone(),
            smoothing: snapshot.params.smoothing,
            params_version: snapshot.version,
            model,
            samples,
        }
    }

    pub fn export_mesh(&self, options: &MeshOptions) -> Result<ObjMesh, ExportError> {
        self.export_snapshot().mesh(options)
    }

    pub fn export_json(&self, include_gaze_path: bool) -> Result<NTopologyDocument, ExportError> {
        self.export_snapshot().json(include_gaze_path)
    }

    /// Clear the heatmap and the sample log; calibration is kept.
    pub fn reset_heatmap(&self) {
        let mut grid = lock(&self.grid);
        grid.reset();
        lock(&self.samples).clear();
    }

    /// Rebuild the grid from the sample log.
    pub fn rebuild_heatmap(&self) -> ReplayStats {
        let mut grid = lock(&self.grid);
        let samples = lock(&self.samples);
        grid.replay(samples.iter())
    }

    /// Write the sample log as JSON.
    pub fn save_samples_json(&self, path: &Path) -> Result<(), String> {
        write_json_file(path, &self.samples())
    }
}
