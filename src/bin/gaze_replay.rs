//! Offline replay of a gaze session.
//!
//! Usage: `gaze_replay <config.json>`
//!
//! Runs the 9-point calibration (or loads a saved model), feeds every
//! tracking frame through the session and writes the configured artifacts.
use gaze_heatmap::calibration::{grid_targets, CalibrationModel, CALIBRATION_POINTS};
use gaze_heatmap::config::replay::{self, InputConfig, OutputConfig, SyntheticConfig};
use gaze_heatmap::diagnostics::{FrameReport, SessionSummary};
use gaze_heatmap::export::{MeshOptions, MeshUnits};
use gaze_heatmap::frame::{CameraRole, Frame, FrameSync};
use gaze_heatmap::image::io::{load_grayscale_image, write_json_file, GrayImageU8};
use gaze_heatmap::{Session, SessionConfig};
use serde::Serialize;
use std::env;
use std::path::Path;
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: gaze_replay <config.json>".to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport<'a> {
    summary: &'a SessionSummary,
    calibration_rmse: Option<f64>,
    frames: &'a [FrameReport],
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = replay::load_config(Path::new(&config_path))?;

    let session = Session::new(config.session.clone(), config.params.clone())
        .map_err(|e| e.to_string())?;
    let sync = Arc::new(FrameSync::new(config.sync.clone(), config.cameras.clone()));

    if let Some(path) = &config.calibration_file {
        let model = CalibrationModel::load_json(path)?;
        session.set_model(model);
        println!("Loaded calibration from {}", path.display());
    }

    let reports = match &config.input {
        InputConfig::Frames {
            calibration,
            tracking,
        } => {
            if config.calibration_file.is_none() {
                let frames = calibration
                    .iter()
                    .map(|p| load_grayscale_image(p))
                    .collect::<Result<Vec<_>, _>>()?;
                calibrate(&session, frames)?;
            }
            let mut reports = Vec::with_capacity(tracking.len());
            for item in tracking {
                let image = load_grayscale_image(&item.path)?;
                let frame = Frame::new(image, item.timestamp_s, CameraRole::Eye);
                sync.push_frame(frame);
                reports.extend(session.process_pending(&sync));
            }
            reports
        }
        InputConfig::Synthetic(synthetic) => {
            if config.calibration_file.is_none() {
                let frames = grid_targets(config.session.calibration_margin)
                    .iter()
                    .map(|t| render_eye(synthetic, synthetic.pupil_for(*t)))
                    .collect();
                calibrate(&session, frames)?;
            }
            run_synthetic(&session, &sync, synthetic)
        }
    };

    let summary = SessionSummary::from_reports(&reports);
    print_summary(&summary, &session);
    write_outputs(&session, &config.output, &config.session, &summary, &reports)
}

fn calibrate(session: &Session, frames: Vec<GrayImageU8>) -> Result<(), String> {
    if frames.len() != CALIBRATION_POINTS {
        return Err(format!(
            "Calibration needs {CALIBRATION_POINTS} frames, got {}",
            frames.len()
        ));
    }
    session.begin_calibration();
    for (index, image) in frames.into_iter().enumerate() {
        session.arm_calibration_point(index).map_err(|e| e.to_string())?;
        let frame = Frame::new(image, index as f64 * 0.1, CameraRole::Eye);
        session.process_frame(&frame);
        if let Err(err) = session.capture_calibration_point(index) {
            // Leave the previous model, if any, in place.
            let _ = session.abort_calibration();
            return Err(err.to_string());
        }
    }
    let model = session.complete_calibration().map_err(|e| e.to_string())?;
    println!(
        "Calibration accepted: {} mode, rmse {:.4}, worst residual {:.4}",
        model.mode().tag(),
        model.rmse(),
        model.max_residual()
    );
    Ok(())
}

/// Feed the scripted fixations through a producer thread, the way live
/// cameras would.
fn run_synthetic(
    session: &Session,
    sync: &Arc<FrameSync>,
    synthetic: &SyntheticConfig,
) -> Vec<FrameReport> {
    let mut reports = Vec::new();
    let dt = 1.0 / synthetic.frame_rate_hz.max(1.0);
    let mut t = 10.0;
    for target in &synthetic.fixations {
        let frames: Vec<Frame> = (0..synthetic.frames_per_fixation)
            .map(|i| {
                let ts = t + i as f64 * dt;
                Frame::new(
                    render_eye(synthetic, synthetic.pupil_for(*target)),
                    ts,
                    CameraRole::Eye,
                )
            })
            .collect();
        t += synthetic.frames_per_fixation as f64 * dt;
        let producer = {
            let sync = Arc::clone(sync);
            std::thread::spawn(move || {
                for frame in frames {
                    sync.push_frame(frame);
                }
            })
        };
        if producer.join().is_err() {
            log::warn!("frame producer panicked");
        }
        reports.extend(session.process_pending(sync));
    }
    reports
}

/// Bright iris background with a dark disk pupil.
fn render_eye(synthetic: &SyntheticConfig, pupil: [f32; 2]) -> GrayImageU8 {
    let mut image = GrayImageU8::filled(synthetic.width, synthetic.height, 170);
    let w = synthetic.width;
    let r2 = synthetic.pupil_radius * synthetic.pupil_radius;
    for (i, px) in image.data_mut().iter_mut().enumerate() {
        let dx = (i % w) as f32 - pupil[0];
        let dy = (i / w) as f32 - pupil[1];
        if dx * dx + dy * dy <= r2 {
            *px = 20;
        }
    }
    image
}

fn print_summary(summary: &SessionSummary, session: &Session) {
    println!(
        "Frames: {} (misses {}, low confidence {}, off-surface {})",
        summary.frames, summary.misses, summary.low_confidence, summary.off_surface
    );
    println!("Samples accumulated: {}", session.sample_count());
}

fn write_outputs(
    session: &Session,
    output: &OutputConfig,
    session_config: &SessionConfig,
    summary: &SessionSummary,
    reports: &[FrameReport],
) -> Result<(), String> {
    let snapshot = session.export_snapshot();

    if let Some(path) = &output.obj {
        let mut options = MeshOptions::default();
        if output.mesh_in_surface_units {
            options = options.with_units(MeshUnits::Surface);
        }
        if let Some(h) = output.relief_height {
            options = options.with_relief_height(h);
        }
        snapshot
            .write_mesh(&options, path)
            .map_err(|e| e.to_string())?;
        println!("OBJ written to {}", path.display());
    }
    if let Some(path) = &output.json {
        snapshot
            .write_json(output.include_gaze_path, path)
            .map_err(|e| e.to_string())?;
        println!("nTopology JSON written to {}", path.display());
    }
    if let Some(path) = &output.overlay_png {
        let [w, h] = output
            .overlay_size
            .unwrap_or([session_config.cols * 8, session_config.rows * 8]);
        snapshot
            .write_overlay_png(w, h, path)
            .map_err(|e| e.to_string())?;
        println!("Overlay written to {}", path.display());
    }
    if let Some(path) = &output.calibration_json {
        let model = snapshot
            .model
            .as_ref()
            .ok_or("No calibration model to save")?;
        model.save_json(path)?;
        println!("Calibration written to {}", path.display());
    }
    if let Some(path) = &output.samples_json {
        write_json_file(path, &snapshot.samples)?;
        println!("Sample log written to {}", path.display());
    }
    if let Some(path) = &output.report_json {
        let report = ReplayReport {
            summary,
            calibration_rmse: snapshot.model.as_ref().map(|m| m.rmse()),
            frames: reports,
        };
        write_json_file(path, &report)?;
        println!("Frame report written to {}", path.display());
    }
    Ok(())
}
