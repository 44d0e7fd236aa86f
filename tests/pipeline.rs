mod common;

use common::synthetic::{eye_frame, pupil_for};
use gaze_heatmap::calibration::grid_targets;
use gaze_heatmap::config::{ParameterStore, Params};
use gaze_heatmap::diagnostics::{FrameOutcome, SessionSummary};
use gaze_heatmap::export::MeshOptions;
use gaze_heatmap::frame::{CameraMapping, FrameSync, FrameSyncConfig};
use gaze_heatmap::image::io::GrayImageU8;
use gaze_heatmap::{CalibrationError, ExportError, Session, SessionConfig, Smoothing, SurfaceMode};
use std::sync::Arc;

fn config() -> SessionConfig {
    SessionConfig {
        cols: 10,
        rows: 10,
        mode: SurfaceMode::Screen {
            width_px: 1920.0,
            height_px: 1080.0,
        },
        ..SessionConfig::default()
    }
}

fn calibrate(session: &Session, timestamp_s: f64) {
    session.begin_calibration();
    for (i, target) in grid_targets(0.0).iter().enumerate() {
        session.arm_calibration_point(i).unwrap();
        let report = session.process_frame(&eye_frame(pupil_for(*target), timestamp_s));
        assert_eq!(report.outcome, FrameOutcome::Calibrating);
        session.capture_calibration_point(i).unwrap();
    }
    session.complete_calibration().expect("calibration fit");
}

#[test]
fn calibrated_fixations_land_in_their_cells() {
    common::init_logging();
    let session = Session::new(config(), Params::default()).unwrap();
    calibrate(&session, 0.0);

    let fixations = [[0.35f32, 0.35f32], [0.75, 0.25], [0.15, 0.85]];
    let mut t = 1.0;
    for target in fixations {
        for _ in 0..5 {
            let report = session.process_frame(&eye_frame(pupil_for(target), t));
            let expected = FrameOutcome::Deposited {
                col: (target[0] * 10.0) as usize,
                row: (target[1] * 10.0) as usize,
            };
            assert_eq!(report.outcome, expected, "fixation {target:?}");
            let sample = report.sample.expect("sample");
            assert!((sample.u - target[0]).abs() < 0.02);
            assert!((sample.v - target[1]).abs() < 0.02);
            t += 1.0 / 60.0;
        }
    }
    assert_eq!(session.sample_count(), 15);
    assert_eq!(session.samples().len(), 15);

    let field = session.render();
    let peak = (0..10)
        .flat_map(|r| (0..10).map(move |c| (c, r)))
        .max_by(|a, b| field.get(a.0, a.1).total_cmp(&field.get(b.0, b.1)))
        .unwrap();
    assert!(fixations
        .iter()
        .any(|f| ((f[0] * 10.0) as usize, (f[1] * 10.0) as usize) == peak));
}

#[test]
fn misses_and_uncalibrated_frames_produce_no_samples() {
    let session = Session::new(config(), Params::default()).unwrap();
    let blank = gaze_heatmap::frame::Frame::new(
        GrayImageU8::filled(64, 48, 200),
        0.0,
        gaze_heatmap::frame::CameraRole::Eye,
    );
    let report = session.process_frame(&blank);
    assert!(matches!(report.outcome, FrameOutcome::Miss { .. }));
    assert!(report.candidate.is_none());

    let report = session.process_frame(&eye_frame([160.0, 120.0], 0.1));
    assert_eq!(report.outcome, FrameOutcome::Uncalibrated);
    assert!(report.candidate.is_some());
    assert_eq!(session.sample_count(), 0);
    assert!(matches!(
        session.export_mesh(&MeshOptions::default()),
        Err(ExportError::EmptySession { samples: 0 })
    ));
}

#[test]
fn capture_without_pupil_names_the_point() {
    let session = Session::new(config(), Params::default()).unwrap();
    assert_eq!(
        session.arm_calibration_point(0),
        Err(CalibrationError::NotCalibrating)
    );
    session.begin_calibration();
    session.arm_calibration_point(4).unwrap();
    let blank = gaze_heatmap::frame::Frame::new(
        GrayImageU8::filled(64, 48, 200),
        0.0,
        gaze_heatmap::frame::CameraRole::Eye,
    );
    session.process_frame(&blank);
    assert_eq!(
        session.capture_calibration_point(4),
        Err(CalibrationError::NoPupil { index: 4 })
    );
    match session.complete_calibration() {
        Err(CalibrationError::MissingPoints { missing }) => assert_eq!(missing.len(), 9),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!session.is_calibrating());
}

#[test]
fn abort_keeps_previous_model_and_resumes_tracking() {
    let session = Session::new(config(), Params::default()).unwrap();
    calibrate(&session, 0.0);
    let before = session.model().unwrap();

    session.begin_calibration();
    session.arm_calibration_point(0).unwrap();
    let paused = session.process_frame(&eye_frame(pupil_for([0.5, 0.5]), 1.0));
    assert_eq!(paused.outcome, FrameOutcome::Calibrating);
    session.capture_calibration_point(0).unwrap();
    session.abort_calibration().unwrap();

    assert!(Arc::ptr_eq(&before, &session.model().unwrap()));
    let resumed = session.process_frame(&eye_frame(pupil_for([0.5, 0.5]), 1.1));
    assert!(resumed.outcome.produced_sample());
}

#[test]
fn failed_fit_keeps_previous_model() {
    let session = Session::new(config(), Params::default()).unwrap();
    calibrate(&session, 0.0);
    let before = session.model().unwrap();

    // Every target captured at the same gaze: duplicate pupil positions.
    session.begin_calibration();
    for i in 0..9 {
        session.arm_calibration_point(i).unwrap();
        session.process_frame(&eye_frame(pupil_for([0.5, 0.5]), 2.0));
        session.capture_calibration_point(i).unwrap();
    }
    let err = session.complete_calibration().unwrap_err();
    assert!(matches!(err, CalibrationError::Fit(_)), "{err:?}");
    assert!(Arc::ptr_eq(&before, &session.model().unwrap()));
}

#[test]
fn recalibrating_to_another_surface_clears_the_heatmap() {
    let session = Session::new(config(), Params::default()).unwrap();
    calibrate(&session, 0.0);
    session.process_frame(&eye_frame(pupil_for([0.5, 0.5]), 1.0));
    assert_eq!(session.sample_count(), 1);

    session.begin_calibration_for(SurfaceMode::default());
    for (i, target) in grid_targets(0.0).iter().enumerate() {
        session.arm_calibration_point(i).unwrap();
        session.process_frame(&eye_frame(pupil_for(*target), 2.0));
        session.capture_calibration_point(i).unwrap();
    }
    let model = session.complete_calibration().unwrap();
    assert_eq!(model.mode(), SurfaceMode::default());
    assert_eq!(session.sample_count(), 0);
    assert!(session.samples().is_empty());
}

#[test]
fn export_follows_live_smoothing() {
    let store = Arc::new(ParameterStore::default());
    let session = Session::with_store(config(), Arc::clone(&store)).unwrap();
    calibrate(&session, 0.0);
    for i in 0..20 {
        session.process_frame(&eye_frame(pupil_for([0.45, 0.55]), 1.0 + i as f64 * 0.01));
    }

    store.update(|p| p.smoothing = Smoothing::new(0.0));
    let sharp = session.export_snapshot();
    assert_eq!(sharp.smoothing, Smoothing::NONE);
    assert_eq!(sharp.render(), session.render());

    store.update(|p| p.smoothing = Smoothing::new(2.0));
    let soft = session.export_snapshot();
    let doc = soft.json(true).unwrap();
    let mesh = soft.mesh(&MeshOptions::default()).unwrap();
    let live = session.render();
    assert_eq!(doc.metadata.smoothing_sigma_cells, 2.0);
    assert_eq!(doc.gaze_path.len(), 20);
    assert!(doc.metadata.calibration.is_some());
    for (i, v) in live.as_slice().iter().enumerate() {
        assert_eq!(mesh.vertices[i][2], *v);
        assert_eq!(doc.heatmap.values[i / 10][i % 10], *v);
    }
    assert!(live.max() < sharp.render().max());
}

#[test]
fn threaded_capture_with_concurrent_exports() {
    common::init_logging();
    let session = Arc::new(Session::new(config(), Params::default()).unwrap());
    calibrate(&session, 0.0);
    let sync = Arc::new(FrameSync::new(
        FrameSyncConfig {
            eye_capacity: 8,
            ..FrameSyncConfig::default()
        },
        CameraMapping::default(),
    ));

    let producer = {
        let sync = Arc::clone(&sync);
        std::thread::spawn(move || {
            for i in 0..200 {
                let t = 5.0 + i as f64 / 120.0;
                let target = [0.2 + 0.6 * ((i % 40) as f32 / 40.0), 0.5];
                let frame = eye_frame(pupil_for(target), t);
                sync.push(1, frame.image, t);
                sync.push(0, GrayImageU8::filled(16, 16, 0), t + 0.002);
            }
        })
    };
    let exporter = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            for _ in 0..50 {
                let snap = session.export_snapshot();
                let logged = snap.samples.len() as u64;
                assert_eq!(
                    snap.grid.sample_count() + snap.grid.off_surface_count(),
                    logged
                );
                if snap.grid.sample_count() > 0 {
                    let doc = snap.json(false).unwrap();
                    assert_eq!(doc.metadata.total_samples, snap.grid.sample_count());
                }
            }
        })
    };

    let mut reports = Vec::new();
    while !producer.is_finished() {
        reports.extend(session.process_pending(&sync));
        std::thread::yield_now();
    }
    producer.join().unwrap();
    reports.extend(session.process_pending(&sync));
    exporter.join().unwrap();

    let summary = SessionSummary::from_reports(&reports);
    let status = sync.status(10.0);
    assert_eq!(summary.frames + status.eye_dropped, 200);
    assert_eq!(summary.deposited, session.sample_count());
    assert!(reports
        .iter()
        .filter_map(|r| r.scene_skew_s)
        .all(|skew| skew <= FrameSyncConfig::default().max_pair_skew_s));
}
