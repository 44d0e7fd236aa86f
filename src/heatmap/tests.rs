use super::*;

fn plane() -> SurfaceMode {
    SurfaceMode::default()
}

fn sample(u: f32, v: f32, confidence: f32) -> GazeSample {
    GazeSample {
        u,
        v,
        timestamp_s: 0.0,
        confidence,
        mode: plane(),
    }
}

#[test]
fn zero_sized_grid_is_rejected() {
    assert_eq!(
        HeatmapGrid::new(0, 4, plane()),
        Err(HeatmapError::EmptyGrid { cols: 0, rows: 4 })
    );
}

#[test]
fn deposits_into_nearest_cell() {
    let mut grid = HeatmapGrid::new(10, 5, plane()).unwrap();
    assert_eq!(
        grid.accumulate(&sample(0.25, 0.5, 1.0)),
        Ok(Deposit::Deposited { col: 2, row: 2 })
    );
    assert_eq!(
        grid.accumulate(&sample(1.0, 1.0, 0.5)),
        Ok(Deposit::Deposited { col: 9, row: 4 })
    );
    assert_eq!(grid.mass(2, 2), 1.0);
    assert_eq!(grid.mass(9, 4), 0.5);
    assert_eq!(grid.sample_count(), 2);
}

#[test]
fn off_surface_is_counted_not_binned() {
    let mut grid = HeatmapGrid::new(4, 4, plane()).unwrap();
    assert_eq!(grid.accumulate(&sample(1.2, 0.5, 1.0)), Ok(Deposit::OffSurface));
    assert_eq!(grid.accumulate(&sample(0.5, -0.01, 1.0)), Ok(Deposit::OffSurface));
    assert_eq!(grid.sample_count(), 0);
    assert_eq!(grid.off_surface_count(), 2);
    assert!(grid.raw_mass().iter().all(|&m| m == 0));
}

#[test]
fn mode_mismatch_is_rejected() {
    let mut grid = HeatmapGrid::new(4, 4, plane()).unwrap();
    let mut s = sample(0.5, 0.5, 1.0);
    s.mode = SurfaceMode::Screen {
        width_px: 1920.0,
        height_px: 1080.0,
    };
    assert_eq!(
        grid.accumulate(&s),
        Err(HeatmapError::ModeMismatch {
            sample: "screen",
            grid: "plane"
        })
    );
    assert_eq!(grid.sample_count(), 0);
}

#[test]
fn unit_weight_ignores_confidence() {
    let mut grid = HeatmapGrid::new(2, 2, plane())
        .unwrap()
        .with_weight(DepositWeight::Unit);
    grid.accumulate(&sample(0.1, 0.1, 0.2)).unwrap();
    assert_eq!(grid.mass(0, 0), 1.0);
}

#[test]
fn render_without_smoothing_is_raw() {
    let mut grid = HeatmapGrid::new(3, 3, plane()).unwrap();
    grid.accumulate(&sample(0.5, 0.5, 0.75)).unwrap();
    let field = grid.render(Smoothing::NONE);
    assert_eq!(field.get(1, 1), 0.75);
    assert_eq!(field.total(), 0.75);
    assert_eq!(field.samples, 1);
}

#[test]
fn render_is_pure() {
    let mut grid = HeatmapGrid::new(16, 9, plane()).unwrap();
    for i in 0..40 {
        let t = i as f32 / 40.0;
        grid.accumulate(&sample(t, 1.0 - t, 0.9)).unwrap();
    }
    let before = grid.clone();
    let a = grid.render(Smoothing::new(2.0));
    let b = grid.render(Smoothing::new(2.0));
    assert_eq!(a, b);
    assert_eq!(grid, before);
}

#[test]
fn replay_resets_and_counts() {
    let mut grid = HeatmapGrid::new(4, 4, plane()).unwrap();
    grid.accumulate(&sample(0.1, 0.1, 1.0)).unwrap();
    let mut foreign = sample(0.5, 0.5, 1.0);
    foreign.mode = SurfaceMode::Screen {
        width_px: 800.0,
        height_px: 600.0,
    };
    let log = vec![sample(0.5, 0.5, 1.0), sample(2.0, 0.5, 1.0), foreign];
    let stats = grid.replay(&log);
    assert_eq!(
        stats,
        ReplayStats {
            deposited: 1,
            off_surface: 1,
            rejected: 1
        }
    );
    assert_eq!(grid.mass(0, 0), 0.0);
    assert_eq!(grid.mass(2, 2), 1.0);
}

#[test]
fn mode_change_clears_grid() {
    let mut grid = HeatmapGrid::new(4, 4, plane()).unwrap();
    grid.accumulate(&sample(0.1, 0.1, 1.0)).unwrap();
    grid.set_mode(plane());
    assert_eq!(grid.sample_count(), 1);
    grid.set_mode(SurfaceMode::Screen {
        width_px: 800.0,
        height_px: 600.0,
    });
    assert_eq!(grid.sample_count(), 0);
    assert_eq!(grid.cell_size(), [200.0, 150.0]);
}

#[test]
fn normalized_field_peaks_at_one() {
    let mut grid = HeatmapGrid::new(8, 8, plane()).unwrap();
    grid.accumulate(&sample(0.5, 0.5, 1.0)).unwrap();
    grid.accumulate(&sample(0.5, 0.5, 1.0)).unwrap();
    let n = grid.render(Smoothing::new(1.0)).normalized();
    assert!((n.max_value() - 1.0).abs() < 1e-6);
    let empty = HeatmapGrid::new(8, 8, plane()).unwrap();
    assert_eq!(empty.render(Smoothing::default()).normalized().max_value(), 0.0);
}

#[test]
fn render_survives_enormous_smoothing() {
    let mut grid = HeatmapGrid::new(8, 6, plane()).unwrap();
    grid.accumulate(&sample(0.3, 0.6, 1.0)).unwrap();
    let field = grid.render(Smoothing::new(1e20));
    assert_eq!((field.cols(), field.rows()), (8, 6));
    assert!(field.as_slice().iter().all(|v| v.is_finite()));
    assert!(field.max() > 0.0);
}
