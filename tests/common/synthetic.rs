use gaze_heatmap::calibration::{grid_targets, CalibrationPoint, SurfaceMode};
use gaze_heatmap::frame::{CameraRole, Frame};
use gaze_heatmap::image::io::GrayImageU8;
use gaze_heatmap::GazeSample;

pub const EYE_W: usize = 320;
pub const EYE_H: usize = 240;

/// Renders a dark disk pupil on a mid-gray iris with a small corneal glint.
pub fn eye_image(pupil: [f32; 2], radius: f32) -> GrayImageU8 {
    let mut img = GrayImageU8::filled(EYE_W, EYE_H, 170);
    let r2 = radius * radius;
    let glint = [pupil[0] + radius * 0.4, pupil[1] - radius * 0.4];
    for (i, px) in img.data_mut().iter_mut().enumerate() {
        let x = (i % EYE_W) as f32;
        let y = (i / EYE_W) as f32;
        let (dx, dy) = (x - pupil[0], y - pupil[1]);
        let (gx, gy) = (x - glint[0], y - glint[1]);
        if gx * gx + gy * gy <= 2.0 {
            *px = 250;
        } else if dx * dx + dy * dy <= r2 {
            *px = 20;
        }
    }
    img
}

pub fn eye_frame(pupil: [f32; 2], timestamp_s: f64) -> Frame {
    Frame::new(eye_image(pupil, 12.0), timestamp_s, CameraRole::Eye)
}

/// Fixed affine eye model: where the pupil sits when looking at `(u, v)`.
pub fn pupil_for(target: [f32; 2]) -> [f32; 2] {
    [
        100.0 + 120.0 * target[0] + 6.0 * target[1],
        90.0 - 4.0 * target[0] + 70.0 * target[1],
    ]
}

/// Nine points on the unit-square grid through [`pupil_for`].
pub fn calibration_points() -> Vec<CalibrationPoint> {
    grid_targets(0.0)
        .iter()
        .map(|t| CalibrationPoint::new(pupil_for(*t), *t))
        .collect()
}

/// Small deterministic generator for reproducible test data.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_u32() as usize % (i + 1);
            items.swap(i, j);
        }
    }
}

/// Gaze samples scattered over (and slightly beyond) the surface.
pub fn scattered_samples(n: usize, seed: u64, mode: SurfaceMode) -> Vec<GazeSample> {
    let mut rng = Lcg(seed);
    (0..n)
        .map(|i| GazeSample {
            u: rng.next_f32() * 1.2 - 0.1,
            v: rng.next_f32() * 1.2 - 0.1,
            timestamp_s: i as f64 / 60.0,
            confidence: 0.3 + 0.7 * rng.next_f32(),
            mode,
        })
        .collect()
}
