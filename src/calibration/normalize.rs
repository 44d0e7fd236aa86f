use serde::{Deserialize, Serialize};

/// Similarity transform moving points to zero mean and mean distance √2.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointNormalization {
    pub mean: [f64; 2],
    pub scale: f64,
}

impl PointNormalization {
    pub(crate) fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
        let mean_dist = points
            .iter()
            .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
            .sum::<f64>()
            / n;
        if !mean_dist.is_finite() || mean_dist <= 1e-12 {
            return None;
        }
        Some(Self {
            mean: [mx, my],
            scale: std::f64::consts::SQRT_2 / mean_dist,
        })
    }

    #[inline]
    pub(crate) fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [
            (p[0] - self.mean[0]) * self.scale,
            (p[1] - self.mean[1]) * self.scale,
        ]
    }

    /// Homogeneous 3×3 form, row-major.
    pub(crate) fn matrix(&self) -> nalgebra::Matrix3<f64> {
        let s = self.scale;
        nalgebra::Matrix3::new(
            s,
            0.0,
            -s * self.mean[0],
            0.0,
            s,
            -s * self.mean[1],
            0.0,
            0.0,
            1.0,
        )
    }
}
