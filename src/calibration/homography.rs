//! Planar projective pupil→surface mapping via the normalized DLT.
use super::normalize::PointNormalization;
use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomographyMapping {
    /// Row-major 3×3 matrix with `h[2][2] == 1` when representable.
    pub h: [[f64; 3]; 3],
}

impl HomographyMapping {
    pub(crate) fn fit(pupils: &[[f64; 2]], targets: &[[f64; 2]]) -> Option<Self> {
        let n = pupils.len();
        if n < 4 || targets.len() != n {
            return None;
        }
        let norm_src = PointNormalization::from_points(pupils)?;
        let norm_dst = PointNormalization::from_points(targets)?;

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for (i, (p, t)) in pupils.iter().zip(targets).enumerate() {
            let [x, y] = norm_src.apply(*p);
            let [u, v] = norm_dst.apply(*t);
            let r0 = 2 * i;
            let r1 = r0 + 1;
            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -1.0;
            a[(r0, 6)] = u * x;
            a[(r0, 7)] = u * y;
            a[(r0, 8)] = u;
            a[(r1, 3)] = -x;
            a[(r1, 4)] = -y;
            a[(r1, 5)] = -1.0;
            a[(r1, 6)] = v * x;
            a[(r1, 7)] = v * y;
            a[(r1, 8)] = v;
        }

        // Null vector of A: right singular vector of the smallest singular value.
        let svd = a.svd(false, true);
        let v_t = svd.v_t?;
        let (min_idx, _) = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|x, y| x.1.total_cmp(y.1))?;
        let h_vec = v_t.row(min_idx);
        let mut h_n = Matrix3::<f64>::zeros();
        for r in 0..3 {
            for c in 0..3 {
                h_n[(r, c)] = h_vec[3 * r + c];
            }
        }
        let t_dst_inv = norm_dst.matrix().try_inverse()?;
        let mut h = t_dst_inv * h_n * norm_src.matrix();
        let scale = h[(2, 2)];
        if scale.abs() > EPS {
            h /= scale;
        }
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = h[(r, c)];
            }
        }
        Some(Self { h: rows })
    }

    /// Projective transfer. Points on the vanishing line are pushed to a
    /// large finite coordinate instead of failing.
    pub(crate) fn apply(&self, pupil: [f64; 2]) -> [f64; 2] {
        let m = Matrix3::from_fn(|r, c| self.h[r][c]);
        let v = m * Vector3::new(pupil[0], pupil[1], 1.0);
        let w = if v[2].abs() < EPS {
            EPS.copysign(v[2])
        } else {
            v[2]
        };
        [v[0] / w, v[1] / w]
    }
}
