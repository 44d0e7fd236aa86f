//! Second-order polynomial pupil→surface regression.
//!
//! Each surface axis is modelled as
//! `c0 + c1·x + c2·y + c3·x·y + c4·x² + c5·y²` over Hartley-normalized pupil
//! coordinates and solved by ridge-regularized least squares. Normalization
//! keeps the normal equations well conditioned for pupil positions in the
//! hundreds of pixels.
use super::normalize::PointNormalization;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub(crate) const TERMS: usize = 6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadraticMapping {
    pub normalization: PointNormalization,
    pub coeffs_u: [f64; TERMS],
    pub coeffs_v: [f64; TERMS],
}

#[inline]
fn features(p: [f64; 2]) -> [f64; TERMS] {
    let [x, y] = p;
    [1.0, x, y, x * y, x * x, y * y]
}

impl QuadraticMapping {
    /// Least-squares fit; `None` when the regularized system is not positive
    /// definite.
    pub(crate) fn fit(pupils: &[[f64; 2]], targets: &[[f64; 2]], ridge: f64) -> Option<Self> {
        let normalization = PointNormalization::from_points(pupils)?;
        let n = pupils.len();
        let mut design = DMatrix::<f64>::zeros(n, TERMS);
        let mut wu = DVector::<f64>::zeros(n);
        let mut wv = DVector::<f64>::zeros(n);
        for (i, (p, t)) in pupils.iter().zip(targets).enumerate() {
            let f = features(normalization.apply(*p));
            for (j, v) in f.iter().enumerate() {
                design[(i, j)] = *v;
            }
            wu[i] = t[0];
            wv[i] = t[1];
        }
        let xt = design.transpose();
        let mut normal = &xt * &design;
        for d in 0..TERMS {
            normal[(d, d)] += ridge.max(0.0);
        }
        let chol = normal.cholesky()?;
        let cu = chol.solve(&(&xt * wu));
        let cv = chol.solve(&(&xt * wv));
        let mut coeffs_u = [0.0; TERMS];
        let mut coeffs_v = [0.0; TERMS];
        for j in 0..TERMS {
            coeffs_u[j] = cu[j];
            coeffs_v[j] = cv[j];
        }
        if coeffs_u.iter().chain(&coeffs_v).any(|c| !c.is_finite()) {
            return None;
        }
        Some(Self {
            normalization,
            coeffs_u,
            coeffs_v,
        })
    }

    pub(crate) fn apply(&self, pupil: [f64; 2]) -> [f64; 2] {
        let f = features(self.normalization.apply(pupil));
        let dot = |c: &[f64; TERMS]| f.iter().zip(c).map(|(a, b)| a * b).sum::<f64>();
        [dot(&self.coeffs_u), dot(&self.coeffs_v)]
    }
}
