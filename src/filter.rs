//! Optional jitter filter between pupil detection and gaze projection.
//!
//! Detection is frame-independent and therefore noisy. This stage smooths
//! the pupil centre over time with one of three explicit filters. It only
//! sees frames where a pupil was found; misses neither advance nor reset it,
//! and it never invents positions for missing frames.
use crate::pupil::PupilCandidate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;

/// Filter selection and its knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterParams {
    /// Pass detections through untouched.
    #[default]
    None,
    /// `y = alpha * x + (1 - alpha) * y_prev`.
    Exponential { alpha: f32 },
    /// Speed-adaptive low-pass (One Euro filter), cut-offs in Hz.
    OneEuro {
        min_cutoff: f32,
        beta: f32,
        d_cutoff: f32,
    },
    /// Per-axis median over the last `window` detections.
    Median { window: usize },
}

impl FilterParams {
    /// Cut-offs used by the original desktop tool: strong smoothing at rest,
    /// little lag on saccades.
    pub fn one_euro_default() -> Self {
        FilterParams::OneEuro {
            min_cutoff: 0.5,
            beta: 0.1,
            d_cutoff: 1.0,
        }
    }
}

/// Timestamp-driven One Euro filter for one scalar channel.
#[derive(Clone, Debug)]
struct OneEuro {
    min_cutoff: f64,
    beta: f64,
    d_cutoff: f64,
    t_prev: f64,
    x_prev: f64,
    dx_prev: f64,
}

impl OneEuro {
    fn new(t0: f64, x0: f64, min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff: min_cutoff.max(1e-3) as f64,
            beta: beta.max(0.0) as f64,
            d_cutoff: d_cutoff.max(1e-3) as f64,
            t_prev: t0,
            x_prev: x0,
            dx_prev: 0.0,
        }
    }

    fn smoothing_factor(dt: f64, cutoff: f64) -> f64 {
        let r = 2.0 * PI * cutoff * dt;
        r / (r + 1.0)
    }

    fn filter(&mut self, t: f64, x: f64) -> f64 {
        let dt = t - self.t_prev;
        if dt <= 0.0 {
            // Out-of-order or duplicate timestamp: hold the estimate.
            return self.x_prev;
        }
        let dx = (x - self.x_prev) / dt;
        let a_d = Self::smoothing_factor(dt, self.d_cutoff);
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;
        let cutoff = self.min_cutoff + self.beta * dx_hat.abs();
        let a = Self::smoothing_factor(dt, cutoff);
        let x_hat = a * x + (1.0 - a) * self.x_prev;
        self.t_prev = t;
        self.x_prev = x_hat;
        self.dx_prev = dx_hat;
        x_hat
    }
}

#[derive(Clone, Debug)]
enum FilterState {
    Empty,
    Exponential([f32; 2]),
    OneEuro([OneEuro; 2]),
    Median(VecDeque<[f32; 2]>),
}

/// Stateful jitter filter over pupil centres.
#[derive(Clone, Debug)]
pub struct JitterFilter {
    params: FilterParams,
    state: FilterState,
}

impl JitterFilter {
    pub fn new(params: FilterParams) -> Self {
        Self {
            params,
            state: FilterState::Empty,
        }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Swap parameters; the filter restarts when they actually change.
    pub fn set_params(&mut self, params: &FilterParams) {
        if &self.params != params {
            self.params = params.clone();
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.state = FilterState::Empty;
    }

    /// Filter one detected centre observed at `t` seconds.
    pub fn apply(&mut self, center: [f32; 2], t: f64) -> [f32; 2] {
        match (&self.params, &mut self.state) {
            (FilterParams::None, _) => center,
            (FilterParams::Exponential { alpha }, FilterState::Exponential(prev)) => {
                let a = alpha.clamp(0.0, 1.0);
                *prev = [
                    a * center[0] + (1.0 - a) * prev[0],
                    a * center[1] + (1.0 - a) * prev[1],
                ];
                *prev
            }
            (FilterParams::Exponential { .. }, state) => {
                *state = FilterState::Exponential(center);
                center
            }
            (FilterParams::OneEuro { .. }, FilterState::OneEuro(axes)) => {
                let x = axes[0].filter(t, center[0] as f64);
                let y = axes[1].filter(t, center[1] as f64);
                [x as f32, y as f32]
            }
            (
                FilterParams::OneEuro {
                    min_cutoff,
                    beta,
                    d_cutoff,
                },
                state,
            ) => {
                *state = FilterState::OneEuro([
                    OneEuro::new(t, center[0] as f64, *min_cutoff, *beta, *d_cutoff),
                    OneEuro::new(t, center[1] as f64, *min_cutoff, *beta, *d_cutoff),
                ]);
                center
            }
            (FilterParams::Median { window }, state) => {
                let window = (*window).max(1);
                if !matches!(state, FilterState::Median(_)) {
                    *state = FilterState::Median(VecDeque::with_capacity(window));
                }
                let FilterState::Median(history) = state else {
                    return center;
                };
                history.push_back(center);
                while history.len() > window {
                    history.pop_front();
                }
                [
                    median(history.iter().map(|c| c[0])),
                    median(history.iter().map(|c| c[1])),
                ]
            }
        }
    }

    /// Filtered copy of `candidate`; shape and score are kept.
    pub fn apply_candidate(&mut self, candidate: &PupilCandidate, t: f64) -> PupilCandidate {
        PupilCandidate {
            center: self.apply(candidate.center, t),
            ..candidate.clone()
        }
    }
}

fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut v: Vec<f32> = values.collect();
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        0.5 * (v[mid - 1] + v[mid])
    } else {
        v[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_disabled() {
        let mut f = JitterFilter::new(FilterParams::None);
        assert_eq!(f.apply([3.0, 4.0], 0.0), [3.0, 4.0]);
        assert_eq!(f.apply([7.0, 1.0], 0.1), [7.0, 1.0]);
    }

    #[test]
    fn exponential_moves_fractionally() {
        let mut f = JitterFilter::new(FilterParams::Exponential { alpha: 0.25 });
        assert_eq!(f.apply([0.0, 0.0], 0.0), [0.0, 0.0]);
        let out = f.apply([4.0, 8.0], 0.1);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn one_euro_converges_on_constant_input() {
        let mut f = JitterFilter::new(FilterParams::one_euro_default());
        f.apply([0.0, 0.0], 0.0);
        let mut out = [0.0, 0.0];
        for i in 1..600 {
            out = f.apply([10.0, -5.0], i as f64 / 60.0);
        }
        assert!((out[0] - 10.0).abs() < 0.05, "x={}", out[0]);
        assert!((out[1] + 5.0).abs() < 0.05, "y={}", out[1]);
    }

    #[test]
    fn one_euro_holds_on_repeated_timestamp() {
        let mut f = JitterFilter::new(FilterParams::one_euro_default());
        f.apply([1.0, 1.0], 1.0);
        assert_eq!(f.apply([50.0, 50.0], 1.0), [1.0, 1.0]);
    }

    #[test]
    fn median_rejects_single_outlier() {
        let mut f = JitterFilter::new(FilterParams::Median { window: 3 });
        f.apply([1.0, 1.0], 0.0);
        f.apply([1.2, 0.9], 0.1);
        let out = f.apply([40.0, -30.0], 0.2);
        assert!((out[0] - 1.2).abs() < 1e-6);
        assert!((out[1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn changing_params_restarts_state() {
        let mut f = JitterFilter::new(FilterParams::Exponential { alpha: 0.1 });
        f.apply([0.0, 0.0], 0.0);
        f.set_params(&FilterParams::Exponential { alpha: 0.5 });
        assert_eq!(f.apply([9.0, 9.0], 0.1), [9.0, 9.0]);
    }
}
