//! Separable Gaussian smoothing of density grids.
//!
//! Taps are sampled from a Gaussian with `sigma` in cells, truncated at
//! `ceil(3σ)` and normalized to sum to one. Borders clamp to the edge cell,
//! so taps reaching past the longer grid side only repeat edge cells; the
//! radius is capped there.
//! Both passes write whole output rows in parallel; each output cell is
//! summed in the same tap order on every call, so results are bit-exact
//! across runs and thread counts.
use crate::image::{ImageF32, ImageView};
use rayon::prelude::*;

/// Longest half-width any kernel gets, whatever the grid.
pub const MAX_TAP_RADIUS: usize = 4096;

/// Normalized 1D Gaussian taps, `2 * ceil(3σ) + 1` long, at most
/// `2 * MAX_TAP_RADIUS + 1`.
///
/// Returns a single unit tap for `sigma <= 0` or non-finite sigma.
pub fn gaussian_taps(sigma: f32) -> Vec<f32> {
    truncated_taps(sigma, MAX_TAP_RADIUS)
}

fn truncated_taps(sigma: f32, max_radius: usize) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }
    let max_radius = max_radius.min(MAX_TAP_RADIUS);
    let full = (3.0 * sigma as f64).ceil();
    let radius = if full >= max_radius as f64 {
        max_radius
    } else {
        full as usize
    } as isize;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let raw: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|v| (v / sum) as f32).collect()
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

fn filter_row(src: &[f32], dst: &mut [f32], taps: &[f32]) {
    let radius = (taps.len() / 2) as isize;
    let len = src.len();
    for (x, out) in dst.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, &t) in taps.iter().enumerate() {
            let sx = clamp_index(x as isize + k as isize - radius, len);
            acc += src[sx] * t;
        }
        *out = acc;
    }
}

/// Smooth `src` with a separable Gaussian. `sigma <= 0` returns a copy.
pub fn gaussian_blur(src: &ImageF32, sigma: f32) -> ImageF32 {
    let taps = truncated_taps(sigma, src.w.max(src.h));
    if taps.len() == 1 || src.is_empty() {
        return src.clone();
    }
    let (w, h) = (src.w, src.h);

    let mut horiz = ImageF32::new(w, h);
    horiz
        .data
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, dst)| filter_row(src.row(y), dst, &taps));

    let radius = (taps.len() / 2) as isize;
    let mut out = ImageF32::new(w, h);
    out.data
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, dst)| {
            for (k, &t) in taps.iter().enumerate() {
                let sy = clamp_index(y as isize + k as isize - radius, h);
                for (o, s) in dst.iter_mut().zip(horiz.row(sy)) {
                    *o += s * t;
                }
            }
        });
    out
}
