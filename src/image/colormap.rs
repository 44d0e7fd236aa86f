//! Jet colormap overlay for density grids.
//!
//! The overlay is a visual aid only: it normalizes by the grid maximum and
//! bilinearly resamples to the requested size. Exported meshes never go
//! through this path, they consume the density values directly.
use super::{ImageF32, ImageView};

/// Map `t` in `[0, 1]` to the classic blue→cyan→yellow→red jet ramp.
pub fn jet(t: f32) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |offset: f32| -> u8 {
        let v = 1.5 - (4.0 * t - offset).abs();
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Bilinear sample at continuous cell coordinates (cell centres at `i + 0.5`).
fn sample_bilinear(values: &ImageF32, x: f32, y: f32) -> f32 {
    let fx = (x - 0.5).clamp(0.0, (values.w - 1) as f32);
    let fy = (y - 0.5).clamp(0.0, (values.h - 1) as f32);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(values.w - 1);
    let y1 = (y0 + 1).min(values.h - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;
    let top = values.get(x0, y0) * (1.0 - tx) + values.get(x1, y0) * tx;
    let bottom = values.get(x0, y1) * (1.0 - tx) + values.get(x1, y1) * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Render an RGBA overlay of `width × height` pixels.
///
/// Empty cells are fully transparent; alpha scales with normalized intensity.
pub fn render_overlay(values: &ImageF32, width: usize, height: usize, alpha: f32) -> Vec<[u8; 4]> {
    let mut out = vec![[0u8; 4]; width * height];
    if values.is_empty() || width == 0 || height == 0 {
        return out;
    }
    let max_val = values.max_value();
    if max_val <= 0.0 {
        return out;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let sx = values.w as f32 / width as f32;
    let sy = values.h as f32 / height as f32;
    for (py, row) in out.chunks_mut(width).enumerate() {
        let gy = (py as f32 + 0.5) * sy;
        for (px, pixel) in row.iter_mut().enumerate() {
            let gx = (px as f32 + 0.5) * sx;
            let t = (sample_bilinear(values, gx, gy) / max_val).clamp(0.0, 1.0);
            let [r, g, b] = jet(t);
            *pixel = [r, g, b, (t * alpha * 255.0).round() as u8];
        }
    }
    out
}
