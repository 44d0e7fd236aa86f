//! Connected foreground regions with running moments.
//!
//! Region growing uses an explicit stack over 8-connected neighbours and
//! accumulates first and second moments on the fly, so a region's centroid
//! and equivalent ellipse are available without a second pass.
use crate::image::{ImageU8, ImageView};
use nalgebra::{Matrix2, SymmetricEigen};

const NEIGH_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

pub(crate) struct RegionAccumulator {
    pub count: usize,
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_xx: f64,
    pub sum_yy: f64,
    pub sum_xy: f64,
}

impl RegionAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn push(&mut self, x: usize, y: usize) {
        let xf = x as f64;
        let yf = y as f64;
        self.count += 1;
        self.sum_x += xf;
        self.sum_y += yf;
        self.sum_xx += xf * xf;
        self.sum_yy += yf * yf;
        self.sum_xy += xf * yf;
    }

    /// Centroid and the equivalent ellipse of the region.
    pub(crate) fn shape(&self) -> Option<RegionShape> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let cx = self.sum_x / n;
        let cy = self.sum_y / n;
        let cxx = (self.sum_xx / n - cx * cx).max(0.0);
        let cyy = (self.sum_yy / n - cy * cy).max(0.0);
        let cxy = self.sum_xy / n - cx * cy;
        let eig = SymmetricEigen::new(Matrix2::new(cxx, cxy, cxy, cyy));
        let (major_idx, minor_idx) = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
            (0, 1)
        } else {
            (1, 0)
        };
        let lambda_major = eig.eigenvalues[major_idx].max(0.0);
        let lambda_minor = eig.eigenvalues[minor_idx].max(0.0);
        let dir = eig.eigenvectors.column(major_idx);
        let angle_deg = dir[1].atan2(dir[0]).to_degrees().rem_euclid(180.0);
        Some(RegionShape {
            area: self.count,
            center: [cx, cy],
            // A filled ellipse with semi-axis `a` has variance a²/4 along it.
            major: 4.0 * lambda_major.sqrt(),
            minor: 4.0 * lambda_minor.sqrt(),
            angle_deg,
        })
    }
}

/// Centroid, pixel area and full axis lengths of a region.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RegionShape {
    pub area: usize,
    pub center: [f64; 2],
    pub major: f64,
    pub minor: f64,
    pub angle_deg: f64,
}

impl RegionShape {
    /// Minor over major axis, `0` for line-like regions.
    pub(crate) fn aspect_ratio(&self) -> f64 {
        if self.major <= f64::EPSILON {
            0.0
        } else {
            self.minor / self.major
        }
    }

    /// Pixel area over the area of the equivalent ellipse.
    pub(crate) fn fill_ratio(&self) -> f64 {
        let ellipse_area = std::f64::consts::FRAC_PI_4 * self.major * self.minor;
        if ellipse_area <= f64::EPSILON {
            0.0
        } else {
            self.area as f64 / ellipse_area
        }
    }
}

/// Reusable buffers for region extraction.
#[derive(Default)]
pub(crate) struct RegionWorkspace {
    mask: Vec<u8>,
    stack: Vec<usize>,
}

impl RegionWorkspace {
    /// Binarize `frame` and return the shape of every 8-connected foreground
    /// region. `invert = false` marks pixels darker than `threshold`.
    pub(crate) fn extract(
        &mut self,
        frame: &ImageU8<'_>,
        threshold: u8,
        invert: bool,
    ) -> Vec<RegionShape> {
        let (w, h) = (frame.width(), frame.height());
        self.binarize(frame, threshold, invert);
        let mut regions = Vec::new();
        let mut acc = RegionAccumulator::new();
        for seed in 0..w * h {
            if self.mask[seed] != 1 {
                continue;
            }
            acc.reset();
            self.stack.clear();
            self.mask[seed] = 2;
            self.stack.push(seed);
            while let Some(idx) = self.stack.pop() {
                let x = idx % w;
                let y = idx / w;
                acc.push(x, y);
                for (dx, dy) in NEIGH_OFFSETS {
                    let xn = x as isize + dx;
                    let yn = y as isize + dy;
                    if xn < 0 || yn < 0 || xn >= w as isize || yn >= h as isize {
                        continue;
                    }
                    let n_idx = yn as usize * w + xn as usize;
                    if self.mask[n_idx] == 1 {
                        self.mask[n_idx] = 2;
                        self.stack.push(n_idx);
                    }
                }
            }
            if let Some(shape) = acc.shape() {
                regions.push(shape);
            }
        }
        regions
    }

    /// Number of foreground pixels after the last `extract` call.
    pub(crate) fn foreground_pixels(&self) -> usize {
        self.mask.iter().filter(|&&m| m != 0).count()
    }

    fn binarize(&mut self, frame: &ImageU8<'_>, threshold: u8, invert: bool) {
        let (w, h) = (frame.width(), frame.height());
        self.mask.clear();
        self.mask.resize(w * h, 0);
        for (y, row) in frame.rows().enumerate() {
            let dst = &mut self.mask[y * w..(y + 1) * w];
            for (m, &px) in dst.iter_mut().zip(row) {
                let fg = if invert { px > threshold } else { px < threshold };
                *m = fg as u8;
            }
        }
    }
}
