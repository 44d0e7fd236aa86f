//! Temporal accumulation of gaze samples into a fixed-resolution grid.
//!
//! Mass is kept as fixed-point `u64` in units of `2^-16`. Integer addition is
//! commutative and associative, so any permutation of the same samples
//! produces a bit-identical grid. Smoothing is applied only when a
//! [`DensityField`] is rendered; the grid itself stays raw.

mod blur;

pub use blur::{gaussian_blur, gaussian_taps};

use crate::calibration::SurfaceMode;
use crate::error::HeatmapError;
use crate::gaze::GazeSample;
use crate::image::ImageF32;
use log::debug;
use serde::{Deserialize, Serialize};

/// Fixed-point scale of one unit of deposited mass.
pub const MASS_SCALE: u64 = 1 << 16;

/// Gaussian smoothing radius shared by the live view and every export.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoothing {
    /// Standard deviation in grid cells; `0` disables smoothing.
    pub sigma_cells: f32,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self { sigma_cells: 1.5 }
    }
}

impl Smoothing {
    pub const NONE: Smoothing = Smoothing { sigma_cells: 0.0 };

    pub fn new(sigma_cells: f32) -> Self {
        let sigma_cells = if sigma_cells.is_finite() {
            sigma_cells.max(0.0)
        } else {
            0.0
        };
        Self { sigma_cells }
    }

    /// Kernel half-width in cells.
    pub fn radius(&self) -> usize {
        gaussian_taps(self.sigma_cells).len() / 2
    }
}

/// Mass contributed by one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositWeight {
    /// Every on-surface sample deposits one unit.
    Unit,
    /// Samples deposit their detection confidence.
    #[default]
    Confidence,
}

/// Outcome of one accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deposit {
    Deposited { col: usize, row: usize },
    /// Gaze left the surface; counted but not binned.
    OffSurface,
}

/// Counts produced by [`HeatmapGrid::replay`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub deposited: u64,
    pub off_surface: u64,
    pub rejected: u64,
}

/// Raw accumulated gaze mass over the surface.
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapGrid {
    cols: usize,
    rows: usize,
    mode: SurfaceMode,
    weight: DepositWeight,
    mass: Vec<u64>,
    deposited: u64,
    off_surface: u64,
}

impl HeatmapGrid {
    pub fn new(cols: usize, rows: usize, mode: SurfaceMode) -> Result<Self, HeatmapError> {
        if cols == 0 || rows == 0 {
            return Err(HeatmapError::EmptyGrid { cols, rows });
        }
        Ok(Self {
            cols,
            rows,
            mode,
            weight: DepositWeight::default(),
            mass: vec![0; cols * rows],
            deposited: 0,
            off_surface: 0,
        })
    }

    pub fn with_weight(mut self, weight: DepositWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub fn weight(&self) -> DepositWeight {
        self.weight
    }

    /// Samples binned into a cell.
    pub fn sample_count(&self) -> u64 {
        self.deposited
    }

    pub fn off_surface_count(&self) -> u64 {
        self.off_surface
    }

    /// Cell width and height in the surface unit.
    pub fn cell_size(&self) -> [f32; 2] {
        let [w, h] = self.mode.extent();
        [w / self.cols as f32, h / self.rows as f32]
    }

    /// Nearest cell for normalized `(u, v)`, `None` off the surface.
    /// The far edge `u == 1` belongs to the last column.
    pub fn cell_of(&self, u: f32, v: f32) -> Option<(usize, usize)> {
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        let col = ((u * self.cols as f32) as usize).min(self.cols - 1);
        let row = ((v * self.rows as f32) as usize).min(self.rows - 1);
        Some((col, row))
    }

    /// Accumulated mass at a cell, in sample units.
    pub fn mass(&self, col: usize, row: usize) -> f64 {
        self.mass
            .get(row * self.cols + col)
            .map_or(0.0, |&m| m as f64 / MASS_SCALE as f64)
    }

    /// Fixed-point mass, row-major.
    pub fn raw_mass(&self) -> &[u64] {
        &self.mass
    }

    fn fixed_weight(&self, sample: &GazeSample) -> u64 {
        let w = match self.weight {
            DepositWeight::Unit => 1.0,
            DepositWeight::Confidence => sample.confidence.clamp(0.0, 1.0) as f64,
        };
        (w * MASS_SCALE as f64).round() as u64
    }

    pub fn accumulate(&mut self, sample: &GazeSample) -> Result<Deposit, HeatmapError> {
        if sample.mode != self.mode {
            return Err(HeatmapError::ModeMismatch {
                sample: sample.mode.tag(),
                grid: self.mode.tag(),
            });
        }
        let Some((col, row)) = self.cell_of(sample.u, sample.v) else {
            self.off_surface += 1;
            return Ok(Deposit::OffSurface);
        };
        let add = self.fixed_weight(sample);
        let cell = &mut self.mass[row * self.cols + col];
        *cell = cell.saturating_add(add);
        self.deposited += 1;
        Ok(Deposit::Deposited { col, row })
    }

    /// Rebuild the grid from a recorded sample sequence. Samples of another
    /// surface mode are skipped and counted as rejected.
    pub fn replay<'a, I>(&mut self, samples: I) -> ReplayStats
    where
        I: IntoIterator<Item = &'a GazeSample>,
    {
        self.reset();
        let mut stats = ReplayStats::default();
        for sample in samples {
            match self.accumulate(sample) {
                Ok(Deposit::Deposited { .. }) => stats.deposited += 1,
                Ok(Deposit::OffSurface) => stats.off_surface += 1,
                Err(_) => stats.rejected += 1,
            }
        }
        debug!(
            "heatmap replay: {} deposited, {} off-surface, {} rejected",
            stats.deposited, stats.off_surface, stats.rejected
        );
        stats
    }

    /// Clear all mass and counters, keeping the resolution and mode.
    pub fn reset(&mut self) {
        self.mass.iter_mut().for_each(|m| *m = 0);
        self.deposited = 0;
        self.off_surface = 0;
    }

    /// Switch to another surface mode. Mass from a different surface cannot
    /// be reinterpreted, so the grid is cleared when the mode changes.
    pub fn set_mode(&mut self, mode: SurfaceMode) {
        if mode != self.mode {
            debug!("heatmap mode {} -> {}, clearing", self.mode.tag(), mode.tag());
            self.mode = mode;
            self.reset();
        }
    }

    /// Raw mass as `f32`, no smoothing.
    fn raw_field(&self) -> ImageF32 {
        let data = self
            .mass
            .iter()
            .map(|&m| (m as f64 / MASS_SCALE as f64) as f32)
            .collect();
        ImageF32 {
            w: self.cols,
            h: self.rows,
            stride: self.cols,
            data,
        }
    }

    /// Density field for display and export. Pure: the grid is not modified
    /// and equal inputs give bit-identical output.
    pub fn render(&self, smoothing: Smoothing) -> DensityField {
        let raw = self.raw_field();
        let values = if smoothing.sigma_cells > 0.0 {
            gaussian_blur(&raw, smoothing.sigma_cells)
        } else {
            raw
        };
        DensityField {
            values,
            smoothing,
            mode: self.mode,
            samples: self.deposited,
        }
    }
}

/// Smoothed (or raw) density, as shown live and as exported.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    pub values: ImageF32,
    pub smoothing: Smoothing,
    pub mode: SurfaceMode,
    /// Samples that contributed mass.
    pub samples: u64,
}

impl DensityField {
    pub fn cols(&self) -> usize {
        self.values.w
    }

    pub fn rows(&self) -> usize {
        self.values.h
    }

    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.values.get(col, row)
    }

    pub fn max(&self) -> f32 {
        self.values.max_value()
    }

    pub fn total(&self) -> f64 {
        self.values.data.iter().map(|&v| v as f64).sum()
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values.data
    }

    /// Copy scaled to `[0, 1]`; an all-zero field stays zero.
    pub fn normalized(&self) -> ImageF32 {
        let max = self.max();
        let mut out = self.values.clone();
        if max > 0.0 {
            out.data.iter_mut().for_each(|v| *v /= max);
        }
        out
    }
}

#[cfg(test)]
mod tests;
