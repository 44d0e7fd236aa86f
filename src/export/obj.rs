//! ASCII OBJ heightfield.
//!
//! One vertex per grid cell at the cell centre, `z` = rendered density.
//! Grid row 0 is the top of the surface, so `y` decreases with the row index.
//! Each quad of neighbouring cells is split into two triangles wound
//! counter-clockwise when viewed from `+z`.
use crate::heatmap::DensityField;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Coordinate frame of the mesh `x`/`y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshUnits {
    /// `[0, 1]²` normalized surface coordinates.
    #[default]
    Normalized,
    /// Surface unit of the calibration mode (pixels or millimetres).
    Surface,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    pub units: MeshUnits,
    /// Scale heights so the peak sits at this value (relief printing).
    /// `None` keeps `z` equal to the rendered density.
    pub relief_height: Option<f32>,
}

impl MeshOptions {
    pub fn with_units(mut self, units: MeshUnits) -> Self {
        self.units = units;
        self
    }

    pub fn with_relief_height(mut self, height: f32) -> Self {
        self.relief_height = Some(height);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjMesh {
    pub cols: usize,
    pub rows: usize,
    /// Row-major, one per cell.
    pub vertices: Vec<[f32; 3]>,
    /// Zero-based vertex indices.
    pub faces: Vec<[usize; 3]>,
    /// Descriptive header lines, written as `#` comments.
    pub header: Vec<String>,
}

impl ObjMesh {
    pub fn from_field(field: &DensityField, options: &MeshOptions) -> Self {
        let (cols, rows) = (field.cols(), field.rows());
        let [sx, sy] = match options.units {
            MeshUnits::Normalized => [1.0, 1.0],
            MeshUnits::Surface => field.mode.extent(),
        };
        let z_scale = match options.relief_height {
            Some(height) if field.max() > 0.0 => height / field.max(),
            _ => 1.0,
        };

        let mut vertices = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            let y = 1.0 - (row as f32 + 0.5) / rows as f32;
            for col in 0..cols {
                let x = (col as f32 + 0.5) / cols as f32;
                vertices.push([x * sx, y * sy, field.get(col, row) * z_scale]);
            }
        }

        let vid = |row: usize, col: usize| row * cols + col;
        let mut faces = Vec::with_capacity(2 * cols.saturating_sub(1) * rows.saturating_sub(1));
        for row in 0..rows.saturating_sub(1) {
            for col in 0..cols.saturating_sub(1) {
                let top_left = vid(row, col);
                let top_right = vid(row, col + 1);
                let bottom_left = vid(row + 1, col);
                let bottom_right = vid(row + 1, col + 1);
                faces.push([top_left, bottom_left, bottom_right]);
                faces.push([top_left, bottom_right, top_right]);
            }
        }

        let [w, h] = field.mode.extent();
        let header = vec![
            "heightfield generated from gaze heatmap".to_string(),
            format!(
                "surface: {} {}x{} {}",
                field.mode.tag(),
                w,
                h,
                field.mode.unit()
            ),
            format!(
                "grid: {}x{} cells, smoothing sigma {} cells, {} samples",
                cols, rows, field.smoothing.sigma_cells, field.samples
            ),
        ];

        Self {
            cols,
            rows,
            vertices,
            faces,
            header,
        }
    }

    pub fn write_obj<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.header {
            writeln!(out, "# {line}")?;
        }
        for [x, y, z] in &self.vertices {
            writeln!(out, "v {x} {y} {z}")?;
        }
        for [a, b, c] in &self.faces {
            writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
        Ok(())
    }

    pub fn to_obj(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_obj(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
