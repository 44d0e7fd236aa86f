//! Congruent export of the accumulated heatmap.
//!
//! Every exporter renders the grid through [`HeatmapGrid::render`] with the
//! smoothing it is handed, the same call that drives the live view. Given the
//! same grid and smoothing, the OBJ heights, the JSON values and the on-screen
//! field are the same numbers.
//!
//! An empty session is an error, not an empty file: writers check the sample
//! count before touching the filesystem.

mod ntopology;
mod obj;

pub use ntopology::{
    CalibrationSummary, ExportMeta, GazePathPoint, HeatmapSection, Metadata, NTopologyDocument,
};
pub use obj::{MeshOptions, MeshUnits, ObjMesh};

use crate::error::ExportError;
use crate::heatmap::{DensityField, HeatmapGrid, Smoothing};
use crate::image::io::ensure_parent_dir;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn render_nonempty(grid: &HeatmapGrid, smoothing: Smoothing) -> Result<DensityField, ExportError> {
    let samples = grid.sample_count();
    if samples == 0 {
        return Err(ExportError::EmptySession { samples });
    }
    Ok(grid.render(smoothing))
}

/// Heightfield mesh of the rendered density.
pub fn export_mesh(
    grid: &HeatmapGrid,
    smoothing: Smoothing,
    options: &MeshOptions,
) -> Result<ObjMesh, ExportError> {
    let field = render_nonempty(grid, smoothing)?;
    Ok(ObjMesh::from_field(&field, options))
}

/// nTopology density-grid document of the rendered density.
pub fn export_json(
    grid: &HeatmapGrid,
    smoothing: Smoothing,
    meta: &ExportMeta<'_>,
) -> Result<NTopologyDocument, ExportError> {
    let field = render_nonempty(grid, smoothing)?;
    Ok(NTopologyDocument::from_field(
        &field,
        grid.off_surface_count(),
        meta,
    ))
}

fn create_file(path: &Path) -> Result<BufWriter<File>, ExportError> {
    ensure_parent_dir(path).map_err(ExportError::Io)?;
    Ok(BufWriter::new(File::create(path)?))
}

/// Render, then write an ASCII OBJ to `path`.
pub fn write_mesh(
    grid: &HeatmapGrid,
    smoothing: Smoothing,
    options: &MeshOptions,
    path: &Path,
) -> Result<ObjMesh, ExportError> {
    let mesh = export_mesh(grid, smoothing, options)?;
    let mut out = create_file(path)?;
    mesh.write_obj(&mut out)?;
    out.flush()?;
    info!(
        "OBJ heightfield {}x{} ({} faces) written to {}",
        mesh.cols,
        mesh.rows,
        mesh.faces.len(),
        path.display()
    );
    Ok(mesh)
}

/// Render, then write the nTopology JSON document to `path`.
pub fn write_json(
    grid: &HeatmapGrid,
    smoothing: Smoothing,
    meta: &ExportMeta<'_>,
    path: &Path,
) -> Result<NTopologyDocument, ExportError> {
    let doc = export_json(grid, smoothing, meta)?;
    let mut out = create_file(path)?;
    serde_json::to_writer_pretty(&mut out, &doc)?;
    out.flush()?;
    info!(
        "nTopology JSON ({} samples) written to {}",
        doc.metadata.total_samples,
        path.display()
    );
    Ok(doc)
}
