//! I/O helpers for grayscale frames, heatmap overlays and JSON.
//!
//! - `load_grayscale_image`: read a PNG/JPEG into an owned 8-bit gray buffer.
//! - `save_heatmap_png`: colour a density grid and write it as RGBA PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::colormap::render_overlay;
use super::{ImageF32, ImageU8};
use image::RgbaImage;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Owned 8-bit grayscale buffer with stride and borrowed view conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImageU8 {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u8>,
}

impl GrayImageU8 {
    /// Construct an owned grayscale buffer from tightly packed bytes.
    ///
    /// Returns `None` when `data` does not hold `width * height` bytes.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            stride: width,
            data,
        })
    }

    /// Uniformly filled buffer, mostly useful for synthetic frames.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            stride: width,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrow as a read-only `ImageU8` view
    pub fn as_view(&self) -> ImageU8<'_> {
        ImageU8 {
            w: self.width,
            h: self.height,
            stride: self.stride,
            data: &self.data,
        }
    }
}

/// Load an image from disk and convert to 8-bit grayscale.
pub fn load_grayscale_image(path: &Path) -> Result<GrayImageU8, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    GrayImageU8::new(width, height, img.into_raw())
        .ok_or_else(|| format!("Decoded buffer of {} has unexpected size", path.display()))
}

/// Colour `values` with the jet colormap, resample to `width × height` and
/// write an RGBA PNG whose alpha follows the normalized intensity.
pub fn save_heatmap_png(
    values: &ImageF32,
    width: usize,
    height: usize,
    alpha: f32,
    path: &Path,
) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("Refusing to write empty overlay {}", path.display()));
    }
    ensure_parent_dir(path)?;
    let pixels = render_overlay(values, width, height, alpha);
    let raw: Vec<u8> = pixels.into_iter().flatten().collect();
    let image = RgbaImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| "Failed to create overlay buffer".to_string())?;
    image
        .save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
