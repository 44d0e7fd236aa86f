//! Threshold-and-region pupil localisation for infrared eye frames.
//!
//! Each frame is binarized at `threshold` (dark pupil by default, bright
//! pupil when `invert` is set), split into 8-connected regions and every
//! region is summarised by its moments. Regions outside the configured area
//! band or with an irregular shape are discarded; the most ellipse-like
//! survivor wins. The detector keeps no temporal state: smoothing across
//! frames belongs to [`crate::filter`].

mod regions;

use crate::image::{ImageU8, ImageView};
use log::trace;
use regions::{RegionShape, RegionWorkspace};
use serde::{Deserialize, Serialize};

/// Live-tunable detector parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectParams {
    /// Binarization threshold on 8-bit intensity.
    pub threshold: u8,
    /// Smallest accepted region, in pixels.
    pub min_area: usize,
    /// Largest accepted region, in pixels.
    pub max_area: usize,
    /// Track a bright pupil (pixels above threshold) instead of a dark one.
    pub invert: bool,
    /// Minimum minor/major axis ratio of the equivalent ellipse.
    pub min_aspect_ratio: f32,
    /// Minimum ratio of region area to equivalent ellipse area.
    pub min_fill_ratio: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            threshold: 50,
            min_area: 30,
            max_area: 20_000,
            invert: false,
            min_aspect_ratio: 0.4,
            min_fill_ratio: 0.6,
        }
    }
}

impl DetectParams {
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_area(mut self, min_area: usize, max_area: usize) -> Self {
        self.min_area = min_area;
        self.max_area = max_area;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }
}

/// Pupil hypothesis for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PupilCandidate {
    /// Centroid in frame pixels (pixel centres at integer coordinates).
    pub center: [f32; 2],
    /// Region size in pixels.
    pub area: usize,
    /// Full major and minor axis lengths of the equivalent ellipse.
    pub axes: [f32; 2],
    /// Major axis orientation in degrees, `[0, 180)`.
    pub angle_deg: f32,
    /// Shape regularity in `[0, 1]`, used as detection confidence.
    pub score: f32,
}

/// Why a frame produced no pupil. Misses are expected (blinks, occlusion).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DetectionMiss {
    EmptyFrame,
    NoForeground,
    NoQualifyingRegion { regions: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PupilDetection {
    Found(PupilCandidate),
    Miss(DetectionMiss),
}

impl PupilDetection {
    pub fn candidate(&self) -> Option<&PupilCandidate> {
        match self {
            PupilDetection::Found(c) => Some(c),
            PupilDetection::Miss(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PupilDetection::Found(_))
    }
}

/// Pupil detector with reusable scratch buffers.
///
/// The buffers only avoid per-frame allocation; results depend on nothing
/// but the frame and the parameters.
#[derive(Default)]
pub struct PupilDetector {
    workspace: RegionWorkspace,
}

impl PupilDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&mut self, frame: &ImageU8<'_>, params: &DetectParams) -> PupilDetection {
        if frame.is_empty() {
            return PupilDetection::Miss(DetectionMiss::EmptyFrame);
        }
        let regions = self
            .workspace
            .extract(frame, params.threshold, params.invert);
        if regions.is_empty() {
            return PupilDetection::Miss(DetectionMiss::NoForeground);
        }

        let mut best: Option<(f64, &RegionShape)> = None;
        for region in &regions {
            let Some(score) = score_region(region, params) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_score, best_region)) => {
                    score > best_score || (score == best_score && region.area > best_region.area)
                }
            };
            if better {
                best = Some((score, region));
            }
        }

        match best {
            Some((score, region)) if frame.contains(region.center[0] as f32, region.center[1] as f32) => {
                trace!(
                    "pupil at ({:.1}, {:.1}) area={} score={:.3} ({} regions, {} fg px)",
                    region.center[0],
                    region.center[1],
                    region.area,
                    score,
                    regions.len(),
                    self.workspace.foreground_pixels()
                );
                PupilDetection::Found(PupilCandidate {
                    center: [region.center[0] as f32, region.center[1] as f32],
                    area: region.area,
                    axes: [region.major as f32, region.minor as f32],
                    angle_deg: region.angle_deg as f32,
                    score: score as f32,
                })
            }
            _ => PupilDetection::Miss(DetectionMiss::NoQualifyingRegion {
                regions: regions.len(),
            }),
        }
    }
}

/// One-shot detection without keeping scratch buffers around.
pub fn detect(frame: &ImageU8<'_>, params: &DetectParams) -> PupilDetection {
    PupilDetector::new().detect(frame, params)
}

fn score_region(region: &RegionShape, params: &DetectParams) -> Option<f64> {
    if region.area < params.min_area || region.area > params.max_area {
        return None;
    }
    let aspect = region.aspect_ratio();
    let fill = region.fill_ratio();
    if aspect < params.min_aspect_ratio as f64 || fill < params.min_fill_ratio as f64 {
        return None;
    }
    Some((aspect * fill.min(1.0)).clamp(0.0, 1.0))
}
