mod common;

use common::synthetic::{eye_image, Lcg};
use gaze_heatmap::filter::{FilterParams, JitterFilter};
use gaze_heatmap::pupil::DetectionMiss;
use gaze_heatmap::{DetectParams, PupilDetection, PupilDetector};

#[test]
fn pupil_with_glint_is_localized() {
    common::init_logging();
    let mut detector = PupilDetector::new();
    let params = DetectParams::default();
    let mut rng = Lcg(42);
    for _ in 0..25 {
        let pupil = [60.0 + 200.0 * rng.next_f32(), 50.0 + 140.0 * rng.next_f32()];
        let img = eye_image(pupil, 10.0 + 6.0 * rng.next_f32());
        let PupilDetection::Found(c) = detector.detect(&img.as_view(), &params) else {
            panic!("pupil at {pupil:?} not found");
        };
        assert!((c.center[0] - pupil[0]).abs() < 0.5, "{:?} vs {pupil:?}", c.center);
        assert!((c.center[1] - pupil[1]).abs() < 0.5, "{:?} vs {pupil:?}", c.center);
        assert!(c.score > 0.8 && c.score <= 1.0);
        assert!(c.area >= params.min_area && c.area <= params.max_area);
    }
}

#[test]
fn area_band_rejects_tiny_pupils() {
    let img = eye_image([160.0, 120.0], 12.0);
    let params = DetectParams::default().with_area(1_000, 5_000);
    let detection = PupilDetector::new().detect(&img.as_view(), &params);
    assert!(matches!(
        detection,
        PupilDetection::Miss(DetectionMiss::NoQualifyingRegion { .. })
    ));
}

#[test]
fn one_euro_filter_steadies_jittery_detections() {
    let mut detector = PupilDetector::new();
    let mut filter = JitterFilter::new(FilterParams::one_euro_default());
    let mut rng = Lcg(5);
    let mut raw_spread = 0.0f32;
    let mut filtered_spread = 0.0f32;
    let mut last_filtered = None;
    for i in 0..120 {
        let pupil = [160.0 + 2.0 * (rng.next_f32() - 0.5), 120.0];
        let img = eye_image(pupil, 12.0);
        let c = detector
            .detect(&img.as_view(), &DetectParams::default())
            .candidate()
            .cloned()
            .expect("pupil");
        let f = filter.apply(c.center, i as f64 / 60.0);
        if i >= 60 {
            raw_spread = raw_spread.max((c.center[0] - 160.0).abs());
            filtered_spread = filtered_spread.max((f[0] - 160.0).abs());
        }
        last_filtered = Some(f);
    }
    assert!(last_filtered.is_some());
    assert!(
        filtered_spread < raw_spread,
        "filtered {filtered_spread} vs raw {raw_spread}"
    );
}
