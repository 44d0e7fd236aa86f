//! Eye/scene frame intake and pairing.
//!
//! Producers push frames from their own capture threads. Each stream has a
//! bounded queue that drops its oldest frame when full, so a slow consumer
//! sees fresh frames instead of a growing backlog. The consumer pulls eye
//! frames in arrival order, each paired with the scene frame nearest in time.
use crate::image::io::GrayImageU8;
use crate::image::ImageU8;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    Eye,
    Scene,
}

/// Camera id → role assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraMapping {
    pub scene: u32,
    pub eye: u32,
}

impl Default for CameraMapping {
    fn default() -> Self {
        Self { scene: 0, eye: 1 }
    }
}

impl CameraMapping {
    pub fn role_of(&self, camera_id: u32) -> Option<CameraRole> {
        if camera_id == self.eye {
            Some(CameraRole::Eye)
        } else if camera_id == self.scene {
            Some(CameraRole::Scene)
        } else {
            None
        }
    }
}

/// Captured grayscale frame. Immutable once built.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: GrayImageU8,
    pub timestamp_s: f64,
    pub role: CameraRole,
}

impl Frame {
    pub fn new(image: GrayImageU8, timestamp_s: f64, role: CameraRole) -> Self {
        Self {
            image,
            timestamp_s,
            role,
        }
    }

    pub fn view(&self) -> ImageU8<'_> {
        self.image.as_view()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSyncConfig {
    pub eye_capacity: usize,
    pub scene_capacity: usize,
    /// A stream with no frame for this long is reported starved.
    pub starvation_timeout_s: f64,
    /// Scene frames further than this from the eye frame are not paired.
    pub max_pair_skew_s: f64,
}

impl Default for FrameSyncConfig {
    fn default() -> Self {
        Self {
            eye_capacity: 4,
            scene_capacity: 4,
            starvation_timeout_s: 0.5,
            max_pair_skew_s: 0.05,
        }
    }
}

/// Result of pushing one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// Queued after discarding the oldest frame of the stream.
    DroppedOldest,
    /// Camera id not present in the [`CameraMapping`].
    UnknownCamera,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamStatus {
    NeverSeen,
    Live,
    /// Last frame arrived `silent_s` seconds ago.
    Starved { silent_s: f64 },
}

impl StreamStatus {
    pub fn is_starved(&self) -> bool {
        matches!(self, StreamStatus::Starved { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SyncStatus {
    pub eye: StreamStatus,
    pub scene: StreamStatus,
    pub eye_queued: usize,
    pub scene_queued: usize,
    pub eye_dropped: u64,
    pub scene_dropped: u64,
}

/// Eye frame with its nearest scene frame, if one is close enough.
#[derive(Clone, Debug)]
pub struct FramePair {
    pub eye: Arc<Frame>,
    pub scene: Option<Arc<Frame>>,
}

impl FramePair {
    pub fn skew_s(&self) -> Option<f64> {
        self.scene
            .as_ref()
            .map(|s| (s.timestamp_s - self.eye.timestamp_s).abs())
    }
}

#[derive(Default)]
struct Stream {
    queue: VecDeque<Arc<Frame>>,
    dropped: u64,
    last_timestamp_s: Option<f64>,
}

impl Stream {
    fn push(&mut self, frame: Arc<Frame>, capacity: usize) -> Push {
        self.last_timestamp_s = Some(frame.timestamp_s);
        let mut outcome = Push::Queued;
        while self.queue.len() >= capacity.max(1) {
            self.queue.pop_front();
            self.dropped += 1;
            outcome = Push::DroppedOldest;
        }
        self.queue.push_back(frame);
        outcome
    }

    fn status(&self, now_s: f64, timeout_s: f64) -> StreamStatus {
        match self.last_timestamp_s {
            None => StreamStatus::NeverSeen,
            Some(t) if now_s - t > timeout_s => StreamStatus::Starved { silent_s: now_s - t },
            Some(_) => StreamStatus::Live,
        }
    }
}

#[derive(Default)]
struct SyncState {
    eye: Stream,
    scene: Stream,
}

/// Thread-safe two-stream frame synchronizer.
pub struct FrameSync {
    config: FrameSyncConfig,
    mapping: CameraMapping,
    state: Mutex<SyncState>,
}

impl Default for FrameSync {
    fn default() -> Self {
        Self::new(FrameSyncConfig::default(), CameraMapping::default())
    }
}

impl FrameSync {
    pub fn new(config: FrameSyncConfig, mapping: CameraMapping) -> Self {
        Self {
            config,
            mapping,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn config(&self) -> &FrameSyncConfig {
        &self.config
    }

    pub fn mapping(&self) -> &CameraMapping {
        &self.mapping
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        // A panicking producer leaves the queues structurally valid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Frame source entry point: `(buffer, timestamp, camera id)`.
    pub fn push(&self, camera_id: u32, image: GrayImageU8, timestamp_s: f64) -> Push {
        match self.mapping.role_of(camera_id) {
            Some(role) => self.push_frame(Frame::new(image, timestamp_s, role)),
            None => {
                debug!("ignoring frame from unmapped camera {camera_id}");
                Push::UnknownCamera
            }
        }
    }

    pub fn push_frame(&self, frame: Frame) -> Push {
        let role = frame.role;
        let frame = Arc::new(frame);
        let mut state = self.lock();
        let outcome = match role {
            CameraRole::Eye => state.eye.push(frame, self.config.eye_capacity),
            CameraRole::Scene => state.scene.push(frame, self.config.scene_capacity),
        };
        if outcome == Push::DroppedOldest {
            let dropped = match role {
                CameraRole::Eye => state.eye.dropped,
                CameraRole::Scene => state.scene.dropped,
            };
            // Only log the first drop and then every hundredth.
            if dropped == 1 || dropped % 100 == 0 {
                warn!("{role:?} queue full, {dropped} frames dropped so far");
            }
        }
        outcome
    }

    /// Oldest queued eye frame paired with the nearest scene frame.
    pub fn next_pair(&self) -> Option<FramePair> {
        let mut state = self.lock();
        let eye = state.eye.queue.pop_front()?;
        let scene = state
            .scene
            .queue
            .iter()
            .min_by(|a, b| {
                let da = (a.timestamp_s - eye.timestamp_s).abs();
                let db = (b.timestamp_s - eye.timestamp_s).abs();
                da.total_cmp(&db)
            })
            .filter(|s| (s.timestamp_s - eye.timestamp_s).abs() <= self.config.max_pair_skew_s)
            .cloned();
        if let Some(scene) = &scene {
            // Scene frames older than the chosen one can never be nearer for
            // later eye frames.
            let t = scene.timestamp_s;
            state.scene.queue.retain(|s| s.timestamp_s >= t);
        }
        Some(FramePair { eye, scene })
    }

    /// Discard every queued frame. Drop counters are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.eye.queue.clear();
        state.scene.queue.clear();
    }

    pub fn status(&self, now_s: f64) -> SyncStatus {
        let state = self.lock();
        let timeout = self.config.starvation_timeout_s;
        SyncStatus {
            eye: state.eye.status(now_s, timeout),
            scene: state.scene.status(now_s, timeout),
            eye_queued: state.eye.queue.len(),
            scene_queued: state.scene.queue.len(),
            eye_dropped: state.eye.dropped,
            scene_dropped: state.scene.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(v: u8) -> GrayImageU8 {
        GrayImageU8::filled(4, 4, v)
    }

    #[test]
    fn default_mapping_is_scene_zero_eye_one() {
        let m = CameraMapping::default();
        assert_eq!(m.role_of(0), Some(CameraRole::Scene));
        assert_eq!(m.role_of(1), Some(CameraRole::Eye));
        assert_eq!(m.role_of(7), None);
    }

    #[test]
    fn unknown_camera_is_ignored() {
        let sync = FrameSync::default();
        assert_eq!(sync.push(3, img(0), 0.0), Push::UnknownCamera);
        assert!(sync.next_pair().is_none());
    }

    #[test]
    fn full_queue_drops_oldest() {
        let config = FrameSyncConfig {
            eye_capacity: 2,
            ..FrameSyncConfig::default()
        };
        let sync = FrameSync::new(config, CameraMapping::default());
        assert_eq!(sync.push(1, img(1), 0.00), Push::Queued);
        assert_eq!(sync.push(1, img(2), 0.01), Push::Queued);
        assert_eq!(sync.push(1, img(3), 0.02), Push::DroppedOldest);
        let status = sync.status(0.02);
        assert_eq!(status.eye_dropped, 1);
        assert_eq!(status.eye_queued, 2);
        assert_eq!(sync.next_pair().unwrap().eye.timestamp_s, 0.01);
        assert_eq!(sync.next_pair().unwrap().eye.timestamp_s, 0.02);
        assert!(sync.next_pair().is_none());
    }

    #[test]
    fn pairs_with_nearest_scene_frame() {
        let sync = FrameSync::default();
        sync.push(0, img(0), 0.000);
        sync.push(0, img(0), 0.033);
        sync.push(0, img(0), 0.066);
        sync.push(1, img(0), 0.040);
        let pair = sync.next_pair().unwrap();
        assert_eq!(pair.scene.as_ref().unwrap().timestamp_s, 0.033);
        assert!((pair.skew_s().unwrap() - 0.007).abs() < 1e-9);
        assert_eq!(sync.status(0.07).scene_queued, 2);
    }

    #[test]
    fn distant_scene_frame_is_not_paired() {
        let sync = FrameSync::default();
        sync.push(0, img(0), 0.0);
        sync.push(1, img(0), 1.0);
        let pair = sync.next_pair().unwrap();
        assert!(pair.scene.is_none());
    }

    #[test]
    fn starvation_is_reported() {
        let sync = FrameSync::default();
        assert_eq!(sync.status(0.0).eye, StreamStatus::NeverSeen);
        sync.push(1, img(0), 1.0);
        sync.push(0, img(0), 1.0);
        assert_eq!(sync.status(1.2).eye, StreamStatus::Live);
        sync.push(0, img(0), 2.0);
        let status = sync.status(2.0);
        assert!(status.eye.is_starved());
        assert_eq!(status.scene, StreamStatus::Live);
    }

    #[test]
    fn concurrent_producers() {
        let sync = Arc::new(FrameSync::new(
            FrameSyncConfig {
                eye_capacity: 1000,
                scene_capacity: 1000,
                ..FrameSyncConfig::default()
            },
            CameraMapping::default(),
        ));
        let handles: Vec<_> = (0..2u32)
            .map(|cam| {
                let sync = Arc::clone(&sync);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        sync.push(cam, img(0), i as f64 * 0.01);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let status = sync.status(1.0);
        assert_eq!(status.eye_queued, 100);
        assert_eq!(status.scene_queued, 100);
    }
}
