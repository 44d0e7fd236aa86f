use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Timing entry describing a single stage of the per-frame pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated timing trace for one processed frame or one export.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn with_total(total_ms: f64) -> Self {
        Self {
            total_ms,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }

    pub fn stage_ms(&self, label: &str) -> Option<f64> {
        self.stages
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.elapsed_ms)
    }
}

/// Stopwatch that records consecutive stages into a [`TimingBreakdown`].
pub struct StageTimer {
    start: Instant,
    lap: Instant,
    breakdown: TimingBreakdown,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl StageTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            lap: now,
            breakdown: TimingBreakdown::default(),
        }
    }

    /// Close the current stage under `label`.
    pub fn lap(&mut self, label: &str) {
        let now = Instant::now();
        self.breakdown
            .push(label, (now - self.lap).as_secs_f64() * 1000.0);
        self.lap = now;
    }

    pub fn finish(mut self) -> TimingBreakdown {
        self.breakdown.total_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.breakdown
    }
}
