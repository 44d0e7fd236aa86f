//! Live-tunable pipeline parameters.
//!
//! Operators adjust thresholds and smoothing while the session runs. Every
//! change produces a new immutable [`ParamsSnapshot`] with a higher version;
//! the per-frame loop and each export read exactly one snapshot, so a frame
//! or an export never mixes old and new values.
use crate::filter::FilterParams;
use crate::gaze::GazeProjector;
use crate::heatmap::Smoothing;
use crate::pupil::DetectParams;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub detect: DetectParams,
    pub filter: FilterParams,
    pub projector: GazeProjector,
    pub smoothing: Smoothing,
}

/// Immutable, versioned view of [`Params`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParamsSnapshot {
    pub version: u64,
    pub params: Params,
}

/// Shared parameter cell. Readers get an `Arc` and never block writers for
/// longer than a pointer swap.
#[derive(Debug)]
pub struct ParameterStore {
    current: RwLock<Arc<ParamsSnapshot>>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl ParameterStore {
    pub fn new(params: Params) -> Self {
        Self {
            current: RwLock::new(Arc::new(ParamsSnapshot { version: 0, params })),
        }
    }

    pub fn snapshot(&self) -> Arc<ParamsSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Apply `edit` to a copy of the current parameters and publish it.
    /// Returns the new version.
    pub fn update<F>(&self, edit: F) -> u64
    where
        F: FnOnce(&mut Params),
    {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut params = guard.params.clone();
        edit(&mut params);
        let version = guard.version + 1;
        debug!("parameters updated to version {version}");
        *guard = Arc::new(ParamsSnapshot { version, params });
        version
    }

    pub fn replace(&self, params: Params) -> u64 {
        self.update(|p| *p = params)
    }
}
