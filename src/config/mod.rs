//! Parameters and tool configuration.

pub mod params;
pub mod replay;

pub use params::{ParameterStore, Params, ParamsSnapshot};
