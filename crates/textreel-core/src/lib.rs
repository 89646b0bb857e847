//! # textreel-core
//!
//! Core types, configuration, and error handling shared by the textreel
//! playback pipeline and its visualizations.

pub mod config;
pub mod error;
pub mod types;

pub use config::{PipelineConfig, QueueCapacities, SeekConfig, SyncConfig, VizConfig};
pub use error::{DegenerateReason, Error, Result};
pub use types::*;
