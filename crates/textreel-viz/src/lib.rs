//! # textreel-viz
//!
//! Audio visualizations drawn into character rasters.
//!
//! ## Features
//!
//! - Fixed-point band correlation over a 2048-entry cosine table
//! - Six modes: waveform, circle meter, scrolling peak and RMS history,
//!   half-octave bars, and a musical semitone spectrum
//! - A polling worker that renders the newest wave block off the audio path

pub mod modes;
pub mod spectrum;
pub mod worker;

pub use modes::{
    CircleMeter, MusicalSpectrum, ScrollingPeak, ScrollingRms, SpectrumBars, VisualizationMode,
    Visualizer, Waveform,
};
pub use spectrum::{bar_height, BandLadder, BandMagnitude, ChannelMix, CosineTable, SpectrumAnalyzer};
pub use worker::{VisualizationControl, VizWorker};
