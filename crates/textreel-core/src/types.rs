//! Core domain types for textreel.

pub mod frame;
pub mod raster;
pub mod status;

pub use frame::{Frame, FrameHeader, FrameKind, Payload, BYTES_PER_STEREO_FRAME, NO_PTS};
pub use raster::{shade, Raster, MAX_RASTER_SIDE, SHADE_PALETTE};
pub use status::{StatusLine, METER_CELLS};
