//! Stand-ins for the decoder, playlist and audio device.

pub mod device;
pub mod source;

pub use device::{spawn_output, OutputThread, SimulatedDevice};
pub use source::{demo_tracks, DemoPlaylist, SyntheticSource};
