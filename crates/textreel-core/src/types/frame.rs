//! Frames: the units of decoded media that move through the queues.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Raster;

/// Sentinel presentation timestamp meaning "unknown".
pub const NO_PTS: i64 = i64::MIN;

/// Interleaved 16-bit stereo: two channels of two bytes each.
pub const BYTES_PER_STEREO_FRAME: i64 = 4;

/// What a frame carries, and therefore which queue it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Audio,
    Video,
    Void,
    WaveSample,
}

impl FrameKind {
    /// Every kind, in queue index order.
    pub const ALL: [Self; 4] = [Self::Audio, Self::Video, Self::Void, Self::WaveSample];

    /// Stable index used to address per-kind storage.
    pub const fn index(self) -> usize {
        match self {
            Self::Audio => 0,
            Self::Video => 1,
            Self::Void => 2,
            Self::WaveSample => 3,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Void => "void",
            Self::WaveSample => "wave sample",
        })
    }
}

/// Owned frame contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// Interleaved 16-bit stereo samples.
    Pcm(Vec<i16>),
    /// A character raster produced by the video collaborator.
    Raster(Raster),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Size of the payload in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Pcm(samples) => samples.len() * 2,
            Self::Raster(raster) => raster.cells().len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Copyable summary of a frame, returned by non-destructive peeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub pts: i64,
    pub play_number: Option<usize>,
    pub byte_len: usize,
    pub read_cursor: usize,
}

impl FrameHeader {
    /// Returns true if the pts is known.
    pub const fn has_pts(&self) -> bool {
        self.pts != NO_PTS
    }
}

/// A decoded unit of media or derived data.
///
/// A frame is owned by exactly one queue or by the thread that dequeued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    /// Presentation timestamp in microseconds.
    pts: i64,
    /// Playlist index of the media item that produced this frame.
    play_number: Option<usize>,
    payload: Payload,
    /// Bytes of the payload already consumed.
    read_cursor: usize,
}

impl Frame {
    pub const fn new(kind: FrameKind, pts: i64, payload: Payload) -> Self {
        Self {
            kind,
            pts,
            play_number: None,
            payload,
            read_cursor: 0,
        }
    }

    /// Audio block of interleaved stereo samples.
    pub const fn audio(samples: Vec<i16>, pts: i64) -> Self {
        Self::new(FrameKind::Audio, pts, Payload::Pcm(samples))
    }

    /// Video frame carrying a character raster.
    pub const fn video(raster: Raster, pts: i64) -> Self {
        Self::new(FrameKind::Video, pts, Payload::Raster(raster))
    }

    /// Copy of delivered audio, destined for the visualization queue.
    pub const fn wave_sample(samples: Vec<i16>, pts: i64) -> Self {
        Self::new(FrameKind::WaveSample, pts, Payload::Pcm(samples))
    }

    /// Allocate a zeroed PCM frame, reporting allocation failure instead of aborting.
    pub fn try_pcm(kind: FrameKind, sample_count: usize, pts: i64) -> Result<Self> {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(sample_count)
            .map_err(|_| Error::Allocation {
                bytes: sample_count * 2,
            })?;
        samples.resize(sample_count, 0);
        Ok(Self::new(kind, pts, Payload::Pcm(samples)))
    }

    /// Copy `samples` into a newly allocated PCM frame.
    pub fn try_pcm_from(kind: FrameKind, samples: &[i16], pts: i64) -> Result<Self> {
        let mut frame = Self::try_pcm(kind, 0, pts)?;
        if let Payload::Pcm(buf) = &mut frame.payload {
            buf.try_reserve_exact(samples.len())
                .map_err(|_| Error::Allocation {
                    bytes: samples.len() * 2,
                })?;
            buf.extend_from_slice(samples);
        }
        Ok(frame)
    }

    #[must_use]
    pub fn with_play_number(mut self, play_number: Option<usize>) -> Self {
        self.play_number = play_number;
        self
    }

    pub const fn kind(&self) -> FrameKind {
        self.kind
    }

    pub const fn pts(&self) -> i64 {
        self.pts
    }

    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    pub const fn has_pts(&self) -> bool {
        self.pts != NO_PTS
    }

    pub const fn play_number(&self) -> Option<usize> {
        self.play_number
    }

    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Take the raster out of a video frame.
    pub fn into_raster(self) -> Option<Raster> {
        match self.payload {
            Payload::Raster(raster) => Some(raster),
            _ => None,
        }
    }

    pub const fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn byte_len(&self) -> usize {
        self.payload.byte_len()
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            kind: self.kind,
            pts: self.pts,
            play_number: self.play_number,
            byte_len: self.byte_len(),
            read_cursor: self.read_cursor,
        }
    }

    /// All samples of a PCM payload; empty for any other payload.
    pub fn samples(&self) -> &[i16] {
        match &self.payload {
            Payload::Pcm(samples) => samples,
            _ => &[],
        }
    }

    /// Samples not yet consumed by the read cursor.
    pub fn remaining_samples(&self) -> &[i16] {
        let samples = self.samples();
        &samples[(self.read_cursor / 2).min(samples.len())..]
    }

    /// Move the read cursor forward by `samples` 16-bit samples.
    pub fn consume_samples(&mut self, samples: usize) {
        self.read_cursor = (self.read_cursor + samples * 2).min(self.byte_len());
    }

    pub fn is_consumed(&self) -> bool {
        self.read_cursor >= self.byte_len()
    }

    /// Presentation time of the first unread sample.
    pub const fn cursor_pts(&self, sample_rate: u32) -> i64 {
        if self.pts == NO_PTS || sample_rate == 0 {
            return self.pts;
        }
        self.pts + self.read_cursor as i64 * 1_000_000 / sample_rate as i64 / BYTES_PER_STEREO_FRAME
    }
}
