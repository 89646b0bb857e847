//! Synthetic media: a tone per item plus an optional moving test pattern.

use textreel_core::{FrameKind, Raster, Result, SHADE_PALETTE};
use textreel_pipeline::{FrameProducer, MediaSource, Playlist, TrackInfo};
use tracing::debug;

/// Screen size of the test pattern.
pub const PICTURE_WIDTH: usize = 80;
pub const PICTURE_HEIGHT: usize = 24;

/// Stereo frames per decoded audio block.
const BLOCK_FRAMES: usize = 1024;

const FRAME_DURATION_US: i64 = 40_000;
const ITEM_DURATION_US: i64 = 8_000_000;
const BASE_TONE_HZ: f64 = 220.0;
const TONE_AMPLITUDE: f64 = 12_000.0;

/// The items played when no playlist is given.
pub fn demo_tracks() -> Vec<TrackInfo> {
    vec![
        TrackInfo {
            index: 0,
            has_video: true,
            still_image: false,
        },
        TrackInfo {
            index: 1,
            has_video: false,
            still_image: false,
        },
        TrackInfo {
            index: 2,
            has_video: false,
            still_image: false,
        },
        TrackInfo {
            index: 3,
            has_video: true,
            still_image: true,
        },
    ]
}

pub struct DemoPlaylist {
    tracks: Vec<TrackInfo>,
    current: usize,
}

impl DemoPlaylist {
    pub const fn new(tracks: Vec<TrackInfo>) -> Self {
        Self { tracks, current: 0 }
    }
}

impl Playlist for DemoPlaylist {
    fn current(&self) -> Option<TrackInfo> {
        self.tracks.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<TrackInfo> {
        self.tracks.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<TrackInfo> {
        let next = self.peek_next()?;
        self.current += 1;
        Some(next)
    }
}

/// Generates audio and video for any [`TrackInfo`] on demand.
pub struct SyntheticSource {
    sample_rate: u32,
    track: Option<TrackInfo>,
    tone_hz: f64,
    /// Next audio position in stereo frames.
    audio_frame: i64,
    next_video: i64,
}

impl SyntheticSource {
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            track: None,
            tone_hz: BASE_TONE_HZ,
            audio_frame: 0,
            next_video: 0,
        }
    }

    fn audio_pts(&self) -> i64 {
        self.audio_frame * 1_000_000 / i64::from(self.sample_rate)
    }

    fn audio_block(&self) -> Vec<i16> {
        let rate = f64::from(self.sample_rate);
        (0..BLOCK_FRAMES)
            .flat_map(|i| {
                let t = (self.audio_frame + i as i64) as f64 / rate;
                let phase = 2.0 * std::f64::consts::PI * self.tone_hz * t;
                let left = (TONE_AMPLITUDE * phase.sin()) as i16;
                let right = (TONE_AMPLITUDE * 0.5 * (phase * 1.5).sin()) as i16;
                [left, right]
            })
            .collect()
    }

    fn picture(&self, frame: i64) -> Result<Raster> {
        let mut raster = Raster::new(PICTURE_WIDTH, PICTURE_HEIGHT)?;
        let band = (frame as usize * 2) % PICTURE_WIDTH;
        for x in 0..PICTURE_WIDTH {
            let distance = x.abs_diff(band).min(PICTURE_WIDTH - x.abs_diff(band));
            let shade = SHADE_PALETTE[SHADE_PALETTE.len() - 1 - distance.min(SHADE_PALETTE.len() - 1)];
            raster.draw_line(x as i32, 0, x as i32, PICTURE_HEIGHT as i32 - 1, shade);
        }
        raster.border_rect(0, 0, PICTURE_WIDTH as i32, PICTURE_HEIGHT as i32, b'+', false);
        Ok(raster)
    }

    fn has_moving_video(&self) -> bool {
        self.track.is_some_and(|t| t.has_video && !t.still_image)
    }
}

impl MediaSource for SyntheticSource {
    fn open(&mut self, track: &TrackInfo, _producer: &mut FrameProducer) -> Result<()> {
        debug!("Opening synthetic item {}", track.index);
        self.track = Some(*track);
        self.tone_hz = BASE_TONE_HZ * (track.index as f64 + 2.0) / 2.0;
        self.audio_frame = 0;
        self.next_video = 0;
        Ok(())
    }

    fn read_and_buffer(&mut self, producer: &mut FrameProducer) -> Result<()> {
        let Some(track) = self.track else {
            producer.finish(FrameKind::Audio);
            producer.finish(FrameKind::Video);
            return Ok(());
        };

        while producer.wants(FrameKind::Audio) {
            if self.audio_pts() >= ITEM_DURATION_US {
                producer.finish(FrameKind::Audio);
                break;
            }
            producer.push_audio(self.audio_block(), self.audio_pts())?;
            self.audio_frame += BLOCK_FRAMES as i64;
        }

        while producer.wants(FrameKind::Video) {
            let pts = self.next_video * FRAME_DURATION_US;
            let done = !track.has_video
                || pts >= ITEM_DURATION_US
                || (track.still_image && self.next_video > 0);
            if done {
                producer.finish(FrameKind::Video);
                break;
            }
            producer.push_video(self.picture(self.next_video)?, pts)?;
            self.next_video += 1;
        }
        Ok(())
    }

    fn seek(&mut self, target_us: i64) -> Result<()> {
        let target = target_us.clamp(0, ITEM_DURATION_US);
        self.audio_frame = target * i64::from(self.sample_rate) / 1_000_000;
        if self.has_moving_video() {
            self.next_video = target / FRAME_DURATION_US;
        }
        Ok(())
    }

    fn frame_duration_us(&self) -> Option<i64> {
        self.has_moving_video().then_some(FRAME_DURATION_US)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use std::sync::Arc;

    use textreel_core::PipelineConfig;
    use textreel_pipeline::{ManualTime, PipelineContext, TimeSource};

    use super::*;

    fn producer() -> FrameProducer {
        let time: Arc<dyn TimeSource> = Arc::new(ManualTime::new(0));
        FrameProducer::new(Arc::new(
            PipelineContext::new(PipelineConfig::default(), time).unwrap(),
        ))
    }

    #[test]
    fn test_fills_queues_until_full() {
        let mut producer = producer();
        let mut source = SyntheticSource::new(44_100);
        let track = demo_tracks()[0];
        source.open(&track, &mut producer).unwrap();
        source.read_and_buffer(&mut producer).unwrap();

        let queues = producer.context().queues();
        assert!(queues.is_full(FrameKind::Audio));
        assert!(queues.is_full(FrameKind::Video));
        assert_eq!(queues.front_pts(FrameKind::Video), Some(0));
        assert_eq!(source.frame_duration_us(), Some(FRAME_DURATION_US));
    }

    #[test]
    fn test_audio_only_item_finishes_video() {
        let mut producer = producer();
        let mut source = SyntheticSource::new(44_100);
        source.open(&demo_tracks()[1], &mut producer).unwrap();
        source.read_and_buffer(&mut producer).unwrap();
        assert!(producer.is_exhausted(FrameKind::Video));
        assert_eq!(source.frame_duration_us(), None);
    }

    #[test]
    fn test_still_image_is_one_frame() {
        let mut producer = producer();
        let mut source = SyntheticSource::new(44_100);
        source.open(&demo_tracks()[3], &mut producer).unwrap();
        source.read_and_buffer(&mut producer).unwrap();
        assert_eq!(producer.context().queues().count(FrameKind::Video), 1);
        assert!(producer.is_exhausted(FrameKind::Video));
    }

    #[test]
    fn test_seek_repositions_streams() {
        let mut source = SyntheticSource::new(48_000);
        source.open(&demo_tracks()[0], &mut producer()).unwrap();
        source.seek(2_000_000).unwrap();
        assert_eq!(source.audio_pts(), 2_000_000);
        assert_eq!(source.next_video, 50);
        source.seek(-5).unwrap();
        assert_eq!(source.audio_pts(), 0);
    }

    #[test]
    fn test_playlist_advances_in_order() {
        let mut playlist = DemoPlaylist::new(demo_tracks());
        assert_eq!(playlist.current().unwrap().index, 0);
        assert_eq!(playlist.advance().unwrap().index, 1);
        playlist.advance();
        playlist.advance();
        assert!(playlist.advance().is_none());
        assert_eq!(playlist.current().unwrap().index, 3);
    }
}
