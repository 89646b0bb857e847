//! Synchronization controller: decides per tick whether to wait, present,
//! drop late video, or refresh, and owns the session state machine.

use std::sync::Arc;
use std::time::Duration;

use textreel_core::{Error, Frame, FrameKind, Result};
use tracing::{debug, info, warn};

use crate::collab::{AudioDevice, MediaSource, Playlist, TrackInfo};
use crate::context::PipelineContext;
use crate::producer::FrameProducer;

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Starting,
    Playing,
    Paused,
    Seeking,
    /// Decoding finished; buffered audio is playing out.
    Draining,
    Stopped,
}

/// Outcome of one pacing decision.
#[derive(Debug)]
pub enum Tick {
    /// The head video frame is not due yet and the queues are saturated.
    Wait(Duration),
    /// Nothing to show yet; keep feeding the queues.
    Pending,
    /// This frame is due now.
    Present(Frame),
    /// Video fell too far behind and overdue frames were discarded.
    Dropped { count: usize },
    /// No video queued; redraw the last picture and overlays.
    Refresh,
    Paused,
}

/// Result of the end-of-item check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStream {
    Continue,
    /// Waiting for buffered audio before moving on.
    Draining,
    Advanced { track: TrackInfo, gapless: bool },
    Finished,
}

pub struct SyncController {
    ctx: Arc<PipelineContext>,
    state: SessionState,
    frame_duration_us: Option<i64>,
    /// Presentation time of the next idle refresh.
    next_refresh_us: i64,
}

impl SyncController {
    pub const fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            state: SessionState::Starting,
            frame_duration_us: None,
            next_refresh_us: 0,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Average video frame duration used by the drop policy.
    pub fn set_frame_duration(&mut self, frame_duration_us: Option<i64>) {
        self.frame_duration_us = frame_duration_us.filter(|&d| d > 0);
    }

    /// Set the clock so `pts` is now and begin playing.
    pub fn start(&mut self, pts: i64) {
        self.ctx.clock().start_at(pts);
        self.next_refresh_us = pts;
        self.set_state(SessionState::Playing);
    }

    pub fn toggle_pause(&mut self) -> SessionState {
        let clock = self.ctx.clock();
        match self.state {
            SessionState::Paused => {
                clock.resume();
                self.next_refresh_us = clock.position_us();
                self.set_state(SessionState::Playing);
            }
            SessionState::Playing | SessionState::Draining => {
                clock.pause();
                self.set_state(SessionState::Paused);
            }
            other => debug!("Ignoring pause toggle in {:?}", other),
        }
        self.state
    }

    /// Jump by `delta_us` of presentation time.
    ///
    /// Mutes the device, discards buffered audio and video, repositions the
    /// decoder, moves the clock, then unmutes.
    pub fn seek(
        &mut self,
        delta_us: i64,
        source: &mut dyn MediaSource,
        device: &dyn AudioDevice,
        producer: &mut FrameProducer,
    ) -> Result<()> {
        let resume_state = match self.state {
            SessionState::Paused => SessionState::Paused,
            SessionState::Stopped => return Ok(()),
            _ => SessionState::Playing,
        };
        self.set_state(SessionState::Seeking);

        let clock = self.ctx.clock();
        let target_us = clock.position_us() + delta_us;
        debug!("Seeking by {}us to {}us", delta_us, target_us);

        device.set_muted(true);
        self.ctx.flush(&[FrameKind::Audio, FrameKind::Video]);
        let result = source.seek(target_us);
        clock.shift(delta_us);
        self.ctx.set_exhausted(FrameKind::Audio, false);
        self.ctx.set_exhausted(FrameKind::Video, false);
        producer.arm_seek_guard(source.is_lossless());
        device.set_muted(false);

        self.next_refresh_us = clock.position_us();
        self.set_state(resume_state);

        result.map_err(|e| {
            warn!("Decoder seek failed: {e}");
            e
        })
    }

    /// Both queues are full or their streams are finished, so sleeping
    /// cannot starve the decoder.
    fn saturated(&self) -> bool {
        let queues = self.ctx.queues();
        [FrameKind::Audio, FrameKind::Video]
            .into_iter()
            .all(|kind| self.ctx.is_exhausted(kind) || queues.is_full(kind))
    }

    /// Whether the drop policy applies at the current frame rate.
    fn drop_lag_us(&self) -> Option<i64> {
        let sync = &self.ctx.config().sync;
        let duration = self.frame_duration_us?;
        let fps = 1_000_000 / duration;
        (fps >= i64::from(sync.min_drop_fps)).then(|| duration * i64::from(sync.drop_lag_frames))
    }

    /// Make one pacing decision.
    pub fn tick(&mut self) -> Tick {
        let clock = self.ctx.clock();
        if clock.is_paused() {
            self.ctx.record_video_drift(0);
            return Tick::Paused;
        }

        let sync = self.ctx.config().sync;
        let queues = self.ctx.queues();

        let Some(pts) = queues.front_pts(FrameKind::Video) else {
            return self.idle_tick();
        };

        let until_due = clock.until_due_us(pts);
        if until_due > 0 {
            if self.saturated() {
                let sleep = (until_due - sync.sleep_lead_us).min(sync.max_sleep_us);
                if sleep > 0 {
                    return Tick::Wait(Duration::from_micros(sleep.unsigned_abs()));
                }
            }
            return Tick::Pending;
        }

        let late_us = -until_due;
        self.ctx.record_video_drift(late_us);

        if let Some(max_lag) = self.drop_lag_us() {
            if late_us > max_lag {
                let now = clock.position_us();
                let count = queues.drain_while(FrameKind::Video, &mut |header| header.pts < now);
                self.ctx.flag_frame_drop();
                debug!("Video {}us late, dropped {} frames", late_us, count);
                return Tick::Dropped { count };
            }
        }

        match queues.dequeue(FrameKind::Video) {
            Ok(frame) => Tick::Present(frame),
            Err(_) => Tick::Pending,
        }
    }

    fn idle_tick(&mut self) -> Tick {
        let sync = self.ctx.config().sync;
        let position = self.ctx.clock().position_us();
        let until_refresh = self.next_refresh_us - position;

        if self.saturated() {
            if until_refresh.abs() > sync.max_sleep_us {
                self.next_refresh_us = position;
            } else if until_refresh > 0 {
                return Tick::Wait(Duration::from_micros(until_refresh.unsigned_abs()));
            }
        }

        if self.next_refresh_us <= position {
            self.ctx.record_video_drift(position - self.next_refresh_us);
            self.next_refresh_us = position + sync.refresh_interval_us;
            return Tick::Refresh;
        }
        Tick::Pending
    }

    /// Open `track` and restart playback from its beginning.
    ///
    /// A gapless restart keeps queued audio so it plays out seamlessly.
    pub fn open_track(
        &mut self,
        track: TrackInfo,
        gapless: bool,
        source: &mut dyn MediaSource,
        producer: &mut FrameProducer,
    ) -> Result<()> {
        if gapless {
            self.ctx.flush(&[FrameKind::Video, FrameKind::Void]);
        } else {
            self.ctx
                .flush(&[FrameKind::Audio, FrameKind::Video, FrameKind::Void]);
        }
        producer.begin_track(Some(track.index));
        source.open(&track, producer)?;
        self.set_frame_duration(source.frame_duration_us());
        info!("Playing item {} (gapless: {})", track.index, gapless);
        self.start(0);
        Ok(())
    }

    /// Decide whether the current item has ended and what comes next.
    pub fn check_end_of_stream(
        &mut self,
        playlist: &mut dyn Playlist,
        source: &mut dyn MediaSource,
        producer: &mut FrameProducer,
    ) -> Result<EndOfStream> {
        let queues = self.ctx.queues();
        // A frame the sink is part way through counts as one queued frame.
        let audio_left = queues.count(FrameKind::Audio)
            + usize::from(self.ctx.pending_audio_samples() > 0);
        let ended = self.ctx.is_exhausted(FrameKind::Audio)
            && self.ctx.is_exhausted(FrameKind::Video)
            && audio_left < self.ctx.config().sync.drain_low_watermark
            && queues.is_empty(FrameKind::Video);
        if !ended || matches!(self.state, SessionState::Paused | SessionState::Stopped) {
            return Ok(EndOfStream::Continue);
        }

        if playlist.current().is_none() {
            if audio_left > 0 {
                self.set_state(SessionState::Draining);
                return Ok(EndOfStream::Draining);
            }
            self.set_state(SessionState::Stopped);
            return Ok(EndOfStream::Finished);
        }

        if audio_left > 0 {
            return match playlist.peek_next() {
                Some(next) if next.allows_gapless() => {
                    playlist.advance();
                    self.open_track(next, true, source, producer)?;
                    Ok(EndOfStream::Advanced {
                        track: next,
                        gapless: true,
                    })
                }
                _ => {
                    self.set_state(SessionState::Draining);
                    Ok(EndOfStream::Draining)
                }
            };
        }

        match playlist.advance() {
            Some(next) => {
                self.open_track(next, false, source, producer)?;
                Ok(EndOfStream::Advanced {
                    track: next,
                    gapless: false,
                })
            }
            None => {
                self.set_state(SessionState::Stopped);
                Ok(EndOfStream::Finished)
            }
        }
    }

    /// Discard everything queued and stop.
    pub fn stop(&mut self) {
        self.ctx.flush(&FrameKind::ALL);
        self.set_state(SessionState::Stopped);
    }

    /// Mark the current item as unplayable so the end-of-item check moves on.
    pub fn abandon_item(&mut self, reason: &Error) {
        warn!("Abandoning current item: {reason}");
        self.ctx.flush(&[FrameKind::Audio, FrameKind::Video, FrameKind::Void]);
        self.ctx.set_exhausted(FrameKind::Audio, true);
        self.ctx.set_exhausted(FrameKind::Video, true);
    }
}
