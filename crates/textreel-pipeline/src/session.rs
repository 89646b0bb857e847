//! Playback session loop: feeds the decoder, paces video against the
//! clock, composes the screen and reacts to commands.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use textreel_core::{Error, FrameKind, Raster, Result};
use tracing::{debug, info, warn};

use crate::collab::{AudioDevice, MediaSource, Playlist, Renderer};
use crate::context::{PipelineContext, SharedRaster};
use crate::producer::FrameProducer;
use crate::sync::{EndOfStream, SessionState, SyncController, Tick};

/// Commands accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    TogglePause,
    /// Seek relative to the current position, in microseconds.
    Seek(i64),
    /// Set volume in percent.
    SetVolume(u32),
    /// Stop playback and discard buffered frames.
    Stop,
    /// Stop and ask every pipeline thread to exit.
    Quit,
}

/// Events emitted by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    FramesDropped(usize),
    TrackAdvanced { index: usize, gapless: bool },
    PlaybackFinished,
    Error(String),
}

/// Client side of a session.
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
}

impl SessionHandle {
    pub fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| Error::Internal(format!("Failed to send command: {e}")))
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.send_command(SessionCommand::TogglePause)
    }

    pub fn seek(&self, delta_us: i64) -> Result<()> {
        self.send_command(SessionCommand::Seek(delta_us))
    }

    pub fn set_volume(&self, percent: u32) -> Result<()> {
        self.send_command(SessionCommand::SetVolume(percent))
    }

    pub fn stop(&self) -> Result<()> {
        self.send_command(SessionCommand::Stop)
    }

    pub fn quit(&self) -> Result<()> {
        self.send_command(SessionCommand::Quit)
    }

    /// Try to receive an event without blocking.
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Collaborators a session drives.
pub struct SessionParts {
    pub source: Box<dyn MediaSource>,
    pub playlist: Box<dyn Playlist>,
    pub device: Arc<dyn AudioDevice>,
    pub renderer: Box<dyn Renderer>,
    /// Visualization raster drawn over video, or shown alone for audio-only media.
    pub overlay: Option<SharedRaster>,
}

/// The render-loop context of the pipeline.
pub struct Session {
    ctx: Arc<PipelineContext>,
    controller: SyncController,
    producer: FrameProducer,
    source: Box<dyn MediaSource>,
    playlist: Box<dyn Playlist>,
    device: Arc<dyn AudioDevice>,
    renderer: Box<dyn Renderer>,
    overlay: Option<SharedRaster>,
    last_video: Option<Raster>,
    reported_state: SessionState,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
}

impl Session {
    pub fn new(ctx: Arc<PipelineContext>, parts: SessionParts) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let session = Self {
            controller: SyncController::new(Arc::clone(&ctx)),
            producer: FrameProducer::new(Arc::clone(&ctx)),
            ctx,
            source: parts.source,
            playlist: parts.playlist,
            device: parts.device,
            renderer: parts.renderer,
            overlay: parts.overlay,
            last_video: None,
            reported_state: SessionState::Starting,
            command_rx,
            event_tx,
        };
        (
            session,
            SessionHandle {
                command_tx,
                event_rx,
            },
        )
    }

    pub const fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Run until the playlist finishes, a stop/quit command arrives, or the
    /// context's quit flag is raised.
    pub fn run(mut self) -> Result<()> {
        info!("Playback session started");
        self.begin()?;

        while !self.ctx.should_quit() {
            if !self.handle_commands() {
                break;
            }
            if !self.step()? {
                break;
            }
        }

        self.ctx.flush(&FrameKind::ALL);
        info!("Playback session ended");
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        match self.playlist.current() {
            Some(track) => {
                if let Err(e) = self.controller.open_track(
                    track,
                    false,
                    self.source.as_mut(),
                    &mut self.producer,
                ) {
                    if !e.ends_current_item() {
                        return Err(e);
                    }
                    self.controller.abandon_item(&e);
                    self.emit(SessionEvent::Error(e.to_string()));
                }
            }
            None => {
                self.controller
                    .set_frame_duration(self.source.frame_duration_us());
                self.controller.start(0);
            }
        }
        self.report_state();
        Ok(())
    }

    /// Apply pending commands. Returns `false` when the session should end.
    fn handle_commands(&mut self) -> bool {
        loop {
            let command = match self.command_rx.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    debug!("Command channel closed, ending session");
                    return false;
                }
            };
            debug!("Session command: {:?}", command);
            match command {
                SessionCommand::TogglePause => {
                    self.controller.toggle_pause();
                }
                SessionCommand::Seek(delta_us) => {
                    if let Err(e) = self.controller.seek(
                        delta_us,
                        self.source.as_mut(),
                        self.device.as_ref(),
                        &mut self.producer,
                    ) {
                        self.emit(SessionEvent::Error(e.to_string()));
                    }
                }
                SessionCommand::SetVolume(percent) => self.ctx.set_volume(percent),
                SessionCommand::Stop => {
                    self.controller.stop();
                    self.report_state();
                    return false;
                }
                SessionCommand::Quit => {
                    self.ctx.request_quit();
                    return false;
                }
            }
            self.report_state();
        }
    }

    /// One iteration of the render loop. Returns `false` once playback is over.
    pub fn step(&mut self) -> Result<bool> {
        match self.controller.check_end_of_stream(
            self.playlist.as_mut(),
            self.source.as_mut(),
            &mut self.producer,
        ) {
            Ok(EndOfStream::Advanced { track, gapless }) => {
                self.last_video = None;
                self.emit(SessionEvent::TrackAdvanced {
                    index: track.index,
                    gapless,
                });
            }
            Ok(EndOfStream::Finished) => {
                self.report_state();
                self.emit(SessionEvent::PlaybackFinished);
                return Ok(false);
            }
            Ok(EndOfStream::Continue | EndOfStream::Draining) => {}
            Err(e) if e.ends_current_item() => {
                self.controller.abandon_item(&e);
                self.emit(SessionEvent::Error(e.to_string()));
            }
            Err(e) => return Err(e),
        }

        if !self.ctx.clock().is_paused() {
            self.pump_source()?;
        }

        let tick = self.controller.tick();
        self.apply(tick);
        self.report_state();
        Ok(true)
    }

    fn pump_source(&mut self) -> Result<()> {
        if self.producer.is_exhausted(FrameKind::Audio) && self.producer.is_exhausted(FrameKind::Video)
        {
            return Ok(());
        }
        match self.source.read_and_buffer(&mut self.producer) {
            Ok(()) => Ok(()),
            Err(e) if e.is_flow_control() => Ok(()),
            Err(e) if e.ends_current_item() => {
                self.controller.abandon_item(&e);
                self.emit(SessionEvent::Error(e.to_string()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn apply(&mut self, tick: Tick) {
        match tick {
            Tick::Wait(duration) => std::thread::sleep(duration),
            Tick::Pending => std::thread::yield_now(),
            Tick::Present(frame) => {
                if let Some(raster) = frame.into_raster() {
                    self.show_video(raster);
                }
            }
            Tick::Dropped { count } => self.emit(SessionEvent::FramesDropped(count)),
            Tick::Refresh => self.refresh(),
            Tick::Paused => {
                self.refresh();
                std::thread::sleep(Duration::from_millis(
                    self.ctx.config().sync.paused_tick_ms,
                ));
            }
        }
    }

    fn show_video(&mut self, mut raster: Raster) {
        self.last_video = Some(raster.clone());
        if let Some(overlay) = &self.overlay {
            raster.overlay_from(&overlay.lock(), 0, 0);
        }
        self.show(&raster);
    }

    /// Redraw without a new video frame: the visualization for audio-only
    /// media, otherwise the last picture.
    fn refresh(&mut self) {
        let screen = match (&self.last_video, &self.overlay) {
            (Some(video), Some(overlay)) => {
                let mut screen = video.clone();
                screen.overlay_from(&overlay.lock(), 0, 0);
                screen
            }
            (Some(video), None) => video.clone(),
            (None, Some(overlay)) => overlay.lock().clone(),
            (None, None) => return,
        };
        self.show(&screen);
    }

    fn show(&mut self, raster: &Raster) {
        let status = self.ctx.status_line();
        if let Err(e) = self.renderer.show(raster, &status) {
            warn!("Renderer failed: {e}");
        }
    }

    fn report_state(&mut self) {
        let state = self.controller.state();
        if state != self.reported_state {
            self.reported_state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}
