//! Playback controller: the stopped/playing/paused state machine that owns
//! the global time cursor and turns it into render events.
//!
//! Frames are driven from outside through [`PlaybackController::tick`]. Every
//! `play` hands out a [`FrameTicket`]; `pause`, `stop` and any reset retire
//! it, so a frame callback scheduled before the change is ignored.

mod pacer;
mod session;

pub use pacer::FramePacer;
pub use session::TimelineSession;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::{
    AudioProvider, ClockKind, ClockReading, ClockSource, Formation, FormationStore, ProjectInfo,
    ProjectState, RenderDispatcher, RenderEvent, RenderSink, ResumeStatus, Result,
    SubscriptionId, TimelineConfig, Viewport, Zoom, TIME_EPSILON_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Authorisation for frame callbacks of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    generation: u64,
}

/// What a call to [`PlaybackController::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The ticket was retired or nothing is playing; the caller should stop ticking.
    Stale,
    /// Still waiting for the audio device to resume.
    AwaitingDevice,
    Rendered { global_ms: f64 },
    /// Playback reached its end and the controller is now stopped.
    Finished { global_ms: f64 },
}

#[derive(Debug, Clone, Copy)]
struct PendingStart {
    ticket: FrameTicket,
    requested_at_ms: f64,
}

pub struct PlaybackController {
    session: TimelineSession,
    config: TimelineConfig,
    state: PlayState,
    clock: Option<ClockSource>,
    audio: Option<Box<dyn AudioProvider>>,
    dispatcher: RenderDispatcher,
    generation: u64,
    pending: Option<PendingStart>,
}

impl PlaybackController {
    pub fn new(store: FormationStore, config: TimelineConfig) -> Self {
        let mut controller = Self {
            session: TimelineSession::new(store),
            config,
            state: PlayState::Stopped,
            clock: None,
            audio: None,
            dispatcher: RenderDispatcher::new(),
            generation: 0,
            pending: None,
        };
        controller.focus_active();
        controller
    }

    pub fn from_project(state: ProjectState, config: TimelineConfig) -> Self {
        let store = state.into_store(config.formation.clone());
        Self::new(store, config)
    }

    pub fn session(&self) -> &TimelineSession {
        &self.session
    }

    pub fn store(&self) -> &FormationStore {
        self.session.store()
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// True while `play` waits for the audio device.
    pub fn is_starting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn global_ms(&self) -> f64 {
        self.session.global_ms()
    }

    pub fn active_formation_id(&self) -> Option<&str> {
        self.session.store().active_id()
    }

    pub fn current_event(&self) -> Option<&RenderEvent> {
        self.dispatcher.current()
    }

    pub fn clock_kind(&self) -> Option<ClockKind> {
        self.clock.as_ref().map(ClockSource::kind)
    }

    pub fn subscribe(&mut self, sink: impl RenderSink + 'static) -> SubscriptionId {
        self.dispatcher.subscribe(sink)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Waveform summary of the loaded track, passed through for drawing.
    pub fn amplitude_envelope(&self) -> Option<&[f32]> {
        self.audio.as_deref().and_then(|audio| audio.amplitude_envelope())
    }

    /// Snapshot of the formations for persistence.
    pub fn project_state(&self, project: ProjectInfo) -> ProjectState {
        ProjectState::capture(project, self.session.store())
    }

    /// Replaces the whole project. Playback is stopped and the cursor reset
    /// before the new formations are installed.
    #[tracing::instrument(skip_all, fields(project = %state.project.id))]
    pub fn load_project(&mut self, state: ProjectState) {
        self.reset_cursor();
        self.session.store = state.into_store(self.config.formation.clone());
        info!(formations = self.session.store.len(), "project loaded");
        self.render_at(0.0);
    }

    /// Attaches a decoded track. A running playback is paused where it is;
    /// the next `play` picks the clock again from the current cursor.
    pub fn load_audio(&mut self, provider: Box<dyn AudioProvider>) {
        if self.is_playing() || self.pending.is_some() {
            self.halt(PlayState::Paused);
        }
        self.session.audio_duration_seconds = provider.duration();
        info!(duration = ?self.session.audio_duration_seconds, "audio loaded");
        self.audio = Some(provider);
        self.render_at(self.session.global_ms);
    }

    /// Drops the track, stopping playback and resetting the cursor.
    pub fn clear_audio(&mut self) {
        self.reset_cursor();
        self.audio = None;
        self.session.audio_duration_seconds = None;
        self.render_at(0.0);
    }

    /// Starts playback from the cursor. A cursor at zero starts from the held
    /// pose of the active formation instead. Returns `None` on an empty
    /// timeline.
    pub fn play(&mut self, now_ms: f64) -> Option<FrameTicket> {
        if let Some(pending) = self.pending {
            return Some(pending.ticket);
        }
        if self.is_playing() {
            return Some(self.ticket());
        }
        if self.session.store.is_empty() {
            debug!("play ignored on an empty timeline");
            return None;
        }

        self.generation += 1;
        let ticket = self.ticket();

        let mut offset = self.session.global_ms;
        if offset == 0.0 {
            let index = self.session.store.active_index().unwrap_or(0);
            offset = self.session.time_map().accumulated_ms_before_formation(index);
        }
        self.render_at(offset);
        self.follow_playhead();

        if !self.audio_can_play_from(self.session.global_ms) {
            self.begin(ClockKind::Wall);
            return Some(ticket);
        }

        match self.audio.as_deref_mut().map(|audio| audio.resume()) {
            Some(ResumeStatus::Running) => self.begin(ClockKind::Audio),
            Some(ResumeStatus::Pending) => {
                info!("waiting for the audio device to resume");
                self.pending = Some(PendingStart {
                    ticket,
                    requested_at_ms: now_ms,
                });
            }
            Some(ResumeStatus::Denied(reason)) => {
                warn!(%reason, "audio device refused to resume, playing without sound");
                self.begin(ClockKind::Wall);
            }
            None => self.begin(ClockKind::Wall),
        }
        Some(ticket)
    }

    /// Pauses at the exact clock position, re-rendering that instant.
    pub fn pause(&mut self, now_ms: f64) {
        if self.pending.take().is_some() {
            self.generation += 1;
            info!("playback start cancelled");
            return;
        }
        if !self.is_playing() {
            return;
        }

        let reading = self.reading(now_ms);
        let elapsed = self
            .clock
            .as_mut()
            .map(|clock| clock.elapsed_ms(reading))
            .unwrap_or(self.session.global_ms);
        self.halt(PlayState::Paused);
        self.render_at(elapsed);
        self.follow_playhead();
        info!(global_ms = self.session.global_ms, "playback paused");
    }

    /// Stops playback, leaving the cursor where the last frame put it.
    pub fn stop(&mut self) {
        if self.is_playing() || self.pending.is_some() {
            self.halt(PlayState::Stopped);
            info!(global_ms = self.session.global_ms, "playback stopped");
        }
    }

    pub fn toggle(&mut self, now_ms: f64) -> Option<FrameTicket> {
        if self.is_playing() || self.pending.is_some() {
            self.pause(now_ms);
            None
        } else {
            self.play(now_ms)
        }
    }

    /// One animation frame. Frames carrying a retired ticket do nothing.
    pub fn tick(&mut self, ticket: FrameTicket, now_ms: f64) -> TickOutcome {
        if ticket != self.ticket() {
            trace!(?ticket, "ignoring frame from a retired ticket");
            return TickOutcome::Stale;
        }

        if let Some(pending) = self.pending {
            let status = self
                .audio
                .as_deref_mut()
                .map(|audio| audio.resume())
                .unwrap_or_else(|| ResumeStatus::Denied("audio was removed".to_string()));
            match status {
                ResumeStatus::Running => self.begin(ClockKind::Audio),
                ResumeStatus::Denied(reason) => {
                    warn!(%reason, "audio device refused to resume, playing without sound");
                    self.begin(ClockKind::Wall);
                }
                ResumeStatus::Pending => {
                    let waited = now_ms - pending.requested_at_ms;
                    if waited < self.config.playback.resume_timeout_ms as f64 {
                        return TickOutcome::AwaitingDevice;
                    }
                    warn!(waited_ms = waited, "audio device did not resume in time, playing without sound");
                    self.begin(ClockKind::Wall);
                }
            }
        }

        if !self.is_playing() {
            return TickOutcome::Stale;
        }

        if let Some(audio) = self.audio.as_deref_mut() {
            audio.poll_events();
        }
        let reading = self.reading(now_ms);
        let Some(clock) = self.clock.as_mut() else {
            return TickOutcome::Stale;
        };
        let elapsed = clock.elapsed_ms(reading);
        let completed = clock.has_completed();
        let total = self.session.total_duration_ms();

        if elapsed >= total - TIME_EPSILON_MS || completed {
            let global_ms = self.finish(elapsed.min(total));
            return TickOutcome::Finished { global_ms };
        }

        self.render_at(elapsed);
        self.follow_playhead();
        TickOutcome::Rendered {
            global_ms: self.session.global_ms,
        }
    }

    /// Moves the cursor to the time under a pointer at `client_x`, with the
    /// timeline container's left edge at `container_left`.
    pub fn scrub(&mut self, client_x: f64, container_left: f64) -> f64 {
        let content_x = self.session.viewport.content_x(client_x, container_left);
        self.scrub_to_px(content_x)
    }

    /// Moves the cursor to a content-relative pixel, clamped to the timeline.
    pub fn scrub_to_px(&mut self, content_px: f64) -> f64 {
        let ms = self
            .session
            .time_map()
            .ms_at_px(content_px, self.session.zoom);
        self.seek(ms)
    }

    /// Jumps the cursor without changing the play state. A running clock is
    /// restarted from the new position.
    pub fn seek(&mut self, ms: f64) -> f64 {
        self.render_at(ms);
        self.follow_playhead();
        self.reseat_clock();
        self.session.global_ms
    }

    /// Activates the following formation and jumps to its held pose.
    pub fn next_formation(&mut self) -> Option<usize> {
        let target = match self.session.store.active_index() {
            Some(index) if index + 1 < self.session.store.len() => index + 1,
            Some(_) => return None,
            None if !self.session.store.is_empty() => 0,
            None => return None,
        };
        self.jump_to_index(target)
    }

    /// Activates the preceding formation and jumps to its held pose.
    pub fn previous_formation(&mut self) -> Option<usize> {
        let target = self.session.store.active_index()?.checked_sub(1)?;
        self.jump_to_index(target)
    }

    pub fn select_formation(&mut self, id: &str) -> Result<usize> {
        let index = self.session.store.set_active(id)?;
        self.focus_active();
        self.reseat_clock();
        Ok(index)
    }

    pub fn set_zoom(&mut self, zoom: Zoom) {
        self.session.zoom = zoom;
        self.render_at(self.session.global_ms);
        self.follow_playhead();
    }

    pub fn zoom_in(&mut self) -> Zoom {
        self.set_zoom(self.session.zoom.zoomed_in());
        self.session.zoom
    }

    pub fn zoom_out(&mut self) -> Zoom {
        self.set_zoom(self.session.zoom.zoomed_out());
        self.session.zoom
    }

    pub fn reset_zoom(&mut self) -> Zoom {
        self.set_zoom(Zoom::default());
        self.session.zoom
    }

    /// Records the visible window reported by the UI.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.session.viewport = viewport;
    }

    pub fn add_formation(&mut self) -> String {
        let id = self.session.store.add_formation();
        self.focus_active();
        self.reseat_clock();
        id
    }

    pub fn add_formation_after(&mut self, id: &str) -> String {
        let new_id = self.session.store.add_formation_after(id);
        self.focus_active();
        self.reseat_clock();
        new_id
    }

    pub fn remove_formation(&mut self, id: &str) -> Result<Formation> {
        let removed = self.session.store.remove_formation(id)?;
        if self.session.store.is_empty() {
            self.halt(PlayState::Stopped);
        }
        self.focus_active();
        self.reseat_clock();
        Ok(removed)
    }

    /// Applies an edit to the formations, then re-renders the cursor against
    /// the edited timeline.
    pub fn edit<R>(&mut self, edit: impl FnOnce(&mut FormationStore) -> R) -> R {
        let result = edit(&mut self.session.store);
        self.render_at(self.session.global_ms);
        result
    }

    fn ticket(&self) -> FrameTicket {
        FrameTicket {
            generation: self.generation,
        }
    }

    fn reading(&self, now_ms: f64) -> ClockReading {
        ClockReading {
            frame_ms: now_ms,
            audio_seconds: self.audio.as_deref().map(|audio| audio.current_time()),
        }
    }

    fn audio_can_play_from(&self, global_ms: f64) -> bool {
        self.audio
            .as_deref()
            .filter(|audio| audio.is_loaded())
            .and_then(|audio| audio.duration())
            .map(|duration| global_ms / 1000.0 < duration - crate::AUDIO_END_EPSILON_SECONDS)
            .unwrap_or(false)
    }

    /// Creates the clock for the current cursor and enters `Playing`.
    fn begin(&mut self, preferred: ClockKind) {
        self.pending = None;
        self.clock = Some(self.start_clock(preferred));
        self.state = PlayState::Playing;
        info!(
            global_ms = self.session.global_ms,
            clock = ?self.clock_kind(),
            "playback started"
        );
    }

    fn start_clock(&mut self, preferred: ClockKind) -> ClockSource {
        let offset = self.session.global_ms;
        if preferred == ClockKind::Audio {
            if let Some(audio) = self.audio.as_deref_mut() {
                match ClockSource::start_audio(audio, offset) {
                    Ok(clock) => return clock,
                    Err(err) => warn!(%err, "audio clock unavailable, using the frame clock"),
                }
            }
        }
        ClockSource::start_wall(offset)
    }

    /// Restarts a running clock from the current cursor. An audio clock stays
    /// on audio while the cursor is still inside the buffer.
    fn reseat_clock(&mut self) {
        if !self.is_playing() {
            return;
        }
        let preferred = match self.clock.take() {
            Some(mut clock) => {
                clock.stop();
                if clock.kind() == ClockKind::Audio
                    && self.audio_can_play_from(self.session.global_ms)
                {
                    ClockKind::Audio
                } else {
                    ClockKind::Wall
                }
            }
            None => ClockKind::Wall,
        };
        self.clock = Some(self.start_clock(preferred));
        debug!(global_ms = self.session.global_ms, "clock reseated");
    }

    /// Retires the current ticket and tears the clock down.
    fn halt(&mut self, next: PlayState) {
        self.generation += 1;
        self.pending = None;
        if let Some(mut clock) = self.clock.take() {
            clock.stop();
        }
        self.state = next;
    }

    fn finish(&mut self, final_ms: f64) -> f64 {
        self.halt(PlayState::Stopped);
        let total = self.session.total_duration_ms();
        if final_ms >= total - TIME_EPSILON_MS {
            self.session.set_global_ms(total);
            let formations = self.session.store.formations();
            if let Some(last) = formations.last() {
                self.dispatcher
                    .dispatch(RenderEvent::pause(last, formations.len() - 1));
            }
        } else {
            self.render_at(final_ms);
        }
        self.follow_playhead();
        info!(global_ms = self.session.global_ms, "playback finished");
        self.session.global_ms
    }

    fn reset_cursor(&mut self) {
        self.halt(PlayState::Stopped);
        self.session.global_ms = 0.0;
        self.dispatcher.clear();
    }

    fn jump_to_index(&mut self, index: usize) -> Option<usize> {
        let id = self.session.store.formations().get(index)?.id.clone();
        self.select_formation(&id).ok()
    }

    /// Jumps the cursor to the held pose of the active formation.
    fn focus_active(&mut self) {
        let Some(index) = self.session.store.active_index() else {
            self.session.global_ms = 0.0;
            self.dispatcher.clear();
            return;
        };
        let ms = self
            .session
            .time_map()
            .accumulated_ms_before_formation(index);
        self.render_at(ms);
        self.follow_playhead();
    }

    /// Sets the cursor, then resolves and dispatches the event for it.
    fn render_at(&mut self, ms: f64) {
        self.session.set_global_ms(ms);
        match self
            .session
            .time_map()
            .resolve_at_global_ms(self.session.global_ms)
        {
            Ok(event) => self.dispatcher.dispatch(event),
            Err(err) => {
                trace!(%err, "nothing to render");
                self.dispatcher.clear();
            }
        }
    }

    fn follow_playhead(&mut self) {
        let playhead = self.session.playhead_px();
        if let Some(scroll) = self
            .session
            .viewport
            .follow(playhead, &self.config.follow)
        {
            self.session.viewport.scroll_left = scroll;
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("global_ms", &self.session.global_ms)
            .field("clock", &self.clock)
            .field("audio_loaded", &self.audio.is_some())
            .field("generation", &self.generation)
            .field("starting", &self.pending.is_some())
            .finish()
    }
}
