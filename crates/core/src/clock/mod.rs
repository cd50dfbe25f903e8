//! Elapsed-time sources for playback.
//!
//! A [`ClockSource`] is chosen once when playback starts: the audio device
//! clock when a track can play from the requested offset, the frame clock
//! otherwise. Both derive elapsed time from a fixed origin on every read, so
//! nothing accumulates between frames.

use std::{cell::Cell, fmt, rc::Rc};

use serde::Serialize;

use crate::{AudioProvider, PlaybackNode, Result, TimelineError};

/// Distance kept from the end of the buffer when seeking into it.
pub const AUDIO_END_EPSILON_SECONDS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    Audio,
    Wall,
}

/// Time sampled once per frame: the frame timestamp and, when a track is
/// loaded, the device clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    pub frame_ms: f64,
    pub audio_seconds: Option<f64>,
}

pub struct AudioClock {
    node: Option<Box<dyn PlaybackNode>>,
    origin_seconds: f64,
    ended: Rc<Cell<bool>>,
    last_elapsed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct WallClock {
    offset_ms: f64,
    origin_ms: Option<f64>,
    last_elapsed_ms: f64,
}

pub enum ClockSource {
    Audio(AudioClock),
    Wall(WallClock),
}

impl ClockSource {
    /// Frame clock starting at `offset_ms`. Its origin is fixed by the first
    /// frame timestamp it sees.
    pub fn start_wall(offset_ms: f64) -> Self {
        Self::Wall(WallClock {
            offset_ms,
            origin_ms: None,
            last_elapsed_ms: offset_ms,
        })
    }

    /// Starts the loaded track at `offset_ms` and follows the device clock.
    /// Fails when no buffer is loaded, the offset lies past the end of the
    /// buffer, or the device refuses to play.
    pub fn start_audio(provider: &mut dyn AudioProvider, offset_ms: f64) -> Result<Self> {
        let duration = provider
            .duration()
            .filter(|_| provider.is_loaded())
            .ok_or_else(|| TimelineError::audio("no audio buffer loaded"))?;
        let last_playable = (duration - AUDIO_END_EPSILON_SECONDS).max(0.0);
        let requested = offset_ms / 1000.0;
        if requested >= last_playable {
            return Err(TimelineError::audio(format!(
                "offset {requested:.3}s is past the end of the {duration:.3}s buffer"
            )));
        }
        let offset_seconds = requested.max(0.0);

        let mut node = provider.create_playback_node(offset_seconds)?;
        let ended = Rc::new(Cell::new(false));
        let flag = ended.clone();
        node.on_ended(Box::new(move || flag.set(true)));
        node.start()?;

        let origin_seconds = provider.current_time() - offset_seconds;
        Ok(Self::Audio(AudioClock {
            node: Some(node),
            origin_seconds,
            ended,
            last_elapsed_ms: offset_seconds * 1000.0,
        }))
    }

    pub fn kind(&self) -> ClockKind {
        match self {
            Self::Audio(_) => ClockKind::Audio,
            Self::Wall(_) => ClockKind::Wall,
        }
    }

    /// Milliseconds since the timeline start, never decreasing.
    pub fn elapsed_ms(&mut self, reading: ClockReading) -> f64 {
        match self {
            Self::Audio(clock) => {
                if let Some(now) = reading.audio_seconds {
                    let elapsed = (now - clock.origin_seconds) * 1000.0;
                    clock.last_elapsed_ms = clock.last_elapsed_ms.max(elapsed);
                }
                clock.last_elapsed_ms
            }
            Self::Wall(clock) => {
                let origin = *clock
                    .origin_ms
                    .get_or_insert(reading.frame_ms - clock.offset_ms);
                clock.last_elapsed_ms = clock.last_elapsed_ms.max(reading.frame_ms - origin);
                clock.last_elapsed_ms
            }
        }
    }

    /// Last value returned by [`Self::elapsed_ms`].
    pub fn last_elapsed_ms(&self) -> f64 {
        match self {
            Self::Audio(clock) => clock.last_elapsed_ms,
            Self::Wall(clock) => clock.last_elapsed_ms,
        }
    }

    /// True once the audio buffer played out on its own.
    pub fn has_completed(&self) -> bool {
        match self {
            Self::Audio(clock) => clock.ended.get(),
            Self::Wall(_) => false,
        }
    }

    /// Halts and detaches the audio node. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Self::Audio(clock) = self {
            if let Some(mut node) = clock.node.take() {
                node.stop();
            }
        }
    }
}

impl Drop for AudioClock {
    fn drop(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.stop();
        }
    }
}

impl fmt::Debug for AudioClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClock")
            .field("attached", &self.node.is_some())
            .field("origin_seconds", &self.origin_seconds)
            .field("ended", &self.ended.get())
            .field("last_elapsed_ms", &self.last_elapsed_ms)
            .finish()
    }
}

impl fmt::Debug for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio(clock) => clock.fmt(f),
            Self::Wall(clock) => clock.fmt(f),
        }
    }
}
