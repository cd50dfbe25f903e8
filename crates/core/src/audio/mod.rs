//! Audio collaborator boundary.
//!
//! Decoding and device output live outside the core; the playback engine only
//! talks to an [`AudioProvider`]. [`VirtualTrack`] is an in-process provider
//! driven by a [`TimeSource`], used by the CLI and by tests.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    time::Instant,
};

use crate::{amplitude_envelope, Result, TimelineError, ENVELOPE_BUCKETS};

/// Outcome of asking a (possibly suspended) audio device to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeStatus {
    Running,
    /// Still waiting; ask again on a later frame.
    Pending,
    Denied(String),
}

/// A one-shot playback of the loaded buffer from a fixed offset.
pub trait PlaybackNode {
    fn start(&mut self) -> Result<()>;
    /// Halts playback. Stopping a node that is not playing is a no-op.
    fn stop(&mut self);
    /// Registers the callback fired when the buffer runs out on its own.
    fn on_ended(&mut self, callback: Box<dyn FnMut()>);
}

/// The narrow audio surface the timeline engine consumes.
pub trait AudioProvider {
    fn is_loaded(&self) -> bool;
    fn duration(&self) -> Option<f64>;
    /// Normalised waveform summary, passed through for drawing.
    fn amplitude_envelope(&self) -> Option<&[f32]>;
    fn create_playback_node(&mut self, start_offset_seconds: f64) -> Result<Box<dyn PlaybackNode>>;
    /// Device clock in seconds.
    fn current_time(&self) -> f64;
    /// Requests the device to run and reports where that request stands.
    fn resume(&mut self) -> ResumeStatus;
    /// Delivers pending device callbacks (such as end of buffer) on the
    /// caller's thread.
    fn poll_events(&mut self) {}
}

/// Monotonic seconds used as a device clock.
pub trait TimeSource {
    fn now_seconds(&self) -> f64;
}

/// Wall time elapsed since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ManualTime(Rc<Cell<f64>>);

impl ManualTime {
    pub fn new(seconds: f64) -> Self {
        Self(Rc::new(Cell::new(seconds)))
    }

    pub fn set(&self, seconds: f64) {
        self.0.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.0.set(self.0.get() + seconds);
    }
}

impl TimeSource for ManualTime {
    fn now_seconds(&self) -> f64 {
        self.0.get()
    }
}

/// How a [`VirtualTrack`]'s device answers resume requests.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceBehaviour {
    Running,
    /// Suspended; runs once this many seconds passed since the first request.
    ResumesAfter(f64),
    Denied(String),
    /// Suspended forever; every request stays pending.
    NeverResumes,
}

struct NodeState {
    offset_seconds: f64,
    started_at: Option<f64>,
    stopped: bool,
    ended: bool,
    on_ended: Option<Box<dyn FnMut()>>,
}

/// Audio provider playing a buffer of known length against a [`TimeSource`].
pub struct VirtualTrack<T: TimeSource> {
    time: T,
    duration_seconds: f64,
    envelope: Vec<f32>,
    behaviour: DeviceBehaviour,
    running: bool,
    resume_requested_at: Option<f64>,
    active: Option<Rc<RefCell<NodeState>>>,
}

impl<T: TimeSource + Clone + 'static> VirtualTrack<T> {
    /// A silent track of the given length.
    pub fn silent(duration_seconds: f64, time: T) -> Self {
        Self::with_envelope(duration_seconds, vec![0.0; ENVELOPE_BUCKETS], time)
    }

    /// A track built from decoded mono samples.
    pub fn from_samples(samples: &[f32], sample_rate: u32, time: T) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TimelineError::audio("sample rate must be positive"));
        }
        let duration = samples.len() as f64 / f64::from(sample_rate);
        Ok(Self::with_envelope(
            duration,
            amplitude_envelope(samples, ENVELOPE_BUCKETS),
            time,
        ))
    }

    fn with_envelope(duration_seconds: f64, envelope: Vec<f32>, time: T) -> Self {
        Self {
            time,
            duration_seconds: duration_seconds.max(0.0),
            envelope,
            behaviour: DeviceBehaviour::Running,
            running: true,
            resume_requested_at: None,
            active: None,
        }
    }

    /// Sets how the device answers resume requests. Anything other than
    /// [`DeviceBehaviour::Running`] starts the device suspended.
    pub fn with_device(mut self, behaviour: DeviceBehaviour) -> Self {
        self.running = behaviour == DeviceBehaviour::Running;
        self.behaviour = behaviour;
        self
    }

    /// Whether a node is currently producing sound.
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .map(|node| {
                let node = node.borrow();
                node.started_at.is_some() && !node.stopped && !node.ended
            })
            .unwrap_or(false)
    }
}

impl<T: TimeSource + Clone + 'static> AudioProvider for VirtualTrack<T> {
    fn is_loaded(&self) -> bool {
        true
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration_seconds)
    }

    fn amplitude_envelope(&self) -> Option<&[f32]> {
        Some(&self.envelope)
    }

    fn create_playback_node(&mut self, start_offset_seconds: f64) -> Result<Box<dyn PlaybackNode>> {
        if !self.running {
            return Err(TimelineError::audio("device is not running"));
        }
        let state = Rc::new(RefCell::new(NodeState {
            offset_seconds: start_offset_seconds,
            started_at: None,
            stopped: false,
            ended: false,
            on_ended: None,
        }));
        self.active = Some(state.clone());
        Ok(Box::new(VirtualNode {
            state,
            time: self.time.clone(),
        }))
    }

    fn current_time(&self) -> f64 {
        self.time.now_seconds()
    }

    fn resume(&mut self) -> ResumeStatus {
        if self.running {
            return ResumeStatus::Running;
        }
        let now = self.time.now_seconds();
        match &self.behaviour {
            DeviceBehaviour::Running => {
                self.running = true;
                ResumeStatus::Running
            }
            DeviceBehaviour::ResumesAfter(delay) => {
                let requested_at = *self.resume_requested_at.get_or_insert(now);
                if now - requested_at >= *delay {
                    self.running = true;
                    ResumeStatus::Running
                } else {
                    ResumeStatus::Pending
                }
            }
            DeviceBehaviour::Denied(reason) => ResumeStatus::Denied(reason.clone()),
            DeviceBehaviour::NeverResumes => ResumeStatus::Pending,
        }
    }

    fn poll_events(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let now = self.time.now_seconds();
        let callback = {
            let mut node = active.borrow_mut();
            let Some(started_at) = node.started_at else {
                return;
            };
            let position = node.offset_seconds + (now - started_at);
            if node.stopped || node.ended || position < self.duration_seconds {
                return;
            }
            node.ended = true;
            node.on_ended.take()
        };
        if let Some(mut callback) = callback {
            callback();
        }
    }
}

impl<T: TimeSource> fmt::Debug for VirtualTrack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTrack")
            .field("duration_seconds", &self.duration_seconds)
            .field("behaviour", &self.behaviour)
            .field("running", &self.running)
            .finish()
    }
}

struct VirtualNode<T: TimeSource> {
    state: Rc<RefCell<NodeState>>,
    time: T,
}

impl<T: TimeSource> PlaybackNode for VirtualNode<T> {
    fn start(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.started_at.is_some() {
            return Err(TimelineError::audio("playback node already started"));
        }
        state.started_at = Some(self.time.now_seconds());
        Ok(())
    }

    fn stop(&mut self) {
        self.state.borrow_mut().stopped = true;
    }

    fn on_ended(&mut self, callback: Box<dyn FnMut()>) {
        self.state.borrow_mut().on_ended = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_ended_once_the_buffer_runs_out() {
        let time = ManualTime::new(10.0);
        let mut track = VirtualTrack::silent(4.0, time.clone());
        let ended = Rc::new(Cell::new(0));

        let mut node = track.create_playback_node(1.0).unwrap();
        let counter = ended.clone();
        node.on_ended(Box::new(move || counter.set(counter.get() + 1)));
        node.start().unwrap();
        assert!(track.is_playing());

        time.advance(2.9);
        track.poll_events();
        assert_eq!(ended.get(), 0);

        time.advance(0.2);
        track.poll_events();
        track.poll_events();
        assert_eq!(ended.get(), 1);
        assert!(!track.is_playing());
    }

    #[test]
    fn stopped_nodes_never_end() {
        let time = ManualTime::new(0.0);
        let mut track = VirtualTrack::silent(1.0, time.clone());
        let ended = Rc::new(Cell::new(false));

        let mut node = track.create_playback_node(0.0).unwrap();
        let flag = ended.clone();
        node.on_ended(Box::new(move || flag.set(true)));
        node.start().unwrap();
        node.stop();
        node.stop();

        time.advance(5.0);
        track.poll_events();
        assert!(!ended.get());
    }

    #[test]
    fn delayed_resume_reports_pending_first() {
        let time = ManualTime::new(0.0);
        let mut track =
            VirtualTrack::silent(1.0, time.clone()).with_device(DeviceBehaviour::ResumesAfter(0.5));
        assert_eq!(track.resume(), ResumeStatus::Pending);
        assert!(track.create_playback_node(0.0).is_err());

        time.advance(0.5);
        assert_eq!(track.resume(), ResumeStatus::Running);
        assert!(track.create_playback_node(0.0).is_ok());
    }

    #[test]
    fn samples_define_duration_and_envelope() {
        let samples = vec![0.5_f32; 48_000];
        let track = VirtualTrack::from_samples(&samples, 24_000, MonotonicTime::new()).unwrap();
        assert_eq!(track.duration(), Some(2.0));
        assert_eq!(track.amplitude_envelope().unwrap().len(), ENVELOPE_BUCKETS);
        assert!(VirtualTrack::from_samples(&samples, 0, MonotonicTime::new()).is_err());
    }
}
