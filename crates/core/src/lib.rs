//! Core library for the formation timeline editor.
//!
//! A choreography is an ordered list of formations, each with an incoming
//! transition window and a hold window. This crate maps that list (and an
//! optional audio track) onto one global time axis, resolves any instant into
//! a render event for the stage, and drives playback from the audio clock or
//! the frame clock. Drawing, decoding and persistence back-ends stay outside;
//! they talk to the core through [`AudioProvider`], [`RenderSink`] and
//! [`ProjectState`].

pub mod analysis;
pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod formation;
pub mod playback;
pub mod project;
pub mod render;
pub mod stage;
pub mod timeline;

pub use analysis::{amplitude_envelope, ENVELOPE_BUCKETS};
pub use audio::{
    AudioProvider, DeviceBehaviour, ManualTime, MonotonicTime, PlaybackNode, ResumeStatus,
    TimeSource, VirtualTrack,
};
pub use clock::{ClockKind, ClockReading, ClockSource, AUDIO_END_EPSILON_SECONDS};
pub use config::{FollowConfig, FormationDefaults, PlaybackConfig, TimelineConfig};
pub use error::{Result, TimelineError};
pub use formation::{Dancer, Formation, FormationStore, Marker, DANCER_PALETTE};
pub use playback::{
    FramePacer, FrameTicket, PlayState, PlaybackController, TickOutcome, TimelineSession,
};
pub use project::{ProjectInfo, ProjectState};
pub use render::{
    FormationSnapshot, PauseEvent, RenderDispatcher, RenderEvent, RenderSink, SubscriptionId,
    TransitionEvent,
};
pub use stage::{lerp, pose, PlacedMarker, StageBounds, GRID_SNAP_PX};
pub use timeline::{
    format_timecode, ruler_steps, ruler_ticks, tick_label, transition_blend, FormationBlock,
    RulerSteps, RulerTick, TickKind, TimeMap, Viewport, Zoom, BASE_PX_PER_SEC, TIME_EPSILON_MS,
};
