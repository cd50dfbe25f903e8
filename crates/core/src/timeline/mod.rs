//! Time mapping: conversions between global time, per-formation playback
//! state and pixels on the zoomable timeline.
//!
//! Everything here is a pure function of the formation list, the loaded
//! audio duration and the zoom factor.

mod ruler;
mod viewport;

pub use ruler::{ruler_steps, ruler_ticks, tick_label, RulerSteps, RulerTick, TickKind};
pub use viewport::Viewport;

use serde::{Deserialize, Serialize};

use crate::{Formation, RenderEvent, Result, TimelineError};

/// Timeline scale at zoom 1.
pub const BASE_PX_PER_SEC: f64 = 120.0;

/// Slack used when comparing times that went through float arithmetic.
pub const TIME_EPSILON_MS: f64 = 1e-6;

/// Horizontal zoom of the timeline, clamped to `[0.25, 8]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64")]
pub struct Zoom(f64);

impl Zoom {
    pub const MIN: f64 = 0.25;
    pub const MAX: f64 = 8.0;
    pub const STEP: f64 = 0.25;

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn zoomed_in(self) -> Self {
        Self::new(self.0 + Self::STEP)
    }

    pub fn zoomed_out(self) -> Self {
        Self::new(self.0 - Self::STEP)
    }

    /// Percentage shown next to the zoom buttons.
    pub fn label(self) -> String {
        format!("{}%", (self.0 * 100.0).round())
    }
}

impl From<f64> for Zoom {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Where one formation sits on the timeline, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormationBlock {
    pub formation_id: String,
    pub index: usize,
    pub left_px: f64,
    pub width_px: f64,
    /// Share of the block taken by the incoming transition.
    pub transition_fraction: f64,
}

/// Read-only view over a formation list and the audio duration.
#[derive(Debug, Clone, Copy)]
pub struct TimeMap<'a> {
    formations: &'a [Formation],
    audio_duration_seconds: Option<f64>,
}

impl<'a> TimeMap<'a> {
    pub fn new(formations: &'a [Formation], audio_duration_seconds: Option<f64>) -> Self {
        Self {
            formations,
            audio_duration_seconds,
        }
    }

    pub fn formations(&self) -> &'a [Formation] {
        self.formations
    }

    /// Sum of every formation span.
    pub fn choreography_seconds(&self) -> f64 {
        self.formations.iter().map(Formation::span_seconds).sum()
    }

    /// Longest of the choreography and the audio track, never zero.
    pub fn total_duration_seconds(&self) -> f64 {
        let audio = self
            .audio_duration_seconds
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .unwrap_or(0.0);
        let total = self.choreography_seconds().max(audio);
        if total > 0.0 {
            total
        } else {
            1.0
        }
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_seconds() * 1000.0
    }

    pub fn total_duration_pixels(&self, zoom: Zoom) -> f64 {
        (self.total_duration_seconds() * BASE_PX_PER_SEC * zoom.get())
            .floor()
            .max(1.0)
    }

    pub fn px_per_second(&self, zoom: Zoom) -> f64 {
        self.total_duration_pixels(zoom) / self.total_duration_seconds()
    }

    /// Timestamp where the held pose of formation `index` begins: every span
    /// before it plus its own incoming transition.
    pub fn accumulated_ms_before_formation(&self, index: usize) -> f64 {
        let before: f64 = self
            .formations
            .iter()
            .take(index)
            .map(Formation::span_seconds)
            .sum();
        let own_transition = self
            .formations
            .get(index)
            .map(|f| f.transition_in_seconds)
            .unwrap_or(0.0);
        (before + own_transition) * 1000.0
    }

    pub fn ms_to_px(&self, ms: f64, zoom: Zoom) -> f64 {
        ms / self.total_duration_ms() * self.total_duration_pixels(zoom)
    }

    pub fn px_to_ms(&self, px: f64, zoom: Zoom) -> f64 {
        px / self.total_duration_pixels(zoom) * self.total_duration_ms()
    }

    /// Position of `px` as a fraction of the whole timeline, clamped to `[0, 1]`.
    pub fn fraction_at_px(&self, px: f64, zoom: Zoom) -> f64 {
        let fraction = px / self.total_duration_pixels(zoom);
        if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        }
    }

    /// Global time under a content-relative pixel, clamped to the timeline.
    pub fn ms_at_px(&self, px: f64, zoom: Zoom) -> f64 {
        self.fraction_at_px(px, zoom) * self.total_duration_ms()
    }

    pub fn playhead_px(&self, global_ms: f64, zoom: Zoom) -> f64 {
        let progress = (global_ms / self.total_duration_ms()).clamp(0.0, 1.0);
        progress * self.total_duration_pixels(zoom)
    }

    /// Decides what the stage shows at `global_ms`.
    ///
    /// Each formation owns an incoming transition window followed by its hold
    /// window. A boundary between a hold and the next transition belongs to
    /// the hold; a boundary before a formation without transition belongs to
    /// that formation. The first formation has nothing to blend from, so its
    /// transition window shows it paused. Times past the end hold the last
    /// formation.
    pub fn resolve_at_global_ms(&self, global_ms: f64) -> Result<RenderEvent> {
        let last_index = self
            .formations
            .len()
            .checked_sub(1)
            .ok_or(TimelineError::EmptyTimeline)?;
        let global_ms = if global_ms.is_nan() {
            0.0
        } else {
            global_ms.max(0.0)
        };

        let mut accumulated = 0.0;
        for (index, formation) in self.formations.iter().enumerate() {
            let transition_ms = formation.transition_ms();
            let transition_end = accumulated + transition_ms;

            if transition_ms > 0.0 && global_ms <= transition_end + TIME_EPSILON_MS {
                if index == 0 {
                    return Ok(RenderEvent::pause(formation, index));
                }
                let blend = transition_blend(global_ms - accumulated, transition_ms);
                return Ok(RenderEvent::transition(
                    &self.formations[index - 1],
                    index - 1,
                    formation,
                    index,
                    blend,
                ));
            }

            let hold_end = transition_end + formation.duration_ms();
            let next_blends_in = self
                .formations
                .get(index + 1)
                .map(|next| next.transition_in_seconds > 0.0)
                .unwrap_or(true);
            let inside_hold = global_ms < hold_end - TIME_EPSILON_MS
                || (next_blends_in && global_ms <= hold_end + TIME_EPSILON_MS);
            if inside_hold {
                return Ok(RenderEvent::pause(formation, index));
            }

            accumulated = hold_end;
        }

        Ok(RenderEvent::pause(&self.formations[last_index], last_index))
    }

    /// Block geometry for every formation, laid out left to right.
    pub fn formation_blocks(&self, zoom: Zoom) -> Vec<FormationBlock> {
        let total_seconds = self.total_duration_seconds();
        let total_px = self.total_duration_pixels(zoom);

        let mut left_px = 0.0;
        self.formations
            .iter()
            .enumerate()
            .map(|(index, formation)| {
                let span = formation.span_seconds();
                let width_px = (span / total_seconds * total_px).round().max(1.0);
                let transition_fraction = if span > 0.0 {
                    formation.transition_in_seconds / span
                } else {
                    0.0
                };
                let block = FormationBlock {
                    formation_id: formation.id.clone(),
                    index,
                    left_px,
                    width_px,
                    transition_fraction,
                };
                left_px += width_px;
                block
            })
            .collect()
    }

    /// Ruler ticks across the whole timeline at the given zoom.
    pub fn ruler(&self, zoom: Zoom) -> Vec<RulerTick> {
        ruler_ticks(self.total_duration_seconds(), self.total_duration_pixels(zoom))
    }
}

/// Progress through a transition window. Zero-length windows are already
/// complete, and the result never leaves `[0, 1]`.
pub fn transition_blend(elapsed_ms: f64, window_ms: f64) -> f64 {
    if window_ms <= 0.0 {
        return 1.0;
    }
    (elapsed_ms / window_ms).clamp(0.0, 1.0)
}

/// Formats a timeline position as `00:SS.d` below a minute and `M:SS.d`
/// above. The tenths digit is truncated, not rounded.
pub fn format_timecode(ms: f64) -> String {
    let total_ms = if ms.is_finite() { ms.max(0.0).floor() as u64 } else { 0 };
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let tenths = (total_ms % 1000) / 100;
    if minutes > 0 {
        format!("{minutes}:{seconds:02}.{tenths}")
    } else {
        format!("00:{seconds:02}.{tenths}")
    }
}
