use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the timeline engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub playback: PlaybackConfig,
    pub follow: FollowConfig,
    pub formation: FormationDefaults,
}

impl TimelineConfig {
    /// Reads a configuration file. Missing sections fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Frame pacing and clock acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Target interval between two playback ticks.
    pub frame_interval_ms: u64,
    /// How long `play` waits for a suspended audio device before using the wall clock.
    pub resume_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            resume_timeout_ms: 1_500,
        }
    }
}

/// Comfort margin used to keep the playhead inside the visible timeline window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub min_margin_px: f64,
    pub margin_fraction: f64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            min_margin_px: 40.0,
            margin_fraction: 0.2,
        }
    }
}

impl FollowConfig {
    /// Margin in pixels for a viewport of the given width.
    pub fn margin_px(&self, viewport_width: f64) -> f64 {
        self.min_margin_px
            .max((viewport_width * self.margin_fraction).floor())
    }
}

/// Timing applied to newly created formations and drag-handle limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationDefaults {
    pub duration_seconds: f64,
    pub transition_in_seconds: f64,
    /// Shortest hold a drag handle may leave behind.
    pub min_hold_seconds: f64,
}

impl Default for FormationDefaults {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            transition_in_seconds: 1.0,
            min_hold_seconds: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config = TimelineConfig::from_json(r#"{ "playback": { "frame_interval_ms": 8 } }"#)
            .unwrap();
        assert_eq!(config.playback.frame_interval_ms, 8);
        assert_eq!(config.playback.resume_timeout_ms, 1_500);
        assert_eq!(config.follow, FollowConfig::default());
        assert_eq!(config.formation.duration_seconds, 3.0);
    }

    #[test]
    fn margin_grows_with_wide_viewports() {
        let follow = FollowConfig::default();
        assert_eq!(follow.margin_px(100.0), 40.0);
        assert_eq!(follow.margin_px(1000.0), 200.0);
    }
}
