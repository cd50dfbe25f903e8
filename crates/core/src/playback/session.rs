use crate::{
    format_timecode, FormationBlock, FormationStore, RulerTick, TimeMap, Viewport, Zoom,
};

/// Everything one editing session reads time from: the formations, the
/// global time cursor, zoom, the visible window and the audio length.
///
/// Only the playback controller mutates a session; everything else reads it
/// through these accessors.
#[derive(Debug, Clone, Default)]
pub struct TimelineSession {
    pub(crate) store: FormationStore,
    pub(crate) global_ms: f64,
    pub(crate) zoom: Zoom,
    pub(crate) viewport: Viewport,
    pub(crate) audio_duration_seconds: Option<f64>,
}

impl TimelineSession {
    pub fn new(store: FormationStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &FormationStore {
        &self.store
    }

    pub fn time_map(&self) -> TimeMap<'_> {
        TimeMap::new(self.store.formations(), self.audio_duration_seconds)
    }

    pub fn global_ms(&self) -> f64 {
        self.global_ms
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    /// Scroll offset and width of the visible timeline window.
    pub fn visible_window(&self) -> Viewport {
        self.viewport
    }

    pub fn audio_duration_seconds(&self) -> Option<f64> {
        self.audio_duration_seconds
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.time_map().total_duration_ms()
    }

    pub fn total_duration_pixels(&self) -> f64 {
        self.time_map().total_duration_pixels(self.zoom)
    }

    pub fn playhead_px(&self) -> f64 {
        self.time_map().playhead_px(self.global_ms, self.zoom)
    }

    pub fn timecode(&self) -> String {
        format_timecode(self.global_ms)
    }

    pub fn formation_blocks(&self) -> Vec<FormationBlock> {
        self.time_map().formation_blocks(self.zoom)
    }

    pub fn ruler(&self) -> Vec<RulerTick> {
        self.time_map().ruler(self.zoom)
    }

    /// Moves the cursor, clamped to the current timeline.
    pub(crate) fn set_global_ms(&mut self, ms: f64) -> f64 {
        let ms = if ms.is_nan() { 0.0 } else { ms };
        self.global_ms = ms.clamp(0.0, self.total_duration_ms());
        self.global_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormationDefaults, ProjectState};

    #[test]
    fn cursor_is_clamped_to_the_timeline() {
        let store = ProjectState::sample().into_store(FormationDefaults::default());
        let mut session = TimelineSession::new(store);
        assert_eq!(session.set_global_ms(1e9), 9_500.0);
        assert_eq!(session.set_global_ms(-3.0), 0.0);
        assert_eq!(session.set_global_ms(f64::NAN), 0.0);
    }

    #[test]
    fn geometry_reflects_zoom_and_cursor() {
        let store = ProjectState::sample().into_store(FormationDefaults::default());
        let mut session = TimelineSession::new(store);
        session.zoom = Zoom::new(2.0);
        session.set_global_ms(4_750.0);
        assert_eq!(session.total_duration_pixels(), 2_280.0);
        assert_eq!(session.playhead_px(), 1_140.0);
        assert_eq!(session.timecode(), "00:04.7");
    }
}
