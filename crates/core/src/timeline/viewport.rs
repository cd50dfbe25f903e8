use serde::{Deserialize, Serialize};

use crate::FollowConfig;

/// Visible slice of the scrollable timeline content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_left: f64,
    pub width: f64,
}

impl Viewport {
    pub fn new(scroll_left: f64, width: f64) -> Self {
        Self {
            scroll_left: scroll_left.max(0.0),
            width: width.max(0.0),
        }
    }

    pub fn end(&self) -> f64 {
        self.scroll_left + self.width
    }

    /// Converts a pointer x coordinate into content pixels, given the left
    /// edge of the timeline container on screen.
    pub fn content_x(&self, client_x: f64, container_left: f64) -> f64 {
        client_x - container_left + self.scroll_left
    }

    /// New scroll offset that re-centres the playhead once it gets closer
    /// than the comfort margin to either edge, or `None` when it is fine.
    pub fn follow(&self, playhead_px: f64, follow: &FollowConfig) -> Option<f64> {
        let margin = follow.margin_px(self.width);
        let left_guard = self.scroll_left + margin;
        let right_guard = self.end() - margin;

        if playhead_px < left_guard || playhead_px > right_guard {
            let target = (playhead_px - self.width * 0.5).floor().max(0.0);
            if target != self.scroll_left {
                return Some(target);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recentres_past_the_right_guard() {
        let viewport = Viewport::new(0.0, 400.0);
        let follow = FollowConfig::default();
        // margin is 80px, so the right guard sits at 320px.
        assert_eq!(viewport.follow(300.0, &follow), None);
        assert_eq!(viewport.follow(330.0, &follow), Some(130.0));
    }

    #[test]
    fn left_edge_never_scrolls_negative() {
        let viewport = Viewport::new(500.0, 400.0);
        let follow = FollowConfig::default();
        assert_eq!(viewport.follow(100.0, &follow), Some(0.0));
        assert_eq!(Viewport::new(0.0, 400.0).follow(10.0, &follow), None);
    }

    #[test]
    fn content_x_includes_scroll() {
        let viewport = Viewport::new(250.0, 400.0);
        assert_eq!(viewport.content_x(130.0, 30.0), 350.0);
    }
}
