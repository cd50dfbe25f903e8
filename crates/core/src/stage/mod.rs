use serde::{Deserialize, Serialize};

use crate::RenderEvent;

/// Grid step used when a drag snaps to the stage grid.
pub const GRID_SNAP_PX: f64 = 40.0;

/// A dancer at its drawn position for one render event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedMarker {
    pub id: String,
    pub label: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Marker positions a renderer would draw for `event`. Transitions blend
/// linearly and keep the label and color of the outgoing formation.
pub fn pose(event: &RenderEvent) -> Vec<PlacedMarker> {
    match event {
        RenderEvent::Pause(pause) => pause
            .formation
            .markers
            .iter()
            .map(|marker| PlacedMarker {
                id: marker.id.clone(),
                label: marker.label.clone(),
                color: marker.color.clone(),
                x: marker.x,
                y: marker.y,
            })
            .collect(),
        RenderEvent::Transition(transition) => transition
            .from
            .markers
            .iter()
            .filter_map(|from| {
                let to = transition.to.markers.iter().find(|to| to.id == from.id)?;
                Some(PlacedMarker {
                    id: from.id.clone(),
                    label: from.label.clone(),
                    color: from.color.clone(),
                    x: lerp(from.x, to.x, transition.blend),
                    y: lerp(from.y, to.y, transition.blend),
                })
            })
            .collect(),
    }
}

/// Drawable stage area and the size of a marker token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageBounds {
    pub width: f64,
    pub height: f64,
    pub marker_size: f64,
}

impl StageBounds {
    /// Keeps a dragged marker fully on stage, optionally snapping to the grid.
    pub fn constrain(&self, x: f64, y: f64, snap: bool) -> (f64, f64) {
        let x = x.clamp(0.0, (self.width - self.marker_size).max(0.0));
        let y = y.clamp(0.0, (self.height - self.marker_size).max(0.0));
        if snap {
            (
                (x / GRID_SNAP_PX).round() * GRID_SNAP_PX,
                (y / GRID_SNAP_PX).round() * GRID_SNAP_PX,
            )
        } else {
            (x, y)
        }
    }
}
