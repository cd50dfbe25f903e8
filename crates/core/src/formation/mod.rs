//! Ordered formation data and every structural edit the editor performs on it.
//!
//! Formations are kept sorted by `order`, and `order` is always the dense
//! sequence `1..=N`: every insertion or removal ends with a renumbering pass.
//! Dancers (markers) are identified by id across formations; label and color
//! edits propagate to every formation, positions stay per formation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{FormationDefaults, Result, StageBounds, TimelineError};

/// Colors handed out to new dancers, in rotation.
pub const DANCER_PALETTE: [&str; 7] = [
    "#ef4444", "#3b82f6", "#22c55e", "#f97316", "#8b5cf6", "#eab308", "#14b8a6",
];

/// A single dancer token placed on the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

impl Marker {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        x: f64,
        y: f64,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            x,
            y,
            color: color.into(),
        }
    }
}

/// A keyframe-like snapshot of every dancer, held for `duration_seconds`
/// after blending in from the previous formation for `transition_in_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formation {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub duration_seconds: f64,
    pub transition_in_seconds: f64,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl Formation {
    /// Total time this formation occupies on the timeline.
    pub fn span_seconds(&self) -> f64 {
        self.transition_in_seconds + self.duration_seconds
    }

    pub fn transition_ms(&self) -> f64 {
        self.transition_in_seconds * 1000.0
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_seconds * 1000.0
    }

    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.id == id)
    }

    fn marker_mut(&mut self, id: &str) -> Option<&mut Marker> {
        self.markers.iter_mut().find(|marker| marker.id == id)
    }
}

/// Cross-formation view of a dancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dancer {
    pub id: String,
    pub label: String,
    pub color: String,
}

/// Owns the formation list, the active formation and the dancer selection.
#[derive(Debug, Clone, Default)]
pub struct FormationStore {
    formations: Vec<Formation>,
    active_id: Option<String>,
    selection: BTreeSet<String>,
    defaults: FormationDefaults,
}

impl FormationStore {
    pub fn new(defaults: FormationDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Builds a store from persisted formations. They are sorted by their
    /// stored `order`, renumbered, and the first one becomes active.
    /// Negative timings are clamped to zero.
    pub fn from_formations(mut formations: Vec<Formation>, defaults: FormationDefaults) -> Self {
        formations.sort_by(|a, b| a.order.cmp(&b.order));
        for formation in &mut formations {
            formation.duration_seconds = non_negative(formation.duration_seconds);
            formation.transition_in_seconds = non_negative(formation.transition_in_seconds);
        }
        let mut store = Self {
            formations,
            active_id: None,
            selection: BTreeSet::new(),
            defaults,
        };
        store.renumber();
        store.active_id = store.formations.first().map(|f| f.id.clone());
        store
    }

    pub fn formations(&self) -> &[Formation] {
        &self.formations
    }

    pub fn len(&self) -> usize {
        self.formations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formations.is_empty()
    }

    pub fn defaults(&self) -> &FormationDefaults {
        &self.defaults
    }

    pub fn get(&self, id: &str) -> Option<&Formation> {
        self.formations.iter().find(|f| f.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.formations.iter().position(|f| f.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_id.as_deref().and_then(|id| self.index_of(id))
    }

    pub fn active(&self) -> Option<&Formation> {
        self.active_index().map(|index| &self.formations[index])
    }

    /// Makes `id` the active formation and returns its index.
    pub fn set_active(&mut self, id: &str) -> Result<usize> {
        let index = self.require_index(id)?;
        self.active_id = Some(id.to_string());
        Ok(index)
    }

    /// Appends a formation cloned from the active one (or, without an active
    /// formation, from the one holding the most markers) and activates it.
    pub fn add_formation(&mut self) -> String {
        let base = self.active_index().or_else(|| self.most_markers_index());
        let order = self.formations.len() as u32 + 1;
        let formation = self.new_formation(order, base);
        let id = formation.id.clone();
        self.formations.push(formation);
        self.active_id = Some(id.clone());
        id
    }

    /// Inserts a formation right after `id`, cloning its markers. Unknown ids
    /// append at the end with the same fallback as [`Self::add_formation`].
    pub fn add_formation_after(&mut self, id: &str) -> String {
        let (position, base) = match self.index_of(id) {
            Some(index) => (index + 1, Some(index)),
            None => (self.formations.len(), self.most_markers_index()),
        };
        let formation = self.new_formation(position as u32 + 1, base);
        let new_id = formation.id.clone();
        self.formations.insert(position, formation);
        self.renumber();
        self.active_id = Some(new_id.clone());
        new_id
    }

    /// Removes a formation. When it was active, activity falls to the first
    /// remaining formation, or to nothing on an empty list.
    pub fn remove_formation(&mut self, id: &str) -> Result<Formation> {
        let index = self.require_index(id)?;
        let removed = self.formations.remove(index);
        self.renumber();

        let active_survives = self
            .active_id
            .as_deref()
            .map(|active| self.index_of(active).is_some())
            .unwrap_or(false);
        if !active_survives {
            self.active_id = self.formations.first().map(|f| f.id.clone());
        }
        Ok(removed)
    }

    /// Renames a formation. Blank names are ignored.
    pub fn rename_formation(&mut self, id: &str, name: &str) -> Result<()> {
        let formation = self.require_mut(id)?;
        let name = name.trim();
        if !name.is_empty() {
            formation.name = name.to_string();
        }
        Ok(())
    }

    pub fn set_duration(&mut self, id: &str, seconds: f64) -> Result<()> {
        self.require_mut(id)?.duration_seconds = non_negative(seconds);
        Ok(())
    }

    pub fn set_transition_in(&mut self, id: &str, seconds: f64) -> Result<()> {
        self.require_mut(id)?.transition_in_seconds = non_negative(seconds);
        Ok(())
    }

    /// Moves the split point between transition and hold, keeping the span
    /// fixed. The hold never shrinks below the configured minimum unless the
    /// span itself is shorter. Returns the applied transition time.
    pub fn set_split(&mut self, id: &str, transition_seconds: f64) -> Result<f64> {
        let min_hold = self.defaults.min_hold_seconds;
        let formation = self.require_mut(id)?;
        let span = formation.span_seconds();
        let upper = (span - min_hold).max(0.0);
        let transition = non_negative(transition_seconds).min(upper);
        formation.transition_in_seconds = transition;
        formation.duration_seconds = span - transition;
        Ok(transition)
    }

    /// Applies a split-handle drag of `dx_px` pixels over a block drawn
    /// `block_width_px` wide, starting from `start_transition_seconds`.
    pub fn drag_split(
        &mut self,
        id: &str,
        start_transition_seconds: f64,
        dx_px: f64,
        block_width_px: f64,
    ) -> Result<f64> {
        let span = self.require(id)?.span_seconds();
        let seconds_per_px = span / block_width_px.max(1.0);
        self.set_split(id, start_transition_seconds + dx_px * seconds_per_px)
    }

    /// Applies an end-handle drag: the hold grows or shrinks by `dx_px` at the
    /// given scale, never below the minimum hold. Returns the new duration.
    pub fn drag_end(
        &mut self,
        id: &str,
        start_duration_seconds: f64,
        dx_px: f64,
        px_per_second: f64,
    ) -> Result<f64> {
        let min_hold = self.defaults.min_hold_seconds;
        let delta = if px_per_second > 0.0 {
            dx_px / px_per_second
        } else {
            0.0
        };
        let duration = (start_duration_seconds + delta).max(min_hold);
        self.require_mut(id)?.duration_seconds = duration;
        Ok(duration)
    }

    /// Adds a dancer to every formation that does not already hold it.
    /// An existing dancer with the same id takes the new color.
    pub fn add_marker_to_all(&mut self, marker: Marker) {
        for formation in &mut self.formations {
            match formation.marker_mut(&marker.id) {
                Some(existing) => existing.color = marker.color.clone(),
                None => formation.markers.push(marker.clone()),
            }
        }
    }

    /// Creates a new dancer at `(x, y)` in every formation with a fresh id and
    /// the next palette color.
    pub fn add_dancer(&mut self, label: &str, x: f64, y: f64) -> String {
        let id = Uuid::new_v4().to_string();
        let color = DANCER_PALETTE[self.dancers().len() % DANCER_PALETTE.len()];
        self.add_marker_to_all(Marker::new(id.clone(), label.trim(), x, y, color));
        id
    }

    /// Removes a dancer from every formation and from the selection.
    pub fn remove_marker_from_all(&mut self, marker_id: &str) -> Result<()> {
        let mut removed = 0;
        for formation in &mut self.formations {
            let before = formation.markers.len();
            formation.markers.retain(|marker| marker.id != marker_id);
            removed += before - formation.markers.len();
        }
        self.selection.remove(marker_id);

        if removed == 0 {
            return Err(TimelineError::UnknownMarker(marker_id.to_string()));
        }
        Ok(())
    }

    /// Sets the color of the given dancers everywhere. Returns how many
    /// markers changed.
    pub fn recolor_markers<I, S>(&mut self, ids: I, color: &str) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        let mut touched = 0;
        for marker in self
            .formations
            .iter_mut()
            .flat_map(|formation| formation.markers.iter_mut())
            .filter(|marker| ids.contains(&marker.id))
        {
            marker.color = color.to_string();
            touched += 1;
        }
        touched
    }

    /// Relabels a dancer in every formation. Blank labels are ignored.
    pub fn rename_dancer(&mut self, marker_id: &str, label: &str) -> Result<()> {
        let label = label.trim();
        let mut found = false;
        for marker in self
            .formations
            .iter_mut()
            .flat_map(|formation| formation.markers.iter_mut())
            .filter(|marker| marker.id == marker_id)
        {
            found = true;
            if !label.is_empty() {
                marker.label = label.to_string();
            }
        }

        if found {
            Ok(())
        } else {
            Err(TimelineError::UnknownMarker(marker_id.to_string()))
        }
    }

    /// Repositions a dancer inside a single formation.
    pub fn move_marker(&mut self, formation_id: &str, marker_id: &str, x: f64, y: f64) -> Result<()> {
        let formation = self.require_mut(formation_id)?;
        let marker = formation
            .marker_mut(marker_id)
            .ok_or_else(|| TimelineError::UnknownMarker(marker_id.to_string()))?;
        marker.x = x;
        marker.y = y;
        Ok(())
    }

    /// Moves a dancer dragged on stage, keeping it inside `bounds` and
    /// optionally snapping to the grid. Returns the stored position.
    pub fn drag_marker(
        &mut self,
        formation_id: &str,
        marker_id: &str,
        x: f64,
        y: f64,
        bounds: &StageBounds,
        snap: bool,
    ) -> Result<(f64, f64)> {
        let (x, y) = bounds.constrain(x, y, snap);
        self.move_marker(formation_id, marker_id, x, y)?;
        Ok((x, y))
    }

    /// Unique dancers across formations (first occurrence wins), sorted by
    /// label ignoring case.
    pub fn dancers(&self) -> Vec<Dancer> {
        let mut seen = BTreeSet::new();
        let mut dancers: Vec<Dancer> = self
            .formations
            .iter()
            .flat_map(|formation| formation.markers.iter())
            .filter(|marker| seen.insert(marker.id.clone()))
            .map(|marker| Dancer {
                id: marker.id.clone(),
                label: marker.label.clone(),
                color: marker.color.clone(),
            })
            .collect();
        dancers.sort_by_key(|dancer| dancer.label.to_lowercase());
        dancers
    }

    /// Dancers whose label contains `term`, ignoring case. A blank term
    /// returns every dancer.
    pub fn search_dancers(&self, term: &str) -> Vec<Dancer> {
        let term = term.trim().to_lowercase();
        let dancers = self.dancers();
        if term.is_empty() {
            return dancers;
        }
        dancers
            .into_iter()
            .filter(|dancer| dancer.label.to_lowercase().contains(&term))
            .collect()
    }

    pub fn select(&mut self, marker_id: &str) {
        self.selection.insert(marker_id.to_string());
    }

    pub fn deselect(&mut self, marker_id: &str) {
        self.selection.remove(marker_id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    fn new_formation(&self, order: u32, base: Option<usize>) -> Formation {
        Formation {
            id: Uuid::new_v4().to_string(),
            name: format!("Formation {order}"),
            order,
            duration_seconds: self.defaults.duration_seconds,
            transition_in_seconds: self.defaults.transition_in_seconds,
            markers: base
                .map(|index| self.formations[index].markers.clone())
                .unwrap_or_default(),
        }
    }

    fn most_markers_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, formation) in self.formations.iter().enumerate() {
            match best {
                Some(current) if formation.markers.len() <= self.formations[current].markers.len() => {}
                _ => best = Some(index),
            }
        }
        best
    }

    fn renumber(&mut self) {
        for (index, formation) in self.formations.iter_mut().enumerate() {
            formation.order = index as u32 + 1;
        }
    }

    fn require_index(&self, id: &str) -> Result<usize> {
        self.index_of(id)
            .ok_or_else(|| TimelineError::UnknownFormation(id.to_string()))
    }

    fn require(&self, id: &str) -> Result<&Formation> {
        self.get(id)
            .ok_or_else(|| TimelineError::UnknownFormation(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Formation> {
        self.formations
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| TimelineError::UnknownFormation(id.to_string()))
    }
}

/// Clamps to `>= 0`, mapping NaN to zero.
fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}
