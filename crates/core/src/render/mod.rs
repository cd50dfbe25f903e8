//! Render dispatch boundary: the events handed to the stage renderer and a
//! small synchronous pub-sub that delivers them.

use std::fmt;

use serde::Serialize;

use crate::{Formation, Marker};

/// A formation's markers captured by value, together with its position in
/// the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormationSnapshot {
    pub formation_id: String,
    pub name: String,
    pub index: usize,
    pub markers: Vec<Marker>,
}

impl FormationSnapshot {
    pub fn of(formation: &Formation, index: usize) -> Self {
        Self {
            formation_id: formation.id.clone(),
            name: formation.name.clone(),
            index,
            markers: formation.markers.clone(),
        }
    }

    /// Snapshot keeping only the markers that `partner` also holds.
    pub fn shared_with(formation: &Formation, index: usize, partner: &Formation) -> Self {
        Self {
            markers: formation
                .markers
                .iter()
                .filter(|marker| partner.marker(&marker.id).is_some())
                .cloned()
                .collect(),
            ..Self::of(formation, index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub from: FormationSnapshot,
    pub to: FormationSnapshot,
    /// Progress through the transition window, always within `[0, 1]`.
    pub blend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseEvent {
    pub formation: FormationSnapshot,
}

/// What the stage should show for one instant of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderEvent {
    Transition(TransitionEvent),
    Pause(PauseEvent),
}

impl RenderEvent {
    /// Blends `from` into `to`. Both snapshots are restricted to the dancers
    /// present on both sides.
    pub fn transition(
        from: &Formation,
        from_index: usize,
        to: &Formation,
        to_index: usize,
        blend: f64,
    ) -> Self {
        Self::Transition(TransitionEvent {
            from: FormationSnapshot::shared_with(from, from_index, to),
            to: FormationSnapshot::shared_with(to, to_index, from),
            blend,
        })
    }

    pub fn pause(formation: &Formation, index: usize) -> Self {
        Self::Pause(PauseEvent {
            formation: FormationSnapshot::of(formation, index),
        })
    }

    /// Index of the formation being reached or held.
    pub fn formation_index(&self) -> usize {
        match self {
            Self::Transition(event) => event.to.index,
            Self::Pause(event) => event.formation.index,
        }
    }

    pub fn formation_id(&self) -> &str {
        match self {
            Self::Transition(event) => &event.to.formation_id,
            Self::Pause(event) => &event.formation.formation_id,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition(_))
    }
}

/// Consumer of render events, typically the stage renderer.
pub trait RenderSink {
    fn render(&mut self, event: &RenderEvent);
}

impl<F> RenderSink for F
where
    F: FnMut(&RenderEvent),
{
    fn render(&mut self, event: &RenderEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Holds the current render event and fans it out to every subscriber.
///
/// Sinks receive a shared reference only, so a sink cannot reach back into
/// the controller that owns this dispatcher while a dispatch is running.
#[derive(Default)]
pub struct RenderDispatcher {
    sinks: Vec<(SubscriptionId, Box<dyn RenderSink>)>,
    next_id: u64,
    current: Option<RenderEvent>,
    dispatched: u64,
}

impl RenderDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: impl RenderSink + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.sinks.push((id, Box::new(sink)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
        before != self.sinks.len()
    }

    /// Replaces the current event and notifies subscribers in registration order.
    pub fn dispatch(&mut self, event: RenderEvent) {
        self.dispatched += 1;
        tracing::trace!(
            formation = event.formation_id(),
            transition = event.is_transition(),
            "dispatching render event"
        );
        let current = self.current.insert(event);
        for (_, sink) in &mut self.sinks {
            sink.render(current);
        }
    }

    pub fn current(&self) -> Option<&RenderEvent> {
        self.current.as_ref()
    }

    /// Number of events dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl fmt::Debug for RenderDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderDispatcher")
            .field("sinks", &self.sinks.len())
            .field("current", &self.current)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
