use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Formation, FormationDefaults, FormationStore, Marker, Result, TimelineError};

/// Project identity as stored alongside the formations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub title: String,
}

/// Persisted document layout: `{ project, formations }`. Only plain data
/// lives here; clocks and playback state are never written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project: ProjectInfo,
    #[serde(default)]
    pub formations: Vec<Formation>,
}

impl ProjectState {
    /// Parses an imported document. Documents without formations are rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(raw)?;
        if state.formations.is_empty() {
            return Err(TimelineError::invalid_project("document has no formations"));
        }
        Ok(state)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Snapshot of a store under the given project identity.
    pub fn capture(project: ProjectInfo, store: &FormationStore) -> Self {
        Self {
            project,
            formations: store.formations().to_vec(),
        }
    }

    pub fn into_store(self, defaults: FormationDefaults) -> FormationStore {
        FormationStore::from_formations(self.formations, defaults)
    }

    /// File name used when exporting: whitespace runs become `_`, lowercased,
    /// suffixed with the export timestamp.
    pub fn export_file_name(&self, timestamp_ms: u128) -> String {
        let slug = self
            .project
            .title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        format!("{slug}_{timestamp_ms}.json")
    }

    /// Built-in three formation choreography with two dancers.
    pub fn sample() -> Self {
        let dancers = |positions: [(f64, f64); 2]| {
            vec![
                Marker::new("m1", "D1", positions[0].0, positions[0].1, "#ef4444"),
                Marker::new("m2", "D2", positions[1].0, positions[1].1, "#3b82f6"),
            ]
        };

        Self {
            project: ProjectInfo {
                id: "proj1".to_string(),
                title: "Coreografia v8.7".to_string(),
            },
            formations: vec![
                Formation {
                    id: "f1".to_string(),
                    name: "Início".to_string(),
                    order: 1,
                    duration_seconds: 2.0,
                    transition_in_seconds: 0.0,
                    markers: dancers([(100.0, 150.0), (200.0, 150.0)]),
                },
                Formation {
                    id: "f2".to_string(),
                    name: "Abertura".to_string(),
                    order: 2,
                    duration_seconds: 1.5,
                    transition_in_seconds: 1.0,
                    markers: dancers([(150.0, 50.0), (150.0, 250.0)]),
                },
                Formation {
                    id: "f3".to_string(),
                    name: "Final".to_string(),
                    order: 3,
                    duration_seconds: 3.0,
                    transition_in_seconds: 2.0,
                    markers: dancers([(400.0, 150.0), (500.0, 150.0)]),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_camel_case_field_names() {
        let json = ProjectState::sample().to_json_pretty().unwrap();
        assert!(json.contains("\"durationSeconds\""));
        assert!(json.contains("\"transitionInSeconds\""));
        assert!(json.contains("\"project\""));
    }

    #[test]
    fn parses_its_own_output() {
        let sample = ProjectState::sample();
        let parsed = ProjectState::from_json(&sample.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn rejects_documents_without_formations() {
        let err = ProjectState::from_json(r#"{ "project": { "id": "p", "title": "t" } }"#)
            .unwrap_err();
        assert!(matches!(err, TimelineError::InvalidProject(_)));
    }

    #[test]
    fn export_name_is_a_slug() {
        let mut state = ProjectState::sample();
        state.project.title = "Grand  Finale Mix".to_string();
        assert_eq!(state.export_file_name(42), "grand_finale_mix_42.json");
    }

    #[test]
    fn loading_into_a_store_renumbers() {
        let mut state = ProjectState::sample();
        state.formations.reverse();
        state.formations[0].order = 30;
        let store = state.into_store(FormationDefaults::default());
        let ids: Vec<&str> = store.formations().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["f1", "f2", "f3"]);
        assert_eq!(store.formations()[2].order, 3);
    }

    #[test]
    fn imported_negative_timing_keeps_later_formations_reachable() {
        let raw = r##"{
            "project": { "id": "p", "title": "t" },
            "formations": [
                { "id": "a", "name": "A", "order": 1, "durationSeconds": 2, "transitionInSeconds": 0 },
                { "id": "b", "name": "B", "order": 2, "durationSeconds": -5, "transitionInSeconds": 1 },
                { "id": "c", "name": "C", "order": 3, "durationSeconds": 3, "transitionInSeconds": 0 }
            ]
        }"##;
        let store = ProjectState::from_json(raw)
            .unwrap()
            .into_store(FormationDefaults::default());
        assert_eq!(store.get("b").unwrap().duration_seconds, 0.0);

        let map = crate::TimeMap::new(store.formations(), None);
        assert_eq!(map.total_duration_ms(), 6_000.0);
        assert_eq!(map.resolve_at_global_ms(5_000.0).unwrap().formation_id(), "c");
    }
}
