use std::collections::HashMap;

use amux_protocol::EntityKind;
use serde::{Deserialize, Serialize};

/// Persisted state for the index allocator (C1): one arena (`counters`) and
/// one free-list (`released`) per entity kind, plus the live `active` map.
///
/// Invariants maintained by every mutating method on [`super::manager::IndexManager`]:
/// - `active[kind]` and `released[kind]` are disjoint.
/// - `max(active[kind].keys() ∪ released[kind]) <= counters[kind]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexState {
    #[serde(default)]
    pub counters: HashMap<EntityKind, u64>,
    #[serde(default)]
    pub active: HashMap<EntityKind, HashMap<u64, String>>,
    #[serde(default)]
    pub released: HashMap<EntityKind, Vec<u64>>,
}

impl IndexState {
    pub fn counter_for(&self, kind: &EntityKind) -> u64 {
        self.counters.get(kind).copied().unwrap_or(0)
    }

    pub fn active_for(&self, kind: &EntityKind) -> &HashMap<u64, String> {
        static EMPTY: std::sync::OnceLock<HashMap<u64, String>> = std::sync::OnceLock::new();
        self.active
            .get(kind)
            .unwrap_or_else(|| EMPTY.get_or_init(HashMap::new))
    }

    pub fn released_for(&self, kind: &EntityKind) -> &[u64] {
        self.released.get(kind).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_yaml() {
        let mut state = IndexState::default();
        state.counters.insert(EntityKind::Workspace, 3);
        state
            .active
            .insert(EntityKind::Workspace, HashMap::from([(1, "ws-a".to_string())]));
        state
            .released
            .insert(EntityKind::Workspace, vec![2]);

        let yaml = serde_yaml::to_string(&state).unwrap();
        let back: IndexState = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.counter_for(&EntityKind::Workspace), 3);
        assert_eq!(
            back.active_for(&EntityKind::Workspace).get(&1),
            Some(&"ws-a".to_string())
        );
        assert_eq!(back.released_for(&EntityKind::Workspace), &[2]);
    }

    #[test]
    fn missing_file_contents_parse_as_default() {
        let state: IndexState = serde_yaml::from_str("{}").unwrap();
        assert_eq!(state.counter_for(&EntityKind::Session), 0);
        assert!(state.active_for(&EntityKind::Session).is_empty());
    }
}
