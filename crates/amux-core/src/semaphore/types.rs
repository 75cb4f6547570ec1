use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One holder currently counted against a semaphore's capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Persisted semaphore state: `{capacity, holders: [{id, acquired_at}...]}`.
///
/// Invariants maintained by [`super::manager::FileSemaphore`]:
/// - `0 <= holders.len() <= capacity`.
/// - holder IDs are unique within a semaphore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreState {
    pub capacity: u32,
    #[serde(default)]
    pub holders: Vec<Holder>,
}

impl SemaphoreState {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: clamp_capacity(capacity),
            holders: Vec::new(),
        }
    }
}

/// `capacity < 1` is clamped to 1 (spec §4.2).
pub fn clamp_capacity(capacity: u32) -> u32 {
    capacity.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let mut state = SemaphoreState::new(2);
        state.holders.push(Holder {
            id: "session-1".to_string(),
            acquired_at: Utc::now(),
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: SemaphoreState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.capacity, 2);
        assert_eq!(back.holders.len(), 1);
        assert_eq!(back.holders[0].id, "session-1");
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        assert_eq!(clamp_capacity(0), 1);
        assert_eq!(clamp_capacity(5), 5);
    }
}
