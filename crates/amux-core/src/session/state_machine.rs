//! Allowed state transitions (spec §4.5 transition table). Re-entry to the
//! same state and disallowed transitions are both errors; terminal states
//! have no outgoing edges except the universal `-> orphaned` reconciliation
//! edge, which this table also excludes since it is checked separately by
//! the caller (workspace reconciliation, not a user-triggered transition).

use crate::session::types::SessionState;
use SessionState::*;

pub fn is_allowed(from: SessionState, to: SessionState) -> bool {
    matches!(
        (from, to),
        (Created, Starting)
            | (Starting, Running)
            | (Running, Working)
            | (Working, Running)
            | (Running, Stopping)
            | (Working, Stopping)
            | (Stopping, Stopped)
            | (Running, Completed)
            | (Working, Completed)
            | (Running, Failed)
            | (Working, Failed)
            | (Stopping, Failed)
    )
}

/// The reconciliation edge is allowed from any non-terminal state.
pub fn is_allowed_orphan(from: SessionState) -> bool {
    !from.is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_sequence_is_allowed() {
        assert!(is_allowed(Created, Starting));
        assert!(is_allowed(Starting, Running));
        assert!(is_allowed(Running, Working));
        assert!(is_allowed(Working, Running));
        assert!(is_allowed(Running, Stopping));
        assert!(is_allowed(Stopping, Stopped));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(!is_allowed(Stopped, Running));
        assert!(!is_allowed(Failed, Stopping));
        assert!(!is_allowed(Completed, Failed));
    }

    #[test]
    fn reentry_to_same_state_is_not_allowed() {
        assert!(!is_allowed(Running, Running));
        assert!(!is_allowed(Stopped, Stopped));
    }

    #[test]
    fn orphan_edge_allowed_from_any_nonterminal_state() {
        assert!(is_allowed_orphan(Created));
        assert!(is_allowed_orphan(Running));
        assert!(is_allowed_orphan(Working));
        assert!(!is_allowed_orphan(Stopped));
    }
}
