//! Phase transition history.
//!
//! Every applied change of connection phase is recorded with its timestamp
//! and the sequence number of the negotiation that produced it.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use wallet_session::core::{ConnectionState, FailureReason, StateTransition};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: ConnectionState::Uninitialized,
///     to: ConnectionState::Disconnected {
///         reason: FailureReason::NotConnected,
///     },
///     timestamp: Utc::now(),
///     sequence: 1,
/// };
/// assert_eq!(transition.sequence, 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Sequence number of the negotiation that produced `to`
    pub sequence: u64,
}

/// Ordered, optionally bounded history of state transitions.
///
/// `record` returns a new history and leaves the original untouched. When a
/// limit is set, the oldest transitions are dropped first.
///
/// # Example
///
/// ```rust
/// use wallet_session::core::{
///     Address, ConnectionState, FailureReason, StateHistory, StateTransition,
/// };
/// use chrono::Utc;
///
/// let disconnected = ConnectionState::Disconnected {
///     reason: FailureReason::NotConnected,
/// };
/// let connected = ConnectionState::Connected {
///     address: Address::from("0xabc"),
/// };
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: ConnectionState::Uninitialized,
///         to: disconnected.clone(),
///         timestamp: Utc::now(),
///         sequence: 1,
///     })
///     .record(StateTransition {
///         from: disconnected,
///         to: connected,
///         timestamp: Utc::now(),
///         sequence: 2,
///     });
///
/// assert_eq!(history.get_path().len(), 3);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: VecDeque<StateTransition<S>>,
    limit: Option<usize>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create a new empty, unbounded history.
    pub fn new() -> Self {
        Self {
            transitions: VecDeque::new(),
            limit: None,
        }
    }

    /// Create a new empty history retaining at most `limit` transitions.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(limit),
            limit: Some(limit),
        }
    }

    /// Record a transition, returning a new history.
    pub fn record(&self, transition: StateTransition<S>) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push_back(transition);
        if let Some(limit) = self.limit {
            while transitions.len() > limit {
                transitions.pop_front();
            }
        }
        Self {
            transitions,
            limit: self.limit,
        }
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the oldest retained transition, then the
    /// `to` state of each transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the oldest and newest retained transitions.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.front(), self.transitions.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Most recently recorded transition.
    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.back()
    }

    /// Get all retained transitions, oldest first.
    pub fn transitions(&self) -> impl ExactSizeIterator<Item = &StateTransition<S>> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Address, ConnectionState, FailureReason};

    fn disconnected() -> ConnectionState {
        ConnectionState::Disconnected {
            reason: FailureReason::NotConnected,
        }
    }

    fn connected() -> ConnectionState {
        ConnectionState::Connected {
            address: Address::from("0xabc"),
        }
    }

    fn transition(
        from: ConnectionState,
        to: ConnectionState,
        sequence: u64,
    ) -> StateTransition<ConnectionState> {
        StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            sequence,
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<ConnectionState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert!(history.last().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = StateHistory::new();
        let new_history =
            history.record(transition(ConnectionState::Uninitialized, disconnected(), 1));

        assert_eq!(history.len(), 0);
        assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = StateHistory::new()
            .record(transition(ConnectionState::Uninitialized, disconnected(), 1))
            .record(transition(disconnected(), connected(), 2));

        let path = history.get_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], &ConnectionState::Uninitialized);
        assert_eq!(path[1], &disconnected());
        assert_eq!(path[2], &connected());
        assert_eq!(history.last().map(|t| t.sequence), Some(2));
    }

    #[test]
    fn limit_drops_oldest_transitions() {
        let mut history = StateHistory::with_limit(2);
        history = history.record(transition(ConnectionState::Uninitialized, disconnected(), 1));
        history = history.record(transition(disconnected(), connected(), 2));
        history = history.record(transition(connected(), disconnected(), 3));

        assert_eq!(history.len(), 2);
        let sequences: Vec<u64> = history.transitions().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
        assert_eq!(history.get_path()[0], &disconnected());
    }

    #[test]
    fn single_transition_has_duration_zero() {
        let history =
            StateHistory::new().record(transition(ConnectionState::Uninitialized, connected(), 1));
        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes_correctly() {
        let history = StateHistory::with_limit(8)
            .record(transition(ConnectionState::Uninitialized, disconnected(), 1));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory<ConnectionState> = serde_json::from_str(&json).unwrap();

        assert_eq!(history.len(), deserialized.len());
    }
}
