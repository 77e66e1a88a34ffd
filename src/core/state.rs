//! State trait and the connection phase view.
//!
//! The session tracks its canonical [`ConnectionOutcome`]; the phase is the
//! serializable projection of that outcome used for history and display.

use super::outcome::{Address, ConnectionOutcome, FailureReason};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for state machine states.
///
/// All methods are pure - no side effects.
///
/// # Required Traits
///
/// - `Clone`: States must be cloneable for history tracking
/// - `PartialEq`: States must be comparable for transition logic
/// - `Debug`: States must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: States must be serializable for display layers
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }

    /// Check if this state is expected to resolve without user action.
    ///
    /// Default implementation returns `false`.
    fn is_transient(&self) -> bool {
        false
    }
}

/// Phase of the provider connection.
///
/// `Uninitialized` only exists between construction and the first applied
/// negotiation. There is no final phase: a session lives as long as the
/// application does.
///
/// # Example
///
/// ```rust
/// use wallet_session::core::{ConnectionState, FailureReason, State};
///
/// let pending = ConnectionState::Pending {
///     reason: FailureReason::PendingConnection,
/// };
/// assert_eq!(pending.name(), "Pending");
/// assert!(pending.is_transient());
/// assert!(!pending.is_error());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ConnectionState {
    Uninitialized,
    Disconnected { reason: FailureReason },
    Pending { reason: FailureReason },
    Connected { address: Address },
}

impl ConnectionState {
    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::Connected { address } => Some(address),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Disconnected { reason } | Self::Pending { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl State for ConnectionState {
    fn name(&self) -> &str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Disconnected { .. } => "Disconnected",
            Self::Pending { .. } => "Pending",
            Self::Connected { .. } => "Connected",
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    fn is_transient(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Pending { .. })
    }
}

impl From<&ConnectionOutcome> for ConnectionState {
    fn from(outcome: &ConnectionOutcome) -> Self {
        match outcome {
            ConnectionOutcome::Connected(connection) => Self::Connected {
                address: connection.address.clone(),
            },
            ConnectionOutcome::Failure(failure) if failure.reason.is_pending() => Self::Pending {
                reason: failure.reason,
            },
            ConnectionOutcome::Failure(failure) => Self::Disconnected {
                reason: failure.reason,
            },
        }
    }
}
