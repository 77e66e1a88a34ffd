//! Negotiation outcomes.
//!
//! A [`ConnectionOutcome`] is the value every negotiation produces and the
//! value every listener receives. It is either a usable [`Connection`] or a
//! categorized [`Failure`].

use crate::provider::ProviderHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain id of Ethereum mainnet, the default target network.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Account address as reported by the wallet.
///
/// Addresses are carried verbatim; nothing beyond "the provider returned it"
/// is checked.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Why a negotiation did not produce a usable connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// No wallet capability is present at all.
    NotInstalled,
    /// The wallet has not authorized any account for this site.
    NotConnected,
    /// An account authorization popup is open.
    PendingConnection,
    /// A network switch popup is open.
    PendingNetworkSwitch,
    /// The wallet is on a chain other than the target chain.
    NotMainnet { chain_id: u64 },
}

/// How a failure is expected to be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCategory {
    /// Nothing short of a change in the host environment helps.
    Unrecoverable,
    /// The user can fix it by retrying with popups enabled.
    Actionable,
    /// Resolves by itself on the next provider event.
    Transient,
}

impl FailureReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotInstalled => "NOT_INSTALLED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::PendingConnection => "PENDING_CONNECTION",
            Self::PendingNetworkSwitch => "PENDING_NETWORK_SWITCH",
            Self::NotMainnet { .. } => "NOT_MAINNET",
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Self::NotInstalled => FailureCategory::Unrecoverable,
            Self::NotConnected | Self::NotMainnet { .. } => FailureCategory::Actionable,
            Self::PendingConnection | Self::PendingNetworkSwitch => FailureCategory::Transient,
        }
    }

    /// Pending reasons only ever follow a wallet popup being shown.
    pub fn is_pending(&self) -> bool {
        self.category() == FailureCategory::Transient
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMainnet { chain_id } => write!(f, "NOT_MAINNET (chain {chain_id})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A failed negotiation with an optional human-readable detail, such as the
/// text of a wallet rejection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(flatten)]
    pub reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    pub fn with_detail(reason: FailureReason, detail: Option<String>) -> Self {
        Self { reason, detail }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// A negotiated connection: the wallet capability plus the active account.
#[derive(Clone, Debug)]
pub struct Connection {
    pub provider: ProviderHandle,
    pub address: Address,
}

/// Result of a negotiation.
#[derive(Clone, Debug)]
pub enum ConnectionOutcome {
    Connected(Connection),
    Failure(Failure),
}

impl ConnectionOutcome {
    pub fn connected(provider: ProviderHandle, address: Address) -> Self {
        Self::Connected(Connection { provider, address })
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure(Failure::new(reason))
    }

    pub fn failure_with_detail(reason: FailureReason, detail: Option<String>) -> Self {
        Self::Failure(Failure::with_detail(reason, detail))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::Connected(connection) => Some(&connection.address),
            Self::Failure(_) => None,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Connected(_) => None,
            Self::Failure(failure) => Some(failure.reason),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Connected(_) => None,
            Self::Failure(failure) => failure.detail.as_deref(),
        }
    }
}

/// Provider handles compare by identity.
impl PartialEq for ConnectionOutcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Connected(a), Self::Connected(b)) => {
                a.address == b.address && a.provider.same_provider(&b.provider)
            }
            (Self::Failure(a), Self::Failure(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(connection) => write!(f, "connected as {}", connection.address),
            Self::Failure(failure) => write!(f, "{failure}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_failure_taxonomy() {
        assert_eq!(
            FailureReason::NotInstalled.category(),
            FailureCategory::Unrecoverable
        );
        assert_eq!(
            FailureReason::NotConnected.category(),
            FailureCategory::Actionable
        );
        assert_eq!(
            FailureReason::NotMainnet { chain_id: 4 }.category(),
            FailureCategory::Actionable
        );
        assert!(FailureReason::PendingConnection.is_pending());
        assert!(FailureReason::PendingNetworkSwitch.is_pending());
        assert!(!FailureReason::NotConnected.is_pending());
    }

    #[test]
    fn not_mainnet_serializes_with_chain_id() {
        let failure = Failure::with_detail(
            FailureReason::NotMainnet { chain_id: 5 },
            Some("User rejected the request.".to_string()),
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["reason"], "NOT_MAINNET");
        assert_eq!(json["chain_id"], 5);
        assert_eq!(json["detail"], "User rejected the request.");

        let back: Failure = serde_json::from_value(json).unwrap();
        assert_eq!(back, failure);
    }

    #[test]
    fn failure_without_detail_omits_field() {
        let json = serde_json::to_value(Failure::new(FailureReason::NotInstalled)).unwrap();
        assert_eq!(json, serde_json::json!({ "reason": "NOT_INSTALLED" }));
    }

    #[test]
    fn display_includes_detail() {
        let outcome = ConnectionOutcome::failure_with_detail(
            FailureReason::NotConnected,
            Some("denied".to_string()),
        );
        assert_eq!(outcome.to_string(), "NOT_CONNECTED: denied");
        assert_eq!(outcome.reason(), Some(FailureReason::NotConnected));
        assert_eq!(outcome.detail(), Some("denied"));
        assert!(outcome.address().is_none());
    }
}
