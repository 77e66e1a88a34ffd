//! Pure negotiation policy.
//!
//! Given what the wallet reports and the flags of the caller, decide the next
//! step. The network check always precedes the account check.

use super::probe::NetworkSnapshot;
use crate::core::{Address, FailureReason};
use serde::{Deserialize, Serialize};

/// Flags controlling which wallet popups a negotiation may open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationPolicy {
    /// Ask the wallet to authorize an account when none is connected.
    pub show_popup: bool,
    /// Ask the wallet to switch to the target chain when on another one.
    pub ask_to_switch_network: bool,
}

impl NegotiationPolicy {
    /// React to what already happened in the wallet; never open a popup.
    pub const PASSIVE: Self = Self {
        show_popup: false,
        ask_to_switch_network: false,
    };

    /// User-initiated connect.
    pub const INTERACTIVE: Self = Self {
        show_popup: true,
        ask_to_switch_network: true,
    };

    pub const fn new(show_popup: bool, ask_to_switch_network: bool) -> Self {
        Self {
            show_popup,
            ask_to_switch_network,
        }
    }
}

/// Next step of a negotiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Everything is in place.
    Connect(Address),
    /// Open the network switch popup; `from_chain` is reported if it fails.
    SwitchNetwork { from_chain: u64 },
    /// Open the account authorization popup.
    RequestAccounts,
    /// Nothing more to try.
    Fail(FailureReason),
}

/// Decide the next negotiation step (pure).
pub fn decide(
    snapshot: &NetworkSnapshot,
    policy: NegotiationPolicy,
    target_chain_id: u64,
) -> Decision {
    if snapshot.chain_id != target_chain_id {
        return if policy.ask_to_switch_network {
            Decision::SwitchNetwork {
                from_chain: snapshot.chain_id,
            }
        } else {
            Decision::Fail(FailureReason::NotMainnet {
                chain_id: snapshot.chain_id,
            })
        };
    }

    match snapshot.active_account() {
        Some(address) => Decision::Connect(address.clone()),
        None if policy.show_popup => Decision::RequestAccounts,
        None => Decision::Fail(FailureReason::NotConnected),
    }
}
