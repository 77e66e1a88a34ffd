//! Connection negotiation.
//!
//! The decision of what to do next is a pure function of the probed wallet
//! state ([`policy::decide`]); this module runs the probe, executes the
//! decision against the wallet and turns popup results into outcomes.

mod policy;
mod probe;

pub use policy::{decide, Decision, NegotiationPolicy};
pub use probe::{probe, NetworkSnapshot};

use crate::core::{ConnectionOutcome, FailureReason, MAINNET_CHAIN_ID};
use crate::provider::{ProviderHandle, RpcRequest, WalletError};
use tracing::debug;

/// Reconciles the desired network/account state with the wallet's.
#[derive(Clone, Debug)]
pub struct Negotiator {
    provider: Option<ProviderHandle>,
    target_chain_id: u64,
}

impl Negotiator {
    pub fn new(provider: Option<ProviderHandle>, target_chain_id: u64) -> Self {
        Self {
            provider,
            target_chain_id,
        }
    }

    /// Negotiator targeting mainnet.
    pub fn mainnet(provider: Option<ProviderHandle>) -> Self {
        Self::new(provider, MAINNET_CHAIN_ID)
    }

    pub fn provider(&self) -> Option<&ProviderHandle> {
        self.provider.as_ref()
    }

    pub fn target_chain_id(&self) -> u64 {
        self.target_chain_id
    }

    /// Negotiate once.
    ///
    /// Popup rejections are folded into the corresponding non-pending failure
    /// with the rejection text as detail. Errors from the probe itself are
    /// returned to the caller.
    pub async fn negotiate(
        &self,
        policy: NegotiationPolicy,
    ) -> Result<ConnectionOutcome, WalletError> {
        let Some(provider) = &self.provider else {
            return Ok(ConnectionOutcome::failure(FailureReason::NotInstalled));
        };

        let snapshot = probe(&**provider).await?;
        let outcome = match decide(&snapshot, policy, self.target_chain_id) {
            Decision::Connect(address) => ConnectionOutcome::connected(provider.clone(), address),
            Decision::Fail(reason) => ConnectionOutcome::failure(reason),
            Decision::SwitchNetwork { from_chain } => {
                match provider
                    .request(RpcRequest::switch_chain(self.target_chain_id))
                    .await
                {
                    Ok(_) => ConnectionOutcome::failure(FailureReason::PendingNetworkSwitch),
                    Err(err) => {
                        debug!(chain_id = from_chain, error = %err, "network switch declined");
                        ConnectionOutcome::failure_with_detail(
                            FailureReason::NotMainnet {
                                chain_id: from_chain,
                            },
                            Some(err.user_message()),
                        )
                    }
                }
            }
            Decision::RequestAccounts => match provider.request(RpcRequest::RequestAccounts).await {
                Ok(_) => ConnectionOutcome::failure(FailureReason::PendingConnection),
                Err(err) => {
                    debug!(error = %err, "account request declined");
                    ConnectionOutcome::failure_with_detail(
                        FailureReason::NotConnected,
                        Some(err.user_message()),
                    )
                }
            },
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;
    use crate::provider::memory::{InMemoryWallet, PopupResponse};

    #[tokio::test]
    async fn missing_wallet_is_not_installed_even_with_popups() {
        let negotiator = Negotiator::mainnet(None);
        let outcome = negotiator
            .negotiate(NegotiationPolicy::INTERACTIVE)
            .await
            .unwrap();
        assert_eq!(outcome.reason(), Some(FailureReason::NotInstalled));
    }

    #[tokio::test]
    async fn mainnet_with_account_connects() {
        let wallet = InMemoryWallet::mainnet(vec![Address::from("0xABC")]);
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator.negotiate(NegotiationPolicy::PASSIVE).await.unwrap();
        assert_eq!(outcome.address(), Some(&Address::from("0xABC")));
    }

    #[tokio::test]
    async fn approved_switch_is_pending_not_connected() {
        let wallet = InMemoryWallet::new(4, vec![Address::from("0xABC")]);
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator
            .negotiate(NegotiationPolicy::INTERACTIVE)
            .await
            .unwrap();
        assert_eq!(outcome.reason(), Some(FailureReason::PendingNetworkSwitch));
        assert_eq!(wallet.call_count("wallet_switchEthereumChain"), 1);
        assert_eq!(wallet.call_count("eth_requestAccounts"), 0);
    }

    #[tokio::test]
    async fn rejected_switch_falls_back_to_not_mainnet_with_detail() {
        let wallet = InMemoryWallet::new(4, vec![]);
        wallet.respond_to_switch(PopupResponse::Reject("User rejected the request.".into()));
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator
            .negotiate(NegotiationPolicy::INTERACTIVE)
            .await
            .unwrap();
        assert_eq!(
            outcome.reason(),
            Some(FailureReason::NotMainnet { chain_id: 4 })
        );
        assert_eq!(outcome.detail(), Some("User rejected the request."));
    }

    #[tokio::test]
    async fn rejected_account_request_is_not_connected_with_detail() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.respond_to_account_request(PopupResponse::Reject("User rejected".into()));
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator
            .negotiate(NegotiationPolicy::new(true, false))
            .await
            .unwrap();
        assert_eq!(outcome.reason(), Some(FailureReason::NotConnected));
        assert_eq!(outcome.detail(), Some("User rejected"));
    }

    #[tokio::test]
    async fn approved_account_request_is_pending_connection() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator
            .negotiate(NegotiationPolicy::new(true, false))
            .await
            .unwrap();
        assert_eq!(outcome.reason(), Some(FailureReason::PendingConnection));
    }

    #[tokio::test]
    async fn passive_negotiation_never_opens_popups() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        let outcome = negotiator.negotiate(NegotiationPolicy::PASSIVE).await.unwrap();
        assert_eq!(outcome.reason(), Some(FailureReason::NotConnected));
        assert_eq!(wallet.call_count("eth_requestAccounts"), 0);
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.fail_transport(Some("boom".into()));
        let negotiator = Negotiator::mainnet(Some(wallet.handle()));
        assert!(negotiator.negotiate(NegotiationPolicy::PASSIVE).await.is_err());
    }
}
