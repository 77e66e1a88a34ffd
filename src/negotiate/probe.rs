//! Network/account probe.

use crate::core::Address;
use crate::provider::{parse_accounts, parse_chain_id, RpcRequest, WalletError, WalletProvider};
use serde::{Deserialize, Serialize};

/// What the wallet currently reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub chain_id: u64,
    pub accounts: Vec<Address>,
}

impl NetworkSnapshot {
    /// The account the wallet currently exposes first.
    pub fn active_account(&self) -> Option<&Address> {
        self.accounts.first()
    }
}

/// Read the chain id and the authorized accounts.
///
/// Only read-only methods are used. Transport errors are returned as-is.
pub async fn probe(provider: &dyn WalletProvider) -> Result<NetworkSnapshot, WalletError> {
    let chain_id = parse_chain_id(&provider.request(RpcRequest::ChainId).await?)?;
    let accounts = parse_accounts("eth_accounts", provider.request(RpcRequest::Accounts).await?)?;
    Ok(NetworkSnapshot { chain_id, accounts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryWallet;

    #[tokio::test]
    async fn probe_reads_chain_and_accounts() {
        let wallet = InMemoryWallet::new(5, vec![Address::from("0xA"), Address::from("0xB")]);
        let snapshot = probe(&*wallet).await.unwrap();
        assert_eq!(snapshot.chain_id, 5);
        assert_eq!(snapshot.active_account(), Some(&Address::from("0xA")));
        assert_eq!(wallet.call_count("eth_requestAccounts"), 0);
        assert_eq!(wallet.call_count("wallet_switchEthereumChain"), 0);
    }

    #[tokio::test]
    async fn probe_propagates_transport_errors() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.fail_transport(Some("disconnected".to_string()));
        let err = probe(&*wallet).await.unwrap_err();
        assert_eq!(err, WalletError::Transport("disconnected".to_string()));
    }
}
