//! Wallet node diagnostics.

use crate::core::Address;
use crate::provider::{RpcRequest, WalletProvider};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Web3Info {
    pub client_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetInfo {
    pub version: Option<String>,
    pub peer_count: Option<u64>,
    pub listening: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EthInfo {
    pub protocol_version: Option<String>,
    /// `false`, or the node's sync progress object.
    pub syncing: Option<Value>,
    pub coinbase: Option<Address>,
    pub mining: Option<bool>,
    pub hashrate: Option<U256>,
    pub gas_price: Option<U256>,
}

/// What the wallet's node reports about itself.
///
/// Collected for display only; a field is `None` when the wallet refused or
/// failed the corresponding request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletDiagnostics {
    pub web3: Web3Info,
    pub net: NetInfo,
    pub eth: EthInfo,
}

impl WalletDiagnostics {
    /// Query every informational method concurrently. Never fails.
    pub async fn collect(provider: &dyn WalletProvider) -> Self {
        let (
            client_version,
            net_version,
            peer_count,
            listening,
            protocol_version,
            syncing,
            coinbase,
            mining,
            hashrate,
            gas_price,
        ) = futures::join!(
            read(provider, RpcRequest::ClientVersion, text),
            read(provider, RpcRequest::NetVersion, text),
            read(provider, RpcRequest::PeerCount, |v| {
                quantity(v).and_then(|q| u64::try_from(q).ok())
            }),
            read(provider, RpcRequest::Listening, Value::as_bool),
            read(provider, RpcRequest::ProtocolVersion, text),
            read(provider, RpcRequest::Syncing, |v| Some(v.clone())),
            read(provider, RpcRequest::Coinbase, |v| {
                v.as_str().map(Address::from)
            }),
            read(provider, RpcRequest::Mining, Value::as_bool),
            read(provider, RpcRequest::Hashrate, quantity),
            read(provider, RpcRequest::GasPrice, quantity),
        );

        Self {
            web3: Web3Info { client_version },
            net: NetInfo {
                version: net_version,
                peer_count,
                listening,
            },
            eth: EthInfo {
                protocol_version,
                syncing,
                coinbase,
                mining,
                hashrate,
                gas_price,
            },
        }
    }
}

async fn read<T>(
    provider: &dyn WalletProvider,
    request: RpcRequest,
    decode: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let method = request.method();
    match provider.request(request).await {
        Ok(value) => {
            let decoded = decode(&value);
            if decoded.is_none() {
                debug!(method, %value, "unexpected diagnostic value");
            }
            decoded
        }
        Err(err) => {
            debug!(method, error = %err, "diagnostic request failed");
            None
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Hex (`0x`-prefixed) or decimal quantity.
fn quantity(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => s.parse::<U256>().ok(),
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}
