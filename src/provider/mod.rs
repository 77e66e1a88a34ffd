//! Boundary with the injected wallet provider.
//!
//! Modeled on EIP-1193: a generic `request` call plus `on`/`removeListener`
//! event subscription. Hosts adapt their injected object to
//! [`WalletProvider`]; [`memory::InMemoryWallet`] is a scriptable
//! implementation.

mod error;
pub mod memory;

pub use error::{WalletError, USER_REJECTED_CODE};

use crate::core::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Parameter object of `wallet_switchEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchChainParams {
    /// Hex-encoded chain id, e.g. `"0x1"`.
    pub chain_id: String,
}

/// RPC methods this crate sends to the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RpcRequest {
    #[serde(rename = "eth_chainId")]
    ChainId,

    #[serde(rename = "eth_accounts")]
    Accounts,

    #[serde(rename = "eth_requestAccounts")]
    RequestAccounts,

    #[serde(rename = "wallet_switchEthereumChain")]
    SwitchChain([SwitchChainParams; 1]),

    #[serde(rename = "web3_clientVersion")]
    ClientVersion,

    #[serde(rename = "net_version")]
    NetVersion,

    #[serde(rename = "net_peerCount")]
    PeerCount,

    #[serde(rename = "net_listening")]
    Listening,

    #[serde(rename = "eth_protocolVersion")]
    ProtocolVersion,

    #[serde(rename = "eth_syncing")]
    Syncing,

    #[serde(rename = "eth_coinbase")]
    Coinbase,

    #[serde(rename = "eth_mining")]
    Mining,

    #[serde(rename = "eth_hashrate")]
    Hashrate,

    #[serde(rename = "eth_gasPrice")]
    GasPrice,
}

impl RpcRequest {
    pub fn switch_chain(chain_id: u64) -> Self {
        Self::SwitchChain([SwitchChainParams {
            chain_id: format_chain_id(chain_id),
        }])
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::ChainId => "eth_chainId",
            Self::Accounts => "eth_accounts",
            Self::RequestAccounts => "eth_requestAccounts",
            Self::SwitchChain(_) => "wallet_switchEthereumChain",
            Self::ClientVersion => "web3_clientVersion",
            Self::NetVersion => "net_version",
            Self::PeerCount => "net_peerCount",
            Self::Listening => "net_listening",
            Self::ProtocolVersion => "eth_protocolVersion",
            Self::Syncing => "eth_syncing",
            Self::Coinbase => "eth_coinbase",
            Self::Mining => "eth_mining",
            Self::Hashrate => "eth_hashrate",
            Self::GasPrice => "eth_gasPrice",
        }
    }

    /// Whether this request may open a wallet popup.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::RequestAccounts | Self::SwitchChain(_))
    }
}

/// Provider lifecycle events the session subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
    Connect,
    Disconnect,
    Message,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 5] = [
        Self::AccountsChanged,
        Self::ChainChanged,
        Self::Message,
        Self::Connect,
        Self::Disconnect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event emitted by the wallet.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    /// Hex-encoded new chain id.
    ChainChanged(String),
    Connect { chain_id: String },
    Disconnect { code: Option<i64>, message: Option<String> },
    Message { kind: String, data: Value },
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
            Self::Connect { .. } => ProviderEventKind::Connect,
            Self::Disconnect { .. } => ProviderEventKind::Disconnect,
            Self::Message { .. } => ProviderEventKind::Message,
        }
    }
}

/// Identifies one `on` registration so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback invoked by the provider for each event.
///
/// Handlers must not block; the session only enqueues work from them.
pub type EventHandler = Arc<dyn Fn(ProviderEvent) + Send + Sync>;

/// An injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Generic RPC call.
    async fn request(&self, request: RpcRequest) -> Result<Value, WalletError>;

    /// Subscribe `handler` to events of `kind`.
    fn on(&self, kind: ProviderEventKind, handler: EventHandler)
        -> Result<SubscriptionId, WalletError>;

    /// Remove a subscription. Unknown ids are ignored.
    fn remove_listener(&self, kind: ProviderEventKind, id: SubscriptionId);
}

/// Shared capability wrapping the injected wallet.
///
/// The session and every listener read through the same handle; nobody
/// mutates the wallet through it.
#[derive(Clone)]
pub struct ProviderHandle(Arc<dyn WalletProvider>);

impl ProviderHandle {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self(provider)
    }

    /// Whether both handles wrap the same wallet object.
    pub fn same_provider(&self, other: &ProviderHandle) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }
}

impl<P: WalletProvider> From<Arc<P>> for ProviderHandle {
    fn from(provider: Arc<P>) -> Self {
        Self(provider)
    }
}

impl Deref for ProviderHandle {
    type Target = dyn WalletProvider;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderHandle")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Hex form used on the wire, e.g. `1` -> `"0x1"`.
pub fn format_chain_id(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

/// Parse a chain id as wallets report it: a hex string, a decimal string or
/// a JSON number.
pub fn parse_chain_id(value: &Value) -> Result<u64, WalletError> {
    let invalid = |reason: String| WalletError::InvalidResponse {
        method: "eth_chainId",
        reason,
    };
    match value {
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|e| invalid(format!("{s:?}: {e}")))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| invalid(format!("{n} is not an unsigned integer"))),
        other => Err(invalid(format!("unexpected value {other}"))),
    }
}

/// Parse the account list returned by `eth_accounts` / `eth_requestAccounts`.
pub fn parse_accounts(method: &'static str, value: Value) -> Result<Vec<Address>, WalletError> {
    serde_json::from_value(value).map_err(|e| WalletError::InvalidResponse {
        method,
        reason: e.to_string(),
    })
}
