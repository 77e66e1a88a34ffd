//! Data loaders that react to connection outcomes.
//!
//! Each loader is an [`OutcomeListener`](crate::listeners::OutcomeListener)
//! writing into a shared [`AppStore`]. On `Connected` a loader reads on-chain
//! data through the connection's provider; on `Failure` it clears what it
//! previously published.
//!
//! Contract access goes through small reader traits ([`Erc721Reader`],
//! [`SafeReader`], [`PosterReader`]) built per provider by a factory, so the
//! loaders do not depend on any particular ABI binding.

mod diagnostics;
#[cfg(feature = "http")]
mod http;
pub mod memory;
mod nft;
mod store;
mod treasury;

pub use diagnostics::{EthInfo, NetInfo, WalletDiagnostics, Web3Info};
#[cfg(feature = "http")]
pub use http::{HttpMetadataResolver, DEFAULT_IPFS_GATEWAY};
pub use nft::{
    resolve_token, resolve_tokens_of_owner, CollectionEntry, CollectionFactory, Erc721Reader,
    MetadataResolver, NftLoader, OwnedToken, PosterFactory, PosterReader, TokenAttribute,
    TokenMetadata,
};
pub use store::{reduce, Action, AppState, AppStore, StatusPublisher, TreasuryStatus, Web3Status};
pub use treasury::{
    NameResolver, OwnerName, SafeFactory, SafeReader, TreasuryData, TreasuryLoader,
};

use crate::provider::WalletError;
use thiserror::Error;

/// Errors raised while reading contract or metadata data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReadError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("{contract} call failed: {message}")]
    Contract { contract: String, message: String },

    #[error("failed to resolve metadata at {uri}: {message}")]
    Metadata { uri: String, message: String },
}

impl ReadError {
    pub fn contract(contract: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Contract {
            contract: contract.into(),
            message: message.into(),
        }
    }

    pub fn metadata(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metadata {
            uri: uri.into(),
            message: message.into(),
        }
    }
}
