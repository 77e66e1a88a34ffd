//! wallet-session: connection state machine for an injected wallet provider
//!
//! A browser-style wallet (EIP-1193) is injected into the host application.
//! This crate decides, from what the wallet reports, whether the application
//! is connected to it on mainnet with an authorized account. If it is not, the
//! crate says why. It then keeps that answer current as the user changes
//! accounts or networks.
//!
//! # Core Concepts
//!
//! - **Outcome**: [`ConnectionOutcome`] is either a live connection or a
//!   [`FailureReason`] such as `NOT_MAINNET` or `PENDING_CONNECTION`
//! - **Negotiation**: [`Negotiator`] probes the wallet and, when allowed,
//!   asks it to switch networks or authorize an account
//! - **Session**: [`ProviderSession`] owns the canonical outcome, re-negotiates
//!   on every wallet event and discards results that arrive out of order
//! - **Listeners**: every applied outcome is fanned out to [`OutcomeListener`]s,
//!   the data loaders in [`loaders`]
//!
//! # Example
//!
//! ```rust
//! use wallet_session::core::{Address, FailureReason};
//! use wallet_session::provider::memory::InMemoryWallet;
//! use wallet_session::ProviderSession;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let wallet = InMemoryWallet::new(5, vec![Address::from("0xabc")]);
//! let session = ProviderSession::builder()
//!     .provider(wallet.handle())
//!     .build()
//!     .unwrap();
//!
//! let outcome = session.attach().await.unwrap();
//! assert_eq!(outcome.reason(), Some(FailureReason::NotMainnet { chain_id: 5 }));
//!
//! wallet.set_chain_id(1);
//! assert!(session.refresh().await.is_connected());
//! # }
//! ```

pub mod config;
pub mod core;
pub mod listeners;
pub mod loaders;
pub mod negotiate;
pub mod provider;
pub mod session;

// Re-export commonly used types
pub use crate::config::SessionConfig;
pub use crate::core::{
    Address, ConnectionOutcome, ConnectionState, FailureReason, State, StateHistory,
    StateTransition,
};
pub use crate::listeners::{listener_fn, ListenerError, OutcomeListener};
pub use crate::negotiate::{NegotiationPolicy, Negotiator};
pub use crate::provider::{ProviderHandle, WalletError, WalletProvider};
pub use crate::session::{ProviderSession, SessionBuilder, SessionError};
