//! Mainnet Session
//!
//! This example walks an in-memory wallet through the connection lifecycle:
//! wrong network, switch popup, account authorization, then an account change
//! that clears the loaded collection.
//!
//! Key concepts:
//! - Passive negotiation on every wallet event
//! - Interactive negotiation for the user's "connect" button
//! - Pending outcomes that resolve only through a later event
//! - Data loaders fed by the session's listener fan-out
//!
//! Run with: cargo run --example mainnet_session
//! Set RUST_LOG=wallet_session=debug to see the session's own logs.

use alloy_primitives::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wallet_session::core::{Address, State};
use wallet_session::loaders::memory::{InMemoryCollection, StaticMetadata};
use wallet_session::loaders::{
    AppStore, NftLoader, StatusPublisher, TokenMetadata, WalletDiagnostics,
};
use wallet_session::provider::memory::InMemoryWallet;
use wallet_session::ProviderSession;

const ACCOUNT: &str = "0x5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("wallet_session=info".parse()?),
        )
        .init();

    println!("=== Mainnet Session Example ===\n");

    // A collection the account holds one token of
    let cats = InMemoryCollection::new("Stoner Cats", "https://cats.example/");
    cats.mint(Address::from(ACCOUNT), U256::from(420u64));
    let metadata = StaticMetadata::new();
    metadata.insert(
        "https://cats.example/420",
        TokenMetadata {
            name: "Mrs. Lavender".to_string(),
            ..TokenMetadata::default()
        },
    );

    let store = AppStore::shared();
    let wallet = InMemoryWallet::new(4, vec![]);
    wallet.set_response("web3_clientVersion", serde_json::json!("MetaMask/v10.1.0"));

    let session = ProviderSession::builder()
        .provider(wallet.handle())
        .listener(StatusPublisher::new(Arc::clone(&store)))
        .listener(
            NftLoader::new(InMemoryCollection::factory(&cats), metadata, Arc::clone(&store))
                .into_listener(),
        )
        .build()?;

    let outcome = session.attach().await?;
    println!("Attached: {outcome}");

    let diagnostics = WalletDiagnostics::collect(&*wallet).await;
    println!(
        "Wallet client: {}",
        diagnostics.web3.client_version.as_deref().unwrap_or("unknown")
    );

    // The user presses "connect": the wallet shows the network switch popup
    let outcome = session.request_connect().await;
    println!("Connect requested: {outcome}");

    // The user approves; the wallet reports the new chain
    wallet.switch_chain(1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("After chain change: {}", session.current());

    // Still no account: the next connect opens the account popup
    let outcome = session.request_connect().await;
    println!("Connect requested: {outcome}");

    wallet.change_accounts(vec![Address::from(ACCOUNT)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("After account authorization: {}", session.current());

    let state = store.state();
    for entry in state.collection.iter().flatten() {
        println!(
            "  token #{}: {}",
            entry.token.token_id, entry.token.metadata.name
        );
    }

    // The user disconnects the site from the wallet
    wallet.change_accounts(vec![]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("After disconnect: {}", session.current());
    println!("Collection cleared: {}", store.state().collection.is_none());

    println!("\nPhase history:");
    for transition in session.history().transitions() {
        println!(
            "  #{} {} -> {}",
            transition.sequence,
            transition.from.name(),
            transition.to.name()
        );
    }

    session.detach();
    println!("\n=== Example Complete ===");
    Ok(())
}
