//! Session outcomes flowing through the data loaders into the app store.

use alloy_primitives::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wallet_session::core::{Address, FailureReason};
use wallet_session::loaders::memory::{
    InMemoryCollection, InMemoryPoster, InMemorySafe, StaticMetadata, StaticNames,
};
use wallet_session::loaders::{
    AppState, AppStore, NftLoader, StatusPublisher, TokenMetadata, TreasuryLoader, TreasuryStatus,
    Web3Status,
};
use wallet_session::provider::memory::InMemoryWallet;
use wallet_session::ProviderSession;

const HOLDER: &str = "0x00000000000000000000000000000000000000aa";
const SAFE: &str = "0x1715f37113c56d7361b1191aee2b45da020a85e9";

async fn settle<F>(rx: &mut watch::Receiver<AppState>, predicate: F) -> AppState
where
    F: FnMut(&AppState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("store did not settle")
        .expect("store dropped")
        .clone()
}

fn named(name: &str) -> TokenMetadata {
    TokenMetadata {
        name: name.to_string(),
        image: Some(format!("ipfs://images/{name}.png")),
        ..TokenMetadata::default()
    }
}

struct Fixture {
    wallet: Arc<InMemoryWallet>,
    store: Arc<AppStore>,
    session: ProviderSession,
}

fn fixture() -> Fixture {
    let cats = InMemoryCollection::new("Stoner Cats", "https://cats.example/");
    cats.mint(Address::from(HOLDER), U256::from(101u64));
    cats.mint(Address::from(HOLDER), U256::from(102u64));
    let oni = InMemoryCollection::new("Oni Ronin", "https://oni.example/");
    oni.mint(Address::from(SAFE), U256::from(7u64));

    let metadata = StaticMetadata::new();
    metadata.insert("https://cats.example/101", named("Tabby"));
    metadata.insert("https://cats.example/102", named("Calico"));
    metadata.insert("https://oni.example/7", named("Oni"));

    let poster = InMemoryPoster::new([U256::from(102u64)]);
    let safe = InMemorySafe::new(
        Address::from(SAFE),
        U256::from(1_000u64),
        vec![Address::from(HOLDER), Address::from("0x00000000000000000000000000000000000000bb")],
    );
    let names = StaticNames::new();
    names.insert(Address::from(HOLDER), "holder.eth");

    let store = AppStore::shared();
    let collection = NftLoader::new(
        InMemoryCollection::factory(&cats),
        metadata.clone(),
        Arc::clone(&store),
    )
    .with_poster(InMemoryPoster::factory(&poster));
    let treasury = TreasuryLoader::new(InMemorySafe::factory(&safe), Arc::clone(&store))
        .with_collection(InMemoryCollection::factory(&oni), metadata)
        .with_names(names);

    let wallet = InMemoryWallet::mainnet(vec![Address::from(HOLDER)]);
    let session = ProviderSession::builder()
        .provider(wallet.handle())
        .listener(StatusPublisher::new(Arc::clone(&store)))
        .listener(collection.into_listener())
        .listener(treasury.into_listener())
        .build()
        .unwrap();

    Fixture {
        wallet,
        store,
        session,
    }
}

#[tokio::test]
async fn connected_session_populates_every_slice() {
    let Fixture {
        wallet: _wallet,
        store,
        session,
    } = fixture();
    let mut rx = store.subscribe();

    session.attach().await.unwrap();
    let state = settle(&mut rx, |state| {
        state.collection.is_some() && matches!(state.treasury, TreasuryStatus::Loaded(_))
    })
    .await;

    assert_eq!(
        state.web3,
        Web3Status::Connected {
            address: Address::from(HOLDER)
        }
    );

    let cats: Vec<(String, Option<bool>)> = state
        .collection
        .unwrap()
        .into_iter()
        .map(|entry| (entry.token.metadata.name, entry.claimable))
        .collect();
    assert_eq!(
        cats,
        vec![
            ("Tabby".to_string(), Some(false)),
            ("Calico".to_string(), Some(true))
        ]
    );

    let TreasuryStatus::Loaded(treasury) = state.treasury else {
        unreachable!()
    };
    assert_eq!(treasury.balance, U256::from(1_000u64));
    assert_eq!(treasury.owners[0].to_string(), "holder.eth");
    assert_eq!(treasury.owners[1].name, None);
    assert!(treasury.is_owner);
    assert_eq!(treasury.tokens[0].metadata.name, "Oni");
}

#[tokio::test]
async fn disconnect_clears_loaded_data() {
    let Fixture {
        wallet,
        store,
        session,
    } = fixture();
    let mut rx = store.subscribe();

    session.attach().await.unwrap();
    settle(&mut rx, |state| {
        state.collection.is_some() && matches!(state.treasury, TreasuryStatus::Loaded(_))
    })
    .await;

    wallet.switch_chain(5);
    let state = settle(&mut rx, |state| {
        state.collection.is_none() && state.treasury == TreasuryStatus::Idle
    })
    .await;

    assert_eq!(
        state.web3,
        Web3Status::NotConnected {
            reason: FailureReason::NotMainnet { chain_id: 5 },
            detail: None
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failure_right_after_connected_leaves_slices_cleared() {
    let Fixture {
        wallet,
        store,
        session,
    } = fixture();
    let mut rx = store.subscribe();

    session.attach().await.unwrap();
    settle(&mut rx, |state| {
        state.collection.is_some() && matches!(state.treasury, TreasuryStatus::Loaded(_))
    })
    .await;

    tokio::spawn({
        let session = session.clone();
        async move {
            wallet.set_accounts(vec![Address::from(HOLDER)]);
            assert!(session.refresh().await.is_connected());
            wallet.set_accounts(vec![]);
            assert!(!session.refresh().await.is_connected());
        }
    })
    .await
    .unwrap();

    let cleared = |state: &AppState| {
        state.collection.is_none()
            && state.treasury == TreasuryStatus::Idle
            && !matches!(state.web3, Web3Status::Connected { .. })
    };
    settle(&mut rx, cleared).await;
    // give any older delivery time to finish
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = store.state();
    assert!(!session.current().is_connected());
    assert!(cleared(&state), "stale data published: {state:?}");
}
