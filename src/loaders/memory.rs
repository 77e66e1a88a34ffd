//! In-memory contract readers.
//!
//! Stand-ins for on-chain contracts and metadata hosts, used by the tests and
//! the demo. Each reader ignores the provider its factory is given.

use super::nft::{
    CollectionFactory, Erc721Reader, MetadataResolver, PosterFactory, PosterReader, TokenMetadata,
};
use super::treasury::{NameResolver, SafeFactory, SafeReader};
use super::ReadError;
use crate::core::Address;
use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ERC-721 collection with token URIs of the form `{base_uri}{token_id}`.
pub struct InMemoryCollection {
    name: String,
    base_uri: String,
    owners: Mutex<BTreeMap<U256, Address>>,
    /// Mint order per owner, which is the enumeration order.
    holdings: Mutex<HashMap<Address, Vec<U256>>>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>, base_uri: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            base_uri: base_uri.into(),
            owners: Mutex::new(BTreeMap::new()),
            holdings: Mutex::new(HashMap::new()),
        })
    }

    pub fn mint(&self, owner: Address, token_id: U256) {
        lock(&self.owners).insert(token_id, owner.clone());
        lock(&self.holdings).entry(owner).or_default().push(token_id);
    }

    pub fn factory(collection: &Arc<Self>) -> CollectionFactory {
        let collection = Arc::clone(collection);
        Arc::new(move |_provider| Arc::clone(&collection) as Arc<dyn Erc721Reader>)
    }

    fn contract_error(&self, message: impl Into<String>) -> ReadError {
        ReadError::contract(self.name.clone(), message)
    }
}

#[async_trait]
impl Erc721Reader for InMemoryCollection {
    async fn balance_of(&self, owner: &Address) -> Result<U256, ReadError> {
        let count = lock(&self.holdings).get(owner).map_or(0, Vec::len);
        Ok(U256::from(count))
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, ReadError> {
        lock(&self.owners)
            .get(&token_id)
            .cloned()
            .ok_or_else(|| self.contract_error(format!("token {token_id} does not exist")))
    }

    async fn name(&self) -> Result<String, ReadError> {
        Ok(self.name.clone())
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, ReadError> {
        if !lock(&self.owners).contains_key(&token_id) {
            return Err(self.contract_error(format!("token {token_id} does not exist")));
        }
        Ok(format!("{}{}", self.base_uri, token_id))
    }

    async fn token_of_owner_by_index(
        &self,
        owner: &Address,
        index: U256,
    ) -> Result<U256, ReadError> {
        let holdings = lock(&self.holdings);
        usize::try_from(index)
            .ok()
            .and_then(|index| holdings.get(owner).and_then(|tokens| tokens.get(index)))
            .copied()
            .ok_or_else(|| self.contract_error("owner index out of bounds"))
    }
}

/// Poster contract where exactly the listed tokens are claimable.
pub struct InMemoryPoster {
    claimable: BTreeSet<U256>,
}

impl InMemoryPoster {
    pub fn new(claimable: impl IntoIterator<Item = U256>) -> Arc<Self> {
        Arc::new(Self {
            claimable: claimable.into_iter().collect(),
        })
    }

    pub fn factory(poster: &Arc<Self>) -> PosterFactory {
        let poster = Arc::clone(poster);
        Arc::new(move |_provider| Arc::clone(&poster) as Arc<dyn PosterReader>)
    }
}

#[async_trait]
impl PosterReader for InMemoryPoster {
    async fn claimable(&self, token_id: U256) -> Result<bool, ReadError> {
        Ok(self.claimable.contains(&token_id))
    }
}

/// Metadata host serving fixed documents by URI.
#[derive(Default)]
pub struct StaticMetadata {
    documents: Mutex<HashMap<String, TokenMetadata>>,
}

impl StaticMetadata {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, uri: impl Into<String>, metadata: TokenMetadata) {
        lock(&self.documents).insert(uri.into(), metadata);
    }
}

#[async_trait]
impl MetadataResolver for StaticMetadata {
    async fn resolve(&self, uri: &str) -> Result<TokenMetadata, ReadError> {
        lock(&self.documents)
            .get(uri)
            .cloned()
            .ok_or_else(|| ReadError::metadata(uri, "404 Not Found"))
    }
}

/// Multisig safe with a fixed owner set.
pub struct InMemorySafe {
    address: Address,
    balance: U256,
    owners: Vec<Address>,
    modules: Mutex<Vec<Address>>,
    failure: Mutex<Option<String>>,
}

impl InMemorySafe {
    pub fn new(address: Address, balance: U256, owners: Vec<Address>) -> Arc<Self> {
        Arc::new(Self {
            address,
            balance,
            owners,
            modules: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    pub fn enable_module(&self, module: Address) {
        lock(&self.modules).push(module);
    }

    /// Make every read fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    pub fn factory(safe: &Arc<Self>) -> SafeFactory {
        let safe = Arc::clone(safe);
        Arc::new(move |_provider| Arc::clone(&safe) as Arc<dyn SafeReader>)
    }

    fn check(&self) -> Result<(), ReadError> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(ReadError::contract("safe", message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SafeReader for InMemorySafe {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn balance(&self) -> Result<U256, ReadError> {
        self.check()?;
        Ok(self.balance)
    }

    async fn owners(&self) -> Result<Vec<Address>, ReadError> {
        self.check()?;
        Ok(self.owners.clone())
    }

    async fn modules(&self) -> Result<Vec<Address>, ReadError> {
        self.check()?;
        Ok(lock(&self.modules).clone())
    }

    async fn is_owner(&self, address: &Address) -> Result<bool, ReadError> {
        self.check()?;
        Ok(self
            .owners
            .iter()
            .any(|owner| owner.as_str().eq_ignore_ascii_case(address.as_str())))
    }
}

/// Fixed reverse-name table.
#[derive(Default)]
pub struct StaticNames {
    names: Mutex<HashMap<Address, String>>,
}

impl StaticNames {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, address: Address, name: impl Into<String>) {
        lock(&self.names).insert(address, name.into());
    }
}

#[async_trait]
impl NameResolver for StaticNames {
    async fn lookup(&self, address: &Address) -> Result<Option<String>, ReadError> {
        Ok(lock(&self.names).get(address).cloned())
    }
}
