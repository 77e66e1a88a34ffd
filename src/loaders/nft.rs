//! ERC-721 collection loader.

use super::store::{Action, AppStore};
use super::ReadError;
use crate::core::{Address, Connection, ConnectionOutcome};
use crate::listeners::{LatestDelivery, ListenerError, OutcomeListener};
use crate::provider::ProviderHandle;
use alloy_primitives::U256;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Read access to an ERC-721 contract with the metadata and enumerable
/// extensions.
#[async_trait]
pub trait Erc721Reader: Send + Sync {
    async fn balance_of(&self, owner: &Address) -> Result<U256, ReadError>;

    async fn owner_of(&self, token_id: U256) -> Result<Address, ReadError>;

    async fn name(&self) -> Result<String, ReadError>;

    async fn token_uri(&self, token_id: U256) -> Result<String, ReadError>;

    async fn token_of_owner_by_index(&self, owner: &Address, index: U256)
        -> Result<U256, ReadError>;

    /// Every token id held by `owner`.
    ///
    /// The default walks `token_of_owner_by_index` up to `balance_of`.
    /// Contracts with a bulk `tokensOfOwner` view override it.
    async fn tokens_of_owner(&self, owner: &Address) -> Result<Vec<U256>, ReadError> {
        let balance = self.balance_of(owner).await?;
        let mut token_ids = Vec::new();
        let mut index = U256::ZERO;
        while index < balance {
            token_ids.push(self.token_of_owner_by_index(owner, index).await?);
            index += U256::from(1u8);
        }
        Ok(token_ids)
    }
}

/// Companion contract answering whether a token's poster can be claimed.
#[async_trait]
pub trait PosterReader: Send + Sync {
    async fn claimable(&self, token_id: U256) -> Result<bool, ReadError>;
}

/// Fetches the JSON document a `tokenURI` points to.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, uri: &str) -> Result<TokenMetadata, ReadError>;
}

/// Builds a collection reader bound to a provider.
pub type CollectionFactory = Arc<dyn Fn(&ProviderHandle) -> Arc<dyn Erc721Reader> + Send + Sync>;

/// Builds a poster reader bound to a provider.
pub type PosterFactory = Arc<dyn Fn(&ProviderHandle) -> Arc<dyn PosterReader> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenAttribute {
    pub trait_type: String,
    pub value: Value,
}

/// ERC-721 metadata JSON. Unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub attributes: Vec<TokenAttribute>,
}

impl TokenMetadata {
    /// Value of the first attribute with the given trait type.
    pub fn attribute(&self, trait_type: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attribute| attribute.trait_type == trait_type)
            .map(|attribute| &attribute.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnedToken {
    pub token_id: U256,
    pub metadata: TokenMetadata,
}

/// A token of the connected account's collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub token: OwnedToken,
    /// `None` when no poster contract is configured.
    pub claimable: Option<bool>,
}

/// Read a token's URI and resolve its metadata.
pub async fn resolve_token(
    reader: &dyn Erc721Reader,
    resolver: &dyn MetadataResolver,
    token_id: U256,
) -> Result<OwnedToken, ReadError> {
    let uri = reader.token_uri(token_id).await?;
    let metadata = resolver.resolve(&uri).await?;
    Ok(OwnedToken { token_id, metadata })
}

/// Resolve every token held by `owner`, concurrently, in enumeration order.
pub async fn resolve_tokens_of_owner(
    reader: &dyn Erc721Reader,
    resolver: &dyn MetadataResolver,
    owner: &Address,
) -> Result<Vec<OwnedToken>, ReadError> {
    let token_ids = reader.tokens_of_owner(owner).await?;
    try_join_all(
        token_ids
            .into_iter()
            .map(|token_id| resolve_token(reader, resolver, token_id)),
    )
    .await
}

/// Loads the connected account's tokens into [`AppState::collection`].
///
/// [`AppState::collection`]: super::AppState::collection
pub struct NftLoader {
    collection: CollectionFactory,
    poster: Option<PosterFactory>,
    resolver: Arc<dyn MetadataResolver>,
    store: Arc<AppStore>,
    latest: LatestDelivery,
}

impl NftLoader {
    pub fn new(
        collection: CollectionFactory,
        resolver: Arc<dyn MetadataResolver>,
        store: Arc<AppStore>,
    ) -> Self {
        Self {
            collection,
            poster: None,
            resolver,
            store,
            latest: LatestDelivery::new(),
        }
    }

    /// Also query the poster contract for each token.
    pub fn with_poster(mut self, poster: PosterFactory) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn into_listener(self) -> Arc<dyn OutcomeListener> {
        Arc::new(self)
    }

    async fn load(&self, connection: &Connection) -> Result<Vec<CollectionEntry>, ReadError> {
        let reader = (self.collection)(&connection.provider);
        let tokens =
            resolve_tokens_of_owner(reader.as_ref(), self.resolver.as_ref(), &connection.address)
                .await?;

        let claimable: Vec<Option<bool>> = match &self.poster {
            Some(factory) => {
                let poster = factory(&connection.provider);
                let poster = poster.as_ref();
                try_join_all(tokens.iter().map(|token| poster.claimable(token.token_id)))
                    .await?
                    .into_iter()
                    .map(Some)
                    .collect()
            }
            None => vec![None; tokens.len()],
        };

        Ok(tokens
            .into_iter()
            .zip(claimable)
            .map(|(token, claimable)| CollectionEntry { token, claimable })
            .collect())
    }
}

#[async_trait]
impl OutcomeListener for NftLoader {
    fn name(&self) -> &str {
        "collection"
    }

    async fn on_outcome(
        &self,
        outcome: ConnectionOutcome,
        sequence: u64,
    ) -> Result<(), ListenerError> {
        if !self.latest.claim(sequence) {
            debug!(delivery = sequence, "collection outcome superseded before start");
            return Ok(());
        }
        let connection = match outcome {
            ConnectionOutcome::Connected(connection) => connection,
            ConnectionOutcome::Failure(_) => {
                self.latest.publish(sequence, || {
                    self.store.dispatch(Action::SetCollection(None))
                });
                return Ok(());
            }
        };

        let (entries, result) = match self.load(&connection).await {
            Ok(entries) => (Some(entries), Ok(())),
            Err(err) => (None, Err(err)),
        };
        let tokens = entries.as_ref().map(Vec::len);
        let published = self.latest.publish(sequence, || {
            self.store.dispatch(Action::SetCollection(entries))
        });
        if published.is_none() {
            debug!(address = %connection.address, "collection load superseded");
            return Ok(());
        }

        if let Some(tokens) = tokens {
            info!(address = %connection.address, tokens, "collection loaded");
        }
        result.map_err(Into::into)
    }
}
