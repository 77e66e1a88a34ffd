//! Multisig treasury loader.

use super::nft::{resolve_tokens_of_owner, CollectionFactory, MetadataResolver, OwnedToken};
use super::store::{Action, AppStore, TreasuryStatus};
use super::ReadError;
use crate::core::{Address, Connection, ConnectionOutcome};
use crate::listeners::{LatestDelivery, ListenerError, OutcomeListener};
use crate::provider::ProviderHandle;
use alloy_primitives::U256;
use async_trait::async_trait;
use futures::future::join_all;
use futures::try_join;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read access to a multisig safe.
#[async_trait]
pub trait SafeReader: Send + Sync {
    /// Address of the safe contract.
    fn address(&self) -> &Address;

    /// Ether balance in wei.
    async fn balance(&self) -> Result<U256, ReadError>;

    async fn owners(&self) -> Result<Vec<Address>, ReadError>;

    async fn modules(&self) -> Result<Vec<Address>, ReadError>;

    async fn is_owner(&self, address: &Address) -> Result<bool, ReadError>;
}

/// Reverse name lookup (ENS or similar).
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn lookup(&self, address: &Address) -> Result<Option<String>, ReadError>;
}

pub type SafeFactory = Arc<dyn Fn(&ProviderHandle) -> Arc<dyn SafeReader> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerName {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for OwnerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.address),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreasuryData {
    pub balance: U256,
    pub owners: Vec<OwnerName>,
    /// Modules enabled on the safe.
    pub modules: Vec<Address>,
    /// Whether the connected account is one of the owners.
    pub is_owner: bool,
    /// Collection tokens held by the safe.
    pub tokens: Vec<OwnedToken>,
}

/// Loads the treasury panel: safe balance, owners and held tokens.
pub struct TreasuryLoader {
    safe: SafeFactory,
    collection: Option<(CollectionFactory, Arc<dyn MetadataResolver>)>,
    names: Option<Arc<dyn NameResolver>>,
    store: Arc<AppStore>,
    latest: LatestDelivery,
}

impl TreasuryLoader {
    pub fn new(safe: SafeFactory, store: Arc<AppStore>) -> Self {
        Self {
            safe,
            collection: None,
            names: None,
            store,
            latest: LatestDelivery::new(),
        }
    }

    /// List the tokens of this collection held by the safe.
    pub fn with_collection(
        mut self,
        collection: CollectionFactory,
        resolver: Arc<dyn MetadataResolver>,
    ) -> Self {
        self.collection = Some((collection, resolver));
        self
    }

    pub fn with_names(mut self, names: Arc<dyn NameResolver>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn into_listener(self) -> Arc<dyn OutcomeListener> {
        Arc::new(self)
    }

    async fn load(&self, connection: &Connection) -> Result<TreasuryData, ReadError> {
        let safe = (self.safe)(&connection.provider);
        let (balance, owners, modules, is_owner) = try_join!(
            safe.balance(),
            safe.owners(),
            safe.modules(),
            safe.is_owner(&connection.address),
        )?;
        let owners = self.name_owners(owners).await;

        let tokens = match &self.collection {
            Some((factory, resolver)) => {
                let reader = factory(&connection.provider);
                resolve_tokens_of_owner(reader.as_ref(), resolver.as_ref(), safe.address()).await?
            }
            None => Vec::new(),
        };

        Ok(TreasuryData {
            balance,
            owners,
            modules,
            is_owner,
            tokens,
        })
    }

    /// A failed lookup leaves the owner unnamed.
    async fn name_owners(&self, owners: Vec<Address>) -> Vec<OwnerName> {
        let Some(names) = &self.names else {
            return owners
                .into_iter()
                .map(|address| OwnerName {
                    address,
                    name: None,
                })
                .collect();
        };

        join_all(owners.into_iter().map(|address| async move {
            let name = match names.lookup(&address).await {
                Ok(name) => name,
                Err(err) => {
                    debug!(%address, error = %err, "owner name lookup failed");
                    None
                }
            };
            OwnerName { address, name }
        }))
        .await
    }
}

#[async_trait]
impl OutcomeListener for TreasuryLoader {
    fn name(&self) -> &str {
        "treasury"
    }

    async fn on_outcome(
        &self,
        outcome: ConnectionOutcome,
        sequence: u64,
    ) -> Result<(), ListenerError> {
        if !self.latest.claim(sequence) {
            debug!(delivery = sequence, "treasury outcome superseded before start");
            return Ok(());
        }
        let connection = match outcome {
            ConnectionOutcome::Connected(connection) => connection,
            ConnectionOutcome::Failure(_) => {
                self.latest.publish(sequence, || {
                    self.store.dispatch(Action::SetTreasury(TreasuryStatus::Idle))
                });
                return Ok(());
            }
        };

        self.latest.publish(sequence, || {
            self.store.dispatch(Action::SetTreasury(TreasuryStatus::Loading))
        });
        let (status, result) = match self.load(&connection).await {
            Ok(data) => (TreasuryStatus::Loaded(data), Ok(())),
            Err(err) => (TreasuryStatus::Error(err.to_string()), Err(err)),
        };
        let published = self.latest.publish(sequence, || {
            if let TreasuryStatus::Loaded(data) = &status {
                info!(balance = %data.balance, owners = data.owners.len(), "treasury loaded");
            }
            self.store.dispatch(Action::SetTreasury(status))
        });
        if published.is_none() {
            debug!("treasury load superseded");
            return Ok(());
        }

        result.map_err(|err| {
            warn!(error = %err, "treasury load failed");
            err.into()
        })
    }
}
