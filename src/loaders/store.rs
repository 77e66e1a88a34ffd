//! Application state shared by the loaders.
//!
//! State changes only through [`AppStore::dispatch`], which runs the pure
//! [`reduce`] function and publishes the result on a `watch` channel.

use super::nft::CollectionEntry;
use super::treasury::TreasuryData;
use crate::core::{Address, ConnectionOutcome, FailureReason};
use crate::listeners::{LatestDelivery, ListenerError, OutcomeListener};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Connection status as the UI shows it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Web3Status {
    Connected {
        address: Address,
    },
    NotConnected {
        reason: FailureReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl Default for Web3Status {
    fn default() -> Self {
        Self::NotConnected {
            reason: FailureReason::NotConnected,
            detail: None,
        }
    }
}

impl From<&ConnectionOutcome> for Web3Status {
    fn from(outcome: &ConnectionOutcome) -> Self {
        match outcome {
            ConnectionOutcome::Connected(connection) => Self::Connected {
                address: connection.address.clone(),
            },
            ConnectionOutcome::Failure(failure) => Self::NotConnected {
                reason: failure.reason,
                detail: failure.detail.clone(),
            },
        }
    }
}

/// Load state of the treasury panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum TreasuryStatus {
    /// No connection, nothing to show.
    #[default]
    Idle,
    Loading,
    Loaded(TreasuryData),
    Error(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub web3: Web3Status,
    /// `None` until the connected account's collection is loaded.
    pub collection: Option<Vec<CollectionEntry>>,
    pub treasury: TreasuryStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SetWeb3(Web3Status),
    SetCollection(Option<Vec<CollectionEntry>>),
    SetTreasury(TreasuryStatus),
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Self::SetWeb3(_) => "set_web3",
            Self::SetCollection(_) => "set_collection",
            Self::SetTreasury(_) => "set_treasury",
        }
    }
}

/// Apply `action` to `state`, returning the new state.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    match action {
        Action::SetWeb3(web3) => AppState {
            web3,
            ..state.clone()
        },
        Action::SetCollection(collection) => AppState {
            collection,
            ..state.clone()
        },
        Action::SetTreasury(treasury) => AppState {
            treasury,
            ..state.clone()
        },
    }
}

/// Single source of application state.
pub struct AppStore {
    state: watch::Sender<AppState>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl AppStore {
    pub fn new(initial: AppState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dispatch(&self, action: Action) {
        trace!(action = action.name(), "dispatch");
        self.state.send_modify(|state| *state = reduce(state, action));
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }
}

/// Publishes the connection status of every applied outcome.
pub struct StatusPublisher {
    store: Arc<AppStore>,
    latest: LatestDelivery,
}

impl StatusPublisher {
    pub fn new(store: Arc<AppStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            latest: LatestDelivery::new(),
        })
    }
}

#[async_trait]
impl OutcomeListener for StatusPublisher {
    fn name(&self) -> &str {
        "status"
    }

    async fn on_outcome(
        &self,
        outcome: ConnectionOutcome,
        sequence: u64,
    ) -> Result<(), ListenerError> {
        if self.latest.claim(sequence) {
            self.latest.publish(sequence, || {
                self.store.dispatch(Action::SetWeb3(Web3Status::from(&outcome)))
            });
        }
        Ok(())
    }
}
