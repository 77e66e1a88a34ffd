//! In-memory wallet provider.
//!
//! Holds a chain id and an account list, answers the read-only RPC methods
//! from them, and answers popup requests according to a scripted
//! [`PopupResponse`]. Like a real wallet, approving a popup does not change
//! anything by itself: the change arrives later as an event, emitted with
//! [`InMemoryWallet::emit`] or one of the helpers built on it.

use super::{
    format_chain_id, EventHandler, ProviderEvent, ProviderEventKind, ProviderHandle, RpcRequest,
    SubscriptionId, WalletError, WalletProvider,
};
use crate::core::{Address, MAINNET_CHAIN_ID};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How the wallet answers a popup request.
#[derive(Clone, Debug, PartialEq)]
pub enum PopupResponse {
    /// The popup was shown; the request itself resolves successfully.
    Approve,
    /// The user dismissed the popup.
    Reject(String),
    /// The request failed for another reason.
    Fail(WalletError),
}

struct Inner {
    chain_id: u64,
    accounts: Vec<Address>,
    switch_response: PopupResponse,
    accounts_response: PopupResponse,
    transport_failure: Option<String>,
    subscription_budget: Option<usize>,
    responses: HashMap<&'static str, Value>,
    calls: HashMap<&'static str, usize>,
    handlers: Vec<(ProviderEventKind, SubscriptionId, EventHandler)>,
    next_subscription: u64,
}

/// Scriptable [`WalletProvider`].
pub struct InMemoryWallet {
    inner: Mutex<Inner>,
}

impl InMemoryWallet {
    pub fn new(chain_id: u64, accounts: Vec<Address>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                chain_id,
                accounts,
                switch_response: PopupResponse::Approve,
                accounts_response: PopupResponse::Approve,
                transport_failure: None,
                subscription_budget: None,
                responses: HashMap::new(),
                calls: HashMap::new(),
                handlers: Vec::new(),
                next_subscription: 1,
            }),
        })
    }

    pub fn mainnet(accounts: Vec<Address>) -> Arc<Self> {
        Self::new(MAINNET_CHAIN_ID, accounts)
    }

    pub fn handle(self: &Arc<Self>) -> ProviderHandle {
        ProviderHandle::from(Arc::clone(self))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.lock().chain_id = chain_id;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.lock().accounts = accounts;
    }

    pub fn chain_id(&self) -> u64 {
        self.lock().chain_id
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.lock().accounts.clone()
    }

    pub fn respond_to_switch(&self, response: PopupResponse) {
        self.lock().switch_response = response;
    }

    pub fn respond_to_account_request(&self, response: PopupResponse) {
        self.lock().accounts_response = response;
    }

    /// Make every request fail with a transport error until cleared.
    pub fn fail_transport(&self, message: Option<String>) {
        self.lock().transport_failure = message;
    }

    /// Accept only `count` more `on` registrations; later ones fail.
    pub fn limit_subscriptions(&self, count: usize) {
        self.lock().subscription_budget = Some(count);
    }

    /// Canned answer for one of the informational RPC methods.
    pub fn set_response(&self, method: &'static str, value: Value) {
        self.lock().responses.insert(method, value);
    }

    /// How many times `method` was requested.
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Number of live event subscriptions.
    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Deliver `event` to every handler subscribed to its kind.
    ///
    /// Handlers run on the caller's thread, after the internal lock is
    /// released.
    pub fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .lock()
            .handlers
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    /// The user switched networks in the wallet.
    pub fn switch_chain(&self, chain_id: u64) {
        self.set_chain_id(chain_id);
        self.emit(ProviderEvent::ChainChanged(format_chain_id(chain_id)));
    }

    /// The user changed the authorized accounts in the wallet.
    pub fn change_accounts(&self, accounts: Vec<Address>) {
        self.set_accounts(accounts.clone());
        self.emit(ProviderEvent::AccountsChanged(accounts));
    }

    fn popup(response: &PopupResponse) -> Result<Value, WalletError> {
        match response {
            PopupResponse::Approve => Ok(Value::Null),
            PopupResponse::Reject(message) => Err(WalletError::rejected(message.clone())),
            PopupResponse::Fail(err) => Err(err.clone()),
        }
    }
}

#[async_trait]
impl WalletProvider for InMemoryWallet {
    async fn request(&self, request: RpcRequest) -> Result<Value, WalletError> {
        let mut inner = self.lock();
        *inner.calls.entry(request.method()).or_default() += 1;
        if let Some(message) = &inner.transport_failure {
            return Err(WalletError::Transport(message.clone()));
        }

        match request {
            RpcRequest::ChainId => Ok(Value::String(format_chain_id(inner.chain_id))),
            RpcRequest::Accounts => serde_json::to_value(&inner.accounts).map_err(|e| {
                WalletError::InvalidResponse {
                    method: "eth_accounts",
                    reason: e.to_string(),
                }
            }),
            RpcRequest::RequestAccounts => Self::popup(&inner.accounts_response),
            RpcRequest::SwitchChain(_) => Self::popup(&inner.switch_response),
            other => inner
                .responses
                .get(other.method())
                .cloned()
                .ok_or_else(|| WalletError::Rpc {
                    code: -32601,
                    message: format!("method {} not supported", other.method()),
                }),
        }
    }

    fn on(
        &self,
        kind: ProviderEventKind,
        handler: EventHandler,
    ) -> Result<SubscriptionId, WalletError> {
        let mut inner = self.lock();
        if let Some(budget) = inner.subscription_budget.as_mut() {
            if *budget == 0 {
                return Err(WalletError::Transport(format!(
                    "cannot subscribe to {kind}"
                )));
            }
            *budget -= 1;
        }
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.handlers.push((kind, id, handler));
        Ok(id)
    }

    fn remove_listener(&self, kind: ProviderEventKind, id: SubscriptionId) {
        self.lock()
            .handlers
            .retain(|(k, existing, _)| !(*k == kind && *existing == id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn answers_reads_from_state() {
        let wallet = InMemoryWallet::new(4, vec![Address::from("0xABC")]);
        assert_eq!(
            wallet.request(RpcRequest::ChainId).await.unwrap(),
            Value::String("0x4".to_string())
        );
        assert_eq!(
            wallet.request(RpcRequest::Accounts).await.unwrap(),
            serde_json::json!(["0xABC"])
        );
        assert_eq!(wallet.call_count("eth_chainId"), 1);
        assert_eq!(wallet.call_count("eth_requestAccounts"), 0);
    }

    #[tokio::test]
    async fn popup_responses_are_scripted() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.respond_to_account_request(PopupResponse::Reject("User rejected".into()));
        let err = wallet.request(RpcRequest::RequestAccounts).await.unwrap_err();
        assert!(err.is_user_rejection());

        assert!(wallet.request(RpcRequest::switch_chain(1)).await.is_ok());
        // approving a popup changes nothing until an event arrives
        assert!(wallet.accounts().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_applies_to_every_request() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.fail_transport(Some("gone".into()));
        assert!(matches!(
            wallet.request(RpcRequest::ChainId).await,
            Err(WalletError::Transport(_))
        ));
    }

    #[test]
    fn emit_reaches_only_matching_subscriptions() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = wallet
            .on(
                ProviderEventKind::ChainChanged,
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        wallet.switch_chain(4);
        wallet.change_accounts(vec![Address::from("0x1")]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        wallet.remove_listener(ProviderEventKind::ChainChanged, id);
        wallet.switch_chain(1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(wallet.handler_count(), 0);
    }

    #[test]
    fn subscription_budget_is_enforced() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.limit_subscriptions(1);
        let handler: EventHandler = Arc::new(|_| {});
        assert!(wallet
            .on(ProviderEventKind::Connect, Arc::clone(&handler))
            .is_ok());
        assert!(wallet.on(ProviderEventKind::Disconnect, handler).is_err());
    }
}
