//! Listener fan-out registry.
//!
//! Listeners are data loaders that react to every applied outcome. Each
//! notification is driven by one task that polls every listener in
//! registration order, without the session waiting for any of them. A
//! listener that fails or panics is logged and does not affect the others.
//!
//! Notifications for different outcomes may run concurrently and finish in
//! any order. Every delivery carries a sequence number that grows with each
//! notification; listeners that publish state use [`LatestDelivery`] so an
//! older delivery never overwrites a newer one.

use crate::core::ConnectionOutcome;
use crate::loaders::ReadError;
use crate::provider::WalletError;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{trace, warn};

/// Error returned by a listener. Only ever logged.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("{0}")]
    Failed(String),
}

/// Receives every outcome the session applies.
///
/// `Failure` outcomes mean "clear your data"; `Connected` outcomes mean
/// "reload your data for this address and provider". `sequence` orders the
/// deliveries: a higher number belongs to a newer outcome.
#[async_trait]
pub trait OutcomeListener: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn on_outcome(
        &self,
        outcome: ConnectionOutcome,
        sequence: u64,
    ) -> Result<(), ListenerError>;
}

/// Listener backed by an async closure.
pub struct FnListener<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> OutcomeListener for FnListener<F>
where
    F: Fn(ConnectionOutcome) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_outcome(
        &self,
        outcome: ConnectionOutcome,
        _sequence: u64,
    ) -> Result<(), ListenerError> {
        (self.f)(outcome).await
    }
}

/// Wrap an async closure as a listener. The closure does not see delivery
/// sequence numbers.
pub fn listener_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn OutcomeListener>
where
    F: Fn(ConnectionOutcome) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    Arc::new(FnListener {
        name: name.into(),
        f,
    })
}

/// Returned by [`ListenerRegistry::register`]; pass it back to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

struct Entry {
    handle: ListenerHandle,
    listener: Arc<dyn OutcomeListener>,
}

/// Ordered set of listeners. Registering the same listener twice notifies it
/// twice.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<Vec<Entry>>,
    next_handle: AtomicU64,
    delivered: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, listener: Arc<dyn OutcomeListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.entries().push(Entry { handle, listener });
        handle
    }

    /// Remove a listener. Returns `false` if the handle is unknown.
    pub fn unregister(&self, handle: ListenerHandle) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|entry| entry.handle != handle);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn OutcomeListener>> {
        self.entries()
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect()
    }

    /// Deliver `outcome` to every listener and return immediately.
    ///
    /// One task drives the whole notification, so listeners get their first
    /// poll in registration order. Returns the delivery sequence handed to
    /// the listeners; it grows with every call, so callers that notify in
    /// apply order get sequences in apply order.
    pub fn notify(&self, runtime: &Handle, outcome: &ConnectionOutcome) -> u64 {
        let sequence = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        let deliveries: Vec<_> = self
            .snapshot()
            .into_iter()
            .map(|listener| deliver(listener, outcome.clone(), sequence))
            .collect();
        if !deliveries.is_empty() {
            runtime.spawn(join_all(deliveries));
        }
        sequence
    }
}

async fn deliver(listener: Arc<dyn OutcomeListener>, outcome: ConnectionOutcome, sequence: u64) {
    let result = AssertUnwindSafe(listener.on_outcome(outcome, sequence))
        .catch_unwind()
        .await;
    let name = listener.name();
    match result {
        Ok(Ok(())) => trace!(listener = name, delivery = sequence, "listener done"),
        Ok(Err(err)) => {
            warn!(listener = name, delivery = sequence, error = %err, "listener failed")
        }
        Err(_) => warn!(listener = name, delivery = sequence, "listener panicked"),
    }
}

/// Newest delivery a listener has started on.
///
/// A listener claims each delivery when it begins handling it and publishes
/// through [`LatestDelivery::publish`], which only runs while no newer
/// delivery has been claimed. Claims and publishes are serialized.
#[derive(Debug, Default)]
pub struct LatestDelivery {
    newest: Mutex<u64>,
}

impl LatestDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest(&self) -> MutexGuard<'_, u64> {
        self.newest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `sequence` as started. Returns `false` if a newer delivery was
    /// already claimed; the caller should then skip the work entirely.
    pub fn claim(&self, sequence: u64) -> bool {
        let mut newest = self.newest();
        if sequence < *newest {
            return false;
        }
        *newest = sequence;
        true
    }

    /// Run `publish` if `sequence` is still the newest claimed delivery.
    pub fn publish<R>(&self, sequence: u64, publish: impl FnOnce() -> R) -> Option<R> {
        let newest = self.newest();
        (*newest == sequence).then(publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureReason;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn recording(
        name: &'static str,
        tx: mpsc::UnboundedSender<&'static str>,
    ) -> Arc<dyn OutcomeListener> {
        listener_fn(name, move |_outcome| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(name);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn notify_runs_listeners_in_registration_order() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(recording("first", tx.clone()));
        registry.register(recording("second", tx.clone()));
        registry.register(recording("third", tx));

        let outcome = ConnectionOutcome::failure(FailureReason::NotConnected);
        assert_eq!(registry.notify(&Handle::current(), &outcome), 1);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn registration_order_holds_when_notified_from_a_worker() {
        let registry = Arc::new(ListenerRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(recording("first", tx.clone()));
        registry.register(recording("second", tx.clone()));
        registry.register(recording("third", tx));

        tokio::spawn({
            let registry = Arc::clone(&registry);
            async move {
                let outcome = ConnectionOutcome::failure(FailureReason::NotConnected);
                registry.notify(&Handle::current(), &outcome);
            }
        })
        .await
        .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let name = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap();
            seen.push(name.unwrap());
        }
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn delivery_sequence_grows_with_each_notification() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(Arc::new(SequenceRecorder(tx)));

        let outcome = ConnectionOutcome::failure(FailureReason::NotConnected);
        let first = registry.notify(&Handle::current(), &outcome);
        let second = registry.notify(&Handle::current(), &outcome);
        assert!(first < second);

        let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        seen.sort_unstable();
        assert_eq!(seen, vec![first, second]);
    }

    struct SequenceRecorder(mpsc::UnboundedSender<u64>);

    #[async_trait]
    impl OutcomeListener for SequenceRecorder {
        fn name(&self) -> &str {
            "sequence"
        }

        async fn on_outcome(
            &self,
            _outcome: ConnectionOutcome,
            sequence: u64,
        ) -> Result<(), ListenerError> {
            self.0
                .send(sequence)
                .map_err(|e| ListenerError::Failed(e.to_string()))
        }
    }

    #[test]
    fn older_delivery_cannot_claim_or_publish_after_newer() {
        let latest = LatestDelivery::new();
        assert!(latest.claim(1));
        assert!(latest.claim(3));
        assert!(!latest.claim(2));

        assert_eq!(latest.publish(1, || "stale"), None);
        assert_eq!(latest.publish(3, || "fresh"), Some("fresh"));
    }

    #[test]
    fn same_delivery_may_be_claimed_twice() {
        let latest = LatestDelivery::new();
        assert!(latest.claim(4));
        assert!(latest.claim(4));
        assert_eq!(latest.publish(4, || ()), Some(()));
    }

    #[tokio::test]
    async fn failing_and_panicking_listeners_are_isolated() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(listener_fn("fails", |_| async {
            Err(ListenerError::Failed("no data".to_string()))
        }));
        registry.register(listener_fn("panics", |outcome: ConnectionOutcome| async move {
            assert!(outcome.is_connected(), "listener bug");
            Ok(())
        }));
        registry.register(recording("survivor", tx));

        let outcome = ConnectionOutcome::failure(FailureReason::NotInstalled);
        registry.notify(&Handle::current(), &outcome);

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some("survivor"));
    }

    #[tokio::test]
    async fn duplicates_are_kept_and_unregister_removes_one() {
        let registry = ListenerRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let listener = recording("dup", tx);
        let first = registry.register(Arc::clone(&listener));
        let second = registry.register(listener);
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first));
        assert_eq!(registry.len(), 1);
    }
}
