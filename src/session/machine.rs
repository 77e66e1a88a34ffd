//! Provider connection state machine.

use super::error::SessionError;
use super::subscriptions::Subscriptions;
use crate::config::SessionConfig;
use crate::core::{
    ConnectionOutcome, ConnectionState, FailureReason, State, StateHistory, StateTransition,
};
use crate::listeners::{ListenerHandle, ListenerRegistry, OutcomeListener};
use crate::negotiate::{NegotiationPolicy, Negotiator};
use crate::provider::{EventHandler, ProviderEvent, ProviderEventKind, ProviderHandle};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Canonical state, only ever replaced as a whole under the lock.
struct Canonical {
    outcome: ConnectionOutcome,
    phase: ConnectionState,
    history: StateHistory<ConnectionState>,
    last_applied: u64,
    attached: bool,
    subscriptions: Option<Subscriptions>,
}

struct SessionInner {
    id: Uuid,
    config: SessionConfig,
    negotiator: Negotiator,
    runtime: Handle,
    listeners: ListenerRegistry,
    sequence: AtomicU64,
    canonical: Mutex<Canonical>,
    outcome_tx: watch::Sender<ConnectionOutcome>,
}

/// Owner of the wallet connection lifecycle.
///
/// One session exists per application. It is cheap to clone; every clone
/// refers to the same state. Consumers observe it through [`Self::subscribe`]
/// or by registering an [`OutcomeListener`].
///
/// Every trigger (provider event, explicit negotiation, initial attach) gets
/// a sequence number when it arrives. A negotiation result is applied only if
/// no result of a later trigger has been applied yet, and only while the
/// session is attached.
#[derive(Clone)]
pub struct ProviderSession {
    inner: Arc<SessionInner>,
}

impl ProviderSession {
    pub(crate) fn from_parts(
        config: SessionConfig,
        provider: Option<ProviderHandle>,
        runtime: Handle,
        listeners: ListenerRegistry,
    ) -> Self {
        let initial = if provider.is_some() {
            ConnectionOutcome::failure(FailureReason::NotConnected)
        } else {
            ConnectionOutcome::failure(FailureReason::NotInstalled)
        };
        let (outcome_tx, _) = watch::channel(initial.clone());
        let negotiator = Negotiator::new(provider, config.target_chain_id);

        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                negotiator,
                runtime,
                listeners,
                sequence: AtomicU64::new(0),
                canonical: Mutex::new(Canonical {
                    outcome: initial,
                    phase: ConnectionState::Uninitialized,
                    history: StateHistory::with_limit(config.history_limit),
                    last_applied: 0,
                    attached: false,
                    subscriptions: None,
                }),
                outcome_tx,
                config,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.inner.negotiator
    }

    pub fn provider(&self) -> Option<&ProviderHandle> {
        self.inner.negotiator.provider()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().attached
    }

    /// Snapshot of the canonical outcome.
    pub fn current(&self) -> ConnectionOutcome {
        self.inner.lock().outcome.clone()
    }

    /// Phase of the canonical outcome; `Uninitialized` until the first
    /// negotiation is applied.
    pub fn phase(&self) -> ConnectionState {
        self.inner.lock().phase.clone()
    }

    pub fn history(&self) -> StateHistory<ConnectionState> {
        self.inner.lock().history.clone()
    }

    /// Receiver that observes every applied outcome.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionOutcome> {
        self.inner.outcome_tx.subscribe()
    }

    pub fn register_listener(&self, listener: Arc<dyn OutcomeListener>) -> ListenerHandle {
        self.inner.listeners.register(listener)
    }

    pub fn unregister_listener(&self, handle: ListenerHandle) -> bool {
        self.inner.listeners.unregister(handle)
    }

    /// Registered listeners in notification order.
    pub fn listeners(&self) -> Vec<Arc<dyn OutcomeListener>> {
        self.inner.listeners.snapshot()
    }

    /// Subscribe to all provider events and run the initial passive
    /// negotiation.
    ///
    /// Without a provider nothing is subscribed and the outcome is
    /// `NOT_INSTALLED`. If subscribing fails part-way, the handlers already
    /// registered are removed again.
    pub async fn attach(&self) -> Result<ConnectionOutcome, SessionError> {
        {
            let mut canonical = self.inner.lock();
            if canonical.attached {
                return Err(SessionError::AlreadyAttached);
            }
            canonical.attached = true;
        }

        if let Some(provider) = self.inner.negotiator.provider() {
            let subscriptions =
                match Subscriptions::subscribe_all(provider, self.inner.event_handler()) {
                    Ok(subscriptions) => subscriptions,
                    Err(err) => {
                        self.inner.lock().attached = false;
                        warn!(
                            session = %self.inner.id,
                            error = %err,
                            "provider subscription failed"
                        );
                        return Err(SessionError::Subscribe(err));
                    }
                };

            let mut canonical = self.inner.lock();
            if !canonical.attached {
                drop(canonical);
                return Err(SessionError::DetachedDuringAttach);
            }
            canonical.subscriptions = Some(subscriptions);
        }

        info!(
            session = %self.inner.id,
            installed = self.inner.negotiator.provider().is_some(),
            "session attached"
        );
        let sequence = self.inner.next_sequence();
        Ok(self.inner.run(sequence, NegotiationPolicy::PASSIVE).await)
    }

    /// Release every provider subscription. Results that arrive afterwards
    /// are discarded. Returns `false` if the session was not attached.
    pub fn detach(&self) -> bool {
        let subscriptions = {
            let mut canonical = self.inner.lock();
            if !canonical.attached {
                return false;
            }
            canonical.attached = false;
            canonical.subscriptions.take()
        };
        drop(subscriptions);
        info!(session = %self.inner.id, "session detached");
        true
    }

    /// Negotiate with explicit flags and apply the result.
    ///
    /// The result is returned even when it is not applied (session detached,
    /// or superseded by a newer result).
    pub async fn negotiate(&self, policy: NegotiationPolicy) -> ConnectionOutcome {
        let sequence = self.inner.next_sequence();
        self.inner.run(sequence, policy).await
    }

    /// User-initiated connect: may open the account and network popups.
    pub async fn request_connect(&self) -> ConnectionOutcome {
        self.negotiate(NegotiationPolicy::INTERACTIVE).await
    }

    /// Re-read the wallet without opening any popup.
    pub async fn refresh(&self) -> ConnectionOutcome {
        self.negotiate(NegotiationPolicy::PASSIVE).await
    }
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, Canonical> {
        self.canonical.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn event_handler(self: &Arc<Self>) -> EventHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_provider_event(event);
            }
        })
    }

    /// Called synchronously by the provider; only sequences and schedules.
    fn on_provider_event(self: &Arc<Self>, event: ProviderEvent) {
        let kind = event.kind();
        if kind == ProviderEventKind::Message {
            debug!(session = %self.id, ?event, "provider message");
            return;
        }

        let sequence = self.next_sequence();
        trace!(session = %self.id, seq = sequence, event = %kind, "provider event");
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.run(sequence, NegotiationPolicy::PASSIVE).await;
        });
    }

    async fn run(&self, sequence: u64, policy: NegotiationPolicy) -> ConnectionOutcome {
        let outcome = match self.negotiator.negotiate(policy).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(session = %self.id, seq = sequence, error = %err, "negotiation failed");
                ConnectionOutcome::failure_with_detail(
                    FailureReason::NotConnected,
                    Some(err.to_string()),
                )
            }
        };
        self.apply(sequence, &outcome);
        outcome
    }

    /// Replace the canonical outcome and notify. Returns whether it was
    /// applied.
    fn apply(&self, sequence: u64, outcome: &ConnectionOutcome) -> bool {
        let mut canonical = self.lock();
        if !canonical.attached {
            debug!(session = %self.id, seq = sequence, "session not attached, result dropped");
            return false;
        }
        if self.config.discard_stale_results && sequence <= canonical.last_applied {
            debug!(
                session = %self.id,
                seq = sequence,
                applied = canonical.last_applied,
                "stale negotiation result dropped"
            );
            return false;
        }

        let phase = ConnectionState::from(outcome);
        if phase != canonical.phase {
            info!(
                session = %self.id,
                seq = sequence,
                from = canonical.phase.name(),
                to = phase.name(),
                %outcome,
                "connection phase changed"
            );
            canonical.history = canonical.history.record(StateTransition {
                from: canonical.phase.clone(),
                to: phase.clone(),
                timestamp: Utc::now(),
                sequence,
            });
        }
        canonical.phase = phase;
        canonical.outcome = outcome.clone();
        canonical.last_applied = canonical.last_applied.max(sequence);

        self.outcome_tx.send_replace(outcome.clone());
        let delivery = self.listeners.notify(&self.runtime, outcome);
        trace!(session = %self.id, seq = sequence, delivery, "listeners notified");
        true
    }
}
