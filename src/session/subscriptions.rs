//! Scoped provider event subscriptions.

use crate::provider::{
    EventHandler, ProviderEventKind, ProviderHandle, SubscriptionId, WalletError,
};
use std::sync::Arc;

/// Every event subscription a session holds on its provider.
///
/// Dropping the value removes all of them, so a failure part-way through
/// [`Subscriptions::subscribe_all`] leaves nothing registered.
pub(crate) struct Subscriptions {
    provider: ProviderHandle,
    ids: Vec<(ProviderEventKind, SubscriptionId)>,
}

impl Subscriptions {
    pub(crate) fn subscribe_all(
        provider: &ProviderHandle,
        handler: EventHandler,
    ) -> Result<Self, WalletError> {
        let mut subscriptions = Self {
            provider: provider.clone(),
            ids: Vec::with_capacity(ProviderEventKind::ALL.len()),
        };
        for kind in ProviderEventKind::ALL {
            let id = provider.on(kind, Arc::clone(&handler))?;
            subscriptions.ids.push((kind, id));
        }
        Ok(subscriptions)
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for (kind, id) in self.ids.drain(..) {
            self.provider.remove_listener(kind, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryWallet;

    #[test]
    fn drop_releases_every_subscription() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        let subscriptions =
            Subscriptions::subscribe_all(&wallet.handle(), Arc::new(|_| {})).unwrap();
        assert_eq!(wallet.handler_count(), ProviderEventKind::ALL.len());

        drop(subscriptions);
        assert_eq!(wallet.handler_count(), 0);
    }

    #[test]
    fn partial_subscription_is_rolled_back() {
        let wallet = InMemoryWallet::mainnet(vec![]);
        wallet.limit_subscriptions(3);
        let result = Subscriptions::subscribe_all(&wallet.handle(), Arc::new(|_| {}));
        assert!(result.is_err());
        assert_eq!(wallet.handler_count(), 0);
    }
}
