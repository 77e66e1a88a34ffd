//! Builder for constructing provider sessions.

use super::error::BuildError;
use super::machine::ProviderSession;
use crate::config::SessionConfig;
use crate::listeners::{ListenerRegistry, OutcomeListener};
use crate::provider::ProviderHandle;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Builder for [`ProviderSession`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use wallet_session::provider::memory::InMemoryWallet;
/// use wallet_session::session::SessionBuilder;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let wallet = InMemoryWallet::mainnet(vec!["0xabc".into()]);
/// let session = SessionBuilder::new()
///     .provider(wallet.handle())
///     .build()
///     .unwrap();
///
/// let outcome = session.attach().await.unwrap();
/// assert!(outcome.is_connected());
/// # }
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    provider: Option<ProviderHandle>,
    listeners: Vec<Arc<dyn OutcomeListener>>,
    runtime: Option<Handle>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the injected wallet. Without one the session reports
    /// `NOT_INSTALLED`.
    pub fn provider(mut self, provider: ProviderHandle) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn maybe_provider(mut self, provider: Option<ProviderHandle>) -> Self {
        self.provider = provider;
        self
    }

    /// Register a listener, after the ones already added.
    pub fn listener(mut self, listener: Arc<dyn OutcomeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn listeners(
        mut self,
        listeners: impl IntoIterator<Item = Arc<dyn OutcomeListener>>,
    ) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Runtime used for event-triggered negotiations and listener tasks.
    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the session.
    /// Returns an error if the configuration is invalid or no runtime is
    /// available.
    pub fn build(self) -> Result<ProviderSession, BuildError> {
        self.config.check().map_err(BuildError::InvalidConfig)?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BuildError::MissingRuntime)?,
        };

        let registry = ListenerRegistry::new();
        for listener in self.listeners {
            registry.register(listener);
        }

        Ok(ProviderSession::from_parts(
            self.config,
            self.provider,
            runtime,
            registry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::core::FailureReason;
    use crate::listeners::listener_fn;

    #[test]
    fn build_requires_a_runtime() {
        let result = SessionBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingRuntime)));
    }

    #[test]
    fn explicit_runtime_is_accepted() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let session = SessionBuilder::new()
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(session.current().reason(), Some(FailureReason::NotInstalled));
    }

    #[tokio::test]
    async fn invalid_config_reports_every_violation() {
        let config = SessionConfig {
            target_chain_id: 0,
            history_limit: 0,
            ..SessionConfig::default()
        };
        match SessionBuilder::new().config(config).build() {
            Err(BuildError::InvalidConfig(errors)) => {
                assert_eq!(errors, vec![ConfigError::ZeroChainId, ConfigError::EmptyHistory]);
            }
            _ => panic!("expected InvalidConfig"),
        }
    }

    #[tokio::test]
    async fn listeners_are_registered_in_order() {
        let session = SessionBuilder::new()
            .listener(listener_fn("a", |_| async { Ok(()) }))
            .listeners(vec![
                listener_fn("b", |_| async { Ok(()) }),
                listener_fn("c", |_| async { Ok(()) }),
            ])
            .build()
            .unwrap();
        let names: Vec<String> = session
            .listeners()
            .iter()
            .map(|listener| listener.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
