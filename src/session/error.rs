//! Session and builder errors.

use crate::config::ConfigError;
use crate::provider::WalletError;
use thiserror::Error;

/// Errors from the attach/detach lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already attached")]
    AlreadyAttached,

    #[error("session was detached while attaching")]
    DetachedDuringAttach,

    #[error("failed to subscribe to provider events: {0}")]
    Subscribe(#[source] WalletError),
}

/// Errors that can occur when building a session.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "invalid configuration: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    InvalidConfig(Vec<ConfigError>),

    #[error("no tokio runtime available. Call .runtime(handle) or build inside a runtime")]
    MissingRuntime,
}
