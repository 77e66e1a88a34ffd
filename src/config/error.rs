//! Configuration errors.

use thiserror::Error;

/// Problems found while loading or validating a [`super::SessionConfig`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("config could not be parsed: {0}")]
    Parse(String),

    #[error("target chain id must be non-zero")]
    ZeroChainId,

    #[error("history limit must be at least 1")]
    EmptyHistory,
}
