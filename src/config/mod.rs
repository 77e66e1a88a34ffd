//! Session configuration.
//!
//! Validation uses Stillwater's `Validation` type so that every problem in a
//! configuration is reported at once instead of stopping at the first one.
//!
//! # Example
//!
//! ```rust
//! use wallet_session::config::SessionConfig;
//!
//! let config = SessionConfig::from_json(r#"{ "history_limit": 16 }"#).unwrap();
//! assert_eq!(config.target_chain_id, 1);
//! assert!(config.validate().is_success());
//! ```

mod error;

pub use error::ConfigError;

use crate::core::MAINNET_CHAIN_ID;
use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Default number of phase transitions kept in the session history.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Tunables of a [`crate::session::ProviderSession`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// The single chain the session accepts.
    pub target_chain_id: u64,
    /// Number of phase transitions retained in the history.
    pub history_limit: usize,
    /// Drop negotiation results that finish after a newer one was applied.
    pub discard_stale_results: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_chain_id: MAINNET_CHAIN_ID,
            history_limit: DEFAULT_HISTORY_LIMIT,
            discard_stale_results: true,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every rule, accumulating all violations.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<ConfigError>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<ConfigError>>> = Vec::new();

        checks.push(if self.target_chain_id == 0 {
            Validation::fail(ConfigError::ZeroChainId)
        } else {
            Validation::success(())
        });

        checks.push(if self.history_limit == 0 {
            Validation::fail(ConfigError::EmptyHistory)
        } else {
            Validation::success(())
        });

        Validation::all_vec(checks).map(|_| ())
    }

    /// Validate and return the violations as a plain list.
    pub fn check(&self) -> Result<(), Vec<ConfigError>> {
        match self.validate() {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
        }
    }
}
