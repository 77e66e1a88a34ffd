//! Wallet provider errors.

use thiserror::Error;

/// EIP-1193 code for "the user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors surfaced by a wallet provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WalletError {
    /// The user dismissed or refused a wallet popup.
    #[error("{message}")]
    Rejected { code: i64, message: String },

    /// The wallet answered with a JSON-RPC error.
    #[error("wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The provider could not be reached at all.
    #[error("wallet transport failed: {0}")]
    Transport(String),

    /// The wallet answered with something that is not the expected shape.
    #[error("invalid response to {method}: {reason}")]
    InvalidResponse { method: &'static str, reason: String },
}

impl WalletError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            code: USER_REJECTED_CODE,
            message: message.into(),
        }
    }

    /// Build an error from a JSON-RPC error code, classifying user rejections.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == USER_REJECTED_CODE {
            Self::Rejected { code, message }
        } else {
            Self::Rpc { code, message }
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Text suitable for showing next to a failure reason.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
