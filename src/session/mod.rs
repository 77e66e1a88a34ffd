//! The provider session: owns the canonical connection outcome, reacts to
//! wallet events and fans applied outcomes out to listeners.

mod builder;
mod error;
mod machine;
mod subscriptions;

pub use builder::SessionBuilder;
pub use error::{BuildError, SessionError};
pub use machine::ProviderSession;

impl ProviderSession {
    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}
