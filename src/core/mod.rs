//! Core connection types.
//!
//! This module contains the pure data of the session:
//! - Negotiation outcomes and the failure taxonomy
//! - The connection phase and the `State` trait it implements
//! - Immutable, bounded transition history
//!
//! Nothing in this module performs I/O.

mod history;
mod outcome;
mod state;

pub use history::{StateHistory, StateTransition};
pub use outcome::{
    Address, Connection, ConnectionOutcome, Failure, FailureCategory, FailureReason,
    MAINNET_CHAIN_ID,
};
pub use state::{ConnectionState, State};
