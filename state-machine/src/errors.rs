#![warn(clippy::missing_docs_in_private_items)]

use hopline_primitives::types::{
	CanonicalIdentifier,
	SecretHash,
};
use thiserror::Error;

/// Errors raised by the pending locks engine.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum PendingLocksError {
	#[error("Lock for secrethash {0:?} is already pending")]
	DuplicateLock(SecretHash),
	#[error("Lock for secrethash {0:?} is not pending")]
	UnknownLock(SecretHash),
}

/// The state transition error type.
///
/// A transition returning an error leaves the chain state untouched.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum StateTransitionError {
	#[error("Invalid balance proof: {0}")]
	InvalidBalanceProof(String),
	#[error(transparent)]
	PendingLocks(#[from] PendingLocksError),
	#[error("Unknown channel {0:?}")]
	UnknownChannel(CanonicalIdentifier),
	#[error("Invalid {state_change}: {reason}")]
	InvalidStateChange { state_change: &'static str, reason: String },
	#[error("Invariant violated: {0}")]
	InvariantViolation(String),
	#[error("{0}")]
	Other(String),
}

impl StateTransitionError {
	/// Rejection of a received message or local action that failed validation.
	pub fn invalid(state_change: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidStateChange { state_change, reason: reason.into() }
	}
}

impl From<String> for StateTransitionError {
	fn from(msg: String) -> Self {
		Self::Other(msg)
	}
}
