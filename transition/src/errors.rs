use hopline_state_machine::errors::StateTransitionError;
use hopline_storage::errors::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransitionError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Rejected state change: {0}")]
	StateTransition(#[from] StateTransitionError),
	#[error("Invalid configuration: {0}")]
	Config(serde_json::Error),
	#[error("Stored state does not belong to this node: {0}")]
	StateMismatch(String),
}

/// Failure reported by an effect executor.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0}")]
pub struct EffectError(pub String);
