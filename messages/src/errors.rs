use thiserror::Error;
use web3::signing::{
	RecoveryError,
	SigningError,
};

#[derive(Error, Debug)]
pub enum MessageError {
	#[error("Could not sign message: {0:?}")]
	Signing(SigningError),
	#[error("Could not recover signer: {0:?}")]
	Recovery(RecoveryError),
	#[error("Malformed message: {0}")]
	Malformed(String),
	#[error("Key error: {0}")]
	Key(String),
}
