use ethsign::SecretKey;
use hopline_primitives::{
	signing::hash_data,
	types::{
		Address,
		H256,
	},
};
use web3::signing::{
	self,
	Key,
	SigningError,
};

use crate::errors::MessageError;

/// The key every outgoing message is signed with.
#[derive(Clone)]
pub struct PrivateKey {
	inner: SecretKey,
}

impl PrivateKey {
	pub fn from_raw(raw: &[u8]) -> Result<Self, MessageError> {
		let inner = SecretKey::from_raw(raw)
			.map_err(|e| MessageError::Key(format!("Invalid secret key: {:?}", e)))?;
		Ok(Self { inner })
	}
}

impl Key for PrivateKey {
	fn sign(
		&self,
		message: &[u8],
		chain_id: Option<u64>,
	) -> Result<signing::Signature, SigningError> {
		let signature = self.inner.sign(message).map_err(|_| SigningError::InvalidMessage)?;

		let standard_v = signature.v as u64;
		let v = if let Some(chain_id) = chain_id {
			standard_v + 35 + chain_id * 2
		} else {
			standard_v + 27
		};
		Ok(signing::Signature { r: H256::from(signature.r), s: H256::from(signature.s), v })
	}

	fn sign_message(&self, message: &[u8]) -> Result<signing::Signature, SigningError> {
		self.sign(&hash_data(message), None)
	}

	fn address(&self) -> Address {
		Address::from(self.inner.public().address())
	}
}
