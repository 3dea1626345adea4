use hopline_primitives::{
	deserializers::{
		signature_from_str,
		u64_from_str,
	},
	hashing::hash_balance_data,
	packing::pack_balance_proof,
	traits::ToBytes,
	types::{
		Address,
		BlockExpiration,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		LockedAmount,
		Locksroot,
		MessageHash,
		MessageIdentifier,
		MessageTypeId,
		Nonce,
		PaymentIdentifier,
		Secret,
		SecretHash,
		Signature,
		TokenAddress,
		TokenAmount,
		TokenNetworkAddress,
		U256,
	},
};
use hopline_state_machine::types::{
	BalanceProofState,
	SendLockExpired,
	SendLockedTransfer,
	SendSecretRequest,
	SendSecretReveal,
	SendUnlock,
};
use serde::{
	Deserialize,
	Serialize,
};
use web3::ethabi::{
	encode,
	Token,
};

use super::{
	metadata::Metadata,
	signed_message,
	CmdId,
	SignedEnvelopeMessage,
};
use crate::errors::MessageError;

/// Balance data shared by every message that moves the sender's balance proof forward.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
	pub chain_id: ChainID,
	pub token_network_address: TokenNetworkAddress,
	#[serde(with = "hopline_primitives::decimal")]
	pub channel_identifier: ChannelIdentifier,
	#[serde(with = "hopline_primitives::decimal")]
	pub nonce: Nonce,
	#[serde(with = "hopline_primitives::decimal")]
	pub transferred_amount: TokenAmount,
	#[serde(with = "hopline_primitives::decimal")]
	pub locked_amount: LockedAmount,
	pub locksroot: Locksroot,
}

impl EnvelopeData {
	pub fn canonical_identifier(&self) -> CanonicalIdentifier {
		CanonicalIdentifier {
			chain_identifier: self.chain_id,
			token_network_address: self.token_network_address,
			channel_identifier: self.channel_identifier,
		}
	}

	fn packed(&self, message_hash: MessageHash) -> Vec<u8> {
		let balance_hash =
			hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
				.unwrap_or_default();
		pack_balance_proof(
			self.nonce,
			balance_hash,
			message_hash,
			&self.canonical_identifier(),
			MessageTypeId::BalanceProof,
		)
		.0
	}

	/// The balance proof this envelope carries, attributed to `sender`.
	pub(crate) fn balance_proof(
		&self,
		message_hash: MessageHash,
		signature: &Signature,
		sender: Address,
	) -> Result<BalanceProofState, MessageError> {
		let balance_hash =
			hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
				.map_err(MessageError::Malformed)?;
		Ok(BalanceProofState {
			nonce: self.nonce,
			transferred_amount: self.transferred_amount,
			locked_amount: self.locked_amount,
			locksroot: self.locksroot,
			canonical_identifier: self.canonical_identifier(),
			balance_hash,
			message_hash: Some(message_hash),
			signature: Some(signature.clone()),
			sender: Some(sender),
		})
	}
}

impl From<&BalanceProofState> for EnvelopeData {
	fn from(balance_proof: &BalanceProofState) -> Self {
		Self {
			chain_id: balance_proof.canonical_identifier.chain_identifier,
			token_network_address: balance_proof.canonical_identifier.token_network_address,
			channel_identifier: balance_proof.canonical_identifier.channel_identifier,
			nonce: balance_proof.nonce,
			transferred_amount: balance_proof.transferred_amount,
			locked_amount: balance_proof.locked_amount,
			locksroot: balance_proof.locksroot,
		}
	}
}

/// Requests the secret which unlocks a lock.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecretRequest {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	pub payment_identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
	#[serde(with = "hopline_primitives::decimal")]
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendSecretRequest> for SecretRequest {
	fn from(event: SendSecretRequest) -> Self {
		Self {
			message_identifier: event.message_identifier,
			payment_identifier: event.payment_identifier,
			secrethash: event.secrethash,
			amount: event.amount,
			expiration: event.expiration,
			signature: Signature::default(),
		}
	}
}

signed_message!(SecretRequest, |request: &SecretRequest| {
	let expiration = U256::from(request.expiration).to_bytes();
	CmdId::SecretRequest.pack(&[
		&request.message_identifier.to_be_bytes(),
		&request.payment_identifier.to_be_bytes(),
		request.secrethash.as_bytes(),
		&request.amount.to_bytes(),
		&expiration,
	])
});

/// Reveals the secret of a lock.
///
/// Revealing the secret does not unlock anything by itself, the payer still has to send an
/// Unlock.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecretReveal {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	pub secret: Secret,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendSecretReveal> for SecretReveal {
	fn from(event: SendSecretReveal) -> Self {
		Self {
			message_identifier: event.message_identifier,
			secret: event.secret,
			signature: Signature::default(),
		}
	}
}

signed_message!(SecretReveal, |reveal: &SecretReveal| {
	CmdId::RevealSecret.pack(&[&reveal.message_identifier.to_be_bytes(), &reveal.secret.0])
});

/// Removes an expired lock from the sender's balance proof.
///
/// The locked amount must drop by exactly the amount of the expired lock, and the locksroot must
/// no longer commit to it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LockExpired {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	#[serde(flatten)]
	pub envelope: EnvelopeData,
	pub recipient: Address,
	pub secrethash: SecretHash,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendLockExpired> for LockExpired {
	fn from(event: SendLockExpired) -> Self {
		Self {
			message_identifier: event.message_identifier,
			envelope: (&event.balance_proof).into(),
			recipient: event.recipient,
			secrethash: event.secrethash,
			signature: Signature::default(),
		}
	}
}

signed_message!(LockExpired, |message: &LockExpired| message.envelope.packed(message.message_hash()));

impl SignedEnvelopeMessage for LockExpired {
	fn message_hash(&self) -> MessageHash {
		CmdId::LockExpired.hash(&[
			&self.message_identifier.to_be_bytes(),
			self.recipient.as_bytes(),
			self.secrethash.as_bytes(),
		])
	}
}

/// Settles a lock off-chain once its secret is known.
///
/// The lock leaves the pending locks, the locked amount drops by its amount and the transferred
/// amount grows by the same value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Unlock {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	pub payment_identifier: PaymentIdentifier,
	#[serde(flatten)]
	pub envelope: EnvelopeData,
	pub secret: Secret,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendUnlock> for Unlock {
	fn from(event: SendUnlock) -> Self {
		Self {
			message_identifier: event.message_identifier,
			payment_identifier: event.payment_identifier,
			envelope: (&event.balance_proof).into(),
			secret: event.secret,
			signature: Signature::default(),
		}
	}
}

signed_message!(Unlock, |message: &Unlock| message.envelope.packed(message.message_hash()));

impl SignedEnvelopeMessage for Unlock {
	fn message_hash(&self) -> MessageHash {
		CmdId::Unlock.hash(&[
			&self.message_identifier.to_be_bytes(),
			&self.payment_identifier.to_be_bytes(),
			&self.secret.0,
		])
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Lock {
	#[serde(with = "hopline_primitives::decimal")]
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	pub secrethash: SecretHash,
}

/// Reserves tokens for a mediated transfer.
///
/// The new lock is part of the locksroot and the locked amount grows by exactly `lock.amount`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LockedTransfer {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	pub payment_identifier: PaymentIdentifier,
	#[serde(flatten)]
	pub envelope: EnvelopeData,
	pub token: TokenAddress,
	pub recipient: Address,
	pub lock: Lock,
	pub target: Address,
	pub initiator: Address,
	#[serde(with = "hopline_primitives::decimal")]
	pub payment_amount: TokenAmount,
	pub metadata: Metadata,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendLockedTransfer> for LockedTransfer {
	fn from(event: SendLockedTransfer) -> Self {
		let metadata = Metadata::from(event.transfer.route_states.as_slice());
		let transfer = event.transfer;
		Self {
			message_identifier: event.inner.message_identifier,
			payment_identifier: transfer.payment_identifier,
			envelope: (&transfer.balance_proof).into(),
			token: transfer.token,
			recipient: event.inner.recipient,
			lock: Lock {
				amount: transfer.lock.amount,
				expiration: transfer.lock.expiration,
				secrethash: transfer.lock.secrethash,
			},
			target: transfer.target,
			initiator: transfer.initiator,
			payment_amount: transfer.payment_amount,
			metadata,
			signature: Signature::default(),
		}
	}
}

signed_message!(LockedTransfer, |transfer: &LockedTransfer| {
	transfer.envelope.packed(transfer.message_hash())
});

impl SignedEnvelopeMessage for LockedTransfer {
	fn message_hash(&self) -> MessageHash {
		let lock_expiration = U256::from(self.lock.expiration).to_bytes();
		let amounts = encode(&[Token::Uint(self.lock.amount), Token::Uint(self.payment_amount)]);
		CmdId::LockedTransfer.hash(&[
			&self.message_identifier.to_be_bytes(),
			&self.payment_identifier.to_be_bytes(),
			&lock_expiration,
			self.token.as_bytes(),
			self.recipient.as_bytes(),
			self.target.as_bytes(),
			self.initiator.as_bytes(),
			self.lock.secrethash.as_bytes(),
			&amounts,
			self.metadata.hash().as_bytes(),
		])
	}
}
