mod builder;
mod generator;
mod keyring;
mod network;

pub use builder::*;
use ethsign::SecretKey;
pub use generator::*;
use hopline_primitives::{
	hashing::hash_balance_data,
	packing::{
		pack_balance_proof,
		pack_withdraw,
	},
	signing::hash_data,
	traits::ToBytes,
};
pub use keyring::*;
pub use network::*;
use web3::signing::Signature;

use crate::types::{
	Address,
	BalanceProofState,
	BlockExpiration,
	Bytes,
	CanonicalIdentifier,
	LockedTransferState,
	Locksroot,
	MessageHash,
	MessageTypeId,
	Nonce,
	PaymentIdentifier,
	RouteState,
	Secret,
	SecretHash,
	TokenAmount,
	TransferDescription,
	H256,
};

/// Recoverable signature over the prefixed hash of `message`.
pub fn sign_message(secret: &SecretKey, message: &[u8]) -> Bytes {
	let signed = secret.sign(&hash_data(message)).expect("Data should be signed");
	let v = u64::from(signed.v) + 27;
	Bytes(Signature { r: H256::from(signed.r), s: H256::from(signed.s), v }.to_bytes())
}

pub fn make_balance_proof(
	secret_key: &SecretKey,
	canonical_identifier: CanonicalIdentifier,
	locked_amount: TokenAmount,
	locksroot: Locksroot,
	transferred_amount: TokenAmount,
	sender: Address,
	nonce: Nonce,
) -> BalanceProofState {
	let unsigned = BalanceProofState {
		nonce,
		transferred_amount,
		locked_amount,
		locksroot,
		canonical_identifier,
		balance_hash: Default::default(),
		message_hash: None,
		signature: None,
		sender: Some(sender),
	};
	sign_balance_proof(&unsigned, secret_key)
}

/// Sign a balance proof produced by the sender's own state machine, as its partner would receive
/// it.
pub fn sign_balance_proof(
	balance_proof: &BalanceProofState,
	secret_key: &SecretKey,
) -> BalanceProofState {
	let balance_hash = hash_balance_data(
		balance_proof.transferred_amount,
		balance_proof.locked_amount,
		balance_proof.locksroot,
	)
	.expect("Should generate balance hash");
	let packed = pack_balance_proof(
		balance_proof.nonce,
		balance_hash,
		MessageHash::zero(),
		&balance_proof.canonical_identifier,
		MessageTypeId::BalanceProof,
	);

	BalanceProofState {
		balance_hash,
		message_hash: Some(MessageHash::zero()),
		signature: Some(sign_message(secret_key, &packed.0)),
		..balance_proof.clone()
	}
}

/// The transfer as its receiver sees it.
pub fn received_transfer(
	transfer: &LockedTransferState,
	secret_key: &SecretKey,
) -> LockedTransferState {
	LockedTransferState {
		balance_proof: sign_balance_proof(&transfer.balance_proof, secret_key),
		..transfer.clone()
	}
}

pub fn sign_withdraw(
	secret_key: &SecretKey,
	canonical_identifier: &CanonicalIdentifier,
	participant: Address,
	total_withdraw: TokenAmount,
	expiration: BlockExpiration,
) -> Bytes {
	let packed = pack_withdraw(canonical_identifier, participant, total_withdraw, expiration);
	sign_message(secret_key, &packed.0)
}

pub fn route(hops: &[Keyring], estimated_fee: u64) -> RouteState {
	RouteState {
		route: hops.iter().map(|hop| hop.address()).collect(),
		estimated_fee: TokenAmount::from(estimated_fee),
	}
}

pub fn payment_description(
	initiator: Keyring,
	target: Keyring,
	amount: u64,
	payment_identifier: u64,
	secret: Secret,
	secrethash: SecretHash,
) -> TransferDescription {
	TransferDescription {
		token_network_registry_address: token_network_registry_address(),
		payment_identifier: PaymentIdentifier::from(payment_identifier),
		amount: TokenAmount::from(amount),
		token_network_address: token_network_address(),
		initiator: initiator.address(),
		target: target.address(),
		secret,
		secrethash,
		lock_timeout: None,
	}
}
