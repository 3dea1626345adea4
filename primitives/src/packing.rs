use web3::{
	ethabi::{
		encode,
		Token,
	},
	types::U256,
};

use crate::types::{
	Address,
	BalanceHash,
	BlockExpiration,
	Bytes,
	CanonicalIdentifier,
	ChainID,
	MessageHash,
	MessageTypeId,
	Nonce,
	Signature,
	TokenAmount,
};

/// Builds the byte string a signature commits to.
///
/// Addresses and hashes are appended as-is unless `word` is used, integers always take a
/// full 32 byte word.
#[derive(Default)]
struct Packer(Vec<u8>);

impl Packer {
	fn raw(mut self, bytes: &[u8]) -> Self {
		self.0.extend_from_slice(bytes);
		self
	}

	fn word(self, token: Token) -> Self {
		let encoded = encode(&[token]);
		self.raw(&encoded)
	}

	fn uint(self, value: impl Into<U256>) -> Self {
		self.word(Token::Uint(value.into()))
	}

	fn kind(self, message_type: MessageTypeId) -> Self {
		self.uint(message_type as u8)
	}

	fn finish(self) -> Bytes {
		Bytes(self.0)
	}
}

pub fn pack_balance_proof(
	nonce: Nonce,
	balance_hash: BalanceHash,
	additional_hash: MessageHash,
	canonical_identifier: &CanonicalIdentifier,
	msg_type: MessageTypeId,
) -> Bytes {
	Packer::default()
		.raw(canonical_identifier.token_network_address.as_bytes())
		.uint(canonical_identifier.chain_identifier)
		.kind(msg_type)
		.uint(canonical_identifier.channel_identifier)
		.raw(balance_hash.as_bytes())
		.uint(nonce)
		.raw(additional_hash.as_bytes())
		.finish()
}

/// The balance proof followed by the partner's signature over it, as countersigned when the
/// proof is submitted on-chain by someone else.
pub fn pack_balance_proof_message(
	nonce: Nonce,
	balance_hash: BalanceHash,
	additional_hash: MessageHash,
	canonical_identifier: &CanonicalIdentifier,
	msg_type: MessageTypeId,
	partner_signature: &Signature,
) -> Bytes {
	let packed =
		pack_balance_proof(nonce, balance_hash, additional_hash, canonical_identifier, msg_type);
	Packer(packed.0).raw(&partner_signature.0).finish()
}

pub fn pack_withdraw(
	canonical_identifier: &CanonicalIdentifier,
	participant: Address,
	total_withdraw: TokenAmount,
	expiration_block: BlockExpiration,
) -> Bytes {
	Packer::default()
		.word(Token::Address(canonical_identifier.token_network_address))
		.uint(canonical_identifier.chain_identifier)
		.kind(MessageTypeId::Withdraw)
		.uint(canonical_identifier.channel_identifier)
		.word(Token::Address(participant))
		.uint(total_withdraw)
		.uint(expiration_block)
		.finish()
}

/// What a monitoring service is paid for submitting `non_closing_signature` on our behalf.
pub fn pack_reward_proof(
	monitoring_service_contract_address: Address,
	chain_id: ChainID,
	token_network_address: Address,
	non_closing_participant: Address,
	non_closing_signature: &Signature,
	reward_amount: TokenAmount,
) -> Bytes {
	Packer::default()
		.raw(monitoring_service_contract_address.as_bytes())
		.uint(chain_id)
		.kind(MessageTypeId::MSReward)
		.raw(token_network_address.as_bytes())
		.raw(non_closing_participant.as_bytes())
		.raw(&non_closing_signature.0)
		.uint(reward_amount)
		.finish()
}
