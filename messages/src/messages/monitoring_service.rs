use hopline_primitives::{
	deserializers::signature_from_str,
	packing::{
		pack_balance_proof_message,
		pack_reward_proof,
	},
	traits::ToBytes,
	types::{
		Address,
		BalanceHash,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		MessageHash,
		MessageTypeId,
		Nonce,
		Signature,
		TokenAmount,
		TokenNetworkAddress,
	},
};
use hopline_state_machine::types::BalanceProofState;
use serde::{
	Deserialize,
	Serialize,
};
use web3::signing::Key;

use super::SignedMessage;
use crate::{
	errors::MessageError,
	keys::PrivateKey,
};

/// A partner balance proof we countersign, so that whoever holds it can submit it on-chain
/// in our name.
///
/// Only the balance hash travels, the amounts behind it stay private.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignedBlindedBalanceProof {
	pub chain_id: ChainID,
	pub token_network_address: TokenNetworkAddress,
	#[serde(with = "hopline_primitives::decimal")]
	pub channel_identifier: ChannelIdentifier,
	#[serde(with = "hopline_primitives::decimal")]
	pub nonce: Nonce,
	pub additional_hash: MessageHash,
	pub balance_hash: BalanceHash,
	/// The partner's signature.
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
	/// Ours, over the proof and the partner's signature.
	#[serde(deserialize_with = "signature_from_str")]
	pub non_closing_signature: Signature,
}

impl SignedBlindedBalanceProof {
	fn canonical_identifier(&self) -> CanonicalIdentifier {
		CanonicalIdentifier {
			chain_identifier: self.chain_id,
			token_network_address: self.token_network_address,
			channel_identifier: self.channel_identifier,
		}
	}
}

impl TryFrom<BalanceProofState> for SignedBlindedBalanceProof {
	type Error = MessageError;

	fn try_from(proof: BalanceProofState) -> Result<Self, Self::Error> {
		let BalanceProofState {
			nonce,
			balance_hash,
			message_hash,
			signature,
			canonical_identifier: channel,
			..
		} = proof;

		match signature {
			Some(signature) => Ok(Self {
				chain_id: channel.chain_identifier,
				token_network_address: channel.token_network_address,
				channel_identifier: channel.channel_identifier,
				nonce,
				additional_hash: message_hash.unwrap_or_default(),
				balance_hash,
				signature,
				non_closing_signature: Signature::default(),
			}),
			None => Err(MessageError::Malformed(
				"Only a balance proof signed by the partner can be monitored".to_owned(),
			)),
		}
	}
}

impl SignedMessage for SignedBlindedBalanceProof {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let packed = pack_balance_proof_message(
			self.nonce,
			self.balance_hash,
			self.additional_hash,
			&self.canonical_identifier(),
			MessageTypeId::BalanceProofUpdate,
			&self.signature,
		);
		packed.0
	}

	fn signature(&self) -> &Signature {
		&self.non_closing_signature
	}

	fn set_signature(&mut self, signature: Signature) {
		self.non_closing_signature = signature;
	}
}

/// Hands a countersigned balance proof to a monitoring service, together with the reward it
/// may claim for using it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequestMonitoring {
	pub balance_proof: SignedBlindedBalanceProof,
	#[serde(with = "hopline_primitives::decimal")]
	pub reward_amount: TokenAmount,
	pub monitoring_service_contract_address: Address,
	pub non_closing_participant: Address,
	#[serde(deserialize_with = "signature_from_str")]
	pub non_closing_signature: Signature,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl RequestMonitoring {
	/// Unsigned request for `balance_proof`; `sign` fills in both signatures.
	pub fn from_balance_proof(
		balance_proof: BalanceProofState,
		non_closing_participant: Address,
		reward_amount: TokenAmount,
		monitoring_service_contract_address: Address,
	) -> Result<Self, MessageError> {
		let balance_proof = SignedBlindedBalanceProof::try_from(balance_proof)?;
		Ok(Self {
			balance_proof,
			reward_amount,
			monitoring_service_contract_address,
			non_closing_participant,
			non_closing_signature: Signature::default(),
			signature: Signature::default(),
		})
	}
}

impl SignedMessage for RequestMonitoring {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let packed = pack_reward_proof(
			self.monitoring_service_contract_address,
			self.balance_proof.chain_id,
			self.balance_proof.token_network_address,
			self.non_closing_participant,
			&self.non_closing_signature,
			self.reward_amount,
		);
		packed.0
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}

	fn set_signature(&mut self, signature: Signature) {
		self.signature = signature;
	}

	fn sign(&mut self, key: &PrivateKey) -> Result<(), MessageError> {
		// The reward proof commits to our countersignature, so that one comes first.
		self.balance_proof.sign(key)?;
		self.non_closing_signature = self.balance_proof.non_closing_signature.clone();

		let bytes = self.bytes_to_sign();
		let signature = key.sign_message(&bytes).map_err(MessageError::Signing)?;
		self.set_signature(Signature::from(signature.to_bytes()));
		Ok(())
	}
}
