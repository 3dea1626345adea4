use hopline_primitives::{
	deserializers::{
		signature_from_str,
		u64_from_str,
	},
	packing::pack_withdraw,
	traits::ToBytes,
	types::{
		Address,
		BlockExpiration,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		MessageIdentifier,
		MessageTypeId,
		Nonce,
		Signature,
		TokenAmount,
		TokenNetworkAddress,
		U256,
	},
};
use hopline_state_machine::types::{
	SendWithdrawConfirmation,
	SendWithdrawExpired,
	SendWithdrawRequest,
};
use serde::{
	Deserialize,
	Serialize,
};

use super::{
	signed_message,
	CmdId,
};

/// Fields common to every withdraw message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WithdrawData {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	pub chain_id: ChainID,
	pub token_network_address: TokenNetworkAddress,
	#[serde(with = "hopline_primitives::decimal")]
	pub channel_identifier: ChannelIdentifier,
	pub participant: Address,
	#[serde(with = "hopline_primitives::decimal")]
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	#[serde(with = "hopline_primitives::decimal")]
	pub nonce: Nonce,
}

impl WithdrawData {
	pub fn canonical_identifier(&self) -> CanonicalIdentifier {
		CanonicalIdentifier {
			chain_identifier: self.chain_id,
			token_network_address: self.token_network_address,
			channel_identifier: self.channel_identifier,
		}
	}

	fn packed(&self) -> Vec<u8> {
		pack_withdraw(
			&self.canonical_identifier(),
			self.participant,
			self.total_withdraw,
			self.expiration,
		)
		.0
	}
}

/// Declares a withdraw message and its conversion from the matching send event.
macro_rules! withdraw_message {
	($(#[$doc:meta])* $message:ident from $event:ident) => {
		$(#[$doc])*
		#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
		pub struct $message {
			#[serde(flatten)]
			pub data: WithdrawData,
			#[serde(deserialize_with = "signature_from_str")]
			pub signature: Signature,
		}

		impl From<$event> for $message {
			fn from(event: $event) -> Self {
				let data = WithdrawData {
					message_identifier: event.inner.message_identifier,
					chain_id: event.inner.canonical_identifier.chain_identifier,
					token_network_address: event.inner.canonical_identifier.token_network_address,
					channel_identifier: event.inner.canonical_identifier.channel_identifier,
					participant: event.participant,
					total_withdraw: event.total_withdraw,
					expiration: event.expiration,
					nonce: event.nonce,
				};
				Self { data, signature: Signature::default() }
			}
		}
	};
}

withdraw_message! {
	/// Asks the partner to co-sign a withdraw of `total_withdraw` for `participant`.
	WithdrawRequest from SendWithdrawRequest
}
signed_message!(WithdrawRequest, |request: &WithdrawRequest| request.data.packed());

withdraw_message! {
	/// The partner's signature over a requested withdraw.
	WithdrawConfirmation from SendWithdrawConfirmation
}
signed_message!(WithdrawConfirmation, |confirmation: &WithdrawConfirmation| {
	confirmation.data.packed()
});

withdraw_message! {
	/// Tells the partner a withdraw request expired unused.
	WithdrawExpired from SendWithdrawExpired
}
signed_message!(WithdrawExpired, |expired: &WithdrawExpired| {
	let data = &expired.data;
	CmdId::WithdrawExpired.pack(&[
		&data.nonce.to_bytes(),
		&data.message_identifier.to_be_bytes(),
		data.token_network_address.as_bytes(),
		&U256::from(data.chain_id).to_bytes(),
		&U256::from(MessageTypeId::Withdraw as u8).to_bytes(),
		&data.channel_identifier.to_bytes(),
		data.participant.as_bytes(),
		&data.total_withdraw.to_bytes(),
		&U256::from(data.expiration).to_bytes(),
	])
});
