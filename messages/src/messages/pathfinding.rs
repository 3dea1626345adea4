use chrono::{
	NaiveDateTime,
	Utc,
};
use hopline_primitives::{
	deserializers::signature_from_str,
	traits::ToBytes,
	types::{
		Address,
		CanonicalIdentifier,
		Nonce,
		RevealTimeout,
		Signature,
		TokenAmount,
		U256,
	},
};
use hopline_state_machine::{
	types::{
		NettingChannelState,
		FeeScheduleState,
	},
	views,
};
use serde::{
	Deserialize,
	Serialize,
};

use super::signed_message;

/// Chain id, token network and channel id, the way both service updates start.
fn packed_channel(canonical_identifier: &CanonicalIdentifier) -> Vec<u8> {
	[
		U256::from(canonical_identifier.chain_identifier).to_bytes(),
		canonical_identifier.token_network_address.as_bytes().to_vec(),
		canonical_identifier.channel_identifier.to_bytes(),
	]
	.concat()
}

/// Tells the path finding service how much each side of a channel can currently send.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PFSCapacityUpdate {
	pub canonical_identifier: CanonicalIdentifier,
	pub updating_participant: Address,
	pub other_participant: Address,
	#[serde(with = "hopline_primitives::decimal")]
	pub updating_nonce: Nonce,
	#[serde(with = "hopline_primitives::decimal")]
	pub other_nonce: Nonce,
	#[serde(with = "hopline_primitives::decimal")]
	pub updating_capacity: TokenAmount,
	#[serde(with = "hopline_primitives::decimal")]
	pub other_capacity: TokenAmount,
	pub reveal_timeout: RevealTimeout,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<&NettingChannelState> for PFSCapacityUpdate {
	fn from(channel: &NettingChannelState) -> Self {
		Self {
			canonical_identifier: channel.canonical_identifier.clone(),
			updating_participant: channel.our_state.address,
			other_participant: channel.partner_state.address,
			updating_nonce: channel.our_state.nonce,
			other_nonce: channel.partner_state.nonce,
			updating_capacity: views::channel_distributable(
				&channel.our_state,
				&channel.partner_state,
			),
			other_capacity: views::channel_distributable(
				&channel.partner_state,
				&channel.our_state,
			),
			reveal_timeout: channel.reveal_timeout,
			signature: Signature::default(),
		}
	}
}

signed_message!(PFSCapacityUpdate, |update: &PFSCapacityUpdate| {
	[
		packed_channel(&update.canonical_identifier),
		update.updating_participant.as_bytes().to_vec(),
		update.other_participant.as_bytes().to_vec(),
		update.updating_nonce.to_bytes(),
		update.other_nonce.to_bytes(),
		update.updating_capacity.to_bytes(),
		update.other_capacity.to_bytes(),
		U256::from(update.reveal_timeout).to_bytes(),
	]
	.concat()
});

/// Publishes the mediation fees charged on a channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PFSFeeUpdate {
	pub canonical_identifier: CanonicalIdentifier,
	pub updating_participant: Address,
	pub fee_schedule: FeeScheduleState,
	pub timestamp: NaiveDateTime,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl PFSFeeUpdate {
	pub fn new(channel: &NettingChannelState, timestamp: NaiveDateTime) -> Self {
		Self {
			canonical_identifier: channel.canonical_identifier.clone(),
			updating_participant: channel.our_state.address,
			fee_schedule: channel.fee_schedule.clone(),
			timestamp,
			signature: Signature::default(),
		}
	}
}

impl From<&NettingChannelState> for PFSFeeUpdate {
	fn from(channel: &NettingChannelState) -> Self {
		Self::new(channel, Utc::now().naive_utc())
	}
}

signed_message!(PFSFeeUpdate, |update: &PFSFeeUpdate| {
	let timestamp = update.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
	[
		packed_channel(&update.canonical_identifier),
		update.updating_participant.as_bytes().to_vec(),
		update.fee_schedule.flat.to_bytes(),
		update.fee_schedule.proportional.to_bytes(),
		timestamp.into_bytes(),
	]
	.concat()
});
