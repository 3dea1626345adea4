use hopline_primitives::{
	deserializers::{
		signature_from_str,
		u64_from_str,
	},
	types::{
		MessageIdentifier,
		Signature,
	},
};
use hopline_state_machine::types::SendProcessed;
use serde::{
	Deserialize,
	Serialize,
};

use super::{
	signed_message,
	CmdId,
};

/// Acknowledges that a message was applied to the receiver's state.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Processed {
	#[serde(deserialize_with = "u64_from_str")]
	pub message_identifier: MessageIdentifier,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl From<SendProcessed> for Processed {
	fn from(event: SendProcessed) -> Self {
		Self { message_identifier: event.message_identifier, signature: Signature::default() }
	}
}

signed_message!(Processed, |processed: &Processed| {
	CmdId::Processed.pack(&[&processed.message_identifier.to_be_bytes()])
});

/// Acknowledges that a message reached the receiver, before it was processed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Delivered {
	#[serde(deserialize_with = "u64_from_str")]
	pub delivered_message_identifier: MessageIdentifier,
	#[serde(deserialize_with = "signature_from_str")]
	pub signature: Signature,
}

impl Delivered {
	pub fn new(delivered_message_identifier: MessageIdentifier) -> Self {
		Self { delivered_message_identifier, signature: Signature::default() }
	}
}

signed_message!(Delivered, |delivered: &Delivered| {
	CmdId::Delivered.pack(&[&delivered.delivered_message_identifier.to_be_bytes()])
});
