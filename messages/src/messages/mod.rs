use hopline_primitives::{
	signing::recover,
	traits::ToBytes,
	types::{
		Address,
		MessageHash,
		MessageIdentifier,
		Signature,
	},
};
use hopline_state_machine::types::SendMessageEvent;
use serde::{
	Deserialize,
	Serialize,
};
use web3::signing::{
	keccak256,
	Key,
};

use crate::{
	errors::MessageError,
	keys::PrivateKey,
};

mod metadata;
mod monitoring_service;
mod pathfinding;
mod synchronization;
mod transfer;
mod withdraw;

pub use metadata::*;
pub use monitoring_service::*;
pub use pathfinding::*;
pub use synchronization::*;
pub use transfer::*;
pub use withdraw::*;

/// Leading byte of the signed payload of messages that are not balance proofs.
#[derive(Copy, Clone)]
pub(crate) enum CmdId {
	Processed = 0,
	SecretRequest = 3,
	Unlock = 4,
	LockedTransfer = 7,
	RevealSecret = 11,
	Delivered = 12,
	LockExpired = 13,
	WithdrawExpired = 17,
}

impl CmdId {
	/// `fields` behind the command id padded to four bytes.
	pub(crate) fn pack(self, fields: &[&[u8]]) -> Vec<u8> {
		let mut packed = vec![self as u8, 0, 0, 0];
		packed.extend(fields.concat());
		packed
	}

	/// Keccak over the command id followed by `fields`, without padding.
	pub(crate) fn hash(self, fields: &[&[u8]]) -> MessageHash {
		let mut packed = vec![self as u8];
		packed.extend(fields.concat());
		MessageHash::from_slice(&keccak256(&packed))
	}
}

/// Implements [`SignedMessage`] for messages keeping their signature in `signature`.
macro_rules! signed_message {
	($message:ty, $bytes_to_sign:expr) => {
		impl $crate::messages::SignedMessage for $message {
			fn bytes_to_sign(&self) -> Vec<u8> {
				($bytes_to_sign)(self)
			}

			fn signature(&self) -> &hopline_primitives::types::Signature {
				&self.signature
			}

			fn set_signature(&mut self, signature: hopline_primitives::types::Signature) {
				self.signature = signature;
			}
		}
	};
}
pub(crate) use signed_message;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageInner {
	LockedTransfer(LockedTransfer),
	LockExpired(LockExpired),
	SecretRequest(SecretRequest),
	#[serde(rename = "RevealSecret")]
	SecretReveal(SecretReveal),
	Unlock(Unlock),
	WithdrawRequest(WithdrawRequest),
	WithdrawConfirmation(WithdrawConfirmation),
	WithdrawExpired(WithdrawExpired),
	Processed(Processed),
	Delivered(Delivered),
}

impl MessageInner {
	pub fn type_name(&self) -> &'static str {
		match self {
			MessageInner::LockedTransfer(_) => "LockedTransfer",
			MessageInner::LockExpired(_) => "LockExpired",
			MessageInner::SecretRequest(_) => "SecretRequest",
			MessageInner::SecretReveal(_) => "RevealSecret",
			MessageInner::Unlock(_) => "Unlock",
			MessageInner::WithdrawRequest(_) => "WithdrawRequest",
			MessageInner::WithdrawConfirmation(_) => "WithdrawConfirmation",
			MessageInner::WithdrawExpired(_) => "WithdrawExpired",
			MessageInner::Processed(_) => "Processed",
			MessageInner::Delivered(_) => "Delivered",
		}
	}

	fn signed_message_mut(&mut self) -> &mut dyn SignedMessage {
		match self {
			MessageInner::LockedTransfer(message) => message,
			MessageInner::LockExpired(message) => message,
			MessageInner::SecretRequest(message) => message,
			MessageInner::SecretReveal(message) => message,
			MessageInner::Unlock(message) => message,
			MessageInner::WithdrawRequest(message) => message,
			MessageInner::WithdrawConfirmation(message) => message,
			MessageInner::WithdrawExpired(message) => message,
			MessageInner::Processed(message) => message,
			MessageInner::Delivered(message) => message,
		}
	}

	pub(crate) fn signed_message(&self) -> &dyn SignedMessage {
		match self {
			MessageInner::LockedTransfer(message) => message,
			MessageInner::LockExpired(message) => message,
			MessageInner::SecretRequest(message) => message,
			MessageInner::SecretReveal(message) => message,
			MessageInner::Unlock(message) => message,
			MessageInner::WithdrawRequest(message) => message,
			MessageInner::WithdrawConfirmation(message) => message,
			MessageInner::WithdrawExpired(message) => message,
			MessageInner::Processed(message) => message,
			MessageInner::Delivered(message) => message,
		}
	}

	pub fn sign(&mut self, key: &PrivateKey) -> Result<(), MessageError> {
		self.signed_message_mut().sign(key)
	}

	pub fn sender(&self) -> Result<Address, MessageError> {
		self.signed_message().sender()
	}
}

/// A message addressed to one peer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
	pub message_identifier: MessageIdentifier,
	pub recipient: Address,
	pub inner: MessageInner,
}

impl OutgoingMessage {
	pub fn type_name(&self) -> &'static str {
		self.inner.type_name()
	}

	pub fn sign(&mut self, key: &PrivateKey) -> Result<(), MessageError> {
		self.inner.sign(key)
	}
}

/// Project a send effect onto the unsigned message it stands for.
pub fn to_message(event: SendMessageEvent) -> OutgoingMessage {
	let message_identifier = event.message_identifier();
	let recipient = event.inner().recipient;
	let inner = match event {
		SendMessageEvent::SendLockedTransfer(event) => MessageInner::LockedTransfer(event.into()),
		SendMessageEvent::SendLockExpired(event) => MessageInner::LockExpired(event.into()),
		SendMessageEvent::SendSecretRequest(event) => MessageInner::SecretRequest(event.into()),
		SendMessageEvent::SendSecretReveal(event) => MessageInner::SecretReveal(event.into()),
		SendMessageEvent::SendUnlock(event) => MessageInner::Unlock(event.into()),
		SendMessageEvent::SendWithdrawRequest(event) => MessageInner::WithdrawRequest(event.into()),
		SendMessageEvent::SendWithdrawConfirmation(event) =>
			MessageInner::WithdrawConfirmation(event.into()),
		SendMessageEvent::SendWithdrawExpired(event) => MessageInner::WithdrawExpired(event.into()),
		SendMessageEvent::SendProcessed(event) => MessageInner::Processed(event.into()),
	};
	OutgoingMessage { message_identifier, recipient, inner }
}

/// Which service a broadcast is meant for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DeviceId {
	#[serde(rename = "PATH_FINDING")]
	PFS,
	#[serde(rename = "MONITORING")]
	MS,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceMessageInner {
	PFSCapacityUpdate(PFSCapacityUpdate),
	PFSFeeUpdate(PFSFeeUpdate),
	#[serde(rename = "RequestMonitoring")]
	MSUpdate(RequestMonitoring),
}

/// A message broadcast to the path finding or monitoring services.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
	pub device: DeviceId,
	#[serde(flatten)]
	pub inner: ServiceMessageInner,
}

impl ServiceMessage {
	pub fn type_name(&self) -> &'static str {
		match self.inner {
			ServiceMessageInner::PFSCapacityUpdate(_) => "PFSCapacityUpdate",
			ServiceMessageInner::PFSFeeUpdate(_) => "PFSFeeUpdate",
			ServiceMessageInner::MSUpdate(_) => "RequestMonitoring",
		}
	}

	pub fn sign(&mut self, key: &PrivateKey) -> Result<(), MessageError> {
		match &mut self.inner {
			ServiceMessageInner::PFSCapacityUpdate(message) => message.sign(key),
			ServiceMessageInner::PFSFeeUpdate(message) => message.sign(key),
			ServiceMessageInner::MSUpdate(message) => message.sign(key),
		}
	}
}

impl From<PFSCapacityUpdate> for ServiceMessage {
	fn from(message: PFSCapacityUpdate) -> Self {
		Self { device: DeviceId::PFS, inner: ServiceMessageInner::PFSCapacityUpdate(message) }
	}
}

impl From<PFSFeeUpdate> for ServiceMessage {
	fn from(message: PFSFeeUpdate) -> Self {
		Self { device: DeviceId::PFS, inner: ServiceMessageInner::PFSFeeUpdate(message) }
	}
}

impl From<RequestMonitoring> for ServiceMessage {
	fn from(message: RequestMonitoring) -> Self {
		Self { device: DeviceId::MS, inner: ServiceMessageInner::MSUpdate(message) }
	}
}

pub trait SignedMessage {
	fn bytes_to_sign(&self) -> Vec<u8>;
	fn signature(&self) -> &Signature;
	fn set_signature(&mut self, signature: Signature);

	fn sign(&mut self, key: &PrivateKey) -> Result<(), MessageError> {
		let signature =
			key.sign_message(&self.bytes_to_sign()).map_err(MessageError::Signing)?;
		self.set_signature(Signature::from(signature.to_bytes()));
		Ok(())
	}

	/// The address that signed this message.
	fn sender(&self) -> Result<Address, MessageError> {
		recover(&self.bytes_to_sign(), &self.signature().0).map_err(MessageError::Recovery)
	}
}

/// Messages carrying a balance proof sign over a hash of the rest of the message.
pub trait SignedEnvelopeMessage: SignedMessage {
	fn message_hash(&self) -> MessageHash;
}
