use derive_more::Deref;
use hopline_macros::{
	EventSubset,
	IntoContractSendEvent,
	IntoEvent,
	IntoSendMessageEvent,
	TypeName,
};
use serde::{
	Deserialize,
	Serialize,
};

use super::{
	BalanceProofState,
	LockedTransferState,
};
use crate::types::{
	Address,
	BlockExpiration,
	BlockHash,
	CanonicalIdentifier,
	MessageIdentifier,
	Nonce,
	PaymentIdentifier,
	QueueIdentifier,
	Secret,
	SecretHash,
	Signature,
	TokenAddress,
	TokenAmount,
	TokenNetworkAddress,
	TokenNetworkRegistryAddress,
};

/// An effect produced by a state transition, executed after the transition is logged.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, TypeName)]
#[serde(tag = "type")]
pub enum Event {
	ContractSendChannelClose(ContractSendChannelClose),
	ContractSendChannelWithdraw(ContractSendChannelWithdraw),
	ContractSendChannelSettle(ContractSendChannelSettle),
	ContractSendChannelUpdateTransfer(ContractSendChannelUpdateTransfer),
	ContractSendChannelBatchUnlock(ContractSendChannelBatchUnlock),
	ContractSendSecretReveal(ContractSendSecretReveal),
	SendLockedTransfer(SendLockedTransfer),
	SendLockExpired(SendLockExpired),
	SendSecretRequest(SendSecretRequest),
	SendSecretReveal(SendSecretReveal),
	SendUnlock(SendUnlock),
	SendWithdrawRequest(SendWithdrawRequest),
	SendWithdrawConfirmation(SendWithdrawConfirmation),
	SendWithdrawExpired(SendWithdrawExpired),
	SendProcessed(SendProcessed),
	PaymentReceivedSuccess(PaymentReceivedSuccess),
	PaymentSentSuccess(PaymentSentSuccess),
	UnlockSuccess(UnlockSuccess),
	UnlockClaimSuccess(UnlockClaimSuccess),
	ErrorPaymentSentFailed(ErrorPaymentSentFailed),
	ErrorRouteFailed(ErrorRouteFailed),
	ErrorUnlockFailed(ErrorUnlockFailed),
	ErrorUnlockClaimFailed(ErrorUnlockClaimFailed),
	ErrorInvalidSecretRequest(ErrorInvalidSecretRequest),
	ErrorInvalidActionWithdraw(ErrorInvalidActionWithdraw),
	ErrorTransferAborted(ErrorTransferAborted),
}

/// Every effect that results in a message to a peer.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, EventSubset)]
#[serde(tag = "type")]
pub enum SendMessageEvent {
	SendLockedTransfer(SendLockedTransfer),
	SendLockExpired(SendLockExpired),
	SendSecretRequest(SendSecretRequest),
	SendSecretReveal(SendSecretReveal),
	SendUnlock(SendUnlock),
	SendWithdrawRequest(SendWithdrawRequest),
	SendWithdrawConfirmation(SendWithdrawConfirmation),
	SendWithdrawExpired(SendWithdrawExpired),
	SendProcessed(SendProcessed),
}

impl SendMessageEvent {
	pub fn inner(&self) -> &SendMessageEventInner {
		match self {
			Self::SendLockedTransfer(message) => &message.inner,
			Self::SendLockExpired(message) => &message.inner,
			Self::SendSecretRequest(message) => &message.inner,
			Self::SendSecretReveal(message) => &message.inner,
			Self::SendUnlock(message) => &message.inner,
			Self::SendWithdrawRequest(message) => &message.inner,
			Self::SendWithdrawConfirmation(message) => &message.inner,
			Self::SendWithdrawExpired(message) => &message.inner,
			Self::SendProcessed(message) => &message.inner,
		}
	}

	pub fn queue_identifier(&self) -> QueueIdentifier {
		self.inner().queue_identifier()
	}

	pub fn message_identifier(&self) -> MessageIdentifier {
		self.inner().message_identifier
	}
}

/// Every effect that results in an on-chain transaction.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, EventSubset)]
#[serde(tag = "type")]
pub enum ContractSendEvent {
	ContractSendChannelClose(ContractSendChannelClose),
	ContractSendChannelWithdraw(ContractSendChannelWithdraw),
	ContractSendChannelSettle(ContractSendChannelSettle),
	ContractSendChannelUpdateTransfer(ContractSendChannelUpdateTransfer),
	ContractSendChannelBatchUnlock(ContractSendChannelBatchUnlock),
	ContractSendSecretReveal(ContractSendSecretReveal),
}

impl ContractSendEvent {
	/// The channel the transaction acts on, secret registrations act on none.
	pub fn canonical_identifier(&self) -> Option<&CanonicalIdentifier> {
		let channel = match self {
			Self::ContractSendChannelClose(close) => &close.canonical_identifier,
			Self::ContractSendChannelWithdraw(withdraw) => &withdraw.canonical_identifier,
			Self::ContractSendChannelSettle(settle) => &settle.canonical_identifier,
			Self::ContractSendChannelUpdateTransfer(update) =>
				&update.balance_proof.canonical_identifier,
			Self::ContractSendChannelBatchUnlock(unlock) => &unlock.canonical_identifier,
			Self::ContractSendSecretReveal(_) => return None,
		};
		Some(channel)
	}
}

/// Addressing shared by every message effect.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
#[cfg_attr(not(test), derive(PartialEq))]
pub struct SendMessageEventInner {
	pub recipient: Address,
	pub canonical_identifier: CanonicalIdentifier,
	pub message_identifier: MessageIdentifier,
}

impl SendMessageEventInner {
	pub fn queue_identifier(&self) -> QueueIdentifier {
		QueueIdentifier {
			recipient: self.recipient,
			canonical_identifier: self.canonical_identifier.clone(),
		}
	}
}

// Message identifiers are random, tests compare everything else.
#[cfg(test)]
impl PartialEq for SendMessageEventInner {
	fn eq(&self, other: &Self) -> bool {
		self.recipient == other.recipient &&
			self.canonical_identifier == other.canonical_identifier
	}
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendLockedTransfer {
	#[deref]
	pub inner: SendMessageEventInner,
	pub transfer: LockedTransferState,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendLockExpired {
	#[deref]
	pub inner: SendMessageEventInner,
	pub balance_proof: BalanceProofState,
	pub secrethash: SecretHash,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendSecretRequest {
	#[deref]
	pub inner: SendMessageEventInner,
	pub payment_identifier: PaymentIdentifier,
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	pub secrethash: SecretHash,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendSecretReveal {
	#[deref]
	pub inner: SendMessageEventInner,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendUnlock {
	#[deref]
	pub inner: SendMessageEventInner,
	pub payment_identifier: PaymentIdentifier,
	pub token_address: TokenAddress,
	pub balance_proof: BalanceProofState,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendWithdrawRequest {
	#[deref]
	pub inner: SendMessageEventInner,
	pub participant: Address,
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub nonce: Nonce,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendWithdrawConfirmation {
	#[deref]
	pub inner: SendMessageEventInner,
	pub participant: Address,
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub nonce: Nonce,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendWithdrawExpired {
	#[deref]
	pub inner: SendMessageEventInner,
	pub participant: Address,
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub nonce: Nonce,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoSendMessageEvent)]
pub struct SendProcessed {
	#[deref]
	pub inner: SendMessageEventInner,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ContractSendEventInner {
	pub triggered_by_blockhash: BlockHash,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendChannelClose {
	#[deref]
	pub inner: ContractSendEventInner,
	pub canonical_identifier: CanonicalIdentifier,
	pub balance_proof: Option<BalanceProofState>,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendChannelWithdraw {
	#[deref]
	pub inner: ContractSendEventInner,
	pub canonical_identifier: CanonicalIdentifier,
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub partner_signature: Signature,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendChannelSettle {
	#[deref]
	pub inner: ContractSendEventInner,
	pub canonical_identifier: CanonicalIdentifier,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendChannelUpdateTransfer {
	#[deref]
	pub inner: ContractSendEventInner,
	pub expiration: BlockExpiration,
	pub balance_proof: BalanceProofState,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendChannelBatchUnlock {
	#[deref]
	pub inner: ContractSendEventInner,
	pub canonical_identifier: CanonicalIdentifier,
	pub sender: Address,
}

#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoContractSendEvent)]
pub struct ContractSendSecretReveal {
	#[deref]
	pub inner: ContractSendEventInner,
	pub expiration: BlockExpiration,
	pub secret: Secret,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct PaymentReceivedSuccess {
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub token_network_address: TokenNetworkAddress,
	pub identifier: PaymentIdentifier,
	pub amount: TokenAmount,
	pub initiator: Address,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct PaymentSentSuccess {
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub token_network_address: TokenNetworkAddress,
	pub identifier: PaymentIdentifier,
	pub amount: TokenAmount,
	pub target: Address,
	pub secret: Secret,
	pub route: Vec<Address>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct UnlockSuccess {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct UnlockClaimSuccess {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorPaymentSentFailed {
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub token_network_address: TokenNetworkAddress,
	pub identifier: PaymentIdentifier,
	pub target: Address,
	pub reason: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorRouteFailed {
	pub secrethash: SecretHash,
	pub route: Vec<Address>,
	pub token_network_address: TokenNetworkAddress,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorUnlockFailed {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
	pub reason: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorUnlockClaimFailed {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
	pub reason: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidSecretRequest {
	pub payment_identifier: PaymentIdentifier,
	pub intended_amount: TokenAmount,
	pub actual_amount: TokenAmount,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidActionWithdraw {
	pub attemped_withdraw: TokenAmount,
	pub reason: String,
}

/// A transfer task was dropped because continuing it could lose funds.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorTransferAborted {
	pub secrethash: SecretHash,
	pub reason: String,
}
