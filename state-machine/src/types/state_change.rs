#![warn(clippy::missing_docs_in_private_items)]

use derive_more::Deref;
use hopline_macros::{
	IntoStateChange,
	TypeName,
};
use hopline_primitives::types::{
	Address,
	BlockExpiration,
	BlockHash,
	BlockNumber,
	CanonicalIdentifier,
	ChainID,
	LockedAmount,
	Locksroot,
	MessageIdentifier,
	Nonce,
	PaymentIdentifier,
	Secret,
	SecretHash,
	SecretRegistryAddress,
	Signature,
	TokenAmount,
	TokenNetworkRegistryAddress,
	TransactionHash,
};
use serde::{
	Deserialize,
	Serialize,
};

use crate::types::{
	state::{
		BalanceProofState,
		HopState,
		LockedTransferState,
		RouteState,
		TransactionChannelDeposit,
		TransferDescription,
	},
	NettingChannelState,
	TokenNetworkRegistry,
	TokenNetworkState,
};

/// Every input the state machine reacts to: user actions, confirmed chain events and
/// decoded peer messages.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, TypeName)]
#[serde(tag = "type")]
#[allow(clippy::large_enum_variant)]
pub enum StateChange {
	Block(Block),
	ActionInitChain(ActionInitChain),
	ActionInitInitiator(ActionInitInitiator),
	ActionInitMediator(ActionInitMediator),
	ActionInitTarget(ActionInitTarget),
	ActionChannelClose(ActionChannelClose),
	ActionChannelWithdraw(ActionChannelWithdraw),
	ActionTransferReroute(ActionTransferReroute),
	ActionCancelPayment(ActionCancelPayment),
	ContractReceiveTokenNetworkRegistry(ContractReceiveTokenNetworkRegistry),
	ContractReceiveTokenNetworkCreated(ContractReceiveTokenNetworkCreated),
	ContractReceiveChannelOpened(ContractReceiveChannelOpened),
	ContractReceiveChannelClosed(ContractReceiveChannelClosed),
	ContractReceiveChannelSettled(ContractReceiveChannelSettled),
	ContractReceiveChannelDeposit(ContractReceiveChannelDeposit),
	ContractReceiveChannelWithdraw(ContractReceiveChannelWithdraw),
	ContractReceiveChannelBatchUnlock(ContractReceiveChannelBatchUnlock),
	ContractReceiveSecretReveal(ContractReceiveSecretReveal),
	ContractReceiveUpdateTransfer(ContractReceiveUpdateTransfer),
	ReceiveDelivered(ReceiveDelivered),
	ReceiveProcessed(ReceiveProcessed),
	ReceiveSecretReveal(ReceiveSecretReveal),
	ReceiveSecretRequest(ReceiveSecretRequest),
	ReceiveLockExpired(ReceiveLockExpired),
	ReceiveUnlock(ReceiveUnlock),
	ReceiveWithdrawRequest(ReceiveWithdrawRequest),
	ReceiveWithdrawConfirmation(ReceiveWithdrawConfirmation),
	ReceiveWithdrawExpired(ReceiveWithdrawExpired),
}

/// A new block was mined.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct Block {
	pub block_number: BlockNumber,
	pub block_hash: BlockHash,
}

/// The transaction and block a contract event was observed in.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ChainReceipt {
	pub transaction_hash: Option<TransactionHash>,
	pub block_number: BlockNumber,
	pub block_hash: BlockHash,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionInitChain {
	pub chain_id: ChainID,
	pub block_number: BlockNumber,
	pub block_hash: BlockHash,
	pub our_address: Address,
}

/// Raise our total withdraw in a channel.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionChannelWithdraw {
	pub canonical_identifier: CanonicalIdentifier,
	pub total_withdraw: TokenAmount,
}

/// Close a channel on-chain.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionChannelClose {
	pub canonical_identifier: CanonicalIdentifier,
}

/// A registry contract and its token networks became known.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveTokenNetworkRegistry {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub token_network_registry: TokenNetworkRegistry,
}

/// A token network was deployed through a known registry.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveTokenNetworkCreated {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub token_network: TokenNetworkState,
}

/// One of our channels was opened on-chain.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelOpened {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub channel: NettingChannelState,
}

/// One of our channels was closed, by us or by the partner.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelClosed {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub transaction_from: Address,
	pub canonical_identifier: CanonicalIdentifier,
}

/// One of our channels was settled.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelSettled {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub canonical_identifier: CanonicalIdentifier,
	pub our_onchain_locksroot: Locksroot,
	pub partner_onchain_locksroot: Locksroot,
	pub our_transferred_amount: TokenAmount,
	pub partner_transferred_amount: TokenAmount,
}

/// A participant's deposit in one of our channels was confirmed.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelDeposit {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub canonical_identifier: CanonicalIdentifier,
	pub deposit_transaction: TransactionChannelDeposit,
}

/// A participant's withdraw in one of our channels was confirmed.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelWithdraw {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub canonical_identifier: CanonicalIdentifier,
	pub participant: Address,
	pub total_withdraw: TokenAmount,
}

/// The pending locks of `sender` were unlocked on-chain after settlement.
///
/// `receiver` got `unlocked_amount`, `returned_tokens` went back to `sender`.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveChannelBatchUnlock {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub canonical_identifier: CanonicalIdentifier,
	pub receiver: Address,
	pub sender: Address,
	pub locksroot: Locksroot,
	pub unlocked_amount: LockedAmount,
	pub returned_tokens: TokenAmount,
}

/// A secret became public through the secret registry.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveSecretReveal {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub secret_registry_address: SecretRegistryAddress,
	pub secrethash: SecretHash,
	pub secret: Secret,
}

/// The non-closing side submitted a newer balance proof after close.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ContractReceiveUpdateTransfer {
	#[deref]
	#[serde(flatten)]
	pub receipt: ChainReceipt,
	pub canonical_identifier: CanonicalIdentifier,
	pub nonce: Nonce,
}

/// Start a payment as initiator.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionInitInitiator {
	pub transfer: TransferDescription,
	pub routes: Vec<RouteState>,
}

/// A locked transfer arrived that has to be forwarded.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionInitMediator {
	pub sender: Address,
	pub balance_proof: BalanceProofState,
	pub from_hop: HopState,
	pub candidate_route_states: Vec<RouteState>,
	pub from_transfer: LockedTransferState,
}

/// A locked transfer arrived that ends with us.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionInitTarget {
	pub sender: Address,
	pub balance_proof: BalanceProofState,
	pub from_hop: HopState,
	pub transfer: LockedTransferState,
}

/// Retry a failed payment with a fresh secret.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionTransferReroute {
	pub transfer: LockedTransferState,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

/// The user requests the payment to be cancelled.
///
/// Only transfers whose secret was not revealed yet are cancelled.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ActionCancelPayment {
	pub payment_identifier: PaymentIdentifier,
}

/// The target asks for the secret.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveSecretRequest {
	pub sender: Address,
	pub payment_identifier: PaymentIdentifier,
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	pub secrethash: SecretHash,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveSecretReveal {
	pub sender: Address,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

/// The partner removed an expired lock.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveLockExpired {
	pub sender: Address,
	pub secrethash: SecretHash,
	pub message_identifier: MessageIdentifier,
	pub balance_proof: BalanceProofState,
}

/// The partner settled a lock off-chain.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveUnlock {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
	pub secret: Secret,
	pub secrethash: SecretHash,
	pub balance_proof: BalanceProofState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveWithdrawRequest {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
	pub canonical_identifier: CanonicalIdentifier,
	pub total_withdraw: TokenAmount,
	pub nonce: Nonce,
	pub expiration: BlockExpiration,
	pub signature: Signature,
	pub participant: Address,
}

/// The partner countersigned our withdraw.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveWithdrawConfirmation {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
	pub canonical_identifier: CanonicalIdentifier,
	pub total_withdraw: TokenAmount,
	pub nonce: Nonce,
	pub expiration: BlockExpiration,
	pub signature: Signature,
	pub participant: Address,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveWithdrawExpired {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
	pub canonical_identifier: CanonicalIdentifier,
	pub total_withdraw: TokenAmount,
	pub nonce: Nonce,
	pub expiration: BlockExpiration,
	pub participant: Address,
}

/// Acknowledges messages that are not part of a channel.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveDelivered {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
}

/// Acknowledges a message that changed the channel.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoStateChange)]
pub struct ReceiveProcessed {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
}
