use std::{
	cmp::max,
	collections::HashMap,
};

use derive_more::Display;
use hopline_primitives::{
	constants::LOCKSROOT_OF_NO_LOCKS,
	traits::ToBytes,
	types::{
		Address,
		BalanceHash,
		BlockExpiration,
		BlockHash,
		BlockNumber,
		BlockTimeout,
		Bytes,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		EncodedLock,
		FeeAmount,
		LockTimeout,
		LockedAmount,
		Locksroot,
		MessageHash,
		MessageIdentifier,
		Nonce,
		PaymentIdentifier,
		ProportionalFeeAmount,
		QueueIdentifier,
		RevealTimeout,
		Secret,
		SecretHash,
		SettleTimeout,
		Signature,
		TokenAddress,
		TokenAmount,
		TokenNetworkAddress,
		TokenNetworkRegistryAddress,
		U256,
	},
};
use serde::{
	Deserialize,
	Serialize,
};

use super::{
	ContractSendEvent,
	SendMessageEvent,
};
use crate::{
	constants::{
		DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS,
		MAXIMUM_PENDING_TRANSFERS,
		PROPORTIONAL_FEE_DENOMINATOR,
	},
	errors::StateTransitionError,
	types::{
		Random,
		TransactionExecutionStatus,
	},
	views,
};

/// Root of the node state.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ChainState {
	pub chain_id: ChainID,
	pub block_number: BlockNumber,
	pub block_hash: BlockHash,
	pub our_address: Address,
	pub registries: HashMap<Address, TokenNetworkRegistry>,
	pub payment_mapping: PaymentMappingState,
	#[serde(with = "queues")]
	pub queues: HashMap<QueueIdentifier, Vec<SendMessageEvent>>,
	pub pending_transactions: Vec<ContractSendEvent>,
	pub rng: Random,
}

impl ChainState {
	pub fn new(
		chain_id: ChainID,
		block_number: BlockNumber,
		block_hash: BlockHash,
		our_address: Address,
	) -> Self {
		Self {
			chain_id,
			block_number,
			block_hash,
			our_address,
			registries: HashMap::default(),
			payment_mapping: PaymentMappingState::default(),
			queues: HashMap::default(),
			pending_transactions: Vec::new(),
			rng: Random::new(),
		}
	}
}

/// JSON object keys must be strings, so the queue map is stored as a list of entries.
mod queues {
	use std::collections::HashMap;

	use serde::{
		Deserialize,
		Deserializer,
		Serializer,
	};

	use super::{
		QueueIdentifier,
		SendMessageEvent,
	};

	type Queues = HashMap<QueueIdentifier, Vec<SendMessageEvent>>;

	pub fn serialize<S: Serializer>(queues: &Queues, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(queues)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Queues, D::Error> {
		Vec::<(QueueIdentifier, Vec<SendMessageEvent>)>::deserialize(deserializer)
			.map(|entries| entries.into_iter().collect())
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TokenNetworkRegistry {
	pub address: Address,
	pub token_networks: HashMap<Address, TokenNetworkState>,
	pub token_network_by_token: HashMap<Address, Address>,
}

impl TokenNetworkRegistry {
	pub fn new(address: Address, token_networks: Vec<TokenNetworkState>) -> Self {
		let token_network_by_token = token_networks
			.iter()
			.map(|token_network| (token_network.token_address, token_network.address))
			.collect();
		let token_networks = token_networks
			.into_iter()
			.map(|token_network| (token_network.address, token_network))
			.collect();

		Self { address, token_networks, token_network_by_token }
	}
}

/// The channels of one token, indexed by identifier and by partner.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TokenNetworkState {
	pub address: Address,
	pub token_address: TokenAddress,
	pub channels: HashMap<ChannelIdentifier, NettingChannelState>,
	pub channels_by_partner: HashMap<Address, Vec<ChannelIdentifier>>,
}

impl TokenNetworkState {
	pub fn new(address: Address, token_address: TokenAddress) -> Self {
		Self {
			address,
			token_address,
			channels: HashMap::default(),
			channels_by_partner: HashMap::default(),
		}
	}
}

/// Channel status, derived from the confirmed close and settle transactions.
#[derive(Copy, Clone, Display, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
	#[display(fmt = "opened")]
	Opened,
	#[display(fmt = "closed")]
	Closed,
	#[display(fmt = "settled")]
	Settled,
}

impl ChannelStatus {
	/// Opened or closed. A secret registered for an unsettled channel can still be used.
	pub fn is_unsettled(self) -> bool {
		self != ChannelStatus::Settled
	}
}

/// Per token mediation fees, applied to channels as they are opened.
#[derive(Default, Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct MediationFeeConfig {
	pub token_to_flat_fee: HashMap<Address, FeeAmount>,
	pub token_to_proportional_fee: HashMap<Address, ProportionalFeeAmount>,
}

impl MediationFeeConfig {
	/// The schedule new channels of `token_address` start with.
	pub fn schedule_for(&self, token_address: &Address) -> FeeScheduleState {
		FeeScheduleState {
			flat: self.token_to_flat_fee.get(token_address).copied().unwrap_or_default(),
			proportional: self
				.token_to_proportional_fee
				.get(token_address)
				.copied()
				.unwrap_or_default(),
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct NettingChannelState {
	pub canonical_identifier: CanonicalIdentifier,
	pub token_address: TokenAddress,
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub reveal_timeout: RevealTimeout,
	pub settle_timeout: SettleTimeout,
	pub fee_schedule: FeeScheduleState,
	pub our_state: ChannelEndState,
	pub partner_state: ChannelEndState,
	pub open_transaction: TransactionExecutionStatus,
	pub close_transaction: Option<TransactionExecutionStatus>,
	pub settle_transaction: Option<TransactionExecutionStatus>,
	pub update_transaction: Option<TransactionExecutionStatus>,
}

impl NettingChannelState {
	/// A freshly opened channel without deposits.
	///
	/// Fails unless the reveal timeout is shorter than the settle timeout.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		canonical_identifier: CanonicalIdentifier,
		token_address: TokenAddress,
		token_network_registry_address: TokenNetworkRegistryAddress,
		our_address: Address,
		partner_address: Address,
		reveal_timeout: RevealTimeout,
		settle_timeout: SettleTimeout,
		open_transaction: TransactionExecutionStatus,
		fee_config: &MediationFeeConfig,
	) -> Result<Self, StateTransitionError> {
		if reveal_timeout >= settle_timeout {
			return Err(StateTransitionError::invalid(
				"ContractReceiveChannelOpened",
				format!(
					"reveal_timeout({}) must be smaller than settle_timeout({})",
					reveal_timeout, settle_timeout,
				),
			))
		}

		Ok(Self {
			fee_schedule: fee_config.schedule_for(&token_address),
			our_state: ChannelEndState::new(our_address),
			partner_state: ChannelEndState::new(partner_address),
			canonical_identifier,
			token_address,
			token_network_registry_address,
			reveal_timeout,
			settle_timeout,
			open_transaction,
			close_transaction: None,
			settle_transaction: None,
			update_transaction: None,
		})
	}

	/// Status as confirmed on-chain. Requested but unconfirmed transactions do not count.
	pub fn status(&self) -> ChannelStatus {
		let mined = |transaction: &Option<TransactionExecutionStatus>| {
			matches!(transaction, Some(status) if status.finished_block_number.is_some())
		};

		match (mined(&self.close_transaction), mined(&self.settle_transaction)) {
			(_, true) => ChannelStatus::Settled,
			(true, false) => ChannelStatus::Closed,
			(false, false) => ChannelStatus::Opened,
		}
	}

	/// We asked for the channel to be closed and wait for the confirmation.
	pub fn is_closing(&self) -> bool {
		self.close_transaction.is_some() && self.status() == ChannelStatus::Opened
	}

	/// Deposits of both sides minus everything withdrawn.
	pub fn capacity(&self) -> TokenAmount {
		let deposits = self.our_state.contract_balance + self.partner_state.contract_balance;
		deposits
			.saturating_sub(self.our_state.total_withdraw())
			.saturating_sub(self.partner_state.total_withdraw())
	}

	/// Whether a new lock of `amount` can be sent through this channel.
	///
	/// With a `lock_timeout` the lock must also fit between the reveal and the settle timeout.
	pub fn is_usable_for_new_transfer(
		&self,
		amount: TokenAmount,
		lock_timeout: Option<LockTimeout>,
	) -> bool {
		let open = self.status() == ChannelStatus::Opened && !self.is_closing();
		let timeouts_sane = self.settle_timeout >= self.reveal_timeout * 2;
		let has_room = self.our_state.count_pending_transfers() < MAXIMUM_PENDING_TRANSFERS;
		let funded = amount <= views::channel_distributable(&self.our_state, &self.partner_state) &&
			self.our_state.is_valid_amount(amount);
		let timeout_fits = lock_timeout.map_or(true, |timeout| {
			timeout > self.reveal_timeout && timeout <= self.settle_timeout
		});

		open && timeouts_sane && has_room && funded && timeout_fits
	}

	pub fn is_usable_for_mediation(&self, amount: TokenAmount, lock_timeout: BlockTimeout) -> bool {
		self.is_usable_for_new_transfer(amount, Some(lock_timeout))
	}
}

/// One participant's side of a channel.
#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ChannelEndState {
	pub address: Address,
	pub contract_balance: TokenAmount,
	pub total_withdraw_onchain: TokenAmount,
	pub pending_withdraws: HashMap<TokenAmount, PendingWithdrawState>,
	pub expired_withdraws: Vec<ExpiredWithdrawState>,
	/// Locks whose secret this side has not learned.
	pub locked: HashMap<SecretHash, HashTimeLockState>,
	/// Locks with a known secret, waiting for the Unlock.
	pub unlocked: HashMap<SecretHash, UnlockPartialProofState>,
	/// Locks whose secret was registered on-chain in time.
	pub unlocked_onchain: HashMap<SecretHash, UnlockPartialProofState>,
	pub balance_proof: Option<BalanceProofState>,
	pub pending_locks: PendingLocksState,
	pub onchain_locksroot: Locksroot,
	pub nonce: Nonce,
}

impl ChannelEndState {
	pub fn new(address: Address) -> Self {
		Self { address, onchain_locksroot: *LOCKSROOT_OF_NO_LOCKS, ..Self::default() }
	}

	/// The highest withdraw, requested or confirmed.
	pub fn total_withdraw(&self) -> TokenAmount {
		self.pending_withdraws
			.values()
			.map(|withdraw| withdraw.total_withdraw)
			.fold(self.total_withdraw_onchain, max)
	}

	pub fn next_nonce(&self) -> Nonce {
		self.nonce + 1
	}

	pub fn count_pending_transfers(&self) -> usize {
		self.pending_locks.locks.len()
	}

	pub fn transferred_amount(&self) -> TokenAmount {
		self.balance_proof
			.as_ref()
			.map(|balance_proof| balance_proof.transferred_amount)
			.unwrap_or_default()
	}

	/// Sum of every lock this side still has to resolve.
	pub fn locked_amount(&self) -> LockedAmount {
		let with_secret = self.unlocked.values().chain(self.unlocked_onchain.values());
		self.locked
			.values()
			.chain(with_secret.map(|unlock| &unlock.lock))
			.fold(LockedAmount::zero(), |total, lock| total.saturating_add(lock.amount))
	}

	/// Locksroot, nonce, transferred and locked amount of the latest balance proof.
	pub fn get_current_balanceproof(&self) -> (Locksroot, Nonce, TokenAmount, LockedAmount) {
		self.balance_proof
			.as_ref()
			.map(|proof| (proof.locksroot, proof.nonce, proof.transferred_amount, proof.locked_amount))
			.unwrap_or((*LOCKSROOT_OF_NO_LOCKS, Nonce::zero(), U256::zero(), U256::zero()))
	}

	/// Whether locking `amount` on top of the current balance proof stays representable.
	pub fn is_valid_amount(&self, amount: TokenAmount) -> bool {
		let (_, _, transferred_amount, locked_amount) = self.get_current_balanceproof();
		[locked_amount, amount]
			.iter()
			.try_fold(transferred_amount, |total, value| total.checked_add(*value))
			.is_some()
	}

	pub fn is_secret_known(&self, secrethash: SecretHash) -> bool {
		self.is_secret_known_offchain(secrethash) || self.is_secret_known_onchain(secrethash)
	}

	pub fn is_secret_known_onchain(&self, secrethash: SecretHash) -> bool {
		self.unlocked_onchain.contains_key(&secrethash)
	}

	pub fn is_secret_known_offchain(&self, secrethash: SecretHash) -> bool {
		self.unlocked.contains_key(&secrethash)
	}

	fn unlock_of(&self, secrethash: SecretHash) -> Option<&UnlockPartialProofState> {
		self.unlocked.get(&secrethash).or_else(|| self.unlocked_onchain.get(&secrethash))
	}

	/// The lock for `secrethash`, whether its secret is known or not.
	pub fn get_lock(&self, secrethash: SecretHash) -> Option<&HashTimeLockState> {
		match self.locked.get(&secrethash) {
			Some(lock) => Some(lock),
			None => self.unlock_of(secrethash).map(|unlock| &unlock.lock),
		}
	}

	pub fn get_secret(&self, secrethash: SecretHash) -> Option<Secret> {
		self.unlock_of(secrethash).map(|unlock| unlock.secret.clone())
	}
}

/// A signed commitment to one side's transferred and locked amounts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BalanceProofState {
	pub nonce: Nonce,
	pub transferred_amount: TokenAmount,
	pub locked_amount: LockedAmount,
	pub locksroot: Locksroot,
	pub canonical_identifier: CanonicalIdentifier,
	pub balance_hash: BalanceHash,
	pub message_hash: Option<MessageHash>,
	pub signature: Option<Signature>,
	pub sender: Option<Address>,
}

/// Encoded pending locks in insertion order.
#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct PendingLocksState {
	pub locks: Vec<EncodedLock>,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct UnlockPartialProofState {
	pub lock: HashTimeLockState,
	pub secret: Secret,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct HashTimeLockState {
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	pub secrethash: SecretHash,
	/// `expiration ‖ amount ‖ secrethash`, each a 32 byte word.
	pub encoded: EncodedLock,
}

impl HashTimeLockState {
	pub fn create(amount: TokenAmount, expiration: BlockExpiration, secrethash: SecretHash) -> Self {
		let encoded = [expiration.to_be_bytes(), amount.to_bytes(), secrethash.as_bytes().to_vec()]
			.concat();
		Self { amount, expiration, secrethash, encoded: Bytes(encoded) }
	}

	/// Whether there is still time to learn the secret and unlock off-chain before the lock
	/// reaches the danger zone of `reveal_timeout` blocks.
	pub fn is_safe_to_wait(&self, reveal_timeout: RevealTimeout, block_number: BlockNumber) -> bool {
		self.expiration.saturating_sub(block_number) > reveal_timeout
	}
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ExpiredWithdrawState {
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub nonce: Nonce,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct PendingWithdrawState {
	pub total_withdraw: TokenAmount,
	pub expiration: BlockExpiration,
	pub nonce: Nonce,
}

impl PendingWithdrawState {
	/// A withdraw only counts as expired once its expiration is safely confirmed.
	pub fn has_expired(&self, current_block: BlockNumber) -> bool {
		let confirmed_after = BlockNumber::from(DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS * 2);
		current_block >= self.expiration.saturating_add(confirmed_after)
	}
}

/// Flat and proportional mediation fees of a channel.
#[derive(Serialize, Deserialize, Clone, Default, Debug, Eq, PartialEq)]
pub struct FeeScheduleState {
	#[serde(with = "hopline_primitives::decimal")]
	pub flat: FeeAmount,
	/// Parts per million of the mediated amount.
	#[serde(with = "hopline_primitives::decimal")]
	pub proportional: ProportionalFeeAmount,
}

impl FeeScheduleState {
	pub fn fee(&self, amount: TokenAmount) -> FeeAmount {
		let per_million = U256::from(PROPORTIONAL_FEE_DENOMINATOR);
		self.flat.saturating_add(amount.saturating_mul(self.proportional) / per_million)
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TransactionChannelDeposit {
	pub participant_address: Address,
	pub contract_balance: TokenAmount,
	pub deposit_block_number: BlockNumber,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct HopState {
	pub node_address: Address,
	pub channel_identifier: ChannelIdentifier,
}

/// A route to the target as handed over by the route provider.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct RouteState {
	pub route: Vec<Address>,
	pub estimated_fee: TokenAmount,
}

impl RouteState {
	/// The hop following `address`, `None` if `address` is the last hop or not on the route.
	pub fn hop_after(&self, address: Address) -> Option<Address> {
		self.route.iter().skip_while(|hop| **hop != address).nth(1).copied()
	}
}

/// What the user asked to pay.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TransferDescription {
	pub token_network_registry_address: TokenNetworkRegistryAddress,
	pub payment_identifier: PaymentIdentifier,
	pub amount: TokenAmount,
	pub token_network_address: TokenNetworkAddress,
	pub initiator: Address,
	pub target: Address,
	pub secret: Secret,
	pub secrethash: SecretHash,
	pub lock_timeout: Option<BlockTimeout>,
}

/// A locked transfer as sent or received, with the balance proof it carried.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct LockedTransferState {
	pub payment_identifier: PaymentIdentifier,
	pub token: Address,
	pub lock: HashTimeLockState,
	pub initiator: Address,
	pub target: Address,
	/// Amount the target must receive, fees excluded.
	pub payment_amount: TokenAmount,
	pub message_identifier: MessageIdentifier,
	pub route_states: Vec<RouteState>,
	pub balance_proof: BalanceProofState,
	pub secret: Option<Secret>,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct PaymentMappingState {
	pub tasks: HashMap<SecretHash, TransferTask>,
}

/// A payment task, one per secrethash.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TransferTask {
	Initiator(InitiatorTask),
	Mediator(MediatorTask),
	Target(TargetTask),
}

impl TransferTask {
	pub fn token_network_address(&self) -> TokenNetworkAddress {
		match self {
			Self::Initiator(initiator) => initiator.token_network_address,
			Self::Mediator(mediator) => mediator.token_network_address,
			Self::Target(target) => target.canonical_identifier.token_network_address,
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct InitiatorTask {
	pub token_network_address: TokenNetworkAddress,
	pub payment_state: InitiatorPaymentState,
}

/// Every transfer attempted for one payment, keyed by the secrethash of its lock.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct InitiatorPaymentState {
	pub routes: Vec<RouteState>,
	pub transfers: HashMap<SecretHash, InitiatorTransferState>,
	pub cancelled: Vec<ChannelIdentifier>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct InitiatorTransferState {
	pub route: RouteState,
	pub description: TransferDescription,
	pub channel_identifier: ChannelIdentifier,
	pub transfer: LockedTransferState,
	pub secret_requested: bool,
	pub transfer_state: TransferState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TransferState {
	Pending,
	Expired,
	SecretRevealed,
	Canceled,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct MediatorTask {
	pub token_network_address: TokenNetworkAddress,
	pub mediator_state: MediatorTransferState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct MediatorTransferState {
	pub secrethash: SecretHash,
	pub routes: Vec<RouteState>,
	pub secret: Option<Secret>,
	pub pairs: Vec<MediationPair>,
	/// A received transfer no route could carry yet.
	pub waiting_transfer: Option<WaitingTransferState>,
}

/// A payer transfer and the transfer forwarded for it.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct MediationPair {
	pub payer_transfer: LockedTransferState,
	pub payee_address: Address,
	pub payee_transfer: LockedTransferState,
	pub payer_state: PayerState,
	pub payee_state: PayeeState,
}

impl MediationPair {
	/// One of the two locks is still unresolved.
	pub fn is_pending(&self) -> bool {
		!self.payee_state.is_final() || !self.payer_state.is_final()
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum PayerState {
	Pending,
	SecretRevealed,
	WaitingUnlock,
	BalanceProof,
	Expired,
}

impl PayerState {
	pub fn knows_secret(&self) -> bool {
		matches!(self, Self::SecretRevealed | Self::WaitingUnlock | Self::BalanceProof)
	}

	pub fn is_final(&self) -> bool {
		matches!(self, Self::BalanceProof | Self::Expired)
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum PayeeState {
	Pending,
	SecretRevealed,
	ContractUnlock,
	BalanceProof,
	Expired,
}

impl PayeeState {
	pub fn knows_secret(&self) -> bool {
		self.is_paid() || *self == Self::SecretRevealed
	}

	/// Paid off-chain with a balance proof or on-chain with an unlock.
	pub fn is_paid(&self) -> bool {
		matches!(self, Self::ContractUnlock | Self::BalanceProof)
	}

	pub fn is_final(&self) -> bool {
		self.is_paid() || *self == Self::Expired
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct WaitingTransferState {
	pub transfer: LockedTransferState,
	pub status: WaitingTransferStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum WaitingTransferStatus {
	Waiting,
	Expired,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TargetTask {
	pub canonical_identifier: CanonicalIdentifier,
	pub target_state: TargetTransferState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TargetTransferState {
	pub from_hop: HopState,
	pub transfer: LockedTransferState,
	pub secret: Option<Secret>,
	pub state: TargetState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TargetState {
	/// The lock is held but no secret was requested, it will expire.
	Holding,
	SecretRequest,
	OffchainSecretReveal,
	OnchainSecretReveal,
	Expired,
}
