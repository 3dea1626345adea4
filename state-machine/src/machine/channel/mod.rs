use hopline_primitives::{
	constants::LOCKSROOT_OF_NO_LOCKS,
	hashing::hash_balance_data,
	types::SignedAmount,
};

use self::{
	utils::{
		add_lock,
		compute_locksroot,
		remove_lock,
	},
	validators::{
		is_balance_proof_safe_for_onchain_operations,
		is_lock_expired,
		is_lock_pending,
		is_valid_action_withdraw,
		is_valid_balance_proof_signature,
		is_valid_lock_expired,
		is_valid_locked_transfer,
		is_valid_unlock,
		is_valid_withdraw_confirmation,
		is_valid_withdraw_expired,
		is_valid_withdraw_request,
	},
	views::get_safe_initial_expiration,
};
use crate::{
	constants::CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
	errors::StateTransitionError,
	types::{
		ActionChannelClose,
		ActionChannelWithdraw,
		Address,
		BalanceProofState,
		Block,
		BlockExpiration,
		BlockHash,
		BlockNumber,
		ChannelEndState,
		ChannelStatus,
		ContractReceiveChannelBatchUnlock,
		ContractReceiveChannelClosed,
		ContractReceiveChannelDeposit,
		ContractReceiveChannelSettled,
		ContractReceiveChannelWithdraw,
		ContractReceiveUpdateTransfer,
		ContractSendChannelBatchUnlock,
		ContractSendChannelClose,
		ContractSendChannelSettle,
		ContractSendChannelUpdateTransfer,
		ContractSendChannelWithdraw,
		ContractSendEventInner,
		ErrorInvalidActionWithdraw,
		Event,
		ExpiredWithdrawState,
		HashTimeLockState,
		LockedTransferState,
		MessageIdentifier,
		NettingChannelState,
		PaymentIdentifier,
		PendingLocksState,
		PendingWithdrawState,
		Random,
		ReceiveLockExpired,
		ReceiveUnlock,
		ReceiveWithdrawConfirmation,
		ReceiveWithdrawExpired,
		ReceiveWithdrawRequest,
		RouteState,
		Secret,
		SecretHash,
		SendLockExpired,
		SendLockedTransfer,
		SendMessageEventInner,
		SendProcessed,
		SendUnlock,
		SendWithdrawConfirmation,
		SendWithdrawExpired,
		SendWithdrawRequest,
		StateChange,
		TokenAmount,
		TransactionExecutionStatus,
		TransactionResult,
		UnlockPartialProofState,
	},
	views as global_views,
};

pub mod utils;
pub mod validators;
pub mod views;

type TransitionResult = std::result::Result<ChannelTransition, StateTransitionError>;

/// A channel after a transition. `None` once the channel is gone.
pub struct ChannelTransition {
	pub new_state: Option<NettingChannelState>,
	pub events: Vec<Event>,
}

impl ChannelTransition {
	fn keep(channel: NettingChannelState, events: Vec<Event>) -> Self {
		Self { new_state: Some(channel), events }
	}

	fn removed() -> Self {
		Self { new_state: None, events: vec![] }
	}
}

/// `sender`'s deposit plus what it transferred, minus what `receiver` transferred.
///
/// Before any deposit `get_balance(a, b) == -get_balance(b, a)`.
pub fn get_balance(sender: &ChannelEndState, receiver: &ChannelEndState) -> SignedAmount {
	SignedAmount::difference(
		sender.contract_balance.saturating_add(sender.transferred_amount()),
		receiver.transferred_amount(),
	)
}

/// Checks a partner balance proof and stores it. Nothing changes on error.
fn accept_partner_balance_proof(
	partner: &mut ChannelEndState,
	balance_proof: BalanceProofState,
	pending_locks: PendingLocksState,
) -> Result<(), StateTransitionError> {
	if balance_proof.nonce <= partner.nonce {
		return Err(StateTransitionError::InvalidBalanceProof(format!(
			"Nonce {} is not larger than the current nonce {}",
			balance_proof.nonce, partner.nonce
		)))
	}

	let expected = compute_locksroot(&pending_locks);
	if expected != balance_proof.locksroot {
		return Err(StateTransitionError::InvalidBalanceProof(format!(
			"Locksroot mismatch. expected {:?} got {:?}",
			expected, balance_proof.locksroot
		)))
	}

	is_valid_balance_proof_signature(&balance_proof, partner.address)
		.map_err(StateTransitionError::InvalidBalanceProof)?;

	partner.nonce = balance_proof.nonce;
	partner.pending_locks = pending_locks;
	partner.balance_proof = Some(balance_proof);
	Ok(())
}

/// Replace the partner's balance proof together with the pending locks it commits to.
///
/// The nonce must increase, the locksroot must match `pending_locks` and the proof must be
/// signed by the partner.
pub fn update_balance_proof(
	mut channel: NettingChannelState,
	balance_proof: BalanceProofState,
	pending_locks: PendingLocksState,
) -> Result<NettingChannelState, StateTransitionError> {
	accept_partner_balance_proof(&mut channel.partner_state, balance_proof, pending_locks)?;
	Ok(channel)
}

/// Whether `balance_proof` is the one already held for this side.
pub(crate) fn is_duplicate_balance_proof(
	end_state: &ChannelEndState,
	balance_proof: &BalanceProofState,
) -> bool {
	end_state.balance_proof.as_ref().map_or(false, |current| {
		current.nonce == balance_proof.nonce && current.balance_hash == balance_proof.balance_hash
	})
}

/// Validates a balance proof from the partner and stores it.
///
/// Returns `false` for a retransmission of the proof already held.
fn receive_balance_proof<F>(
	channel: &mut NettingChannelState,
	balance_proof: &BalanceProofState,
	validate: F,
) -> Result<bool, StateTransitionError>
where
	F: FnOnce(&NettingChannelState) -> Result<PendingLocksState, String>,
{
	if is_duplicate_balance_proof(&channel.partner_state, balance_proof) {
		return Ok(false)
	}

	let pending_locks = validate(&*channel).map_err(StateTransitionError::InvalidBalanceProof)?;
	accept_partner_balance_proof(&mut channel.partner_state, balance_proof.clone(), pending_locks)?;
	Ok(true)
}

/// Acknowledge a received message. Processed messages are not ordered with balance proofs.
pub(crate) fn send_processed(recipient: Address, message_identifier: MessageIdentifier) -> Event {
	let inner = SendMessageEventInner {
		recipient,
		canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
		message_identifier,
	};
	SendProcessed { inner }.into()
}

/// Envelope of a message to the partner, queued behind the channel's balance proofs.
fn to_partner(
	channel: &NettingChannelState,
	message_identifier: MessageIdentifier,
) -> SendMessageEventInner {
	SendMessageEventInner {
		recipient: channel.partner_state.address,
		canonical_identifier: channel.canonical_identifier.clone(),
		message_identifier,
	}
}

/// Our next balance proof and the locks it commits to, not applied yet.
struct OwnUpdate {
	balance_proof: BalanceProofState,
	pending_locks: PendingLocksState,
}

impl OwnUpdate {
	fn new(
		channel: &NettingChannelState,
		pending_locks: PendingLocksState,
		transferred_amount: TokenAmount,
		locked_amount: TokenAmount,
	) -> Result<Self, StateTransitionError> {
		let locksroot = compute_locksroot(&pending_locks);
		let balance_proof = BalanceProofState {
			nonce: channel.our_state.next_nonce(),
			transferred_amount,
			locked_amount,
			locksroot,
			canonical_identifier: channel.canonical_identifier.clone(),
			balance_hash: hash_balance_data(transferred_amount, locked_amount, locksroot)?,
			message_hash: None,
			signature: None,
			sender: Some(channel.our_state.address),
		};
		Ok(Self { balance_proof, pending_locks })
	}

	fn apply(self, our_state: &mut ChannelEndState) -> BalanceProofState {
		our_state.nonce = self.balance_proof.nonce;
		our_state.pending_locks = self.pending_locks;
		our_state.balance_proof = Some(self.balance_proof.clone());
		self.balance_proof
	}
}

fn delete_unclaimed_lock(end_state: &mut ChannelEndState, secrethash: SecretHash) {
	end_state.locked.remove(&secrethash);
	end_state.unlocked.remove(&secrethash);
}

fn delete_lock(end_state: &mut ChannelEndState, secrethash: SecretHash) {
	delete_unclaimed_lock(end_state, secrethash);
	end_state.unlocked_onchain.remove(&secrethash);
}

/// Check if the lock with `secrethash` exists in either our state or the partner's state.
pub(crate) fn lock_exists_in_either_channel_side(
	channel: &NettingChannelState,
	secrethash: SecretHash,
) -> bool {
	[&channel.our_state, &channel.partner_state]
		.into_iter()
		.any(|end_state| is_lock_pending(end_state, secrethash))
}

/// Remove our expired lock and tell the partner with a new balance proof.
pub(crate) fn send_lock_expired(
	channel: &mut NettingChannelState,
	lock: &HashTimeLockState,
	rng: &mut Random,
) -> Result<Vec<Event>, StateTransitionError> {
	if channel.status() != ChannelStatus::Opened {
		return Ok(vec![])
	}

	let our_state = &channel.our_state;
	let update = OwnUpdate::new(
		channel,
		remove_lock(&our_state.pending_locks, lock)?,
		our_state.transferred_amount(),
		our_state.locked_amount().saturating_sub(lock.amount),
	)?;
	let balance_proof = update.apply(&mut channel.our_state);
	delete_unclaimed_lock(&mut channel.our_state, lock.secrethash);

	let inner = to_partner(channel, rng.next_message_identifier());
	Ok(vec![SendLockExpired { inner, balance_proof, secrethash: lock.secrethash }.into()])
}

/// Claim our lock of `secrethash` for the partner with an Unlock.
pub(crate) fn send_unlock(
	channel: &mut NettingChannelState,
	message_identifier: MessageIdentifier,
	payment_identifier: PaymentIdentifier,
	secret: Secret,
	secrethash: SecretHash,
	block_number: BlockNumber,
) -> Result<SendUnlock, StateTransitionError> {
	let refuse = |reason: &str| Err(StateTransitionError::Other(reason.to_owned()));

	let lock = match channel.our_state.get_lock(secrethash) {
		Some(lock) => lock.clone(),
		None => return refuse("Caller must ensure the lock exists"),
	};
	if channel.status() != ChannelStatus::Opened {
		return refuse("Channel is not open")
	}
	if !is_lock_pending(&channel.our_state, secrethash) {
		return refuse("Lock is not pending")
	}
	if is_lock_expired(&channel.our_state, &lock, block_number, lock.expiration).is_ok() {
		return refuse("Lock expired")
	}

	let our_state = &channel.our_state;
	let update = OwnUpdate::new(
		channel,
		remove_lock(&our_state.pending_locks, &lock)?,
		our_state.transferred_amount().saturating_add(lock.amount),
		our_state.locked_amount().saturating_sub(lock.amount),
	)?;
	let balance_proof = update.apply(&mut channel.our_state);
	delete_lock(&mut channel.our_state, secrethash);

	Ok(SendUnlock {
		inner: to_partner(channel, message_identifier),
		payment_identifier,
		token_address: channel.token_address,
		balance_proof,
		secret,
		secrethash,
	})
}

/// Lock `amount` for the partner in a new LockedTransfer.
#[allow(clippy::too_many_arguments)]
pub(crate) fn send_locked_transfer(
	channel: &mut NettingChannelState,
	initiator: Address,
	target: Address,
	amount: TokenAmount,
	payment_amount: TokenAmount,
	expiration: BlockExpiration,
	secrethash: SecretHash,
	message_identifier: MessageIdentifier,
	payment_identifier: PaymentIdentifier,
	route_states: Vec<RouteState>,
) -> Result<SendLockedTransfer, StateTransitionError> {
	if channel.status() != ChannelStatus::Opened {
		return Err(StateTransitionError::Other("Caller must make sure the channel is open".to_owned()))
	}
	let distributable =
		global_views::channel_distributable(&channel.our_state, &channel.partner_state);
	if amount > distributable {
		return Err(StateTransitionError::Other(
			"Caller must make sure there is enough balance".to_owned(),
		))
	}

	let lock = HashTimeLockState::create(amount, expiration, secrethash);
	let our_state = &channel.our_state;
	let update = OwnUpdate::new(
		channel,
		add_lock(&our_state.pending_locks, &lock)?,
		our_state.transferred_amount(),
		our_state.locked_amount().saturating_add(amount),
	)?;
	if !is_balance_proof_safe_for_onchain_operations(&update.balance_proof) {
		return Err(StateTransitionError::Other(
			"Caller must make sure the result wont overflow".to_owned(),
		))
	}

	let balance_proof = update.apply(&mut channel.our_state);
	channel.our_state.locked.insert(secrethash, lock.clone());

	let transfer = LockedTransferState {
		payment_identifier,
		token: channel.token_address,
		lock,
		initiator,
		target,
		payment_amount,
		message_identifier,
		route_states,
		balance_proof,
		secret: None,
	};
	Ok(SendLockedTransfer { inner: to_partner(channel, message_identifier), transfer })
}

/// Register the partner lock carried by a received LockedTransfer.
///
/// A transfer whose balance proof is already held is a no-op.
pub(crate) fn handle_receive_locked_transfer(
	channel: &mut NettingChannelState,
	transfer: &LockedTransferState,
	block_number: BlockNumber,
) -> Result<Vec<Event>, StateTransitionError> {
	let sender = transfer.balance_proof.sender.ok_or_else(|| {
		StateTransitionError::InvalidBalanceProof("The transfer's sender is None".to_owned())
	})?;

	let accepted = receive_balance_proof(channel, &transfer.balance_proof, |channel| {
		is_valid_locked_transfer(
			transfer,
			channel,
			&channel.partner_state,
			&channel.our_state,
			block_number,
		)
	})?;
	if !accepted {
		return Ok(vec![])
	}

	channel.partner_state.locked.insert(transfer.lock.secrethash, transfer.lock.clone());
	Ok(vec![send_processed(sender, transfer.message_identifier)])
}

/// Apply a received Unlock to the partner side.
pub(crate) fn handle_unlock(
	channel: &mut NettingChannelState,
	unlock: &ReceiveUnlock,
) -> Result<Vec<Event>, StateTransitionError> {
	let accepted = receive_balance_proof(channel, &unlock.balance_proof, |channel| {
		is_valid_unlock(channel, &channel.partner_state, unlock)
	})?;
	if !accepted {
		return Ok(vec![])
	}

	delete_lock(&mut channel.partner_state, unlock.secrethash);
	Ok(vec![send_processed(unlock.sender, unlock.message_identifier)])
}

/// Apply a received LockExpired to the partner side.
pub(crate) fn handle_receive_lock_expired(
	channel: &mut NettingChannelState,
	lock_expired: &ReceiveLockExpired,
	block_number: BlockNumber,
) -> Result<Vec<Event>, StateTransitionError> {
	let accepted = receive_balance_proof(channel, &lock_expired.balance_proof, |channel| {
		is_valid_lock_expired(
			channel,
			lock_expired,
			&channel.partner_state,
			&channel.our_state,
			block_number,
		)
	})?;
	if !accepted {
		return Ok(vec![])
	}

	delete_unclaimed_lock(&mut channel.partner_state, lock_expired.secrethash);
	Ok(vec![send_processed(lock_expired.sender, lock_expired.message_identifier)])
}

/// Secret learned off-chain: the lock stays pending until the Unlock arrives.
pub(crate) fn register_offchain_secret(
	channel: &mut NettingChannelState,
	secret: Secret,
	secrethash: SecretHash,
) {
	for end_state in [&mut channel.our_state, &mut channel.partner_state] {
		if let Some(lock) = end_state.locked.remove(&secrethash) {
			let unlock = UnlockPartialProofState { lock, secret: secret.clone() };
			end_state.unlocked.insert(secrethash, unlock);
		}
	}
}

/// Secret registered on-chain at `registered_at`. Only locks still valid at that block
/// become claimable on-chain.
pub(crate) fn register_onchain_secret(
	channel: &mut NettingChannelState,
	secret: Secret,
	secrethash: SecretHash,
	registered_at: BlockNumber,
) {
	for end_state in [&mut channel.our_state, &mut channel.partner_state] {
		let pending = end_state
			.locked
			.get(&secrethash)
			.or_else(|| end_state.unlocked.get(&secrethash).map(|unlock| &unlock.lock));
		let lock = match pending {
			Some(lock) if lock.expiration >= registered_at => lock.clone(),
			_ => continue,
		};

		let unlock = UnlockPartialProofState { lock, secret: secret.clone() };
		end_state.unlocked_onchain.insert(secrethash, unlock);
		delete_unclaimed_lock(end_state, secrethash);
	}
}

fn send_withdraw_request(
	channel: &mut NettingChannelState,
	total_withdraw: TokenAmount,
	block_number: BlockNumber,
	rng: &mut Random,
) -> Vec<Event> {
	if !channel.status().is_unsettled() {
		return vec![]
	}

	let nonce = channel.our_state.next_nonce();
	let expiration = get_safe_initial_expiration(block_number, channel.reveal_timeout, None);
	channel.our_state.nonce = nonce;
	channel
		.our_state
		.pending_withdraws
		.insert(total_withdraw, PendingWithdrawState { total_withdraw, expiration, nonce });

	let request = SendWithdrawRequest {
		inner: to_partner(channel, rng.next_message_identifier()),
		participant: channel.our_state.address,
		total_withdraw,
		expiration,
		nonce,
	};
	vec![request.into()]
}

/// Drop our withdraw requests that expired and notify the partner, lowest amount first.
fn send_expired_withdraws(
	channel: &mut NettingChannelState,
	block_number: BlockNumber,
	rng: &mut Random,
) -> Vec<Event> {
	let mut expired: Vec<TokenAmount> = channel
		.our_state
		.pending_withdraws
		.values()
		.filter(|withdraw| withdraw.has_expired(block_number))
		.map(|withdraw| withdraw.total_withdraw)
		.collect();
	expired.sort();

	let mut events = Vec::with_capacity(expired.len());
	for total_withdraw in expired {
		let withdraw = match channel.our_state.pending_withdraws.remove(&total_withdraw) {
			Some(withdraw) => withdraw,
			None => continue,
		};
		let nonce = channel.our_state.next_nonce();
		channel.our_state.nonce = nonce;
		channel.our_state.expired_withdraws.push(ExpiredWithdrawState {
			total_withdraw,
			expiration: withdraw.expiration,
			nonce: withdraw.nonce,
		});

		let expired = SendWithdrawExpired {
			inner: to_partner(channel, rng.next_message_identifier()),
			participant: channel.our_state.address,
			total_withdraw,
			expiration: withdraw.expiration,
			nonce,
		};
		events.push(expired.into());
	}
	events
}

/// Start the settlement once the settle timeout after the close has passed.
fn settle_when_timed_out(
	channel: &mut NettingChannelState,
	block: &Block,
) -> Result<Vec<Event>, StateTransitionError> {
	let closed_at = channel
		.close_transaction
		.as_ref()
		.and_then(|transaction| transaction.finished_block_number)
		.ok_or_else(|| {
			StateTransitionError::InvariantViolation(
				"Channel is Closed but close_transaction block number is missing".to_owned(),
			)
		})?;

	let settle_from = closed_at.saturating_add(channel.settle_timeout);
	if channel.settle_transaction.is_some() || block.block_number <= settle_from {
		return Ok(vec![])
	}

	channel.settle_transaction = Some(TransactionExecutionStatus::started(block.block_number));
	let settle = ContractSendChannelSettle {
		inner: ContractSendEventInner { triggered_by_blockhash: block.block_hash },
		canonical_identifier: channel.canonical_identifier.clone(),
	};
	Ok(vec![settle.into()])
}

fn handle_block(
	mut channel: NettingChannelState,
	block: Block,
	rng: &mut Random,
) -> TransitionResult {
	let events = match channel.status() {
		ChannelStatus::Opened => send_expired_withdraws(&mut channel, block.block_number, rng),
		ChannelStatus::Closed => settle_when_timed_out(&mut channel, &block)?,
		ChannelStatus::Settled => vec![],
	};
	Ok(ChannelTransition::keep(channel, events))
}

/// Mark `transaction` as mined at `block_number`, recording it if we never sent it.
fn confirm_transaction(
	transaction: &mut Option<TransactionExecutionStatus>,
	block_number: BlockNumber,
) {
	match transaction {
		None => *transaction = Some(TransactionExecutionStatus::confirmed(block_number)),
		Some(pending) if pending.finished_block_number.is_none() => {
			pending.finished_block_number = Some(block_number);
			pending.result = Some(TransactionResult::Success);
		},
		Some(_) => {},
	}
}

fn handle_channel_closed(
	mut channel: NettingChannelState,
	closed: ContractReceiveChannelClosed,
) -> TransitionResult {
	if closed.canonical_identifier != channel.canonical_identifier ||
		channel.status() != ChannelStatus::Opened
	{
		return Ok(ChannelTransition::keep(channel, vec![]))
	}

	confirm_transaction(&mut channel.close_transaction, closed.block_number);

	// The partner closed with an older proof of ours; answer with the latest one we hold.
	let closed_by_partner = closed.transaction_from != channel.our_state.address;
	let update = match (&channel.partner_state.balance_proof, &channel.update_transaction) {
		(Some(balance_proof), None) if closed_by_partner => Some(ContractSendChannelUpdateTransfer {
			inner: ContractSendEventInner { triggered_by_blockhash: closed.block_hash },
			expiration: closed.block_number.saturating_add(channel.settle_timeout),
			balance_proof: balance_proof.clone(),
		}),
		_ => None,
	};

	let events = match update {
		Some(update) => {
			channel.update_transaction =
				Some(TransactionExecutionStatus::started(closed.block_number));
			vec![update.into()]
		},
		None => vec![],
	};
	Ok(ChannelTransition::keep(channel, events))
}

fn handle_channel_settled(
	mut channel: NettingChannelState,
	settled: ContractReceiveChannelSettled,
) -> TransitionResult {
	if settled.canonical_identifier != channel.canonical_identifier {
		return Ok(ChannelTransition::keep(channel, vec![]))
	}

	confirm_transaction(&mut channel.settle_transaction, settled.block_number);

	let no_locks = *LOCKSROOT_OF_NO_LOCKS;
	if settled.our_onchain_locksroot == no_locks && settled.partner_onchain_locksroot == no_locks {
		return Ok(ChannelTransition::removed())
	}

	channel.our_state.onchain_locksroot = settled.our_onchain_locksroot;
	channel.partner_state.onchain_locksroot = settled.partner_onchain_locksroot;

	let unlock = ContractSendChannelBatchUnlock {
		inner: ContractSendEventInner { triggered_by_blockhash: settled.block_hash },
		canonical_identifier: channel.canonical_identifier.clone(),
		sender: channel.partner_state.address,
	};
	Ok(ChannelTransition::keep(channel, vec![unlock.into()]))
}

fn participant_mut(
	channel: &mut NettingChannelState,
	address: Address,
) -> Option<&mut ChannelEndState> {
	if address == channel.our_state.address {
		Some(&mut channel.our_state)
	} else if address == channel.partner_state.address {
		Some(&mut channel.partner_state)
	} else {
		None
	}
}

fn handle_channel_deposit(
	mut channel: NettingChannelState,
	deposit: ContractReceiveChannelDeposit,
) -> TransitionResult {
	let transaction = deposit.deposit_transaction;
	if let Some(end_state) = participant_mut(&mut channel, transaction.participant_address) {
		// Deposits only grow; a stale event must not shrink the balance.
		end_state.contract_balance = end_state.contract_balance.max(transaction.contract_balance);
	}
	Ok(ChannelTransition::keep(channel, vec![]))
}

fn handle_channel_withdraw(
	mut channel: NettingChannelState,
	withdraw: ContractReceiveChannelWithdraw,
) -> TransitionResult {
	if let Some(end_state) = participant_mut(&mut channel, withdraw.participant) {
		end_state.pending_withdraws.remove(&withdraw.total_withdraw);
		end_state.total_withdraw_onchain = withdraw.total_withdraw;
	}
	Ok(ChannelTransition::keep(channel, vec![]))
}

fn handle_channel_batch_unlock(
	mut channel: NettingChannelState,
	batch_unlock: ContractReceiveChannelBatchUnlock,
) -> TransitionResult {
	if channel.status() != ChannelStatus::Settled {
		return Ok(ChannelTransition::keep(channel, vec![]))
	}

	if let Some(end_state) = participant_mut(&mut channel, batch_unlock.sender) {
		end_state.onchain_locksroot = *LOCKSROOT_OF_NO_LOCKS;
	}

	let all_unlocked = [&channel.our_state, &channel.partner_state]
		.into_iter()
		.all(|end_state| end_state.onchain_locksroot == *LOCKSROOT_OF_NO_LOCKS);
	if all_unlocked {
		return Ok(ChannelTransition::removed())
	}
	Ok(ChannelTransition::keep(channel, vec![]))
}

fn handle_channel_update_transfer(
	mut channel: NettingChannelState,
	update: ContractReceiveUpdateTransfer,
) -> TransitionResult {
	if update.canonical_identifier == channel.canonical_identifier {
		confirm_transaction(&mut channel.update_transaction, update.block_number);
	}
	Ok(ChannelTransition::keep(channel, vec![]))
}

fn handle_action_close(
	mut channel: NettingChannelState,
	close: ActionChannelClose,
	block_number: BlockNumber,
	block_hash: BlockHash,
) -> TransitionResult {
	if channel.canonical_identifier != close.canonical_identifier {
		return Err(StateTransitionError::invalid(
			"ActionChannelClose",
			"Caller must ensure the canonical IDs match",
		))
	}
	if channel.status() != ChannelStatus::Opened || channel.is_closing() {
		return Ok(ChannelTransition::keep(channel, vec![]))
	}

	channel.close_transaction = Some(TransactionExecutionStatus::started(block_number));
	let close = ContractSendChannelClose {
		inner: ContractSendEventInner { triggered_by_blockhash: block_hash },
		canonical_identifier: channel.canonical_identifier.clone(),
		balance_proof: channel.partner_state.balance_proof.clone(),
	};
	Ok(ChannelTransition::keep(channel, vec![close.into()]))
}

fn handle_action_withdraw(
	mut channel: NettingChannelState,
	withdraw: ActionChannelWithdraw,
	block_number: BlockNumber,
	rng: &mut Random,
) -> TransitionResult {
	let total_withdraw = withdraw.total_withdraw;
	let events = if let Err(reason) = is_valid_action_withdraw(&channel, &withdraw) {
		vec![ErrorInvalidActionWithdraw { attemped_withdraw: total_withdraw, reason }.into()]
	} else {
		send_withdraw_request(&mut channel, total_withdraw, block_number, rng)
	};
	Ok(ChannelTransition::keep(channel, events))
}

fn handle_receive_withdraw_request(
	mut channel: NettingChannelState,
	request: ReceiveWithdrawRequest,
) -> TransitionResult {
	is_valid_withdraw_request(&channel, &request)
		.map_err(|e| StateTransitionError::invalid("ReceiveWithdrawRequest", e))?;

	let withdraw = PendingWithdrawState {
		total_withdraw: request.total_withdraw,
		expiration: request.expiration,
		nonce: request.nonce,
	};
	channel.partner_state.pending_withdraws.insert(request.total_withdraw, withdraw);
	channel.partner_state.nonce = request.nonce;

	let nonce = channel.our_state.next_nonce();
	channel.our_state.nonce = nonce;

	let confirmation = SendWithdrawConfirmation {
		inner: to_partner(&channel, request.message_identifier),
		participant: channel.partner_state.address,
		total_withdraw: request.total_withdraw,
		expiration: request.expiration,
		nonce,
	};
	Ok(ChannelTransition::keep(channel, vec![confirmation.into()]))
}

fn handle_receive_withdraw_confirmation(
	mut channel: NettingChannelState,
	confirmation: ReceiveWithdrawConfirmation,
	block_number: BlockNumber,
	block_hash: BlockHash,
) -> TransitionResult {
	is_valid_withdraw_confirmation(&channel, &confirmation)
		.map_err(|e| StateTransitionError::invalid("ReceiveWithdrawConfirmation", e))?;

	channel.partner_state.nonce = confirmation.nonce;
	let mut events =
		vec![send_processed(channel.partner_state.address, confirmation.message_identifier)];

	// The withdraw must be mined before it expires.
	if confirmation.expiration >= block_number.saturating_sub(channel.reveal_timeout) {
		let withdraw = ContractSendChannelWithdraw {
			inner: ContractSendEventInner { triggered_by_blockhash: block_hash },
			canonical_identifier: confirmation.canonical_identifier,
			total_withdraw: confirmation.total_withdraw,
			expiration: confirmation.expiration,
			partner_signature: confirmation.signature,
		};
		events.push(withdraw.into());
	}
	Ok(ChannelTransition::keep(channel, events))
}

fn handle_receive_withdraw_expired(
	mut channel: NettingChannelState,
	expired: ReceiveWithdrawExpired,
	block_number: BlockNumber,
) -> TransitionResult {
	let invalid = |reason: String| StateTransitionError::invalid("ReceiveWithdrawExpired", reason);

	let withdraw = match channel.partner_state.pending_withdraws.get(&expired.total_withdraw) {
		Some(withdraw) => withdraw.clone(),
		None =>
			return Err(invalid(format!(
				"Withdraw expired of {} did not correspond to a previous withdraw request",
				expired.total_withdraw
			))),
	};
	is_valid_withdraw_expired(&channel, &expired, &withdraw, block_number).map_err(invalid)?;

	channel.partner_state.pending_withdraws.remove(&expired.total_withdraw);
	channel.partner_state.nonce = expired.nonce;

	let processed = send_processed(expired.sender, expired.message_identifier);
	Ok(ChannelTransition::keep(channel, vec![processed]))
}

/// Bookkeeping of one side against its own balance proof.
fn check_end_state(
	end_state: &ChannelEndState,
	other: &ChannelEndState,
	balance: TokenAmount,
) -> Result<(), &'static str> {
	let withdraws_keyed_by_total = end_state
		.pending_withdraws
		.iter()
		.all(|(total_withdraw, withdraw)| *total_withdraw == withdraw.total_withdraw);
	if !withdraws_keyed_by_total {
		return Err("Total withdraw mismatch")
	}

	let (locksroot, _, _, locked_amount) = end_state.get_current_balanceproof();
	if end_state.locked_amount() != locked_amount {
		return Err("The sum of the lock's amounts and the balance proof locked_amount must be equal")
	}
	if compute_locksroot(&end_state.pending_locks) != locksroot {
		return Err("The balance proof locks root must match the existing locks")
	}

	let distributable = global_views::channel_distributable(end_state, other);
	if distributable.saturating_add(locked_amount) > balance {
		return Err("Distributable + locked must not exceed balance")
	}

	let mut mapped_locks = end_state
		.locked
		.values()
		.chain(end_state.unlocked.values().map(|unlock| &unlock.lock))
		.chain(end_state.unlocked_onchain.values().map(|unlock| &unlock.lock));
	if !mapped_locks.all(|lock| end_state.pending_locks.locks.contains(&lock.encoded)) {
		return Err("The lock mappings and the pending locks must be synchronised")
	}

	Ok(())
}

/// Checks that the bookkeeping of both sides agrees with their balance proofs.
pub(crate) fn sanity_check(channel: &NettingChannelState) -> Result<(), StateTransitionError> {
	let violation = |reason: &str| StateTransitionError::InvariantViolation(reason.to_owned());
	let ours = &channel.our_state;
	let partner = &channel.partner_state;

	let our_balance = global_views::channel_balance(ours, partner);
	let partner_balance = global_views::channel_balance(partner, ours);
	if our_balance.saturating_add(partner_balance) != channel.capacity() {
		return Err(violation("The whole deposit of the channel has to be accounted for."))
	}

	check_end_state(ours, partner, our_balance).map_err(violation)?;
	check_end_state(partner, ours, partner_balance).map_err(violation)
}

pub fn state_transition(
	channel: NettingChannelState,
	state_change: StateChange,
	block_number: BlockNumber,
	block_hash: BlockHash,
	rng: &mut Random,
) -> TransitionResult {
	let transition = match state_change {
		StateChange::Block(block) => handle_block(channel, block, rng),
		StateChange::ActionChannelClose(close) =>
			handle_action_close(channel, close, block_number, block_hash),
		StateChange::ActionChannelWithdraw(withdraw) =>
			handle_action_withdraw(channel, withdraw, block_number, rng),
		StateChange::ContractReceiveChannelClosed(closed) => handle_channel_closed(channel, closed),
		StateChange::ContractReceiveChannelSettled(settled) =>
			handle_channel_settled(channel, settled),
		StateChange::ContractReceiveChannelDeposit(deposit) =>
			handle_channel_deposit(channel, deposit),
		StateChange::ContractReceiveChannelWithdraw(withdraw) =>
			handle_channel_withdraw(channel, withdraw),
		StateChange::ContractReceiveChannelBatchUnlock(batch_unlock) =>
			handle_channel_batch_unlock(channel, batch_unlock),
		StateChange::ContractReceiveUpdateTransfer(update) =>
			handle_channel_update_transfer(channel, update),
		StateChange::ReceiveWithdrawRequest(request) =>
			handle_receive_withdraw_request(channel, request),
		StateChange::ReceiveWithdrawConfirmation(confirmation) =>
			handle_receive_withdraw_confirmation(channel, confirmation, block_number, block_hash),
		StateChange::ReceiveWithdrawExpired(expired) =>
			handle_receive_withdraw_expired(channel, expired, block_number),
		state_change =>
			return Err(StateTransitionError::invalid(
				state_change.type_name(),
				"Could not transition channel",
			)),
	}?;

	if let Some(channel) = &transition.new_state {
		sanity_check(channel)?;
	}
	Ok(transition)
}
