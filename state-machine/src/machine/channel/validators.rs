use hopline_primitives::{
	hashing::hash_balance_data,
	packing::{
		pack_balance_proof,
		pack_withdraw,
	},
	signing::recover,
	types::{
		Address,
		BlockExpiration,
		BlockNumber,
		Bytes,
		MessageHash,
		MessageTypeId,
		Nonce,
		SecretHash,
		Signature,
		TokenAmount,
	},
};

use super::{
	utils::{
		add_lock,
		compute_locksroot,
		remove_lock,
	},
	views::get_receiver_expiration_threshold,
};
use crate::{
	constants::MAXIMUM_PENDING_TRANSFERS,
	types::{
		ActionChannelWithdraw,
		BalanceProofState,
		ChannelEndState,
		ChannelStatus,
		HashTimeLockState,
		LockedTransferState,
		NettingChannelState,
		PendingLocksState,
		PendingWithdrawState,
		ReceiveLockExpired,
		ReceiveUnlock,
		ReceiveWithdrawConfirmation,
		ReceiveWithdrawExpired,
		ReceiveWithdrawRequest,
	},
	views,
};

/// `Ok` once `lock` may be dropped at `block_number`. A lock claimed on-chain never expires.
pub(crate) fn is_lock_expired(
	end_state: &ChannelEndState,
	lock: &HashTimeLockState,
	block_number: BlockNumber,
	lock_expiration_threshold: BlockExpiration,
) -> Result<(), String> {
	if end_state.is_secret_known_onchain(lock.secrethash) {
		return Err("Lock has been unlocked onchain".to_owned())
	}
	if block_number < lock_expiration_threshold {
		return Err(format!(
			"Current block number ({}) is not larger than \
             lock.expiration + confirmation blocks ({})",
			block_number, lock_expiration_threshold
		))
	}
	Ok(())
}

pub(crate) fn is_lock_pending(end_state: &ChannelEndState, secrethash: SecretHash) -> bool {
	end_state.get_lock(secrethash).is_some()
}

fn is_valid_signature(data: &Bytes, signature: &Signature, signer: Address) -> Result<(), String> {
	match recover(&data.0, &signature.0) {
		Ok(recovered) if recovered == signer => Ok(()),
		Ok(_) => Err("Signature was valid but the expected address does not match".to_owned()),
		Err(e) => Err(format!("Error recovering signature {:?}", e)),
	}
}

/// The balance hash must match the amounts and the signature must recover to `signer`.
pub(crate) fn is_valid_balance_proof_signature(
	balance_proof: &BalanceProofState,
	signer: Address,
) -> Result<(), String> {
	let signature = balance_proof
		.signature
		.as_ref()
		.ok_or_else(|| "Balance proof must be signed".to_owned())?;

	let balance_hash = hash_balance_data(
		balance_proof.transferred_amount,
		balance_proof.locked_amount,
		balance_proof.locksroot,
	)?;
	if balance_hash != balance_proof.balance_hash {
		return Err("Balance hash does not match the balance data".to_owned())
	}

	let signed = pack_balance_proof(
		balance_proof.nonce,
		balance_hash,
		balance_proof.message_hash.unwrap_or_else(MessageHash::zero),
		&balance_proof.canonical_identifier,
		MessageTypeId::BalanceProof,
	);
	is_valid_signature(&signed, signature, signer)
}

/// The token network contract adds both amounts; their sum must fit.
pub(super) fn is_balance_proof_safe_for_onchain_operations(
	balance_proof: &BalanceProofState,
) -> bool {
	balance_proof.transferred_amount.checked_add(balance_proof.locked_amount).is_some()
}

fn is_balance_proof_usable_onchain(
	received: &BalanceProofState,
	channel: &NettingChannelState,
	sender_state: &ChannelEndState,
) -> Result<(), String> {
	if channel.status() != ChannelStatus::Opened {
		return Err("The channel is already closed.".to_owned())
	}
	if received.canonical_identifier != channel.canonical_identifier {
		return Err("Canonical identifier does not match".to_owned())
	}
	if !is_balance_proof_safe_for_onchain_operations(received) {
		return Err("Balance proof total transferred amount would overflow onchain.".to_owned())
	}

	let expected_nonce = sender_state.next_nonce();
	if received.nonce != expected_nonce {
		return Err(format!(
			"Nonce did not change sequentially. Expected: {} got: {}",
			expected_nonce, received.nonce
		))
	}

	is_valid_balance_proof_signature(received, sender_state.address)
}

/// What the sender's next balance proof has to commit to after one lock changed.
struct ExpectedBalanceProof {
	pending_locks: PendingLocksState,
	transferred_amount: TokenAmount,
	locked_amount: TokenAmount,
}

impl ExpectedBalanceProof {
	fn matches(self, received: &BalanceProofState) -> Result<PendingLocksState, String> {
		let locksroot = compute_locksroot(&self.pending_locks);
		if received.locksroot != locksroot {
			return Err(format!(
				"Balance proof's locksroot didn't match. expected {:?} got {:?}",
				locksroot, received.locksroot
			))
		}
		if received.transferred_amount != self.transferred_amount {
			return Err(format!(
				"Balance proof's transferred_amount changed. expected {} got {}",
				self.transferred_amount, received.transferred_amount
			))
		}
		if received.locked_amount != self.locked_amount {
			return Err(format!(
				"Balance proof's locked_amount changed. expected {} got {}",
				self.locked_amount, received.locked_amount
			))
		}
		Ok(self.pending_locks)
	}
}

fn invalid_message(kind: &'static str) -> impl Fn(String) -> String {
	move |reason| format!("Invalid {} message. {}", kind, reason)
}

/// Returns the partner pending locks without the expired lock.
pub(super) fn is_valid_lock_expired(
	channel: &NettingChannelState,
	lock_expired: &ReceiveLockExpired,
	sender_state: &ChannelEndState,
	receiver_state: &ChannelEndState,
	block_number: BlockNumber,
) -> Result<PendingLocksState, String> {
	let invalid = invalid_message("LockExpired");
	let secrethash = lock_expired.secrethash;

	if sender_state.is_secret_known_onchain(secrethash) {
		return Err(invalid("Lock was unlocked on-chain".to_owned()))
	}
	let lock = match sender_state.get_lock(secrethash) {
		Some(lock) => lock,
		None => return Err(invalid(format!("Lock with secrethash {:?} is not known", secrethash))),
	};

	let pending_locks =
		remove_lock(&sender_state.pending_locks, lock).map_err(|e| invalid(e.to_string()))?;
	is_balance_proof_usable_onchain(&lock_expired.balance_proof, channel, sender_state)
		.map_err(&invalid)?;
	is_lock_expired(
		receiver_state,
		lock,
		block_number,
		get_receiver_expiration_threshold(lock.expiration),
	)
	.map_err(&invalid)?;

	let (_, _, transferred_amount, locked_amount) = sender_state.get_current_balanceproof();
	ExpectedBalanceProof {
		pending_locks,
		transferred_amount,
		locked_amount: locked_amount.saturating_sub(lock.amount),
	}
	.matches(&lock_expired.balance_proof)
	.map_err(invalid)
}

/// Returns the sender pending locks with the new lock.
pub(super) fn is_valid_locked_transfer(
	transfer: &LockedTransferState,
	channel: &NettingChannelState,
	sender_state: &ChannelEndState,
	receiver_state: &ChannelEndState,
	block_number: BlockNumber,
) -> Result<PendingLocksState, String> {
	let invalid = invalid_message("LockedTransfer");
	let lock = &transfer.lock;

	// A lock must be claimable on-chain before the channel can settle.
	let latest_expiration = block_number.saturating_add(channel.settle_timeout);
	if lock.expiration > latest_expiration {
		return Err(invalid(format!(
			"Lock expiration {} is after the latest acceptable block {}",
			lock.expiration, latest_expiration
		)))
	}

	is_balance_proof_usable_onchain(&transfer.balance_proof, channel, sender_state)
		.map_err(&invalid)?;

	let pending_locks =
		add_lock(&sender_state.pending_locks, lock).map_err(|e| invalid(e.to_string()))?;
	if pending_locks.locks.len() > MAXIMUM_PENDING_TRANSFERS {
		return Err(invalid(format!(
			"Adding the transfer would exceed the allowed limit of {} pending transfers per \
             channel.",
			MAXIMUM_PENDING_TRANSFERS
		)))
	}

	let (_, _, transferred_amount, locked_amount) = sender_state.get_current_balanceproof();
	let pending_locks = ExpectedBalanceProof {
		pending_locks,
		transferred_amount,
		locked_amount: locked_amount.saturating_add(lock.amount),
	}
	.matches(&transfer.balance_proof)
	.map_err(&invalid)?;

	let distributable = views::channel_distributable(sender_state, receiver_state);
	if lock.amount > distributable {
		return Err(invalid(format!(
			"Lock amount larger than the available distributable. Lock amount: {}, maximum \
             distributable: {}",
			lock.amount, distributable
		)))
	}

	Ok(pending_locks)
}

/// Returns the sender pending locks without the unlocked lock.
pub(super) fn is_valid_unlock(
	channel: &NettingChannelState,
	sender_state: &ChannelEndState,
	unlock: &ReceiveUnlock,
) -> Result<PendingLocksState, String> {
	let invalid = invalid_message("unlock");
	let lock = match sender_state.get_lock(unlock.secrethash) {
		Some(lock) => lock,
		None =>
			return Err(invalid(format!(
				"There is no corresponding lock for {:?}",
				unlock.secrethash
			))),
	};

	let pending_locks =
		remove_lock(&sender_state.pending_locks, lock).map_err(|e| invalid(e.to_string()))?;
	is_balance_proof_usable_onchain(&unlock.balance_proof, channel, sender_state)
		.map_err(&invalid)?;

	// Only the unlocked lock may leave the pending locks, its amount moves to transferred.
	let (_, _, transferred_amount, locked_amount) = sender_state.get_current_balanceproof();
	ExpectedBalanceProof {
		pending_locks,
		transferred_amount: transferred_amount.saturating_add(lock.amount),
		locked_amount: locked_amount.saturating_sub(lock.amount),
	}
	.matches(&unlock.balance_proof)
	.map_err(invalid)
}

fn is_valid_withdraw_signature(
	channel: &NettingChannelState,
	signer: Address,
	participant: Address,
	total_withdraw: TokenAmount,
	expiration: BlockExpiration,
	signature: &Signature,
) -> Result<(), String> {
	let packed =
		pack_withdraw(&channel.canonical_identifier, participant, total_withdraw, expiration);
	is_valid_signature(&packed, signature, signer)
}

/// `Err` unless `nonce` directly follows the partner's current one.
fn expect_next_partner_nonce(channel: &NettingChannelState, nonce: Nonce) -> Result<(), String> {
	let expected = channel.partner_state.next_nonce();
	if nonce != expected {
		return Err(format!("Nonce did not change sequentially. Expected: {}, got {}", expected, nonce))
	}
	Ok(())
}

/// `Err` if `total_withdraw` plus what `other` already withdrew overflows.
fn expect_no_withdraw_overflow(
	total_withdraw: TokenAmount,
	other: &ChannelEndState,
) -> Result<(), String> {
	match total_withdraw.checked_add(other.total_withdraw()) {
		Some(_) => Ok(()),
		None => Err(format!("The new total_withdraw {} will cause an overflow", total_withdraw)),
	}
}

pub(super) fn is_valid_withdraw_expired(
	channel: &NettingChannelState,
	expired: &ReceiveWithdrawExpired,
	withdraw_state: &PendingWithdrawState,
	block_number: BlockNumber,
) -> Result<(), String> {
	if block_number < get_receiver_expiration_threshold(withdraw_state.expiration) {
		return Err(format!(
			"WithdrawExpired for withdraw that has not yet expired {}",
			expired.total_withdraw
		))
	}
	if channel.canonical_identifier != expired.canonical_identifier {
		return Err("Invalid canonical identifier provided in withdraw expired".to_owned())
	}
	if expired.sender != channel.partner_state.address {
		return Err("Invalid sender. Expired withdraw must be sent by the partner".to_owned())
	}
	if expired.total_withdraw != withdraw_state.total_withdraw {
		return Err(format!(
			"WithdrawExpired for local withdraw amounts do not match. \
             Received {}, local amount {}",
			expired.total_withdraw, withdraw_state.total_withdraw
		))
	}
	expect_next_partner_nonce(channel, expired.nonce)
}

pub(super) fn is_valid_withdraw_request(
	channel: &NettingChannelState,
	request: &ReceiveWithdrawRequest,
) -> Result<(), String> {
	let partner = &channel.partner_state;
	expect_no_withdraw_overflow(request.total_withdraw, &channel.our_state)?;

	if channel.canonical_identifier != request.canonical_identifier {
		return Err("Invalid canonical identifier provided in withdraw request".to_owned())
	}
	if request.participant != partner.address {
		return Err("Invalid participant. It must be the partner's address".to_owned())
	}
	if request.sender != partner.address {
		return Err("Invalid sender. Request must be sent by the partner".to_owned())
	}

	let withdraw_amount = match request.total_withdraw.checked_sub(partner.total_withdraw()) {
		Some(amount) if !amount.is_zero() => amount,
		_ => return Err(format!("Total withdraw {} did not increase", request.total_withdraw)),
	};
	let balance = views::channel_balance(partner, &channel.our_state);
	if balance < withdraw_amount {
		return Err(format!(
			"Insufficient balance: {}. Request {} for withdraw",
			balance, withdraw_amount
		))
	}
	expect_next_partner_nonce(channel, request.nonce)?;

	is_valid_withdraw_signature(
		channel,
		request.sender,
		request.participant,
		request.total_withdraw,
		request.expiration,
		&request.signature,
	)
}

pub(super) fn is_valid_withdraw_confirmation(
	channel: &NettingChannelState,
	confirmation: &ReceiveWithdrawConfirmation,
) -> Result<(), String> {
	let ours = &channel.our_state;
	let total_withdraw = confirmation.total_withdraw;

	// The request may have expired on our side while the confirmation was in flight.
	let requested_expiration = ours
		.pending_withdraws
		.get(&total_withdraw)
		.map(|withdraw| withdraw.expiration)
		.or_else(|| {
			ours.expired_withdraws
				.iter()
				.find(|withdraw| withdraw.total_withdraw == total_withdraw)
				.map(|withdraw| withdraw.expiration)
		})
		.ok_or_else(|| {
			format!(
				"Received withdraw confirmation {} was not found in withdraw states",
				total_withdraw
			)
		})?;

	expect_no_withdraw_overflow(total_withdraw, &channel.partner_state)?;
	if channel.canonical_identifier != confirmation.canonical_identifier {
		return Err("Invalid canonical identifier provided in withdraw confirmation".to_owned())
	}
	if confirmation.participant != ours.address {
		return Err("Invalid participant. It must be our address".to_owned())
	}
	if confirmation.sender != channel.partner_state.address {
		return Err("Invalid sender. Confirmation must be sent by the partner".to_owned())
	}
	if total_withdraw != ours.total_withdraw() {
		return Err(format!(
			"Total withdraw confirmation {} does not match our total withdraw {}",
			total_withdraw,
			ours.total_withdraw()
		))
	}
	expect_next_partner_nonce(channel, confirmation.nonce)?;
	if requested_expiration != confirmation.expiration {
		return Err(format!(
			"Invalid expiration {}, withdraw confirmation must use the same expiration as the \
             request otherwise the signature will not match on-chain",
			confirmation.expiration
		))
	}

	is_valid_withdraw_signature(
		channel,
		confirmation.sender,
		confirmation.participant,
		total_withdraw,
		confirmation.expiration,
		&confirmation.signature,
	)
}

pub(super) fn is_valid_action_withdraw(
	channel: &NettingChannelState,
	withdraw: &ActionChannelWithdraw,
) -> Result<(), String> {
	if channel.status() != ChannelStatus::Opened {
		return Err("Invalid withdraw, the channel is not opened".to_owned())
	}

	let withdraw_amount =
		match withdraw.total_withdraw.checked_sub(channel.our_state.total_withdraw()) {
			Some(amount) if !amount.is_zero() => amount,
			_ => return Err(format!("Total withdraw {} did not increase", withdraw.total_withdraw)),
		};
	expect_no_withdraw_overflow(withdraw.total_withdraw, &channel.partner_state)?;

	let balance = views::channel_balance(&channel.our_state, &channel.partner_state);
	if balance < withdraw_amount {
		return Err(format!(
			"Insufficient balance: {}. Requested {} for withdraw",
			balance, withdraw_amount
		))
	}
	Ok(())
}
