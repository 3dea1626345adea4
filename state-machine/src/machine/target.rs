use super::{
	channel,
	secret_registry,
	utils::{
		self,
		update_channel,
	},
};
use crate::{
	constants::CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
	errors::StateTransitionError,
	types::{
		ActionInitTarget,
		Block,
		BlockHash,
		BlockNumber,
		ChainState,
		ContractReceiveSecretReveal,
		ErrorUnlockClaimFailed,
		Event,
		NettingChannelState,
		PaymentReceivedSuccess,
		ReceiveLockExpired,
		ReceiveSecretReveal,
		ReceiveUnlock,
		SendMessageEventInner,
		SendSecretRequest,
		SendSecretReveal,
		StateChange,
		TargetState,
		TargetTransferState,
	},
	views,
};

pub(super) type TransitionResult = Result<TargetTransition, StateTransitionError>;

#[derive(Debug)]
pub struct TargetTransition {
	pub new_state: Option<TargetTransferState>,
	pub chain_state: ChainState,
	pub events: Vec<Event>,
}

impl TargetTransition {
	fn keep(chain_state: ChainState, target: TargetTransferState, events: Vec<Event>) -> Self {
		Self { new_state: Some(target), chain_state, events }
	}

	fn finish(chain_state: ChainState, events: Vec<Event>) -> Self {
		Self { new_state: None, chain_state, events }
	}
}

fn claim_failed(target: &TargetTransferState) -> Event {
	ErrorUnlockClaimFailed {
		identifier: target.transfer.payment_identifier,
		secrethash: target.transfer.lock.secrethash,
		reason: "Lock expired".to_owned(),
	}
	.into()
}

/// Register the secret on-chain once the lock is too close to its expiration to wait for the
/// Unlock.
fn register_if_in_danger(
	target: &mut TargetTransferState,
	channel: &NettingChannelState,
	block_number: BlockNumber,
	block_hash: BlockHash,
) -> Vec<Event> {
	let lock = &target.transfer.lock;
	if target.state == TargetState::OnchainSecretReveal ||
		lock.is_safe_to_wait(channel.reveal_timeout, block_number)
	{
		return vec![]
	}

	let partner = &channel.partner_state;
	let secret = match partner.get_secret(lock.secrethash) {
		Some(secret) if partner.is_secret_known_offchain(lock.secrethash) => secret,
		_ => return vec![],
	};

	let expiration = lock.expiration;
	target.state = TargetState::OnchainSecretReveal;
	secret_registry::events_for_onchain_secretreveal(channel, secret, expiration, block_hash)
}

fn handle_init(mut chain_state: ChainState, init: ActionInitTarget) -> TransitionResult {
	let transfer = init.transfer;
	if transfer.lock.secrethash.is_zero() {
		return Err(StateTransitionError::invalid("ActionInitTarget", "Secrethash must not be zero"))
	}

	let canonical_identifier = transfer.balance_proof.canonical_identifier.clone();
	let mut channel =
		views::get_channel_by_canonical_identifier(&chain_state, &canonical_identifier)
			.cloned()
			.ok_or(StateTransitionError::UnknownChannel(canonical_identifier))?;

	let mut events = channel::handle_receive_locked_transfer(
		&mut channel,
		&transfer,
		chain_state.block_number,
	)?;
	if events.is_empty() {
		return Ok(TargetTransition::finish(chain_state, events))
	}
	let safe_to_wait = transfer.lock.is_safe_to_wait(channel.reveal_timeout, chain_state.block_number);
	update_channel(&mut chain_state, channel)?;

	// The lock stays registered either way so the partner's next balance proofs validate.
	let state = if safe_to_wait && transfer.lock.amount >= transfer.payment_amount {
		let inner = SendMessageEventInner {
			recipient: transfer.initiator,
			canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
			message_identifier: chain_state.rng.next_message_identifier(),
		};
		events.push(
			SendSecretRequest {
				inner,
				payment_identifier: transfer.payment_identifier,
				amount: transfer.lock.amount,
				expiration: transfer.lock.expiration,
				secrethash: transfer.lock.secrethash,
			}
			.into(),
		);
		TargetState::SecretRequest
	} else {
		TargetState::Holding
	};

	let target = TargetTransferState { from_hop: init.from_hop, transfer, secret: None, state };
	Ok(TargetTransition::keep(chain_state, target, events))
}

fn handle_block(
	chain_state: ChainState,
	mut target: TargetTransferState,
	channel: NettingChannelState,
	block: Block,
) -> TransitionResult {
	let lock = &target.transfer.lock;
	let expired = channel::validators::is_lock_expired(
		&channel.partner_state,
		lock,
		block.block_number,
		channel::views::get_receiver_expiration_threshold(lock.expiration),
	)
	.is_ok();
	let secret_known = channel.partner_state.is_secret_known(lock.secrethash);

	let events = if expired {
		if target.state == TargetState::Expired {
			vec![]
		} else {
			target.state = TargetState::Expired;
			vec![claim_failed(&target)]
		}
	} else if secret_known {
		register_if_in_danger(&mut target, &channel, block.block_number, block.block_hash)
	} else {
		vec![]
	};

	Ok(TargetTransition::keep(chain_state, target, events))
}

fn handle_offchain_secret_reveal(
	mut chain_state: ChainState,
	mut target: TargetTransferState,
	mut channel: NettingChannelState,
	reveal: ReceiveSecretReveal,
) -> TransitionResult {
	let lock = &target.transfer.lock;
	let expired = channel::validators::is_lock_expired(
		&channel.partner_state,
		lock,
		chain_state.block_number,
		lock.expiration,
	)
	.is_ok();
	if target.secret.is_some() || expired || !utils::is_valid_secret_reveal(&reveal, lock.secrethash)
	{
		return Ok(TargetTransition::keep(chain_state, target, vec![]))
	}

	channel::register_offchain_secret(&mut channel, reveal.secret.clone(), reveal.secrethash);
	update_channel(&mut chain_state, channel)?;
	target.state = TargetState::OffchainSecretReveal;
	target.secret = Some(reveal.secret.clone());

	// The secret goes back to the payer, who will answer with the Unlock.
	let inner = SendMessageEventInner {
		recipient: target.from_hop.node_address,
		canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
		message_identifier: chain_state.rng.next_message_identifier(),
	};
	let reveal = SendSecretReveal { inner, secret: reveal.secret, secrethash: reveal.secrethash };
	Ok(TargetTransition::keep(chain_state, target, vec![reveal.into()]))
}

fn handle_onchain_secret_reveal(
	mut chain_state: ChainState,
	mut target: TargetTransferState,
	mut channel: NettingChannelState,
	reveal: ContractReceiveSecretReveal,
) -> TransitionResult {
	if !utils::is_valid_onchain_secret_reveal(&reveal, target.transfer.lock.secrethash) {
		return Ok(TargetTransition::keep(chain_state, target, vec![]))
	}

	channel::register_onchain_secret(
		&mut channel,
		reveal.secret.clone(),
		reveal.secrethash,
		reveal.block_number,
	);
	update_channel(&mut chain_state, channel)?;
	target.state = TargetState::OnchainSecretReveal;
	target.secret = Some(reveal.secret);

	Ok(TargetTransition::keep(chain_state, target, vec![]))
}

/// Apply the partner's LockExpired. The task is over once the lock is gone.
fn handle_lock_expired(
	mut chain_state: ChainState,
	target: TargetTransferState,
	mut channel: NettingChannelState,
	lock_expired: ReceiveLockExpired,
) -> TransitionResult {
	let mut events = channel::handle_receive_lock_expired(
		&mut channel,
		&lock_expired,
		chain_state.block_number,
	)?;
	let lock_removed = channel.partner_state.get_lock(target.transfer.lock.secrethash).is_none();
	update_channel(&mut chain_state, channel)?;

	if !lock_removed {
		return Ok(TargetTransition::keep(chain_state, target, events))
	}
	if target.state != TargetState::Expired {
		events.push(claim_failed(&target));
	}

	Ok(TargetTransition::finish(chain_state, events))
}

fn handle_unlock(
	mut chain_state: ChainState,
	target: TargetTransferState,
	mut channel: NettingChannelState,
	unlock: ReceiveUnlock,
) -> TransitionResult {
	let mut events = channel::handle_unlock(&mut channel, &unlock)?;
	if events.is_empty() {
		return Ok(TargetTransition::keep(chain_state, target, events))
	}

	let transfer = &target.transfer;
	events.push(
		PaymentReceivedSuccess {
			token_network_registry_address: channel.token_network_registry_address,
			token_network_address: channel.canonical_identifier.token_network_address,
			identifier: transfer.payment_identifier,
			amount: transfer.lock.amount,
			initiator: transfer.initiator,
		}
		.into(),
	);
	update_channel(&mut chain_state, channel)?;

	Ok(TargetTransition::finish(chain_state, events))
}

/// State machine for the target node of a mediated transfer.
pub fn state_transition(
	chain_state: ChainState,
	target_state: Option<TargetTransferState>,
	state_change: StateChange,
) -> TransitionResult {
	let (target, state_change) = match (target_state, state_change) {
		(None, StateChange::ActionInitTarget(init)) => return handle_init(chain_state, init),
		(Some(target), StateChange::ActionInitTarget(_)) =>
			return Ok(TargetTransition::keep(chain_state, target, vec![])),
		(None, state_change) =>
			return Err(StateTransitionError::invalid(
				state_change.type_name(),
				"Target state change without a target state",
			)),
		(Some(target), state_change) => (target, state_change),
	};

	let channel = views::get_channel_by_canonical_identifier(
		&chain_state,
		&target.transfer.balance_proof.canonical_identifier,
	)
	.cloned();
	let channel = match channel {
		Some(channel) => channel,
		None => return Ok(TargetTransition::keep(chain_state, target, vec![])),
	};

	match state_change {
		StateChange::Block(block) => handle_block(chain_state, target, channel, block),
		StateChange::ReceiveSecretReveal(reveal) =>
			handle_offchain_secret_reveal(chain_state, target, channel, reveal),
		StateChange::ContractReceiveSecretReveal(reveal) =>
			handle_onchain_secret_reveal(chain_state, target, channel, reveal),
		StateChange::ReceiveUnlock(unlock) => handle_unlock(chain_state, target, channel, unlock),
		StateChange::ReceiveLockExpired(lock_expired) =>
			handle_lock_expired(chain_state, target, channel, lock_expired),
		_ => Ok(TargetTransition::keep(chain_state, target, vec![])),
	}
}
