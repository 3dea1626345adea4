use super::{
	channel::{
		self,
		validators::is_lock_expired,
		views::{
			get_safe_initial_expiration,
			get_sender_expiration_threshold,
		},
	},
	routes,
	utils,
};
use crate::{
	constants::CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
	errors::StateTransitionError,
	types::{
		Block,
		BlockNumber,
		ChainState,
		ChannelStatus,
		ContractReceiveSecretReveal,
		ErrorInvalidSecretRequest,
		ErrorPaymentSentFailed,
		ErrorRouteFailed,
		ErrorUnlockFailed,
		Event,
		InitiatorTransferState,
		NettingChannelState,
		PaymentSentSuccess,
		Random,
		ReceiveSecretRequest,
		ReceiveSecretReveal,
		RouteState,
		Secret,
		SendMessageEventInner,
		SendSecretReveal,
		StateChange,
		TokenAmount,
		TransferDescription,
		TransferState,
		UnlockSuccess,
	},
	views,
};

pub(super) type TransitionResult = std::result::Result<InitiatorTransition, StateTransitionError>;

/// A single initiator transfer after a transition. `new_state` is `None` once it is done.
pub struct InitiatorTransition {
	pub new_state: Option<InitiatorTransferState>,
	pub channel: NettingChannelState,
	pub events: Vec<Event>,
}

impl InitiatorTransition {
	fn keep(
		initiator: InitiatorTransferState,
		channel: NettingChannelState,
		events: Vec<Event>,
	) -> Self {
		Self { new_state: Some(initiator), channel, events }
	}

	fn finish(channel: NettingChannelState, events: Vec<Event>) -> Self {
		Self { new_state: None, channel, events }
	}
}

pub(super) fn payment_failed(
	description: &TransferDescription,
	reason: impl Into<String>,
) -> Event {
	ErrorPaymentSentFailed {
		token_network_registry_address: description.token_network_registry_address,
		token_network_address: description.token_network_address,
		identifier: description.payment_identifier,
		target: description.target,
		reason: reason.into(),
	}
	.into()
}

pub(super) fn route_failed(initiator: &InitiatorTransferState) -> Event {
	ErrorRouteFailed {
		secrethash: initiator.transfer.lock.secrethash,
		route: initiator.route.route.clone(),
		token_network_address: initiator.description.token_network_address,
	}
	.into()
}

/// Amount locked for the first hop so that every mediator can take its fee.
fn amount_with_fee(payment_amount: TokenAmount, route_state: &RouteState) -> TokenAmount {
	payment_amount.saturating_add(route_state.estimated_fee)
}

/// Lock the payment on the first usable route of `candidate_route_states`.
///
/// Emits `ErrorPaymentSentFailed` when none of the routes can carry the payment.
pub fn try_new_route(
	chain_state: &mut ChainState,
	candidate_route_states: Vec<RouteState>,
	description: TransferDescription,
) -> Result<(Option<InitiatorTransferState>, Vec<Event>), StateTransitionError> {
	let our_address = chain_state.our_address;
	let usable = |route_state: &RouteState| {
		let partner = route_state.hop_after(our_address)?;
		let channel = views::get_channel_by_token_network_and_partner(
			chain_state,
			description.token_network_address,
			partner,
		)?;
		let amount = amount_with_fee(description.amount, route_state);
		channel
			.is_usable_for_new_transfer(amount, description.lock_timeout)
			.then(|| (route_state.clone(), channel.clone()))
	};

	let (route_state, mut channel) = match candidate_route_states.iter().find_map(usable) {
		Some(selected) => selected,
		None => {
			let failed = payment_failed(&description, "None of the available routes could be used");
			return Ok((None, vec![failed]))
		},
	};

	let expiration = get_safe_initial_expiration(
		chain_state.block_number,
		channel.reveal_timeout,
		description.lock_timeout,
	);
	let send_transfer = channel::send_locked_transfer(
		&mut channel,
		description.initiator,
		description.target,
		amount_with_fee(description.amount, &route_state),
		description.amount,
		expiration,
		description.secrethash,
		chain_state.rng.next_message_identifier(),
		description.payment_identifier,
		routes::prune_route_table(candidate_route_states, &route_state, our_address),
	)?;

	let initiator = InitiatorTransferState {
		route: route_state,
		description,
		channel_identifier: channel.canonical_identifier.channel_identifier,
		transfer: send_transfer.transfer.clone(),
		secret_requested: false,
		transfer_state: TransferState::Pending,
	};
	utils::update_channel(chain_state, channel)?;

	Ok((Some(initiator), vec![send_transfer.into()]))
}

/// Expire our lock once the sender threshold passed. Partner locks keep the task alive.
fn handle_block(
	mut initiator: InitiatorTransferState,
	block: Block,
	mut channel: NettingChannelState,
	rng: &mut Random,
) -> TransitionResult {
	let secrethash = initiator.transfer.lock.secrethash;
	let lock = match channel.our_state.locked.get(&secrethash) {
		Some(lock) => lock.clone(),
		None if channel.partner_state.get_lock(secrethash).is_some() =>
			return Ok(InitiatorTransition::keep(initiator, channel, vec![])),
		None => return Ok(InitiatorTransition::finish(channel, vec![])),
	};

	let threshold = get_sender_expiration_threshold(lock.expiration);
	let expired = is_lock_expired(&channel.our_state, &lock, block.block_number, threshold).is_ok();
	if !expired || initiator.transfer_state == TransferState::Expired {
		return Ok(InitiatorTransition::keep(initiator, channel, vec![]))
	}

	let mut events = channel::send_lock_expired(&mut channel, &lock, rng)?;
	let reason = if initiator.secret_requested {
		"Lock expired, despite receiving secret request"
	} else {
		"Lock expired"
	};
	events.push(payment_failed(&initiator.description, reason));
	events.push(route_failed(&initiator));
	events.push(
		ErrorUnlockFailed {
			identifier: initiator.description.payment_identifier,
			secrethash,
			reason: reason.to_owned(),
		}
		.into(),
	);
	initiator.transfer_state = TransferState::Expired;

	if channel::lock_exists_in_either_channel_side(&channel, secrethash) {
		return Ok(InitiatorTransition::keep(initiator, channel, events))
	}
	Ok(InitiatorTransition::finish(channel, events))
}

/// Reveal the secret to the target once it asked for the right amount in time.
fn handle_receive_secret_request(
	mut initiator: InitiatorTransferState,
	request: ReceiveSecretRequest,
	channel: NettingChannelState,
	rng: &mut Random,
) -> TransitionResult {
	let description = &initiator.description;
	let from_target = request.sender == description.target &&
		request.secrethash == description.secrethash &&
		request.payment_identifier == description.payment_identifier;
	if !from_target || initiator.secret_requested {
		return Ok(InitiatorTransition::keep(initiator, channel, vec![]))
	}

	let lock_expiration = match channel.our_state.get_lock(description.secrethash) {
		Some(lock) => lock.expiration,
		None =>
			return Err(StateTransitionError::Other(
				"Channel does not have the transfer's lock".to_owned(),
			)),
	};

	// Every mediator shortens the lock, the target can never hold a later expiration.
	let event = if request.amount >= description.amount && request.expiration <= lock_expiration {
		let inner = SendMessageEventInner {
			recipient: description.target,
			canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
			message_identifier: rng.next_message_identifier(),
		};
		let reveal = SendSecretReveal {
			inner,
			secret: description.secret.clone(),
			secrethash: description.secrethash,
		};
		initiator.transfer_state = TransferState::SecretRevealed;
		reveal.into()
	} else {
		ErrorInvalidSecretRequest {
			payment_identifier: request.payment_identifier,
			intended_amount: description.amount,
			actual_amount: request.amount,
		}
		.into()
	};
	initiator.secret_requested = true;

	Ok(InitiatorTransition::keep(initiator, channel, vec![event]))
}

/// Send the Unlock for our lock while the channel is open and the lock still valid.
fn unlock_if_claimable(
	initiator: InitiatorTransferState,
	mut channel: NettingChannelState,
	secret: Secret,
	rng: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let lock = &initiator.transfer.lock;
	let expired = is_lock_expired(&channel.our_state, lock, block_number, lock.expiration).is_ok();
	if channel.status() != ChannelStatus::Opened || expired {
		return Ok(InitiatorTransition::keep(initiator, channel, vec![]))
	}

	let description = &initiator.description;
	let secrethash = description.secrethash;
	let unlock = channel::send_unlock(
		&mut channel,
		rng.next_message_identifier(),
		description.payment_identifier,
		secret.clone(),
		secrethash,
		block_number,
	)?;
	let sent = PaymentSentSuccess {
		token_network_registry_address: channel.token_network_registry_address,
		token_network_address: channel.canonical_identifier.token_network_address,
		identifier: description.payment_identifier,
		amount: description.amount,
		target: description.target,
		secret,
		route: initiator.route.route.clone(),
	};
	let unlocked = UnlockSuccess { identifier: description.payment_identifier, secrethash };

	Ok(InitiatorTransition::finish(channel, vec![unlock.into(), sent.into(), unlocked.into()]))
}

fn handle_receive_offchain_secret_reveal(
	initiator: InitiatorTransferState,
	reveal: ReceiveSecretReveal,
	channel: NettingChannelState,
	rng: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	// Only the first hop answers with the secret, the target got it from us.
	let from_partner = reveal.sender == channel.partner_state.address;
	if !from_partner || !utils::is_valid_secret_reveal(&reveal, initiator.description.secrethash) {
		return Ok(InitiatorTransition::keep(initiator, channel, vec![]))
	}

	unlock_if_claimable(initiator, channel, reveal.secret, rng, block_number)
}

fn handle_receive_onchain_secret_reveal(
	initiator: InitiatorTransferState,
	reveal: ContractReceiveSecretReveal,
	mut channel: NettingChannelState,
	rng: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let secrethash = initiator.description.secrethash;
	let registered_in_time = reveal.block_number <= initiator.transfer.lock.expiration;
	if !registered_in_time || !utils::is_valid_onchain_secret_reveal(&reveal, secrethash) {
		return Ok(InitiatorTransition::keep(initiator, channel, vec![]))
	}

	channel::register_onchain_secret(
		&mut channel,
		reveal.secret.clone(),
		secrethash,
		reveal.block_number,
	);
	unlock_if_claimable(initiator, channel, reveal.secret, rng, block_number)
}

pub fn state_transition(
	initiator: InitiatorTransferState,
	state_change: StateChange,
	channel: NettingChannelState,
	rng: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	match state_change {
		StateChange::Block(block) => handle_block(initiator, block, channel, rng),
		StateChange::ReceiveSecretRequest(request) =>
			handle_receive_secret_request(initiator, request, channel, rng),
		StateChange::ReceiveSecretReveal(reveal) =>
			handle_receive_offchain_secret_reveal(initiator, reveal, channel, rng, block_number),
		StateChange::ContractReceiveSecretReveal(reveal) =>
			handle_receive_onchain_secret_reveal(initiator, reveal, channel, rng, block_number),
		_ => Ok(InitiatorTransition::keep(initiator, channel, vec![])),
	}
}
