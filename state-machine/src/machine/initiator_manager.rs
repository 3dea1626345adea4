use std::collections::HashMap;

use super::{
	initiator::{
		self,
		payment_failed,
		route_failed,
	},
	routes,
	utils,
};
use crate::{
	errors::StateTransitionError,
	types::{
		ActionInitInitiator,
		ActionTransferReroute,
		CanonicalIdentifier,
		ChainState,
		ErrorUnlockFailed,
		Event,
		InitiatorPaymentState,
		InitiatorTransferState,
		SecretHash,
		StateChange,
		TransferDescription,
		TransferState,
	},
	views,
};

pub(super) type TransitionResult =
	std::result::Result<InitiatorManagerTransition, StateTransitionError>;

/// A payment after a transition. `new_state` is `None` once no transfer is left.
pub struct InitiatorManagerTransition {
	pub new_state: Option<InitiatorPaymentState>,
	pub chain_state: ChainState,
	pub events: Vec<Event>,
}

impl InitiatorManagerTransition {
	fn unchanged(chain_state: ChainState, payment_state: InitiatorPaymentState) -> Self {
		Self { new_state: Some(payment_state), chain_state, events: vec![] }
	}

	/// A payment without transfers is over.
	fn clear_if_finalized(mut self) -> Self {
		if matches!(&self.new_state, Some(payment_state) if payment_state.transfers.is_empty()) {
			self.new_state = None;
		}
		self
	}
}

/// Only transfers whose secret was never handed out can be given up.
fn can_cancel(initiator: &InitiatorTransferState) -> bool {
	initiator.transfer_state == TransferState::Pending
}

/// The payment's transfers, oldest first.
fn transfers_in_order(payment_state: &InitiatorPaymentState) -> Vec<InitiatorTransferState> {
	let mut transfers: Vec<InitiatorTransferState> =
		payment_state.transfers.values().cloned().collect();
	transfers.sort_by_key(|initiator| initiator.transfer.message_identifier);
	transfers
}

/// Blacklist the channel of `initiator` for this payment and mark the transfer canceled.
fn cancel_current_route(
	payment_state: &mut InitiatorPaymentState,
	mut initiator: InitiatorTransferState,
) -> Vec<Event> {
	payment_state.cancelled.push(initiator.channel_identifier);

	let events = vec![
		ErrorUnlockFailed {
			identifier: initiator.description.payment_identifier,
			secrethash: initiator.description.secrethash,
			reason: "route was canceled".to_owned(),
		}
		.into(),
		route_failed(&initiator),
	];

	initiator.transfer_state = TransferState::Canceled;
	payment_state.transfers.insert(initiator.transfer.lock.secrethash, initiator);
	events
}

fn subdispatch_to_initiator_transfer(
	mut chain_state: ChainState,
	mut payment_state: InitiatorPaymentState,
	initiator: InitiatorTransferState,
	state_change: StateChange,
) -> TransitionResult {
	let canonical_identifier = CanonicalIdentifier {
		chain_identifier: chain_state.chain_id,
		token_network_address: initiator.description.token_network_address,
		channel_identifier: initiator.channel_identifier,
	};
	let channel = views::get_channel_by_canonical_identifier(&chain_state, &canonical_identifier)
		.cloned();
	let channel = match channel {
		Some(channel) => channel,
		None => return Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state)),
	};

	let secrethash = initiator.transfer.lock.secrethash;
	let block_number = chain_state.block_number;
	let transition = initiator::state_transition(
		initiator,
		state_change,
		channel,
		&mut chain_state.rng,
		block_number,
	)?;
	utils::update_channel(&mut chain_state, transition.channel)?;

	match transition.new_state {
		Some(initiator) => payment_state.transfers.insert(secrethash, initiator),
		None => payment_state.transfers.remove(&secrethash),
	};

	Ok(InitiatorManagerTransition {
		new_state: Some(payment_state),
		chain_state,
		events: transition.events,
	})
}

fn handle_block(
	mut chain_state: ChainState,
	mut payment_state: InitiatorPaymentState,
	state_change: StateChange,
) -> TransitionResult {
	let mut events = vec![];
	for initiator in transfers_in_order(&payment_state) {
		let transition = subdispatch_to_initiator_transfer(
			chain_state,
			payment_state,
			initiator,
			state_change.clone(),
		)?;
		chain_state = transition.chain_state;
		payment_state = transition.new_state.ok_or_else(|| {
			StateTransitionError::InvariantViolation(
				"Sub dispatch must return a payment state".to_owned(),
			)
		})?;
		events.extend(transition.events);
	}

	Ok(InitiatorManagerTransition { new_state: Some(payment_state), chain_state, events })
}

fn handle_init_initiator(mut chain_state: ChainState, init: ActionInitInitiator) -> TransitionResult {
	let (initiator, events) =
		initiator::try_new_route(&mut chain_state, init.routes.clone(), init.transfer)?;

	let new_state = initiator.map(|initiator| {
		let secrethash = initiator.transfer.lock.secrethash;
		InitiatorPaymentState {
			routes: init.routes,
			transfers: HashMap::from([(secrethash, initiator)]),
			cancelled: vec![],
		}
	});

	Ok(InitiatorManagerTransition { new_state, chain_state, events })
}

fn handle_action_cancel_payment(
	chain_state: ChainState,
	mut payment_state: InitiatorPaymentState,
) -> TransitionResult {
	let mut events = vec![];
	for initiator in transfers_in_order(&payment_state).into_iter().filter(can_cancel) {
		let failed = payment_failed(&initiator.description, "user canceled payment");
		events.extend(cancel_current_route(&mut payment_state, initiator));
		events.push(failed);
	}

	Ok(InitiatorManagerTransition { new_state: Some(payment_state), chain_state, events })
}

/// Give up the current route and lock the payment again with a fresh secret.
///
/// The old lock stays in its channel until it expires.
fn handle_action_transfer_reroute(
	mut chain_state: ChainState,
	mut payment_state: InitiatorPaymentState,
	reroute: ActionTransferReroute,
) -> TransitionResult {
	let current = payment_state.transfers.get(&reroute.transfer.lock.secrethash);
	let initiator = match current {
		Some(initiator) if can_cancel(initiator) => initiator.clone(),
		_ => return Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state)),
	};
	if payment_state.transfers.contains_key(&reroute.secrethash) {
		return Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state))
	}

	let description = TransferDescription {
		secret: reroute.secret,
		secrethash: reroute.secrethash,
		..initiator.description.clone()
	};
	let mut events = cancel_current_route(&mut payment_state, initiator);

	let route_states = routes::filter_acceptable_routes(
		payment_state.routes.clone(),
		&payment_state.cancelled,
		&views::get_addresses_to_channels(&chain_state),
		description.token_network_address,
		chain_state.our_address,
	);
	let (rerouted, route_events) =
		initiator::try_new_route(&mut chain_state, route_states, description)?;
	events.extend(route_events);

	if let Some(rerouted) = rerouted {
		payment_state.transfers.insert(rerouted.transfer.lock.secrethash, rerouted);
	}

	Ok(InitiatorManagerTransition { new_state: Some(payment_state), chain_state, events })
}

/// Dispatch a secret-related state change to the transfer of `secrethash`.
///
/// Once that transfer is unlocked every other transfer of the payment is cancelled.
fn handle_secret_state_change(
	chain_state: ChainState,
	payment_state: InitiatorPaymentState,
	secrethash: SecretHash,
	state_change: StateChange,
	skip_canceled: bool,
) -> TransitionResult {
	let initiator = match payment_state.transfers.get(&secrethash) {
		Some(initiator)
			if !(skip_canceled && initiator.transfer_state == TransferState::Canceled) =>
			initiator.clone(),
		_ => return Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state)),
	};

	let mut transition =
		subdispatch_to_initiator_transfer(chain_state, payment_state, initiator, state_change)?;

	let emitted = !transition.events.is_empty();
	if let Some(payment_state) = transition.new_state.as_mut() {
		if emitted && !payment_state.transfers.contains_key(&secrethash) {
			for other in payment_state.transfers.values_mut() {
				other.transfer_state = TransferState::Canceled;
			}
		}
	}

	Ok(transition)
}

pub fn state_transition(
	chain_state: ChainState,
	payment_state: Option<InitiatorPaymentState>,
	state_change: StateChange,
) -> TransitionResult {
	let (payment_state, state_change) = match (payment_state, state_change) {
		(None, StateChange::ActionInitInitiator(init)) =>
			return handle_init_initiator(chain_state, init)
				.map(InitiatorManagerTransition::clear_if_finalized),
		(Some(payment_state), StateChange::ActionInitInitiator(_)) =>
			return Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state)),
		(None, state_change) =>
			return Err(StateTransitionError::invalid(
				state_change.type_name(),
				"Initiator state change without a payment state",
			)),
		(Some(payment_state), state_change) => (payment_state, state_change),
	};

	let transition = match state_change {
		StateChange::Block(_) => handle_block(chain_state, payment_state, state_change),
		StateChange::ActionTransferReroute(reroute) =>
			handle_action_transfer_reroute(chain_state, payment_state, reroute),
		StateChange::ActionCancelPayment(_) => handle_action_cancel_payment(chain_state, payment_state),
		StateChange::ReceiveSecretRequest(request) => handle_secret_state_change(
			chain_state,
			payment_state,
			request.secrethash,
			request.into(),
			true,
		),
		StateChange::ReceiveSecretReveal(reveal) => handle_secret_state_change(
			chain_state,
			payment_state,
			reveal.secrethash,
			reveal.into(),
			false,
		),
		StateChange::ContractReceiveSecretReveal(reveal) => handle_secret_state_change(
			chain_state,
			payment_state,
			reveal.secrethash,
			reveal.into(),
			true,
		),
		_ => Ok(InitiatorManagerTransition::unchanged(chain_state, payment_state)),
	}?;

	Ok(transition.clear_if_finalized())
}
