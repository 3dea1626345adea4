use hopline_messages::messages::{
	PFSCapacityUpdate,
	PFSFeeUpdate,
	RequestMonitoring,
	ServiceMessage,
};
use hopline_primitives::types::CanonicalIdentifier;
use hopline_state_machine::{
	types::{
		ChainState,
		Event,
		StateChange,
	},
	views,
};
use tracing::{
	debug,
	warn,
};

use crate::config::{
	RoutingMode,
	ServicesConfig,
};

fn push_unique(canonical_identifiers: &mut Vec<CanonicalIdentifier>, id: &CanonicalIdentifier) {
	if !canonical_identifiers.contains(id) {
		canonical_identifiers.push(id.clone());
	}
}

/// Channels whose capacity moved: locks were added, unlocked or expired.
fn channels_with_new_capacity(
	state_changes: &[StateChange],
	events: &[Event],
) -> Vec<CanonicalIdentifier> {
	let mut canonical_identifiers = vec![];
	for state_change in state_changes {
		let canonical_identifier = match state_change {
			StateChange::ActionInitMediator(inner) => &inner.balance_proof.canonical_identifier,
			StateChange::ActionInitTarget(inner) => &inner.balance_proof.canonical_identifier,
			StateChange::ReceiveUnlock(inner) => &inner.balance_proof.canonical_identifier,
			StateChange::ReceiveLockExpired(inner) => &inner.balance_proof.canonical_identifier,
			_ => continue,
		};
		push_unique(&mut canonical_identifiers, canonical_identifier);
	}
	for event in events {
		let canonical_identifier = match event {
			Event::SendLockedTransfer(inner) => &inner.canonical_identifier,
			Event::SendUnlock(inner) => &inner.canonical_identifier,
			Event::SendLockExpired(inner) => &inner.canonical_identifier,
			_ => continue,
		};
		push_unique(&mut canonical_identifiers, canonical_identifier);
	}
	canonical_identifiers
}

/// Channels whose deposit or withdraw changed, which is what the fee schedule depends on.
fn channels_with_new_fees(
	state_changes: &[StateChange],
	events: &[Event],
) -> Vec<CanonicalIdentifier> {
	let mut canonical_identifiers = vec![];
	for state_change in state_changes {
		let canonical_identifier = match state_change {
			StateChange::ContractReceiveChannelDeposit(inner) => &inner.canonical_identifier,
			StateChange::ContractReceiveChannelWithdraw(inner) => &inner.canonical_identifier,
			StateChange::ReceiveWithdrawRequest(inner) => &inner.canonical_identifier,
			StateChange::ReceiveWithdrawExpired(inner) => &inner.canonical_identifier,
			_ => continue,
		};
		push_unique(&mut canonical_identifiers, canonical_identifier);
	}
	for event in events {
		let canonical_identifier = match event {
			Event::SendWithdrawRequest(inner) => &inner.canonical_identifier,
			Event::SendWithdrawExpired(inner) => &inner.canonical_identifier,
			_ => continue,
		};
		push_unique(&mut canonical_identifiers, canonical_identifier);
	}
	canonical_identifiers
}

/// Capacity updates for the path finding services, sent only in PFS routing mode.
pub fn capacity_updates(
	config: &ServicesConfig,
	chain_state: &ChainState,
	state_changes: &[StateChange],
	events: &[Event],
) -> Vec<ServiceMessage> {
	if config.routing_mode != RoutingMode::PFS {
		return vec![]
	}

	channels_with_new_capacity(state_changes, events)
		.iter()
		.filter_map(|canonical_identifier| {
			views::get_channel_by_canonical_identifier(chain_state, canonical_identifier)
		})
		.map(|channel| PFSCapacityUpdate::from(channel).into())
		.collect()
}

/// Fee updates for the path finding services, sent only in PFS routing mode.
pub fn fee_updates(
	config: &ServicesConfig,
	chain_state: &ChainState,
	state_changes: &[StateChange],
	events: &[Event],
) -> Vec<ServiceMessage> {
	if config.routing_mode != RoutingMode::PFS {
		return vec![]
	}

	channels_with_new_fees(state_changes, events)
		.iter()
		.filter_map(|canonical_identifier| {
			views::get_channel_by_canonical_identifier(chain_state, canonical_identifier)
		})
		.map(|channel| PFSFeeUpdate::from(channel).into())
		.collect()
}

/// Monitoring requests for every partner balance proof received in `state_changes`.
///
/// Channels where we hold less than the configured threshold are skipped.
pub fn monitoring_requests(
	config: &ServicesConfig,
	chain_state: &ChainState,
	state_changes: &[StateChange],
) -> Vec<ServiceMessage> {
	if !config.monitoring_enabled {
		return vec![]
	}

	let mut requests = vec![];
	for state_change in state_changes {
		let balance_proof = match state_change {
			StateChange::ActionInitMediator(inner) => &inner.balance_proof,
			StateChange::ActionInitTarget(inner) => &inner.balance_proof,
			StateChange::ReceiveUnlock(inner) => &inner.balance_proof,
			StateChange::ReceiveLockExpired(inner) => &inner.balance_proof,
			_ => continue,
		};
		let canonical_identifier = &balance_proof.canonical_identifier;

		let channel =
			match views::get_channel_by_canonical_identifier(chain_state, canonical_identifier) {
				Some(channel) => channel,
				None => continue,
			};
		// Only proofs the channel actually accepted are worth defending.
		if channel.partner_state.balance_proof.as_ref() != Some(balance_proof) {
			continue
		}

		let our_balance =
			views::channel_balance(&channel.our_state, &channel.partner_state);
		let threshold = config.monitoring_threshold(&canonical_identifier.token_network_address);
		if our_balance < threshold {
			warn!(
				message = "Skipping monitoring request, balance below threshold",
				channel = canonical_identifier.channel_identifier.to_string(),
				balance = our_balance.to_string(),
				threshold = threshold.to_string(),
			);
			continue
		}

		match RequestMonitoring::from_balance_proof(
			balance_proof.clone(),
			chain_state.our_address,
			config.monitoring_reward,
			config.monitoring_service_address,
		) {
			Ok(request) => requests.push(request.into()),
			Err(e) => debug!(message = "No monitoring request", error = e.to_string()),
		}
	}
	requests
}

/// Every service notification derived from a batch of transitions.
pub fn service_messages(
	config: &ServicesConfig,
	chain_state: &ChainState,
	state_changes: &[StateChange],
	events: &[Event],
) -> Vec<ServiceMessage> {
	let mut messages = capacity_updates(config, chain_state, state_changes, events);
	messages.extend(fee_updates(config, chain_state, state_changes, events));
	messages.extend(monitoring_requests(config, chain_state, state_changes));
	messages
}
