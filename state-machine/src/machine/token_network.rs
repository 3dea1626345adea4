use super::channel;
use crate::{
	errors::StateTransitionError,
	types::{
		BlockHash,
		BlockNumber,
		CanonicalIdentifier,
		ChannelIdentifier,
		ContractReceiveChannelOpened,
		Event,
		Random,
		StateChange,
		TokenNetworkState,
	},
};

type TransitionResult = std::result::Result<TokenNetworkTransition, StateTransitionError>;

#[derive(Debug)]
pub struct TokenNetworkTransition {
	pub new_state: TokenNetworkState,
	pub events: Vec<Event>,
}

fn subdispatch_to_channel_by_id(
	mut token_network_state: TokenNetworkState,
	canonical_identifier: &CanonicalIdentifier,
	state_change: StateChange,
	block_number: BlockNumber,
	block_hash: BlockHash,
	rng: &mut Random,
) -> TransitionResult {
	let channel_identifier = canonical_identifier.channel_identifier;
	let channel =
		match token_network_state.channels.get(&channel_identifier) {
			Some(channel) => channel.clone(),
			None => return Err(StateTransitionError::UnknownChannel(canonical_identifier.clone())),
		};
	let partner_address = channel.partner_state.address;

	let result = channel::state_transition(
		channel,
		state_change,
		block_number,
		block_hash,
		rng,
	)?;
	match result.new_state {
		Some(channel) => {
			token_network_state
				.channels
				.insert(channel_identifier, channel);
		},
		None => {
			token_network_state.channels.remove(&channel_identifier);
			if let Some(channel_identifiers) =
				token_network_state.channels_by_partner.get_mut(&partner_address)
			{
				channel_identifiers.retain(|identifier| *identifier != channel_identifier);
				if channel_identifiers.is_empty() {
					token_network_state.channels_by_partner.remove(&partner_address);
				}
			}
		},
	}

	Ok(TokenNetworkTransition { new_state: token_network_state, events: result.events })
}

/// Hand a new block to every channel, in channel identifier order.
fn handle_block(
	mut token_network_state: TokenNetworkState,
	state_change: StateChange,
	block_number: BlockNumber,
	block_hash: BlockHash,
	rng: &mut Random,
) -> TransitionResult {
	let mut channel_identifiers: Vec<ChannelIdentifier> =
		token_network_state.channels.keys().cloned().collect();
	channel_identifiers.sort();

	let mut events = vec![];
	for channel_identifier in channel_identifiers {
		let canonical_identifier = match token_network_state
			.channels
			.get(&channel_identifier)
		{
			Some(channel) => channel.canonical_identifier.clone(),
			None => continue,
		};
		let transition = subdispatch_to_channel_by_id(
			token_network_state,
			&canonical_identifier,
			state_change.clone(),
			block_number,
			block_hash,
			rng,
		)?;
		token_network_state = transition.new_state;
		events.extend(transition.events);
	}

	Ok(TokenNetworkTransition { new_state: token_network_state, events })
}

fn handle_contract_receive_channel_opened(
	mut token_network_state: TokenNetworkState,
	state_change: ContractReceiveChannelOpened,
) -> TransitionResult {
	let channel = state_change.channel;
	let channel_identifier = channel.canonical_identifier.channel_identifier;

	if token_network_state.channels.contains_key(&channel_identifier) {
		return Ok(TokenNetworkTransition { new_state: token_network_state, events: vec![] })
	}

	let channel_identifiers = token_network_state
		.channels_by_partner
		.entry(channel.partner_state.address)
		.or_default();
	channel_identifiers.push(channel_identifier);

	token_network_state
		.channels
		.insert(channel_identifier, channel);

	Ok(TokenNetworkTransition { new_state: token_network_state, events: vec![] })
}

pub fn state_transition(
	token_network_state: TokenNetworkState,
	state_change: StateChange,
	block_number: BlockNumber,
	block_hash: BlockHash,
	rng: &mut Random,
) -> TransitionResult {
	let state_change = match state_change {
		StateChange::Block(_) =>
			return handle_block(
				token_network_state,
				state_change,
				block_number,
				block_hash,
				rng,
			),
		StateChange::ContractReceiveChannelOpened(inner) =>
			return handle_contract_receive_channel_opened(token_network_state, inner),
		state_change => state_change,
	};

	let canonical_identifier = match &state_change {
		StateChange::ActionChannelClose(inner) => inner.canonical_identifier.clone(),
		StateChange::ActionChannelWithdraw(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveChannelClosed(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveChannelDeposit(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveChannelWithdraw(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveChannelSettled(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveUpdateTransfer(inner) => inner.canonical_identifier.clone(),
		StateChange::ContractReceiveChannelBatchUnlock(inner) =>
			inner.canonical_identifier.clone(),
		StateChange::ReceiveWithdrawRequest(inner) => inner.canonical_identifier.clone(),
		StateChange::ReceiveWithdrawConfirmation(inner) => inner.canonical_identifier.clone(),
		StateChange::ReceiveWithdrawExpired(inner) => inner.canonical_identifier.clone(),
		state_change =>
			return Err(StateTransitionError::invalid(
				state_change.type_name(),
				"Not a token network state change",
			)),
	};

	subdispatch_to_channel_by_id(
		token_network_state,
		&canonical_identifier,
		state_change,
		block_number,
		block_hash,
		rng,
	)
}
