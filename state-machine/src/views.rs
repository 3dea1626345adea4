#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use hopline_primitives::types::{
	Address,
	CanonicalIdentifier,
	SecretHash,
	TokenAmount,
	TokenNetworkAddress,
};

use crate::types::{
	ChainState,
	ChannelEndState,
	NettingChannelState,
	ChannelStatus,
	TokenNetworkState,
	TransferTask,
};

/// Returns token network by address if found.
pub fn get_token_network_by_address(
	chain_state: &ChainState,
	token_network_address: TokenNetworkAddress,
) -> Option<&TokenNetworkState> {
	chain_state
		.registries
		.values()
		.find_map(|registry| registry.token_networks.get(&token_network_address))
}

/// Mutable counterpart of `get_token_network_by_address`.
pub fn get_token_network_by_address_mut(
	chain_state: &mut ChainState,
	token_network_address: TokenNetworkAddress,
) -> Option<&mut TokenNetworkState> {
	chain_state
		.registries
		.values_mut()
		.find_map(|registry| {
			registry.token_networks.get_mut(&token_network_address)
		})
}

/// Returns all channel states.
pub fn get_channels(chain_state: &ChainState) -> Vec<NettingChannelState> {
	chain_state
		.registries
		.values()
		.flat_map(|registry| registry.token_networks.values())
		.flat_map(|token_network| token_network.channels.values())
		.cloned()
		.collect()
}

/// Returns channel state by canonical identifier if found.
pub fn get_channel_by_canonical_identifier<'a>(
	chain_state: &'a ChainState,
	canonical_identifier: &CanonicalIdentifier,
) -> Option<&'a NettingChannelState> {
	get_token_network_by_address(chain_state, canonical_identifier.token_network_address)?
		.channels
		.get(&canonical_identifier.channel_identifier)
}

/// Mutable counterpart of `get_channel_by_canonical_identifier`.
pub fn get_channel_by_canonical_identifier_mut<'a>(
	chain_state: &'a mut ChainState,
	canonical_identifier: &CanonicalIdentifier,
) -> Option<&'a mut NettingChannelState> {
	get_token_network_by_address_mut(chain_state, canonical_identifier.token_network_address)?
		.channels
		.get_mut(&canonical_identifier.channel_identifier)
}

/// Returns the open channel with `partner_address` in a token network, if any.
pub fn get_channel_by_token_network_and_partner(
	chain_state: &ChainState,
	token_network_address: TokenNetworkAddress,
	partner_address: Address,
) -> Option<&NettingChannelState> {
	let token_network = get_token_network_by_address(chain_state, token_network_address)?;
	token_network
		.channels_by_partner
		.get(&partner_address)?
		.iter()
		.filter_map(|id| token_network.channels.get(id))
		.find(|channel| channel.status() == ChannelStatus::Opened)
		.or_else(|| {
			token_network
				.channels
				.values()
				.find(|channel| channel.partner_state.address == partner_address)
		})
}

/// Returns a map of (token network, partner address) to channels.
pub fn get_addresses_to_channels(
	chain_state: &ChainState,
) -> HashMap<(TokenNetworkAddress, Address), &NettingChannelState> {
	let mut channels = HashMap::new();

	for token_network_registry in chain_state.registries.values() {
		for token_network in token_network_registry.token_networks.values()
		{
			for channel in token_network.channels.values() {
				channels.insert((token_network.address, channel.partner_state.address), channel);
			}
		}
	}

	channels
}

/// Returns the payment task of `secrethash`.
pub fn get_transfer_task(chain_state: &ChainState, secrethash: SecretHash) -> Option<&TransferTask> {
	chain_state.payment_mapping.tasks.get(&secrethash)
}

/// Tokens `sender` can still spend in the channel: deposit minus withdraws, adjusted by what
/// each side transferred.
pub fn channel_balance(sender: &ChannelEndState, receiver: &ChannelEndState) -> TokenAmount {
	sender
		.contract_balance
		.saturating_add(receiver.transferred_amount())
		.saturating_sub(sender.total_withdraw())
		.saturating_sub(sender.transferred_amount())
}

/// Tokens `sender` can put in a new lock.
pub fn channel_distributable(sender: &ChannelEndState, receiver: &ChannelEndState) -> TokenAmount {
	let (_, _, transferred_amount, locked_amount) = sender.get_current_balanceproof();
	let distributable = channel_balance(sender, receiver).saturating_sub(sender.locked_amount());
	let overflow_limit = TokenAmount::MAX
		.saturating_sub(transferred_amount)
		.saturating_sub(locked_amount);
	TokenAmount::min(overflow_limit, distributable)
}
