#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use crate::types::{
	Address,
	ChannelIdentifier,
	NettingChannelState,
	RouteState,
	TokenNetworkAddress,
};

/// Routes handed to the next hop: the ones through the same next hop, without our own address.
pub fn prune_route_table(
	route_states: Vec<RouteState>,
	selected_route: &RouteState,
	our_address: Address,
) -> Vec<RouteState> {
	let selected_hop = selected_route.hop_after(our_address);

	route_states
		.into_iter()
		.filter(|route_state| route_state.hop_after(our_address) == selected_hop)
		.filter_map(|route_state| {
			let position = route_state.route.iter().position(|hop| hop == &our_address)?;
			Some(RouteState {
				route: route_state.route[position + 1..].to_vec(),
				estimated_fee: route_state.estimated_fee,
			})
		})
		.collect()
}

/// Keep the routes whose next hop has a channel with us that is not blacklisted.
pub fn filter_acceptable_routes(
	route_states: Vec<RouteState>,
	blacklisted_channel_ids: &[ChannelIdentifier],
	addresses_to_channels: &HashMap<(TokenNetworkAddress, Address), &NettingChannelState>,
	token_network_address: TokenNetworkAddress,
	our_address: Address,
) -> Vec<RouteState> {
	route_states
		.into_iter()
		.filter(|route| {
			let next_hop = match route.hop_after(our_address) {
				Some(next_hop) => next_hop,
				None => return false,
			};
			match addresses_to_channels.get(&(token_network_address, next_hop)) {
				Some(channel) => !blacklisted_channel_ids
					.contains(&channel.canonical_identifier.channel_identifier),
				None => false,
			}
		})
		.collect()
}
