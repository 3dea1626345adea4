use hopline_primitives::hashing::hash_secret;

use crate::{
	errors::StateTransitionError,
	types::{
		ChainState,
		NettingChannelState,
		ContractReceiveSecretReveal,
		ReceiveSecretReveal,
		SecretHash,
	},
	views,
};

/// Write `channel` back into its token network.
pub(super) fn update_channel(
	chain_state: &mut ChainState,
	channel: NettingChannelState,
) -> Result<(), StateTransitionError> {
	let token_network = views::get_token_network_by_address_mut(
		chain_state,
		channel.canonical_identifier.token_network_address,
	)
	.ok_or_else(|| {
		StateTransitionError::UnknownChannel(channel.canonical_identifier.clone())
	})?;

	token_network
		.channels
		.insert(channel.canonical_identifier.channel_identifier, channel);

	Ok(())
}

pub(super) fn is_valid_secret_reveal(
	state_change: &ReceiveSecretReveal,
	transfer_secrethash: SecretHash,
) -> bool {
	state_change.secrethash == transfer_secrethash &&
		hash_secret(&state_change.secret.0) == transfer_secrethash
}

pub(super) fn is_valid_onchain_secret_reveal(
	state_change: &ContractReceiveSecretReveal,
	transfer_secrethash: SecretHash,
) -> bool {
	state_change.secrethash == transfer_secrethash &&
		hash_secret(&state_change.secret.0) == transfer_secrethash
}
