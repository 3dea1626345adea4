use crate::types::{
	BlockExpiration,
	BlockHash,
	ContractSendEventInner,
	ContractSendSecretReveal,
	Event,
	NettingChannelState,
	Secret,
};

/// Register `secret` on-chain so the lock can be claimed even if the payer never sends an Unlock.
///
/// Nothing to do once the channel is settled.
pub fn events_for_onchain_secretreveal(
	channel: &NettingChannelState,
	secret: Secret,
	expiration: BlockExpiration,
	block_hash: BlockHash,
) -> Vec<Event> {
	if !channel.status().is_unsettled() {
		return vec![]
	}

	let inner = ContractSendEventInner { triggered_by_blockhash: block_hash };
	vec![ContractSendSecretReveal { inner, expiration, secret }.into()]
}
