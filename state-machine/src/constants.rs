use crate::types::{
	Address,
	CanonicalIdentifier,
	ChainID,
	ChannelIdentifier,
};

/// Default number of blocks a node waits before acting on a block.
pub const DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS: u64 = 5;

pub const DEFAULT_REVEAL_TIMEOUT: u64 = 50;

pub const DEFAULT_SETTLE_TIMEOUT: u64 = 500;

/// Blocks a mediator shaves off the payer lock expiration when forwarding.
pub const MEDIATION_LOCK_EXPIRATION_DELTA: u64 = 1;

/// Upper bound of pending locks per channel side, bounded by the on-chain unlock gas cost.
pub const MAXIMUM_PENDING_TRANSFERS: usize = 160;

/// Proportional fees are expressed in parts per million.
pub const PROPORTIONAL_FEE_DENOMINATOR: u64 = 1_000_000;

/// Queue of messages that are not ordered with the balance proofs of a channel.
pub const CANONICAL_IDENTIFIER_UNORDERED_QUEUE: CanonicalIdentifier = CanonicalIdentifier {
	chain_identifier: ChainID::Mainnet,
	token_network_address: Address::zero(),
	channel_identifier: ChannelIdentifier::zero(),
};
