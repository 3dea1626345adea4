use serde::{
	Deserialize,
	Serialize,
};
pub use web3::types::{
	Address,
	Bytes,
	H160,
	H256,
	U256,
};

mod chain_id;
mod message_type;
mod numeric;
mod signed_amount;

pub use chain_id::*;
pub use message_type::*;
pub use numeric::*;
pub use signed_amount::*;

pub type BalanceHash = H256;

pub type BlockExpiration = U64;

pub type BlockNumber = U64;

pub type BlockHash = H256;

pub type BlockTimeout = U64;

pub type ChannelIdentifier = U256;

pub type EncodedLock = Bytes;

pub type FeeAmount = U256;

pub type LockedAmount = U256;

pub type LockTimeout = U64;

pub type Locksroot = H256;

pub type MessageIdentifier = u64;

pub type MessageHash = H256;

pub type Nonce = U256;

pub type PaymentIdentifier = U64;

pub type ProportionalFeeAmount = U256;

pub type RevealTimeout = U64;

pub type Secret = Bytes;

pub type SecretHash = H256;

pub type SecretRegistryAddress = Address;

pub type Signature = Bytes;

pub type SettleTimeout = U64;

pub type TokenAddress = Address;

pub type TokenNetworkRegistryAddress = Address;

pub type TokenNetworkAddress = Address;

pub type TokenAmount = U256;

pub type TransactionHash = H256;

/// Uniquely names a channel across chains and token networks.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
	pub chain_identifier: ChainID,
	pub token_network_address: TokenNetworkAddress,
	pub channel_identifier: ChannelIdentifier,
}

/// Names an ordered outgoing message queue: one per recipient and channel.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct QueueIdentifier {
	pub recipient: Address,
	pub canonical_identifier: CanonicalIdentifier,
}

impl std::fmt::Display for QueueIdentifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{:?}:{:?}:{}",
			self.recipient,
			self.canonical_identifier.token_network_address,
			self.canonical_identifier.channel_identifier
		)
	}
}
