#![warn(clippy::missing_docs_in_private_items)]

use std::str::FromStr;

use derive_more::Display;
use web3::types::U256;

/// Identifies the chain a channel lives on.
#[derive(Copy, Clone, Display, Debug, Eq, Hash, PartialEq)]
pub enum ChainID {
	Mainnet,
	Goerli,
	Sepolia,
	#[display(fmt = "Private({})", _0)]
	Private(U256),
}

impl From<u64> for ChainID {
	fn from(value: u64) -> Self {
		match value {
			1 => ChainID::Mainnet,
			5 => ChainID::Goerli,
			11155111 => ChainID::Sepolia,
			id => ChainID::Private(id.into()),
		}
	}
}

impl From<ChainID> for U256 {
	fn from(val: ChainID) -> Self {
		match val {
			ChainID::Mainnet => 1u64.into(),
			ChainID::Goerli => 5u64.into(),
			ChainID::Sepolia => 11155111u64.into(),
			ChainID::Private(id) => id,
		}
	}
}

impl From<U256> for ChainID {
	fn from(value: U256) -> Self {
		if value > U256::from(u64::MAX) {
			return ChainID::Private(value)
		}
		value.low_u64().into()
	}
}

impl FromStr for ChainID {
	type Err = ();

	fn from_str(s: &str) -> Result<ChainID, ()> {
		Ok(U256::from_dec_str(s).map_err(|_| ())?.into())
	}
}
