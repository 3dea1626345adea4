#![warn(clippy::missing_docs_in_private_items)]

use std::{
	ops::{
		Add,
		Mul,
		Sub,
	},
	str::FromStr,
};

use derive_more::Display;
use web3::types::{
	U256,
	U64 as Word,
};

/// Block heights, timeouts and payment identifiers.
///
/// Plain arithmetic panics on overflow. Code that handles untrusted expirations uses the
/// saturating variants.
#[derive(
	Default, Copy, Clone, Display, Debug, derive_more::Deref, Eq, Ord, PartialEq, PartialOrd, Hash,
)]
pub struct U64(Word);

impl U64 {
	pub fn zero() -> Self {
		U64(Word::zero())
	}

	/// Big endian, left padded to a 32 byte word.
	pub fn to_be_bytes(&self) -> Vec<u8> {
		let mut word = [0u8; 32];
		word[24..].copy_from_slice(&self.0.low_u64().to_be_bytes());
		word.to_vec()
	}

	pub fn saturating_add(self, rhs: U64) -> U64 {
		U64(self.0.saturating_add(rhs.0))
	}

	pub fn saturating_sub(self, rhs: U64) -> U64 {
		U64(self.0.saturating_sub(rhs.0))
	}
}

/// Decimal first, then hex.
impl FromStr for U64 {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Word::from_dec_str(s)
			.ok()
			.or_else(|| Word::from_str(s).ok())
			.map(U64)
			.ok_or(())
	}
}

macro_rules! arithmetic {
	($($op_trait:ident::$method:ident => $op:tt),*) => {
		$(
			impl $op_trait<U64> for U64 {
				type Output = U64;

				fn $method(self, rhs: U64) -> U64 {
					U64(self.0 $op rhs.0)
				}
			}

			impl $op_trait<u64> for U64 {
				type Output = U64;

				fn $method(self, rhs: u64) -> U64 {
					U64(self.0 $op Word::from(rhs))
				}
			}
		)*
	};
}

arithmetic!(Add::add => +, Sub::sub => -, Mul::mul => *);

macro_rules! from_integer {
	($($int:ty),*) => {
		$(
			impl From<$int> for U64 {
				fn from(value: $int) -> Self {
					U64(Word::from(value as u64))
				}
			}
		)*
	};
}

from_integer!(u64, u32, i32);

impl From<Word> for U64 {
	fn from(word: Word) -> Self {
		U64(word)
	}
}

impl From<U64> for Word {
	fn from(value: U64) -> Self {
		value.0
	}
}

impl From<U64> for u64 {
	fn from(value: U64) -> Self {
		value.0.low_u64()
	}
}

impl From<U64> for U256 {
	fn from(value: U64) -> Self {
		U256::from(value.0.low_u64())
	}
}
