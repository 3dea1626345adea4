use std::{
	cmp::Ordering,
	ops::Neg,
};

use serde::{
	Deserialize,
	Serialize,
};
use web3::types::U256;

/// A token amount that may be negative.
///
/// Channel balances are computed as differences of unsigned on-chain amounts, so the value seen
/// from the receiving side of a channel can drop below zero. Zero is always non-negative.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SignedAmount {
	negative: bool,
	magnitude: U256,
}

impl SignedAmount {
	pub fn zero() -> Self {
		Self::default()
	}

	/// Returns `lhs - rhs`.
	pub fn difference(lhs: U256, rhs: U256) -> Self {
		if lhs >= rhs {
			Self { negative: false, magnitude: lhs - rhs }
		} else {
			Self { negative: true, magnitude: rhs - lhs }
		}
	}

	pub fn is_negative(&self) -> bool {
		self.negative
	}

	pub fn magnitude(&self) -> U256 {
		self.magnitude
	}

	/// The amount as an unsigned value, or `None` if negative.
	pub fn to_unsigned(&self) -> Option<U256> {
		if self.negative {
			None
		} else {
			Some(self.magnitude)
		}
	}
}

impl From<U256> for SignedAmount {
	fn from(magnitude: U256) -> Self {
		Self { negative: false, magnitude }
	}
}

impl Neg for SignedAmount {
	type Output = SignedAmount;

	fn neg(self) -> Self::Output {
		if self.magnitude.is_zero() {
			return self
		}
		Self { negative: !self.negative, magnitude: self.magnitude }
	}
}

impl PartialOrd for SignedAmount {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for SignedAmount {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self.negative, other.negative) {
			(false, true) => Ordering::Greater,
			(true, false) => Ordering::Less,
			(false, false) => self.magnitude.cmp(&other.magnitude),
			(true, true) => other.magnitude.cmp(&self.magnitude),
		}
	}
}
