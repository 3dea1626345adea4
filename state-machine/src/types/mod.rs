#![warn(clippy::missing_docs_in_private_items)]

mod event;
mod state;
mod state_change;

pub use hopline_primitives::types::*;
use rand_chacha::{
	rand_core::{
		RngCore,
		SeedableRng,
	},
	ChaChaRng,
};
use serde::{
	Deserialize,
	Serialize,
};

pub use self::{
	event::*,
	state::*,
	state_change::*,
};

/// Deterministic pseudo random generator carried in the chain state.
///
/// Its state is part of every snapshot so that replaying the same state changes draws the same
/// numbers.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Random(ChaChaRng);

impl Random {
	pub fn new() -> Self {
		Self(ChaChaRng::seed_from_u64(0))
	}

	pub fn next(&mut self) -> u32 {
		self.0.next_u32()
	}

	/// Draw a message identifier.
	pub fn next_message_identifier(&mut self) -> MessageIdentifier {
		((self.0.next_u32() as u64) << 32) | self.0.next_u32() as u64
	}
}

impl Default for Random {
	fn default() -> Self {
		Self::new()
	}
}

/// Outcome of an on-chain transaction.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TransactionResult {
	Success,
	Failure,
}

/// Block bounds and result of an on-chain transaction.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TransactionExecutionStatus {
	pub started_block_number: Option<BlockNumber>,
	pub finished_block_number: Option<BlockNumber>,
	pub result: Option<TransactionResult>,
}

impl TransactionExecutionStatus {
	/// Sent at `block_number`, not mined yet.
	pub fn started(block_number: BlockNumber) -> Self {
		Self { started_block_number: Some(block_number), finished_block_number: None, result: None }
	}

	/// Record of a transaction confirmed at `block_number`.
	pub fn confirmed(block_number: BlockNumber) -> Self {
		Self {
			started_block_number: Some(block_number),
			finished_block_number: Some(block_number),
			result: Some(TransactionResult::Success),
		}
	}
}
