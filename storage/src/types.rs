use std::convert::TryFrom;

use hopline_state_machine::types::{
	ChainState,
	Event,
	StateChange,
};
use ulid::Ulid;

use crate::errors::StorageError;

/// Identifier of a stored row.
///
/// Identifiers are ULIDs handed out in increasing order, so comparing two of them compares the
/// order in which their rows were written.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StorageID {
	pub(crate) inner: Ulid,
}

impl StorageID {
	/// Sorts after every identifier the storage hands out.
	pub fn max() -> Self {
		Self { inner: Ulid::from(u128::MAX) }
	}
}

impl std::fmt::Display for StorageID {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.inner)
	}
}

impl From<u128> for StorageID {
	fn from(id: u128) -> Self {
		Self { inner: Ulid::from(id) }
	}
}

impl From<Ulid> for StorageID {
	fn from(id: Ulid) -> Self {
		Self { inner: id }
	}
}

impl From<StorageID> for String {
	fn from(id: StorageID) -> Self {
		id.inner.to_string()
	}
}

impl TryFrom<String> for StorageID {
	type Error = StorageError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Ok(Self { inner: Ulid::from_string(&value).map_err(StorageError::ID)? })
	}
}

#[derive(Clone, Debug)]
pub struct StateChangeRecord {
	pub identifier: StorageID,
	pub data: StateChange,
}

#[derive(Clone, Debug)]
pub struct EventRecord {
	pub identifier: StorageID,
	pub state_change_identifier: StorageID,
	pub data: Event,
}

#[derive(Clone, Debug)]
pub struct SnapshotRecord {
	pub identifier: StorageID,
	/// Number of state changes applied to produce the snapshot.
	pub statechange_qty: u32,
	/// Last state change applied, `None` for the state before the first one.
	pub state_change_identifier: Option<StorageID>,
	pub data: ChainState,
}
