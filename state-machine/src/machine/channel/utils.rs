#![warn(clippy::missing_docs_in_private_items)]

use hopline_primitives::types::Locksroot;
use web3::signing::keccak256;

use crate::{
	errors::PendingLocksError,
	types::{
		HashTimeLockState,
		PendingLocksState,
	},
};

/// Returns the pending locks with `lock` appended.
pub fn add_lock(
	pending_locks: &PendingLocksState,
	lock: &HashTimeLockState,
) -> Result<PendingLocksState, PendingLocksError> {
	if pending_locks.locks.contains(&lock.encoded) {
		return Err(PendingLocksError::DuplicateLock(lock.secrethash))
	}

	let mut locks = pending_locks.locks.clone();
	locks.push(lock.encoded.clone());
	Ok(PendingLocksState { locks })
}

/// Returns the pending locks without `lock`, keeping the order of the others.
pub fn remove_lock(
	pending_locks: &PendingLocksState,
	lock: &HashTimeLockState,
) -> Result<PendingLocksState, PendingLocksError> {
	if !pending_locks.locks.contains(&lock.encoded) {
		return Err(PendingLocksError::UnknownLock(lock.secrethash))
	}

	let locks = pending_locks
		.locks
		.iter()
		.filter(|encoded| *encoded != &lock.encoded)
		.cloned()
		.collect();
	Ok(PendingLocksState { locks })
}

/// Keccak over the concatenated encoded locks.
pub fn compute_locksroot(pending_locks: &PendingLocksState) -> Locksroot {
	let locks: Vec<&[u8]> = pending_locks.locks.iter().map(|lock| lock.0.as_slice()).collect();
	let hash = keccak256(&locks.concat());
	Locksroot::from_slice(&hash)
}
