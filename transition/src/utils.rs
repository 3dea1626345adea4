use hopline_primitives::types::CanonicalIdentifier;
use hopline_state_machine::{
	machine::chain,
	types::{
		ChainState,
		NettingChannelState,
	},
	views,
};
use hopline_storage::{
	state::StateStorage,
	types::StorageID,
};

use crate::errors::TransitionError;

/// Chain state right after `state_change_identifier` was applied.
///
/// Starts from the closest earlier snapshot and replays the state changes logged since.
pub fn restore_state(
	storage: &StateStorage,
	state_change_identifier: StorageID,
) -> Result<Option<ChainState>, TransitionError> {
	let snapshot = match storage.get_snapshot_before_state_change(state_change_identifier)? {
		Some(snapshot) => snapshot,
		None => return Ok(None),
	};
	let unapplied_state_changes = storage
		.get_state_changes_in_range(snapshot.state_change_identifier, state_change_identifier)?;

	let mut chain_state = snapshot.data;
	for record in unapplied_state_changes {
		chain_state = chain::state_transition(chain_state, record.data)?.new_state;
	}

	Ok(Some(chain_state))
}

/// A channel as it was once `state_change_identifier` was applied.
pub fn channel_state_until_state_change(
	storage: &StateStorage,
	canonical_identifier: &CanonicalIdentifier,
	state_change_identifier: StorageID,
) -> Result<Option<NettingChannelState>, TransitionError> {
	Ok(restore_state(storage, state_change_identifier)?.and_then(|chain_state| {
		views::get_channel_by_canonical_identifier(&chain_state, canonical_identifier).cloned()
	}))
}
