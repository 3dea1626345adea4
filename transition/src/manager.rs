use std::sync::Arc;

use hopline_primitives::types::{
	Address,
	BlockHash,
	BlockNumber,
	ChainID,
};
use hopline_state_machine::{
	machine::chain,
	types::{
		ChainState,
		Event,
		StateChange,
	},
};
use hopline_storage::{
	state::StateStorage,
	types::StorageID,
};
use parking_lot::RwLock;
use tracing::{
	debug,
	error,
	info,
};

use crate::{
	config::TransitionConfig,
	errors::TransitionError,
};

pub type Result<T> = std::result::Result<T, TransitionError>;

struct ManagedState {
	chain_state: ChainState,
	last_state_change_id: Option<StorageID>,
	/// State changes applied since genesis.
	state_change_count: u32,
	state_changes_since_snapshot: u32,
}

/// Single writer of the chain state.
///
/// Every accepted state change is logged before the new state becomes visible, a rejected one
/// leaves both the log and the state untouched.
pub struct StateManager {
	storage: Arc<StateStorage>,
	snapshot_state_change_count: u32,
	state: RwLock<ManagedState>,
}

impl StateManager {
	/// Restore the latest snapshot and replay the state changes logged after it, or start a
	/// fresh chain state when nothing was stored yet.
	pub fn restore_or_init(
		storage: Arc<StateStorage>,
		config: &TransitionConfig,
		chain_id: ChainID,
		our_address: Address,
		block_number: BlockNumber,
		block_hash: BlockHash,
	) -> Result<Self> {
		let state = match storage.latest_snapshot()? {
			Some(snapshot) => {
				let state_changes = storage
					.get_state_changes_in_range(snapshot.state_change_identifier, StorageID::max())?;
				info!(
					message = "Restoring state",
					snapshot = snapshot.identifier.to_string(),
					unapplied_state_changes = state_changes.len(),
				);

				let mut state = ManagedState {
					chain_state: snapshot.data,
					last_state_change_id: snapshot.state_change_identifier,
					state_change_count: snapshot.statechange_qty,
					state_changes_since_snapshot: 0,
				};
				for record in state_changes {
					state.chain_state =
						chain::state_transition(state.chain_state, record.data)?.new_state;
					state.last_state_change_id = Some(record.identifier);
					state.state_change_count += 1;
					state.state_changes_since_snapshot += 1;
				}

				if state.chain_state.our_address != our_address ||
					state.chain_state.chain_id != chain_id
				{
					return Err(TransitionError::StateMismatch(format!(
						"stored state is for {:?} on {}",
						state.chain_state.our_address, state.chain_state.chain_id
					)))
				}
				state
			},
			None => {
				info!(message = "Initializing state", block_number = block_number.to_string());
				let chain_state = ChainState::new(chain_id, block_number, block_hash, our_address);
				storage.store_snapshot(&chain_state, None, 0)?;
				ManagedState {
					chain_state,
					last_state_change_id: None,
					state_change_count: 0,
					state_changes_since_snapshot: 0,
				}
			},
		};

		storage.log_run(env!("CARGO_PKG_VERSION"))?;

		Ok(Self {
			storage,
			snapshot_state_change_count: config.snapshot_state_change_count.max(1),
			state: RwLock::new(state),
		})
	}

	pub fn storage(&self) -> Arc<StateStorage> {
		self.storage.clone()
	}

	pub fn current_state(&self) -> ChainState {
		self.state.read().chain_state.clone()
	}

	/// Identifier of the last logged state change.
	pub fn last_state_change_id(&self) -> Option<StorageID> {
		self.state.read().last_state_change_id
	}

	/// Apply `state_change`, log it with its events and return the events.
	pub fn transition(&self, state_change: StateChange) -> Result<Vec<Event>> {
		let mut state = self.state.write();

		let iteration = chain::state_transition(state.chain_state.clone(), state_change.clone())?;

		// The new state only becomes visible once the log committed.
		let state_change_id = self.storage.store_transition(&state_change, &iteration.events)?;

		state.chain_state = iteration.new_state;
		state.last_state_change_id = Some(state_change_id);
		state.state_change_count += 1;
		state.state_changes_since_snapshot += 1;

		if state.state_changes_since_snapshot >= self.snapshot_state_change_count {
			match self.storage.store_snapshot(
				&state.chain_state,
				Some(state_change_id),
				state.state_change_count,
			) {
				Ok(snapshot_id) => {
					debug!(
						message = "Stored snapshot",
						snapshot = snapshot_id.to_string(),
						state_change_count = state.state_change_count,
					);
					state.state_changes_since_snapshot = 0;
				},
				Err(e) => error!(message = "Could not store snapshot", error = e.to_string()),
			}
		}

		Ok(iteration.events)
	}

	/// Effects that were emitted but never acknowledged or confirmed.
	///
	/// These have to be executed again after a restart.
	pub fn pending_effects(&self) -> Vec<Event> {
		let state = self.state.read();

		let mut effects: Vec<Event> = state
			.chain_state
			.queues
			.values()
			.flatten()
			.cloned()
			.map(Event::from)
			.collect();
		effects.extend(state.chain_state.pending_transactions.iter().cloned().map(Event::from));
		effects
	}
}
