//! Feeds state changes through the state machine, logs them and executes the resulting effects.
use std::sync::Arc;

use futures::future::join_all;
use hopline_state_machine::types::{
	Event,
	StateChange,
};
use tracing::{
	info,
	trace,
	warn,
};

use crate::{
	config::ServicesConfig,
	errors::TransitionError,
	events::EventHandler,
	manager::StateManager,
};

/// Transition configuration.
pub mod config;
pub mod errors;
/// Effect execution.
pub mod events;
/// Logged state transitions.
pub mod manager;
/// Path finding and monitoring service notifications.
pub mod services;
#[cfg(test)]
mod tests;
pub mod utils;

/// Dispatches state changes into the state machine and the resulting events to the event
/// handler.
pub struct Transitioner {
	state_manager: Arc<StateManager>,
	event_handler: EventHandler,
	services: ServicesConfig,
}

impl Transitioner {
	pub fn new(
		state_manager: Arc<StateManager>,
		event_handler: EventHandler,
		services: ServicesConfig,
	) -> Self {
		Self { state_manager, event_handler, services }
	}

	pub fn state_manager(&self) -> Arc<StateManager> {
		self.state_manager.clone()
	}

	/// Apply `state_changes` in order, then execute the events of those that were accepted.
	///
	/// A rejected state change stops the batch. The ones applied before it keep their effects.
	pub async fn transition(
		&self,
		state_changes: Vec<StateChange>,
	) -> Result<Vec<Event>, TransitionError> {
		let mut applied = vec![];
		let mut events = vec![];
		let mut rejection = None;

		for state_change in state_changes {
			trace!(message = "Transition", state_change = state_change.type_name());
			match self.state_manager.transition(state_change.clone()) {
				Ok(new_events) => {
					for event in new_events.iter() {
						trace!(
							message = "Resulting event from state change",
							state_change = state_change.type_name(),
							event = event.type_name(),
						);
					}
					events.extend(new_events);
					applied.push(state_change);
				},
				Err(e) => {
					warn!(
						message = "State change rejected",
						state_change = state_change.type_name(),
						error = e.to_string(),
					);
					rejection = Some(e);
					break
				},
			}
		}

		self.trigger_state_change_effects(&applied, &events).await;

		match rejection {
			Some(e) => Err(e),
			None => Ok(events),
		}
	}

	/// Execute again every effect that was not acknowledged before the last shutdown.
	pub async fn replay_pending_effects(&self) {
		let events = self.state_manager.pending_effects();
		info!(message = "Replaying pending effects", count = events.len());
		join_all(events.into_iter().map(|event| self.event_handler.handle_event(event))).await;
	}

	async fn trigger_state_change_effects(&self, state_changes: &[StateChange], events: &[Event]) {
		if state_changes.is_empty() {
			return
		}

		let chain_state = self.state_manager.current_state();
		let service_messages =
			services::service_messages(&self.services, &chain_state, state_changes, events);

		let mut tasks = vec![];
		for event in events.iter().cloned() {
			tasks.push(self.event_handler.handle_event(event));
		}
		join_all(tasks).await;

		join_all(
			service_messages.into_iter().map(|message| self.event_handler.broadcast(message)),
		)
		.await;
	}
}
