use std::sync::Arc;

use hopline_state_machine::types::{
	ActionChannelClose,
	ActionChannelWithdraw,
	Event,
	ReceiveProcessed,
	TokenAmount,
};
use web3::signing::Key;

use super::{
	canonical_identifier,
	channel_setup,
	key,
	received_transfer,
	state_manager,
	storage,
	RecordingExecutor,
};
use crate::{
	config::{
		RoutingMode,
		ServicesConfig,
		TransitionConfig,
	},
	errors::TransitionError,
	events::EventHandler,
	Transitioner,
};

fn transitioner(
	config: &TransitionConfig,
	seed: u8,
) -> (Transitioner, Arc<RecordingExecutor>) {
	let our_key = key(seed);
	let executor = Arc::new(RecordingExecutor::default());
	let manager = state_manager(storage(), config, our_key.address());
	let handler = EventHandler::new(our_key, executor.clone());
	(Transitioner::new(Arc::new(manager), handler, config.services.clone()), executor)
}

fn private_routing() -> TransitionConfig {
	TransitionConfig {
		services: ServicesConfig { routing_mode: RoutingMode::Private, ..Default::default() },
		..Default::default()
	}
}

#[tokio::test]
async fn test_messages_are_signed_and_sent() {
	let alice = key(1);
	let bob = key(2);
	let (transitioner, executor) = transitioner(&private_routing(), 2);
	transitioner
		.transition(channel_setup(bob.address(), alice.address()))
		.await
		.expect("Setup should be accepted");

	let events = transitioner
		.transition(vec![received_transfer(&alice, bob.address())])
		.await
		.expect("Transfer should be accepted");
	assert_eq!(events.len(), 2);

	let messages = executor.messages.lock();
	let kinds: Vec<&str> = messages.iter().map(|message| message.type_name()).collect();
	assert_eq!(kinds.len(), 2);
	assert!(kinds.contains(&"Processed"));
	assert!(kinds.contains(&"SecretRequest"));
	for message in messages.iter() {
		assert_eq!(message.recipient, alice.address());
		assert_eq!(message.inner.sender().expect("Signer should be recovered"), bob.address());
	}
	assert!(executor.broadcasts.lock().is_empty());
}

#[tokio::test]
async fn test_transactions_are_handed_to_the_executor() {
	let alice = key(1);
	let bob = key(2);
	let (transitioner, executor) = transitioner(&private_routing(), 2);
	transitioner
		.transition(channel_setup(bob.address(), alice.address()))
		.await
		.expect("Setup should be accepted");

	transitioner
		.transition(vec![ActionChannelClose { canonical_identifier: canonical_identifier() }.into()])
		.await
		.expect("Close should be accepted");

	assert_eq!(executor.transactions.lock().len(), 1);
}

#[tokio::test]
async fn test_accepted_changes_keep_their_effects_when_a_later_one_fails() {
	let alice = key(1);
	let bob = key(2);
	let (transitioner, executor) = transitioner(&private_routing(), 2);

	let mut state_changes = channel_setup(bob.address(), alice.address());
	state_changes.push(received_transfer(&alice, bob.address()));
	let unknown_channel = {
		let mut canonical_identifier = canonical_identifier();
		canonical_identifier.token_network_address = alice.address();
		ActionChannelClose { canonical_identifier }
	};
	state_changes.push(unknown_channel.into());

	let result = transitioner.transition(state_changes).await;

	assert!(matches!(result, Err(TransitionError::StateTransition(_))));
	assert_eq!(executor.messages.lock().len(), 2);
	assert!(executor.transactions.lock().is_empty());
}

#[tokio::test]
async fn test_pending_messages_are_sent_again_until_acknowledged() {
	let alice = key(1);
	let bob = key(2);
	let (transitioner, executor) = transitioner(&private_routing(), 2);
	transitioner
		.transition(channel_setup(bob.address(), alice.address()))
		.await
		.expect("Setup should be accepted");
	transitioner
		.transition(vec![received_transfer(&alice, bob.address())])
		.await
		.expect("Transfer should be accepted");
	executor.messages.lock().clear();

	transitioner.replay_pending_effects().await;
	let replayed: Vec<(u64, &'static str)> = executor
		.messages
		.lock()
		.iter()
		.map(|message| (message.message_identifier, message.type_name()))
		.collect();
	assert_eq!(replayed.len(), 2);

	let secret_request_id = replayed
		.iter()
		.find(|(_, kind)| *kind == "SecretRequest")
		.map(|(message_identifier, _)| *message_identifier)
		.expect("Secret request should be pending");
	transitioner
		.transition(vec![ReceiveProcessed {
			sender: alice.address(),
			message_identifier: secret_request_id,
		}
		.into()])
		.await
		.expect("Processed should be accepted");
	executor.messages.lock().clear();

	transitioner.replay_pending_effects().await;
	let still_pending: Vec<&'static str> =
		executor.messages.lock().iter().map(|message| message.type_name()).collect();
	assert!(!still_pending.contains(&"SecretRequest"));
}

#[tokio::test]
async fn test_errors_are_notified() {
	let alice = key(1);
	let bob = key(2);
	let (transitioner, executor) = transitioner(&private_routing(), 2);
	transitioner
		.transition(channel_setup(bob.address(), alice.address()))
		.await
		.expect("Setup should be accepted");

	// We never deposited, there is nothing to withdraw.
	transitioner
		.transition(vec![ActionChannelWithdraw {
			canonical_identifier: canonical_identifier(),
			total_withdraw: TokenAmount::from(1000u64),
		}
		.into()])
		.await
		.expect("Withdraw should be handled");

	let notifications: Vec<&str> =
		executor.notifications.lock().iter().map(Event::type_name).collect();
	assert_eq!(notifications, vec!["ErrorInvalidActionWithdraw"]);
	assert!(executor.messages.lock().is_empty());
}
