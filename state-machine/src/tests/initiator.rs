use crate::{
	tests::factories::{
		event_names,
		route,
		payment_description,
		ChainStateBuilder,
		Generator,
		Keyring,
		MediatedNetwork,
		MEDIATION_FEE,
		PAYMENT_AMOUNT,
		PAYMENT_IDENTIFIER,
	},
	types::{
		ActionCancelPayment,
		ActionInitInitiator,
		ActionTransferReroute,
		Address,
		BlockExpiration,
		BlockHash,
		BlockNumber,
		ChainReceipt,
		ChainState,
		ChannelIdentifier,
		ContractReceiveSecretReveal,
		Event,
		InitiatorPaymentState,
		PaymentIdentifier,
		ReceiveSecretRequest,
		ReceiveSecretReveal,
		SecretHash,
		TokenAmount,
		TransactionHash,
		TransferState,
		TransferTask,
	},
	views,
};

fn payment_state(chain_state: &ChainState, secrethash: SecretHash) -> InitiatorPaymentState {
	match views::get_transfer_task(chain_state, secrethash) {
		Some(TransferTask::Initiator(task)) => task.payment_state.clone(),
		task => panic!("Expected an initiator task, got {:?}", task),
	}
}

fn secret_request(network: &MediatedNetwork, amount: u64) -> ReceiveSecretRequest {
	ReceiveSecretRequest {
		sender: Keyring::Charlie.address(),
		payment_identifier: PaymentIdentifier::from(PAYMENT_IDENTIFIER),
		amount: TokenAmount::from(amount),
		expiration: BlockExpiration::from(10u64),
		secrethash: network.secrethash,
	}
}

#[test]
fn test_initiator_locks_amount_with_fee() {
	let mut network = MediatedNetwork::new();

	let transfer = network.initiate();

	assert_eq!(transfer.lock.amount, TokenAmount::from(PAYMENT_AMOUNT + MEDIATION_FEE));
	assert_eq!(transfer.payment_amount, TokenAmount::from(PAYMENT_AMOUNT));
	assert_eq!(transfer.lock.expiration, BlockExpiration::from(11u64));
	assert_eq!(transfer.route_states[0].route, vec![
		Keyring::Bob.address(),
		Keyring::Charlie.address()
	]);

	let channel = views::get_channel_by_canonical_identifier(
		&network.alice,
		&transfer.balance_proof.canonical_identifier,
	)
	.expect("Channel should exist");
	assert_eq!(channel.our_state.locked_amount(), transfer.lock.amount);
	assert_eq!(
		views::channel_distributable(&channel.our_state, &channel.partner_state),
		TokenAmount::from(900)
	);

	let state = payment_state(&network.alice, network.secrethash);
	assert_eq!(state.transfers[&network.secrethash].transfer_state, TransferState::Pending);
}

#[test]
fn test_initiator_without_usable_route_fails() {
	let mut chain_state = ChainStateBuilder::new()
		.with_token_network_registry()
		.with_token_network()
		.with_channels(vec![(
			(Keyring::Alice.address(), TokenAmount::from(10)),
			(Keyring::Bob.address(), TokenAmount::zero()),
		)])
		.build()
		.chain_state;
	let (secret, secrethash) = Generator::secret_pair();

	for routes in [
		vec![route(&[Keyring::Alice, Keyring::Dave, Keyring::Charlie], 0)],
		vec![route(&[Keyring::Alice, Keyring::Bob, Keyring::Charlie], 0)],
	] {
		let state_change = ActionInitInitiator {
			transfer: payment_description(
				Keyring::Alice,
				Keyring::Charlie,
				100,
				PAYMENT_IDENTIFIER,
				secret.clone(),
				secrethash,
			),
			routes,
		};
		let result = crate::machine::chain::state_transition(chain_state, state_change.into())
			.expect("Failure is reported as an event");

		assert_eq!(event_names(&result.events), vec!["ErrorPaymentSentFailed"]);
		assert!(views::get_transfer_task(&result.new_state, secrethash).is_none());
		chain_state = result.new_state;
	}
}

#[test]
fn test_initiator_ignores_duplicate_init() {
	let mut network = MediatedNetwork::new();
	network.initiate();
	let alice = network.alice.clone();

	let state_change = ActionInitInitiator {
		transfer: payment_description(
			Keyring::Alice,
			Keyring::Charlie,
			PAYMENT_AMOUNT,
			PAYMENT_IDENTIFIER,
			network.secret.clone(),
			network.secrethash,
		),
		routes: vec![route(&[Keyring::Alice, Keyring::Bob, Keyring::Charlie], MEDIATION_FEE)],
	};
	let events = network.dispatch(Keyring::Alice, state_change);

	assert!(events.is_empty());
	assert_eq!(network.alice, alice);
}

#[test]
fn test_initiator_rejects_secret_request_for_less_than_payment() {
	let mut network = MediatedNetwork::new();
	network.initiate();

	let events = network.dispatch(Keyring::Alice, secret_request(&network, PAYMENT_AMOUNT - 1));
	assert_eq!(event_names(&events), vec!["ErrorInvalidSecretRequest"]);
	match &events[0] {
		Event::ErrorInvalidSecretRequest(error) => {
			assert_eq!(error.intended_amount, TokenAmount::from(PAYMENT_AMOUNT));
			assert_eq!(error.actual_amount, TokenAmount::from(PAYMENT_AMOUNT - 1));
		},
		event => panic!("Unexpected event {:?}", event),
	}

	// Only the first request is answered.
	let events = network.dispatch(Keyring::Alice, secret_request(&network, PAYMENT_AMOUNT));
	assert!(events.is_empty());
}

#[test]
fn test_initiator_ignores_secret_request_from_others() {
	let mut network = MediatedNetwork::new();
	network.initiate();

	let request = ReceiveSecretRequest {
		sender: Keyring::Bob.address(),
		..secret_request(&network, PAYMENT_AMOUNT)
	};
	assert!(network.dispatch(Keyring::Alice, request).is_empty());

	let request = ReceiveSecretRequest {
		expiration: BlockExpiration::from(12u64),
		..secret_request(&network, PAYMENT_AMOUNT)
	};
	let events = network.dispatch(Keyring::Alice, request);
	assert_eq!(event_names(&events), vec!["ErrorInvalidSecretRequest"]);
}

#[test]
fn test_initiator_ignores_reveal_from_non_partner() {
	let mut network = MediatedNetwork::new();
	network.initiate();
	network.dispatch(Keyring::Alice, secret_request(&network, PAYMENT_AMOUNT));

	let events = network.dispatch(
		Keyring::Alice,
		ReceiveSecretReveal {
			sender: Keyring::Charlie.address(),
			secret: network.secret.clone(),
			secrethash: network.secrethash,
		},
	);

	assert!(events.is_empty());
	assert!(views::get_transfer_task(&network.alice, network.secrethash).is_some());
}

#[test]
fn test_initiator_unlocks_on_onchain_secret() {
	let mut network = MediatedNetwork::new();
	network.initiate();

	let events = network.dispatch(
		Keyring::Alice,
		ContractReceiveSecretReveal {
			receipt: ChainReceipt {
				transaction_hash: Some(TransactionHash::random()),
				block_number: BlockNumber::from(3u64),
				block_hash: BlockHash::random(),
			},
			secret_registry_address: Address::random(),
			secrethash: network.secrethash,
			secret: network.secret.clone(),
		},
	);

	assert_eq!(event_names(&events), vec!["SendUnlock", "PaymentSentSuccess", "UnlockSuccess"]);
	assert!(views::get_transfer_task(&network.alice, network.secrethash).is_none());
}

#[test]
fn test_cancel_payment_before_secret_is_revealed() {
	let mut network = MediatedNetwork::new();
	network.initiate();

	let cancel = ActionCancelPayment { payment_identifier: PaymentIdentifier::from(PAYMENT_IDENTIFIER) };
	let events = network.dispatch(Keyring::Alice, cancel.clone());

	assert_eq!(
		event_names(&events),
		vec!["ErrorUnlockFailed", "ErrorRouteFailed", "ErrorPaymentSentFailed"]
	);
	let state = payment_state(&network.alice, network.secrethash);
	assert_eq!(state.transfers[&network.secrethash].transfer_state, TransferState::Canceled);
	assert_eq!(state.cancelled, vec![ChannelIdentifier::from(1)]);

	// A cancelled transfer no longer hands out its secret.
	let events = network.dispatch(Keyring::Alice, secret_request(&network, PAYMENT_AMOUNT));
	assert!(events.is_empty());
}

#[test]
fn test_cancel_payment_after_secret_is_revealed_is_noop() {
	let mut network = MediatedNetwork::new();
	network.initiate();
	let events = network.dispatch(Keyring::Alice, secret_request(&network, PAYMENT_AMOUNT));
	assert_eq!(event_names(&events), vec!["SendSecretReveal"]);

	let events = network.dispatch(
		Keyring::Alice,
		ActionCancelPayment { payment_identifier: PaymentIdentifier::from(PAYMENT_IDENTIFIER) },
	);

	assert!(events.is_empty());
	let state = payment_state(&network.alice, network.secrethash);
	assert_eq!(
		state.transfers[&network.secrethash].transfer_state,
		TransferState::SecretRevealed
	);
}

#[test]
fn test_reroute_uses_another_channel_with_new_secret() {
	let mut chain_state = ChainStateBuilder::new()
		.with_token_network_registry()
		.with_token_network()
		.with_channels(vec![
			(
				(Keyring::Alice.address(), TokenAmount::from(1000)),
				(Keyring::Bob.address(), TokenAmount::zero()),
			),
			(
				(Keyring::Alice.address(), TokenAmount::from(1000)),
				(Keyring::Dave.address(), TokenAmount::zero()),
			),
		])
		.build()
		.chain_state;
	let (secret, secrethash) = Generator::secret_pair();

	let state_change = ActionInitInitiator {
		transfer: payment_description(
			Keyring::Alice,
			Keyring::Charlie,
			100,
			PAYMENT_IDENTIFIER,
			secret,
			secrethash,
		),
		routes: vec![
			route(&[Keyring::Alice, Keyring::Bob, Keyring::Charlie], 0),
			route(&[Keyring::Alice, Keyring::Dave, Keyring::Charlie], 0),
		],
	};
	let result = crate::machine::chain::state_transition(chain_state, state_change.into())
		.expect("Init should succeed");
	let transfer = match &result.events[0] {
		Event::SendLockedTransfer(send) => {
			assert_eq!(send.recipient, Keyring::Bob.address());
			send.transfer.clone()
		},
		event => panic!("Unexpected event {:?}", event),
	};
	chain_state = result.new_state;

	let (new_secret, new_secrethash) = Generator::secret_pair();
	let reroute =
		ActionTransferReroute { transfer, secret: new_secret, secrethash: new_secrethash };
	let result = crate::machine::chain::state_transition(chain_state, reroute.into())
		.expect("Reroute should succeed");

	assert_eq!(
		event_names(&result.events),
		vec!["ErrorUnlockFailed", "ErrorRouteFailed", "SendLockedTransfer"]
	);
	match &result.events[2] {
		Event::SendLockedTransfer(send) => {
			assert_eq!(send.recipient, Keyring::Dave.address());
			assert_eq!(send.transfer.lock.secrethash, new_secrethash);
		},
		event => panic!("Unexpected event {:?}", event),
	}

	let state = payment_state(&result.new_state, new_secrethash);
	assert_eq!(state.transfers.len(), 2);
	assert_eq!(state.transfers[&secrethash].transfer_state, TransferState::Canceled);
	assert_eq!(payment_state(&result.new_state, secrethash), state);
}
