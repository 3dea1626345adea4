use hopline_primitives::{
	hashing::hash_secret,
	types::{
		Address,
		BlockExpiration,
		BlockHash,
		BlockNumber,
		ChainID,
		PaymentIdentifier,
		RevealTimeout,
		SettleTimeout,
		TokenAmount,
	},
};
use hopline_state_machine::{
	constants::CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
	machine::chain,
	types::{
		ChainReceipt,
		ChainState,
		NettingChannelState,
		ContractReceiveChannelDeposit,
		ContractReceiveChannelOpened,
		ContractReceiveTokenNetworkRegistry,
		Event,
		MediationFeeConfig,
		SendMessageEventInner,
		SendSecretRequest,
		StateChange,
		TokenNetworkRegistry,
		TokenNetworkState,
		TransactionChannelDeposit,
		TransactionExecutionStatus,
	},
};
use web3::signing::Key;

use super::{
	canonical_identifier,
	key,
	locked_transfer_event,
	token_address,
	token_network_address,
};
use crate::{
	decode::decode,
	errors::MessageError,
	keys::PrivateKey,
	messages::{
		to_message,
		Delivered,
		MessageInner,
		SignedMessage,
	},
};

fn signed_locked_transfer(
	sender: &PrivateKey,
	recipient: Address,
	target: Address,
	expiration: u64,
) -> MessageInner {
	let event = locked_transfer_event(sender, recipient, target, 10, expiration);
	let mut message = to_message(event.into());
	message.sign(sender).expect("Signing should succeed");
	message.inner
}

/// Chain state of `our_key` with one open channel to `partner_key` who deposited 100.
fn chain_with_channel(our_key: &PrivateKey, partner_key: &PrivateKey) -> ChainState {
	let registry_address = Address::from_low_u64_be(0x1001);
	let chain_state = ChainState::new(
		ChainID::Goerli,
		BlockNumber::from(1u64),
		BlockHash::zero(),
		our_key.address(),
	);

	let registry = ContractReceiveTokenNetworkRegistry {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		token_network_registry: TokenNetworkRegistry::new(
			registry_address,
			vec![TokenNetworkState::new(token_network_address(), token_address())],
		),
	};
	let chain_state = chain::state_transition(chain_state, registry.into())
		.expect("Registry should be added")
		.new_state;

	let channel = NettingChannelState::new(
		canonical_identifier(),
		token_address(),
		registry_address,
		our_key.address(),
		partner_key.address(),
		RevealTimeout::from(10u64),
		SettleTimeout::from(500u64),
		TransactionExecutionStatus::confirmed(BlockNumber::from(1u64)),
		&MediationFeeConfig::default(),
	)
	.expect("Channel timeouts should be valid");
	let opened = ContractReceiveChannelOpened {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		channel,
	};
	let chain_state =
		chain::state_transition(chain_state, opened.into()).expect("Channel should open").new_state;

	let deposit = ContractReceiveChannelDeposit {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		canonical_identifier: canonical_identifier(),
		deposit_transaction: TransactionChannelDeposit {
			participant_address: partner_key.address(),
			contract_balance: TokenAmount::from(100u64),
			deposit_block_number: BlockNumber::from(1u64),
		},
	};
	chain::state_transition(chain_state, deposit.into())
		.expect("Deposit should be applied")
		.new_state
}

#[test]
fn test_decode_secret_request_uses_recovered_sender() {
	let bob = key(2);
	let event = SendSecretRequest {
		inner: SendMessageEventInner {
			recipient: key(1).address(),
			canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
			message_identifier: 11,
		},
		payment_identifier: PaymentIdentifier::from(1u64),
		amount: TokenAmount::from(10u64),
		expiration: BlockExpiration::from(100u64),
		secrethash: hash_secret(&super::secret().0),
	};
	let mut message = to_message(event.into());
	message.sign(&bob).expect("Signing should succeed");

	match decode(message.inner, key(1).address()).expect("Message should decode") {
		StateChange::ReceiveSecretRequest(request) => {
			assert_eq!(request.sender, bob.address());
			assert_eq!(request.amount, TokenAmount::from(10u64));
			assert_eq!(request.expiration, BlockExpiration::from(100u64));
		},
		state_change => panic!("Unexpected state change {}", state_change.type_name()),
	}
}

#[test]
fn test_decode_delivered() {
	let bob = key(2);
	let mut message = MessageInner::Delivered(Delivered::new(5));
	message.sign(&bob).expect("Signing should succeed");

	match decode(message, key(1).address()).expect("Message should decode") {
		StateChange::ReceiveDelivered(delivered) => {
			assert_eq!(delivered.sender, bob.address());
			assert_eq!(delivered.message_identifier, 5);
		},
		state_change => panic!("Unexpected state change {}", state_change.type_name()),
	}
}

#[test]
fn test_locked_transfer_to_us_starts_a_target_task() {
	let alice = key(1);
	let bob = key(2);
	let message = signed_locked_transfer(&alice, bob.address(), bob.address(), 100);

	let state_change = decode(message, bob.address()).expect("Message should decode");
	let init = match &state_change {
		StateChange::ActionInitTarget(init) => init,
		state_change => panic!("Unexpected state change {}", state_change.type_name()),
	};
	assert_eq!(init.sender, alice.address());
	assert_eq!(init.from_hop.node_address, alice.address());
	assert_eq!(init.balance_proof.sender, Some(alice.address()));
	assert!(init.balance_proof.message_hash.is_some());

	let chain_state = chain_with_channel(&bob, &alice);
	let result =
		chain::state_transition(chain_state, state_change).expect("Transfer should be accepted");

	let event_names: Vec<&str> = result.events.iter().map(Event::type_name).collect();
	assert_eq!(event_names, vec!["SendProcessed", "SendSecretRequest"]);
	assert!(result
		.new_state
		.payment_mapping
		.tasks
		.contains_key(&hash_secret(&super::secret().0)));
}

#[test]
fn test_locked_transfer_through_us_starts_a_mediator_task() {
	let alice = key(1);
	let bob = key(2);
	let charlie = key(3);
	let message = signed_locked_transfer(&alice, bob.address(), charlie.address(), 100);

	match decode(message, bob.address()).expect("Message should decode") {
		StateChange::ActionInitMediator(init) => {
			assert_eq!(init.sender, alice.address());
			assert_eq!(init.from_transfer.target, charlie.address());
			assert_eq!(
				init.candidate_route_states[0].route,
				vec![alice.address(), bob.address(), charlie.address()]
			);
		},
		state_change => panic!("Unexpected state change {}", state_change.type_name()),
	}
}

#[test]
fn test_locked_transfer_for_another_recipient_is_rejected() {
	let alice = key(1);
	let message = signed_locked_transfer(&alice, key(3).address(), key(3).address(), 100);

	assert!(matches!(decode(message, key(2).address()), Err(MessageError::Malformed(_))));
}

#[test]
fn test_forged_locked_transfer_is_refused_by_the_channel() {
	let alice = key(1);
	let bob = key(2);
	let mallory = key(4);
	// Signed by a node that is not the channel partner.
	let message = signed_locked_transfer(&mallory, bob.address(), bob.address(), 100);

	let state_change = decode(message, bob.address()).expect("Message should decode");
	let chain_state = chain_with_channel(&bob, &alice);
	assert!(chain::state_transition(chain_state, state_change).is_err());
}
