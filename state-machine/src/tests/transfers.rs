use hopline_primitives::constants::LOCKSROOT_OF_NO_LOCKS;

use crate::{
	machine::channel::utils::compute_locksroot,
	tests::factories::{
		event_names,
		locked_transfer_of,
		sign_balance_proof,
		Keyring,
		MediatedNetwork,
		PAYMENT_AMOUNT,
		PAYMENT_IDENTIFIER,
	},
	types::{
		BlockExpiration,
		ChainState,
		Event,
		PaymentIdentifier,
		ReceiveLockExpired,
		ReceiveSecretRequest,
		ReceiveSecretReveal,
		ReceiveUnlock,
		SendLockExpired,
		SendSecretRequest,
		SendUnlock,
		TokenAmount,
	},
	views,
};

fn secret_request_of(events: &[Event]) -> SendSecretRequest {
	events
		.iter()
		.find_map(|event| match event {
			Event::SendSecretRequest(request) => Some(request.clone()),
			_ => None,
		})
		.expect("A secret request should be sent")
}

fn unlock_of(events: &[Event]) -> SendUnlock {
	events
		.iter()
		.find_map(|event| match event {
			Event::SendUnlock(unlock) => Some(unlock.clone()),
			_ => None,
		})
		.expect("An unlock should be sent")
}

fn lock_expired_of(events: &[Event]) -> SendLockExpired {
	events
		.iter()
		.find_map(|event| match event {
			Event::SendLockExpired(lock_expired) => Some(lock_expired.clone()),
			_ => None,
		})
		.expect("A lock expired should be sent")
}

fn assert_no_pending_locks(chain_state: &ChainState) {
	for channel in views::get_channels(chain_state) {
		for end_state in [&channel.our_state, &channel.partner_state] {
			assert!(end_state.pending_locks.locks.is_empty());
			assert_eq!(compute_locksroot(&end_state.pending_locks), *LOCKSROOT_OF_NO_LOCKS);
		}
	}
}

#[test]
fn test_mediated_transfer_is_unlocked_on_every_hop() {
	let mut network = MediatedNetwork::new();
	let secrethash = network.secrethash;

	let alice_transfer = network.initiate();
	assert_eq!(alice_transfer.lock.amount, TokenAmount::from(100));
	assert_eq!(alice_transfer.lock.expiration, BlockExpiration::from(11u64));

	let events = network.mediate(&alice_transfer);
	assert_eq!(event_names(&events), vec!["SendProcessed", "SendLockedTransfer"]);
	let bob_transfer = locked_transfer_of(&events);
	assert_eq!(bob_transfer.lock.amount, TokenAmount::from(PAYMENT_AMOUNT));
	assert_eq!(bob_transfer.lock.expiration, BlockExpiration::from(10u64));

	let events = network.receive(&bob_transfer);
	assert_eq!(event_names(&events), vec!["SendProcessed", "SendSecretRequest"]);
	let secret_request = secret_request_of(&events);
	assert_eq!(secret_request.recipient, Keyring::Alice.address());
	assert_eq!(secret_request.amount, TokenAmount::from(PAYMENT_AMOUNT));
	assert_eq!(secret_request.expiration, BlockExpiration::from(10u64));

	let events = network.dispatch(
		Keyring::Alice,
		ReceiveSecretRequest {
			sender: Keyring::Charlie.address(),
			payment_identifier: PaymentIdentifier::from(PAYMENT_IDENTIFIER),
			amount: secret_request.amount,
			expiration: secret_request.expiration,
			secrethash,
		},
	);
	assert_eq!(event_names(&events), vec!["SendSecretReveal"]);
	match &events[0] {
		Event::SendSecretReveal(reveal) => assert_eq!(reveal.recipient, Keyring::Charlie.address()),
		event => panic!("Unexpected event {:?}", event),
	}

	let secret = network.secret.clone();
	let events = network.dispatch(
		Keyring::Charlie,
		ReceiveSecretReveal { sender: Keyring::Alice.address(), secret: secret.clone(), secrethash },
	);
	assert_eq!(event_names(&events), vec!["SendSecretReveal"]);
	match &events[0] {
		Event::SendSecretReveal(reveal) => assert_eq!(reveal.recipient, Keyring::Bob.address()),
		event => panic!("Unexpected event {:?}", event),
	}

	let events = network.dispatch(
		Keyring::Bob,
		ReceiveSecretReveal { sender: Keyring::Charlie.address(), secret: secret.clone(), secrethash },
	);
	assert_eq!(event_names(&events), vec!["SendSecretReveal", "SendUnlock", "UnlockSuccess"]);
	match &events[0] {
		Event::SendSecretReveal(reveal) => assert_eq!(reveal.recipient, Keyring::Alice.address()),
		event => panic!("Unexpected event {:?}", event),
	}
	let bob_unlock = unlock_of(&events);
	assert_eq!(bob_unlock.balance_proof.transferred_amount, TokenAmount::from(PAYMENT_AMOUNT));

	let events = network.dispatch(
		Keyring::Charlie,
		ReceiveUnlock {
			sender: Keyring::Bob.address(),
			message_identifier: bob_unlock.message_identifier,
			secret: secret.clone(),
			secrethash,
			balance_proof: sign_balance_proof(&bob_unlock.balance_proof, &Keyring::Bob.private_key()),
		},
	);
	assert_eq!(event_names(&events), vec!["SendProcessed", "PaymentReceivedSuccess"]);
	assert!(views::get_transfer_task(&network.charlie, secrethash).is_none());

	let events = network.dispatch(
		Keyring::Alice,
		ReceiveSecretReveal { sender: Keyring::Bob.address(), secret: secret.clone(), secrethash },
	);
	assert_eq!(event_names(&events), vec!["SendUnlock", "PaymentSentSuccess", "UnlockSuccess"]);
	assert!(views::get_transfer_task(&network.alice, secrethash).is_none());
	let alice_unlock = unlock_of(&events);
	assert_eq!(alice_unlock.balance_proof.transferred_amount, TokenAmount::from(100));

	let events = network.dispatch(
		Keyring::Bob,
		ReceiveUnlock {
			sender: Keyring::Alice.address(),
			message_identifier: alice_unlock.message_identifier,
			secret,
			secrethash,
			balance_proof: sign_balance_proof(
				&alice_unlock.balance_proof,
				&Keyring::Alice.private_key(),
			),
		},
	);
	assert_eq!(event_names(&events), vec!["SendProcessed", "UnlockClaimSuccess"]);
	assert!(views::get_transfer_task(&network.bob, secrethash).is_none());

	for chain_state in [&network.alice, &network.bob, &network.charlie] {
		assert_no_pending_locks(chain_state);
	}
}

#[test]
fn test_mediated_transfer_expires_without_secret() {
	let mut network = MediatedNetwork::new();
	let secrethash = network.secrethash;

	let alice_transfer = network.initiate();
	let bob_transfer = locked_transfer_of(&network.mediate(&alice_transfer));
	network.receive(&bob_transfer);

	let events = network.new_block(Keyring::Bob, 20);
	assert_eq!(
		event_names(&events),
		vec!["SendLockExpired", "ErrorUnlockFailed", "ErrorUnlockClaimFailed"]
	);
	let bob_lock_expired = lock_expired_of(&events);
	assert_eq!(bob_lock_expired.recipient, Keyring::Charlie.address());
	assert!(views::get_transfer_task(&network.bob, secrethash).is_some());

	let events = network.new_block(Keyring::Charlie, 20);
	assert_eq!(event_names(&events), vec!["ErrorUnlockClaimFailed"]);

	let events = network.dispatch(
		Keyring::Charlie,
		ReceiveLockExpired {
			sender: Keyring::Bob.address(),
			secrethash,
			message_identifier: bob_lock_expired.message_identifier,
			balance_proof: sign_balance_proof(
				&bob_lock_expired.balance_proof,
				&Keyring::Bob.private_key(),
			),
		},
	);
	assert_eq!(event_names(&events), vec!["SendProcessed"]);
	assert!(views::get_transfer_task(&network.charlie, secrethash).is_none());

	assert!(network.new_block(Keyring::Alice, 20).is_empty());
	let events = network.new_block(Keyring::Alice, 21);
	assert_eq!(
		event_names(&events),
		vec!["SendLockExpired", "ErrorPaymentSentFailed", "ErrorRouteFailed", "ErrorUnlockFailed"]
	);
	assert!(views::get_transfer_task(&network.alice, secrethash).is_none());
	let alice_lock_expired = lock_expired_of(&events);

	let events = network.dispatch(
		Keyring::Bob,
		ReceiveLockExpired {
			sender: Keyring::Alice.address(),
			secrethash,
			message_identifier: alice_lock_expired.message_identifier,
			balance_proof: sign_balance_proof(
				&alice_lock_expired.balance_proof,
				&Keyring::Alice.private_key(),
			),
		},
	);
	assert_eq!(event_names(&events), vec!["SendProcessed"]);
	assert!(views::get_transfer_task(&network.bob, secrethash).is_none());

	for chain_state in [&network.alice, &network.bob, &network.charlie] {
		assert_no_pending_locks(chain_state);
	}
}
