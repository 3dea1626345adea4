use rand::{
	rngs::StdRng,
	Rng,
	SeedableRng,
};

use crate::{
	machine::chain,
	tests::factories::{
		locked_transfer_of,
		payment_description,
		received_transfer,
		route,
		sign_balance_proof,
		ChainStateBuilder,
		Generator,
		Keyring,
		MEDIATION_FEE,
		PAYMENT_AMOUNT,
		PAYMENT_IDENTIFIER,
		REVEAL_TIMEOUT,
	},
	types::{
		ActionInitInitiator,
		ActionInitMediator,
		ActionInitTarget,
		Address,
		Block,
		BlockHash,
		BlockNumber,
		ChainState,
		ChannelIdentifier,
		Event,
		HopState,
		ReceiveLockExpired,
		ReceiveSecretRequest,
		ReceiveSecretReveal,
		ReceiveUnlock,
		StateChange,
		TokenAmount,
	},
};

const HOPS: [Keyring; 4] = [Keyring::Alice, Keyring::Bob, Keyring::Charlie, Keyring::Dave];
const LAST_BLOCK: u64 = 25;

/// What a mediator has observed so far, tracked outside of its state machine.
#[derive(Default)]
struct Observed {
	knows_secret: bool,
	payer_unlocked: bool,
}

/// Alice pays Dave through Bob and Charlie. Hop `i` and hop `i + 1` share channel `i + 1`.
struct HopNetwork {
	nodes: Vec<ChainState>,
	blocks: Vec<u64>,
	observed: Vec<Observed>,
	payer_expirations: Vec<BlockNumber>,
	in_flight: Vec<(usize, StateChange)>,
	unlocks_sent: usize,
	payment_received: bool,
}

fn position_of(address: Address) -> usize {
	HOPS.iter()
		.position(|hop| hop.address() == address)
		.expect("Recipient should be part of the network")
}

fn hop_state(payer: usize) -> HopState {
	HopState {
		node_address: HOPS[payer].address(),
		channel_identifier: ChannelIdentifier::from(payer as u64 + 1),
	}
}

impl HopNetwork {
	/// Lock the payment on every hop and return with the target's secret request in flight.
	fn locked() -> Self {
		let deposit = TokenAmount::from(1000);
		let nodes: Vec<ChainState> = HOPS
			.iter()
			.enumerate()
			.map(|(position, hop)| {
				let mut builder = ChainStateBuilder::for_node(*hop)
					.with_reveal_timeout(REVEAL_TIMEOUT)
					.with_token_network_registry()
					.with_token_network();
				if matches!(hop, Keyring::Bob) {
					builder = builder.with_flat_fee(MEDIATION_FEE);
				}
				if position > 0 {
					builder = builder.with_channel(
						position as u64,
						(hop.address(), deposit),
						(HOPS[position - 1].address(), deposit),
					);
				}
				if position + 1 < HOPS.len() {
					builder = builder.with_channel(
						position as u64 + 1,
						(hop.address(), deposit),
						(HOPS[position + 1].address(), deposit),
					);
				}
				builder.build().chain_state
			})
			.collect();

		let mut network = Self {
			nodes,
			blocks: vec![1; HOPS.len()],
			observed: HOPS.iter().map(|_| Observed::default()).collect(),
			payer_expirations: vec![BlockNumber::zero(); HOPS.len()],
			in_flight: vec![],
			unlocks_sent: 0,
			payment_received: false,
		};

		let (secret, secrethash) = Generator::secret_pair();
		let events = network.apply(
			0,
			ActionInitInitiator {
				transfer: payment_description(
					Keyring::Alice,
					Keyring::Dave,
					PAYMENT_AMOUNT,
					PAYMENT_IDENTIFIER,
					secret,
					secrethash,
				),
				routes: vec![route(&HOPS, MEDIATION_FEE)],
			}
			.into(),
		)
		.expect("Payment should be initiated");

		let mut transfer = locked_transfer_of(&events);
		for payee in 1..HOPS.len() {
			let payer = payee - 1;
			let received = received_transfer(&transfer, &HOPS[payer].private_key());
			network.payer_expirations[payee] = received.lock.expiration;
			let state_change: StateChange = if payee + 1 < HOPS.len() {
				ActionInitMediator {
					sender: HOPS[payer].address(),
					balance_proof: received.balance_proof.clone(),
					from_hop: hop_state(payer),
					candidate_route_states: received.route_states.clone(),
					from_transfer: received,
				}
				.into()
			} else {
				ActionInitTarget {
					sender: HOPS[payer].address(),
					balance_proof: received.balance_proof.clone(),
					from_hop: hop_state(payer),
					transfer: received,
				}
				.into()
			};
			let events = network.apply(payee, state_change).expect("Transfer should be accepted");
			if payee + 1 < HOPS.len() {
				transfer = locked_transfer_of(&events);
			} else {
				network.send(payee, &events);
			}
		}

		assert_eq!(network.in_flight.len(), 1, "The target should request the secret");
		network
	}

	fn apply(&mut self, node: usize, state_change: StateChange) -> Option<Vec<Event>> {
		let transition = chain::state_transition(self.nodes[node].clone(), state_change).ok()?;
		self.nodes[node] = transition.new_state;
		Some(transition.events)
	}

	/// Queue the messages in `events` for their recipients.
	fn send(&mut self, from: usize, events: &[Event]) {
		let sender = HOPS[from].address();
		let secret_key = HOPS[from].private_key();
		for event in events {
			let (recipient, state_change): (Address, StateChange) = match event {
				Event::SendSecretRequest(request) => (
					request.recipient,
					ReceiveSecretRequest {
						sender,
						payment_identifier: request.payment_identifier,
						amount: request.amount,
						expiration: request.expiration,
						secrethash: request.secrethash,
					}
					.into(),
				),
				Event::SendSecretReveal(reveal) => (
					reveal.recipient,
					ReceiveSecretReveal {
						sender,
						secret: reveal.secret.clone(),
						secrethash: reveal.secrethash,
					}
					.into(),
				),
				Event::SendUnlock(unlock) => (
					unlock.recipient,
					ReceiveUnlock {
						sender,
						message_identifier: unlock.message_identifier,
						secret: unlock.secret.clone(),
						secrethash: unlock.secrethash,
						balance_proof: sign_balance_proof(&unlock.balance_proof, &secret_key),
					}
					.into(),
				),
				Event::SendLockExpired(lock_expired) => (
					lock_expired.recipient,
					ReceiveLockExpired {
						sender,
						secrethash: lock_expired.secrethash,
						message_identifier: lock_expired.message_identifier,
						balance_proof: sign_balance_proof(&lock_expired.balance_proof, &secret_key),
					}
					.into(),
				),
				_ => continue,
			};
			self.in_flight.push((position_of(recipient), state_change));
		}
	}

	fn deliver(&mut self, index: usize) {
		let (node, state_change) = self.in_flight.remove(index);
		let from_payer = |sender: Address| node > 0 && sender == HOPS[node - 1].address();
		let (reveals_secret, unlocks_payer) = match &state_change {
			StateChange::ReceiveSecretReveal(_) => (true, false),
			StateChange::ReceiveUnlock(unlock) => (true, from_payer(unlock.sender)),
			_ => (false, false),
		};

		let events = match self.apply(node, state_change) {
			Some(events) => events,
			None => return,
		};
		self.observed[node].knows_secret |= reveals_secret;
		self.observed[node].payer_unlocked |= unlocks_payer;
		self.check_unlocks(node, &events);
		self.send(node, &events);
	}

	fn new_block(&mut self, node: usize) {
		self.blocks[node] += 1;
		let block = Block {
			block_number: BlockNumber::from(self.blocks[node]),
			block_hash: BlockHash::random(),
		};
		let events = self.apply(node, block.into()).expect("New blocks should always be accepted");
		self.check_unlocks(node, &events);
		self.send(node, &events);
	}

	/// A mediator may only hand its payee the balance proof once the payer's lock is its to
	/// claim.
	fn check_unlocks(&mut self, node: usize, events: &[Event]) {
		if events.iter().any(|event| matches!(event, Event::PaymentReceivedSuccess(_))) {
			self.payment_received = true;
		}
		if node == 0 || node + 1 == HOPS.len() {
			return
		}

		for event in events {
			let unlock = match event {
				Event::SendUnlock(unlock) => unlock,
				_ => continue,
			};
			assert_eq!(unlock.recipient, HOPS[node + 1].address());

			let observed = &self.observed[node];
			let lock_timeout =
				self.payer_expirations[node].saturating_sub(BlockNumber::from(self.blocks[node]));
			let secured = observed.payer_unlocked ||
				(observed.knows_secret && lock_timeout > BlockNumber::from(REVEAL_TIMEOUT));
			assert!(
				secured,
				"{:?} unlocked its payee at block {} with payer expiration {}",
				HOPS[node], self.blocks[node], self.payer_expirations[node]
			);
			self.unlocks_sent += 1;
		}
	}
}

#[test]
fn test_mediators_never_unlock_before_payer_is_secured() {
	let mut payments_received = 0;
	let mut unlocks_sent = 0;

	for seed in 0..64u64 {
		let mut rng = StdRng::seed_from_u64(seed);
		let mut network = HopNetwork::locked();

		for _ in 0..200 {
			let all_mined = network.blocks.iter().all(|block| *block >= LAST_BLOCK);
			if network.in_flight.is_empty() && all_mined {
				break
			}

			if !network.in_flight.is_empty() && (all_mined || rng.gen_bool(0.75)) {
				let index = rng.gen_range(0..network.in_flight.len());
				network.deliver(index);
			} else {
				let behind: Vec<usize> = (0..HOPS.len())
					.filter(|node| network.blocks[*node] < LAST_BLOCK)
					.collect();
				let node = behind[rng.gen_range(0..behind.len())];
				network.new_block(node);
			}
		}

		if network.payment_received {
			payments_received += 1;
		}
		unlocks_sent += network.unlocks_sent;
	}

	assert!(payments_received > 0, "No ordering completed the payment");
	assert!(unlocks_sent > 0, "No mediator ever unlocked its payee");
}
