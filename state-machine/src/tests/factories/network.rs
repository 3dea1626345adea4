use super::{
	received_transfer,
	route,
	payment_description,
	ChainStateBuilder,
	Generator,
	Keyring,
};
use crate::{
	machine::chain,
	types::{
		ActionInitInitiator,
		ActionInitMediator,
		ActionInitTarget,
		Block,
		BlockHash,
		BlockNumber,
		ChainState,
		ChannelIdentifier,
		Event,
		HopState,
		LockedTransferState,
		Secret,
		SecretHash,
		StateChange,
		TokenAmount,
	},
};

pub const PAYMENT_IDENTIFIER: u64 = 1;
pub const PAYMENT_AMOUNT: u64 = 97;
pub const MEDIATION_FEE: u64 = 3;
pub const REVEAL_TIMEOUT: u64 = 5;

/// Alice pays Charlie through Bob.
///
/// Alice and Bob share channel 1, Bob and Charlie share channel 2. Bob charges a flat fee.
pub struct MediatedNetwork {
	pub alice: ChainState,
	pub bob: ChainState,
	pub charlie: ChainState,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

impl MediatedNetwork {
	pub fn new() -> Self {
		let deposit = TokenAmount::from(1000);
		let alice = ChainStateBuilder::for_node(Keyring::Alice)
			.with_reveal_timeout(REVEAL_TIMEOUT)
			.with_token_network_registry()
			.with_token_network()
			.with_channel(1, (Keyring::Alice.address(), deposit), (Keyring::Bob.address(), deposit))
			.build()
			.chain_state;
		let bob = ChainStateBuilder::for_node(Keyring::Bob)
			.with_reveal_timeout(REVEAL_TIMEOUT)
			.with_flat_fee(MEDIATION_FEE)
			.with_token_network_registry()
			.with_token_network()
			.with_channel(1, (Keyring::Bob.address(), deposit), (Keyring::Alice.address(), deposit))
			.with_channel(2, (Keyring::Bob.address(), deposit), (Keyring::Charlie.address(), deposit))
			.build()
			.chain_state;
		let charlie = ChainStateBuilder::for_node(Keyring::Charlie)
			.with_reveal_timeout(REVEAL_TIMEOUT)
			.with_token_network_registry()
			.with_token_network()
			.with_channel(
				2,
				(Keyring::Charlie.address(), deposit),
				(Keyring::Bob.address(), deposit),
			)
			.build()
			.chain_state;

		let (secret, secrethash) = Generator::secret_pair();
		Self { alice, bob, charlie, secret, secrethash }
	}

	pub fn node(&mut self, node: Keyring) -> &mut ChainState {
		match node {
			Keyring::Alice => &mut self.alice,
			Keyring::Bob => &mut self.bob,
			Keyring::Charlie => &mut self.charlie,
			Keyring::Dave => panic!("Dave is not part of the network"),
		}
	}

	/// Apply `state_change` on `node` and return the emitted events.
	pub fn dispatch(&mut self, node: Keyring, state_change: impl Into<StateChange>) -> Vec<Event> {
		let chain_state = self.node(node);
		let transition = chain::state_transition(chain_state.clone(), state_change.into())
			.expect("State transition should succeed");
		*chain_state = transition.new_state;
		transition.events
	}

	pub fn new_block(&mut self, node: Keyring, block_number: u64) -> Vec<Event> {
		self.dispatch(
			node,
			Block { block_number: BlockNumber::from(block_number), block_hash: BlockHash::random() },
		)
	}

	/// Alice locks the payment for Bob. Returns the transfer as Alice sent it.
	pub fn initiate(&mut self) -> LockedTransferState {
		let description = payment_description(
			Keyring::Alice,
			Keyring::Charlie,
			PAYMENT_AMOUNT,
			PAYMENT_IDENTIFIER,
			self.secret.clone(),
			self.secrethash,
		);
		let events = self.dispatch(
			Keyring::Alice,
			ActionInitInitiator {
				transfer: description,
				routes: vec![route(
					&[Keyring::Alice, Keyring::Bob, Keyring::Charlie],
					MEDIATION_FEE,
				)],
			},
		);
		locked_transfer_of(&events)
	}

	/// Bob receives Alice's transfer.
	pub fn mediate(&mut self, transfer: &LockedTransferState) -> Vec<Event> {
		let from_transfer = received_transfer(transfer, &Keyring::Alice.private_key());
		self.dispatch(
			Keyring::Bob,
			ActionInitMediator {
				sender: Keyring::Alice.address(),
				balance_proof: from_transfer.balance_proof.clone(),
				from_hop: HopState {
					node_address: Keyring::Alice.address(),
					channel_identifier: ChannelIdentifier::from(1),
				},
				candidate_route_states: from_transfer.route_states.clone(),
				from_transfer,
			},
		)
	}

	/// Charlie receives Bob's transfer.
	pub fn receive(&mut self, transfer: &LockedTransferState) -> Vec<Event> {
		let transfer = received_transfer(transfer, &Keyring::Bob.private_key());
		self.dispatch(
			Keyring::Charlie,
			ActionInitTarget {
				sender: Keyring::Bob.address(),
				balance_proof: transfer.balance_proof.clone(),
				from_hop: HopState {
					node_address: Keyring::Bob.address(),
					channel_identifier: ChannelIdentifier::from(2),
				},
				transfer,
			},
		)
	}
}

pub fn locked_transfer_of(events: &[Event]) -> LockedTransferState {
	events
		.iter()
		.find_map(|event| match event {
			Event::SendLockedTransfer(send) => Some(send.transfer.clone()),
			_ => None,
		})
		.expect("A locked transfer should be sent")
}

pub fn event_names(events: &[Event]) -> Vec<&'static str> {
	events.iter().map(|event| event.type_name()).collect()
}
