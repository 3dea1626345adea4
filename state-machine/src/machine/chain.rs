use std::collections::HashSet;

use hopline_primitives::types::{
	Address,
	MessageIdentifier,
	SecretHash,
	TokenNetworkAddress,
};

use super::{
	initiator_manager,
	mediator,
	target,
	token_network,
};
use crate::{
	constants::CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
	errors::StateTransitionError,
	types::{
		ActionCancelPayment,
		ActionInitChain,
		ActionInitInitiator,
		ActionInitMediator,
		ActionInitTarget,
		Block,
		BlockNumber,
		ChainState,
		ContractReceiveChannelClosed,
		ContractReceiveTokenNetworkCreated,
		ContractReceiveTokenNetworkRegistry,
		ContractSendEvent,
		Event,
		InitiatorPaymentState,
		InitiatorTask,
		MediatorTask,
		QueueIdentifier,
		ReceiveWithdrawConfirmation,
		SendMessageEvent,
		StateChange,
		TargetTask,
		TransferTask,
	},
	views,
};

type TransitionResult = std::result::Result<ChainTransition, StateTransitionError>;

/// The chain state after a transition, along with the effects to execute.
#[derive(Debug)]
pub struct ChainTransition {
	pub new_state: ChainState,
	pub events: Vec<Event>,
}

impl ChainTransition {
	fn unchanged(chain_state: ChainState) -> Self {
		Self { new_state: chain_state, events: vec![] }
	}
}

/// Which queued messages an acknowledgement removes.
#[derive(Clone, Copy)]
enum Acknowledgement {
	/// Processed and Delivered acknowledge every message but withdraw requests.
	Processed,
	/// Only a withdraw confirmation acknowledges a withdraw request.
	WithdrawConfirmation,
}

impl Acknowledgement {
	fn covers(self, message: &SendMessageEvent) -> bool {
		let is_withdraw_request = matches!(message, SendMessageEvent::SendWithdrawRequest(_));
		match self {
			Self::WithdrawConfirmation => is_withdraw_request,
			Self::Processed => !is_withdraw_request,
		}
	}
}

/// Drop the acknowledged message from the queues of `recipient` picked by `in_queue`.
fn acknowledge(
	chain_state: &mut ChainState,
	recipient: Address,
	in_queue: impl Fn(&QueueIdentifier) -> bool,
	message_identifier: MessageIdentifier,
	acknowledgement: Acknowledgement,
) {
	for queue in chain_state.queues.iter_mut().filter_map(|(queue_identifier, queue)| {
		(queue_identifier.recipient == recipient && in_queue(queue_identifier)).then_some(queue)
	}) {
		queue.retain(|message| {
			message.message_identifier() != message_identifier || !acknowledgement.covers(message)
		});
	}
	chain_state.queues.retain(|_, queue| !queue.is_empty());
}

/// Every secrethash a payment is reachable under.
fn initiator_secrethashes(
	payment_state: &InitiatorPaymentState,
) -> impl Iterator<Item = SecretHash> + '_ {
	payment_state.transfers.keys().copied()
}

/// Map every transfer of the payment to the payment, dropping the stale keys.
fn store_initiator_task(
	chain_state: &mut ChainState,
	stale: &[SecretHash],
	token_network_address: TokenNetworkAddress,
	payment_state: Option<InitiatorPaymentState>,
) {
	let tasks = &mut chain_state.payment_mapping.tasks;
	for secrethash in stale {
		tasks.remove(secrethash);
	}

	if let Some(payment_state) = payment_state {
		for secrethash in initiator_secrethashes(&payment_state) {
			let task = InitiatorTask { token_network_address, payment_state: payment_state.clone() };
			tasks.insert(secrethash, TransferTask::Initiator(task));
		}
	}
}

/// Store `task` under `secrethash`, or forget the secrethash once the task is done.
fn store_task(chain_state: &mut ChainState, secrethash: SecretHash, task: Option<TransferTask>) {
	let tasks = &mut chain_state.payment_mapping.tasks;
	match task {
		Some(task) => {
			tasks.insert(secrethash, task);
		},
		None => {
			tasks.remove(&secrethash);
		},
	}
}

fn subdispatch_to_payment_task(
	chain_state: ChainState,
	state_change: StateChange,
	secrethash: SecretHash,
) -> TransitionResult {
	let task = match chain_state.payment_mapping.tasks.get(&secrethash) {
		Some(task) => task.clone(),
		None => return Ok(ChainTransition::unchanged(chain_state)),
	};

	let (mut chain_state, task, events) = match task {
		TransferTask::Initiator(InitiatorTask { token_network_address, payment_state }) => {
			let mut stale: Vec<SecretHash> = initiator_secrethashes(&payment_state).collect();
			stale.push(secrethash);

			let transition =
				initiator_manager::state_transition(chain_state, Some(payment_state), state_change)?;
			let mut chain_state = transition.chain_state;
			store_initiator_task(&mut chain_state, &stale, token_network_address, transition.new_state);
			return Ok(ChainTransition { new_state: chain_state, events: transition.events })
		},
		TransferTask::Mediator(MediatorTask { token_network_address, mediator_state }) => {
			let transition =
				mediator::state_transition(chain_state, Some(mediator_state), state_change)?;
			let task = transition.new_state.map(|mediator_state| {
				TransferTask::Mediator(MediatorTask { token_network_address, mediator_state })
			});
			(transition.chain_state, task, transition.events)
		},
		TransferTask::Target(TargetTask { canonical_identifier, target_state }) => {
			let transition = target::state_transition(chain_state, Some(target_state), state_change)?;
			let task = transition.new_state.map(|target_state| {
				TransferTask::Target(TargetTask { canonical_identifier, target_state })
			});
			(transition.chain_state, task, transition.events)
		},
	};

	store_task(&mut chain_state, secrethash, task);
	Ok(ChainTransition { new_state: chain_state, events })
}

/// Dispatch `state_change` once per payment task, in secrethash order.
///
/// An initiator payment is mapped under each of its transfers; it only sees the state change
/// once.
fn subdispatch_to_tasks(
	mut chain_state: ChainState,
	state_change: StateChange,
	mut secrethashes: Vec<SecretHash>,
) -> TransitionResult {
	secrethashes.sort();

	let mut dispatched = HashSet::new();
	let mut events = vec![];
	for secrethash in secrethashes {
		match chain_state.payment_mapping.tasks.get(&secrethash) {
			_ if dispatched.contains(&secrethash) => continue,
			Some(TransferTask::Initiator(initiator)) =>
				dispatched.extend(initiator_secrethashes(&initiator.payment_state)),
			Some(_) => {
				dispatched.insert(secrethash);
			},
			None => continue,
		}

		let transition = subdispatch_to_payment_task(chain_state, state_change.clone(), secrethash)?;
		chain_state = transition.new_state;
		events.extend(transition.events);
	}

	Ok(ChainTransition { new_state: chain_state, events })
}

fn handle_action_init_chain(init: ActionInitChain) -> ChainTransition {
	let chain_state =
		ChainState::new(init.chain_id, init.block_number, init.block_hash, init.our_address);
	ChainTransition::unchanged(chain_state)
}

fn handle_action_init_initiator(
	chain_state: ChainState,
	init: ActionInitInitiator,
) -> TransitionResult {
	let secrethash = init.transfer.secrethash;
	let token_network_address = init.transfer.token_network_address;

	let known_network =
		views::get_token_network_by_address(&chain_state, token_network_address).is_some();
	if !known_network || chain_state.payment_mapping.tasks.contains_key(&secrethash) {
		return Ok(ChainTransition::unchanged(chain_state))
	}

	let transition = initiator_manager::state_transition(chain_state, None, init.into())?;
	let mut chain_state = transition.chain_state;
	store_initiator_task(&mut chain_state, &[], token_network_address, transition.new_state);

	Ok(ChainTransition { new_state: chain_state, events: transition.events })
}

fn handle_action_init_mediator(
	chain_state: ChainState,
	init: ActionInitMediator,
) -> TransitionResult {
	let secrethash = init.from_transfer.lock.secrethash;
	let token_network_address =
		init.from_transfer.balance_proof.canonical_identifier.token_network_address;

	// A payer retransmitting its transfer reaches the running mediator.
	let mediator_state = match chain_state.payment_mapping.tasks.get(&secrethash) {
		None => None,
		Some(TransferTask::Mediator(mediator)) => Some(mediator.mediator_state.clone()),
		Some(_) => return Ok(ChainTransition::unchanged(chain_state)),
	};

	let transition = mediator::state_transition(chain_state, mediator_state, init.into())?;
	let mut chain_state = transition.chain_state;
	let task = transition.new_state.map(|mediator_state| {
		TransferTask::Mediator(MediatorTask { token_network_address, mediator_state })
	});
	store_task(&mut chain_state, secrethash, task);

	Ok(ChainTransition { new_state: chain_state, events: transition.events })
}

fn handle_action_init_target(chain_state: ChainState, init: ActionInitTarget) -> TransitionResult {
	let secrethash = init.transfer.lock.secrethash;
	let canonical_identifier = init.transfer.balance_proof.canonical_identifier.clone();

	let target_state = match chain_state.payment_mapping.tasks.get(&secrethash) {
		None => None,
		Some(TransferTask::Target(target)) => Some(target.target_state.clone()),
		Some(_) => return Ok(ChainTransition::unchanged(chain_state)),
	};

	let transition = target::state_transition(chain_state, target_state, init.into())?;
	let mut chain_state = transition.chain_state;
	let task = transition
		.new_state
		.map(|target_state| TransferTask::Target(TargetTask { canonical_identifier, target_state }));
	store_task(&mut chain_state, secrethash, task);

	Ok(ChainTransition { new_state: chain_state, events: transition.events })
}

fn handle_action_cancel_payment(
	chain_state: ChainState,
	cancel: ActionCancelPayment,
) -> TransitionResult {
	let secrethashes = chain_state
		.payment_mapping
		.tasks
		.iter()
		.filter(|(_, task)| match task {
			TransferTask::Initiator(initiator) => initiator
				.payment_state
				.transfers
				.values()
				.any(|transfer| transfer.description.payment_identifier == cancel.payment_identifier),
			_ => false,
		})
		.map(|(secrethash, _)| *secrethash)
		.collect();

	subdispatch_to_tasks(chain_state, cancel.into(), secrethashes)
}

/// Every token network sees the block first, then every payment task.
fn handle_new_block(mut chain_state: ChainState, block: Block) -> TransitionResult {
	chain_state.block_number = block.block_number;
	chain_state.block_hash = block.block_hash;

	let mut token_network_addresses: Vec<TokenNetworkAddress> = chain_state
		.registries
		.values()
		.flat_map(|registry| registry.token_networks.keys().copied())
		.collect();
	token_network_addresses.sort();

	let mut events = vec![];
	for token_network_address in token_network_addresses {
		let transition =
			handle_token_network_state_change(chain_state, token_network_address, block.clone().into())?;
		chain_state = transition.new_state;
		events.extend(transition.events);
	}

	let secrethashes = chain_state.payment_mapping.tasks.keys().copied().collect();
	let mut transition = subdispatch_to_tasks(chain_state, block.into(), secrethashes)?;
	events.append(&mut transition.events);
	Ok(ChainTransition { new_state: transition.new_state, events })
}

fn handle_contract_receive_token_network_registry(
	mut chain_state: ChainState,
	registry: ContractReceiveTokenNetworkRegistry,
) -> ChainTransition {
	let registry = registry.token_network_registry;
	chain_state.registries.entry(registry.address).or_insert(registry);
	ChainTransition::unchanged(chain_state)
}

fn handle_contract_receive_token_network_created(
	mut chain_state: ChainState,
	created: ContractReceiveTokenNetworkCreated,
) -> TransitionResult {
	let registry_address = created.token_network_registry_address;
	let registry = match chain_state.registries.get_mut(&registry_address) {
		Some(registry) => registry,
		None =>
			return Err(StateTransitionError::invalid(
				"ContractReceiveTokenNetworkCreated",
				format!("token network registry {:?} is unknown", registry_address),
			)),
	};

	let token_network = created.token_network;
	registry.token_network_by_token.insert(token_network.token_address, token_network.address);
	registry.token_networks.entry(token_network.address).or_insert(token_network);

	Ok(ChainTransition::unchanged(chain_state))
}

fn handle_token_network_state_change(
	mut chain_state: ChainState,
	token_network_address: TokenNetworkAddress,
	state_change: StateChange,
) -> TransitionResult {
	let token_network = views::get_token_network_by_address(&chain_state, token_network_address)
		.cloned()
		.ok_or_else(|| {
			StateTransitionError::invalid(
				state_change.type_name(),
				format!("token network {:?} is unknown", token_network_address),
			)
		})?;

	let (block_number, block_hash) = (chain_state.block_number, chain_state.block_hash);
	let transition = token_network::state_transition(
		token_network,
		state_change,
		block_number,
		block_hash,
		&mut chain_state.rng,
	)?;

	let slot = views::get_token_network_by_address_mut(&mut chain_state, token_network_address);
	if let Some(slot) = slot {
		*slot = transition.new_state;
	}
	Ok(ChainTransition { new_state: chain_state, events: transition.events })
}

/// Messages still queued for a closed channel can no longer be acted upon by the partner.
fn handle_contract_receive_channel_closed(
	mut chain_state: ChainState,
	closed: ContractReceiveChannelClosed,
) -> TransitionResult {
	let canonical_identifier = closed.canonical_identifier.clone();
	let partner = views::get_channel_by_canonical_identifier(&chain_state, &canonical_identifier)
		.map(|channel| channel.partner_state.address);
	if let Some(recipient) = partner {
		let queue_identifier =
			QueueIdentifier { recipient, canonical_identifier: canonical_identifier.clone() };
		chain_state.queues.remove(&queue_identifier);
	}

	handle_token_network_state_change(
		chain_state,
		canonical_identifier.token_network_address,
		closed.into(),
	)
}

fn handle_receive_withdraw_confirmation(
	chain_state: ChainState,
	confirmation: ReceiveWithdrawConfirmation,
) -> TransitionResult {
	let canonical_identifier = confirmation.canonical_identifier.clone();
	let (sender, message_identifier) = (confirmation.sender, confirmation.message_identifier);

	let mut transition = handle_token_network_state_change(
		chain_state,
		canonical_identifier.token_network_address,
		confirmation.into(),
	)?;
	acknowledge(
		&mut transition.new_state,
		sender,
		|queue| queue.canonical_identifier == canonical_identifier,
		message_identifier,
		Acknowledgement::WithdrawConfirmation,
	);
	Ok(transition)
}

/// True if `state_change` confirms the side effect `transaction` was sent for.
///
/// The confirmation does not have to come from our own transaction. A partner closing the
/// channel or a monitoring service updating the transfer achieves the same effect.
/// Withdraws are monotonic, so a confirmed higher total satisfies a lower one.
fn is_transaction_effect_satisfied(
	chain_state: &ChainState,
	transaction: &ContractSendEvent,
	state_change: &StateChange,
) -> bool {
	use ContractSendEvent as Tx;
	use StateChange as Change;

	match (state_change, transaction) {
		(Change::ContractReceiveUpdateTransfer(update), Tx::ContractSendChannelUpdateTransfer(tx)) =>
			update.canonical_identifier == tx.balance_proof.canonical_identifier &&
				update.nonce == tx.balance_proof.nonce,
		(Change::ContractReceiveChannelClosed(closed), Tx::ContractSendChannelClose(tx)) =>
			closed.canonical_identifier == tx.canonical_identifier,
		(Change::ContractReceiveChannelSettled(settled), Tx::ContractSendChannelSettle(tx)) =>
			settled.canonical_identifier == tx.canonical_identifier,
		(Change::ContractReceiveChannelWithdraw(withdraw), Tx::ContractSendChannelWithdraw(tx)) =>
			withdraw.canonical_identifier == tx.canonical_identifier &&
				withdraw.participant == chain_state.our_address &&
				withdraw.total_withdraw >= tx.total_withdraw,
		(Change::ContractReceiveSecretReveal(reveal), Tx::ContractSendSecretReveal(tx)) =>
			reveal.secret == tx.secret,
		(Change::ContractReceiveChannelBatchUnlock(unlock), Tx::ContractSendChannelBatchUnlock(tx)) => {
			let ours = chain_state.our_address;
			let partner = match (unlock.sender == ours, unlock.receiver == ours) {
				(_, true) => unlock.sender,
				(true, false) => unlock.receiver,
				(false, false) => return false,
			};
			// Satisfied once both sides are unlocked and the channel is gone.
			unlock.canonical_identifier == tx.canonical_identifier &&
				views::get_channel_by_token_network_and_partner(
					chain_state,
					unlock.canonical_identifier.token_network_address,
					partner,
				)
				.is_none()
		},
		_ => false,
	}
}

/// Settling makes a pending close or update pointless, closing does the same for a withdraw.
fn is_transaction_invalidated(transaction: &ContractSendEvent, state_change: &StateChange) -> bool {
	let invalidated_channel = match (state_change, transaction) {
		(
			StateChange::ContractReceiveChannelSettled(settled),
			ContractSendEvent::ContractSendChannelUpdateTransfer(_) |
			ContractSendEvent::ContractSendChannelClose(_),
		) => &settled.canonical_identifier,
		(
			StateChange::ContractReceiveChannelClosed(closed),
			ContractSendEvent::ContractSendChannelWithdraw(_),
		) => &closed.canonical_identifier,
		_ => return false,
	};
	transaction.canonical_identifier() == Some(invalidated_channel)
}

fn is_transaction_expired(transaction: &ContractSendEvent, block_number: BlockNumber) -> bool {
	let expiration = match transaction {
		ContractSendEvent::ContractSendChannelUpdateTransfer(tx) => tx.expiration,
		ContractSendEvent::ContractSendSecretReveal(tx) => tx.expiration,
		ContractSendEvent::ContractSendChannelWithdraw(tx) => tx.expiration,
		_ => return false,
	};
	expiration < block_number
}

/// Record the effects of a transition that need an acknowledgement.
///
/// Messages wait in their queue until Processed or Delivered arrives, transactions wait in
/// `pending_transactions` until their effect is confirmed on-chain.
fn update_queues(transition: &mut ChainTransition, state_change: &StateChange) {
	let chain_state = &mut transition.new_state;

	let settles_transactions = matches!(
		state_change,
		StateChange::Block(_) |
			StateChange::ContractReceiveChannelClosed(_) |
			StateChange::ContractReceiveChannelSettled(_) |
			StateChange::ContractReceiveChannelWithdraw(_) |
			StateChange::ContractReceiveChannelBatchUnlock(_) |
			StateChange::ContractReceiveSecretReveal(_) |
			StateChange::ContractReceiveUpdateTransfer(_)
	);
	if settles_transactions {
		let mut pending = std::mem::take(&mut chain_state.pending_transactions);
		let current: &ChainState = chain_state;
		pending.retain(|transaction| {
			!is_transaction_effect_satisfied(current, transaction, state_change) &&
				!is_transaction_invalidated(transaction, state_change) &&
				!is_transaction_expired(transaction, current.block_number)
		});
		chain_state.pending_transactions = pending;
	}

	for event in transition.events.iter().cloned() {
		let message = match ContractSendEvent::try_from(event) {
			Ok(transaction) => {
				chain_state.pending_transactions.push(transaction);
				continue
			},
			Err(event) => SendMessageEvent::try_from(event),
		};
		if let Ok(message) = message {
			chain_state.queues.entry(message.queue_identifier()).or_default().push(message);
		}
	}
}

/// The token network a channel level state change belongs to.
fn token_network_of(state_change: &StateChange) -> Option<TokenNetworkAddress> {
	let canonical_identifier = match state_change {
		StateChange::ContractReceiveChannelOpened(opened) => &opened.channel.canonical_identifier,
		StateChange::ActionChannelClose(inner) => &inner.canonical_identifier,
		StateChange::ActionChannelWithdraw(inner) => &inner.canonical_identifier,
		StateChange::ContractReceiveChannelSettled(inner) => &inner.canonical_identifier,
		StateChange::ContractReceiveChannelDeposit(inner) => &inner.canonical_identifier,
		StateChange::ContractReceiveChannelWithdraw(inner) => &inner.canonical_identifier,
		StateChange::ContractReceiveChannelBatchUnlock(inner) => &inner.canonical_identifier,
		StateChange::ContractReceiveUpdateTransfer(inner) => &inner.canonical_identifier,
		StateChange::ReceiveWithdrawRequest(inner) => &inner.canonical_identifier,
		StateChange::ReceiveWithdrawExpired(inner) => &inner.canonical_identifier,
		_ => return None,
	};
	Some(canonical_identifier.token_network_address)
}

/// The payment task a transfer level state change belongs to.
fn secrethash_of(state_change: &StateChange) -> Option<SecretHash> {
	match state_change {
		StateChange::ActionTransferReroute(inner) => Some(inner.transfer.lock.secrethash),
		StateChange::ContractReceiveSecretReveal(inner) => Some(inner.secrethash),
		StateChange::ReceiveSecretReveal(inner) => Some(inner.secrethash),
		StateChange::ReceiveSecretRequest(inner) => Some(inner.secrethash),
		StateChange::ReceiveLockExpired(inner) => Some(inner.secrethash),
		StateChange::ReceiveUnlock(inner) => Some(inner.secrethash),
		_ => None,
	}
}

fn dispatch(chain_state: ChainState, state_change: StateChange) -> TransitionResult {
	if let Some(token_network_address) = token_network_of(&state_change) {
		return handle_token_network_state_change(chain_state, token_network_address, state_change)
	}
	if let Some(secrethash) = secrethash_of(&state_change) {
		return subdispatch_to_payment_task(chain_state, state_change, secrethash)
	}

	match state_change {
		StateChange::ActionInitChain(init) => Ok(handle_action_init_chain(init)),
		StateChange::ActionInitInitiator(init) => handle_action_init_initiator(chain_state, init),
		StateChange::ActionInitMediator(init) => handle_action_init_mediator(chain_state, init),
		StateChange::ActionInitTarget(init) => handle_action_init_target(chain_state, init),
		StateChange::ActionCancelPayment(cancel) => handle_action_cancel_payment(chain_state, cancel),
		StateChange::Block(block) => handle_new_block(chain_state, block),
		StateChange::ContractReceiveTokenNetworkRegistry(registry) =>
			Ok(handle_contract_receive_token_network_registry(chain_state, registry)),
		StateChange::ContractReceiveTokenNetworkCreated(created) =>
			handle_contract_receive_token_network_created(chain_state, created),
		StateChange::ContractReceiveChannelClosed(closed) =>
			handle_contract_receive_channel_closed(chain_state, closed),
		StateChange::ReceiveWithdrawConfirmation(confirmation) =>
			handle_receive_withdraw_confirmation(chain_state, confirmation),
		StateChange::ReceiveDelivered(delivered) => {
			let mut chain_state = chain_state;
			acknowledge(
				&mut chain_state,
				delivered.sender,
				|queue| queue.canonical_identifier == CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
				delivered.message_identifier,
				Acknowledgement::Processed,
			);
			Ok(ChainTransition::unchanged(chain_state))
		},
		StateChange::ReceiveProcessed(processed) => {
			let mut chain_state = chain_state;
			acknowledge(
				&mut chain_state,
				processed.sender,
				|_| true,
				processed.message_identifier,
				Acknowledgement::Processed,
			);
			Ok(ChainTransition::unchanged(chain_state))
		},
		state_change =>
			Err(StateTransitionError::invalid(state_change.type_name(), "Unroutable state change")),
	}
}

/// Apply `state_change` to the chain state.
///
/// On `Err` the caller keeps its previous chain state, nothing of the transition is applied.
pub fn state_transition(chain_state: ChainState, state_change: StateChange) -> TransitionResult {
	let mut transition = dispatch(chain_state, state_change.clone())?;
	update_queues(&mut transition, &state_change);
	Ok(transition)
}
