use hopline_primitives::hashing::hash_secret;

use super::{
	channel,
	routes,
	secret_registry,
	utils::{
		self,
		update_channel,
	},
};
use crate::{
	constants::{
		CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
		MEDIATION_LOCK_EXPIRATION_DELTA,
	},
	errors::StateTransitionError,
	types::{
		ActionInitMediator,
		Address,
		Block,
		BlockHash,
		BlockNumber,
		CanonicalIdentifier,
		ChainState,
		ChannelStatus,
		ContractReceiveSecretReveal,
		ErrorTransferAborted,
		ErrorUnlockClaimFailed,
		ErrorUnlockFailed,
		Event,
		LockedTransferState,
		MediationPair,
		MediatorTransferState,
		NettingChannelState,
		PayeeState,
		PayerState,
		ReceiveLockExpired,
		ReceiveSecretReveal,
		ReceiveUnlock,
		RouteState,
		Secret,
		SendMessageEventInner,
		SendSecretReveal,
		StateChange,
		UnlockClaimSuccess,
		UnlockSuccess,
		WaitingTransferState,
		WaitingTransferStatus,
	},
	views,
};

pub(super) type TransitionResult = Result<MediatorTransition, StateTransitionError>;

#[derive(Debug)]
pub struct MediatorTransition {
	pub new_state: Option<MediatorTransferState>,
	pub chain_state: ChainState,
	pub events: Vec<Event>,
}

impl MediatorTransition {
	fn unchanged(chain_state: ChainState, new_state: Option<MediatorTransferState>) -> Self {
		Self { new_state, chain_state, events: vec![] }
	}
}

/// The channel a transfer's balance proof belongs to.
fn channel_of<'a>(
	chain_state: &'a ChainState,
	transfer: &LockedTransferState,
) -> Option<&'a NettingChannelState> {
	views::get_channel_by_canonical_identifier(
		chain_state,
		&transfer.balance_proof.canonical_identifier,
	)
}

fn cloned_channel(
	chain_state: &ChainState,
	canonical_identifier: &CanonicalIdentifier,
) -> Option<NettingChannelState> {
	views::get_channel_by_canonical_identifier(chain_state, canonical_identifier).cloned()
}

/// A forwarded transfer pays for the same payment, locks less and expires earlier.
fn is_forwarded_transfer_consistent(
	payee: &LockedTransferState,
	payer: &LockedTransferState,
) -> bool {
	let payment = |transfer: &LockedTransferState| {
		(
			transfer.payment_identifier,
			transfer.token,
			transfer.lock.secrethash,
			transfer.initiator,
			transfer.target,
		)
	};

	payment(payee) == payment(payer) &&
		payee.lock.expiration < payer.lock.expiration &&
		payee.lock.amount <= payer.lock.amount
}

/// Whether the tokens locked by the payer can be claimed by us.
///
/// The payer side must know the secret and either still be in time for an off-chain unlock or
/// have the secret registered on-chain. A payer that already unlocked is always secured.
pub(crate) fn is_payer_lock_secured(
	chain_state: &ChainState,
	pair: &MediationPair,
	block_number: BlockNumber,
) -> bool {
	if pair.payer_state == PayerState::BalanceProof {
		return true
	}

	let lock = &pair.payer_transfer.lock;
	match channel_of(chain_state, &pair.payer_transfer) {
		Some(payer_channel) if payer_channel.partner_state.is_secret_known(lock.secrethash) =>
			lock.is_safe_to_wait(payer_channel.reveal_timeout, block_number) ||
				payer_channel.partner_state.is_secret_known_onchain(lock.secrethash),
		_ => false,
	}
}

/// Every channel holding one of the mediated locks, the waiting one included.
fn locked_channels(task: &MediatorTransferState) -> Vec<CanonicalIdentifier> {
	let waiting = task.waiting_transfer.iter().map(|waiting| &waiting.transfer);
	task.pairs
		.iter()
		.flat_map(|pair| [&pair.payer_transfer, &pair.payee_transfer])
		.chain(waiting)
		.map(|transfer| transfer.balance_proof.canonical_identifier.clone())
		.collect()
}

/// The payer lock of the latest pair expired, a secret is of no use anymore.
fn last_payer_lock_expired(chain_state: &ChainState, task: &MediatorTransferState) -> bool {
	let pair = match task.pairs.last() {
		Some(pair) => pair,
		None => return true,
	};
	let lock = &pair.payer_transfer.lock;

	match channel_of(chain_state, &pair.payer_transfer) {
		Some(payer_channel) => channel::validators::is_lock_expired(
			&payer_channel.partner_state,
			lock,
			chain_state.block_number,
			lock.expiration,
		)
		.is_ok(),
		None => true,
	}
}

fn claim_failed(transfer: &LockedTransferState) -> Event {
	ErrorUnlockClaimFailed {
		identifier: transfer.payment_identifier,
		secrethash: transfer.lock.secrethash,
		reason: "Lock expired".to_owned(),
	}
	.into()
}

/// Chain state and mediator task under transition, with the events emitted so far.
struct Mediation {
	chain_state: ChainState,
	task: MediatorTransferState,
	events: Vec<Event>,
}

impl Mediation {
	fn new(chain_state: ChainState, task: MediatorTransferState) -> Self {
		Self { chain_state, task, events: vec![] }
	}

	fn done(self) -> TransitionResult {
		Ok(MediatorTransition {
			new_state: Some(self.task),
			chain_state: self.chain_state,
			events: self.events,
		})
	}

	/// Forward `payer_transfer` over the first route able to carry it.
	///
	/// Without one, the transfer becomes the waiting transfer and is retried on new blocks.
	fn forward(
		&mut self,
		payer_channel: &NettingChannelState,
		payer_transfer: LockedTransferState,
	) -> Result<(), StateTransitionError> {
		if payer_transfer.balance_proof.sender != Some(payer_channel.partner_state.address) {
			return Err(StateTransitionError::InvalidBalanceProof(
				"Transfer must be signed by the payer".to_owned(),
			))
		}

		let our_address = self.chain_state.our_address;
		let token_network_address = payer_channel.canonical_identifier.token_network_address;
		let routes = routes::filter_acceptable_routes(
			self.task.routes.clone(),
			&[payer_channel.canonical_identifier.channel_identifier],
			&views::get_addresses_to_channels(&self.chain_state),
			token_network_address,
			our_address,
		);

		for route in &routes {
			let payee_channel = route.hop_after(our_address).and_then(|next_hop| {
				views::get_channel_by_token_network_and_partner(
					&self.chain_state,
					token_network_address,
					next_hop,
				)
				.cloned()
			});
			let payee_channel = match payee_channel {
				Some(payee_channel) => payee_channel,
				None => continue,
			};

			if let Some(pair) =
				self.lock_towards_payee(&payer_transfer, payee_channel, route, &routes)?
			{
				self.task.pairs.push(pair);
				self.task.waiting_transfer = None;
				return Ok(())
			}
		}

		self.task.waiting_transfer = Some(WaitingTransferState {
			transfer: payer_transfer,
			status: WaitingTransferStatus::Waiting,
		});
		Ok(())
	}

	/// Lock the payer's amount, minus the payee channel's fee, for the next hop.
	///
	/// `None` when the fee eats the whole amount or the channel cannot carry the lock.
	fn lock_towards_payee(
		&mut self,
		payer_transfer: &LockedTransferState,
		mut payee_channel: NettingChannelState,
		route: &RouteState,
		routes: &[RouteState],
	) -> Result<Option<MediationPair>, StateTransitionError> {
		let payer_lock = &payer_transfer.lock;
		let fee = payee_channel.fee_schedule.fee(payer_lock.amount);
		let amount = match payer_lock.amount.checked_sub(fee) {
			Some(amount) if !amount.is_zero() => amount,
			_ => return Ok(None),
		};

		let expiration =
			payer_lock.expiration.saturating_sub(MEDIATION_LOCK_EXPIRATION_DELTA.into());
		let lock_timeout = expiration.saturating_sub(self.chain_state.block_number);
		if !payee_channel.is_usable_for_mediation(amount, lock_timeout) {
			return Ok(None)
		}

		let our_address = payee_channel.our_state.address;
		let message_identifier = self.chain_state.rng.next_message_identifier();
		let locked_transfer = channel::send_locked_transfer(
			&mut payee_channel,
			payer_transfer.initiator,
			payer_transfer.target,
			amount,
			payer_transfer.payment_amount,
			expiration,
			payer_lock.secrethash,
			message_identifier,
			payer_transfer.payment_identifier,
			routes::prune_route_table(routes.to_vec(), route, our_address),
		)?;
		let payee_address = payee_channel.partner_state.address;
		update_channel(&mut self.chain_state, payee_channel)?;

		let pair = MediationPair {
			payer_transfer: payer_transfer.clone(),
			payee_address,
			payee_transfer: locked_transfer.transfer.clone(),
			payer_state: PayerState::Pending,
			payee_state: PayeeState::Pending,
		};
		self.events.push(locked_transfer.into());
		Ok(Some(pair))
	}

	/// A transfer no route could carry is tried again while its lock is still pending.
	fn retry_waiting_transfer(&mut self) -> Result<(), StateTransitionError> {
		if !self.task.pairs.is_empty() {
			return Ok(())
		}

		let transfer = match &self.task.waiting_transfer {
			Some(waiting) if waiting.status == WaitingTransferStatus::Waiting =>
				waiting.transfer.clone(),
			_ => return Ok(()),
		};
		let canonical_identifier = &transfer.balance_proof.canonical_identifier;
		let payer_channel = match cloned_channel(&self.chain_state, canonical_identifier) {
			Some(channel)
				if channel::validators::is_lock_pending(
					&channel.partner_state,
					transfer.lock.secrethash,
				) =>
				channel,
			_ => return Ok(()),
		};

		self.forward(&payer_channel, transfer)
	}

	/// Whether a secret registration is already underway for one of the payer channels.
	fn registration_started(&self) -> bool {
		let secrethash = self.task.secrethash;
		self.task.pairs.iter().any(|pair| {
			pair.payer_state == PayerState::WaitingUnlock ||
				channel_of(&self.chain_state, &pair.payer_transfer)
					.map(|channel| channel.partner_state.is_secret_known_onchain(secrethash))
					.unwrap_or(false)
		})
	}

	/// Expire the locks of payees that did not learn the secret in time.
	fn expire_payee_locks(&mut self, block_number: BlockNumber) -> Result<(), StateTransitionError> {
		let secrethash = self.task.secrethash;

		for pair in self.task.pairs.iter_mut().filter(|pair| !pair.payee_state.is_final()) {
			let mut payee_channel = match channel_of(&self.chain_state, &pair.payee_transfer) {
				Some(channel) if channel.status() == ChannelStatus::Opened => channel.clone(),
				_ => continue,
			};

			let our_state = &payee_channel.our_state;
			let lock = match our_state.locked.get(&secrethash) {
				Some(lock) => lock.clone(),
				None => match our_state.unlocked.get(&secrethash) {
					Some(unlock) => unlock.lock.clone(),
					None => continue,
				},
			};
			let threshold = channel::views::get_sender_expiration_threshold(lock.expiration);
			if channel::validators::is_lock_expired(our_state, &lock, block_number, threshold)
				.is_err()
			{
				continue
			}

			let lock_expired =
				channel::send_lock_expired(&mut payee_channel, &lock, &mut self.chain_state.rng)?;
			update_channel(&mut self.chain_state, payee_channel)?;

			pair.payee_state = PayeeState::Expired;
			self.events.extend(lock_expired);
			self.events.push(
				ErrorUnlockFailed {
					identifier: pair.payee_transfer.payment_identifier,
					secrethash,
					reason: "Lock expired".to_owned(),
				}
				.into(),
			);
		}

		Ok(())
	}

	/// Give up on payer locks that can no longer be claimed.
	fn expire_payer_locks(&mut self, block_number: BlockNumber) {
		let unresolved = |pair: &&mut MediationPair| pair.is_pending() && !pair.payer_state.is_final();

		for pair in self.task.pairs.iter_mut().filter(unresolved) {
			let payer_channel = match channel_of(&self.chain_state, &pair.payer_transfer) {
				Some(channel) => channel,
				None => continue,
			};
			let lock = &pair.payer_transfer.lock;
			let threshold = channel::views::get_receiver_expiration_threshold(lock.expiration);
			if channel::validators::is_lock_expired(
				&payer_channel.partner_state,
				lock,
				block_number,
				threshold,
			)
			.is_err()
			{
				continue
			}

			pair.payer_state = PayerState::Expired;
			self.events.push(claim_failed(&pair.payer_transfer));
		}

		if let Some(waiting) = self.task.waiting_transfer.as_mut() {
			let threshold =
				channel::views::get_receiver_expiration_threshold(waiting.transfer.lock.expiration);
			if waiting.status != WaitingTransferStatus::Expired && threshold <= block_number {
				waiting.status = WaitingTransferStatus::Expired;
				self.events.push(claim_failed(&waiting.transfer));
			}
		}
	}

	/// Once a payer channel is closed its lock can only be claimed on-chain.
	fn register_if_payer_closed(&mut self, secret: &Secret) {
		let secrethash = self.task.secrethash;
		let block_hash = self.chain_state.block_hash;
		let mut requested = self.registration_started();

		for pair in self.task.pairs.iter_mut().filter(|pair| pair.is_pending()) {
			let payer_channel = match channel_of(&self.chain_state, &pair.payer_transfer) {
				Some(channel) if channel.status() == ChannelStatus::Closed => channel,
				_ => continue,
			};

			pair.payer_state = PayerState::WaitingUnlock;
			if requested {
				continue
			}
			if let Some(lock) = payer_channel.partner_state.get_lock(secrethash) {
				self.events.extend(secret_registry::events_for_onchain_secretreveal(
					payer_channel,
					secret.clone(),
					lock.expiration,
					block_hash,
				));
				requested = true;
			}
		}
	}

	/// Register the secret on-chain for payer locks too close to their expiration to wait for
	/// an off-chain unlock.
	///
	/// Only pairs count. A secret learned while holding a waiting transfer never costs a
	/// transaction.
	fn register_if_in_danger(&mut self, block_number: BlockNumber, block_hash: BlockHash) {
		let mut requested = self.registration_started();

		for pair in self.task.pairs.iter_mut().filter(|pair| pair.is_pending()) {
			if pair.payer_state.is_final() {
				continue
			}
			let payer_channel = match channel_of(&self.chain_state, &pair.payer_transfer) {
				Some(channel) => channel,
				None => continue,
			};

			let lock = pair.payer_transfer.lock.clone();
			let secret = match payer_channel.partner_state.get_secret(lock.secrethash) {
				Some(secret) => secret,
				None => continue,
			};
			if lock.is_safe_to_wait(payer_channel.reveal_timeout, block_number) {
				continue
			}

			pair.payer_state = PayerState::WaitingUnlock;
			if !requested {
				self.events.extend(secret_registry::events_for_onchain_secretreveal(
					payer_channel,
					secret,
					lock.expiration,
					block_hash,
				));
				requested = true;
			}
		}
	}

	/// Record the secret in every channel holding one of the mediated locks.
	///
	/// With `registered_at` the secret counts as registered on-chain at that block.
	fn store_secret(
		&mut self,
		secret: &Secret,
		registered_at: Option<BlockNumber>,
	) -> Result<(), StateTransitionError> {
		let secrethash = self.task.secrethash;
		self.task.secret = Some(secret.clone());

		for canonical_identifier in locked_channels(&self.task) {
			let mut channel = match cloned_channel(&self.chain_state, &canonical_identifier) {
				Some(channel) => channel,
				None => continue,
			};
			match registered_at {
				Some(block_number) => channel::register_onchain_secret(
					&mut channel,
					secret.clone(),
					secrethash,
					block_number,
				),
				None => channel::register_offchain_secret(&mut channel, secret.clone(), secrethash),
			}
			update_channel(&mut self.chain_state, channel)?;
		}

		Ok(())
	}

	/// Reveal the secret to every payer still waiting for it, last hop first.
	fn reveal_to_payers(&mut self, secret: &Secret) {
		let secrethash = hash_secret(&secret.0);

		for pair in self.task.pairs.iter_mut().rev() {
			if !pair.payee_state.knows_secret() || pair.payer_state != PayerState::Pending {
				continue
			}
			let recipient = match pair.payer_transfer.balance_proof.sender {
				Some(sender) => sender,
				None => continue,
			};

			pair.payer_state = PayerState::SecretRevealed;
			self.events.push(
				SendSecretReveal {
					inner: SendMessageEventInner {
						recipient,
						canonical_identifier: CANONICAL_IDENTIFIER_UNORDERED_QUEUE,
						message_identifier: self.chain_state.rng.next_message_identifier(),
					},
					secret: secret.clone(),
					secrethash,
				}
				.into(),
			);
		}
	}

	/// Unlock every payee that knows the secret, as long as its payer lock is secured.
	fn unlock_payees(&mut self, secret: &Secret) -> Result<(), StateTransitionError> {
		let secrethash = self.task.secrethash;
		let block_number = self.chain_state.block_number;

		for pair in self.task.pairs.iter_mut().rev() {
			if !pair.payee_state.knows_secret() || pair.payee_state.is_paid() {
				continue
			}
			if !is_payer_lock_secured(&self.chain_state, pair, block_number) {
				continue
			}
			let mut payee_channel = match channel_of(&self.chain_state, &pair.payee_transfer) {
				Some(channel) if channel.status() == ChannelStatus::Opened => channel.clone(),
				_ => continue,
			};

			let message_identifier = self.chain_state.rng.next_message_identifier();
			let unlock = match channel::send_unlock(
				&mut payee_channel,
				message_identifier,
				pair.payee_transfer.payment_identifier,
				secret.clone(),
				secrethash,
				block_number,
			) {
				Ok(unlock) => unlock,
				Err(_) => continue,
			};
			update_channel(&mut self.chain_state, payee_channel)?;

			pair.payee_state = PayeeState::BalanceProof;
			self.events.push(unlock.into());
			self.events.push(
				UnlockSuccess {
					identifier: pair.payer_transfer.payment_identifier,
					secrethash: pair.payer_transfer.lock.secrethash,
				}
				.into(),
			);
		}

		Ok(())
	}

	/// The payee at `payee_address` revealed the secret.
	fn learn_secret(
		&mut self,
		secret: &Secret,
		payee_address: Address,
	) -> Result<(), StateTransitionError> {
		self.store_secret(secret, None)?;
		for pair in self.task.pairs.iter_mut() {
			if pair.payee_address == payee_address && pair.payee_state == PayeeState::Pending {
				pair.payee_state = PayeeState::SecretRevealed;
			}
		}

		self.register_if_payer_closed(secret);
		self.reveal_to_payers(secret);
		self.unlock_payees(secret)
	}

	/// Apply a payer's Unlock to the pairs it pays for.
	fn claim_from_payer(&mut self, unlock: ReceiveUnlock) -> Result<(), StateTransitionError> {
		let canonical_identifier = unlock.balance_proof.canonical_identifier.clone();
		let mut from_payer = false;

		for pair in self.task.pairs.iter_mut() {
			let payer_proof = &pair.payer_transfer.balance_proof;
			if payer_proof.sender != Some(unlock.sender) ||
				payer_proof.canonical_identifier != canonical_identifier
			{
				continue
			}

			let mut payer_channel = cloned_channel(&self.chain_state, &canonical_identifier)
				.ok_or_else(|| StateTransitionError::UnknownChannel(canonical_identifier.clone()))?;
			let unlocked = channel::handle_unlock(&mut payer_channel, &unlock)?;
			update_channel(&mut self.chain_state, payer_channel)?;
			from_payer = true;

			if unlocked.is_empty() {
				continue
			}
			self.events.extend(unlocked);
			self.events.push(
				UnlockClaimSuccess {
					identifier: pair.payee_transfer.payment_identifier,
					secrethash: pair.payee_transfer.lock.secrethash,
				}
				.into(),
			);
			pair.payer_state = PayerState::BalanceProof;
		}

		if !from_payer {
			return Err(StateTransitionError::invalid(
				"ReceiveUnlock",
				"Unlock does not come from a payer of this transfer",
			))
		}
		if self.task.secret.is_none() {
			self.task.secret = Some(unlock.secret);
		}

		Ok(())
	}

	/// Apply a payer's LockExpired, either to its pairs or to the waiting transfer.
	fn expire_from_payer(
		&mut self,
		lock_expired: ReceiveLockExpired,
	) -> Result<(), StateTransitionError> {
		let canonical_identifier = lock_expired.balance_proof.canonical_identifier.clone();
		let in_channel = |transfer: &LockedTransferState| {
			transfer.balance_proof.canonical_identifier == canonical_identifier
		};

		let from_payer = self.task.pairs.iter().any(|pair| in_channel(&pair.payer_transfer));
		let from_waiting =
			self.task.waiting_transfer.iter().any(|waiting| in_channel(&waiting.transfer));
		if !from_payer && !from_waiting {
			return Err(StateTransitionError::invalid(
				"ReceiveLockExpired",
				"LockExpired does not come from a payer of this transfer",
			))
		}

		let mut payer_channel = cloned_channel(&self.chain_state, &canonical_identifier)
			.ok_or_else(|| StateTransitionError::UnknownChannel(canonical_identifier.clone()))?;
		let events = channel::handle_receive_lock_expired(
			&mut payer_channel,
			&lock_expired,
			self.chain_state.block_number,
		)?;
		let lock_removed = payer_channel.partner_state.get_lock(self.task.secrethash).is_none();
		update_channel(&mut self.chain_state, payer_channel)?;
		self.events.extend(events);

		if !lock_removed {
			return Ok(())
		}
		for pair in self.task.pairs.iter_mut() {
			if in_channel(&pair.payer_transfer) {
				pair.payer_state = PayerState::Expired;
			}
		}
		if let Some(waiting) = self.task.waiting_transfer.as_mut() {
			if in_channel(&waiting.transfer) {
				waiting.status = WaitingTransferStatus::Expired;
			}
		}

		Ok(())
	}
}

fn handle_init(mut chain_state: ChainState, init: ActionInitMediator) -> TransitionResult {
	let payer_transfer = init.from_transfer;
	let canonical_identifier = payer_transfer.balance_proof.canonical_identifier.clone();
	let mut payer_channel = cloned_channel(&chain_state, &canonical_identifier)
		.ok_or(StateTransitionError::UnknownChannel(canonical_identifier))?;

	let events = channel::handle_receive_locked_transfer(
		&mut payer_channel,
		&payer_transfer,
		chain_state.block_number,
	)?;
	if events.is_empty() {
		return Ok(MediatorTransition { new_state: None, chain_state, events })
	}
	update_channel(&mut chain_state, payer_channel.clone())?;

	let task = MediatorTransferState {
		secrethash: payer_transfer.lock.secrethash,
		routes: init.candidate_route_states,
		secret: None,
		pairs: vec![],
		waiting_transfer: None,
	};
	let mut mediation = Mediation { chain_state, task, events };
	mediation.forward(&payer_channel, payer_transfer)?;
	mediation.done()
}

fn handle_block(
	chain_state: ChainState,
	task: MediatorTransferState,
	block: Block,
) -> TransitionResult {
	let mut mediation = Mediation::new(chain_state, task);
	mediation.retry_waiting_transfer()?;
	mediation.expire_payee_locks(block.block_number)?;
	mediation.register_if_in_danger(block.block_number, block.block_hash);
	mediation.expire_payer_locks(block.block_number);
	mediation.done()
}

fn handle_offchain_secret_reveal(
	chain_state: ChainState,
	task: MediatorTransferState,
	reveal: ReceiveSecretReveal,
) -> TransitionResult {
	let from_payee = task.pairs.iter().any(|pair| pair.payee_address == reveal.sender);
	if !from_payee ||
		!utils::is_valid_secret_reveal(&reveal, task.secrethash) ||
		last_payer_lock_expired(&chain_state, &task)
	{
		return Ok(MediatorTransition::unchanged(chain_state, Some(task)))
	}

	let mut mediation = Mediation::new(chain_state, task);
	mediation.learn_secret(&reveal.secret, reveal.sender)?;
	mediation.done()
}

fn handle_onchain_secret_reveal(
	chain_state: ChainState,
	task: MediatorTransferState,
	reveal: ContractReceiveSecretReveal,
) -> TransitionResult {
	if !utils::is_valid_onchain_secret_reveal(&reveal, task.secrethash) {
		return Ok(MediatorTransition::unchanged(chain_state, Some(task)))
	}

	let mut mediation = Mediation::new(chain_state, task);
	mediation.store_secret(&reveal.secret, Some(reveal.block_number))?;
	mediation.unlock_payees(&reveal.secret)?;
	mediation.done()
}

/// Drop the task once none of its channels holds the lock anymore.
fn clear_if_finalized(transition: MediatorTransition) -> MediatorTransition {
	let task = match &transition.new_state {
		Some(task) => task,
		None => return transition,
	};

	let lock_pending = locked_channels(task).iter().any(|canonical_identifier| {
		views::get_channel_by_canonical_identifier(&transition.chain_state, canonical_identifier)
			.map(|channel| channel::lock_exists_in_either_channel_side(channel, task.secrethash))
			.unwrap_or(false)
	});
	if lock_pending {
		return transition
	}

	MediatorTransition { new_state: None, ..transition }
}

/// Check the mediator task after a transition.
///
/// A payee must never be unlocked while the tokens of its payer are not secured.
pub(crate) fn sanity_check(
	previous_state: Option<&MediatorTransferState>,
	transition: &MediatorTransition,
) -> Result<(), String> {
	let task = match &transition.new_state {
		Some(task) => task,
		None => return Ok(()),
	};
	let chain_state = &transition.chain_state;

	for (index, pair) in task.pairs.iter().enumerate() {
		if pair.payer_transfer.lock.secrethash != task.secrethash {
			return Err("Secrethash mismatch".to_owned())
		}
		if !is_forwarded_transfer_consistent(&pair.payee_transfer, &pair.payer_transfer) {
			return Err("Payee and payer transfers are too different".to_owned())
		}
		if pair.payee_state.is_paid() && task.secret.is_none() {
			return Err("Payee was paid without a known secret".to_owned())
		}

		let newly_unlocked = pair.payee_state == PayeeState::BalanceProof &&
			previous_state
				.and_then(|previous| previous.pairs.get(index))
				.map_or(true, |previous| previous.payee_state != PayeeState::BalanceProof);
		if newly_unlocked && !is_payer_lock_secured(chain_state, pair, chain_state.block_number) {
			return Err(format!(
				"Payee {} was unlocked while the payer lock is not secured",
				pair.payee_address
			))
		}
	}

	Ok(())
}

pub fn state_transition(
	chain_state: ChainState,
	mediator_state: Option<MediatorTransferState>,
	state_change: StateChange,
) -> TransitionResult {
	let previous_chain_state = chain_state.clone();
	let previous_state = mediator_state.clone();

	let transition = match (mediator_state, state_change) {
		(None, StateChange::ActionInitMediator(init)) => handle_init(chain_state, init),
		(None, state_change) => Err(StateTransitionError::invalid(
			state_change.type_name(),
			"Mediator state change without a mediator state",
		)),
		(Some(task), StateChange::Block(block)) => handle_block(chain_state, task, block),
		(Some(task), StateChange::ReceiveSecretReveal(reveal)) =>
			handle_offchain_secret_reveal(chain_state, task, reveal),
		(Some(task), StateChange::ContractReceiveSecretReveal(reveal)) =>
			handle_onchain_secret_reveal(chain_state, task, reveal),
		(Some(task), StateChange::ReceiveUnlock(unlock)) => {
			let mut mediation = Mediation::new(chain_state, task);
			mediation.claim_from_payer(unlock)?;
			mediation.done()
		},
		(Some(task), StateChange::ReceiveLockExpired(lock_expired)) => {
			let mut mediation = Mediation::new(chain_state, task);
			mediation.expire_from_payer(lock_expired)?;
			mediation.done()
		},
		(task, _) => Ok(MediatorTransition::unchanged(chain_state, task)),
	}?;

	if let Err(reason) = sanity_check(previous_state.as_ref(), &transition) {
		let secrethash =
			transition.new_state.as_ref().map(|task| task.secrethash).unwrap_or_default();
		return Ok(MediatorTransition {
			new_state: None,
			chain_state: previous_chain_state,
			events: vec![ErrorTransferAborted { secrethash, reason }.into()],
		})
	}

	Ok(clear_if_finalized(transition))
}
