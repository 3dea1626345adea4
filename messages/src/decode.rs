use hopline_primitives::{
	hashing::hash_secret,
	types::Address,
};
use hopline_state_machine::types::{
	ActionInitMediator,
	ActionInitTarget,
	HashTimeLockState,
	HopState,
	LockedTransferState,
	ReceiveDelivered,
	ReceiveLockExpired,
	ReceiveProcessed,
	ReceiveSecretRequest,
	ReceiveSecretReveal,
	ReceiveUnlock,
	ReceiveWithdrawConfirmation,
	ReceiveWithdrawExpired,
	ReceiveWithdrawRequest,
	StateChange,
};

use crate::{
	errors::MessageError,
	messages::{
		LockedTransfer,
		MessageInner,
		SignedEnvelopeMessage,
	},
};

/// Turn a message received from a peer into the state change it stands for.
///
/// The sender is always the recovered signer of the message, never a claimed field.
pub fn decode(message: MessageInner, our_address: Address) -> Result<StateChange, MessageError> {
	let sender = message.sender()?;

	let state_change = match message {
		MessageInner::LockedTransfer(message) =>
			decode_locked_transfer(message, sender, our_address)?,
		MessageInner::LockExpired(message) => {
			let balance_proof = message.envelope.balance_proof(
				message.message_hash(),
				&message.signature,
				sender,
			)?;
			ReceiveLockExpired {
				sender,
				secrethash: message.secrethash,
				message_identifier: message.message_identifier,
				balance_proof,
			}
			.into()
		},
		MessageInner::SecretRequest(message) => ReceiveSecretRequest {
			sender,
			payment_identifier: message.payment_identifier,
			amount: message.amount,
			expiration: message.expiration,
			secrethash: message.secrethash,
		}
		.into(),
		MessageInner::SecretReveal(message) => ReceiveSecretReveal {
			sender,
			secrethash: hash_secret(&message.secret.0),
			secret: message.secret,
		}
		.into(),
		MessageInner::Unlock(message) => {
			let balance_proof = message.envelope.balance_proof(
				message.message_hash(),
				&message.signature,
				sender,
			)?;
			ReceiveUnlock {
				sender,
				message_identifier: message.message_identifier,
				secrethash: hash_secret(&message.secret.0),
				secret: message.secret,
				balance_proof,
			}
			.into()
		},
		MessageInner::WithdrawRequest(message) => ReceiveWithdrawRequest {
			sender,
			message_identifier: message.data.message_identifier,
			canonical_identifier: message.data.canonical_identifier(),
			total_withdraw: message.data.total_withdraw,
			nonce: message.data.nonce,
			expiration: message.data.expiration,
			signature: message.signature,
			participant: message.data.participant,
		}
		.into(),
		MessageInner::WithdrawConfirmation(message) => ReceiveWithdrawConfirmation {
			sender,
			message_identifier: message.data.message_identifier,
			canonical_identifier: message.data.canonical_identifier(),
			total_withdraw: message.data.total_withdraw,
			nonce: message.data.nonce,
			expiration: message.data.expiration,
			signature: message.signature,
			participant: message.data.participant,
		}
		.into(),
		MessageInner::WithdrawExpired(message) => ReceiveWithdrawExpired {
			sender,
			message_identifier: message.data.message_identifier,
			canonical_identifier: message.data.canonical_identifier(),
			total_withdraw: message.data.total_withdraw,
			nonce: message.data.nonce,
			expiration: message.data.expiration,
			participant: message.data.participant,
		}
		.into(),
		MessageInner::Processed(message) =>
			ReceiveProcessed { sender, message_identifier: message.message_identifier }.into(),
		MessageInner::Delivered(message) =>
			ReceiveDelivered { sender, message_identifier: message.delivered_message_identifier }
				.into(),
	};

	Ok(state_change)
}

/// A locked transfer starts a target task when it ends with us, a mediator task otherwise.
fn decode_locked_transfer(
	message: LockedTransfer,
	sender: Address,
	our_address: Address,
) -> Result<StateChange, MessageError> {
	if message.recipient != our_address {
		return Err(MessageError::Malformed(format!(
			"Locked transfer is addressed to {:?}",
			message.recipient
		)))
	}

	let balance_proof =
		message.envelope.balance_proof(message.message_hash(), &message.signature, sender)?;
	let from_hop = HopState {
		node_address: sender,
		channel_identifier: message.envelope.channel_identifier,
	};
	let route_states = message.metadata.route_states();
	let transfer = LockedTransferState {
		payment_identifier: message.payment_identifier,
		token: message.token,
		lock: HashTimeLockState::create(
			message.lock.amount,
			message.lock.expiration,
			message.lock.secrethash,
		),
		initiator: message.initiator,
		target: message.target,
		payment_amount: message.payment_amount,
		message_identifier: message.message_identifier,
		route_states: route_states.clone(),
		balance_proof: balance_proof.clone(),
		secret: None,
	};

	if message.target == our_address {
		return Ok(ActionInitTarget { sender, balance_proof, from_hop, transfer }.into())
	}

	Ok(ActionInitMediator {
		sender,
		balance_proof,
		from_hop,
		candidate_route_states: route_states,
		from_transfer: transfer,
	}
	.into())
}
