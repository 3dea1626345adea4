use hopline_primitives::{
	hashing::{
		hash_balance_data,
		hash_secret,
	},
	types::{
		Address,
		BlockExpiration,
		Bytes,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		LockedAmount,
		Nonce,
		PaymentIdentifier,
		TokenAmount,
	},
};
use hopline_state_machine::{
	machine::channel::utils::compute_locksroot,
	types::{
		BalanceProofState,
		HashTimeLockState,
		LockedTransferState,
		PendingLocksState,
		RouteState,
		SendLockedTransfer,
		SendMessageEventInner,
	},
};
use web3::signing::Key;

use crate::keys::PrivateKey;

mod decode;

pub fn key(seed: u8) -> PrivateKey {
	PrivateKey::from_raw(&[seed; 32]).expect("Key should be valid")
}

pub fn token_network_address() -> Address {
	Address::from_low_u64_be(0x1002)
}

pub fn token_address() -> Address {
	Address::from_low_u64_be(0x1003)
}

pub fn canonical_identifier() -> CanonicalIdentifier {
	CanonicalIdentifier {
		chain_identifier: ChainID::Goerli,
		token_network_address: token_network_address(),
		channel_identifier: ChannelIdentifier::from(1u64),
	}
}

pub fn secret() -> Bytes {
	Bytes(vec![7u8; 32])
}

/// First locked transfer of `sender` in channel 1, locking `amount` until `expiration`.
pub fn locked_transfer_event(
	sender: &PrivateKey,
	recipient: Address,
	target: Address,
	amount: u64,
	expiration: u64,
) -> SendLockedTransfer {
	let lock = HashTimeLockState::create(
		TokenAmount::from(amount),
		BlockExpiration::from(expiration),
		hash_secret(&secret().0),
	);
	let locksroot = compute_locksroot(&PendingLocksState { locks: vec![lock.encoded.clone()] });
	let locked_amount = LockedAmount::from(amount);
	let balance_proof = BalanceProofState {
		nonce: Nonce::from(1u64),
		transferred_amount: TokenAmount::zero(),
		locked_amount,
		locksroot,
		canonical_identifier: canonical_identifier(),
		balance_hash: hash_balance_data(TokenAmount::zero(), locked_amount, locksroot)
			.expect("Balance hash should be computed"),
		message_hash: None,
		signature: None,
		sender: Some(sender.address()),
	};

	SendLockedTransfer {
		inner: SendMessageEventInner {
			recipient,
			canonical_identifier: canonical_identifier(),
			message_identifier: 42,
		},
		transfer: LockedTransferState {
			payment_identifier: PaymentIdentifier::from(1u64),
			token: token_address(),
			lock,
			initiator: sender.address(),
			target,
			payment_amount: TokenAmount::from(amount),
			message_identifier: 42,
			route_states: vec![RouteState {
				route: vec![sender.address(), recipient, target],
				estimated_fee: TokenAmount::zero(),
			}],
			balance_proof,
			secret: None,
		},
	}
}
