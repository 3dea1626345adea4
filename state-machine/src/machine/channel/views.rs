use crate::{
	constants::DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS,
	types::{
		BlockExpiration,
		BlockNumber,
		LockTimeout,
		RevealTimeout,
	},
};

/// Expiration of a lock created at `block_number`.
pub fn get_safe_initial_expiration(
	block_number: BlockNumber,
	reveal_timeout: RevealTimeout,
	lock_timeout: Option<LockTimeout>,
) -> BlockExpiration {
	if let Some(lock_timeout) = lock_timeout {
		return block_number.saturating_add(lock_timeout)
	}

	block_number.saturating_add(reveal_timeout.saturating_add(reveal_timeout))
}

/// Block at which the sender of a lock may remove it with a LockExpired.
pub fn get_sender_expiration_threshold(expiration: BlockExpiration) -> BlockExpiration {
	expiration.saturating_add(BlockExpiration::from(DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS * 2))
}

/// Block from which the receiver of a lock accepts a LockExpired for it.
pub fn get_receiver_expiration_threshold(expiration: BlockExpiration) -> BlockExpiration {
	expiration.saturating_add(BlockExpiration::from(DEFAULT_NUMBER_OF_BLOCK_CONFIRMATIONS))
}
