use sha2::{
	Digest,
	Sha256,
};
use web3::signing::keccak256;

use crate::{
	constants::LOCKSROOT_OF_NO_LOCKS,
	traits::ToBytes,
	types::{
		BalanceHash,
		LockedAmount,
		Locksroot,
		SecretHash,
		TokenAmount,
	},
};

/// Locks commit to the sha256 of their secret.
pub fn hash_secret(secret: &[u8]) -> SecretHash {
	SecretHash::from_slice(&Sha256::digest(secret))
}

/// Hash the balance data committed to by a balance proof.
///
/// The balance data of a channel side that never transferred or locked anything hashes to zero.
pub fn hash_balance_data(
	transferred_amount: TokenAmount,
	locked_amount: LockedAmount,
	locksroot: Locksroot,
) -> Result<BalanceHash, String> {
	if locksroot.is_zero() {
		return Err("Can't hash empty locksroot".to_owned())
	}

	if transferred_amount.is_zero() &&
		locked_amount.is_zero() &&
		locksroot == *LOCKSROOT_OF_NO_LOCKS
	{
		return Ok(BalanceHash::zero())
	}

	let data =
		[transferred_amount.to_bytes(), locked_amount.to_bytes(), locksroot.0.to_vec()].concat();
	Ok(BalanceHash::from(keccak256(&data)))
}
