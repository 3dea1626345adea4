use hopline_primitives::{
	constants::SECRET_LENGTH,
	hashing::hash_secret,
};
use rand::{
	distributions::Alphanumeric,
	thread_rng,
	Rng,
};

use crate::types::{
	Bytes,
	Secret,
	SecretHash,
};

pub struct Generator;

impl Generator {
	pub fn random_secret() -> Secret {
		Bytes(
			thread_rng()
				.sample_iter(&Alphanumeric)
				.take(SECRET_LENGTH as usize)
				.collect::<Vec<u8>>(),
		)
	}

	/// A fresh secret along with its hash.
	pub fn secret_pair() -> (Secret, SecretHash) {
		let secret = Self::random_secret();
		let secrethash = hash_secret(&secret.0);
		(secret, secrethash)
	}
}
