use ethsign::{
	PublicKey,
	SecretKey,
};

use crate::types::Address;

pub const ALICE: &str = "ALICE";
pub const BOB: &str = "BOB";
pub const CHARLIE: &str = "CHARLIE";
pub const DAVE: &str = "DAVE";

/// Fixed node identities.
#[derive(Clone, Copy, Debug)]
pub enum Keyring {
	Alice,
	Bob,
	Charlie,
	Dave,
}

impl Keyring {
	pub fn private_key(&self) -> SecretKey {
		let mut secret: [u8; 32] = [0; 32];
		let name = match self {
			Self::Alice => ALICE.as_bytes(),
			Self::Bob => BOB.as_bytes(),
			Self::Charlie => CHARLIE.as_bytes(),
			Self::Dave => DAVE.as_bytes(),
		};
		secret[..name.len()].copy_from_slice(name);
		SecretKey::from_raw(&secret).expect("Private key generation should not fail")
	}

	pub fn public_key(&self) -> PublicKey {
		self.private_key().public()
	}

	pub fn address(&self) -> Address {
		Address::from_slice(self.public_key().address())
	}
}
