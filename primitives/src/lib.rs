#![warn(clippy::missing_docs_in_private_items)]

/// Protocol constants.
pub mod constants;
/// `U256` fields written as decimal strings, for use with `#[serde(with = "...")]`.
pub mod decimal {
	pub use crate::{
		deserializers::u256_from_str as deserialize,
		serializers::u256_to_str as serialize,
	};
}
/// Serde deserializers for wire and storage formats.
pub mod deserializers;
/// Hashing of secrets and balance data.
pub mod hashing;
/// Binary packing of signed payloads.
pub mod packing;
/// Serde serializers for wire and storage formats.
pub mod serializers;
/// Signature hashing and recovery.
pub mod signing;
#[cfg(test)]
mod tests;
/// Conversion traits.
pub mod traits;
/// Base types.
pub mod types;
