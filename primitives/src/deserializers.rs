use std::{
	fmt,
	marker::PhantomData,
	str::FromStr,
};

use serde::{
	de::{
		Error,
		Visitor,
	},
	Deserialize,
	Deserializer,
};
use web3::types::{
	Bytes,
	U256,
};

use crate::types::{
	ChainID,
	U64,
};

/// Accepts an unsigned integer written either as a JSON number or as a string.
struct NumberOrString<T>(PhantomData<T>);

impl<T> NumberOrString<T> {
	fn new() -> Self {
		Self(PhantomData)
	}
}

impl<'de, T> Visitor<'de> for NumberOrString<T>
where
	T: From<u64> + FromStr,
{
	type Value = T;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("an unsigned integer or a string holding one")
	}

	fn visit_u64<E: Error>(self, value: u64) -> Result<T, E> {
		Ok(T::from(value))
	}

	fn visit_str<E: Error>(self, value: &str) -> Result<T, E> {
		value.parse().map_err(|_| E::custom(format!("`{}` is not an unsigned integer", value)))
	}
}

/// Token amounts travel as decimal strings since they do not fit a JSON number.
pub fn u256_from_str<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let digits = String::deserialize(deserializer)?;
	U256::from_dec_str(&digits)
		.map_err(|e| D::Error::custom(format!("`{}` is not a decimal amount: {:?}", digits, e)))
}

pub fn u64_from_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
	D: Deserializer<'de>,
{
	deserializer.deserialize_any(NumberOrString::<u64>::new())
}

/// Hex encoded, with or without the `0x` prefix.
pub fn signature_from_str<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
	D: Deserializer<'de>,
{
	let encoded = String::deserialize(deserializer)?;
	hex::decode(encoded.trim_start_matches("0x")).map(Bytes).map_err(D::Error::custom)
}

impl<'de> Deserialize<'de> for ChainID {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(NumberOrString::<ChainID>::new())
	}
}

impl<'de> Deserialize<'de> for U64 {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(NumberOrString::<U64>::new())
	}
}
