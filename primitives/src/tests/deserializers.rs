use serde::Deserialize;
use serde_json::{
	json,
	Value,
};

use crate::{
	deserializers::{
		signature_from_str,
		u256_from_str,
		u64_from_str,
	},
	types::{
		BlockNumber,
		Bytes,
		ChainID,
		Signature,
		U256,
	},
};

#[derive(Deserialize)]
struct Amount {
	#[serde(deserialize_with = "u256_from_str")]
	value: U256,
}

#[derive(Deserialize)]
struct Identifier {
	#[serde(deserialize_with = "u64_from_str")]
	value: u64,
}

#[derive(Deserialize)]
struct Signed {
	#[serde(deserialize_with = "signature_from_str")]
	value: Signature,
}

fn field<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, serde_json::Error> {
	serde_json::from_value(json!({ "value": value }))
}

#[test]
fn test_amounts_are_decimal_strings() {
	let amount: Amount = field(json!("340282366920938463463374607431768211456")).expect("Amount");
	assert_eq!(amount.value, U256::from(u128::MAX) + 1);

	assert!(field::<Amount>(json!(5)).is_err());
	assert!(field::<Amount>(json!("0x05")).is_err());
}

#[test]
fn test_identifiers_accept_numbers_and_strings() {
	let from_number: Identifier = field(json!(123)).expect("Identifier");
	let from_string: Identifier = field(json!("123")).expect("Identifier");
	assert_eq!(from_number.value, 123);
	assert_eq!(from_string.value, 123);

	assert!(field::<Identifier>(json!("12a")).is_err());
	assert!(field::<Identifier>(json!(-1)).is_err());
}

#[test]
fn test_signature_prefix_is_optional() {
	let signature = [7u8; 65];
	for encoded in [hex::encode(signature), format!("0x{}", hex::encode(signature))] {
		let signed: Signed = field(json!(encoded)).expect("Signature");
		assert_eq!(signed.value, Bytes(signature.to_vec()));
	}

	assert!(field::<Signed>(json!("0xzz")).is_err());
}

#[test]
fn test_chain_id_from_number_or_string() {
	assert_eq!(serde_json::from_value::<ChainID>(json!(1)).ok(), Some(ChainID::Mainnet));
	assert_eq!(serde_json::from_value::<ChainID>(json!("5")).ok(), Some(ChainID::Goerli));
	assert_eq!(
		serde_json::from_value::<ChainID>(json!("123")).ok(),
		Some(ChainID::Private(U256::from(123)))
	);
}

#[test]
fn test_private_chain_id_is_stored_as_string() {
	let encoded = serde_json::to_string(&ChainID::Private(U256::from(1337))).expect("Should serialize");
	assert_eq!(encoded, "\"1337\"");
	let decoded: ChainID = serde_json::from_str(&encoded).expect("Should deserialize");
	assert_eq!(decoded, ChainID::Private(U256::from(1337)));
}

#[test]
fn test_block_number_is_stored_as_number() {
	let block_number = BlockNumber::from(123u64);
	assert_eq!(serde_json::to_value(block_number).ok(), Some(json!(123)));
	assert_eq!(serde_json::from_value::<BlockNumber>(json!("123")).ok(), Some(block_number));
}
