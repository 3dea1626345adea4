use web3::{
	signing::RecoveryError,
	types::Address,
};

/// Keccak of `data` behind the `personal_sign` prefix, which carries the data length in
/// decimal.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
	let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", data.len()).into_bytes();
	prefixed.extend_from_slice(data);
	web3::signing::keccak256(&prefixed)
}

/// Recover the signer of `data` from a 65 byte `r ‖ s ‖ v` signature.
pub fn recover(data: &[u8], signature: &[u8]) -> Result<Address, RecoveryError> {
	if signature.len() != 65 {
		return Err(RecoveryError::InvalidSignature)
	}
	let data_hash = hash_data(data);
	let recovery_id = signature[64] as i32 - 27;
	web3::signing::recover(&data_hash, &signature[..64], recovery_id)
}
