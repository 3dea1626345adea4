pub trait ToBytes {
	fn to_bytes(&self) -> Vec<u8>;
}

impl ToBytes for web3::types::U256 {
	fn to_bytes(&self) -> Vec<u8> {
		let mut bytes = [0u8; 32];
		self.to_big_endian(&mut bytes);
		bytes.to_vec()
	}
}

impl ToBytes for web3::signing::Signature {
	fn to_bytes(&self) -> Vec<u8> {
		let v = self.v.to_be_bytes();

		let mut b = vec![];
		b.extend(self.r.as_bytes());
		b.extend(self.s.as_bytes());
		b.push(v[v.len() - 1]);
		b
	}
}
