use hopline_primitives::types::{
	Address,
	H256,
	TokenAmount,
};
use hopline_state_machine::types::RouteState;
use serde::{
	Deserialize,
	Serialize,
};
use web3::signing::keccak256;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouteMetadata {
	pub route: Vec<Address>,
}

/// Routing hints travelling with a locked transfer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	pub routes: Vec<RouteMetadata>,
}

impl Metadata {
	/// Keccak of the JSON encoding, committed to by the transfer's message hash.
	pub fn hash(&self) -> H256 {
		let data = serde_json::to_vec(self).unwrap_or_default();
		H256::from_slice(&keccak256(&data))
	}

	/// Candidate routes for the receiving node. Fees are not carried on the wire.
	pub fn route_states(&self) -> Vec<RouteState> {
		self.routes
			.iter()
			.map(|route| RouteState { route: route.route.clone(), estimated_fee: TokenAmount::zero() })
			.collect()
	}
}

impl From<&[RouteState]> for Metadata {
	fn from(route_states: &[RouteState]) -> Self {
		let routes = route_states
			.iter()
			.map(|route_state| RouteMetadata { route: route_state.route.clone() })
			.collect();
		Self { routes }
	}
}
