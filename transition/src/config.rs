use std::collections::HashMap;

use hopline_primitives::types::{
	Address,
	TokenAmount,
	TokenNetworkAddress,
	U256,
};
use serde::{
	Deserialize,
	Serialize,
};

use crate::errors::TransitionError;

/// Number of logged state changes between two snapshots.
pub const DEFAULT_SNAPSHOT_STATE_CHANGE_COUNT: u32 = 500;

/// Where routes come from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
	/// Routes are computed locally, path finding services are not told about our channels.
	Private,
	PFS,
}

impl Default for RoutingMode {
	fn default() -> Self {
		RoutingMode::PFS
	}
}

/// Path finding and monitoring service settings.
///
/// Amounts are 0x-prefixed hex quantities.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
	pub routing_mode: RoutingMode,
	pub monitoring_enabled: bool,
	pub monitoring_service_address: Address,
	pub monitoring_reward: TokenAmount,
	/// Channels holding less than this for us are not worth a monitoring request.
	pub min_monitoring_balance: HashMap<TokenNetworkAddress, TokenAmount>,
}

impl Default for ServicesConfig {
	fn default() -> Self {
		Self {
			routing_mode: RoutingMode::default(),
			monitoring_enabled: false,
			monitoring_service_address: Address::zero(),
			monitoring_reward: U256::from(5u64) * U256::exp10(18),
			min_monitoring_balance: HashMap::new(),
		}
	}
}

impl ServicesConfig {
	pub fn monitoring_threshold(&self, token_network_address: &TokenNetworkAddress) -> TokenAmount {
		self.min_monitoring_balance
			.get(token_network_address)
			.copied()
			.unwrap_or_default()
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
	pub snapshot_state_change_count: u32,
	pub services: ServicesConfig,
}

impl Default for TransitionConfig {
	fn default() -> Self {
		Self {
			snapshot_state_change_count: DEFAULT_SNAPSHOT_STATE_CHANGE_COUNT,
			services: ServicesConfig::default(),
		}
	}
}

impl TransitionConfig {
	pub fn from_json(data: &str) -> Result<Self, TransitionError> {
		serde_json::from_str(data).map_err(TransitionError::Config)
	}
}
