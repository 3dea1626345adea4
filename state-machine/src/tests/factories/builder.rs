use super::Keyring;
use crate::{
	constants::{
		DEFAULT_REVEAL_TIMEOUT,
		DEFAULT_SETTLE_TIMEOUT,
	},
	machine::chain,
	types::{
		Address,
		BlockHash,
		BlockNumber,
		CanonicalIdentifier,
		ChainID,
		ChainReceipt,
		ChainState,
		ChannelIdentifier,
		NettingChannelState,
		ContractReceiveChannelDeposit,
		ContractReceiveChannelOpened,
		ContractReceiveTokenNetworkCreated,
		ContractReceiveTokenNetworkRegistry,
		FeeAmount,
		MediationFeeConfig,
		RevealTimeout,
		SettleTimeout,
		StateChange,
		TokenAmount,
		TokenNetworkRegistry,
		TokenNetworkState,
		TransactionChannelDeposit,
		TransactionExecutionStatus,
		TransactionHash,
	},
	views,
};

/// Shared by every node built in a test so that their channels line up.
pub fn token_network_registry_address() -> Address {
	Address::from_low_u64_be(0x1001)
}

pub fn token_network_address() -> Address {
	Address::from_low_u64_be(0x1002)
}

pub fn token_address() -> Address {
	Address::from_low_u64_be(0x1003)
}

pub struct ChainStateInfo {
	pub chain_state: ChainState,
	pub token_network_registry_address: Address,
	pub token_network_address: Address,
	pub token_address: Address,
	pub canonical_identifiers: Vec<CanonicalIdentifier>,
}

impl ChainStateInfo {
	pub fn channel(&self, index: usize) -> &NettingChannelState {
		views::get_channel_by_canonical_identifier(
			&self.chain_state,
			&self.canonical_identifiers[index],
		)
		.expect("Channel should exist")
	}
}

pub struct ChainStateBuilder {
	chain_state: ChainState,
	reveal_timeout: RevealTimeout,
	settle_timeout: SettleTimeout,
	fee_config: MediationFeeConfig,
	canonical_identifiers: Vec<CanonicalIdentifier>,
}

/// Every fixture is created on-chain at this block.
fn genesis() -> BlockNumber {
	BlockNumber::from(1u64)
}

impl ChainStateBuilder {
	pub fn new() -> Self {
		Self::for_node(Keyring::Alice)
	}

	pub fn for_node(node: Keyring) -> Self {
		let chain_state = ChainState::new(ChainID::Goerli, genesis(), BlockHash::zero(), node.address());
		Self {
			chain_state,
			reveal_timeout: RevealTimeout::from(DEFAULT_REVEAL_TIMEOUT),
			settle_timeout: SettleTimeout::from(DEFAULT_SETTLE_TIMEOUT),
			fee_config: MediationFeeConfig::default(),
			canonical_identifiers: vec![],
		}
	}

	fn apply(mut self, state_change: impl Into<StateChange>) -> Self {
		self.chain_state = chain::state_transition(self.chain_state, state_change.into())
			.expect("Fixture state change should apply")
			.new_state;
		self
	}

	pub fn with_reveal_timeout(mut self, reveal_timeout: u64) -> Self {
		self.reveal_timeout = RevealTimeout::from(reveal_timeout);
		self
	}

	/// Flat mediation fee applied to the channels opened afterwards.
	pub fn with_flat_fee(mut self, flat_fee: u64) -> Self {
		self.fee_config.token_to_flat_fee.insert(token_address(), FeeAmount::from(flat_fee));
		self
	}

	pub fn with_token_network_registry(self) -> Self {
		let registry = TokenNetworkRegistry::new(token_network_registry_address(), vec![]);
		let built = self.apply(ContractReceiveTokenNetworkRegistry {
			receipt: ChainReceipt {
				transaction_hash: Some(TransactionHash::random()),
				block_number: genesis(),
				block_hash: BlockHash::random(),
			},
			token_network_registry: registry,
		});
		assert!(built.chain_state.registries.contains_key(&token_network_registry_address()));
		built
	}

	pub fn with_token_network(self) -> Self {
		self.apply(ContractReceiveTokenNetworkCreated {
			receipt: ChainReceipt {
				transaction_hash: Some(TransactionHash::random()),
				block_number: genesis(),
				block_hash: BlockHash::random(),
			},
			token_network_registry_address: token_network_registry_address(),
			token_network: TokenNetworkState::new(token_network_address(), token_address()),
		})
	}

	/// Open channels numbered from 1 in the order given.
	pub fn with_channels(
		mut self,
		channels: Vec<((Address, TokenAmount), (Address, TokenAmount))>,
	) -> Self {
		for (channel_identifier, (ours, partner)) in (1u64..).zip(channels) {
			self = self.with_channel(channel_identifier, ours, partner);
		}
		self
	}

	pub fn with_channel(
		self,
		channel_identifier: u64,
		ours: (Address, TokenAmount),
		partner: (Address, TokenAmount),
	) -> Self {
		let canonical_identifier = CanonicalIdentifier {
			chain_identifier: self.chain_state.chain_id,
			token_network_address: token_network_address(),
			channel_identifier: ChannelIdentifier::from(channel_identifier),
		};
		let channel = NettingChannelState::new(
			canonical_identifier.clone(),
			token_address(),
			token_network_registry_address(),
			ours.0,
			partner.0,
			self.reveal_timeout,
			self.settle_timeout,
			TransactionExecutionStatus::confirmed(genesis()),
			&self.fee_config,
		)
		.expect("Channel timeouts should be valid");

		let mut built = self.apply(ContractReceiveChannelOpened {
			receipt: ChainReceipt {
				transaction_hash: Some(TransactionHash::random()),
				block_number: genesis(),
				block_hash: BlockHash::random(),
			},
			channel,
		});
		for (participant_address, contract_balance) in [ours, partner] {
			if contract_balance.is_zero() {
				continue
			}
			built = built.apply(ContractReceiveChannelDeposit {
				receipt: ChainReceipt {
					transaction_hash: Some(TransactionHash::random()),
					block_number: genesis(),
					block_hash: BlockHash::random(),
				},
				canonical_identifier: canonical_identifier.clone(),
				deposit_transaction: TransactionChannelDeposit {
					participant_address,
					contract_balance,
					deposit_block_number: genesis(),
				},
			});
		}

		built.canonical_identifiers.push(canonical_identifier);
		built
	}

	pub fn build(self) -> ChainStateInfo {
		ChainStateInfo {
			chain_state: self.chain_state,
			token_network_registry_address: token_network_registry_address(),
			token_network_address: token_network_address(),
			token_address: token_address(),
			canonical_identifiers: self.canonical_identifiers,
		}
	}
}
