use std::sync::Arc;

use async_trait::async_trait;
use hopline_messages::{
	decode::decode,
	keys::PrivateKey,
	messages::{
		to_message,
		OutgoingMessage,
		ServiceMessage,
	},
};
use hopline_primitives::{
	hashing::{
		hash_balance_data,
		hash_secret,
	},
	types::{
		Address,
		BlockExpiration,
		BlockHash,
		BlockNumber,
		Bytes,
		CanonicalIdentifier,
		ChainID,
		ChannelIdentifier,
		LockedAmount,
		Nonce,
		PaymentIdentifier,
		RevealTimeout,
		SettleTimeout,
		TokenAmount,
	},
};
use hopline_state_machine::{
	machine::channel::utils::compute_locksroot,
	types::{
		BalanceProofState,
		ChainReceipt,
		NettingChannelState,
		ContractReceiveChannelDeposit,
		ContractReceiveChannelOpened,
		ContractReceiveTokenNetworkRegistry,
		ContractSendEvent,
		Event,
		HashTimeLockState,
		LockedTransferState,
		MediationFeeConfig,
		PendingLocksState,
		RouteState,
		SendLockedTransfer,
		SendMessageEventInner,
		StateChange,
		TokenNetworkRegistry,
		TokenNetworkState,
		TransactionChannelDeposit,
		TransactionExecutionStatus,
	},
};
use hopline_storage::state::StateStorage;
use parking_lot::Mutex;
use rusqlite::Connection;
use web3::signing::Key;

use crate::{
	config::TransitionConfig,
	errors::EffectError,
	events::EffectExecutor,
	manager::StateManager,
};

mod services;
mod transitioner;

pub fn key(seed: u8) -> PrivateKey {
	PrivateKey::from_raw(&[seed; 32]).expect("Key should be valid")
}

pub fn registry_address() -> Address {
	Address::from_low_u64_be(0x1001)
}

pub fn token_network_address() -> Address {
	Address::from_low_u64_be(0x1002)
}

pub fn token_address() -> Address {
	Address::from_low_u64_be(0x1003)
}

pub fn canonical_identifier() -> CanonicalIdentifier {
	CanonicalIdentifier {
		chain_identifier: ChainID::Goerli,
		token_network_address: token_network_address(),
		channel_identifier: ChannelIdentifier::from(1u64),
	}
}

pub fn secret() -> Bytes {
	Bytes(vec![7u8; 32])
}

pub fn storage() -> Arc<StateStorage> {
	let conn = Connection::open_in_memory().expect("In memory database should open");
	let storage = StateStorage::new(conn);
	storage.setup_database().expect("Database should be set up");
	Arc::new(storage)
}

pub fn state_manager(
	storage: Arc<StateStorage>,
	config: &TransitionConfig,
	our_address: Address,
) -> StateManager {
	StateManager::restore_or_init(
		storage,
		config,
		ChainID::Goerli,
		our_address,
		BlockNumber::from(1u64),
		BlockHash::zero(),
	)
	.expect("State should be initialized")
}

/// Registry, channel with `partner` and a deposit of 100 by the partner.
pub fn channel_setup(our_address: Address, partner: Address) -> Vec<StateChange> {
	let registry = ContractReceiveTokenNetworkRegistry {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		token_network_registry: TokenNetworkRegistry::new(
			registry_address(),
			vec![TokenNetworkState::new(token_network_address(), token_address())],
		),
	};

	let channel = NettingChannelState::new(
		canonical_identifier(),
		token_address(),
		registry_address(),
		our_address,
		partner,
		RevealTimeout::from(10u64),
		SettleTimeout::from(500u64),
		TransactionExecutionStatus::confirmed(BlockNumber::from(1u64)),
		&MediationFeeConfig::default(),
	)
	.expect("Channel timeouts should be valid");
	let opened = ContractReceiveChannelOpened {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		channel,
	};

	let deposit = ContractReceiveChannelDeposit {
		receipt: ChainReceipt {
			transaction_hash: None,
			block_number: BlockNumber::from(1u64),
			block_hash: BlockHash::zero(),
		},
		canonical_identifier: canonical_identifier(),
		deposit_transaction: TransactionChannelDeposit {
			participant_address: partner,
			contract_balance: TokenAmount::from(100u64),
			deposit_block_number: BlockNumber::from(1u64),
		},
	};

	vec![registry.into(), opened.into(), deposit.into()]
}

/// A locked transfer of 10 from `sender` that ends at us, decoded the way the transport would.
pub fn received_transfer(sender: &PrivateKey, our_address: Address) -> StateChange {
	let amount = TokenAmount::from(10u64);
	let lock =
		HashTimeLockState::create(amount, BlockExpiration::from(100u64), hash_secret(&secret().0));
	let locksroot = compute_locksroot(&PendingLocksState { locks: vec![lock.encoded.clone()] });
	let locked_amount = LockedAmount::from(amount);
	let balance_proof = BalanceProofState {
		nonce: Nonce::from(1u64),
		transferred_amount: TokenAmount::zero(),
		locked_amount,
		locksroot,
		canonical_identifier: canonical_identifier(),
		balance_hash: hash_balance_data(TokenAmount::zero(), locked_amount, locksroot)
			.expect("Balance hash should be computed"),
		message_hash: None,
		signature: None,
		sender: Some(sender.address()),
	};
	let event = SendLockedTransfer {
		inner: SendMessageEventInner {
			recipient: our_address,
			canonical_identifier: canonical_identifier(),
			message_identifier: 42,
		},
		transfer: LockedTransferState {
			payment_identifier: PaymentIdentifier::from(1u64),
			token: token_address(),
			lock,
			initiator: sender.address(),
			target: our_address,
			payment_amount: amount,
			message_identifier: 42,
			route_states: vec![RouteState {
				route: vec![sender.address(), our_address],
				estimated_fee: TokenAmount::zero(),
			}],
			balance_proof,
			secret: None,
		},
	};

	let mut message = to_message(event.into());
	message.sign(sender).expect("Signing should succeed");
	decode(message.inner, our_address).expect("Transfer should decode")
}

/// Records every effect it is handed.
#[derive(Default)]
pub struct RecordingExecutor {
	pub messages: Mutex<Vec<OutgoingMessage>>,
	pub broadcasts: Mutex<Vec<ServiceMessage>>,
	pub transactions: Mutex<Vec<ContractSendEvent>>,
	pub notifications: Mutex<Vec<Event>>,
}

#[async_trait]
impl EffectExecutor for RecordingExecutor {
	async fn send_message(&self, message: OutgoingMessage) -> Result<(), EffectError> {
		self.messages.lock().push(message);
		Ok(())
	}

	async fn broadcast(&self, message: ServiceMessage) -> Result<(), EffectError> {
		self.broadcasts.lock().push(message);
		Ok(())
	}

	async fn send_transaction(&self, transaction: ContractSendEvent) -> Result<(), EffectError> {
		self.transactions.lock().push(transaction);
		Ok(())
	}

	async fn notify(&self, event: Event) -> Result<(), EffectError> {
		self.notifications.lock().push(event);
		Ok(())
	}
}
