use std::collections::HashMap;

use hopline_messages::messages::{
	DeviceId,
	ServiceMessageInner,
};
use hopline_primitives::types::{
	Address,
	BlockHash,
	BlockNumber,
	ChainID,
	TokenAmount,
};
use hopline_state_machine::{
	machine::chain,
	types::{
		ChainState,
		Event,
		StateChange,
	},
};
use web3::signing::Key;

use super::{
	channel_setup,
	key,
	received_transfer,
	token_network_address,
};
use crate::{
	config::{
		RoutingMode,
		ServicesConfig,
		TransitionConfig,
		DEFAULT_SNAPSHOT_STATE_CHANGE_COUNT,
	},
	services::{
		capacity_updates,
		fee_updates,
		monitoring_requests,
		service_messages,
	},
};

/// Applies `state_changes` to a fresh state of `our_address`, returning the state and events.
fn apply(our_address: Address, state_changes: &[StateChange]) -> (ChainState, Vec<Event>) {
	let mut chain_state =
		ChainState::new(ChainID::Goerli, BlockNumber::from(1u64), BlockHash::zero(), our_address);
	let mut events = vec![];
	for state_change in state_changes {
		let iteration = chain::state_transition(chain_state, state_change.clone())
			.expect("State change should be accepted");
		chain_state = iteration.new_state;
		events.extend(iteration.events);
	}
	(chain_state, events)
}

fn monitoring(threshold: u64) -> ServicesConfig {
	let mut min_monitoring_balance = HashMap::new();
	min_monitoring_balance.insert(token_network_address(), TokenAmount::from(threshold));
	ServicesConfig {
		routing_mode: RoutingMode::Private,
		monitoring_enabled: true,
		monitoring_service_address: Address::from_low_u64_be(0x2001),
		min_monitoring_balance,
		..Default::default()
	}
}

#[test]
fn test_config_defaults() {
	let config = TransitionConfig::from_json("{}").expect("Empty config should parse");

	assert_eq!(config.snapshot_state_change_count, DEFAULT_SNAPSHOT_STATE_CHANGE_COUNT);
	assert_eq!(config.services.routing_mode, RoutingMode::PFS);
	assert!(!config.services.monitoring_enabled);
	assert!(config.services.monitoring_threshold(&token_network_address()).is_zero());
}

#[test]
fn test_config_overrides() {
	let data = r#"{
		"snapshot_state_change_count": 10,
		"services": {"routing_mode": "private", "monitoring_enabled": true}
	}"#;
	let config = TransitionConfig::from_json(data).expect("Config should parse");

	assert_eq!(config.snapshot_state_change_count, 10);
	assert_eq!(config.services.routing_mode, RoutingMode::Private);
	assert!(config.services.monitoring_enabled);
	assert!(TransitionConfig::from_json(r#"{"services": {"routing_mode": "local"}}"#).is_err());
}

#[test]
fn test_capacity_update_after_a_received_transfer() {
	let alice = key(1);
	let bob = key(2);
	let (chain_state, _) = apply(bob.address(), &channel_setup(bob.address(), alice.address()));
	let transfer = vec![received_transfer(&alice, bob.address())];
	let (chain_state, events) = {
		let iteration = chain::state_transition(chain_state, transfer[0].clone())
			.expect("Transfer should be accepted");
		(iteration.new_state, iteration.events)
	};

	let updates = capacity_updates(&ServicesConfig::default(), &chain_state, &transfer, &events);
	assert_eq!(updates.len(), 1);
	assert_eq!(updates[0].device, DeviceId::PFS);
	match &updates[0].inner {
		ServiceMessageInner::PFSCapacityUpdate(update) => {
			assert_eq!(update.updating_participant, bob.address());
			assert_eq!(update.other_participant, alice.address());
		},
		_ => panic!("Expected a capacity update"),
	}
}

#[test]
fn test_fee_update_after_a_deposit() {
	let alice = key(1);
	let bob = key(2);
	let setup = channel_setup(bob.address(), alice.address());
	let (chain_state, events) = apply(bob.address(), &setup);

	let updates = fee_updates(&ServicesConfig::default(), &chain_state, &setup, &events);
	assert_eq!(updates.len(), 1);
	assert!(matches!(updates[0].inner, ServiceMessageInner::PFSFeeUpdate(_)));
}

#[test]
fn test_private_routing_tells_path_finding_nothing() {
	let alice = key(1);
	let bob = key(2);
	let mut state_changes = channel_setup(bob.address(), alice.address());
	state_changes.push(received_transfer(&alice, bob.address()));
	let (chain_state, events) = apply(bob.address(), &state_changes);

	let config = ServicesConfig { routing_mode: RoutingMode::Private, ..Default::default() };
	assert!(service_messages(&config, &chain_state, &state_changes, &events).is_empty());
}

#[test]
fn test_monitoring_request_for_a_partner_balance_proof() {
	let alice = key(1);
	let bob = key(2);
	let mut state_changes = channel_setup(bob.address(), alice.address());
	state_changes.push(received_transfer(&alice, bob.address()));
	let (chain_state, _) = apply(bob.address(), &state_changes);

	let requests = monitoring_requests(&monitoring(0), &chain_state, &state_changes);
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].device, DeviceId::MS);
	match &requests[0].inner {
		ServiceMessageInner::MSUpdate(request) => {
			assert_eq!(request.non_closing_participant, bob.address());
			assert_eq!(
				request.monitoring_service_contract_address,
				Address::from_low_u64_be(0x2001)
			);
		},
		_ => panic!("Expected a monitoring request"),
	}
}

#[test]
fn test_monitoring_skipped_below_threshold() {
	let alice = key(1);
	let bob = key(2);
	let mut state_changes = channel_setup(bob.address(), alice.address());
	state_changes.push(received_transfer(&alice, bob.address()));
	let (chain_state, _) = apply(bob.address(), &state_changes);

	assert!(monitoring_requests(&monitoring(1), &chain_state, &state_changes).is_empty());

	let disabled = ServicesConfig { monitoring_enabled: false, ..monitoring(0) };
	assert!(monitoring_requests(&disabled, &chain_state, &state_changes).is_empty());
}
