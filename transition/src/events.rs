use std::sync::Arc;

use async_trait::async_trait;
use hopline_messages::{
	keys::PrivateKey,
	messages::{
		to_message,
		OutgoingMessage,
		ServiceMessage,
	},
};
use hopline_state_machine::types::{
	ContractSendEvent,
	Event,
	SendMessageEvent,
};
use tracing::{
	debug,
	error,
	info,
	warn,
};

use crate::errors::EffectError;

/// Carries effects out of the node: the transport, the chain and the user facing API.
///
/// Effects may be handed over more than once, an executor has to tolerate repeats.
#[async_trait]
pub trait EffectExecutor: Send + Sync {
	async fn send_message(&self, message: OutgoingMessage) -> Result<(), EffectError>;

	async fn broadcast(&self, message: ServiceMessage) -> Result<(), EffectError>;

	async fn send_transaction(&self, transaction: ContractSendEvent) -> Result<(), EffectError>;

	/// Payment outcomes and errors that only need reporting.
	async fn notify(&self, event: Event) -> Result<(), EffectError>;
}

/// Routes every event to the matching executor call, signing messages on the way.
pub struct EventHandler {
	private_key: PrivateKey,
	executor: Arc<dyn EffectExecutor>,
}

impl EventHandler {
	pub fn new(private_key: PrivateKey, executor: Arc<dyn EffectExecutor>) -> Self {
		Self { private_key, executor }
	}

	pub async fn handle_event(&self, event: Event) {
		let event = match SendMessageEvent::try_from(event) {
			Ok(send_event) => return self.send_message(send_event).await,
			Err(event) => event,
		};

		let event = match ContractSendEvent::try_from(event) {
			Ok(transaction) => {
				debug!(
					message = "Sending transaction",
					event = Event::from(transaction.clone()).type_name(),
				);
				if let Err(e) = self.executor.send_transaction(transaction).await {
					error!(message = "Could not send transaction", error = e.to_string());
				}
				return
			},
			Err(event) => event,
		};

		let event_name = event.type_name();
		if event_name.starts_with("Error") {
			warn!(message = "Payment error", event = event_name);
		} else {
			info!(message = "Payment update", event = event_name);
		}
		if let Err(e) = self.executor.notify(event).await {
			error!(message = "Could not notify", event = event_name, error = e.to_string());
		}
	}

	async fn send_message(&self, event: SendMessageEvent) {
		let mut message = to_message(event);
		if let Err(e) = message.sign(&self.private_key) {
			error!(
				message = "Could not sign message",
				kind = message.type_name(),
				error = e.to_string(),
			);
			return
		}

		let kind = message.type_name();
		let message_identifier = message.message_identifier;
		debug!(
			message = "Sending message",
			kind = kind,
			message_identifier = message_identifier,
			recipient = format!("{:?}", message.recipient),
		);
		if let Err(e) = self.executor.send_message(message).await {
			error!(
				message = "Could not send message",
				kind = kind,
				message_identifier = message_identifier,
				error = e.to_string(),
			);
		}
	}

	pub async fn broadcast(&self, mut message: ServiceMessage) {
		let kind = message.type_name();
		if let Err(e) = message.sign(&self.private_key) {
			error!(message = "Could not sign service message", kind = kind, error = e.to_string());
			return
		}
		if let Err(e) = self.executor.broadcast(message).await {
			warn!(
				message = "Could not broadcast service message",
				kind = kind,
				error = e.to_string(),
			);
		}
	}
}
