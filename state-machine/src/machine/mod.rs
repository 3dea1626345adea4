#![warn(clippy::missing_docs_in_private_items)]

pub mod chain;
pub mod channel;
pub mod initiator;
pub mod initiator_manager;
pub mod mediator;
pub mod routes;
pub mod secret_registry;
pub mod target;
pub mod token_network;
pub mod utils;
