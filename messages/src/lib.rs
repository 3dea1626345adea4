#![warn(clippy::missing_docs_in_private_items)]

/// Turning received messages into state changes.
pub mod decode;
/// Message errors.
pub mod errors;
/// The node's signing key.
pub mod keys;
/// Wire messages.
pub mod messages;
#[cfg(test)]
mod tests;
