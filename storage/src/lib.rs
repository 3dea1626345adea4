#![warn(clippy::missing_docs_in_private_items)]

/// Storage errors.
pub mod errors;
/// Database schema.
mod sqlite;
/// The state log.
pub mod state;
/// Storage types.
pub mod types;
