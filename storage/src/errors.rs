use derive_more::Display;
use ulid::DecodeError;

#[derive(Display, Debug)]
pub enum StorageError {
	#[display(fmt = "Cannot serialize for storage: {}", _0)]
	SerializationError(serde_json::Error),
	#[display(fmt = "SQL Error: {}", _0)]
	Sql(rusqlite::Error),
	#[display(fmt = "Cannot convert value to Ulid: {}", _0)]
	ID(DecodeError),
	#[display(fmt = "Identifier space exhausted")]
	IdentifierOverflow,
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
	fn from(error: rusqlite::Error) -> Self {
		Self::Sql(error)
	}
}

impl From<serde_json::Error> for StorageError {
	fn from(error: serde_json::Error) -> Self {
		Self::SerializationError(error)
	}
}
