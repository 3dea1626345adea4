use std::convert::TryInto;

use hopline_state_machine::types::{
	ChainState,
	Event,
	StateChange,
};
use parking_lot::Mutex;
use rusqlite::{
	params,
	Connection,
	OptionalExtension,
	Params,
	Row,
};
use serde::de::DeserializeOwned;
use ulid::Ulid;

use crate::{
	errors::StorageError,
	sqlite,
	types::{
		EventRecord,
		SnapshotRecord,
		StateChangeRecord,
		StorageID,
	},
};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Columns of a stored row, still in their textual form.
type RawRow = (String, Option<String>, Option<u32>, String);

fn parse_id(text: String) -> Result<StorageID> {
	text.try_into()
}

fn parse_data<T: DeserializeOwned>(data: &str) -> Result<T> {
	Ok(serde_json::from_str(data)?)
}

/// Append-only log of state changes, the events they produced and periodic snapshots.
pub struct StateStorage {
	conn: Mutex<Connection>,
	last_identifier: Mutex<Ulid>,
}

impl StateStorage {
	pub fn new(conn: Connection) -> Self {
		Self { conn: Mutex::new(conn), last_identifier: Mutex::new(Ulid::nil()) }
	}

	pub fn setup_database(&self) -> Result<()> {
		let schema = [
			sqlite::DB_CREATE_STATE_CHANGES,
			sqlite::DB_CREATE_SNAPSHOT,
			sqlite::DB_CREATE_STATE_EVENTS,
			sqlite::DB_CREATE_RUNS,
		]
		.concat();
		self.conn.lock().execute_batch(&format!(
			"PRAGMA foreign_keys=off; BEGIN TRANSACTION; {} COMMIT; PRAGMA foreign_keys=on;",
			schema
		))?;

		// Identifiers must keep increasing across restarts.
		let mut newest = None;
		for table in ["state_changes", "state_events", "state_snapshot"] {
			newest = newest.max(self.max_identifier(table)?);
		}
		if let Some(newest) = newest {
			let mut last_identifier = self.last_identifier.lock();
			*last_identifier = (*last_identifier).max(newest.inner);
		}

		Ok(())
	}

	pub fn log_run(&self, version: &str) -> Result<()> {
		self.conn.lock().execute("INSERT INTO runs(hopline_version) VALUES(?1)", [version])?;
		Ok(())
	}

	pub fn store_state_change(&self, state_change: &StateChange) -> Result<StorageID> {
		self.store_transition(state_change, &[])
	}

	/// Log a state change together with the events it produced.
	///
	/// Both are written in one transaction: either the state change and all of its events are
	/// stored, or nothing is.
	pub fn store_transition(&self, state_change: &StateChange, events: &[Event]) -> Result<StorageID> {
		let state_change_data = serde_json::to_string(state_change)?;
		let event_data = events
			.iter()
			.map(serde_json::to_string)
			.collect::<std::result::Result<Vec<_>, _>>()?;

		let state_change_id = self.next_identifier()?;
		let mut conn = self.conn.lock();
		let transaction = conn.transaction()?;
		transaction.execute(
			"INSERT INTO state_changes(identifier, data) VALUES(?1, ?2)",
			params![state_change_id.to_string(), state_change_data],
		)?;
		for data in event_data {
			transaction.execute(
				"INSERT INTO state_events(identifier, source_statechange_id, data)
				VALUES(?1, ?2, ?3)",
				params![self.next_identifier()?.to_string(), state_change_id.to_string(), data],
			)?;
		}
		transaction.commit()?;

		Ok(state_change_id)
	}

	pub fn store_snapshot(
		&self,
		state: &ChainState,
		state_change_id: Option<StorageID>,
		statechange_qty: u32,
	) -> Result<StorageID> {
		let data = serde_json::to_string(state)?;
		let identifier = self.next_identifier()?;
		self.conn.lock().execute(
			"INSERT INTO state_snapshot(identifier, statechange_id, statechange_qty, data)
			VALUES(?1, ?2, ?3, ?4)",
			params![
				identifier.to_string(),
				state_change_id.map(|id| id.to_string()),
				statechange_qty,
				data
			],
		)?;
		Ok(identifier)
	}

	pub fn state_changes(&self) -> Result<Vec<StateChangeRecord>> {
		self.select_state_changes(StorageID::from(0u128), StorageID::max())
	}

	/// State changes written after `after` up to and including `until`.
	pub fn get_state_changes_in_range(
		&self,
		after: Option<StorageID>,
		until: StorageID,
	) -> Result<Vec<StateChangeRecord>> {
		self.select_state_changes(after.unwrap_or_else(|| StorageID::from(0u128)), until)
	}

	fn select_state_changes(
		&self,
		after: StorageID,
		until: StorageID,
	) -> Result<Vec<StateChangeRecord>> {
		let sql = "SELECT identifier, NULL, NULL, data FROM state_changes
			WHERE identifier > ?1 AND identifier <= ?2
			ORDER BY identifier ASC";
		self.select(sql, [after.to_string(), until.to_string()])?
			.into_iter()
			.map(|(identifier, _, _, data)| {
				let identifier = parse_id(identifier)?;
				Ok(StateChangeRecord { identifier, data: parse_data(&data)? })
			})
			.collect()
	}

	/// The latest snapshot taken at or before `state_change_id`.
	pub fn get_snapshot_before_state_change(
		&self,
		state_change_id: StorageID,
	) -> Result<Option<SnapshotRecord>> {
		let row: Option<RawRow> = self
			.conn
			.lock()
			.query_row(
				"SELECT identifier, statechange_id, statechange_qty, data FROM state_snapshot
				WHERE statechange_id <= ?1 OR statechange_id IS NULL
				ORDER BY statechange_id DESC
				LIMIT 1",
				[state_change_id.to_string()],
				raw_row,
			)
			.optional()?;

		row.map(|(identifier, state_change_identifier, statechange_qty, data)| {
			Ok(SnapshotRecord {
				identifier: parse_id(identifier)?,
				statechange_qty: statechange_qty.unwrap_or_default(),
				state_change_identifier: state_change_identifier.map(parse_id).transpose()?,
				data: parse_data(&data)?,
			})
		})
		.transpose()
	}

	pub fn latest_snapshot(&self) -> Result<Option<SnapshotRecord>> {
		self.get_snapshot_before_state_change(StorageID::max())
	}

	pub fn get_events_by_state_change(&self, state_change_id: StorageID) -> Result<Vec<EventRecord>> {
		let sql = "SELECT identifier, source_statechange_id, NULL, data FROM state_events
			WHERE source_statechange_id = ?1
			ORDER BY identifier ASC";
		self.select(sql, [state_change_id.to_string()])?
			.into_iter()
			.map(|(identifier, _, _, data)| {
				Ok(EventRecord {
					identifier: parse_id(identifier)?,
					state_change_identifier: state_change_id,
					data: parse_data(&data)?,
				})
			})
			.collect()
	}

	fn select<P: Params>(&self, sql: &str, params: P) -> Result<Vec<RawRow>> {
		let conn = self.conn.lock();
		let mut stmt = conn.prepare(sql)?;
		let rows = stmt.query_map(params, raw_row)?;
		Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
	}

	/// ULIDs from the clock, bumped past the last one handed out when the clock did not move.
	fn next_identifier(&self) -> Result<StorageID> {
		let mut last_identifier = self.last_identifier.lock();
		let mut identifier = Ulid::new();
		if identifier <= *last_identifier {
			let next = last_identifier.0.checked_add(1).ok_or(StorageError::IdentifierOverflow)?;
			identifier = Ulid::from(next);
		}
		*last_identifier = identifier;
		Ok(identifier.into())
	}

	fn max_identifier(&self, table: &str) -> Result<Option<StorageID>> {
		let identifier: Option<String> = self.conn.lock().query_row(
			&format!("SELECT MAX(identifier) FROM {}", table),
			[],
			|row| row.get(0),
		)?;
		identifier.map(parse_id).transpose()
	}
}

fn raw_row(row: &Row) -> rusqlite::Result<RawRow> {
	Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}
