//! SQLite store for cards, prices and ingest progress
//!
//! Uses parameterized queries exclusively (no SQL string concatenation of
//! values). Every write batch is its own transaction.

mod entity;
pub mod queries;
mod schema;
pub mod writer;

pub use entity::{card_from_row, EntityKind, StoreEntity};
pub use schema::init_schema;
pub use writer::{
    CancelToken, IngestRun, Run, RunStatus, WriteError, WriteMode, WriteOptions, WriteSummary,
};

use rusqlite::Connection;
use std::path::Path;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Single-writer handle on the card database.
///
/// Write methods take `&mut self`, so one `Store` never has two writers.
/// Readers that need to run alongside open their own [`Connection`]; WAL
/// mode gives each read statement a consistent snapshot.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists.
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        if let Err(e) = conn.execute_batch("PRAGMA journal_mode=WAL;") {
            log::warn!("Could not enable WAL journal: {}", e);
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> DbResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Read access for queries and exports
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use mtg_common::{Card, PriceEntry};

    /// Create an in-memory store for testing
    pub fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    /// Create a test card with default values
    pub fn make_test_card(uuid: &str, name: &str, set_code: &str) -> Card {
        let mut card = Card::new(uuid, name, set_code);
        card.set_name = Some(format!("{} Set", set_code));
        card.rarity = Some("common".to_string());
        card.legalities.insert("vintage", "Legal");
        card
    }

    /// Create a test price entry dated 2024-06-01
    pub fn make_test_price(uuid: &str, price: Option<f64>) -> PriceEntry {
        PriceEntry {
            uuid: uuid.to_string(),
            average_price: price,
            last_updated: "2024-06-01".to_string(),
            source: price.map(|_| "tcgplayer".to_string()),
            currency: price.map(|_| "USD".to_string()),
        }
    }
}
