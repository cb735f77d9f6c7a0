use super::DbResult;
use rusqlite::Connection;

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `cards`: one row per printing, keyed by provider uuid
/// - `card_prices`: latest price per uuid (no foreign key, orphans allowed)
/// - `ingest_runs`: progress of the last run per entity kind
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cards (
            uuid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            set_code TEXT NOT NULL,
            set_name TEXT,
            collection_name TEXT,
            number TEXT,
            mana_cost TEXT,
            mana_value REAL,
            type_line TEXT,
            text TEXT,
            power TEXT,
            toughness TEXT,
            loyalty TEXT,
            colors TEXT NOT NULL DEFAULT '[]',
            color_identity TEXT NOT NULL DEFAULT '[]',
            rarity TEXT,
            artist TEXT,
            layout TEXT,
            is_reprint INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '[]',
            legalities TEXT NOT NULL DEFAULT '{}',
            edhrec_rank INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_cards_name_key ON cards(name_key);
        CREATE INDEX IF NOT EXISTS idx_cards_set_code ON cards(set_code);

        -- No foreign key on uuid: orphan prices are kept and simply do not join
        CREATE TABLE IF NOT EXISTS card_prices (
            uuid TEXT PRIMARY KEY,
            average_price REAL,
            last_updated TEXT NOT NULL,
            source TEXT,
            currency TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_card_prices_price ON card_prices(average_price);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            entity TEXT PRIMARY KEY,
            mode TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            batches_committed INTEGER NOT NULL DEFAULT 0,
            rows_written INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;

    log::debug!("Database schema initialized");
    Ok(())
}
