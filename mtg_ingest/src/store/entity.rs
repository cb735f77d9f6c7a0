//! Row mapping for the entities the writer persists

use super::DbResult;
use mtg_common::{Card, Legalities, PriceEntry};
use rusqlite::types::Type;
use rusqlite::{params, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Which table an ingest run writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Cards,
    Prices,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cards => "cards",
            EntityKind::Prices => "prices",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            EntityKind::Cards => "cards",
            EntityKind::Prices => "card_prices",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity the batch writer can upsert by uuid
pub trait StoreEntity {
    const KIND: EntityKind;
    /// Returns a row when the key is already stored
    const EXISTS_SQL: &'static str;

    fn key(&self) -> &str;

    /// Insert or fully overwrite the row for `key()`
    fn upsert(&self, tx: &Transaction<'_>) -> DbResult<()>;

    fn exists(tx: &Transaction<'_>, key: &str) -> DbResult<bool> {
        let mut stmt = tx.prepare_cached(Self::EXISTS_SQL)?;
        stmt.exists(params![key])
    }
}

impl StoreEntity for Card {
    const KIND: EntityKind = EntityKind::Cards;
    const EXISTS_SQL: &'static str = "SELECT 1 FROM cards WHERE uuid = ?1";

    fn key(&self) -> &str {
        &self.uuid
    }

    fn upsert(&self, tx: &Transaction<'_>) -> DbResult<()> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO cards
             (uuid, name, name_key, set_code, set_name, collection_name, number, mana_cost,
              mana_value, type_line, text, power, toughness, loyalty, colors, color_identity,
              rarity, artist, layout, is_reprint, keywords, legalities, edhrec_rank, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, datetime('now'))
             ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                name_key = excluded.name_key,
                set_code = excluded.set_code,
                set_name = excluded.set_name,
                collection_name = excluded.collection_name,
                number = excluded.number,
                mana_cost = excluded.mana_cost,
                mana_value = excluded.mana_value,
                type_line = excluded.type_line,
                text = excluded.text,
                power = excluded.power,
                toughness = excluded.toughness,
                loyalty = excluded.loyalty,
                colors = excluded.colors,
                color_identity = excluded.color_identity,
                rarity = excluded.rarity,
                artist = excluded.artist,
                layout = excluded.layout,
                is_reprint = excluded.is_reprint,
                keywords = excluded.keywords,
                legalities = excluded.legalities,
                edhrec_rank = excluded.edhrec_rank,
                updated_at = excluded.updated_at",
        )?;

        stmt.execute(params![
            &self.uuid,
            &self.name,
            self.name_key(),
            &self.set_code,
            &self.set_name,
            &self.collection_name,
            &self.number,
            &self.mana_cost,
            self.mana_value,
            &self.type_line,
            &self.text,
            &self.power,
            &self.toughness,
            &self.loyalty,
            to_json(&self.colors)?,
            to_json(&self.color_identity)?,
            &self.rarity,
            &self.artist,
            &self.layout,
            self.is_reprint,
            to_json(&self.keywords)?,
            to_json(&self.legalities)?,
            self.edhrec_rank,
        ])?;
        Ok(())
    }
}

impl StoreEntity for PriceEntry {
    const KIND: EntityKind = EntityKind::Prices;
    const EXISTS_SQL: &'static str = "SELECT 1 FROM card_prices WHERE uuid = ?1";

    fn key(&self) -> &str {
        &self.uuid
    }

    fn upsert(&self, tx: &Transaction<'_>) -> DbResult<()> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO card_prices (uuid, average_price, last_updated, source, currency)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(uuid) DO UPDATE SET
                average_price = excluded.average_price,
                last_updated = excluded.last_updated,
                source = excluded.source,
                currency = excluded.currency",
        )?;
        stmt.execute(params![
            &self.uuid,
            self.average_price,
            &self.last_updated,
            &self.source,
            &self.currency,
        ])?;
        Ok(())
    }
}

/// Columns read by [`card_from_row`], in order; prefix with a table alias
/// via [`card_columns`] when joining
pub(crate) const CARD_COLUMNS: [&str; 22] = [
    "uuid",
    "name",
    "set_code",
    "set_name",
    "collection_name",
    "number",
    "mana_cost",
    "mana_value",
    "type_line",
    "text",
    "power",
    "toughness",
    "loyalty",
    "colors",
    "color_identity",
    "rarity",
    "artist",
    "layout",
    "is_reprint",
    "keywords",
    "legalities",
    "edhrec_rank",
];

/// `CARD_COLUMNS` as a select list, e.g. `c.uuid, c.name, ...`
pub(crate) fn card_columns(alias: &str) -> String {
    CARD_COLUMNS
        .iter()
        .map(|col| format!("{}.{}", alias, col))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a row selected with [`card_columns`] back into a [`Card`]
pub fn card_from_row(row: &Row<'_>) -> DbResult<Card> {
    let legalities: Legalities = from_json(row, 20)?;
    Ok(Card {
        uuid: row.get(0)?,
        name: row.get(1)?,
        set_code: row.get(2)?,
        set_name: row.get(3)?,
        collection_name: row.get(4)?,
        number: row.get(5)?,
        mana_cost: row.get(6)?,
        mana_value: row.get(7)?,
        type_line: row.get(8)?,
        text: row.get(9)?,
        power: row.get(10)?,
        toughness: row.get(11)?,
        loyalty: row.get(12)?,
        colors: from_json(row, 13)?,
        color_identity: from_json(row, 14)?,
        rarity: row.get(15)?,
        artist: row.get(16)?,
        layout: row.get(17)?,
        is_reprint: row.get(18)?,
        keywords: from_json(row, 19)?,
        legalities,
        edhrec_rank: row.get(21)?,
    })
}

fn to_json<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> DbResult<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
