//! Read-side queries and store verification statistics

use super::entity::{card_columns, card_from_row};
use super::DbResult;
use mtg_common::{Card, Legalities, PriceEntry};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Get total count of cards in database
pub fn get_card_count(conn: &Connection) -> DbResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
}

/// Get total count of price entries (including orphans)
pub fn get_price_count(conn: &Connection) -> DbResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM card_prices", [], |row| row.get(0))
}

pub fn get_card_by_uuid(conn: &Connection, uuid: &str) -> DbResult<Option<Card>> {
    let sql = format!("SELECT {} FROM cards c WHERE c.uuid = ?1", card_columns("c"));
    conn.query_row(&sql, params![uuid], card_from_row).optional()
}

/// Every printing in a set, by collector number then name
pub fn get_cards_by_set(conn: &Connection, set_code: &str) -> DbResult<Vec<Card>> {
    let sql = format!(
        "SELECT {} FROM cards c
         WHERE c.set_code = ?1 COLLATE NOCASE
         ORDER BY CAST(c.number AS INTEGER), c.number, c.name, c.uuid",
        card_columns("c")
    );
    let mut stmt = conn.prepare(&sql)?;
    let results: DbResult<Vec<Card>> = stmt.query_map(params![set_code], card_from_row)?.collect();
    results
}

/// All printings with exactly this name (case-insensitive)
pub fn get_cards_by_name(conn: &Connection, name: &str) -> DbResult<Vec<Card>> {
    let sql = format!(
        "SELECT {} FROM cards c
         WHERE c.name = ?1 COLLATE NOCASE
         ORDER BY c.set_code, c.uuid",
        card_columns("c")
    );
    let mut stmt = conn.prepare(&sql)?;
    let results: DbResult<Vec<Card>> = stmt.query_map(params![name], card_from_row)?.collect();
    results
}

/// Card search result: one row per distinct name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSearchResult {
    pub name: String,
    pub printings: i64,
    /// Cheapest known price across printings
    pub min_price: Option<f64>,
}

/// Search cards by name (case-insensitive substring match)
///
/// Returns up to `limit` distinct names, exact matches first, then names
/// starting with the query, then other partial matches, each alphabetical.
pub fn search_cards_by_name(
    conn: &Connection,
    query: &str,
    limit: usize,
) -> DbResult<Vec<CardSearchResult>> {
    let pattern = format!("%{}%", escape_like(query));
    let prefix = format!("{}%", escape_like(query));
    let mut stmt = conn.prepare(
        "SELECT c.name, COUNT(*), MIN(p.average_price)
         FROM cards c
         LEFT JOIN card_prices p ON p.uuid = c.uuid
         WHERE c.name LIKE ?1 ESCAPE '\\' COLLATE NOCASE
         GROUP BY c.name
         ORDER BY
             CASE WHEN c.name = ?2 COLLATE NOCASE THEN 0
                  WHEN c.name LIKE ?3 ESCAPE '\\' COLLATE NOCASE THEN 1
                  ELSE 2
             END,
             c.name
         LIMIT ?4",
    )?;

    let results: DbResult<Vec<CardSearchResult>> = stmt
        .query_map(params![pattern, query, prefix, limit], |row| {
            Ok(CardSearchResult {
                name: row.get(0)?,
                printings: row.get(1)?,
                min_price: row.get(2)?,
            })
        })?
        .collect();
    results
}

/// Printings playable in `format`: `Legal`, or `Restricted` when allowed
pub fn get_cards_with_legality(
    conn: &Connection,
    format: &str,
    allow_restricted: bool,
) -> DbResult<Vec<Card>> {
    let sql = format!(
        "SELECT {} FROM cards c
         WHERE json_extract(c.legalities, ?1) IN ('Legal', ?2)
         ORDER BY c.name, c.set_code, c.uuid",
        card_columns("c")
    );
    let restricted = if allow_restricted { "Restricted" } else { "Legal" };
    let mut stmt = conn.prepare(&sql)?;
    let results: DbResult<Vec<Card>> = stmt
        .query_map(params![legality_path(format), restricted], card_from_row)?
        .collect();
    results
}

pub fn get_price(conn: &Connection, uuid: &str) -> DbResult<Option<PriceEntry>> {
    conn.query_row(
        "SELECT uuid, average_price, last_updated, source, currency
         FROM card_prices WHERE uuid = ?1",
        params![uuid],
        |row| {
            Ok(PriceEntry {
                uuid: row.get(0)?,
                average_price: row.get(1)?,
                last_updated: row.get(2)?,
                source: row.get(3)?,
                currency: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Card count for one set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetSummary {
    pub code: String,
    pub name: Option<String>,
    pub cards: i64,
}

/// Cards per set, largest sets first
pub fn get_set_summaries(conn: &Connection, limit: usize) -> DbResult<Vec<SetSummary>> {
    let mut stmt = conn.prepare(
        "SELECT set_code, MAX(set_name), COUNT(*) AS cards
         FROM cards
         GROUP BY set_code
         ORDER BY cards DESC, set_code
         LIMIT ?1",
    )?;
    let results: DbResult<Vec<SetSummary>> = stmt
        .query_map(params![limit], |row| {
            Ok(SetSummary {
                code: row.get(0)?,
                name: row.get(1)?,
                cards: row.get(2)?,
            })
        })?
        .collect();
    results
}

/// (rarity, count), most common first; unknown rarity is reported as "unknown"
pub fn get_rarity_distribution(conn: &Connection) -> DbResult<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(rarity, 'unknown') AS r, COUNT(*) AS n
         FROM cards
         GROUP BY r
         ORDER BY n DESC, r",
    )?;
    let results: DbResult<Vec<(String, i64)>> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect();
    results
}

/// Summary of the price table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceStats {
    /// Entries with a price
    pub priced: i64,
    /// All entries, priced or not
    pub entries: i64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    /// Priced entries whose uuid is a stored card
    pub matched_cards: i64,
    pub latest_date: Option<String>,
}

pub fn get_price_stats(conn: &Connection) -> DbResult<PriceStats> {
    let mut stats = conn.query_row(
        "SELECT COUNT(average_price), COUNT(*), MIN(average_price), MAX(average_price),
                AVG(average_price), MAX(last_updated)
         FROM card_prices",
        [],
        |row| {
            Ok(PriceStats {
                priced: row.get(0)?,
                entries: row.get(1)?,
                min: row.get(2)?,
                max: row.get(3)?,
                average: row.get(4)?,
                matched_cards: 0,
                latest_date: row.get(5)?,
            })
        },
    )?;

    stats.matched_cards = conn.query_row(
        "SELECT COUNT(*) FROM card_prices p
         JOIN cards c ON c.uuid = p.uuid
         WHERE p.average_price IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(stats)
}

/// Number of cards with no priced entry
pub fn get_cards_without_prices_count(conn: &Connection) -> DbResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM cards c
         LEFT JOIN card_prices p ON p.uuid = c.uuid
         WHERE p.average_price IS NULL",
        [],
        |row| row.get(0),
    )
}

/// JSON path of a format inside the `legalities` column, e.g. `$."legacy"`
pub(crate) fn legality_path(format: &str) -> String {
    let key = Legalities::format_key(format).replace('"', "");
    format!("$.\"{}\"", key)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{make_test_card, make_test_price, test_store};
    use crate::store::{Store, WriteMode, WriteOptions};

    fn seed(store: &mut Store, cards: Vec<Card>, prices: Vec<PriceEntry>) {
        let opts = WriteOptions::default();
        store
            .write(cards.into_iter().map(Ok), WriteMode::Incremental, &opts)
            .unwrap();
        store
            .write(prices.into_iter().map(Ok), WriteMode::Incremental, &opts)
            .unwrap();
    }

    fn sample_store() -> Store {
        let mut store = test_store();
        let mut bolt_m10 = make_test_card("b2", "Lightning Bolt", "M10");
        bolt_m10.rarity = Some("common".to_string());
        bolt_m10.legalities.insert("modern", "Legal");
        let mut bolt_lea = make_test_card("b1", "Lightning Bolt", "LEA");
        bolt_lea.rarity = Some("common".to_string());
        let mut lotus = make_test_card("l1", "Black Lotus", "LEA");
        lotus.rarity = Some("rare".to_string());
        lotus.legalities.insert("vintage", "Restricted");
        let bolt_the = make_test_card("t1", "Bolt the Blue", "TST");

        seed(
            &mut store,
            vec![bolt_m10, bolt_lea, lotus, bolt_the],
            vec![
                make_test_price("b1", Some(400.0)),
                make_test_price("b2", Some(1.5)),
                make_test_price("l1", None),
                make_test_price("orphan", Some(9.0)),
            ],
        );
        store
    }

    #[test]
    fn card_round_trips_through_store() {
        let mut store = test_store();
        let mut card = make_test_card("u1", "Fire // Ice", "APC");
        card.colors = vec!["R".to_string(), "U".to_string()];
        card.keywords = vec!["Split second".to_string()];
        card.mana_value = Some(4.0);
        card.is_reprint = true;
        card.edhrec_rank = Some(321);
        seed(&mut store, vec![card.clone()], vec![]);

        let stored = get_card_by_uuid(store.conn(), "u1").unwrap().unwrap();
        assert_eq!(stored, card);
        assert!(get_card_by_uuid(store.conn(), "missing").unwrap().is_none());

        let key: String = store
            .conn()
            .query_row("SELECT name_key FROM cards WHERE uuid = 'u1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(key, "fire // ice");
    }

    #[test]
    fn cards_by_set_and_name() {
        let store = sample_store();
        let lea = get_cards_by_set(store.conn(), "lea").unwrap();
        assert_eq!(lea.len(), 2);

        let bolts = get_cards_by_name(store.conn(), "LIGHTNING BOLT").unwrap();
        let sets: Vec<_> = bolts.iter().map(|c| c.set_code.as_str()).collect();
        assert_eq!(sets, vec!["LEA", "M10"]);
    }

    #[test]
    fn search_ranks_exact_then_prefix_then_substring() {
        let store = sample_store();
        let results = search_cards_by_name(store.conn(), "bolt", 10).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bolt the Blue", "Lightning Bolt"]);

        let bolt = &results[1];
        assert_eq!(bolt.printings, 2);
        assert_eq!(bolt.min_price, Some(1.5));

        let results = search_cards_by_name(store.conn(), "lightning bolt", 10).unwrap();
        assert_eq!(results[0].name, "Lightning Bolt");
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let store = sample_store();
        assert!(search_cards_by_name(store.conn(), "%", 10).unwrap().is_empty());
        assert!(search_cards_by_name(store.conn(), "_", 10).unwrap().is_empty());
    }

    #[test]
    fn legality_lookup_respects_restricted_flag() {
        let store = sample_store();
        let modern = get_cards_with_legality(store.conn(), "Modern", false).unwrap();
        assert_eq!(modern.len(), 1);
        assert_eq!(modern[0].uuid, "b2");

        let vintage = get_cards_with_legality(store.conn(), "vintage", false).unwrap();
        assert!(vintage.iter().all(|c| c.uuid != "l1"));
        let vintage = get_cards_with_legality(store.conn(), "vintage", true).unwrap();
        assert!(vintage.iter().any(|c| c.uuid == "l1"));
    }

    #[test]
    fn statistics_cover_sets_rarities_and_prices() {
        let store = sample_store();

        assert_eq!(get_card_count(store.conn()).unwrap(), 4);
        assert_eq!(get_price_count(store.conn()).unwrap(), 4);

        let sets = get_set_summaries(store.conn(), 10).unwrap();
        assert_eq!(sets[0].code, "LEA");
        assert_eq!(sets[0].cards, 2);
        assert_eq!(sets[0].name.as_deref(), Some("LEA Set"));

        let rarities = get_rarity_distribution(store.conn()).unwrap();
        assert_eq!(rarities[0], ("common".to_string(), 3));

        let stats = get_price_stats(store.conn()).unwrap();
        assert_eq!(stats.priced, 3);
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.min, Some(1.5));
        assert_eq!(stats.max, Some(400.0));
        assert_eq!(stats.matched_cards, 2);
        assert_eq!(stats.latest_date.as_deref(), Some("2024-06-01"));

        // l1 has an unpriced entry, t1 has none
        assert_eq!(get_cards_without_prices_count(store.conn()).unwrap(), 2);
    }

    #[test]
    fn legality_path_quotes_format() {
        assert_eq!(legality_path("Legacy"), "$.\"legacy\"");
        assert_eq!(legality_path(" pre\"modern "), "$.\"premodern\"");
    }
}
