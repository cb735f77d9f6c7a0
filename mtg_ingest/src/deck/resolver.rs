//! Resolve deck-list names to stored printings

use super::dialect::{DeckLine, DeckList};
use crate::store::DbResult;
use mtg_common::names::{front_face_key, name_key};
use mtg_common::UnresolvedCardError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

/// How a name was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Same name ignoring case
    Exact,
    /// Same normalized name key (punctuation, diacritics, split separators)
    NameKey,
    /// Front face of a split or double-faced card
    FrontFace,
}

/// The printing chosen to represent a deck-list name
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCard {
    pub uuid: String,
    pub name: String,
    pub set_code: String,
    pub set_name: Option<String>,
    pub price: Option<f64>,
    pub match_kind: MatchKind,
}

/// Resolution outcome for one deck line
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub line: DeckLine,
    pub outcome: Result<ResolvedCard, UnresolvedCardError>,
}

impl ResolvedLine {
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_ok()
    }
}

const SELECT_CANDIDATE: &str = "SELECT c.uuid, c.name, c.set_code, c.set_name, p.average_price
     FROM cards c
     LEFT JOIN card_prices p ON p.uuid = c.uuid";

/// Cheapest priced printing first, unpriced after, uuid as the tie-break
const CHEAPEST_FIRST: &str =
    "ORDER BY p.average_price IS NULL, p.average_price ASC, c.uuid ASC LIMIT 1";

/// Looks names up against a read connection
pub struct DeckResolver<'c> {
    conn: &'c Connection,
}

impl<'c> DeckResolver<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Find the representative printing for a name.
    ///
    /// Tries, in order, an exact case-insensitive name, the normalized name
    /// key, then the front face of a multi-face card. A set code restricts
    /// every step to that set.
    pub fn resolve(&self, name: &str, set_code: Option<&str>) -> DbResult<Option<ResolvedCard>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let key = name_key(name);
        let front = front_face_key(name);
        let attempts = [
            (MatchKind::Exact, "c.name = ?1 COLLATE NOCASE", name.to_string()),
            (MatchKind::NameKey, "c.name_key = ?1", key),
            (
                MatchKind::FrontFace,
                "substr(c.name_key, 1, length(?1) + 4) = ?1 || ' // '",
                front,
            ),
        ];

        for (kind, condition, value) in attempts {
            if let Some(card) = self.find(kind, condition, &value, set_code)? {
                return Ok(Some(card));
            }
        }
        Ok(None)
    }

    fn find(
        &self,
        kind: MatchKind,
        condition: &str,
        value: &str,
        set_code: Option<&str>,
    ) -> DbResult<Option<ResolvedCard>> {
        let sql = format!(
            "{} WHERE {} AND (?2 IS NULL OR c.set_code = ?2 COLLATE NOCASE) {}",
            SELECT_CANDIDATE, condition, CHEAPEST_FIRST
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.query_row(params![value, set_code], |row| {
            Ok(ResolvedCard {
                uuid: row.get(0)?,
                name: row.get(1)?,
                set_code: row.get(2)?,
                set_name: row.get(3)?,
                price: row.get(4)?,
                match_kind: kind,
            })
        })
        .optional()
    }

    /// Resolve every line; an unknown name is reported on its line only.
    /// Repeated (name, set) pairs are looked up once.
    pub fn resolve_list(&self, list: &DeckList) -> DbResult<Vec<ResolvedLine>> {
        let mut cache: HashMap<(String, Option<String>), Option<ResolvedCard>> = HashMap::new();
        let mut resolved = Vec::with_capacity(list.lines.len());

        for line in &list.lines {
            let cache_key = (name_key(&line.name), line.set_code.clone());
            let found = match cache.get(&cache_key) {
                Some(found) => found.clone(),
                None => {
                    let found = self.resolve(&line.name, line.set_code.as_deref())?;
                    cache.insert(cache_key, found.clone());
                    found
                }
            };

            let outcome = found.ok_or_else(|| UnresolvedCardError {
                line_number: line.line_number,
                name: line.name.clone(),
                set_code: line.set_code.clone(),
            });
            if let Err(e) = &outcome {
                log::warn!("{}", e);
            }
            resolved.push(ResolvedLine {
                line: line.clone(),
                outcome,
            });
        }

        let unresolved = resolved.iter().filter(|r| !r.is_resolved()).count();
        log::info!(
            "Resolved {} of {} deck lines",
            resolved.len() - unresolved,
            resolved.len()
        );
        Ok(resolved)
    }
}
