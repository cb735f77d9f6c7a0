//! Price/format queries producing export rows
//!
//! Cards are LEFT JOINed to prices, so unpriced cards still appear (with a
//! null price, sorted after every priced card).

use crate::deck::ResolvedLine;
use crate::store::queries::legality_path;
use crate::store::DbResult;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::collections::HashMap;

/// Max uuids bound into a single `IN (...)` list
const UUID_CHUNK: usize = 500;

/// What to export. Every set filter narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    /// Keep only the N most expensive rows
    pub top_n: Option<usize>,
    /// Keep only these sets (any of them)
    pub set_codes: Vec<String>,
    /// Keep only cards playable in every one of these formats
    pub formats: Vec<String>,
    /// Count `Restricted` as playable
    pub allow_restricted: bool,
    /// Export exactly these uuids, in this order
    pub explicit_cards: Option<Vec<String>>,
}

impl ExportFilter {
    pub fn top(n: usize) -> Self {
        Self {
            top_n: Some(n),
            ..Self::default()
        }
    }

    /// WHERE fragment (without the keyword) and its bound values;
    /// `None` when nothing is filtered
    fn condition(&self) -> Option<(String, Vec<Value>)> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if !self.set_codes.is_empty() {
            let placeholders = vec!["?"; self.set_codes.len()].join(", ");
            clauses.push(format!("UPPER(c.set_code) IN ({})", placeholders));
            values.extend(
                self.set_codes
                    .iter()
                    .map(|code| Value::Text(code.trim().to_uppercase())),
            );
        }

        let playable = if self.allow_restricted {
            "('Legal', 'Restricted')"
        } else {
            "('Legal')"
        };
        for format in &self.formats {
            clauses.push(format!("json_extract(c.legalities, ?) IN {}", playable));
            values.push(Value::Text(legality_path(format)));
        }

        if clauses.is_empty() {
            None
        } else {
            Some((clauses.join(" AND "), values))
        }
    }
}

/// One output row, from a card query or a deck line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    /// None for a deck line that matched nothing
    pub uuid: Option<String>,
    pub name: String,
    pub set_code: Option<String>,
    pub set_name: Option<String>,
    pub quantity: u32,
    pub sideboard: bool,
    pub price: Option<f64>,
    /// False when the name or uuid is not in the store
    pub matched: bool,
}

impl ExportRow {
    fn unmatched(uuid: Option<String>, name: &str, quantity: u32, sideboard: bool) -> Self {
        Self {
            uuid,
            name: name.to_string(),
            set_code: None,
            set_name: None,
            quantity,
            sideboard,
            price: None,
            matched: false,
        }
    }

    /// Price times quantity, when priced
    pub fn line_total(&self) -> Option<f64> {
        self.price.map(|p| p * f64::from(self.quantity))
    }
}

const SELECT_ROW: &str = "SELECT c.uuid, c.name, c.set_code, c.set_name, p.average_price
     FROM cards c
     LEFT JOIN card_prices p ON p.uuid = c.uuid";

fn row_from_card(row: &Row<'_>) -> DbResult<ExportRow> {
    Ok(ExportRow {
        uuid: Some(row.get(0)?),
        name: row.get(1)?,
        set_code: Some(row.get(2)?),
        set_name: row.get(3)?,
        quantity: 1,
        sideboard: false,
        price: row.get(4)?,
        matched: true,
    })
}

/// Run an export query.
///
/// Ordering: with `explicit_cards`, input order (a uuid not in the store
/// yields an unmatched row, a stored card excluded by the other filters is
/// dropped); with `top_n`, price descending with nulls last, then name and
/// uuid; otherwise name, set code and uuid.
pub fn query(conn: &Connection, filter: &ExportFilter) -> DbResult<Vec<ExportRow>> {
    if let Some(uuids) = &filter.explicit_cards {
        let mut rows = explicit_rows(conn, uuids, filter)?;
        if let Some(n) = filter.top_n {
            rows.truncate(n);
        }
        return Ok(rows);
    }

    let (mut sql, mut values) = match filter.condition() {
        Some((condition, values)) => (format!("{} WHERE {}", SELECT_ROW, condition), values),
        None => (SELECT_ROW.to_string(), Vec::new()),
    };

    match filter.top_n {
        Some(n) => {
            sql.push_str(
                " ORDER BY p.average_price IS NULL, p.average_price DESC, c.name ASC, c.uuid ASC LIMIT ?",
            );
            values.push(Value::Integer(i64::try_from(n).unwrap_or(i64::MAX)));
        }
        None => sql.push_str(" ORDER BY c.name, c.set_code, c.uuid"),
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows: DbResult<Vec<ExportRow>> = stmt
        .query_map(params_from_iter(values.iter()), row_from_card)?
        .collect();
    let rows = rows?;
    log::debug!("Export query returned {} rows", rows.len());
    Ok(rows)
}

fn explicit_rows(
    conn: &Connection,
    uuids: &[String],
    filter: &ExportFilter,
) -> DbResult<Vec<ExportRow>> {
    let (passes, filter_values) = match filter.condition() {
        Some((condition, values)) => (format!("CASE WHEN {} THEN 1 ELSE 0 END", condition), values),
        None => ("1".to_string(), Vec::new()),
    };

    // uuid -> (row, passes filters)
    let mut found: HashMap<String, (ExportRow, bool)> = HashMap::new();
    let mut unique: Vec<&String> = uuids.iter().collect();
    unique.sort();
    unique.dedup();

    for chunk in unique.chunks(UUID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT c.uuid, c.name, c.set_code, c.set_name, p.average_price, {}
             FROM cards c
             LEFT JOIN card_prices p ON p.uuid = c.uuid
             WHERE c.uuid IN ({})",
            passes, placeholders
        );
        let values = filter_values
            .iter()
            .cloned()
            .chain(chunk.iter().map(|uuid| Value::Text((*uuid).clone())));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        while let Some(row) = rows.next()? {
            let export_row = row_from_card(row)?;
            let keep: bool = row.get(5)?;
            if let Some(uuid) = export_row.uuid.clone() {
                found.insert(uuid, (export_row, keep));
            }
        }
    }

    let mut rows = Vec::with_capacity(uuids.len());
    for uuid in uuids {
        match found.get(uuid) {
            Some((row, true)) => rows.push(row.clone()),
            Some((_, false)) => {}
            None => rows.push(ExportRow::unmatched(Some(uuid.clone()), uuid, 1, false)),
        }
    }
    Ok(rows)
}

/// Rows for a resolved deck list, in list order
pub fn deck_rows(lines: &[ResolvedLine]) -> Vec<ExportRow> {
    lines
        .iter()
        .map(|resolved| {
            let line = &resolved.line;
            match &resolved.outcome {
                Ok(card) => ExportRow {
                    uuid: Some(card.uuid.clone()),
                    name: card.name.clone(),
                    set_code: Some(card.set_code.clone()),
                    set_name: card.set_name.clone(),
                    quantity: line.quantity,
                    sideboard: line.sideboard,
                    price: card.price,
                    matched: true,
                },
                Err(_) => ExportRow::unmatched(None, &line.name, line.quantity, line.sideboard),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
