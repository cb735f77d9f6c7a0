//! Provider card objects to [`Card`]
//!
//! Field names are camelCase in the provider's files. Older dumps use
//! `convertedManaCost` instead of `manaValue`, and multi-face cards may keep
//! some fields only on their faces.

use crate::source::{RawRecord, SetInfo};
use mtg_common::{Card, Legalities, Legality, RecordError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Card object as found in set and collection files
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    uuid: Option<String>,
    name: Option<String>,
    set_code: Option<String>,
    number: Option<String>,
    mana_cost: Option<String>,
    mana_value: Option<f64>,
    converted_mana_cost: Option<f64>,
    #[serde(rename = "type")]
    type_line: Option<String>,
    text: Option<String>,
    power: Option<String>,
    toughness: Option<String>,
    loyalty: Option<String>,
    colors: Option<Vec<String>>,
    color_identity: Option<Vec<String>>,
    rarity: Option<String>,
    artist: Option<String>,
    layout: Option<String>,
    is_reprint: Option<bool>,
    keywords: Option<Vec<String>>,
    legalities: Option<BTreeMap<String, String>>,
    edhrec_rank: Option<i64>,
    #[serde(default, alias = "card_faces")]
    card_faces: Vec<RawFace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFace {
    name: Option<String>,
    mana_cost: Option<String>,
    #[serde(rename = "type")]
    type_line: Option<String>,
    text: Option<String>,
    power: Option<String>,
    toughness: Option<String>,
    loyalty: Option<String>,
}

impl RawCard {
    /// Primary value, else the first face that has one
    fn or_face<T: Clone>(&self, primary: &Option<T>, face: impl Fn(&RawFace) -> &Option<T>) -> Option<T> {
        primary
            .clone()
            .or_else(|| self.card_faces.iter().find_map(|f| face(f).clone()))
    }
}

/// Turn one printing record into a [`Card`].
///
/// Price records are not printings and are rejected as invalid.
pub fn normalize_card(record: RawRecord) -> Result<Card, RecordError> {
    let (set, collection, value) = match record {
        RawRecord::SetPrinting { set, card } => (set, None, card),
        RawRecord::CollectionPrinting {
            collection,
            set,
            card,
        } => (set, Some(collection), card),
        RawRecord::PriceRecord { uuid, .. } => {
            return Err(RecordError::invalid(
                format!("prices for {}", uuid),
                "price record passed to card normalizer",
            ))
        }
    };

    let context = describe(&set, &value);
    let raw: RawCard =
        serde_json::from_value(value).map_err(|e| RecordError::invalid(context.as_str(), e))?;

    let uuid = match raw.uuid.as_deref().map(str::trim) {
        Some(uuid) if !uuid.is_empty() => uuid.to_string(),
        _ => {
            let set_code = raw.set_code.as_deref().unwrap_or(&set.code);
            return Err(RecordError::missing_identity(raw.name.as_deref(), Some(set_code)));
        }
    };

    let name = match raw.or_face(&raw.name, |f| &f.name) {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(RecordError::invalid(context, "card has no name")),
    };

    let set_code = raw
        .set_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or(&set.code)
        .to_uppercase();

    let mut legalities: Legalities = raw.legalities.iter().flatten().collect();
    if let Some(format) = collection.as_deref() {
        legalities.insert_if_absent(format, Legality::Legal);
    }

    Ok(Card {
        mana_cost: raw.or_face(&raw.mana_cost, |f| &f.mana_cost),
        type_line: raw.or_face(&raw.type_line, |f| &f.type_line),
        text: raw.or_face(&raw.text, |f| &f.text),
        power: raw.or_face(&raw.power, |f| &f.power),
        toughness: raw.or_face(&raw.toughness, |f| &f.toughness),
        loyalty: raw.or_face(&raw.loyalty, |f| &f.loyalty),
        uuid,
        name,
        set_code,
        set_name: set.name,
        collection_name: collection,
        number: raw.number,
        mana_value: raw.mana_value.or(raw.converted_mana_cost),
        colors: raw.colors.unwrap_or_default(),
        color_identity: raw.color_identity.unwrap_or_default(),
        rarity: raw.rarity,
        artist: raw.artist,
        layout: raw.layout,
        is_reprint: raw.is_reprint.unwrap_or(false),
        keywords: raw.keywords.unwrap_or_default(),
        legalities,
        edhrec_rank: raw.edhrec_rank,
    })
}

fn describe(set: &SetInfo, card: &Value) -> String {
    let name = card.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
    format!("{} card '{}'", set.code, name)
}
