//! Bulk price objects to [`PriceEntry`]
//!
//! A price object is nested as
//! `medium -> provider -> {currency, retail|buylist -> finish -> date -> price}`.
//! Only one value per uuid is kept: the latest retail price of the normal
//! finish from the most preferred provider, falling back to any other
//! numeric observation.

use crate::config::PREFERRED_PRICE_PROVIDERS;
use crate::source::RawRecord;
use mtg_common::{PriceEntry, RecordError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const PAPER: &str = "paper";
const SIDES: [&str; 2] = ["retail", "buylist"];
const FINISHES: [&str; 3] = ["normal", "foil", "etched"];

/// Date -> price; values that are not numbers are ignored
type PricePoints = BTreeMap<String, Value>;

#[derive(Debug, Default, Deserialize)]
struct ProviderPrices {
    currency: Option<String>,
    #[serde(default)]
    retail: BTreeMap<String, PricePoints>,
    #[serde(default)]
    buylist: BTreeMap<String, PricePoints>,
}

impl ProviderPrices {
    fn side(&self, side: &str) -> &BTreeMap<String, PricePoints> {
        match side {
            "buylist" => &self.buylist,
            _ => &self.retail,
        }
    }
}

type PriceTree = BTreeMap<String, BTreeMap<String, ProviderPrices>>;

/// A selected observation
#[derive(Debug, Clone, PartialEq)]
struct Observation<'a> {
    price: f64,
    date: &'a str,
    provider: &'a str,
    currency: Option<&'a str>,
}

/// Picks one current price per uuid
#[derive(Debug, Clone)]
pub struct PriceNormalizer {
    /// `last_updated` for entries without any observation (YYYY-MM-DD)
    pub fallback_date: String,
    /// Providers consulted first, in order; the rest follow alphabetically
    pub preferred_providers: Vec<String>,
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self::new(chrono::Utc::now().format("%Y-%m-%d").to_string())
    }
}

impl PriceNormalizer {
    pub fn new(fallback_date: impl Into<String>) -> Self {
        Self {
            fallback_date: fallback_date.into(),
            preferred_providers: PREFERRED_PRICE_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn normalize(&self, record: RawRecord) -> Result<PriceEntry, RecordError> {
        let (uuid, prices) = match record {
            RawRecord::PriceRecord { uuid, prices } => (uuid, prices),
            other => {
                return Err(RecordError::invalid(
                    other.describe(),
                    "printing passed to price normalizer",
                ))
            }
        };

        let uuid = uuid.trim().to_string();
        if uuid.is_empty() {
            return Err(RecordError::missing_identity(None, None));
        }

        let tree: PriceTree = match prices {
            Value::Null => PriceTree::new(),
            prices => serde_json::from_value(prices)
                .map_err(|e| RecordError::invalid(format!("prices for {}", uuid), e))?,
        };

        match self.select(&tree) {
            Some(obs) => Ok(PriceEntry {
                average_price: Some(obs.price),
                last_updated: obs.date.to_string(),
                source: Some(obs.provider.to_string()),
                currency: obs.currency.map(str::to_string),
                uuid,
            }),
            None => Ok(PriceEntry::unpriced(uuid, self.fallback_date.as_str())),
        }
    }

    fn select<'a>(&self, tree: &'a PriceTree) -> Option<Observation<'a>> {
        let sources = self.ordered_sources(tree);

        let retail_normal = sources.iter().find_map(|&(provider, prices)| {
            latest(prices.retail.get("normal")?).map(|(date, price)| Observation {
                price,
                date,
                provider,
                currency: prices.currency.as_deref(),
            })
        });
        if retail_normal.is_some() {
            return retail_normal;
        }

        sources.iter().find_map(|&(provider, prices)| {
            SIDES.iter().find_map(|side| {
                FINISHES.iter().find_map(|finish| {
                    let (date, price) = latest(prices.side(side).get(*finish)?)?;
                    Some(Observation {
                        price,
                        date,
                        provider,
                        currency: prices.currency.as_deref(),
                    })
                })
            })
        })
    }

    /// (provider, prices) pairs: paper before other media, then preferred
    /// providers in order, then the rest alphabetically
    fn ordered_sources<'a>(&self, tree: &'a PriceTree) -> Vec<(&'a str, &'a ProviderPrices)> {
        let media = tree
            .get_key_value(PAPER)
            .into_iter()
            .chain(tree.iter().filter(|(medium, _)| medium.as_str() != PAPER));

        let mut sources = Vec::new();
        for (_, providers) in media {
            for preferred in &self.preferred_providers {
                if let Some((name, prices)) = providers.get_key_value(preferred) {
                    sources.push((name.as_str(), prices));
                }
            }
            for (name, prices) in providers {
                if !self.preferred_providers.contains(name) {
                    sources.push((name.as_str(), prices));
                }
            }
        }
        sources
    }
}

/// Most recent date with a numeric price
fn latest(points: &PricePoints) -> Option<(&str, f64)> {
    points
        .iter()
        .rev()
        .find_map(|(date, value)| value.as_f64().map(|price| (date.as_str(), price)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(uuid: &str, prices: Value) -> RawRecord {
        RawRecord::PriceRecord {
            uuid: uuid.to_string(),
            prices,
        }
    }

    fn normalizer() -> PriceNormalizer {
        PriceNormalizer::new("2024-06-01")
    }

    #[test]
    fn picks_latest_tcgplayer_retail_normal() {
        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({
                    "paper": {
                        "cardmarket": {"currency": "EUR", "retail": {"normal": {"2024-05-03": 9.0}}},
                        "tcgplayer": {
                            "currency": "USD",
                            "retail": {"normal": {"2024-05-01": 1.0, "2024-05-03": 1.5, "2024-05-02": 2.0}},
                            "buylist": {"normal": {"2024-05-03": 0.5}}
                        }
                    }
                }),
            ))
            .unwrap();

        assert_eq!(entry.uuid, "u1");
        assert_eq!(entry.average_price, Some(1.5));
        assert_eq!(entry.last_updated, "2024-05-03");
        assert_eq!(entry.source.as_deref(), Some("tcgplayer"));
        assert_eq!(entry.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn paper_is_preferred_over_mtgo() {
        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({
                    "mtgo": {"cardhoarder": {"currency": "USD", "retail": {"normal": {"2024-05-03": 0.02}}}},
                    "paper": {"cardkingdom": {"currency": "USD", "retail": {"normal": {"2024-05-01": 0.25}}}}
                }),
            ))
            .unwrap();
        assert_eq!(entry.average_price, Some(0.25));
        assert_eq!(entry.source.as_deref(), Some("cardkingdom"));
    }

    #[test]
    fn unknown_providers_follow_preferred_ones() {
        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({
                    "paper": {
                        "aaa_market": {"retail": {"normal": {"2024-05-03": 5.0}}},
                        "cardsphere": {"retail": {"normal": {"2024-05-01": 4.0}}}
                    }
                }),
            ))
            .unwrap();
        assert_eq!(entry.source.as_deref(), Some("cardsphere"));
    }

    #[test]
    fn falls_back_to_foil_then_buylist() {
        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({"paper": {"tcgplayer": {
                    "retail": {"foil": {"2024-05-01": 12.0}},
                    "buylist": {"normal": {"2024-05-02": 3.0}}
                }}}),
            ))
            .unwrap();
        assert_eq!(entry.average_price, Some(12.0));

        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({"paper": {"tcgplayer": {"buylist": {"etched": {"2024-05-02": 3.0}}}}}),
            ))
            .unwrap();
        assert_eq!(entry.average_price, Some(3.0));
        assert_eq!(entry.last_updated, "2024-05-02");
    }

    #[test]
    fn non_numeric_points_are_skipped() {
        let entry = normalizer()
            .normalize(record(
                "u1",
                json!({"paper": {"tcgplayer": {"retail": {"normal": {
                    "2024-05-01": 1.0, "2024-05-02": null, "2024-05-03": "n/a"
                }}}}}),
            ))
            .unwrap();
        assert_eq!(entry.average_price, Some(1.0));
        assert_eq!(entry.last_updated, "2024-05-01");
    }

    #[test]
    fn no_observation_yields_unpriced_entry() {
        let entry = normalizer().normalize(record("u1", json!({}))).unwrap();
        assert_eq!(entry, PriceEntry::unpriced("u1", "2024-06-01"));

        let entry = normalizer().normalize(record("u2", Value::Null)).unwrap();
        assert_eq!(entry.average_price, None);
    }

    #[test]
    fn missing_uuid_is_missing_identity() {
        let err = normalizer().normalize(record("", json!({}))).unwrap_err();
        assert_eq!(err.kind(), "missing_identity");
    }

    #[test]
    fn wrongly_shaped_prices_are_invalid() {
        let err = normalizer().normalize(record("u1", json!([1, 2]))).unwrap_err();
        assert_eq!(err.kind(), "invalid");
    }

    #[test]
    fn default_fallback_date_is_iso_formatted() {
        let date = PriceNormalizer::default().fallback_date;
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
    }
}
