//! Raw records as they come out of provider files, before normalization

use serde_json::Value;

/// Header of the set a printing was nested under
#[derive(Debug, Clone, PartialEq)]
pub struct SetInfo {
    pub code: String,
    pub name: Option<String>,
}

/// One record from a source file, tagged by the shape it was read from.
///
/// Card and price payloads are kept as raw JSON so a single badly typed
/// record is rejected by its normalizer instead of aborting the whole file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// Printing from a single-set file
    SetPrinting { set: SetInfo, card: Value },
    /// Printing from a per-format collection file
    CollectionPrinting {
        collection: String,
        set: SetInfo,
        card: Value,
    },
    /// Price object for one uuid from the bulk price file
    PriceRecord { uuid: String, prices: Value },
}

impl RawRecord {
    /// Short human-readable description for logs and error samples
    pub fn describe(&self) -> String {
        match self {
            RawRecord::SetPrinting { set, card } => {
                format!("{} card '{}'", set.code, card_name(card))
            }
            RawRecord::CollectionPrinting {
                collection,
                set,
                card,
            } => format!("{}/{} card '{}'", collection, set.code, card_name(card)),
            RawRecord::PriceRecord { uuid, .. } => format!("prices for {}", uuid),
        }
    }
}

fn card_name(card: &Value) -> &str {
    card.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn describe_names_set_and_card() {
        let record = RawRecord::SetPrinting {
            set: SetInfo {
                code: "LEA".to_string(),
                name: Some("Limited Edition Alpha".to_string()),
            },
            card: json!({"name": "Black Lotus"}),
        };
        assert_eq!(record.describe(), "LEA card 'Black Lotus'");

        let record = RawRecord::PriceRecord {
            uuid: "abc".to_string(),
            prices: json!({}),
        };
        assert_eq!(record.describe(), "prices for abc");
    }
}
