use serde::{Deserialize, Serialize};

/// Latest known price for a printing
///
/// There is at most one entry per uuid; a newer observation replaces the
/// old one entirely. The uuid does not have to exist in the card table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub uuid: String,
    /// None when the provider reported no usable price
    pub average_price: Option<f64>,
    /// Observation date (YYYY-MM-DD)
    pub last_updated: String,
    /// Provider the value was taken from, e.g. "tcgplayer"
    pub source: Option<String>,
    pub currency: Option<String>,
}

impl PriceEntry {
    pub fn unpriced(uuid: impl Into<String>, last_updated: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            average_price: None,
            last_updated: last_updated.into(),
            source: None,
            currency: None,
        }
    }
}
