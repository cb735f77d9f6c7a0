use crate::legality::Legalities;
use serde::{Deserialize, Serialize};

/// One printing of a card, keyed by the provider-assigned uuid.
///
/// Descriptive fields are last-write-wins: re-ingesting the same uuid
/// replaces them, it never produces a second printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub uuid: String,
    pub name: String,
    pub set_code: String,
    pub set_name: Option<String>,
    /// Collection file the printing was loaded from (e.g. "Legacy")
    pub collection_name: Option<String>,
    pub number: Option<String>,
    pub mana_cost: Option<String>,
    pub mana_value: Option<f64>,
    /// Full type line, e.g. "Legendary Creature — Elf Druid"
    pub type_line: Option<String>,
    pub text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    pub rarity: Option<String>,
    pub artist: Option<String>,
    pub layout: Option<String>,
    #[serde(default)]
    pub is_reprint: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub legalities: Legalities,
    pub edhrec_rank: Option<i64>,
}

impl Card {
    /// Minimal printing with only identity fields set
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, set_code: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            set_code: set_code.into(),
            set_name: None,
            collection_name: None,
            number: None,
            mana_cost: None,
            mana_value: None,
            type_line: None,
            text: None,
            power: None,
            toughness: None,
            loyalty: None,
            colors: Vec::new(),
            color_identity: Vec::new(),
            rarity: None,
            artist: None,
            layout: None,
            is_reprint: false,
            keywords: Vec::new(),
            legalities: Legalities::default(),
            edhrec_rank: None,
        }
    }

    /// Lookup key for the card name, see [`crate::names::name_key`]
    pub fn name_key(&self) -> String {
        crate::names::name_key(&self.name)
    }
}
