//! Per-format legality of a printing.
//!
//! Format names are stored lowercase ("legacy", "modern"); statuses are
//! stored in the provider's canonical casing ("Legal", "Banned", ...).
//! A format with no entry is not legal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Legality {
    Legal,
    Restricted,
    Banned,
    NotLegal,
}

impl Legality {
    pub fn parse(status: &str) -> Option<Self> {
        let folded: String = status
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "legal" => Some(Legality::Legal),
            "restricted" => Some(Legality::Restricted),
            "banned" => Some(Legality::Banned),
            "notlegal" => Some(Legality::NotLegal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Legality::Legal => "Legal",
            Legality::Restricted => "Restricted",
            Legality::Banned => "Banned",
            Legality::NotLegal => "Not Legal",
        }
    }

    /// Whether a deck may include the card in this status
    pub fn is_playable(&self, allow_restricted: bool) -> bool {
        match self {
            Legality::Legal => true,
            Legality::Restricted => allow_restricted,
            Legality::Banned | Legality::NotLegal => false,
        }
    }
}

impl fmt::Display for Legality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format name to status mapping, serialized as a flat JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Legalities(BTreeMap<String, String>);

impl Legalities {
    /// Canonical key for a format name
    pub fn format_key(format: &str) -> String {
        format.trim().to_lowercase()
    }

    /// Record a status for a format. Known statuses are canonicalized;
    /// unknown ones are kept verbatim so nothing the provider says is lost.
    pub fn insert(&mut self, format: &str, status: &str) {
        let status = match Legality::parse(status) {
            Some(legality) => legality.as_str().to_string(),
            None => {
                log::debug!("Unrecognized legality status '{}' for {}", status, format);
                status.trim().to_string()
            }
        };
        self.0.insert(Self::format_key(format), status);
    }

    /// Record a status only if the format has no entry yet
    pub fn insert_if_absent(&mut self, format: &str, legality: Legality) {
        self.0
            .entry(Self::format_key(format))
            .or_insert_with(|| legality.as_str().to_string());
    }

    /// Status for a format; absence means not legal
    pub fn status(&self, format: &str) -> Legality {
        self.0
            .get(&Self::format_key(format))
            .and_then(|s| Legality::parse(s))
            .unwrap_or(Legality::NotLegal)
    }

    pub fn is_playable_in(&self, format: &str, allow_restricted: bool) -> bool {
        self.status(format).is_playable(allow_restricted)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Legalities {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut legalities = Legalities::default();
        for (format, status) in iter {
            legalities.insert(format.as_ref(), status.as_ref());
        }
        legalities
    }
}
