//! Streaming visitors for the three provider document shapes.
//!
//! Every shape is `{"meta": ..., "data": ...}`; only `data` is walked.
//! Records are pushed into the emitter as soon as they are complete, so
//! nothing larger than one set header (plus, at worst, one set's cards when
//! the `cards` key precedes `code`/`name`) is held in memory.

use super::raw::{RawRecord, SetInfo};
use super::{SourceError, SourceKind};
use serde::de::{
    self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Unexpected, Visitor,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::mpsc::SyncSender;

/// Sending half of a record stream
pub(crate) struct Emitter {
    tx: SyncSender<Result<RawRecord, SourceError>>,
    emitted: usize,
    disconnected: bool,
}

impl Emitter {
    pub(crate) fn new(tx: SyncSender<Result<RawRecord, SourceError>>) -> Self {
        Self {
            tx,
            emitted: 0,
            disconnected: false,
        }
    }

    fn emit<E: de::Error>(&mut self, record: RawRecord) -> Result<(), E> {
        if self.tx.send(Ok(record)).is_err() {
            self.disconnected = true;
            return Err(E::custom("record stream dropped by consumer"));
        }
        self.emitted += 1;
        Ok(())
    }

    /// Forward a terminal error; a vanished consumer needs no report
    pub(crate) fn fail(&self, err: SourceError) {
        let _ = self.tx.send(Err(err));
    }

    pub(crate) fn emitted(&self) -> usize {
        self.emitted
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Root object of a provider file
pub(crate) struct DocumentSeed<'a> {
    pub(crate) emitter: &'a mut Emitter,
    pub(crate) kind: SourceKind,
    /// File stem: fallback set code for set files, collection name otherwise
    pub(crate) label: &'a str,
}

impl<'de, 'a> DeserializeSeed<'de> for DocumentSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for DocumentSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a {} document object with a \"data\" key", self.kind)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let DocumentSeed {
            emitter,
            kind,
            label,
        } = self;
        let mut seen_data = false;

        while let Some(key) = map.next_key::<String>()? {
            if key != "data" || seen_data {
                map.next_value::<IgnoredAny>()?;
                continue;
            }
            seen_data = true;
            match kind {
                SourceKind::Set => map.next_value_seed(SetSeed {
                    emitter: &mut *emitter,
                    fallback_code: label,
                    collection: None,
                    require_cards: true,
                })?,
                SourceKind::Collection => map.next_value_seed(CollectionSeed {
                    emitter: &mut *emitter,
                    collection: label,
                })?,
                SourceKind::Prices => map.next_value_seed(PricesSeed {
                    emitter: &mut *emitter,
                })?,
            }
        }

        if !seen_data {
            return Err(de::Error::missing_field("data"));
        }
        Ok(())
    }
}

/// One set object: header fields plus the `cards` array
struct SetSeed<'a> {
    emitter: &'a mut Emitter,
    fallback_code: &'a str,
    collection: Option<&'a str>,
    require_cards: bool,
}

impl<'de, 'a> DeserializeSeed<'de> for SetSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for SetSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a set object with a \"cards\" array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let SetSeed {
            emitter,
            fallback_code,
            collection,
            require_cards,
        } = self;
        let mut code: Option<String> = None;
        let mut name: Option<String> = None;
        let mut pending: Vec<Value> = Vec::new();
        let mut saw_cards = false;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "code" => code = map.next_value()?,
                "name" => name = map.next_value()?,
                "cards" => {
                    saw_cards = true;
                    // Stream straight through once the header is known,
                    // otherwise hold this set's cards until it closes.
                    let header = match (&code, &name) {
                        (Some(code), Some(name)) => Some(SetInfo {
                            code: code.clone(),
                            name: Some(name.clone()),
                        }),
                        _ => None,
                    };
                    map.next_value_seed(CardsSeed {
                        emitter: &mut *emitter,
                        header: header.as_ref(),
                        collection,
                        pending: &mut pending,
                    })?;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if !saw_cards {
            if require_cards {
                return Err(de::Error::missing_field("cards"));
            }
            // A collection entry may lack cards, but it must still be a set
            if code.is_none() {
                return Err(de::Error::custom(format!(
                    "entry '{}' is not a set object (no \"cards\" or \"code\")",
                    fallback_code
                )));
            }
        }

        if !pending.is_empty() {
            let header = SetInfo {
                code: code.unwrap_or_else(|| fallback_code.to_string()),
                name,
            };
            for card in pending {
                emitter.emit::<A::Error>(printing(collection, &header, card))?;
            }
        }
        Ok(())
    }
}

struct CardsSeed<'a> {
    emitter: &'a mut Emitter,
    header: Option<&'a SetInfo>,
    collection: Option<&'a str>,
    pending: &'a mut Vec<Value>,
}

impl<'de, 'a> DeserializeSeed<'de> for CardsSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a> Visitor<'de> for CardsSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of card objects")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<(), S::Error> {
        while let Some(card) = seq.next_element::<Value>()? {
            match self.header {
                Some(header) => self
                    .emitter
                    .emit::<S::Error>(printing(self.collection, header, card))?,
                None => self.pending.push(card),
            }
        }
        Ok(())
    }
}

/// Map of set code to set object
struct CollectionSeed<'a> {
    emitter: &'a mut Emitter,
    collection: &'a str,
}

impl<'de, 'a> DeserializeSeed<'de> for CollectionSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for CollectionSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of set code to set object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let CollectionSeed {
            emitter,
            collection,
        } = self;
        while let Some(set_code) = map.next_key::<String>()? {
            map.next_value_seed(SetSeed {
                emitter: &mut *emitter,
                fallback_code: &set_code,
                collection: Some(collection),
                require_cards: false,
            })?;
        }
        Ok(())
    }
}

/// Map of card uuid to price object
struct PricesSeed<'a> {
    emitter: &'a mut Emitter,
}

impl<'de, 'a> DeserializeSeed<'de> for PricesSeed<'a> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for PricesSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of card uuid to price object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        while let Some(uuid) = map.next_key::<String>()? {
            let prices = map.next_value_seed(PriceObjectSeed { uuid: &uuid })?;
            self.emitter
                .emit::<A::Error>(RawRecord::PriceRecord { uuid, prices })?;
        }
        Ok(())
    }
}

/// Price object of one uuid: `medium -> provider -> {..}`, or null.
///
/// Anything else means the file is not a price file (a set object has
/// string and array values at this level).
struct PriceObjectSeed<'a> {
    uuid: &'a str,
}

impl<'de, 'a> DeserializeSeed<'de> for PriceObjectSeed<'a> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        let prices = Value::deserialize(deserializer)?;
        if prices.is_null() {
            return Ok(prices);
        }
        let media = match prices.as_object() {
            Some(media) => media,
            None => {
                return Err(de::Error::invalid_type(
                    unexpected(&prices),
                    &"a price object",
                ))
            }
        };

        for (medium, providers) in media {
            let providers = providers.as_object().ok_or_else(|| {
                <D::Error as de::Error>::invalid_type(
                    unexpected(providers),
                    &format!("a provider map under '{}' for {}", medium, self.uuid).as_str(),
                )
            })?;
            for (provider, entry) in providers {
                if !entry.is_object() {
                    return Err(de::Error::invalid_type(
                        unexpected(entry),
                        &format!("a price entry for {}/{} of {}", medium, provider, self.uuid)
                            .as_str(),
                    ));
                }
            }
        }
        Ok(prices)
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Unexpected::Float(f),
            None => Unexpected::Other("number"),
        },
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn printing(collection: Option<&str>, header: &SetInfo, card: Value) -> RawRecord {
    match collection {
        Some(collection) => RawRecord::CollectionPrinting {
            collection: collection.to_string(),
            set: header.clone(),
            card,
        },
        None => RawRecord::SetPrinting {
            set: header.clone(),
            card,
        },
    }
}
