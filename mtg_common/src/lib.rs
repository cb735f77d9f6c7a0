//! Shared MTG types used by the ingestion pipeline and its consumers.
//!
//! A [`Card`] is one printing keyed by the provider's uuid; a [`PriceEntry`]
//! is the single current price known for a uuid.

pub mod card;
pub mod error;
pub mod legality;
pub mod names;
pub mod price;

pub use card::Card;
pub use error::{RecordError, UnresolvedCardError};
pub use legality::{Legalities, Legality};
pub use names::name_key;
pub use price::PriceEntry;
