//! Deck-list parsing and card resolution

pub mod dialect;
pub mod resolver;

pub use dialect::{parse, DeckLine, DeckList, Dialect, DialectParser};
pub use resolver::{DeckResolver, MatchKind, ResolvedCard, ResolvedLine};
