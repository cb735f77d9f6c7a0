//! MTG Ingest - card & price database builder
//!
//! Streams provider JSON (single sets, format collections, the bulk price
//! file) into SQLite, then answers price/format queries and values deck
//! lists as CSV.

pub mod config;
pub mod csv_export;
pub mod deck;
pub mod error;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;

pub use deck::{parse as parse_deck, DeckList, DeckResolver, Dialect, ResolvedLine};
pub use error::{Error, IngestError, Result};
pub use export::{deck_rows, query as export_query, ExportFilter, ExportRow};
pub use normalize::{normalize_card, PriceNormalizer};
pub use pipeline::{ingest_collections, ingest_prices, ingest_sets};
pub use report::{log_store_stats, RunReport};
pub use source::{RawRecord, SourceError, SourceKind};
pub use store::{CancelToken, Store, WriteError, WriteMode, WriteOptions, WriteSummary};
