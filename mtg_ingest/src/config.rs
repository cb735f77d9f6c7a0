//! Defaults and fixed layout of the data directory
//!
//! The library never reads the environment; the binary resolves flags and
//! `MTG_BATCH_SIZE` through clap and passes plain values in.

use std::path::{Path, PathBuf};

/// Rows per write transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Environment variable the CLI reads for `--batch-size`
pub const BATCH_SIZE_ENV: &str = "MTG_BATCH_SIZE";

pub const DEFAULT_EXPORT_LIMIT: usize = 100;
pub const MAX_EXPORT_LIMIT: usize = 100_000;

/// Records buffered between the parser thread and the writer
pub const SOURCE_CHANNEL_CAPACITY: usize = 256;

/// Providers tried first when picking a price, in order
pub const PREFERRED_PRICE_PROVIDERS: [&str; 4] =
    ["tcgplayer", "cardmarket", "cardkingdom", "cardsphere"];

pub const DEFAULT_DATA_DIR: &str = "data";
const SETS_DIR: &str = "sets";
const COLLECTIONS_DIR: &str = "collections";
const PRICES_DIR: &str = "prices";
/// Decompressed files live next to the archives, under this sub-directory
const JSON_DIR: &str = "json";
pub const PRICES_FILE: &str = "AllPrices.json";

/// `<data>/sets/json`
pub fn sets_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(SETS_DIR).join(JSON_DIR)
}

/// `<data>/collections/json`
pub fn collections_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(COLLECTIONS_DIR).join(JSON_DIR)
}

/// `<data>/prices/json/AllPrices.json`
pub fn prices_file(data_dir: &Path) -> PathBuf {
    data_dir.join(PRICES_DIR).join(JSON_DIR).join(PRICES_FILE)
}

/// Returns the default database path: ~/.local/share/mtg_ingest/cards.db
pub fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mtg_ingest")
        .join("cards.db")
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_layout_paths() {
        let data = Path::new("data");
        assert_eq!(sets_dir(data), PathBuf::from("data/sets/json"));
        assert_eq!(collections_dir(data), PathBuf::from("data/collections/json"));
        assert_eq!(
            prices_file(data),
            PathBuf::from("data/prices/json/AllPrices.json")
        );
    }

    #[test]
    fn default_db_path_ends_with_crate_dir() {
        let path = default_db_path();
        assert!(path.ends_with("cards.db"));
        assert!(path.contains("mtg_ingest"));
    }
}
