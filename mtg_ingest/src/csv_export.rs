//! CSV rendering of export rows

use crate::export::ExportRow;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CSV_HEADERS: [&str; 6] = [
    "Card Name",
    "Set Code",
    "Set Name",
    "Quantity",
    "Price",
    "Matched",
];

/// Write rows with a header line. Prices have two decimals; an unknown
/// price is an empty cell.
pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;

    for row in rows {
        let quantity = row.quantity.to_string();
        let price = row.price.map(|p| format!("{:.2}", p)).unwrap_or_default();
        wtr.write_record([
            row.name.as_str(),
            row.set_code.as_deref().unwrap_or(""),
            row.set_name.as_deref().unwrap_or(""),
            quantity.as_str(),
            price.as_str(),
            if row.matched { "yes" } else { "no" },
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write rows to a file, creating or truncating it
pub fn write_csv_file(rows: &[ExportRow], path: impl AsRef<Path>) -> csv::Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_csv(rows, file)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

/// `decks/burn.txt` -> `decks/burn_prices.csv`
pub fn default_list_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "deck".to_string());
    input.with_file_name(format!("{}_prices.csv", stem))
}

/// `top_100_cards.csv`, or `top_100_legacy_modern_cards.csv` with formats
pub fn default_top_output(limit: usize, formats: &[String]) -> PathBuf {
    let mut name = format!("top_{}", limit);
    for format in formats {
        name.push('_');
        name.push_str(&format.trim().to_lowercase().replace(' ', "_"));
    }
    PathBuf::from(format!("{}_cards.csv", name))
}
