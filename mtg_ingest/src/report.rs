//! Run reports: per-file outcomes, skipped-record tallies and store stats

use crate::store::queries::{
    get_card_count, get_cards_without_prices_count, get_price_stats, get_rarity_distribution,
    get_set_summaries,
};
use crate::store::{DbResult, EntityKind, WriteMode, WriteSummary};
use mtg_common::RecordError;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Examples kept per tally
pub const MAX_EXAMPLES: usize = 5;

/// Skipped records: counts per error kind plus the first few messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipTally {
    counts: BTreeMap<&'static str, usize>,
    examples: Vec<String>,
}

impl SkipTally {
    pub fn record(&mut self, err: &RecordError) {
        *self.counts.entry(err.kind()).or_insert(0) += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(err.to_string());
        }
        log::debug!("Skipped record: {}", err);
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn absorb(&mut self, other: &SkipTally) {
        for (kind, count) in &other.counts {
            *self.counts.entry(kind).or_insert(0) += count;
        }
        let room = MAX_EXAMPLES.saturating_sub(self.examples.len());
        self.examples
            .extend(other.examples.iter().take(room).cloned());
    }

    fn describe(&self) -> String {
        self.counts
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What happened to one input file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    /// Rows committed from this file
    pub written: WriteSummary,
    pub skipped: SkipTally,
    /// Set when the file stopped early (malformed, unreadable)
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            written: WriteSummary::default(),
            skipped: SkipTally::default(),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(path)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of an ingest run over one or more files
#[derive(Debug, Clone)]
pub struct RunReport {
    pub entity: EntityKind,
    pub mode: WriteMode,
    pub files: Vec<FileReport>,
    /// Totals across all files
    pub written: WriteSummary,
    /// The run was marked complete in the store
    pub completed: bool,
}

impl RunReport {
    pub fn new(entity: EntityKind, mode: WriteMode) -> Self {
        Self {
            entity,
            mode,
            files: Vec::new(),
            written: WriteSummary::default(),
            completed: false,
        }
    }

    pub fn push(&mut self, file: FileReport) {
        self.written.absorb(file.written);
        self.files.push(file);
    }

    pub fn skipped(&self) -> SkipTally {
        let mut total = SkipTally::default();
        for file in &self.files {
            total.absorb(&file.skipped);
        }
        total
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failed_files().next().is_some()
    }

    /// Log per-file lines and the overall summary
    pub fn log_summary(&self) {
        for file in &self.files {
            let name = file.path.display();
            match &file.error {
                None => log::info!(
                    "  {}: {} new, {} updated, {} skipped",
                    name,
                    file.written.inserted,
                    file.written.updated,
                    file.skipped.total()
                ),
                Some(error) => log::error!(
                    "  {}: failed after {} rows: {}",
                    name,
                    file.written.rows(),
                    error
                ),
            }
        }

        let skipped = self.skipped();
        log::info!(
            "{} {} run {}: {} files, {} new, {} updated, {} skipped, {} failed files",
            self.mode,
            self.entity,
            if self.completed { "complete" } else { "incomplete" },
            self.files.len(),
            self.written.inserted,
            self.written.updated,
            skipped.total(),
            self.failed_files().count()
        );
        if skipped.total() > 0 {
            log::warn!("Skipped records: {}", skipped.describe());
            for example in skipped.examples() {
                log::warn!("  e.g. {}", example);
            }
        }
    }
}

/// Log verification statistics for the store
pub fn log_store_stats(conn: &Connection) -> DbResult<()> {
    log::info!("Total cards: {}", get_card_count(conn)?);

    let sets = get_set_summaries(conn, 10)?;
    if !sets.is_empty() {
        log::info!("Largest sets:");
        for set in &sets {
            log::info!(
                "  {} ({}): {} cards",
                set.code,
                set.name.as_deref().unwrap_or("?"),
                set.cards
            );
        }
    }

    let rarities = get_rarity_distribution(conn)?;
    if !rarities.is_empty() {
        let line = rarities
            .iter()
            .map(|(rarity, count)| format!("{} {}", count, rarity))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!("Rarities: {}", line);
    }

    let prices = get_price_stats(conn)?;
    log::info!(
        "Prices: {} entries, {} priced, {} matching stored cards",
        prices.entries,
        prices.priced,
        prices.matched_cards
    );
    if let (Some(min), Some(max), Some(avg)) = (prices.min, prices.max, prices.average) {
        log::info!("  range {:.2} - {:.2}, average {:.2}", min, max, avg);
    }
    if let Some(date) = &prices.latest_date {
        log::info!("  latest observation {}", date);
    }
    log::info!(
        "Cards without prices: {}",
        get_cards_without_prices_count(conn)?
    );
    Ok(())
}
