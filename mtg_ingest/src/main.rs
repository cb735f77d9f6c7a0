//! MTG Ingest - card & price database builder
//!
//! Loads card and price JSON into SQLite and exports priced card lists.

use clap::{Parser, Subcommand};
use mtg_ingest::config::{
    self, default_db_path, BATCH_SIZE_ENV, DEFAULT_BATCH_SIZE, DEFAULT_DATA_DIR,
    DEFAULT_EXPORT_LIMIT, MAX_EXPORT_LIMIT,
};
use mtg_ingest::csv_export::{default_list_output, default_top_output, write_csv_file};
use mtg_ingest::store::queries::search_cards_by_name;
use mtg_ingest::{
    deck_rows, export_query, ingest_collections, ingest_prices, ingest_sets, log_store_stats,
    parse_deck, source, DeckResolver, Dialect, ExportFilter, IngestError, PriceNormalizer,
    Result, RunReport, Store, WriteMode, WriteOptions,
};
use std::path::{Path, PathBuf};

/// MTG card & price ingestion - builds a SQLite card database and exports prices
#[derive(Parser, Debug)]
#[command(name = "mtg_ingest")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, global = true, default_value_t = default_db_path())]
    database: String,

    /// Directory holding sets/, collections/ and prices/ input
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Rows per write transaction
    #[arg(long, global = true, env = BATCH_SIZE_ENV, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest single-set JSON files
    ProcessCards {
        /// Replace all stored cards instead of merging
        #[arg(long)]
        fresh: bool,
        /// Set files (default: every file in <data-dir>/sets/json)
        files: Vec<PathBuf>,
    },
    /// Ingest format collection JSON files
    ProcessCollections {
        #[arg(long)]
        fresh: bool,
        /// Collection files (default: every file in <data-dir>/collections/json)
        files: Vec<PathBuf>,
    },
    /// Ingest the bulk price file
    ProcessPrices {
        #[arg(long)]
        fresh: bool,
        /// Price file (default: <data-dir>/prices/json/AllPrices.json)
        file: Option<PathBuf>,
    },
    /// Export the most expensive cards as CSV
    ExportTop {
        #[arg(default_value_t = DEFAULT_EXPORT_LIMIT)]
        limit: usize,
        /// Only these set codes (repeatable)
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Only cards playable in every given format (repeatable)
        #[arg(long = "format")]
        formats: Vec<String>,
        /// Count restricted cards as playable
        #[arg(long, default_value_t = false)]
        allow_restricted: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Price a deck list and export it as CSV
    ExportList {
        input: PathBuf,
        /// Force a dialect (mtgs, mwdeck, dec, quantity, plain)
        #[arg(long)]
        dialect: Option<Dialect>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Find cards by name
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show database statistics
    Stats,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let db_path = PathBuf::from(&args.database);
    log::info!("Database path: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    let mut store = Store::open(&db_path)?;
    let options = WriteOptions::with_batch_size(args.batch_size);
    if options.batch_size == 0 {
        return Err(IngestError::Config("--batch-size must be positive".to_string()));
    }

    match args.command {
        Command::ProcessCards { fresh, files } => {
            let files = input_files(files, &config::sets_dir(&args.data_dir))?;
            let report = ingest_sets(&mut store, &files, mode(fresh), &options)?;
            check_report(&report)
        }
        Command::ProcessCollections { fresh, files } => {
            let files = input_files(files, &config::collections_dir(&args.data_dir))?;
            let report = ingest_collections(&mut store, &files, mode(fresh), &options)?;
            check_report(&report)
        }
        Command::ProcessPrices { fresh, file } => {
            let file = file.unwrap_or_else(|| config::prices_file(&args.data_dir));
            let report = ingest_prices(
                &mut store,
                file,
                mode(fresh),
                &options,
                &PriceNormalizer::default(),
            )?;
            check_report(&report)
        }
        Command::ExportTop {
            limit,
            sets,
            formats,
            allow_restricted,
            output,
        } => {
            if limit == 0 || limit > MAX_EXPORT_LIMIT {
                return Err(IngestError::Config(format!(
                    "limit must be between 1 and {}",
                    MAX_EXPORT_LIMIT
                )));
            }
            let output = output.unwrap_or_else(|| default_top_output(limit, &formats));
            let filter = ExportFilter {
                top_n: Some(limit),
                set_codes: sets,
                formats,
                allow_restricted,
                explicit_cards: None,
            };
            let rows = export_query(store.conn(), &filter)?;
            if rows.is_empty() {
                log::warn!("No cards matched the export filters");
            }
            write_csv_file(&rows, &output)?;
            Ok(())
        }
        Command::ExportList {
            input,
            dialect,
            output,
        } => {
            let text = std::fs::read_to_string(&input)?;
            let forced = dialect.or_else(|| {
                input
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(Dialect::from_extension)
            });
            let list = parse_deck(&text, forced);
            log::info!(
                "Parsed {} as {}: {} lines, {} cards",
                input.display(),
                list.dialect,
                list.lines.len(),
                list.card_count()
            );

            let resolved = DeckResolver::new(store.conn()).resolve_list(&list)?;
            let rows = deck_rows(&resolved);
            let total: f64 = rows.iter().filter_map(|row| row.line_total()).sum();
            log::info!("Deck value: {:.2}", total);

            let output = output.unwrap_or_else(|| default_list_output(&input));
            write_csv_file(&rows, &output)?;
            Ok(())
        }
        Command::Search { query, limit } => {
            let results = search_cards_by_name(store.conn(), &query, limit)?;
            if results.is_empty() {
                log::info!("No cards match '{}'", query);
            }
            for card in results {
                match card.min_price {
                    Some(price) => println!(
                        "{} ({} printings, from {:.2})",
                        card.name, card.printings, price
                    ),
                    None => println!("{} ({} printings, unpriced)", card.name, card.printings),
                }
            }
            Ok(())
        }
        Command::Stats => {
            log_store_stats(store.conn())?;
            Ok(())
        }
    }
}

fn mode(fresh: bool) -> WriteMode {
    if fresh {
        WriteMode::Fresh
    } else {
        WriteMode::Incremental
    }
}

/// Explicit files, or every JSON file in the default directory
fn input_files(files: Vec<PathBuf>, default_dir: &Path) -> Result<Vec<PathBuf>> {
    if !files.is_empty() {
        return Ok(files);
    }
    let files = source::discover(default_dir)?;
    if files.is_empty() {
        return Err(IngestError::Config(format!(
            "no JSON files in {}",
            default_dir.display()
        )));
    }
    Ok(files)
}

/// Files that failed are already logged; they still fail the command
fn check_report(report: &RunReport) -> Result<()> {
    let failed = report.failed_files().count();
    if failed > 0 {
        return Err(IngestError::FilesFailed {
            failed,
            total: report.files.len(),
        });
    }
    Ok(())
}
