//! Ingest runs: source files -> normalizer -> batch writer
//!
//! One run spans every input file. A file that cannot be read or turns out
//! malformed is reported and the run moves on to the next file; rows it
//! committed before failing stay. A batch that fails to commit aborts the
//! whole run and leaves it `in_progress`, as does a run in which no input
//! file could be read.

use crate::error::Result;
use crate::normalize::{normalize_card, PriceNormalizer};
use crate::report::{log_store_stats, FileReport, RunReport, SkipTally};
use crate::source::{self, RawRecord, SourceKind};
use crate::store::{Store, StoreEntity, WriteError, WriteMode, WriteOptions, WriteSummary};
use mtg_common::{Card, PriceEntry, RecordError};
use std::path::PathBuf;

/// Ingest single-set files
pub fn ingest_sets(
    store: &mut Store,
    files: &[PathBuf],
    mode: WriteMode,
    options: &WriteOptions,
) -> Result<RunReport> {
    run::<Card, _>(store, files, SourceKind::Set, mode, options, normalize_card)
}

/// Ingest format collection files
pub fn ingest_collections(
    store: &mut Store,
    files: &[PathBuf],
    mode: WriteMode,
    options: &WriteOptions,
) -> Result<RunReport> {
    run::<Card, _>(
        store,
        files,
        SourceKind::Collection,
        mode,
        options,
        normalize_card,
    )
}

/// Ingest the bulk price file
pub fn ingest_prices(
    store: &mut Store,
    file: PathBuf,
    mode: WriteMode,
    options: &WriteOptions,
    normalizer: &PriceNormalizer,
) -> Result<RunReport> {
    run::<PriceEntry, _>(
        store,
        &[file],
        SourceKind::Prices,
        mode,
        options,
        |record| normalizer.normalize(record),
    )
}

fn run<T, F>(
    store: &mut Store,
    files: &[PathBuf],
    kind: SourceKind,
    mode: WriteMode,
    options: &WriteOptions,
    normalize: F,
) -> Result<RunReport>
where
    T: StoreEntity,
    F: Fn(RawRecord) -> std::result::Result<T, RecordError>,
{
    if options.batch_size == 0 {
        return Err(WriteError::InvalidBatchSize.into());
    }

    log::info!(
        "Starting {} {} ingest of {} {} file(s)",
        mode,
        T::KIND,
        files.len(),
        kind
    );
    let mut report = RunReport::new(T::KIND, mode);
    let mut run = store.begin_run::<T>(mode)?;
    let mut cancelled = false;

    for path in files {
        let stream = match source::read(path, kind) {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Cannot read {}: {}", path.display(), e);
                report.push(FileReport::failed(path, e));
                continue;
            }
        };

        let mut file = FileReport::new(path);
        let mut skipped = SkipTally::default();
        let items = stream.filter_map(|item| match item {
            Ok(record) => match normalize(record) {
                Ok(entity) => Some(Ok(entity)),
                Err(e) => {
                    skipped.record(&e);
                    None
                }
            },
            Err(e) => Some(Err(e)),
        });

        let before = run.summary();
        let outcome = store.write_batches(&mut run, items, options);
        file.skipped = skipped;
        file.written = delta(before, run.summary());

        match outcome {
            Ok(summary) => {
                log::info!(
                    "{}: {} rows in {} batches, {} skipped",
                    path.display(),
                    summary.rows(),
                    summary.batches,
                    file.skipped.total()
                );
                cancelled = summary.cancelled;
                report.push(file);
            }
            Err(WriteError::Source { source, .. }) => {
                log::error!(
                    "Stopped reading {} after {} rows: {}",
                    path.display(),
                    file.written.rows(),
                    source
                );
                file.error = Some(source.to_string());
                report.push(file);
            }
            Err(e) => {
                report.push(file);
                report.log_summary();
                return Err(e.into());
            }
        }

        if cancelled {
            break;
        }
    }

    let nothing_read = !files.is_empty() && report.files.iter().all(|file| !file.is_ok());
    if cancelled {
        log::warn!("{} run cancelled; left in progress", T::KIND);
    } else if nothing_read {
        log::warn!(
            "No {} file could be read; {} run left in progress",
            kind,
            T::KIND
        );
    } else {
        store.finish_run(run)?;
        report.completed = true;
    }

    report.log_summary();
    log_store_stats(store.conn())?;
    Ok(report)
}

/// Rows written between two run snapshots
fn delta(before: WriteSummary, after: WriteSummary) -> WriteSummary {
    WriteSummary {
        batches: after.batches - before.batches,
        inserted: after.inserted - before.inserted,
        updated: after.updated - before.updated,
        cancelled: after.cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::queries::{get_card_by_uuid, get_card_count, get_price, get_price_count};
    use crate::store::test_support::test_store;
    use crate::store::{CancelToken, EntityKind, RunStatus};
    use mtg_common::Legality;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    const LEA: &str = r#"{"data": {"code": "LEA", "name": "Limited Edition Alpha", "cards": [
        {"uuid": "lea-lotus", "name": "Black Lotus", "rarity": "rare", "manaValue": 0,
         "legalities": {"vintage": "Restricted"}},
        {"name": "No Identity"},
        {"uuid": "lea-bolt", "name": "Lightning Bolt", "rarity": "common", "manaValue": 1,
         "legalities": {"vintage": "Legal", "legacy": "Legal"}}
    ]}}"#;

    const MIR: &str = r#"{"data": {"code": "MIR", "name": "Mirage", "cards": [
        {"uuid": "mir-bolt", "name": "Lightning Bolt"}
    ]}}"#;

    #[test]
    fn sets_are_written_and_bad_records_tallied() {
        let dir = TempDir::new().unwrap();
        let files = vec![write_file(&dir, "LEA.json", LEA), write_file(&dir, "MIR.json", MIR)];
        let mut store = test_store();

        let report = ingest_sets(
            &mut store,
            &files,
            WriteMode::Fresh,
            &WriteOptions::with_batch_size(1),
        )
        .unwrap();

        assert!(report.completed);
        assert!(!report.has_failures());
        assert_eq!(report.written.inserted, 3);
        assert_eq!(report.files[0].written.rows(), 2);
        assert_eq!(report.files[0].skipped.count("missing_identity"), 1);
        assert_eq!(report.files[1].written.rows(), 1);
        assert_eq!(get_card_count(store.conn()).unwrap(), 3);

        let status = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
        assert_eq!(status.status, RunStatus::Complete);
        assert_eq!(status.batches_committed, 3);
    }

    #[test]
    fn malformed_file_is_reported_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_file(&dir, "BAD.json", r#"{"data": {"code": "BAD", "cards": [{"uuid": "x1", "na"#),
            dir.path().join("missing.json"),
            write_file(&dir, "MIR.json", MIR),
        ];
        let mut store = test_store();

        let report = ingest_sets(
            &mut store,
            &files,
            WriteMode::Incremental,
            &WriteOptions::default(),
        )
        .unwrap();

        assert!(report.completed);
        assert_eq!(report.failed_files().count(), 2);
        assert!(report.files[2].is_ok());
        assert!(get_card_by_uuid(store.conn(), "mir-bolt").unwrap().is_some());
    }

    #[test]
    fn fresh_prices_from_a_collection_file_keep_stored_prices() {
        let dir = TempDir::new().unwrap();
        let prices = write_file(
            &dir,
            "AllPrices.json",
            r#"{"data": {"lea-bolt": {"paper": {"tcgplayer": {"currency": "USD",
                "retail": {"normal": {"2024-06-01": 450.0}}}}}}}"#,
        );
        let collection = write_file(
            &dir,
            "Legacy.json",
            r#"{"data": {"LEA": {"code": "LEA", "name": "Alpha", "cards": [
                {"uuid": "lea-bolt", "name": "Lightning Bolt"}
            ]}}}"#,
        );
        let mut store = test_store();
        let normalizer = PriceNormalizer::new("2024-07-01");
        let options = WriteOptions::default();
        ingest_prices(&mut store, prices, WriteMode::Incremental, &options, &normalizer).unwrap();

        let report =
            ingest_prices(&mut store, collection, WriteMode::Fresh, &options, &normalizer).unwrap();

        assert!(report.has_failures());
        assert!(!report.completed);
        assert_eq!(report.written.rows(), 0);
        assert_eq!(get_price_count(store.conn()).unwrap(), 1);
        let status = store.ingest_status(EntityKind::Prices).unwrap().unwrap();
        assert_eq!(status.mode, WriteMode::Fresh);
        assert_eq!(status.status, RunStatus::InProgress);
    }

    #[test]
    fn collections_add_format_legality() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "Legacy.json",
            r#"{"data": {"LEA": {"code": "LEA", "name": "Alpha", "cards": [
                {"uuid": "lea-lotus", "name": "Black Lotus", "legalities": {"legacy": "Banned"}},
                {"uuid": "lea-bolt", "name": "Lightning Bolt"}
            ]}}}"#,
        );
        let mut store = test_store();

        ingest_collections(
            &mut store,
            &[path],
            WriteMode::Incremental,
            &WriteOptions::default(),
        )
        .unwrap();

        let lotus = get_card_by_uuid(store.conn(), "lea-lotus").unwrap().unwrap();
        assert_eq!(lotus.legalities.status("legacy"), Legality::Banned);
        let bolt = get_card_by_uuid(store.conn(), "lea-bolt").unwrap().unwrap();
        assert_eq!(bolt.legalities.status("Legacy"), Legality::Legal);
    }

    #[test]
    fn prices_are_normalized_and_written() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "AllPrices.json",
            r#"{"meta": {}, "data": {
                "lea-lotus": {"paper": {"tcgplayer": {"currency": "USD",
                    "retail": {"normal": {"2024-05-01": 20000.0, "2024-06-01": 25000.0}}}}},
                "lea-bolt": {},
                "": {"paper": {}}
            }}"#,
        );
        let mut store = test_store();

        let report = ingest_prices(
            &mut store,
            path,
            WriteMode::Fresh,
            &WriteOptions::default(),
            &PriceNormalizer::new("2024-07-01"),
        )
        .unwrap();

        assert_eq!(report.entity, EntityKind::Prices);
        assert_eq!(report.skipped().total(), 1);
        assert_eq!(get_price_count(store.conn()).unwrap(), 2);
        let lotus = get_price(store.conn(), "lea-lotus").unwrap().unwrap();
        assert_eq!(lotus.average_price, Some(25000.0));
        assert_eq!(lotus.last_updated, "2024-06-01");
        let bolt = get_price(store.conn(), "lea-bolt").unwrap().unwrap();
        assert_eq!(bolt.average_price, None);
        assert_eq!(bolt.last_updated, "2024-07-01");
    }

    #[test]
    fn cancelled_run_stays_in_progress() {
        let dir = TempDir::new().unwrap();
        let files = vec![write_file(&dir, "LEA.json", LEA)];
        let mut store = test_store();
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = WriteOptions {
            cancel: Some(cancel),
            ..WriteOptions::default()
        };

        let report = ingest_sets(&mut store, &files, WriteMode::Fresh, &options).unwrap();

        assert!(!report.completed);
        assert_eq!(get_card_count(store.conn()).unwrap(), 0);
        let status = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
        assert_eq!(status.status, RunStatus::InProgress);
    }

    #[test]
    fn zero_batch_size_is_rejected_before_starting() {
        let mut store = test_store();
        let result = ingest_sets(
            &mut store,
            &[],
            WriteMode::Fresh,
            &WriteOptions::with_batch_size(0),
        );
        assert!(result.is_err());
        assert!(store.ingest_status(EntityKind::Cards).unwrap().is_none());
    }
}
