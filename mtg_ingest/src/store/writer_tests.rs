//! Tests for the batch writer

use super::*;
use crate::store::queries::{get_card_by_uuid, get_card_count, get_price, get_price_count};
use crate::store::test_support::{make_test_card, make_test_price, test_store};
use mtg_common::{Card, PriceEntry};
use std::path::PathBuf;

fn ok_items<T>(items: Vec<T>) -> Vec<Result<T, SourceError>> {
    items.into_iter().map(Ok).collect()
}

fn cards(n: usize) -> Vec<Card> {
    (1..=n)
        .map(|i| make_test_card(&format!("uuid-{}", i), &format!("Card {}", i), "TST"))
        .collect()
}

fn options(batch_size: usize) -> WriteOptions {
    WriteOptions::with_batch_size(batch_size)
}

#[test]
fn write_inserts_in_batches() {
    let mut store = test_store();

    let summary = store
        .write(ok_items(cards(5)), WriteMode::Incremental, &options(2))
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.inserted, 5);
    assert_eq!(summary.updated, 0);
    assert!(!summary.cancelled);
    assert_eq!(get_card_count(store.conn()).unwrap(), 5);

    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Complete);
    assert_eq!(run.mode, WriteMode::Incremental);
    assert_eq!(run.batches_committed, 3);
    assert_eq!(run.rows_written, 5);
    assert!(run.finished_at.is_some());
}

#[test]
fn upserting_same_uuid_twice_keeps_latest_values() {
    let mut store = test_store();

    let first = make_test_card("uuid-1", "Black Lotus", "LEA");
    store
        .write(ok_items(vec![first]), WriteMode::Incremental, &options(10))
        .unwrap();

    let mut second = make_test_card("uuid-1", "Black Lotus", "LEA");
    second.rarity = Some("rare".to_string());
    second.artist = Some("Christopher Rush".to_string());
    let summary = store
        .write(ok_items(vec![second.clone()]), WriteMode::Incremental, &options(10))
        .unwrap();

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(get_card_count(store.conn()).unwrap(), 1);
    let stored = get_card_by_uuid(store.conn(), "uuid-1").unwrap().unwrap();
    assert_eq!(stored, second);
}

#[test]
fn duplicate_uuid_within_one_batch_counts_as_update() {
    let mut store = test_store();
    let items = vec![
        make_test_card("uuid-1", "Plains", "LEA"),
        make_test_card("uuid-1", "Plains", "LEB"),
    ];

    let summary = store
        .write(ok_items(items), WriteMode::Incremental, &options(10))
        .unwrap();
    assert_eq!((summary.inserted, summary.updated), (1, 1));
    let stored = get_card_by_uuid(store.conn(), "uuid-1").unwrap().unwrap();
    assert_eq!(stored.set_code, "LEB");
}

#[test]
fn fresh_with_no_input_leaves_table_empty() {
    let mut store = test_store();
    store
        .write(ok_items(cards(3)), WriteMode::Incremental, &options(10))
        .unwrap();
    assert_eq!(get_card_count(store.conn()).unwrap(), 3);

    let summary = store
        .write(ok_items(Vec::<Card>::new()), WriteMode::Fresh, &options(10))
        .unwrap();

    assert_eq!(summary.batches, 0);
    assert_eq!(get_card_count(store.conn()).unwrap(), 0);
    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.mode, WriteMode::Fresh);
    assert_eq!(run.status, RunStatus::Complete);
}

#[test]
fn fresh_cards_run_keeps_prices() {
    let mut store = test_store();
    store
        .write(
            ok_items(vec![make_test_price("uuid-1", Some(2.0))]),
            WriteMode::Incremental,
            &options(10),
        )
        .unwrap();

    store
        .write(ok_items(cards(1)), WriteMode::Fresh, &options(10))
        .unwrap();
    assert_eq!(get_price_count(store.conn()).unwrap(), 1);
}

#[test]
fn fresh_run_clears_table_with_first_batch() {
    let mut store = test_store();
    store
        .write(ok_items(cards(3)), WriteMode::Incremental, &options(10))
        .unwrap();

    let mut run = store.begin_run::<Card>(WriteMode::Fresh).unwrap();
    assert_eq!(get_card_count(store.conn()).unwrap(), 3);

    let fresh = vec![make_test_card("uuid-9", "Card 9", "TST")];
    let summary = store
        .write_batches(&mut run, ok_items(fresh), &options(10))
        .unwrap();
    assert_eq!((summary.inserted, summary.updated), (1, 0));
    assert_eq!(get_card_count(store.conn()).unwrap(), 1);

    store.finish_run(run).unwrap();
    assert_eq!(get_card_count(store.conn()).unwrap(), 1);
}

#[test]
fn fresh_run_failing_before_first_batch_keeps_rows() {
    let mut store = test_store();
    store
        .write(ok_items(cards(3)), WriteMode::Incremental, &options(10))
        .unwrap();

    let items = vec![Err(SourceError::Malformed {
        path: PathBuf::from("Legacy.json"),
        kind: crate::source::SourceKind::Collection,
        detail: "invalid type".to_string(),
    })];
    let err = store
        .write::<Card, _>(items, WriteMode::Fresh, &options(10))
        .unwrap_err();

    assert!(matches!(err, WriteError::Source { batch_index: 1, .. }));
    assert_eq!(get_card_count(store.conn()).unwrap(), 3);
    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.mode, WriteMode::Fresh);
    assert_eq!(run.status, RunStatus::InProgress);
}

#[test]
fn failed_batch_keeps_earlier_batches() {
    let mut store = test_store();
    store
        .conn()
        .execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON cards
             WHEN NEW.name = 'Poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned row'); END;",
        )
        .unwrap();

    let mut items = cards(4);
    items.push(make_test_card("uuid-5", "Poison", "TST"));
    items.push(make_test_card("uuid-6", "Card 6", "TST"));

    let err = store
        .write(ok_items(items), WriteMode::Incremental, &options(2))
        .unwrap_err();

    match err {
        WriteError::Batch {
            entity,
            batch_index,
            batches_committed,
            ..
        } => {
            assert_eq!(entity, EntityKind::Cards);
            assert_eq!(batch_index, 3);
            assert_eq!(batches_committed, 2);
        }
        other => panic!("expected batch error, got {:?}", other),
    }

    assert_eq!(get_card_count(store.conn()).unwrap(), 4);
    assert!(get_card_by_uuid(store.conn(), "uuid-6").unwrap().is_none());

    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
    assert_eq!(run.batches_committed, 2);
    assert_eq!(run.rows_written, 4);
}

#[test]
fn source_error_discards_partial_batch() {
    let mut store = test_store();
    let mut items = ok_items(cards(3));
    items.push(Err(SourceError::Malformed {
        path: PathBuf::from("LEA.json"),
        kind: crate::source::SourceKind::Set,
        detail: "EOF while parsing".to_string(),
    }));
    items.push(Ok(make_test_card("uuid-9", "Card 9", "TST")));

    let err = store
        .write(items, WriteMode::Incremental, &options(2))
        .unwrap_err();

    assert!(matches!(err, WriteError::Source { batch_index: 2, .. }));
    assert_eq!(get_card_count(store.conn()).unwrap(), 2);
    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
}

#[test]
fn cancelled_run_stays_in_progress() {
    let mut store = test_store();
    let token = CancelToken::new();
    let opts = WriteOptions {
        batch_size: 2,
        cancel: Some(token.clone()),
    };

    let cancel_after_three = {
        let token = token.clone();
        cards(10).into_iter().enumerate().map(move |(i, card)| {
            if i == 3 {
                token.cancel();
            }
            Ok(card)
        })
    };

    let summary = store
        .write(cancel_after_three, WriteMode::Incremental, &opts)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.batches, 2);
    assert_eq!(get_card_count(store.conn()).unwrap(), 4);
    let run = store.ingest_status(EntityKind::Cards).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
}

#[test]
fn run_spans_multiple_inputs() {
    let mut store = test_store();
    let mut run = store.begin_run::<Card>(WriteMode::Fresh).unwrap();

    store
        .write_batches(&mut run, ok_items(cards(3)), &options(2))
        .unwrap();
    let more = vec![make_test_card("uuid-3", "Card 3", "TST"), make_test_card("uuid-4", "Card 4", "TST")];
    let second = store
        .write_batches(&mut run, ok_items(more), &options(2))
        .unwrap();
    assert_eq!((second.inserted, second.updated), (1, 1));

    assert_eq!(run.batches_committed(), 3);
    let total = store.finish_run(run).unwrap();
    assert_eq!(total.batches, 3);
    assert_eq!(total.inserted, 4);
    assert_eq!(total.updated, 1);
    assert_eq!(total.rows(), 5);
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut store = test_store();
    let err = store
        .write(ok_items(cards(1)), WriteMode::Incremental, &options(0))
        .unwrap_err();
    assert!(matches!(err, WriteError::InvalidBatchSize));
    assert!(store.ingest_status(EntityKind::Cards).unwrap().is_none());
}

#[test]
fn ingest_status_is_none_before_first_run() {
    let store = test_store();
    assert!(store.ingest_status(EntityKind::Prices).unwrap().is_none());
}

#[test]
fn reingesting_prices_replaces_entries() {
    let mut store = test_store();
    let first = vec![
        make_test_price("uuid-1", Some(2.0)),
        make_test_price("uuid-2", Some(3.0)),
    ];
    store
        .write(ok_items(first), WriteMode::Incremental, &options(10))
        .unwrap();

    let second = vec![
        PriceEntry {
            last_updated: "2024-06-02".to_string(),
            ..make_test_price("uuid-1", Some(2.5))
        },
        PriceEntry::unpriced("uuid-2", "2024-06-02"),
    ];
    let summary = store
        .write(ok_items(second), WriteMode::Incremental, &options(10))
        .unwrap();

    assert_eq!(summary.updated, 2);
    assert_eq!(get_price_count(store.conn()).unwrap(), 2);

    let one = get_price(store.conn(), "uuid-1").unwrap().unwrap();
    assert_eq!(one.average_price, Some(2.5));
    assert_eq!(one.last_updated, "2024-06-02");

    let two = get_price(store.conn(), "uuid-2").unwrap().unwrap();
    assert_eq!(two, PriceEntry::unpriced("uuid-2", "2024-06-02"));
}

#[test]
fn batch_error_message_names_resume_point() {
    let err = WriteError::Batch {
        entity: EntityKind::Prices,
        batch_index: 7,
        batches_committed: 6,
        source: rusqlite::Error::QueryReturnedNoRows,
    };
    let message = err.to_string();
    assert!(message.contains("prices batch 7"));
    assert!(message.contains("6 batches committed"));
}
