//! Batched, resumable writes of normalized entities
//!
//! A run is started with [`Store::begin_run`], fed any number of times with
//! [`Store::write_batches`] (one call per source file) and closed with
//! [`Store::finish_run`]. Each batch commits on its own together with the
//! run's progress counters, so a crash or failure leaves every earlier
//! batch in place and the run marked `in_progress`.
//!
//! A fresh run clears the kind's table inside its first committed batch,
//! or inside `finish_run` if no batch was ever committed. A fresh run that
//! fails before committing anything leaves the stored rows untouched.

use super::entity::{EntityKind, StoreEntity};
use super::{DbResult, Store};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::source::SourceError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Whether a run starts from an empty table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Delete every row of the kind together with the first batch
    Fresh,
    /// Keep existing rows; upsert by uuid
    Incremental,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Fresh => "fresh",
            WriteMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for WriteMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "fresh" => Ok(WriteMode::Fresh),
            "incremental" => Ok(WriteMode::Incremental),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    InProgress,
    Complete,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "in_progress" => Ok(RunStatus::InProgress),
            "complete" => Ok(RunStatus::Complete),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Stored progress of the last run for one entity kind
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRun {
    pub entity: EntityKind,
    pub mode: WriteMode,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub batches_committed: usize,
    pub rows_written: usize,
}

/// Shared stop flag, checked between batches
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Entities per transaction; must be positive
    pub batch_size: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }
}

impl WriteOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Outcome of one or more `write_batches` calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Batches committed
    pub batches: usize,
    /// Rows whose uuid was not stored before
    pub inserted: usize,
    /// Rows that overwrote an existing uuid
    pub updated: usize,
    /// Stopped early by a [`CancelToken`]
    pub cancelled: bool,
}

impl WriteSummary {
    pub fn rows(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn absorb(&mut self, other: WriteSummary) {
        self.batches += other.batches;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.cancelled |= other.cancelled;
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("batch size must be positive")]
    InvalidBatchSize,

    #[error("cannot start {entity} run: {source}")]
    Begin {
        entity: EntityKind,
        #[source]
        source: rusqlite::Error,
    },

    /// Batch `batch_index` (1-based within the run) was rolled back; the
    /// `batches_committed` batches before it are durable
    #[error(
        "{entity} batch {batch_index} rolled back ({batches_committed} batches committed): {source}"
    )]
    Batch {
        entity: EntityKind,
        batch_index: usize,
        batches_committed: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// The input failed while batch `batch_index` was being filled; that
    /// batch was discarded uncommitted
    #[error("input failed while filling batch {batch_index}: {source}")]
    Source {
        batch_index: usize,
        #[source]
        source: SourceError,
    },

    #[error("cannot mark {entity} run complete: {source}")]
    Finish {
        entity: EntityKind,
        #[source]
        source: rusqlite::Error,
    },
}

/// An open ingest run for entity type `T`
#[derive(Debug)]
pub struct Run<T> {
    mode: WriteMode,
    batches_committed: usize,
    summary: WriteSummary,
    /// Fresh run whose table has not been cleared yet
    pending_clear: bool,
    _entity: PhantomData<fn(T)>,
}

impl<T: StoreEntity> Run<T> {
    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn batches_committed(&self) -> usize {
        self.batches_committed
    }

    /// Totals across every `write_batches` call so far
    pub fn summary(&self) -> WriteSummary {
        self.summary
    }
}

impl Store {
    /// Start a run and mark it `in_progress`. Existing rows stay in place
    /// until a fresh run commits its first batch or finishes.
    pub fn begin_run<T: StoreEntity>(&mut self, mode: WriteMode) -> Result<Run<T>, WriteError> {
        let kind = T::KIND;
        let begin = |conn: &Connection| -> DbResult<usize> {
            conn.execute(
                "INSERT OR REPLACE INTO ingest_runs
                 (entity, mode, status, started_at, finished_at, batches_committed, rows_written)
                 VALUES (?1, ?2, ?3, datetime('now'), NULL, 0, 0)",
                params![kind.as_str(), mode.as_str(), RunStatus::InProgress.as_str()],
            )
        };

        let previous = self
            .ingest_status(kind)
            .map_err(|source| WriteError::Begin { entity: kind, source })?;
        if let Some(run) = previous.filter(|run| run.status == RunStatus::InProgress) {
            log::warn!(
                "Previous {} {} run started {} did not complete ({} batches committed)",
                run.mode,
                kind,
                run.started_at,
                run.batches_committed
            );
        }

        begin(&self.conn).map_err(|source| WriteError::Begin { entity: kind, source })?;
        Ok(Run {
            mode,
            batches_committed: 0,
            summary: WriteSummary::default(),
            pending_clear: mode == WriteMode::Fresh,
            _entity: PhantomData,
        })
    }

    /// Consume `items` in batches of `options.batch_size`, committing each.
    ///
    /// Stops without committing the partial batch on the first `Err` item,
    /// and before starting a new batch once the cancel token is set.
    pub fn write_batches<T, I>(
        &mut self,
        run: &mut Run<T>,
        items: I,
        options: &WriteOptions,
    ) -> Result<WriteSummary, WriteError>
    where
        T: StoreEntity,
        I: IntoIterator<Item = Result<T, SourceError>>,
    {
        if options.batch_size == 0 {
            return Err(WriteError::InvalidBatchSize);
        }

        let mut items = items.into_iter();
        let mut batch: Vec<T> = Vec::with_capacity(options.batch_size);
        let mut summary = WriteSummary::default();

        loop {
            if options.is_cancelled() {
                log::info!(
                    "{} run cancelled after {} batches",
                    T::KIND,
                    run.batches_committed
                );
                summary.cancelled = true;
                break;
            }

            batch.clear();
            let batch_index = run.batches_committed + 1;
            for item in items.by_ref() {
                match item {
                    Ok(entity) => batch.push(entity),
                    Err(source) => {
                        run.summary.absorb(summary);
                        return Err(WriteError::Source {
                            batch_index,
                            source,
                        });
                    }
                }
                if batch.len() == options.batch_size {
                    break;
                }
            }
            if batch.is_empty() {
                break;
            }

            let (inserted, updated) =
                commit_batch(&mut self.conn, &batch, run.pending_clear).map_err(|source| {
                    run.summary.absorb(summary);
                    WriteError::Batch {
                        entity: T::KIND,
                        batch_index,
                        batches_committed: run.batches_committed,
                        source,
                    }
                })?;

            run.pending_clear = false;
            run.batches_committed = batch_index;
            summary.batches += 1;
            summary.inserted += inserted;
            summary.updated += updated;
            log::debug!(
                "Committed {} batch {} ({} new, {} updated)",
                T::KIND,
                batch_index,
                inserted,
                updated
            );
        }

        run.summary.absorb(summary);
        Ok(summary)
    }

    /// Mark the run complete. A fresh run that committed no batch clears
    /// the table here.
    pub fn finish_run<T: StoreEntity>(&mut self, run: Run<T>) -> Result<WriteSummary, WriteError> {
        let finish = |conn: &mut Connection| -> DbResult<()> {
            let tx = conn.transaction()?;
            if run.pending_clear {
                clear_table::<T>(&tx)?;
            }
            tx.execute(
                "UPDATE ingest_runs SET status = ?2, finished_at = datetime('now') WHERE entity = ?1",
                params![T::KIND.as_str(), RunStatus::Complete.as_str()],
            )?;
            tx.commit()
        };
        finish(&mut self.conn).map_err(|source| WriteError::Finish {
            entity: T::KIND,
            source,
        })?;

        log::info!(
            "{} {} run complete: {} batches, {} new, {} updated",
            run.mode,
            T::KIND,
            run.summary.batches,
            run.summary.inserted,
            run.summary.updated
        );
        Ok(run.summary)
    }

    /// Write one sequence of entities as a complete run.
    ///
    /// A cancelled write is left `in_progress`.
    pub fn write<T, I>(
        &mut self,
        items: I,
        mode: WriteMode,
        options: &WriteOptions,
    ) -> Result<WriteSummary, WriteError>
    where
        T: StoreEntity,
        I: IntoIterator<Item = Result<T, SourceError>>,
    {
        if options.batch_size == 0 {
            return Err(WriteError::InvalidBatchSize);
        }
        let mut run = self.begin_run::<T>(mode)?;
        let summary = self.write_batches(&mut run, items, options)?;
        if summary.cancelled {
            return Ok(summary);
        }
        self.finish_run(run)
    }

    /// Last run recorded for `kind`; `None` if it was never ingested
    pub fn ingest_status(&self, kind: EntityKind) -> DbResult<Option<IngestRun>> {
        self.conn
            .query_row(
                "SELECT mode, status, started_at, finished_at, batches_committed, rows_written
                 FROM ingest_runs WHERE entity = ?1",
                params![kind.as_str()],
                |row| {
                    Ok(IngestRun {
                        entity: kind,
                        mode: row.get(0)?,
                        status: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        batches_committed: row.get(4)?,
                        rows_written: row.get(5)?,
                    })
                },
            )
            .optional()
    }
}

fn clear_table<T: StoreEntity>(tx: &Transaction<'_>) -> DbResult<()> {
    let deleted = tx.execute(&format!("DELETE FROM {}", T::KIND.table()), [])?;
    log::info!("Fresh {} run: cleared {} existing rows", T::KIND, deleted);
    Ok(())
}

/// Upsert one batch and bump the run counters in a single transaction,
/// clearing the table first when `clear` is set. Returns (inserted, updated).
fn commit_batch<T: StoreEntity>(
    conn: &mut Connection,
    batch: &[T],
    clear: bool,
) -> DbResult<(usize, usize)> {
    let tx = conn.transaction()?;
    if clear {
        clear_table::<T>(&tx)?;
    }
    let mut inserted = 0;
    let mut updated = 0;

    for entity in batch {
        if T::exists(&tx, entity.key())? {
            updated += 1;
        } else {
            inserted += 1;
        }
        entity.upsert(&tx)?;
    }

    tx.execute(
        "UPDATE ingest_runs
         SET batches_committed = batches_committed + 1, rows_written = rows_written + ?2
         WHERE entity = ?1",
        params![T::KIND.as_str(), batch.len()],
    )?;
    tx.commit()?;
    Ok((inserted, updated))
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
