//! Source reader for provider JSON files.
//!
//! `read` opens a decompressed provider file and returns a lazy stream of
//! [`RawRecord`]s. Parsing happens on a dedicated thread that hands records
//! over a bounded channel, so memory use does not grow with file size.
//! Dropping the stream stops the parser at its next record.

mod document;
mod raw;

pub use raw::{RawRecord, SetInfo};

use crate::config::SOURCE_CHANNEL_CAPACITY;
use document::{DocumentSeed, Emitter};
use serde::de::DeserializeSeed;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use thiserror::Error;

/// Which of the provider's document shapes a file is expected to have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Single set: `data` is one set object with a `cards` array
    Set,
    /// Per-format collection: `data` maps set codes to set objects
    Collection,
    /// Bulk prices: `data` maps card uuids to price objects
    Prices,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Set => "set",
            SourceKind::Collection => "collection",
            SourceKind::Prices => "prices",
        })
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "set" | "sets" => Ok(SourceKind::Set),
            "collection" | "collections" => Ok(SourceKind::Collection),
            "prices" | "price" => Ok(SourceKind::Prices),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// File-level failures; each aborts processing of that file only
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file does not have the structure its kind requires
    #[error("malformed {kind} file {}: {detail}", .path.display())]
    Malformed {
        path: PathBuf,
        kind: SourceKind,
        detail: String,
    },
}

impl SourceError {
    fn from_json(path: &Path, kind: SourceKind, err: serde_json::Error) -> Self {
        if err.is_io() {
            return SourceError::Io {
                path: path.to_path_buf(),
                source: err.into(),
            };
        }
        SourceError::Malformed {
            path: path.to_path_buf(),
            kind,
            detail: err.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SourceError::Io { path, .. } | SourceError::Malformed { path, .. } => path,
        }
    }
}

/// Lazy sequence of raw records from one file
pub struct RecordStream {
    rx: Receiver<Result<RawRecord, SourceError>>,
}

impl Iterator for RecordStream {
    type Item = Result<RawRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

/// Open a provider file and stream its records.
///
/// Re-opening the same file yields the same sequence. A document whose
/// top-level shape does not match `kind` yields a single
/// [`SourceError::Malformed`] before any record.
pub fn read(path: impl AsRef<Path>, kind: SourceKind) -> Result<RecordStream, SourceError> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path).map_err(|source| SourceError::Io {
        path: path.clone(),
        source,
    })?;

    let label = file_label(&path);
    let (tx, rx) = mpsc::sync_channel(SOURCE_CHANNEL_CAPACITY);
    let thread_path = path.clone();

    thread::Builder::new()
        .name(format!("source-{}", label))
        .spawn(move || {
            let mut emitter = Emitter::new(tx);
            let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
            let result = DocumentSeed {
                emitter: &mut emitter,
                kind,
                label: &label,
            }
            .deserialize(&mut deserializer)
            .and_then(|()| deserializer.end());

            match result {
                Ok(()) => log::debug!(
                    "Read {} {} records from {}",
                    emitter.emitted(),
                    kind,
                    thread_path.display()
                ),
                Err(_) if emitter.is_disconnected() => log::debug!(
                    "Stopped reading {} after {} records (stream dropped)",
                    thread_path.display(),
                    emitter.emitted()
                ),
                Err(e) => emitter.fail(SourceError::from_json(&thread_path, kind, e)),
            }
        })
        .map_err(|source| SourceError::Io { path, source })?;

    Ok(RecordStream { rx })
}

/// All `*.json` files directly inside `dir`, sorted by name
pub fn discover(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, SourceError> {
    let dir = dir.as_ref();
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem without extensions, e.g. `LEA.json` -> `LEA`
fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
