//! Errors scoped to a single record or deck line.
//!
//! None of these abort a run: records are skipped and counted, deck lines
//! are reported individually.

use thiserror::Error;

/// A source record that could not be turned into an entity
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// The record has no uuid, so nothing can be keyed on it
    #[error("record without uuid skipped (name: {name}, set: {set_code})")]
    MissingIdentity { name: String, set_code: String },
    /// The record is present but its fields do not have the expected shape
    #[error("invalid record {context}: {detail}")]
    Invalid { context: String, detail: String },
}

impl RecordError {
    pub fn missing_identity(name: Option<&str>, set_code: Option<&str>) -> Self {
        RecordError::MissingIdentity {
            name: name.unwrap_or("<unnamed>").to_string(),
            set_code: set_code.unwrap_or("<unknown>").to_string(),
        }
    }

    pub fn invalid(context: impl Into<String>, detail: impl ToString) -> Self {
        RecordError::Invalid {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    /// Short label used when tallying skipped records
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::MissingIdentity { .. } => "missing_identity",
            RecordError::Invalid { .. } => "invalid",
        }
    }
}

/// A deck-list line whose card name matched nothing in the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: no card named \"{name}\"{}", in_set(.set_code))]
pub struct UnresolvedCardError {
    pub line_number: usize,
    pub name: String,
    pub set_code: Option<String>,
}

fn in_set(set_code: &Option<String>) -> String {
    match set_code {
        Some(code) => format!(" in set {}", code),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_names_the_record() {
        let err = RecordError::missing_identity(Some("Lightning Bolt"), None);
        assert_eq!(
            err.to_string(),
            "record without uuid skipped (name: Lightning Bolt, set: <unknown>)"
        );
        assert_eq!(err.kind(), "missing_identity");
    }

    #[test]
    fn unresolved_card_mentions_set_constraint() {
        let err = UnresolvedCardError {
            line_number: 3,
            name: "Heritage Druid".to_string(),
            set_code: Some("MOR".to_string()),
        };
        assert_eq!(err.to_string(), "line 3: no card named \"Heritage Druid\" in set MOR");

        let err = UnresolvedCardError {
            line_number: 1,
            name: "Nonexistent".to_string(),
            set_code: None,
        };
        assert_eq!(err.to_string(), "line 1: no card named \"Nonexistent\"");
    }
}
