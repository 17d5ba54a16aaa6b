//! # Document Numbering
//!
//! Rules for the sequential business document numbers stamped on every
//! weighing transaction.
//!
//! ## Format
//! `<prefix>-<sequence>`, e.g. `A-1001`. The prefix partitions independent
//! numbering streams; the sequence is the highest previously issued value
//! under that prefix plus one, starting from a fixed floor when the stream
//! is empty.
//!
//! Allocation itself lives in the ledger (it must be serialized against the
//! row insert); this module only knows the pure rules.

use crate::error::CoreError;
use crate::SEQUENCE_FLOOR;

/// Numbering stream a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPrefix {
    /// Normal operation — every transaction created through the agent.
    Normal,
    /// Bootstrap/manual series, kept separate from the normal stream.
    Manual,
}

impl DocumentPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentPrefix::Normal => "A",
            DocumentPrefix::Manual => "B",
        }
    }
}

/// Formats a document number from its parts.
pub fn format_document_number(prefix: DocumentPrefix, sequence: i64) -> String {
    format!("{}-{}", prefix.as_str(), sequence)
}

/// Extracts the numeric sequence from a document number under `prefix`.
///
/// Returns an error when the string does not match `<prefix>-<digits>`.
pub fn parse_sequence(document_number: &str, prefix: DocumentPrefix) -> Result<i64, CoreError> {
    let malformed = || CoreError::InvalidDocumentNumber(document_number.to_string());

    let rest = document_number
        .strip_prefix(prefix.as_str())
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(malformed)?;

    rest.parse::<i64>().map_err(|_| malformed())
}

/// Next sequence given the highest already-issued sequence for the prefix.
pub fn next_sequence(max_existing: Option<i64>) -> i64 {
    max_existing.unwrap_or(SEQUENCE_FLOOR) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_prefix() {
        assert_eq!(format_document_number(DocumentPrefix::Normal, 1001), "A-1001");
        assert_eq!(format_document_number(DocumentPrefix::Manual, 4213), "B-4213");
    }

    #[test]
    fn parses_sequence_back() {
        assert_eq!(parse_sequence("A-1001", DocumentPrefix::Normal).unwrap(), 1001);
        assert!(parse_sequence("A-1001", DocumentPrefix::Manual).is_err());
        assert!(parse_sequence("A-", DocumentPrefix::Normal).is_err());
        assert!(parse_sequence("A1001", DocumentPrefix::Normal).is_err());
    }

    #[test]
    fn fresh_stream_starts_above_floor() {
        assert_eq!(next_sequence(None), 1001);
        assert_eq!(next_sequence(Some(1001)), 1002);
        // Sequences are strictly increasing regardless of gaps.
        assert_eq!(next_sequence(Some(2500)), 2501);
    }
}
