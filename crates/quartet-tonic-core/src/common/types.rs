//! The opaque record identifier shared by client and server.
//!
//! Records persisted by the blog service are keyed by a [`RecordId`]. On the
//! wire an identifier travels as its canonical text form: 32 lowercase hex
//! characters. Parsing is strict; anything else is rejected before a request
//! reaches the persistence adapter, so adapters only ever see well-formed
//! keys.

use core::fmt;
use core::str::FromStr;

use uuid::Uuid;

use crate::Error;

/// Opaque identifier assigned to a persisted record by the store.
///
/// Identifiers are never reused: a freshly generated id cannot collide with
/// one released by a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    /// The length of the canonical text form, in characters.
    pub const TEXT_LEN: usize = 32;

    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// Rejection of text that is not a well-formed record identifier.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Cannot parse record id {input:?}")]
pub struct ParseRecordIdError {
    input: String,
}

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let malformed = || ParseRecordIdError {
            input: s.to_string(),
        };
        // Only the canonical 32-character form round-trips; the hyphenated
        // UUID rendering is not part of the wire contract.
        if s.len() != Self::TEXT_LEN {
            return Err(malformed());
        }
        Uuid::try_parse(s).map(Self).map_err(|_| malformed())
    }
}

impl From<ParseRecordIdError> for Error {
    fn from(err: ParseRecordIdError) -> Self {
        Self::InvalidRequest {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::{Code, Status};

    #[test]
    fn display_is_canonical_hex() {
        let id = RecordId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), RecordId::TEXT_LEN);
        assert!(text.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(text, text.to_lowercase());
    }

    #[test]
    fn canonical_text_round_trips() {
        let id = RecordId::generate();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_text_is_rejected() {
        for input in [
            "",
            "not-an-id",
            "5f3e",
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            // Hyphenated UUID rendering is not canonical here.
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            // Too long by one.
            "67e5504410b1426f9247bb680e5fe0c8f",
        ] {
            assert!(input.parse::<RecordId>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn parse_failure_classifies_as_invalid_argument() {
        let err = "nope".parse::<RecordId>().unwrap_err();
        let status = Status::from(Error::from(err));
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
