use crate::{random_chars, IdError, IdResult, ALPHABET};
use std::fmt;

/// Identifier for a stored JSON document.
///
/// Once constructed the contained value is guaranteed to be exactly [`RecordId::LEN`]
/// characters from the url-safe alphabet, which makes it safe to use as a filename.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Length of every record identifier.
    pub const LEN: usize = 12;

    /// Generates a fresh random identifier.
    ///
    /// 72 bits of randomness; collisions are checked by the document store on create.
    pub fn generate() -> Self {
        Self(random_chars(Self::LEN))
    }

    /// Validates an externally supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not a canonical record id.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(IdError::InvalidInput(format!(
            "record id must be {} url-safe characters, got: '{}'",
            Self::LEN,
            input
        )))
    }

    /// Purely syntactic check, usable before calling [`RecordId::parse`].
    pub fn is_canonical(input: &str) -> bool {
        input.len() == Self::LEN && input.bytes().all(|b| ALPHABET.contains(&b))
    }

    /// Filename of the JSON document holding this record.
    pub fn document_filename(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generate_is_canonical() {
        for _ in 0..100 {
            let id = RecordId::generate();
            assert!(RecordId::is_canonical(&id.to_string()), "bad id {id}");
        }
    }

    #[test]
    fn generate_is_unique_enough() {
        let ids: HashSet<_> = (0..1_000).map(|_| RecordId::generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn parse_accepts_url_safe_alphabet() {
        assert!(RecordId::parse("V1StGXR8_Z5j").is_ok());
        assert!(RecordId::parse("abc-DEF_0123").is_ok());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(RecordId::parse("short").is_err());
        assert!(RecordId::parse("V1StGXR8_Z5jX").is_err());
    }

    #[test]
    fn parse_rejects_path_characters() {
        assert!(RecordId::parse("../index.jso").is_err());
        assert!(RecordId::parse("abc/def.json").is_err());
    }

    #[test]
    fn document_filename_appends_extension() {
        let id = RecordId::parse("V1StGXR8_Z5j").unwrap();
        assert_eq!(id.document_filename(), "V1StGXR8_Z5j.json");
    }
}
