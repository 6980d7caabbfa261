//! Input validation utilities.
//!
//! Request bodies are decoded with [`parse_json`], which reports the JSON path of the first
//! offending value. Field rules are collected with an [`Issues`] accumulator so a single
//! response lists every problem at once.

use crate::{AcervoError, AcervoResult, Issue};
use acervo_types::{NonEmptyText, TextError};
use serde::de::DeserializeOwned;

/// Decodes a JSON request body.
///
/// # Errors
///
/// Returns `AcervoError::Validation` with the path of the failing value when the bytes are not
/// valid JSON or do not match `T` (unknown fields, wrong types).
pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> AcervoResult<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(|e| {
        let path = e.path().to_string();
        let path = match path.as_str() {
            "." | "?" => String::new(),
            _ => path,
        };
        AcervoError::Validation(vec![Issue::new(path, e.inner().to_string())])
    })
}

/// Accumulates field-level issues.
#[derive(Debug, Default)]
pub struct Issues(Vec<Issue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Issue::new(path, message));
    }

    /// Validates a required text field with a minimum length after trimming.
    ///
    /// Returns the trimmed value, or `None` after recording an issue.
    pub fn text(&mut self, path: &str, value: Option<&str>, min_chars: usize) -> Option<String> {
        let Some(value) = value else {
            self.push(path, "required");
            return None;
        };
        match NonEmptyText::with_min_chars(value, min_chars) {
            Ok(text) => Some(text.into_string()),
            Err(TextError::Empty) => {
                self.push(path, "must not be empty");
                None
            }
            Err(TextError::TooShort { min, .. }) => {
                self.push(path, format!("must contain at least {min} characters"));
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when no issue was recorded.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> AcervoResult<T> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(AcervoError::Validation(self.0))
        }
    }
}

/// True for absolute `http://` / `https://` URLs with a non-empty host.
pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
