use crate::{random_chars, IdError, IdResult};
use chrono::{DateTime, Utc};
use std::fmt;

const MAX_BASE_CHARS: usize = 60;
const MAX_EXT_CHARS: usize = 10;
const MAX_NAME_BYTES: usize = 255;
const FALLBACK_BASE: &str = "archivo";

/// Stored filename of an uploaded binary.
///
/// Generated names are `<unix_millis>-<6 random chars>-<base><.ext>`. The original client
/// filename contributes only a sanitised base (whitespace collapsed to `_`, path characters
/// removed, at most 60 characters) and a lower-cased alphanumeric extension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UploadName(String);

impl UploadName {
    /// Generates a stored filename for a client-supplied original filename.
    pub fn generate(original_name: &str, now: DateTime<Utc>) -> Self {
        let (base, ext) = split_original(original_name);
        let name = match ext {
            Some(ext) => format!(
                "{}-{}-{}.{}",
                now.timestamp_millis(),
                random_chars(6),
                base,
                ext
            ),
            None => format!("{}-{}-{}", now.timestamp_millis(), random_chars(6), base),
        };
        Self(name)
    }

    /// Validates a filename taken from a request path before it is joined onto a directory.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if the name is empty, too long, hidden, or contains
    /// path separators or control characters.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_safe(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(IdError::InvalidInput(format!(
            "not a valid upload filename: '{}'",
            input
        )))
    }

    pub fn is_safe(input: &str) -> bool {
        !input.is_empty()
            && input.len() <= MAX_NAME_BYTES
            && !input.starts_with('.')
            && !input
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension without the leading dot, lower-cased; empty when there is none.
    pub fn extension(&self) -> String {
        match self.0.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for UploadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UploadName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn split_original(original_name: &str) -> (String, Option<String>) {
    // Browsers on some platforms send the full client path.
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .trim();

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let ext = ext
        .map(|e| e.to_lowercase())
        .filter(|e| {
            !e.is_empty()
                && e.chars().count() <= MAX_EXT_CHARS
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        });

    let mut base = String::new();
    let mut in_space = false;
    for c in stem.chars() {
        if c.is_whitespace() {
            if !in_space {
                base.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            continue;
        }
        base.push(c);
    }
    let base: String = base
        .trim_start_matches('.')
        .chars()
        .take(MAX_BASE_CHARS)
        .collect();

    if base.is_empty() {
        (FALLBACK_BASE.to_owned(), ext)
    } else {
        (base, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_718_000_000_000).unwrap()
    }

    #[test]
    fn generate_keeps_base_and_lowercases_extension() {
        let name = UploadName::generate("Ajolote Rosa.PNG", fixed_now());
        let s = name.as_str();
        assert!(s.starts_with("1718000000000-"), "{s}");
        assert!(s.ends_with("-Ajolote_Rosa.png"), "{s}");
        assert_eq!(name.extension(), "png");
    }

    #[test]
    fn generate_strips_client_path() {
        let name = UploadName::generate("C:\\Users\\ana\\informe final.pdf", fixed_now());
        assert!(name.as_str().ends_with("-informe_final.pdf"));
        assert!(UploadName::is_safe(name.as_str()));
    }

    #[test]
    fn generate_truncates_long_base() {
        let long = format!("{}.txt", "x".repeat(200));
        let name = UploadName::generate(&long, fixed_now());
        // millis + '-' + 6 random + '-' + 60 base + ".txt"
        assert_eq!(name.as_str().len(), 13 + 1 + 6 + 1 + 60 + 4);
        assert!(name.as_str().ends_with(&format!("{}.txt", "x".repeat(60))));
    }

    #[test]
    fn generate_falls_back_for_empty_names() {
        let name = UploadName::generate("", fixed_now());
        assert!(name.as_str().ends_with("-archivo"));
        assert_eq!(name.extension(), "");
    }

    #[test]
    fn generate_never_produces_hidden_or_traversing_names() {
        let name = UploadName::generate("../../.bashrc", fixed_now());
        assert!(UploadName::is_safe(name.as_str()));
        assert!(!name.as_str().contains(".."));
    }

    #[test]
    fn parse_rejects_traversal() {
        assert!(UploadName::parse("..").is_err());
        assert!(UploadName::parse("../files-index.json").is_err());
        assert!(UploadName::parse("a\\b").is_err());
        assert!(UploadName::parse("").is_err());
        assert!(UploadName::parse("1718-abc-nota.txt").is_ok());
    }
}
