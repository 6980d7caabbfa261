/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The trimmed input has fewer characters than required
    #[error("must contain at least {min} characters")]
    TooShort { min: usize, actual: usize },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a `NonEmptyText` whose trimmed content has at least `min` characters.
    ///
    /// Characters are counted as Unicode scalar values, so "Ñu" has two.
    pub fn with_min_chars(input: impl AsRef<str>, min: usize) -> Result<Self, TextError> {
        let text = Self::new(input)?;
        let actual = text.0.chars().count();
        if actual < min {
            return Err(TextError::TooShort { min, actual });
        }
        Ok(text)
    }

    /// Consumes the wrapper and returns the trimmed string.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// An ordered set of tags.
///
/// Every tag is trimmed, empty tags are dropped and duplicates are removed keeping the
/// first occurrence. Comparison is exact: "Selva" and "selva" are distinct tags, matching
/// how tags are stored; case-insensitive membership is a query concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tag set from a comma-separated list such as `"aves, selva,,aves"`.
    pub fn from_comma_list(input: &str) -> Self {
        input.split(',').collect()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    fn push(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() || self.0.iter().any(|t| t == tag) {
            return;
        }
        self.0.push(tag.to_owned());
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.push(tag.as_ref());
        }
        set
    }
}

impl serde::Serialize for TagSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for TagSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tags = Vec::<String>::deserialize(deserializer)?;
        Ok(tags.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims() {
        let text = NonEmptyText::new("  Ajolote  ").unwrap();
        assert_eq!(text.into_string(), "Ajolote");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn min_chars_counts_scalar_values() {
        assert!(NonEmptyText::with_min_chars("Ñu", 2).is_ok());
        assert_eq!(
            NonEmptyText::with_min_chars(" a ", 2),
            Err(TextError::TooShort { min: 2, actual: 1 })
        );
    }

    #[test]
    fn tag_set_dedups_and_drops_empty() {
        let tags: TagSet = ["aves", " selva ", "", "aves", "selva"].into_iter().collect();
        assert_eq!(tags.as_slice(), &["aves".to_string(), "selva".to_string()]);
    }

    #[test]
    fn tag_set_from_comma_list() {
        let tags = TagSet::from_comma_list("aves, endémico,, aves");
        assert_eq!(tags.as_slice(), &["aves".to_string(), "endémico".to_string()]);
    }

    #[test]
    fn tag_set_deserialize_normalises() {
        let tags: TagSet = serde_json::from_str(r#"["a", "a", " ", "b "]"#).unwrap();
        assert_eq!(tags.as_slice(), &["a".to_string(), "b".to_string()]);
    }
}
