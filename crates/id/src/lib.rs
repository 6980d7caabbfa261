//! Identifier utilities.
//!
//! Acervo uses two kinds of server-generated identifiers:
//!
//! - [`RecordId`]: a short random identifier for JSON documents (animal fact-sheets).
//!   Exactly 12 characters drawn from the url-safe alphabet `A-Z a-z 0-9 _ -`, for example
//!   `V1StGXR8_Z5j`. Document files are named `<id>.json`.
//! - [`UploadName`]: the stored filename of an uploaded binary, which doubles as the upload's
//!   identifier. Format: `<unix_millis>-<6 random chars>-<sanitised base><.ext>`, for example
//!   `1718000000000-a8Zk3Q-ajolote_rosa.png`.
//!
//! Both types validate externally supplied values before they are ever joined onto a
//! directory path, so a crafted id such as `../index` can never escape the storage root.

mod record_id;
mod upload_name;

pub use record_id::RecordId;
pub use upload_name::UploadName;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;

/// Url-safe alphabet shared by generated identifiers.
pub(crate) const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub(crate) fn random_chars(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
