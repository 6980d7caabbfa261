//! Atomic file replacement.
//!
//! [`write_atomic`] writes the full contents to a uniquely named temporary sibling and then
//! renames it over the destination in one `rename(2)`. Both files live in the same directory,
//! so the rename never crosses a filesystem boundary.
//!
//! Temporary names are `<file>.<unix_millis>-<pid>-<seq>.tmp`. The millisecond timestamp
//! alone is not collision-proof, so a process-wide sequence number is appended.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh temporary sibling path for `path`.
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis();
    path.with_file_name(format!(
        "{file_name}.{millis}-{}-{seq}.{suffix}",
        std::process::id()
    ))
}

/// Writes `bytes` to `path` atomically.
///
/// # Errors
///
/// Returns the underlying I/O error, annotated with the path involved, if the temporary
/// file cannot be created, written, flushed or renamed. The temporary file is removed on
/// failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path, "tmp");

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io::Error::new(
            e.kind(),
            format!("Failed to write {} atomically: {}", path.display(), e),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temps(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn writes_new_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        write_atomic(&path, b"{\"count\":0}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{\"count\":0}");
        assert!(leftover_temps(temp.path()).is_empty());
    }

    #[test]
    fn replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        fs::write(&path, b"old contents that are longer").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn fails_when_directory_missing_and_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("index.json");

        let err = write_atomic(&path, b"x").unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("index.json"));
        assert!(leftover_temps(temp.path()).is_empty());
    }

    #[test]
    fn temp_siblings_are_unique() {
        let path = Path::new("/data/index.json");
        let a = temp_sibling(path, "tmp");
        let b = temp_sibling(path, "tmp");
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("index.json."));
    }
}
