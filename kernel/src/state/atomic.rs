//! Temp-file-then-rename writes and tolerant, never-fatal reads.
//!
//! Grounded on the teacher corpus's `harness::feature_registry` persistence
//! pattern: write the new document to `<path>.tmp`, `fs::rename` it over the
//! final path (atomic on the filesystems this targets), and on the way back
//! in, degrade through primary -> `.tmp` cleanup -> corrupt-backup -> empty
//! default rather than ever surfacing a parse error to a caller that just
//! wants "give me the last good state".

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to serialize state document: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Atomically write `value` as pretty JSON to `path`.
///
/// Writes to `<path>.tmp` first, then renames over `path`. A torn write
/// (process killed mid-write) leaves the previous `path` intact and a stray
/// `.tmp` behind, which [`clean_stray_tmp`]/[`tolerant_load_json`] clean up
/// on the next load.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StateError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(StateError::Serialize)?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, json).map_err(|source| StateError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| StateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Load a JSON document from `path`, tolerating every failure mode by
/// returning `T::default()`:
///
/// - missing file -> default, no log (the common "first run" case)
/// - unparseable / schema-mismatched file -> default, warn-level log, and
///   the corrupt blob is copied beside the original as `<path>.corrupt`
///   (SPEC_FULL §7: "a backup of the corrupt blob is left beside the
///   original")
///
/// A stray `<path>.tmp` from an interrupted previous write is removed
/// before the read, per SPEC_FULL §6 ("a stray `.tmp` is cleaned on load").
pub fn tolerant_load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    clean_stray_tmp(path);

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read state file, using empty default");
            return T::default();
        }
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "state file is corrupt, discarding in favor of empty default");
            backup_corrupt(path, &raw);
            T::default()
        }
    }
}

/// Remove a leftover `<path>.tmp` from a previous interrupted write, if any.
pub fn clean_stray_tmp(path: &Path) {
    let tmp = tmp_path_for(path);
    if tmp.exists() {
        if let Err(err) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %err, "failed to clean stray .tmp file");
        }
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

fn backup_corrupt(path: &Path, raw: &str) {
    let mut os = path.as_os_str().to_owned();
    os.push(".corrupt");
    let backup = std::path::PathBuf::from(os);
    if let Err(err) = fs::write(&backup, raw) {
        tracing::warn!(path = %backup.display(), error = %err, "failed to write corrupt-state backup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Doc {
        value: u32,
        label: String,
    }

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let doc = Doc {
            value: 7,
            label: "seven".to_string(),
        };
        atomic_write_json(&path, &doc).unwrap();
        let loaded: Doc = tolerant_load_json(&path);
        assert_eq!(loaded, doc);
    }

    #[test]
    fn missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Doc = tolerant_load_json(&path);
        assert_eq!(loaded, Doc::default());
    }

    #[test]
    fn corrupt_file_returns_default_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();
        let loaded: Doc = tolerant_load_json(&path);
        assert_eq!(loaded, Doc::default());
        let backup = dir.path().join("doc.json.corrupt");
        assert!(backup.exists());
    }

    #[test]
    fn stray_tmp_is_cleaned_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let tmp = dir.path().join("doc.json.tmp");
        fs::write(&tmp, "leftover").unwrap();
        let _loaded: Doc = tolerant_load_json(&path);
        assert!(!tmp.exists());
    }

    #[test]
    fn no_tmp_file_left_after_successful_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write_json(&path, &Doc::default()).unwrap();
        assert!(!tmp_path_for(&path).exists());
        assert!(path.exists());
    }
}
