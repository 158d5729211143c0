//! Deterministic JSON artifacts on disk.
//!
//! Artifacts are pretty-printed with a trailing newline and written atomically: the
//! content goes to a sibling temp file, which is synced and then renamed over the target,
//! and the directory is synced so the rename itself survives a crash. Readers therefore see
//! either the old file or the new one, never a torn write.

use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};

const LOG_TARGET: &str = "     store";

/// Render `value` exactly as [`write_json`] stores it.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value).into_app_err("serializing JSON")?;
    text.push('\n');
    Ok(text)
}

/// Load a JSON artifact; `None` if the file does not exist.
///
/// A file that exists but cannot be parsed is an error: artifacts are never silently
/// replaced by an empty default.
pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!(target: LOG_TARGET, "No file at '{path}'");
            return Ok(None);
        }
        Err(e) => return Err(e).into_app_err_with(|| format!("opening '{path}'")),
    };

    let value = serde_json::from_reader(BufReader::new(file)).into_app_err_with(|| format!("parsing '{path}'"))?;
    Ok(Some(value))
}

fn temp_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut name = path.file_name().unwrap_or("artifact").to_string();
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with the pretty JSON rendering of `value`.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let text = to_pretty_json(value)?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
            parent
        }
        _ => Utf8Path::new("."),
    };

    let temp = temp_path(path);
    let result = write_synced(&temp, text.as_bytes()).and_then(|()| {
        fs::rename(&temp, path).into_app_err_with(|| format!("moving '{temp}' into place at '{path}'"))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp);
        return result;
    }

    sync_dir(parent)?;
    log::debug!(target: LOG_TARGET, "Wrote '{path}'");
    Ok(())
}

/// Flush a directory's entries so a completed rename inside it is durable.
#[cfg(unix)]
fn sync_dir(dir: &Utf8Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .into_app_err_with(|| format!("syncing directory '{dir}'"))
}

/// Directories cannot be opened as files here; the rename is as durable as the platform allows.
#[cfg(not(unix))]
#[expect(clippy::unnecessary_wraps, reason = "matches the unix signature")]
fn sync_dir(_dir: &Utf8Path) -> Result<()> {
    Ok(())
}

fn write_synced(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).into_app_err_with(|| format!("creating '{path}'"))?;
    file.write_all(bytes).into_app_err_with(|| format!("writing '{path}'"))?;
    file.sync_all().into_app_err_with(|| format!("syncing '{path}'"))?;
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: u64,
    }

    fn utf8_temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, path)
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn write_then_read() {
        let (_tmp, dir) = utf8_temp_dir();
        let path = dir.join("nested/dir/data.json");
        let data = TestData {
            name: "widgets".into(),
            value: 42,
        };

        write_json(&path, &data).unwrap();

        assert_eq!(read_json::<TestData>(&path).unwrap(), Some(data));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn missing_file_reads_as_none() {
        let (_tmp, dir) = utf8_temp_dir();
        assert_eq!(read_json::<TestData>(&dir.join("absent.json")).unwrap(), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn corrupt_file_is_an_error() {
        let (_tmp, dir) = utf8_temp_dir();
        let path = dir.join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let _ = read_json::<TestData>(&path).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn identical_values_give_identical_bytes() {
        let (_tmp, dir) = utf8_temp_dir();
        let path = dir.join("data.json");
        let data = TestData {
            name: "widgets".into(),
            value: 1,
        };

        write_json(&path, &data).unwrap();
        let first = fs::read(&path).unwrap();
        write_json(&path, &data).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().ends_with("}\n"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn failed_rename_leaves_no_temp_file() {
        let (_tmp, dir) = utf8_temp_dir();
        let path = dir.join("occupied.json");
        fs::create_dir_all(path.join("child")).unwrap();

        let _ = write_json(&path, &1u32).unwrap_err();

        assert!(!temp_path(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn directory_sync_succeeds_after_write() {
        let (_tmp, dir) = utf8_temp_dir();
        write_json(&dir.join("data.json"), &1u32).unwrap();

        sync_dir(&dir).unwrap();
    }

    #[test]
    #[cfg(unix)]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn directory_sync_reports_missing_directory() {
        let (_tmp, dir) = utf8_temp_dir();
        let _ = sync_dir(&dir.join("gone")).unwrap_err();
    }
}
