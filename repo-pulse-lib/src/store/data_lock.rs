use crate::Result;
use camino::Utf8Path;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};

const LOG_TARGET: &str = "     store";

/// Name of the lock file inside the data directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Guard that releases the data directory lock when dropped
#[derive(Debug)]
pub struct DataLockGuard(File);

impl Drop for DataLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not unlock data directory: {e:#}");
        }
    }
}

/// Take an exclusive advisory lock on `data_dir`, waiting for any other run to finish.
///
/// The directory is created if needed.
pub async fn acquire_data_lock(data_dir: &Utf8Path) -> Result<DataLockGuard> {
    std::fs::create_dir_all(data_dir).into_app_err_with(|| format!("creating data directory '{data_dir}'"))?;
    let lock_path = data_dir.join(LOCK_FILE_NAME);

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening lock file '{lock_path}'"))?;

    // Locking may block for as long as another run holds the directory.
    let file = tokio::task::spawn_blocking(move || {
        if !file.try_lock_exclusive().unwrap_or(false) {
            log::info!(target: LOG_TARGET, "Waiting for another run to release '{lock_path}'");
            file.lock_exclusive()
                .into_app_err_with(|| format!("locking data directory via '{lock_path}'"))?;
        }
        log::debug!(target: LOG_TARGET, "Acquired data directory lock '{lock_path}'");
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(DataLockGuard(file))
}
