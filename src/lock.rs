use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, RollupError};

pub const LOCK_FILE: &str = ".dns-rollup.lock";

/// Single-instance guard for a work directory. The lock is released when
/// the guard is dropped; the file itself is left in place.
pub struct RunLock {
    file: File,
    path: PathBuf,
}

#[cfg(unix)]
fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// `Ok(false)` when another process already holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    match flock(file, libc::LOCK_EX | libc::LOCK_NB) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

fn record_owner(file: &File) -> io::Result<()> {
    file.set_len(0)?;
    let mut writer = file;
    write!(writer, "{}", std::process::id())?;
    writer.flush()
}

/// PID written by whoever holds the lock, if it is readable.
pub fn holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

impl RunLock {
    pub fn acquire(work_dir: &Path) -> Result<Self> {
        let path = work_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| RollupError::io(&path, e))?;

        if !try_lock_exclusive(&file).map_err(|e| RollupError::io(&path, e))? {
            warn!(
                action = "contend",
                component = "run_lock",
                file_path = ?path,
                holder_pid = ?holder_pid(&path),
                "Another run holds the lock"
            );
            return Err(RollupError::LockUnavailable(path));
        }

        // The lock is already ours; the PID is only a hint for operators.
        if let Err(e) = record_owner(&file) {
            warn!(action = "record_owner", component = "run_lock", file_path = ?path, error = %e, "Could not write PID to lock file");
        }

        info!(action = "acquire", component = "run_lock", file_path = ?path, "Acquired run lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Err(e) = flock(&self.file, libc::LOCK_UN) {
                warn!(action = "release", component = "run_lock", file_path = ?self.path, error = %e, "Failed to release run lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLock::acquire(dir.path()).unwrap();
        assert!(matches!(
            RunLock::acquire(dir.path()),
            Err(RollupError::LockUnavailable(_))
        ));
        drop(first);
        assert!(RunLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn lock_file_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        assert_eq!(holder_pid(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn stale_owner_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs::write(&path, "999999999 left over from a crash").unwrap();
        assert_eq!(holder_pid(&path), None);

        let lock = RunLock::acquire(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );
    }
}
