//! PID file locking (§11.1).
//!
//! Opens the configured path `O_RDWR|O_CREAT`, sets `FD_CLOEXEC`, and takes
//! an advisory exclusive `flock`. A second process targeting the same path
//! must see the lock held and fail fast rather than opening a second view.
//! Mirrors `TerminalGuard`'s enter-on-construct/leave-on-`Drop` shape so the
//! lock and file are released on every exit path, panics included.

use anyhow::{Context, Result, bail};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

pub struct PidFile {
    file: std::fs::File,
    path: PathBuf,
}

impl PidFile {
    /// Acquire the lock at `path`, writing the current PID into the file.
    /// Fails if another process already holds the lock.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating parent directory for pid file {}", path.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening pid file {}", path.display()))?;

        set_cloexec(&file)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            bail!(
                "another rofi process already holds the lock on {} (is it already running?)",
                path.display()
            );
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn set_cloexec(file: &std::fs::File) -> Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        bail!("fcntl(F_GETFD) failed for pid file");
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if rc < 0 {
        bail!("fcntl(F_SETFD) failed for pid file");
    }
    Ok(())
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_twice_on_the_same_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rofi.pid");
        let first = PidFile::acquire(&path).unwrap();
        let second = PidFile::acquire(&path);
        assert!(second.is_err());
        drop(first);
    }

    #[test]
    fn dropping_releases_the_lock_for_a_later_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rofi.pid");
        {
            let _guard = PidFile::acquire(&path).unwrap();
        }
        let second = PidFile::acquire(&path);
        assert!(second.is_ok());
    }

    #[test]
    fn writes_current_pid_into_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rofi.pid");
        let _guard = PidFile::acquire(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, std::process::id().to_string());
    }
}
