//! Exclusive OS file lock guarding a snapshot document.
//!
//! The lock lives in a sibling file (`<document>.lock`) and is held for the
//! lifetime of [`FileLock`]. Acquisition never blocks: if another process
//! holds it, `acquire` fails with `ErrorKind::WouldBlock`.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// Exclusive lock on a snapshot document.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Lock the document at `document`.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if another process holds the lock
    /// - `ErrorKind::NotFound` if the document's directory does not exist
    pub fn acquire(document: &Path) -> IoResult<Self> {
        let path = lock_path_for(document);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        try_lock(&file)?;

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path_for(document: &Path) -> PathBuf {
    let mut name: OsString = document
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), ToOwned::to_owned);
    name.push(".lock");
    document.with_file_name(name)
}

#[cfg(unix)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is a valid open descriptor owned by `file` for the call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

    if result != 0 {
        let errno = IoError::last_os_error();
        if errno.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                "snapshot is locked by another process",
            ));
        }
        return Err(errno);
    }

    Ok(())
}

#[cfg(windows)]
fn try_lock(file: &File) -> IoResult<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: `handle` is valid for the lifetime of `file`; OVERLAPPED is
    // plain data and zero is a valid initial state.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        let err = IoError::last_os_error();
        return Err(IoError::new(
            ErrorKind::WouldBlock,
            format!("snapshot is locked by another process: {err}"),
        ));
    }

    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn try_lock(_file: &File) -> IoResult<()> {
    Err(IoError::new(
        ErrorKind::Unsupported,
        "file locking not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_file_sits_next_to_document() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("db.json");

        let lock = FileLock::acquire(&doc).unwrap();
        assert_eq!(lock.path(), dir.path().join("db.json.lock"));
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("db.json");

        let first = FileLock::acquire(&doc).unwrap();
        let err = FileLock::acquire(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);

        drop(first);
        assert!(FileLock::acquire(&doc).is_ok());
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("nope").join("db.json");
        assert_eq!(
            FileLock::acquire(&doc).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
