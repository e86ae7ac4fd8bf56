//! Durable sync for table files and their directory.
//!
//! `sync_file` pushes file contents to stable storage using the strongest
//! primitive each platform offers. `sync_parent_dir` makes a completed rename
//! survive power loss on POSIX systems.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Flush `file`'s data to persistent storage.
///
/// - Linux: `fdatasync`
/// - macOS/iOS: `fcntl(F_FULLFSYNC)`, since plain `fsync` stops at the drive cache
/// - Windows: `FlushFileBuffers`
/// - Other: `File::sync_data`
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrowed for the call.
        let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrowed for the call.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File` borrowed for the call.
        let ok = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if ok != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// `durable_sync` with the table path attached to any error.
pub fn sync_file(file: &File, path: &Path) -> StoreResult<()> {
    durable_sync(file).map_err(|e| StoreError::io(path, e, "Failed to sync file"))
}

/// Persist directory entries (renames) for the directory holding `path`.
///
/// Directories cannot be opened as files on Windows; there the rename is
/// already durable once `MoveFileEx` returns, so this is a no-op.
pub fn sync_parent_dir(path: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = File::open(parent)
            .map_err(|e| StoreError::io(parent, e, "Failed to open directory for sync"))?;
        durable_sync(&dir).map_err(|e| StoreError::io(parent, e, "Failed to sync directory"))
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
