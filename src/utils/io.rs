//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use crate::permissions::FileVisibility;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Read a file, treating absence as `Ok(None)`.
///
/// Any other failure (permissions, not a file, invalid UTF-8) is a
/// persistence error for the caller.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::persistence_read(
            path.display().to_string(),
            e.to_string(),
        )),
    }
}

/// Read raw bytes, treating absence as `Ok(None)`.
///
/// Decoding is left to the caller, so content that is not UTF-8 is still
/// returned rather than reported as a read failure.
pub fn read_optional_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::persistence_read(
            path.display().to_string(),
            e.to_string(),
        )),
    }
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// The rename is atomic on POSIX filesystems, so readers see either the old
/// content or the new content, never a partial write. The temp file is
/// created with `visibility`'s mode so a private file is never briefly
/// readable by other accounts.
pub fn write_file_atomic(path: &Path, content: &str, visibility: FileVisibility) -> Result<()> {
    let write_error = |e: std::io::Error| Error::persistence_write(path.display().to_string(), e.to_string());

    let parent = path.parent().ok_or_else(|| {
        Error::persistence_write(path.display().to_string(), "path has no parent directory")
    })?;
    let filename = path.file_name().ok_or_else(|| {
        Error::persistence_write(path.display().to_string(), "path has no file name")
    })?;

    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    visibility.apply(&mut options);

    // A stale temp file keeps its old mode; start from scratch.
    let _ = fs::remove_file(&tmp_path);

    let result = options
        .open(&tmp_path)
        .and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_error(e));
    }

    Ok(())
}
