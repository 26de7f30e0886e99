//! Filesystem storage for companion test artifacts.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use crate::error::HarnessError;

/// Create an empty file at `path` unless one already exists.
///
/// Returns `true` when the file was created. An existing file is never opened
/// for writing, so its content is left untouched.
pub fn ensure_exists(path: &Path) -> Result<bool, HarnessError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!(path = %path.display(), "created empty artifact");
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(HarnessError::io("create", path, err)),
    }
}

/// Read the full content of `path` as text.
pub fn read(path: &Path) -> Result<String, HarnessError> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            HarnessError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            HarnessError::io("read", path, err)
        }
    })
}

/// Replace the full content of `path`.
///
/// The file is truncated and rewritten in place, so symlinks are followed and
/// the existing permissions are kept.
pub fn write(path: &Path, content: &str) -> Result<(), HarnessError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| HarnessError::io("open", path, err))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| HarnessError::io("write", path, err))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
    Ok(())
}
