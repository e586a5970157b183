//! Script and output files on disk.
//!
//! Writes go to a temporary file in the destination directory that is then
//! renamed over the target, so an existing file is either fully replaced or
//! left untouched.

use crate::domain::ProcessingError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScriptIoError {
    #[error("permission denied writing '{path}'")]
    PermissionDenied { path: PathBuf },
    #[error("directory '{path}' does not exist")]
    MissingDirectory { path: PathBuf },
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScriptIoError {
    fn from_write(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::NotFound => Self::MissingDirectory {
                path: parent_directory(path).to_path_buf(),
            },
            _ => Self::Write {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "IO.SCRIPT_PERMISSION",
            Self::MissingDirectory { .. } => "IO.SCRIPT_DIRECTORY",
            Self::Read { .. } => "IO.SCRIPT_READ",
            Self::Write { .. } => "IO.SCRIPT_WRITE",
        }
    }
}

impl From<ScriptIoError> for ProcessingError {
    fn from(error: ScriptIoError) -> Self {
        ProcessingError::io_system(error.placeholder(), error.to_string())
    }
}

/// Canonical `\n` line endings with a trailing newline.
pub fn normalize_script_text(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn read_script(path: &Path) -> Result<String, ScriptIoError> {
    fs::read_to_string(path).map_err(|source| ScriptIoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_script(path: &Path, content: &str) -> Result<(), ScriptIoError> {
    write_bytes_atomically(path, normalize_script_text(content).as_bytes())?;
    info!(path = %path.display(), "script saved");
    Ok(())
}

pub fn write_bytes_atomically(path: &Path, bytes: &[u8]) -> Result<(), ScriptIoError> {
    let directory = parent_directory(path);
    if !directory.is_dir() {
        return Err(ScriptIoError::MissingDirectory {
            path: directory.to_path_buf(),
        });
    }

    let mut file =
        NamedTempFile::new_in(directory).map_err(|source| ScriptIoError::from_write(path, source))?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|source| ScriptIoError::from_write(path, source))?;
    file.persist(path)
        .map_err(|error| ScriptIoError::from_write(path, error.error))?;
    Ok(())
}

fn parent_directory(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
