pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod idx;
pub mod logger;
pub mod record;

pub use error::{Error, Result};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Sibling of `path` that a file is written to before being renamed into place.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
