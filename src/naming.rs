//! Entry naming rules.
//!
//! A name ending in `/` is a directory and gets exactly one trailing `/`.
//! Anything else is a file, and never gets one, even if the overlay key
//! it came from had one (e.g., a nested archive added as `inner.zip/`).

use std::path::Path;

use camino::{Utf8Component, Utf8Path};

use crate::result::*;

pub const SEPARATOR: char = '/';

/// True if the name denotes a directory entry.
pub fn is_directory_name(name: &str) -> bool {
    name.ends_with(SEPARATOR)
}

/// The stored name of a directory entry: exactly one trailing separator.
pub fn directory_entry_name(name: &str) -> String {
    format!("{}{SEPARATOR}", name.trim_end_matches(SEPARATOR))
}

/// The stored name of a file entry: no trailing separator.
pub fn file_entry_name(name: &str) -> &str {
    name.trim_end_matches(SEPARATOR)
}

/// The name of `child` inside the directory entry `parent`.
pub fn child_entry_name(parent: &str, child: &str) -> String {
    format!("{}{SEPARATOR}{child}", parent.trim_end_matches(SEPARATOR))
}

/// The `/`-joined entry name for a file's name as the filesystem reports it.
///
/// Entry names are UTF-8, so other file names can't be stored.
pub fn filesystem_entry_name(name: &Path) -> ZipResult<String> {
    let utf8 = Utf8Path::from_path(name).ok_or_else(|| {
        ZipError::InvalidPath(format!("{} isn't valid UTF-8", name.display()))
    })?;
    let mut joined = String::new();
    for component in utf8.components() {
        if let Utf8Component::Normal(part) = component {
            if !joined.is_empty() {
                joined.push(SEPARATOR);
            }
            joined.push_str(part);
        }
    }
    Ok(joined)
}
