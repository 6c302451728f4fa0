//! Addresses for entries that may live inside nested archives.
//!
//! `inner.zip!sub.zip!file.txt` names `file.txt`, inside `sub.zip`,
//! inside `inner.zip`, inside whatever archive the path is applied to.
//! Each `!`-separated segment may start with a `/`, which is dropped,
//! so `inner.zip!/file.txt` works too.

use std::fmt;
use std::str::FromStr;

use crate::result::*;

/// Separates nesting levels in a textual [`EntryPath`].
pub const NESTING_DELIMITER: char = '!';

/// A non-empty sequence of entry names, one per nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath {
    segments: Vec<String>,
}

impl EntryPath {
    /// Parses `segment1!segment2!...`.
    ///
    /// ```
    /// # use zipset::EntryPath;
    /// let path = EntryPath::parse("inner.zip!/docs/readme.txt")?;
    /// assert_eq!(path.head(), "inner.zip");
    /// assert_eq!(path.tail().unwrap().head(), "docs/readme.txt");
    /// # Ok::<(), zipset::result::ZipError>(())
    /// ```
    pub fn parse(text: &str) -> ZipResult<Self> {
        Self::from_segments(text.split(NESTING_DELIMITER))
    }

    /// Builds a path from explicit segments, stripping a leading `/` from each.
    /// No segment may be empty, and there must be at least one.
    pub fn from_segments<I, S>(segments: I) -> ZipResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|s| {
                let s = s.as_ref();
                let trimmed = s.strip_prefix('/').unwrap_or(s);
                if trimmed.is_empty() {
                    Err(ZipError::InvalidPath(format!(
                        "Entry path segment {s:?} is empty"
                    )))
                } else {
                    Ok(trimmed.to_owned())
                }
            })
            .collect::<ZipResult<Vec<_>>>()?;

        if segments.is_empty() {
            return Err(ZipError::InvalidPath(String::from(
                "An entry path needs at least one segment",
            )));
        }
        Ok(Self { segments })
    }

    /// The outermost segment: the entry's name in the archive
    /// the path is applied to.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// True if the path reaches into a nested archive.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// The path relative to the archive named by [`head()`](#method.head),
    /// or `None` if the path isn't nested.
    pub fn tail(&self) -> Option<EntryPath> {
        self.is_nested().then(|| EntryPath {
            segments: self.segments[1..].to_vec(),
        })
    }

    /// Splits off the head, consuming the path.
    pub(crate) fn into_head_and_tail(mut self) -> (String, Option<EntryPath>) {
        let head = self.segments.remove(0);
        let tail = (!self.segments.is_empty()).then_some(self);
        (head, tail)
    }

    /// The same path, with its innermost segment marked as a directory.
    pub(crate) fn into_directory(mut self) -> Self {
        if let Some(leaf) = self.segments.last_mut() {
            if !leaf.ends_with('/') {
                leaf.push('/');
            }
        }
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{NESTING_DELIMITER}")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for EntryPath {
    type Err = ZipError;

    fn from_str(s: &str) -> ZipResult<Self> {
        Self::parse(s)
    }
}

/// Anything [`ZipSet`](../set/struct.ZipSet.html) methods accept as an address.
pub trait IntoEntryPath {
    fn into_entry_path(self) -> ZipResult<EntryPath>;
}

impl IntoEntryPath for EntryPath {
    fn into_entry_path(self) -> ZipResult<EntryPath> {
        Ok(self)
    }
}

impl IntoEntryPath for &EntryPath {
    fn into_entry_path(self) -> ZipResult<EntryPath> {
        Ok(self.clone())
    }
}

impl IntoEntryPath for &str {
    fn into_entry_path(self) -> ZipResult<EntryPath> {
        EntryPath::parse(self)
    }
}

impl IntoEntryPath for String {
    fn into_entry_path(self) -> ZipResult<EntryPath> {
        EntryPath::parse(&self)
    }
}

impl IntoEntryPath for &String {
    fn into_entry_path(self) -> ZipResult<EntryPath> {
        EntryPath::parse(self)
    }
}
