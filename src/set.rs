//! The overlay: a lazy set of changes to a ZIP archive.
//!
//! A [`ZipSet`] maps entry names to [`Resource`]s and optionally points at
//! a base archive. Mutating it does no I/O at all; files on disk are only
//! referenced, and nothing is read until [`ZipSet::build()`] merges
//! everything in one pass.
//!
//! ```no_run
//! # use zipset::ZipSet;
//! let mut zip = ZipSet::with_base("source.zip");
//! zip.add_bytes("test.txt", "1234")?
//!     .add_path("test.png", "images/test.png")?
//!     .add_path("inner.zip!/123.txt", "123.txt")?
//!     .remove("delete.txt")?
//!     .remove("inner.zip!/example.txt")?;
//! zip.build_to_path("output.zip")?;
//! # Ok::<(), zipset::result::ZipError>(())
//! ```
//!
//! Mutation takes `&mut self` and building takes `&self`, so a build can't
//! race with changes to the same set. Concurrent builds of one set are fine,
//! provided nobody changes the files it references in the meantime.
//!
//! [`ZipSet`]: struct.ZipSet.html
//! [`Resource`]: enum.Resource.html
//! [`ZipSet::build()`]: struct.ZipSet.html#method.build

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::*;

use crate::path::{EntryPath, IntoEntryPath};
use crate::result::*;

/// The archive a [`ZipSet`] is merged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// A ZIP archive on disk, read when the set is built.
    File(PathBuf),
    /// A ZIP archive already in memory.
    Bytes(Vec<u8>),
    /// Nothing at all. A set with this base replaces a same-named archive
    /// in its parent instead of merging with it.
    Empty,
}

/// What an entry name maps to in a [`ZipSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Literal contents. Under a name ending in `/`, an empty directory.
    Bytes(Vec<u8>),
    /// A file or directory on disk, read at build time.
    /// Directories are added recursively.
    External(PathBuf),
    /// Changes to an archive nested inside this one.
    Nested(ZipSet),
    /// Leave this name out, even if the base archive has it.
    Tombstone,
}

/// A lazy set of ZIP entries.
///
/// See the [module documentation](index.html) for an overview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipSet {
    pub(crate) entries: BTreeMap<String, Resource>,
    pub(crate) base: Option<Base>,
}

impl ZipSet {
    /// An empty set, built from nothing but what's added to it.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty set of changes to the ZIP archive at `zip`.
    pub fn with_base<P: Into<PathBuf>>(zip: P) -> Self {
        Self {
            entries: BTreeMap::new(),
            base: Some(Base::File(zip.into())),
        }
    }

    /// An empty set of changes to a ZIP archive held in memory.
    pub fn with_base_bytes<B: Into<Vec<u8>>>(zip: B) -> Self {
        Self {
            entries: BTreeMap::new(),
            base: Some(Base::Bytes(zip.into())),
        }
    }

    pub fn base(&self) -> Option<&Base> {
        self.base.as_ref()
    }

    /// Puts `resource` at `path`, replacing whatever was there.
    ///
    /// Intermediate segments of a nested path become nested sets.
    /// If one already held something else, that becomes the nested set's base:
    /// a file on disk or literal bytes are taken to be the nested archive,
    /// and a tombstone becomes an explicitly empty archive.
    pub fn insert<P: IntoEntryPath>(&mut self, path: P, resource: Resource) -> ZipResult<&mut Self> {
        let path = path.into_entry_path()?;
        trace!("Inserting {path}");
        self.insert_at(path, resource);
        Ok(self)
    }

    fn insert_at(&mut self, path: EntryPath, resource: Resource) {
        let (head, tail) = path.into_head_and_tail();
        let tail = match tail {
            Some(t) => t,
            None => {
                self.entries.insert(head, resource);
                return;
            }
        };

        let mut nested = match self.entries.remove(&head) {
            None => ZipSet::new(),
            Some(Resource::Nested(set)) => set,
            Some(Resource::External(zip)) => ZipSet::with_base(zip),
            Some(Resource::Bytes(zip)) => ZipSet::with_base_bytes(zip),
            Some(Resource::Tombstone) => ZipSet {
                entries: BTreeMap::new(),
                base: Some(Base::Empty),
            },
        };
        nested.insert_at(tail, resource);
        self.entries.insert(head, Resource::Nested(nested));
    }

    /// Adds literal contents at `path`.
    pub fn add_bytes<P: IntoEntryPath, B: Into<Vec<u8>>>(
        &mut self,
        path: P,
        contents: B,
    ) -> ZipResult<&mut Self> {
        self.insert(path, Resource::Bytes(contents.into()))
    }

    /// Adds the file or directory `file` at `path`.
    /// It isn't read (or even checked for) until the set is built.
    pub fn add_path<P: IntoEntryPath, F: Into<PathBuf>>(
        &mut self,
        path: P,
        file: F,
    ) -> ZipResult<&mut Self> {
        self.insert(path, Resource::External(file.into()))
    }

    /// Adds a whole nested archive at `path`.
    pub fn add_set<P: IntoEntryPath>(&mut self, path: P, zip: ZipSet) -> ZipResult<&mut Self> {
        self.insert(path, Resource::Nested(zip))
    }

    /// Adds an empty directory. A trailing `/` is added if `path` lacks one.
    pub fn add_directory<P: IntoEntryPath>(&mut self, path: P) -> ZipResult<&mut Self> {
        let path = path.into_entry_path()?.into_directory();
        self.insert(path, Resource::Bytes(Vec::new()))
    }

    /// Leaves `path` out of the built archive.
    pub fn remove<P: IntoEntryPath>(&mut self, path: P) -> ZipResult<&mut Self> {
        self.insert(path, Resource::Tombstone)
    }

    /// Looks up what's been put at `path`, descending into nested sets.
    pub fn get<P: IntoEntryPath>(&self, path: P) -> ZipResult<Option<&Resource>> {
        let path = path.into_entry_path()?;
        let mut current = self;
        let mut segments = path.segments().iter().peekable();
        while let Some(segment) = segments.next() {
            let found = current.entries.get(segment);
            if segments.peek().is_none() {
                return Ok(found);
            }
            match found {
                Some(Resource::Nested(set)) => current = set,
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// The number of names with a resource at this level (nested sets count once).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The names with a resource at this level, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
