//! Materializing a [`ZipSet`]: one pass over the base archive, then the rest.
//!
//! For each base entry, in stored order:
//!
//! - no overlay value: the entry is copied verbatim, still compressed;
//! - a nested set with no base of its own: the entry is opened as an archive
//!   and merged with the set, recursively;
//! - a tombstone: the entry is dropped;
//! - anything else: the overlay value is written in its place.
//!
//! Overlay values no base entry claimed are then written in name order.
//!
//! The output is written as it's produced, and only the top-level call
//! finishes the output archive. Nested archives finish themselves into
//! their parent's entry, leaving the parent open.
//!
//! [`ZipSet`]: ../set/struct.ZipSet.html

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::*;
use memmap2::Mmap;
use walkdir::WalkDir;

use crate::naming::*;
use crate::read::ZipArchive;
use crate::result::*;
use crate::set::{Base, Resource, ZipSet};
use crate::write::{WriteOptions, ZipWriter};

/// Every level of nesting writes through the same (type-erased) writer type,
/// so recursion doesn't mean unbounded monomorphization.
type Sink<'a> = ZipWriter<&'a mut dyn Write>;

impl ZipSet {
    /// Writes the archive to `out`, which is returned (flushed, not closed).
    ///
    /// The set itself is untouched, so building again gives the same entries.
    /// If building fails, whatever was written to `out` is garbage;
    /// build somewhere temporary if that matters.
    pub fn build<W: Write>(&self, out: W) -> ZipResult<W> {
        self.build_with(out, &WriteOptions::default())
    }

    /// Like [`build()`](#method.build), with control over how new entries are stored.
    pub fn build_with<W: Write>(&self, mut out: W, options: &WriteOptions) -> ZipResult<W> {
        info!(
            "Building archive from {} top-level changes{}",
            self.len(),
            match &self.base {
                Some(Base::File(p)) => format!(" to {}", p.display()),
                Some(Base::Bytes(b)) => format!(" to a {} byte archive", b.len()),
                None | Some(Base::Empty) => String::new(),
            }
        );
        let mut zip: Sink = ZipWriter::with_options(&mut out as &mut dyn Write, options.clone());
        self.build_into(&mut zip, options)?;
        zip.finish()?;
        Ok(out)
    }

    /// Builds the archive into memory.
    pub fn build_to_vec(&self) -> ZipResult<Vec<u8>> {
        self.build(Vec::new())
    }

    /// Builds the archive into a file, creating or truncating it.
    ///
    /// The file is truncated before the base archive is read,
    /// so it can't be the base archive itself.
    pub fn build_to_path<P: AsRef<Path>>(&self, path: P) -> ZipResult<()> {
        let file = File::create(path.as_ref())?;
        let mut out = BufWriter::new(file);
        self.build(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Merges the set against its own base (if any) into `zip`.
    fn build_into(&self, zip: &mut Sink, options: &WriteOptions) -> ZipResult<()> {
        match &self.base {
            None | Some(Base::Empty) => self.merge(None, zip, options),
            Some(Base::File(path)) => {
                debug!("Reading base archive {}", path.display());
                let file = File::open(path)?;
                // The base must not change underneath us while we build.
                let mapping = unsafe { Mmap::map(&file)? };
                let archive = open_base(&mapping)?;
                self.merge(Some(&archive), zip, options)
            }
            Some(Base::Bytes(bytes)) => {
                let archive = open_base(bytes)?;
                self.merge(Some(&archive), zip, options)
            }
        }
    }

    fn merge(
        &self,
        base: Option<&ZipArchive>,
        zip: &mut Sink,
        options: &WriteOptions,
    ) -> ZipResult<()> {
        let mut consumed: BTreeSet<&str> = BTreeSet::new();

        for entry in base.map(|b| b.entries()).unwrap_or_default() {
            let name = entry.name();
            let (key, resource) = match self.entries.get_key_value(name) {
                Some(kv) => kv,
                None => {
                    debug!("Copying {name}");
                    zip.copy_raw(base_archive(base)?, entry)?;
                    continue;
                }
            };
            if !consumed.insert(key.as_str()) {
                warn!("Dropping duplicate base entry {name}, since it was already replaced");
                continue;
            }

            match resource {
                Resource::Nested(child) if child.base.is_none() && entry.is_file() => {
                    debug!("Merging changes into nested archive {name}");
                    let nested_bytes = base_archive(base)?.read_to_vec(entry)?;
                    let nested = open_base(&nested_bytes)?;
                    write_nested(zip, name, child, Some(&nested), options)?;
                }
                Resource::Tombstone => debug!("Excluding {name}"),
                other => {
                    debug!("Overwriting {name}");
                    write_resource(zip, key, other, options)?;
                }
            }
        }

        for (name, resource) in &self.entries {
            if consumed.contains(name.as_str()) {
                continue;
            }
            debug!("Adding {name}");
            write_resource(zip, name, resource, options)?;
        }
        Ok(())
    }
}

/// `merge()` only iterates entries when it has a base, so this never fails in practice.
fn base_archive<'b, 'a>(base: Option<&'b ZipArchive<'a>>) -> ZipResult<&'b ZipArchive<'a>> {
    base.ok_or(ZipError::InvalidArchive("Entry without a base archive"))
}

/// Parses a base archive, tolerating (and skipping) prepended data
/// like a self-extractor stub.
fn open_base(bytes: &[u8]) -> ZipResult<ZipArchive<'_>> {
    let (archive, offset) = ZipArchive::with_prepended_data(bytes)?;
    if offset != 0 {
        info!("Skipping {offset} bytes prepended to base archive");
    }
    Ok(archive)
}

/// Writes a single overlay value under `name`.
fn write_resource(
    zip: &mut Sink,
    name: &str,
    resource: &Resource,
    options: &WriteOptions,
) -> ZipResult<()> {
    match resource {
        Resource::Bytes(contents) => {
            if is_directory_name(name) {
                if !contents.is_empty() {
                    warn!("Ignoring {} bytes given for directory {name}", contents.len());
                }
                zip.add_directory(&directory_entry_name(name))
            } else {
                zip.add_file(file_entry_name(name), contents)
            }
        }
        Resource::External(path) => write_external(zip, name, path),
        Resource::Nested(child) => write_nested(zip, file_entry_name(name), child, None, options),
        Resource::Tombstone => {
            trace!("Nothing to exclude at {name}");
            Ok(())
        }
    }
}

/// Writes `child` as an archive inside the entry `name`,
/// merged with `base` if given, or else with the child's own base.
fn write_nested(
    zip: &mut Sink,
    name: &str,
    child: &ZipSet,
    base: Option<&ZipArchive>,
    options: &WriteOptions,
) -> ZipResult<()> {
    let mut entry = zip.start_file(name)?;
    {
        let mut nested: Sink = ZipWriter::with_options(&mut entry as &mut dyn Write, options.clone());
        match base {
            Some(archive) => child.merge(Some(archive), &mut nested, options)?,
            None => child.build_into(&mut nested, options)?,
        }
        nested.finish()?;
    }
    entry.finish()
}

/// Writes a file, or a directory and everything under it, from disk.
fn write_external(zip: &mut Sink, name: &str, root: &Path) -> ZipResult<()> {
    let walk = WalkDir::new(root).follow_links(true).sort_by_file_name();
    for dir_entry in walk {
        let dir_entry = dir_entry.map_err(io::Error::from)?;
        let relative = dir_entry.path().strip_prefix(root).map_err(|_| {
            ZipError::InvalidPath(format!(
                "{} isn't under {}",
                dir_entry.path().display(),
                root.display()
            ))
        })?;
        let entry_name = if dir_entry.depth() == 0 {
            name.to_owned()
        } else {
            child_entry_name(name, &filesystem_entry_name(relative)?)
        };

        if dir_entry.file_type().is_dir() {
            zip.add_directory(&directory_entry_name(&entry_name))?;
        } else {
            trace!("Reading {}", dir_entry.path().display());
            let mut file = File::open(dir_entry.path())?;
            let mut writer = zip.start_file(file_entry_name(&entry_name))?;
            io::copy(&mut file, &mut writer)?;
            writer.finish()?;
        }
    }
    Ok(())
}
