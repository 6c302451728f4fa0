//! Tools for reading a ZIP archive.
//!
//! A [`ZipArchive`] is parsed from a byte slice: the base archive read off disk,
//! or a nested archive decompressed out of its parent.
//! Entries come back in the order the central directory lists them,
//! which is the order the merge walks them in.
//!
//! [`ZipArchive`]: struct.ZipArchive.html

use std::borrow::Cow;
use std::io::{self, Read};

use camino::Utf8Path;
use chrono::NaiveDateTime;
use flate2::read::DeflateDecoder;
use log::*;

use crate::arch::usize;
use crate::checksum::Crc32Reader;
use crate::result::*;
use crate::spec;

/// Smallest possible central directory entry, in bytes
const MIN_CENTRAL_ENTRY_SIZE: usize = 46;

/// How an entry's contents are stored
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stored as-is
    None,
    /// [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE), by far the most common.
    Deflate,
    /// Anything else, by its method code.
    /// Such entries can't be read, but they can be copied through a merge untouched.
    Unsupported(u16),
}

/// A file or directory entry, as the central directory describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata<'a> {
    /// Size in bytes once decompressed
    pub size: usize,

    /// Size in bytes as stored
    pub compressed_size: usize,

    pub compression_method: CompressionMethod,

    /// CRC-32 of the decompressed contents
    pub crc32: u32,

    /// Encrypted entries can be copied but not read.
    pub encrypted: bool,

    /// The entry's name. Directories end in `/`.
    pub path: Cow<'a, Utf8Path>,

    pub last_modified: NaiveDateTime,

    /// Unix permission bits, when the archiver recorded them
    pub unix_mode: Option<u16>,

    /// General purpose bit flags, kept for verbatim copies
    pub(crate) flags: u16,

    /// Where the entry's local header starts
    pub(crate) header_offset: usize,

    pub(crate) stored: StoredFields<'a>,
}

/// Header fields exactly as the archive stores them,
/// so an untouched entry can be copied without being reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredFields<'a> {
    /// The name before decoding (UTF-8 or CP437, per the flags)
    pub name: Cow<'a, [u8]>,
    pub extra_field: Cow<'a, [u8]>,
    pub comment: Cow<'a, [u8]>,
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
}

impl StoredFields<'_> {
    fn into_owned(self) -> StoredFields<'static> {
        StoredFields {
            name: Cow::Owned(self.name.into_owned()),
            extra_field: Cow::Owned(self.extra_field.into_owned()),
            comment: Cow::Owned(self.comment.into_owned()),
            ..self
        }
    }
}

impl FileMetadata<'_> {
    pub fn is_dir(&self) -> bool {
        // Compare strings: Utf8Path::ends_with() matches whole components.
        self.size == 0 && self.path.as_str().ends_with('/')
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    /// The entry's stored name, trailing separator and all.
    pub fn name(&self) -> &str {
        self.path.as_str()
    }

    pub fn into_owned(self) -> FileMetadata<'static> {
        FileMetadata {
            path: Cow::Owned(self.path.into_owned()),
            stored: self.stored.into_owned(),
            ..self
        }
    }
}

/// Where the central directory lives, once prepended bytes are accounted for
#[derive(Debug)]
struct DirectoryLocation {
    /// Bytes of unrelated data in front of the archive
    prefix_len: usize,
    /// Offset of the central directory, relative to the archive's start
    offset: usize,
    entries: u64,
}

/// Finds the central directory from the end record (and Zip64 records, if present).
fn locate_directory(bytes: &[u8]) -> ZipResult<DirectoryLocation> {
    let end_posit = spec::find_eocdr(bytes)?;
    let end = spec::EndOfCentralDirectory::parse(&bytes[end_posit..])?;
    trace!("{:?}", end);

    if end.disk_number != end.disk_with_central_directory
        || end.entries != end.entries_on_this_disk
    {
        return Err(ZipError::UnsupportedArchive(format!(
            "Multi-disk archives aren't supported (disk {} of {}, {} of {} entries)",
            end.disk_number, end.disk_with_central_directory, end.entries_on_this_disk, end.entries
        )));
    }

    // With no entries, the end record may be all there is: no room for a locator.
    let locator = end_posit
        .checked_sub(spec::Zip64EndOfCentralDirectoryLocator::size_in_file())
        .and_then(|posit| {
            spec::Zip64EndOfCentralDirectoryLocator::parse(&bytes[posit..end_posit])
                .map(|locator| (posit, locator))
        });

    match locator {
        Some((locator_posit, locator)) => {
            trace!("{:?}", locator);
            if locator.disks != 1 || locator.disk_with_central_directory != end.disk_number as u32 {
                return Err(ZipError::UnsupportedArchive(format!(
                    "Multi-disk Zip64 archives aren't supported ({} disks)",
                    locator.disks
                )));
            }

            // The Zip64 end record sits somewhere between its stored offset
            // and the locator; how far past the offset is the prefix length.
            let window = bytes
                .get(usize(locator.zip64_eocdr_offset)?..locator_posit)
                .ok_or(ZipError::InvalidArchive(
                    "Zip64 end of central directory offset is out of bounds",
                ))?;
            let prefix_len = spec::find_zip64_eocdr(window)?;
            let zip64_end = spec::Zip64EndOfCentralDirectory::parse(&window[prefix_len..])?;
            trace!("{:?}", zip64_end);
            if zip64_end.disk_number != zip64_end.disk_with_central_directory
                || zip64_end.entries != zip64_end.entries_on_this_disk
            {
                return Err(ZipError::UnsupportedArchive(format!(
                    "Multi-disk Zip64 archives aren't supported (disk {} of {}, {} of {} entries)",
                    zip64_end.disk_number,
                    zip64_end.disk_with_central_directory,
                    zip64_end.entries_on_this_disk,
                    zip64_end.entries
                )));
            }

            Ok(DirectoryLocation {
                prefix_len,
                offset: usize(zip64_end.central_directory_offset)?,
                entries: zip64_end.entries,
            })
        }
        None => {
            // The directory ends where the end record starts,
            // so any difference from its stored offset is the prefix.
            let stored_offset = usize(end.central_directory_offset)?;
            let prefix_len = end_posit
                .checked_sub(usize(end.central_directory_size)?)
                .and_then(|actual| actual.checked_sub(stored_offset))
                .ok_or(ZipError::InvalidArchive(
                    "Central directory size and offset don't fit in the archive",
                ))?;
            Ok(DirectoryLocation {
                prefix_len,
                offset: stored_offset,
                entries: end.entries as u64,
            })
        }
    }
}

/// A ZIP archive to be read
pub struct ZipArchive<'a> {
    /// The archive's bytes, minus any prefix
    mapping: &'a [u8],
    /// Central directory entries, in stored order
    entries: Vec<FileMetadata<'a>>,
}

impl<'a> ZipArchive<'a> {
    /// Reads a ZIP archive from a byte slice.
    ///
    /// ```no_run
    /// # use std::fs;
    /// # use zipset::ZipArchive;
    /// let bytes = fs::read("foo.zip")?;
    /// let archive = ZipArchive::new(&bytes)?;
    /// for entry in archive.entries() {
    ///     println!("{}", entry.path);
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(mapping: &'a [u8]) -> ZipResult<Self> {
        match Self::with_prepended_data(mapping)? {
            (archive, 0) => Ok(archive),
            (_, prefix_len) => Err(ZipError::PrependedWithUnknownBytes(prefix_len)),
        }
    }

    /// Reads a ZIP archive that may have other data in front of it,
    /// like the executable stub of a self-extractor.
    /// Also returns how many bytes were in front.
    pub fn with_prepended_data(mapping: &'a [u8]) -> ZipResult<(Self, usize)> {
        let location = locate_directory(mapping)?;
        trace!("{:?}", location);

        let mapping = &mapping[location.prefix_len..];
        let mut directory = mapping
            .get(location.offset..)
            .ok_or(ZipError::InvalidArchive(
                "Central directory offset is past the end of the archive",
            ))?;

        // The stored count is untrusted; don't let it drive the allocation.
        let capacity = usize(location.entries)?.min(directory.len() / MIN_CENTRAL_ENTRY_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..location.entries {
            let record = spec::CentralDirectoryEntry::parse_and_consume(&mut directory)?;
            trace!("{:?}", record);
            let metadata = FileMetadata::from_cde(&record)?;
            debug!("Found {} ({} bytes)", metadata.path, metadata.size);
            entries.push(metadata);
        }

        Ok((ZipArchive { mapping, entries }, location.prefix_len))
    }

    /// The central directory's entries, in stored order.
    /// Duplicate names are kept as-is.
    pub fn entries(&self) -> &[FileMetadata<'a>] {
        &self.entries
    }

    /// Finds the first entry stored under exactly the given name.
    pub fn by_name(&self, name: &str) -> Option<&FileMetadata<'a>> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Returns the still-compressed payload of the given entry,
    /// after checking its local header against the central directory.
    pub fn raw(&self, metadata: &FileMetadata) -> ZipResult<&'a [u8]> {
        self.raw_with_local_extra(metadata).map(|(_, raw)| raw)
    }

    /// Like [`raw()`](#method.raw), but also returns the local header's extra field,
    /// which needn't match the central directory's.
    pub(crate) fn raw_with_local_extra(
        &self,
        metadata: &FileMetadata,
    ) -> ZipResult<(&'a [u8], &'a [u8])> {
        let mut file_slice = self
            .mapping
            .get(metadata.header_offset..)
            .ok_or(ZipError::InvalidArchive(
                "Local file header offset is past the end of the archive",
            ))?;
        let local_header = spec::LocalFileHeader::parse_and_consume(&mut file_slice)?;
        trace!("{:?}", local_header);
        let local_metadata = FileMetadata::from_local_header(&local_header, metadata)?;
        if cfg!(feature = "check-local-metadata") && !metadata.matches_local(&local_metadata) {
            return Err(ZipError::InvalidArchive(
                "Central directory entry doesn't match local file header",
            ));
        }

        let raw = file_slice
            .get(..metadata.compressed_size)
            .ok_or(ZipError::InvalidArchive(
                "Compressed size runs past the end of the archive",
            ))?;
        Ok((local_header.extra_field, raw))
    }

    /// Opens the given file for reading, decompressing as it goes.
    /// The CRC is checked once the reader hits the end.
    pub fn read(&self, metadata: &FileMetadata) -> ZipResult<Box<dyn io::Read + Send + 'a>> {
        debug!("Reading {}", metadata.path);
        if metadata.encrypted {
            return Err(ZipError::UnsupportedArchive(format!(
                "{} is encrypted",
                metadata.path
            )));
        }
        let raw = self.raw(metadata)?;
        let inner = decompressor(metadata.compression_method, raw)?;
        Ok(Box::new(Crc32Reader::new(inner, metadata.crc32)))
    }

    /// Reads the given file out in full.
    pub fn read_to_vec(&self, metadata: &FileMetadata) -> ZipResult<Vec<u8>> {
        let mut contents = Vec::with_capacity(metadata.size);
        self.read(metadata)?.read_to_end(&mut contents)?;
        Ok(contents)
    }
}

fn decompressor<'a>(
    method: CompressionMethod,
    raw: &'a [u8],
) -> ZipResult<Box<dyn io::Read + Send + 'a>> {
    match method {
        CompressionMethod::None => Ok(Box::new(raw)),
        CompressionMethod::Deflate => Ok(Box::new(DeflateDecoder::new(raw))),
        CompressionMethod::Unsupported(code) => Err(ZipError::UnsupportedArchive(format!(
            "Compression method {code} not supported"
        ))),
    }
}
