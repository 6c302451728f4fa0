//! ZIP record layouts, as laid out in PKWARE's APPNOTE.
//!
//! The record layouts live here, both directions:
//! parsing them out of an archive for the [`read`] module,
//! and serializing them for the [`write`] module.
//!
//! Section numbers in comments refer to [`APPNOTE.TXT`].
//!
//! [`read`]: ../read/index.html
//! [`write`]: ../write/index.html
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::borrow::Cow;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use codepage_437::*;
use memchr::memmem;

use crate::arch::usize;
use crate::read::{CompressionMethod, FileMetadata, StoredFields};
use crate::result::*;

// Record signatures

const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
const ZIP64_EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 6, 6];
const ZIP64_EOCDR_LOCATOR_MAGIC: [u8; 4] = [b'P', b'K', 6, 7];
const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];
const DATA_DESCRIPTOR_MAGIC: [u8; 4] = [b'P', b'K', 7, 8];

/// End of central directory record size, less its comment
const EOCDR_FIXED_SIZE: usize = 22;

/// Bit 0 of the general purpose flags: the file is encrypted
pub const FLAG_ENCRYPTED: u16 = 1;
/// Bit 3: CRC and sizes follow the data in a data descriptor (4.3.9)
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Bit 11: name and comment are UTF-8 rather than CP437
pub const FLAG_UTF8: u16 = 1 << 11;

/// "Version made by": Unix (3) in the upper byte, spec version 2.0 in the lower.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;
/// Version 2.0 covers DEFLATE and directories, everything we write.
pub const VERSION_NEEDED: u16 = 20;

/// MS-DOS directory attribute, in the low byte of the external attributes
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

impl CompressionMethod {
    fn from_u16(u: u16) -> Self {
        match u {
            0 => CompressionMethod::None,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Unsupported(v),
        }
    }

    pub(crate) fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

/// Whose conventions an entry's external attributes follow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum System {
    Dos,
    Unix,
    Unknown,
}

impl System {
    fn from_source_version(source_version: u16) -> Self {
        // 4.4.2: the upper byte of "version made by" says whose attributes
        // sit in the external attributes field.
        match source_version >> 8 {
            0 => System::Dos,
            3 => System::Unix,
            _ => System::Unknown,
        }
    }
}

/// Splits `n` bytes off the front of the provided slice.
fn take<'a>(input: &mut &'a [u8], n: usize) -> ZipResult<&'a [u8]> {
    if input.len() < n {
        return Err(ZipError::InvalidArchive("Record truncated"));
    }
    let (front, rest) = input.split_at(n);
    *input = rest;
    Ok(front)
}

/// Consumes a little-endian u64.
fn read_u64(input: &mut &[u8]) -> ZipResult<u64> {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(take(input, 8)?);
    Ok(u64::from_le_bytes(bytes))
}

/// Consumes a little-endian u32.
fn read_u32(input: &mut &[u8]) -> ZipResult<u32> {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(take(input, 4)?);
    Ok(u32::from_le_bytes(bytes))
}

/// Consumes a little-endian u16.
fn read_u16(input: &mut &[u8]) -> ZipResult<u16> {
    let mut bytes = [0; 2];
    bytes.copy_from_slice(take(input, 2)?);
    Ok(u16::from_le_bytes(bytes))
}

/// Checks for (and consumes) a record's magic number.
fn expect_magic(input: &mut &[u8], magic: [u8; 4], what: &'static str) -> ZipResult<()> {
    if take(input, 4)? != magic {
        return Err(ZipError::InvalidArchive(what));
    }
    Ok(())
}

/// Little-endian field serialization, the mirror of the `read_*` functions.
trait PutLe {
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
}

impl PutLe for Vec<u8> {
    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }
}

/// Data from the End of central directory record (4.3.16)
///
/// The last record in an archive. Points at the central directory,
/// and carries disk numbers nobody has needed since floppies.
#[derive(Debug)]
pub struct EndOfCentralDirectory<'a> {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub file_comment: &'a [u8],
}

impl<'a> EndOfCentralDirectory<'a> {
    pub fn parse(mut eocdr: &'a [u8]) -> ZipResult<Self> {
        expect_magic(
            &mut eocdr,
            EOCDR_MAGIC,
            "Invalid End Of Central Directory Record",
        )?;
        let disk_number = read_u16(&mut eocdr)?;
        let disk_with_central_directory = read_u16(&mut eocdr)?;
        let entries_on_this_disk = read_u16(&mut eocdr)?;
        let entries = read_u16(&mut eocdr)?;
        let central_directory_size = read_u32(&mut eocdr)?;
        let central_directory_offset = read_u32(&mut eocdr)?;
        let comment_length = usize(read_u16(&mut eocdr)?)?;
        let file_comment = take(&mut eocdr, comment_length)?;

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment,
        })
    }

    /// A single-disk record for an archive we wrote ourselves.
    pub fn new(entries: u16, central_directory_size: u32, central_directory_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_central_directory: 0,
            entries_on_this_disk: entries,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment: &[],
        }
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> ZipResult<()> {
        let mut record = Vec::with_capacity(EOCDR_FIXED_SIZE + self.file_comment.len());
        record.extend_from_slice(&EOCDR_MAGIC);
        record.put_u16(self.disk_number);
        record.put_u16(self.disk_with_central_directory);
        record.put_u16(self.entries_on_this_disk);
        record.put_u16(self.entries);
        record.put_u32(self.central_directory_size);
        record.put_u32(self.central_directory_offset);
        record.put_u16(crate::arch::u16_field(
            self.file_comment.len(),
            "Archive comment",
        )?);
        record.extend_from_slice(self.file_comment);
        out.write_all(&record)?;
        Ok(())
    }
}

/// Position of the end of central directory record in `mapping`.
///
/// A trailing comment of unknown length means it has to be searched for,
/// and the comment may itself contain the signature. Searching back from
/// the end, the first candidate whose comment runs exactly to the end wins.
/// Failing that, the last candidate that fits is taken, so archives with
/// trailing junk still open.
pub fn find_eocdr(mapping: &[u8]) -> ZipResult<usize> {
    let mut fallback = None;
    for posit in memmem::rfind_iter(mapping, &EOCDR_MAGIC) {
        let comment_length = match mapping.get(posit + 20..posit + EOCDR_FIXED_SIZE) {
            Some(field) => u16::from_le_bytes([field[0], field[1]]) as usize,
            None => continue,
        };
        if posit + EOCDR_FIXED_SIZE + comment_length == mapping.len() {
            return Ok(posit);
        }
        fallback.get_or_insert(posit);
    }
    fallback.ok_or(ZipError::InvalidArchive(
        "No end of central directory record",
    ))
}

/// Data from the Zip64 end of central directory locator (4.3.15)
///
/// Sits right in front of the end record in Zip64 archives,
/// pointing back at the Zip64 end record.
#[derive(Debug)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_central_directory: u32,
    pub zip64_eocdr_offset: u64,
    pub disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    /// Returns `None` if the slice doesn't start with a locator,
    /// which is the case for every non-Zip64 archive.
    pub fn parse(mut mapping: &[u8]) -> Option<Self> {
        if !mapping.starts_with(&ZIP64_EOCDR_LOCATOR_MAGIC) {
            return None;
        }
        mapping = &mapping[4..];
        let disk_with_central_directory = read_u32(&mut mapping).ok()?;
        let zip64_eocdr_offset = read_u64(&mut mapping).ok()?;
        let disks = read_u32(&mut mapping).ok()?;

        Some(Self {
            disk_with_central_directory,
            zip64_eocdr_offset,
            disks,
        })
    }

    pub fn size_in_file() -> usize {
        20
    }
}

/// Data from the Zip64 end of central directory record (4.3.14)
///
/// Only what locating the central directory needs is kept;
/// version numbers and extensible data are skipped.
#[derive(Debug)]
pub struct Zip64EndOfCentralDirectory {
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub entries_on_this_disk: u64,
    pub entries: u64,
    pub central_directory_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub fn parse(mut eocdr: &[u8]) -> ZipResult<Self> {
        expect_magic(
            &mut eocdr,
            ZIP64_EOCDR_MAGIC,
            "Invalid Zip64 End Of Central Directory Record",
        )?;
        let eocdr_size = usize(read_u64(&mut eocdr)?)?;
        // Version made by, version needed to extract
        take(&mut eocdr, 4)?;
        let disk_number = read_u32(&mut eocdr)?;
        let disk_with_central_directory = read_u32(&mut eocdr)?;
        let entries_on_this_disk = read_u64(&mut eocdr)?;
        let entries = read_u64(&mut eocdr)?;
        // Central directory size; the offset and count are enough to walk it.
        read_u64(&mut eocdr)?;
        let central_directory_offset = read_u64(&mut eocdr)?;

        // 4.3.14.1: the stored size excludes the leading 12 bytes
        // (magic and the size field itself).
        let extensible_data_length = eocdr_size
            .checked_add(12)
            .and_then(|total| total.checked_sub(Self::fixed_size_in_file()))
            .ok_or(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ))?;
        if eocdr.len() != extensible_data_length {
            return Err(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ));
        }

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_offset,
        })
    }

    fn fixed_size_in_file() -> usize {
        56
    }
}

/// Position of the Zip64 end record in a slice starting at its stored offset.
/// Anything in front of the archive pushes it further in.
pub fn find_zip64_eocdr(mapping: &[u8]) -> ZipResult<usize> {
    memmem::find(mapping, &ZIP64_EOCDR_MAGIC).ok_or(ZipError::InvalidArchive(
        "No Zip64 end of central directory record",
    ))
}

/// Data from a central directory entry (4.3.12)
///
/// One per entry, in the directory at the back of the archive.
#[derive(Debug)]
pub struct CentralDirectoryEntry<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
    pub file_comment: &'a [u8],
}

impl<'a> CentralDirectoryEntry<'a> {
    pub fn parse_and_consume(entry: &mut &'a [u8]) -> ZipResult<Self> {
        expect_magic(
            entry,
            CENTRAL_DIRECTORY_MAGIC,
            "Invalid central directory entry",
        )?;
        let source_version = read_u16(entry)?;
        let minimum_extract_version = read_u16(entry)?;
        let flags = read_u16(entry)?;
        let compression_method = read_u16(entry)?;
        let last_modified_time = read_u16(entry)?;
        let last_modified_date = read_u16(entry)?;
        let crc32 = read_u32(entry)?;
        let compressed_size = read_u32(entry)?;
        let uncompressed_size = read_u32(entry)?;
        let path_length = usize(read_u16(entry)?)?;
        let extra_field_length = usize(read_u16(entry)?)?;
        let file_comment_length = usize(read_u16(entry)?)?;
        let disk_number = read_u16(entry)?;
        let internal_file_attributes = read_u16(entry)?;
        let external_file_attributes = read_u32(entry)?;
        let header_offset = read_u32(entry)?;
        let path = take(entry, path_length)?;
        let extra_field = take(entry, extra_field_length)?;
        let file_comment = take(entry, file_comment_length)?;

        Ok(Self {
            source_version,
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number,
            internal_file_attributes,
            external_file_attributes,
            header_offset,
            path,
            extra_field,
            file_comment,
        })
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> ZipResult<()> {
        let mut record = Vec::with_capacity(46 + self.path.len());
        record.extend_from_slice(&CENTRAL_DIRECTORY_MAGIC);
        record.put_u16(self.source_version);
        record.put_u16(self.minimum_extract_version);
        record.put_u16(self.flags);
        record.put_u16(self.compression_method);
        record.put_u16(self.last_modified_time);
        record.put_u16(self.last_modified_date);
        record.put_u32(self.crc32);
        record.put_u32(self.compressed_size);
        record.put_u32(self.uncompressed_size);
        record.put_u16(crate::arch::u16_field(self.path.len(), "Entry name")?);
        record.put_u16(crate::arch::u16_field(
            self.extra_field.len(),
            "Extra field",
        )?);
        record.put_u16(crate::arch::u16_field(
            self.file_comment.len(),
            "Entry comment",
        )?);
        record.put_u16(self.disk_number);
        record.put_u16(self.internal_file_attributes);
        record.put_u32(self.external_file_attributes);
        record.put_u32(self.header_offset);
        record.extend_from_slice(self.path);
        record.extend_from_slice(self.extra_field);
        record.extend_from_slice(self.file_comment);
        out.write_all(&record)?;
        Ok(())
    }
}

/// Names are UTF-8 with bit 11 set, CP437 otherwise.
fn is_utf8(flags: u16) -> bool {
    flags & FLAG_UTF8 != 0
}

fn is_encrypted(flags: u16) -> bool {
    flags & FLAG_ENCRYPTED != 0
}

/// Decodes an entry name per the flags' encoding bit.
fn decode_path(raw: &[u8], flags: u16) -> ZipResult<Cow<'_, Utf8Path>> {
    if is_utf8(flags) {
        let utf8 = std::str::from_utf8(raw).map_err(ZipError::Encoding)?;
        return Ok(Cow::Borrowed(Utf8Path::new(utf8)));
    }
    let str_cow: Cow<str> = Cow::borrow_from_cp437(raw, &CP437_CONTROL);
    Ok(match str_cow {
        Cow::Borrowed(s) => Cow::Borrowed(Utf8Path::new(s)),
        Cow::Owned(s) => Cow::Owned(Utf8PathBuf::from(s)),
    })
}

impl<'a> FileMetadata<'a> {
    /// Metadata as the central directory records it
    pub(crate) fn from_cde(cde: &CentralDirectoryEntry<'a>) -> ZipResult<Self> {
        let path = decode_path(cde.path, cde.flags)?;

        if cde.disk_number != 0 {
            return Err(ZipError::UnsupportedArchive(format!(
                "No support for multi-disk archives: file {} claims to be on disk {}",
                path, cde.disk_number,
            )));
        }

        let unix_mode = match System::from_source_version(cde.source_version) {
            System::Unix => Some((cde.external_file_attributes >> 16) as u16),
            System::Dos | System::Unknown => None,
        };

        let mut metadata = Self {
            size: usize(cde.uncompressed_size)?,
            compressed_size: usize(cde.compressed_size)?,
            compression_method: CompressionMethod::from_u16(cde.compression_method),
            crc32: cde.crc32,
            encrypted: is_encrypted(cde.flags),
            path,
            last_modified: parse_msdos(cde.last_modified_time, cde.last_modified_date),
            unix_mode,
            flags: cde.flags,
            header_offset: usize(cde.header_offset)?,
            stored: StoredFields {
                name: Cow::Borrowed(cde.path),
                extra_field: Cow::Borrowed(cde.extra_field),
                comment: Cow::Borrowed(cde.file_comment),
                source_version: cde.source_version,
                minimum_extract_version: cde.minimum_extract_version,
                last_modified_time: cde.last_modified_time,
                last_modified_date: cde.last_modified_date,
                internal_file_attributes: cde.internal_file_attributes,
                external_file_attributes: cde.external_file_attributes,
            },
        };

        parse_extra_field(&mut metadata, cde.extra_field)?;

        Ok(metadata)
    }

    /// Metadata as the local header records it.
    ///
    /// The local header carries neither the offset (we're at it already)
    /// nor the mode bits, so those come from the central directory's copy.
    pub(crate) fn from_local_header(
        local: &LocalFileHeader<'a>,
        central: &FileMetadata,
    ) -> ZipResult<Self> {
        let mut metadata = Self {
            size: usize(local.uncompressed_size)?,
            compressed_size: usize(local.compressed_size)?,
            compression_method: CompressionMethod::from_u16(local.compression_method),
            crc32: local.crc32,
            encrypted: is_encrypted(local.flags),
            path: decode_path(local.path, local.flags)?,
            last_modified: parse_msdos(local.last_modified_time, local.last_modified_date),
            unix_mode: central.unix_mode,
            flags: local.flags,
            header_offset: central.header_offset,
            stored: StoredFields {
                name: Cow::Borrowed(local.path),
                extra_field: Cow::Borrowed(local.extra_field),
                comment: Cow::Borrowed(&[][..]),
                source_version: central.stored.source_version,
                minimum_extract_version: local.minimum_extract_version,
                last_modified_time: local.last_modified_time,
                last_modified_date: local.last_modified_date,
                internal_file_attributes: central.stored.internal_file_attributes,
                external_file_attributes: central.stored.external_file_attributes,
            },
        };

        parse_extra_field(&mut metadata, local.extra_field)?;

        Ok(metadata)
    }

    /// Compares a central directory entry against its local header.
    ///
    /// When bit 3 is set, the local header's CRC and sizes are zero
    /// and the real ones trail the data, so those aren't compared.
    pub(crate) fn matches_local(&self, local: &FileMetadata) -> bool {
        let basics = self.path == local.path
            && self.compression_method == local.compression_method
            && self.encrypted == local.encrypted;
        if local.flags & FLAG_DATA_DESCRIPTOR != 0 {
            basics
        } else {
            basics
                && self.crc32 == local.crc32
                && self.size == local.size
                && self.compressed_size == local.compressed_size
        }
    }
}

/// The earliest time MS-DOS timestamps can express
pub fn msdos_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts an MS-DOS (time, date) pair. Garbage fields
/// (zeroed dates are common) map to [`msdos_epoch()`].
fn parse_msdos(time: u16, date: u16) -> NaiveDateTime {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // Years count from 1980.
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds.min(59)))
        .unwrap_or_else(msdos_epoch)
}

/// Converts a timestamp to an MS-DOS (time, date) pair,
/// clamping it to the years 1980 through 2107.
pub fn to_msdos(when: NaiveDateTime) -> (u16, u16) {
    if when.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if when.year() > 2107 {
        return (
            (23 << 11) | (59 << 5) | (58 / 2),
            (127 << 9) | (12 << 5) | 31,
        );
    }
    let time = (when.hour() << 11) | (when.minute() << 5) | (when.second() / 2);
    let date = ((when.year() - 1980) as u32) << 9 | (when.month() << 5) | when.day();
    (time as u16, date as u16)
}

/// Applies extra fields (4.5) to `metadata`.
/// Only Zip64 sizes and offsets are understood; the rest are skipped.
fn parse_extra_field(metadata: &mut FileMetadata, mut extra_field: &[u8]) -> ZipResult<()> {
    // Each field is a 2-byte ID and a 2-byte length, then the data.
    while !extra_field.is_empty() {
        let kind = read_u16(&mut extra_field)?;
        let field_len = usize(read_u16(&mut extra_field)?)?;
        let mut field = take(&mut extra_field, field_len)?;

        // Zip64 extended information extra field (4.5.3)
        if kind == 0x0001 {
            if metadata.size == u32::MAX as usize {
                metadata.size = usize(read_u64(&mut field)?)?;
            }
            if metadata.compressed_size == u32::MAX as usize {
                metadata.compressed_size = usize(read_u64(&mut field)?)?;
            }
            if metadata.header_offset == u32::MAX as usize {
                metadata.header_offset = usize(read_u64(&mut field)?)?;
            }
            // Multi-disk archives were rejected long before this.
            if !field.is_empty() {
                return Err(ZipError::InvalidArchive(
                    "Extra data field contains disk number",
                ));
            }
        }
    }
    Ok(())
}

/// `extra_field` minus any Zip64 extended information (4.5.3),
/// for records written with plain 32-bit sizes and offsets.
/// Malformed extra data is passed along untouched.
pub fn without_zip64_extra(extra_field: &[u8]) -> Vec<u8> {
    let mut kept = Vec::with_capacity(extra_field.len());
    let mut rest = extra_field;
    while !rest.is_empty() {
        let start = rest;
        match next_extra_field(&mut rest) {
            Ok((0x0001, _)) => {}
            Ok(_) => kept.extend_from_slice(&start[..start.len() - rest.len()]),
            Err(_) => return extra_field.to_vec(),
        }
    }
    kept
}

/// Consumes one extra field: its ID and its data.
fn next_extra_field<'a>(rest: &mut &'a [u8]) -> ZipResult<(u16, &'a [u8])> {
    let kind = read_u16(rest)?;
    let len = usize(read_u16(rest)?)?;
    Ok((kind, take(rest, len)?))
}

/// Data from a local file header (4.3.7)
///
/// Immediately precedes each entry's data.
#[derive(Debug)]
pub struct LocalFileHeader<'a> {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
}

impl<'a> LocalFileHeader<'a> {
    pub fn parse_and_consume(header: &mut &'a [u8]) -> ZipResult<Self> {
        expect_magic(header, LOCAL_FILE_HEADER_MAGIC, "Invalid local file header")?;
        let minimum_extract_version = read_u16(header)?;
        let flags = read_u16(header)?;
        let compression_method = read_u16(header)?;
        let last_modified_time = read_u16(header)?;
        let last_modified_date = read_u16(header)?;
        let crc32 = read_u32(header)?;
        let compressed_size = read_u32(header)?;
        let uncompressed_size = read_u32(header)?;
        let path_length = usize(read_u16(header)?)?;
        let extra_field_length = usize(read_u16(header)?)?;
        let path = take(header, path_length)?;
        let extra_field = take(header, extra_field_length)?;

        Ok(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            path,
            extra_field,
        })
    }

    /// Serializes the header, returning how many bytes were written.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> ZipResult<usize> {
        let mut record = Vec::with_capacity(30 + self.path.len() + self.extra_field.len());
        record.extend_from_slice(&LOCAL_FILE_HEADER_MAGIC);
        record.put_u16(self.minimum_extract_version);
        record.put_u16(self.flags);
        record.put_u16(self.compression_method);
        record.put_u16(self.last_modified_time);
        record.put_u16(self.last_modified_date);
        record.put_u32(self.crc32);
        record.put_u32(self.compressed_size);
        record.put_u32(self.uncompressed_size);
        record.put_u16(crate::arch::u16_field(self.path.len(), "Entry name")?);
        record.put_u16(crate::arch::u16_field(
            self.extra_field.len(),
            "Extra field",
        )?);
        record.extend_from_slice(self.path);
        record.extend_from_slice(self.extra_field);
        out.write_all(&record)?;
        Ok(record.len())
    }
}

/// The data descriptor (4.3.9) that trails an entry written with bit 3 set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    /// Serializes the descriptor (with its optional but customary signature),
    /// returning how many bytes were written.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<usize> {
        let mut record = Vec::with_capacity(16);
        record.extend_from_slice(&DATA_DESCRIPTOR_MAGIC);
        record.put_u32(self.crc32);
        record.put_u32(self.compressed_size);
        record.put_u32(self.uncompressed_size);
        out.write_all(&record)?;
        Ok(record.len())
    }
}
