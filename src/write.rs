//! Tools for writing a ZIP archive.
//!
//! [`ZipWriter`] streams entries into any [`io::Write`]:
//! nothing needs to `Seek`. Deflated files are followed by a data descriptor
//! instead of having their sizes patched into the local header afterwards,
//! and stored files are buffered until their sizes are known.
//! That makes a [`EntryWriter`] a perfectly good place to write
//! *another* archive, which is how nested archives get built.
//!
//! [`ZipWriter::finish()`] writes the central directory and hands back
//! the underlying writer. It never closes it.
//!
//! [`ZipWriter`]: struct.ZipWriter.html
//! [`EntryWriter`]: struct.EntryWriter.html
//! [`ZipWriter::finish()`]: struct.ZipWriter.html#method.finish
//! [`io::Write`]: https://doc.rust-lang.org/std/io/trait.Write.html

use std::io::{self, Write};

use chrono::NaiveDateTime;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::*;

use crate::arch::{u16_field, u32_field};
use crate::checksum::{CountingWriter, Crc32Writer};
use crate::read::{CompressionMethod, FileMetadata, ZipArchive};
use crate::result::*;
use crate::spec::{self, DataDescriptor, LocalFileHeader};

const DEFAULT_FILE_MODE: u16 = 0o100644;
const DEFAULT_DIRECTORY_MODE: u16 = 0o040755;

/// How newly-written entries are stored.
/// Entries copied verbatim from another archive keep their own settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// `None` stores files as-is; `Deflate` compresses them.
    /// `Unsupported` methods can only be copied, not written.
    pub compression: CompressionMethod,

    /// DEFLATE effort, when `compression` is `Deflate`
    pub level: Compression,

    /// Timestamp given to every new entry
    pub last_modified: NaiveDateTime,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflate,
            level: Compression::default(),
            last_modified: chrono::Local::now().naive_local(),
        }
    }
}

/// What the central directory needs to know about an entry once it's written
#[derive(Debug)]
struct CentralRecord {
    name: Vec<u8>,
    source_version: u16,
    minimum_extract_version: u16,
    flags: u16,
    compression_method: u16,
    last_modified_time: u16,
    last_modified_date: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    internal_file_attributes: u16,
    external_file_attributes: u32,
    header_offset: u32,
    extra_field: Vec<u8>,
    local_extra_field: Vec<u8>,
    comment: Vec<u8>,
}

impl CentralRecord {
    fn write<W: Write>(&self, out: &mut W) -> ZipResult<()> {
        spec::CentralDirectoryEntry {
            source_version: self.source_version,
            minimum_extract_version: self.minimum_extract_version,
            flags: self.flags,
            compression_method: self.compression_method,
            last_modified_time: self.last_modified_time,
            last_modified_date: self.last_modified_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            disk_number: 0,
            internal_file_attributes: self.internal_file_attributes,
            external_file_attributes: self.external_file_attributes,
            header_offset: self.header_offset,
            path: &self.name,
            extra_field: &self.extra_field,
            file_comment: &self.comment,
        }
        .write(out)
    }

    fn local_header(&self) -> LocalFileHeader<'_> {
        LocalFileHeader {
            minimum_extract_version: self.minimum_extract_version,
            flags: self.flags,
            compression_method: self.compression_method,
            last_modified_time: self.last_modified_time,
            last_modified_date: self.last_modified_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            path: &self.name,
            extra_field: &self.local_extra_field,
        }
    }
}

fn name_flags(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        spec::FLAG_UTF8
    }
}

fn external_attributes(mode: u16, is_dir: bool) -> u32 {
    let dos = if is_dir {
        spec::DOS_DIRECTORY_ATTRIBUTE
    } else {
        0
    };
    ((mode as u32) << 16) | dos
}

/// A ZIP archive being written
pub struct ZipWriter<W: Write> {
    out: CountingWriter<W>,
    options: WriteOptions,
    central_directory: Vec<CentralRecord>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_options(out, WriteOptions::default())
    }

    pub fn with_options(out: W, options: WriteOptions) -> Self {
        Self {
            out: CountingWriter::new(out),
            options,
            central_directory: Vec::new(),
        }
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.central_directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.central_directory.is_empty()
    }

    fn new_record(&self, name: &str, flags: u16, method: CompressionMethod) -> ZipResult<CentralRecord> {
        let (last_modified_time, last_modified_date) = spec::to_msdos(self.options.last_modified);
        Ok(CentralRecord {
            name: name.as_bytes().to_vec(),
            source_version: spec::VERSION_MADE_BY,
            minimum_extract_version: spec::VERSION_NEEDED,
            flags: flags | name_flags(name),
            compression_method: method.as_u16(),
            last_modified_time,
            last_modified_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            internal_file_attributes: 0,
            external_file_attributes: 0,
            header_offset: u32_field(self.out.position(), "Local header offset")?,
            extra_field: Vec::new(),
            local_extra_field: Vec::new(),
            comment: Vec::new(),
        })
    }

    /// Writes an empty directory entry. `name` must end in `/`.
    pub fn add_directory(&mut self, name: &str) -> ZipResult<()> {
        if !name.ends_with('/') {
            return Err(ZipError::InvalidPath(format!(
                "Directory entry {name} doesn't end in /"
            )));
        }
        trace!("Writing directory {name}");
        let mut record = self.new_record(name, 0, CompressionMethod::None)?;
        record.external_file_attributes = external_attributes(DEFAULT_DIRECTORY_MODE, true);
        record.local_header().write(&mut self.out)?;
        self.central_directory.push(record);
        Ok(())
    }

    /// Starts a file entry, returning a writer for its contents.
    ///
    /// Deflated entries stream straight through, with their CRC and sizes
    /// in a trailing data descriptor. Stored entries can't use one
    /// (streaming readers like `java.util.zip` reject it), so their contents
    /// are held in memory until [`EntryWriter::finish()`] writes the header.
    ///
    /// Call [`EntryWriter::finish()`] once the contents are written;
    /// nothing else can be added to the archive until then.
    ///
    /// [`EntryWriter::finish()`]: struct.EntryWriter.html#method.finish
    pub fn start_file(&mut self, name: &str) -> ZipResult<EntryWriter<'_, W>> {
        if name.is_empty() || name.ends_with('/') {
            return Err(ZipError::InvalidPath(format!(
                "File entry {name:?} must be non-empty and not end in /"
            )));
        }
        trace!("Writing file {name}");
        let method = self.options.compression;
        let flags = match method {
            CompressionMethod::Deflate => spec::FLAG_DATA_DESCRIPTOR,
            _ => 0,
        };
        let mut record = self.new_record(name, flags, method)?;
        record.external_file_attributes = external_attributes(DEFAULT_FILE_MODE, false);

        let sink = match method {
            CompressionMethod::None => EntrySink::Stored {
                contents: Crc32Writer::new(Vec::new()),
                out: &mut self.out,
            },
            CompressionMethod::Deflate => {
                record.local_header().write(&mut self.out)?;
                let data_start = self.out.position();
                EntrySink::Deflate {
                    encoder: Crc32Writer::new(DeflateEncoder::new(
                        &mut self.out,
                        self.options.level,
                    )),
                    data_start,
                }
            }
            CompressionMethod::Unsupported(m) => {
                return Err(ZipError::UnsupportedArchive(format!(
                    "Can't write compression method {m}"
                )))
            }
        };

        Ok(EntryWriter {
            sink,
            central_directory: &mut self.central_directory,
            record,
        })
    }

    /// Writes a whole file entry from a byte slice.
    pub fn add_file(&mut self, name: &str, contents: &[u8]) -> ZipResult<()> {
        let mut entry = self.start_file(name)?;
        entry.write_all(contents)?;
        entry.finish()
    }

    /// Copies an entry out of another archive without recompressing it.
    ///
    /// Everything but the header offset is kept as stored: name bytes,
    /// flags, method, CRC, timestamp, attributes, extra fields, and comment.
    /// Zip64 extra fields are dropped, since the copy is written without Zip64.
    pub fn copy_raw(&mut self, archive: &ZipArchive, metadata: &FileMetadata) -> ZipResult<()> {
        let (local_extra, raw) = archive.raw_with_local_extra(metadata)?;
        trace!("Copying {} verbatim ({} bytes)", metadata.path, raw.len());

        let stored = &metadata.stored;
        let record = CentralRecord {
            name: stored.name.to_vec(),
            source_version: stored.source_version,
            minimum_extract_version: stored.minimum_extract_version,
            flags: metadata.flags,
            compression_method: metadata.compression_method.as_u16(),
            last_modified_time: stored.last_modified_time,
            last_modified_date: stored.last_modified_date,
            crc32: metadata.crc32,
            compressed_size: u32_field(metadata.compressed_size, "Compressed size")?,
            uncompressed_size: u32_field(metadata.size, "Size")?,
            internal_file_attributes: stored.internal_file_attributes,
            external_file_attributes: stored.external_file_attributes,
            header_offset: u32_field(self.out.position(), "Local header offset")?,
            extra_field: spec::without_zip64_extra(&stored.extra_field),
            local_extra_field: spec::without_zip64_extra(local_extra),
            comment: stored.comment.to_vec(),
        };

        record.local_header().write(&mut self.out)?;
        self.out.write_all(raw)?;
        if record.flags & spec::FLAG_DATA_DESCRIPTOR != 0 {
            DataDescriptor {
                crc32: record.crc32,
                compressed_size: record.compressed_size,
                uncompressed_size: record.uncompressed_size,
            }
            .write(&mut self.out)?;
        }
        self.central_directory.push(record);
        Ok(())
    }

    /// Writes the central directory and the end record,
    /// then returns the underlying writer (flushed, but not closed).
    pub fn finish(mut self) -> ZipResult<W> {
        let central_directory_offset =
            u32_field(self.out.position(), "Central directory offset")?;
        for record in &self.central_directory {
            record.write(&mut self.out)?;
        }
        let central_directory_size = u32_field(
            self.out.position() - central_directory_offset as u64,
            "Central directory size",
        )?;
        let entries = u16_field(self.central_directory.len(), "Entry count")?;
        spec::EndOfCentralDirectory::new(entries, central_directory_size, central_directory_offset)
            .write(&mut self.out)?;
        debug!(
            "Finished archive with {} entries ({} bytes)",
            entries,
            self.out.position()
        );
        self.out.flush()?;
        Ok(self.out.into_inner())
    }
}

enum EntrySink<'w, W: Write> {
    /// Held back until the CRC and sizes are known
    Stored {
        contents: Crc32Writer<Vec<u8>>,
        out: &'w mut CountingWriter<W>,
    },
    Deflate {
        encoder: Crc32Writer<DeflateEncoder<&'w mut CountingWriter<W>>>,
        data_start: u64,
    },
}

/// The contents of a file entry being written
///
/// Dropping this without calling [`finish()`](#method.finish)
/// leaves the archive truncated mid-entry.
pub struct EntryWriter<'w, W: Write> {
    sink: EntrySink<'w, W>,
    central_directory: &'w mut Vec<CentralRecord>,
    record: CentralRecord,
}

impl<W: Write> EntryWriter<'_, W> {
    /// Ends the entry, writing whatever of it is still pending.
    pub fn finish(self) -> ZipResult<()> {
        let mut record = self.record;
        match self.sink {
            EntrySink::Stored { contents, out } => {
                let (contents, crc32, size) = contents.into_parts();
                record.crc32 = crc32;
                record.compressed_size = u32_field(contents.len(), "Compressed size")?;
                record.uncompressed_size = u32_field(size, "Size")?;
                record.local_header().write(out)?;
                out.write_all(&contents)?;
            }
            EntrySink::Deflate {
                encoder,
                data_start,
            } => {
                let (encoder, crc32, size) = encoder.into_parts();
                let out = encoder.finish()?;
                record.crc32 = crc32;
                record.compressed_size =
                    u32_field(out.position() - data_start, "Compressed size")?;
                record.uncompressed_size = u32_field(size, "Size")?;
                DataDescriptor {
                    crc32,
                    compressed_size: record.compressed_size,
                    uncompressed_size: record.uncompressed_size,
                }
                .write(out)?;
            }
        }
        trace!(
            "Finished {} ({} -> {} bytes)",
            String::from_utf8_lossy(&record.name),
            record.uncompressed_size,
            record.compressed_size
        );
        self.central_directory.push(record);
        Ok(())
    }
}

impl<W: Write> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            EntrySink::Stored { contents, .. } => contents.write(buf),
            EntrySink::Deflate { encoder, .. } => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            EntrySink::Stored { .. } => Ok(()),
            EntrySink::Deflate { encoder, .. } => encoder.flush(),
        }
    }
}
