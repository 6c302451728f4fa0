//! zipset is a lazy set of ZIP archive entries.
//!
//! Additions, replacements, and deletions are collected in a [`ZipSet`]
//! without doing any I/O, then merged with an (optional) base archive
//! in a single pass when the set is built:
//!
//! ```no_run
//! # use zipset::*;
//! // Start from an existing archive...
//! let mut zip = ZipSet::with_base("app.zip");
//!
//! // ...queue up some changes...
//! zip.add_bytes("version.txt", "1.2.3")?
//!     .add_path("assets/", "build/assets")?
//!     .remove("debug.log")?;
//!
//! // ...including some inside an archive inside the archive.
//! zip.add_bytes("lib/plugin.jar!META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n")?
//!     .remove("lib/plugin.jar!/junk.class")?;
//!
//! // Nothing has been read or written yet. Now it is.
//! zip.build_to_path("app-patched.zip")?;
//! # Ok::<(), zipset::result::ZipError>(())
//! ```
//!
//! Nested archives are addressed with `!`: `outer.zip!inner.zip!file.txt`.
//! Names ending in `/` are directories.
//!
//! The crate carries its own small ZIP codec:
//! [`ZipArchive`] reads archives from byte slices,
//! and [`ZipWriter`] streams them into any `io::Write`.
//!
//! [`ZipSet`]: set/struct.ZipSet.html
//! [`ZipArchive`]: read/struct.ZipArchive.html
//! [`ZipWriter`]: write/struct.ZipWriter.html

pub mod naming;
pub mod path;
pub mod read;
pub mod result;
pub mod set;
pub mod write;

pub use path::{EntryPath, IntoEntryPath};
pub use read::{CompressionMethod, FileMetadata, ZipArchive};
pub use result::{ZipError, ZipResult};
pub use set::{Base, Resource, ZipSet};
pub use write::{EntryWriter, WriteOptions, ZipWriter};

mod arch;
mod build;
mod checksum;
mod spec;
