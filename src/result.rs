//! Error types and the related `Result<T>`

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// An error from underlying I/O: the base archive, a referenced file,
    /// or the output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An archive (the base, or one nested in it) is malformed.
    #[error("Invalid ZIP archive: {0}")]
    InvalidArchive(&'static str),

    /// Decoding a UTF-8 name or comment failed
    #[error("Invalid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// The ZIP archive uses an unsupported feature,
    /// or the output would need one (e.g., Zip64).
    #[error("Unsupported ZIP feature: {0}")]
    UnsupportedArchive(String),

    /// Unknown bytes precede the archive.
    /// (Use [`ZipArchive::with_prepended_data()`] if this is okay.)
    ///
    /// [`ZipArchive::with_prepended_data()`]: ../read/struct.ZipArchive.html#method.with_prepended_data
    #[error("Archive prepended with {0} unknown bytes")]
    PrependedWithUnknownBytes(usize),

    /// A user-provided entry path (not one from a ZIP archive) was invalid.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An archive's sizes or offsets don't fit in a usize.
    #[error("ZIP archive too large for address space")]
    InsufficientAddressSpace,
}

impl ZipError {
    /// True if the error means some archive couldn't be parsed
    /// (or can't be produced) as a valid ZIP.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ZipError::InvalidArchive(_)
                | ZipError::Encoding(_)
                | ZipError::UnsupportedArchive(_)
                | ZipError::PrependedWithUnknownBytes(_)
                | ZipError::InsufficientAddressSpace
        )
    }

    /// True if the error came from the underlying streams or filesystem.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ZipError::Io(_))
    }
}
