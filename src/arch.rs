//! Checked integer casts between archive fields and the host's sizes.

use crate::result::*;

/// A checked cast from u64 to usize, for offsets and sizes read out of an archive.
pub fn usize<I: Into<u64>>(i: I) -> ZipResult<usize> {
    let i: u64 = i.into();
    if i > usize::MAX as u64 {
        Err(ZipError::InsufficientAddressSpace)
    } else {
        Ok(i as usize)
    }
}

/// A checked cast to a classic (non-Zip64) 32-bit size or offset field.
///
/// `0xFFFF_FFFF` is reserved as the "look in the Zip64 extra field" marker,
/// so it's rejected along with anything bigger.
pub fn u32_field<I: TryInto<u32>>(i: I, what: &str) -> ZipResult<u32> {
    match i.try_into() {
        Ok(v) if v != u32::MAX => Ok(v),
        _ => Err(ZipError::UnsupportedArchive(format!(
            "{what} needs Zip64, which isn't supported for output"
        ))),
    }
}

/// A checked cast to a classic (non-Zip64) 16-bit count or length field.
pub fn u16_field<I: TryInto<u16>>(i: I, what: &str) -> ZipResult<u16> {
    match i.try_into() {
        Ok(v) if v != u16::MAX => Ok(v),
        _ => Err(ZipError::UnsupportedArchive(format!(
            "{what} doesn't fit in a classic ZIP header"
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fields_reject_zip64_markers() {
        assert_eq!(u32_field(12usize, "size").unwrap(), 12);
        assert!(u32_field(u32::MAX as u64, "size").is_err());
        assert!(u32_field(u64::MAX, "size").is_err());
        assert_eq!(u16_field(3usize, "count").unwrap(), 3);
        assert!(u16_field(70_000usize, "count").is_err());
    }
}
