//! LEB128 variable-length encoding of `u32` values, used by the posting-list file.

use sift_common::{Result, error::Error};

/// Maximum encoded length of a `u32`.
pub const MAX_VARINT_LEN: usize = 5;

/// Appends the encoding of `value` to `out`.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decodes a value from the front of `bytes`, returning it together with the
/// number of bytes consumed.
#[inline]
pub fn read_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut result = 0u32;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate().take(MAX_VARINT_LEN) {
        let chunk = (byte & 0x7f) as u32;
        if shift == 28 && chunk > 0x0f {
            return Err(Error::invalid_format_msg("varint", "u32 overflow"));
        }
        result |= chunk << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(Error::invalid_format_msg("varint", "encoding longer than 5 bytes"))
    } else {
        Err(Error::invalid_format_msg("varint", "truncated encoding"))
    }
}
