//! LEB128 varint primitives.
//!
//! Readers take a slice and an offset and return the decoded value plus the
//! number of bytes consumed, so callers can advance a cursor. The walker
//! depends on the byte counts being exact: a miscounted operand corrupts
//! every byte that follows it.

use crate::error::DceError;

/// Decodes an unsigned 32-bit LEB128 at `pos`.
pub fn read_u32(data: &[u8], pos: usize) -> Result<(u32, usize), DceError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    for i in 0..5 {
        let byte = *data
            .get(pos + i)
            .ok_or(DceError::SectionOutOfBounds { context: "varint" })?;
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(DceError::VarintOverflow { offset: pos })
}

/// Decodes a signed 32-bit LEB128 at `pos`.
pub fn read_s32(data: &[u8], pos: usize) -> Result<(i32, usize), DceError> {
    let (value, len) = read_signed(data, pos, 32)?;
    Ok((value as i32, len))
}

/// Decodes a signed 33-bit LEB128 at `pos` (block type immediates).
pub fn read_s33(data: &[u8], pos: usize) -> Result<(i64, usize), DceError> {
    read_signed(data, pos, 33)
}

/// Decodes a signed 64-bit LEB128 at `pos`.
pub fn read_s64(data: &[u8], pos: usize) -> Result<(i64, usize), DceError> {
    read_signed(data, pos, 64)
}

fn read_signed(data: &[u8], pos: usize, bits: u32) -> Result<(i64, usize), DceError> {
    let max_len = (bits as usize + 6) / 7;
    let mut value: i64 = 0;
    let mut shift = 0u32;
    for i in 0..max_len {
        let byte = *data
            .get(pos + i)
            .ok_or(DceError::SectionOutOfBounds { context: "varint" })?;
        value |= i64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && shift < bits && byte & 0x40 != 0 {
                value |= -1i64 << shift;
            }
            return Ok((value, i + 1));
        }
    }
    Err(DceError::VarintOverflow { offset: pos })
}

/// Appends `value` as a canonical unsigned LEB128.
pub fn write_u32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Returns `value` as a canonical unsigned LEB128.
pub fn u32_bytes(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    write_u32(&mut out, value);
    out
}
