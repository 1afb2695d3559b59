//! `leb` — LEB128 codec over an in-memory byte cursor (spec.md §4.1, §8
//! property 2). Named to avoid shadowing the `leb128` crate it wraps.
//!
//! Built on the `leb128` crate (as `RReverser-wasmbin` does for its own
//! varint needs) rather than a hand-rolled bit-shift loop: the corpus already
//! reaches for it and it is battle-tested against exactly the width/overflow
//! edge cases `spec.md` calls out.

use crate::error::ParseError;
use std::io::Cursor;

/// Read an unsigned LEB128-encoded integer, failing if it doesn't fit in 32
/// bits (decoders for 64-bit fields use [`read_u64`] instead).
pub fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ParseError> {
    let offset = cursor.position() as usize;
    let value = leb128::read::unsigned(cursor)
        .map_err(|_| ParseError::new(offset, "malformed unsigned LEB128 (u32)"))?;
    u32::try_from(value).map_err(|_| ParseError::new(offset, "LEB128 u32 value out of range"))
}

/// Read an unsigned LEB128-encoded 64-bit integer.
pub fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, ParseError> {
    let offset = cursor.position() as usize;
    leb128::read::unsigned(cursor)
        .map_err(|_| ParseError::new(offset, "malformed unsigned LEB128 (u64)"))
}

/// Read a signed LEB128-encoded 32-bit integer.
pub fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32, ParseError> {
    let offset = cursor.position() as usize;
    let value = leb128::read::signed(cursor)
        .map_err(|_| ParseError::new(offset, "malformed signed LEB128 (i32)"))?;
    i32::try_from(value).map_err(|_| ParseError::new(offset, "LEB128 i32 value out of range"))
}

/// Read a signed LEB128-encoded 64-bit integer.
pub fn read_i64(cursor: &mut Cursor<&[u8]>) -> Result<i64, ParseError> {
    let offset = cursor.position() as usize;
    leb128::read::signed(cursor)
        .map_err(|_| ParseError::new(offset, "malformed signed LEB128 (i64)"))
}

/// Encode an unsigned integer as LEB128, appending to `out`. Used by the IL
/// emitter's tests and by any consumer re-serializing constant offsets.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    leb128::write::unsigned(out, value).expect("Vec<u8> writes are infallible");
}

/// Encode a signed integer as LEB128, appending to `out`.
pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    leb128::write::signed(out, value).expect("Vec<u8> writes are infallible");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_u64(n: u64) {
        let mut buf = Vec::new();
        write_u64(&mut buf, n);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_u64(&mut cursor).unwrap(), n);
        assert_eq!(cursor.position() as usize, buf.len());
    }

    fn roundtrip_i64(n: i64) {
        let mut buf = Vec::new();
        write_i64(&mut buf, n);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_i64(&mut cursor).unwrap(), n);
        assert_eq!(cursor.position() as usize, buf.len());
    }

    #[test]
    fn unsigned_boundary_values_roundtrip() {
        for n in [
            0u64,
            1,
            127,
            128,
            255,
            256,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            u64::MAX - 1,
            u64::MAX,
        ] {
            roundtrip_u64(n);
        }
    }

    #[test]
    fn signed_boundary_values_roundtrip() {
        for n in [
            0i64,
            1,
            -1,
            63,
            64,
            -64,
            -65,
            i32::MAX as i64,
            i32::MIN as i64,
            i64::MAX,
            i64::MIN,
        ] {
            roundtrip_i64(n);
        }
    }

    #[test]
    fn unsigned_linear_sweep_roundtrips() {
        // Deterministic LCG sweep in place of a new proptest dependency
        // (SPEC_FULL.md §F): exercises a wide spread of bit-widths.
        let mut state: u64 = 0x243F_6A88_85A3_08D3;
        for _ in 0..2000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            roundtrip_u64(state);
        }
    }

    #[test]
    fn signed_linear_sweep_roundtrips() {
        let mut state: u64 = 0x1319_8A2E_0370_7344;
        for _ in 0..2000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            roundtrip_i64(state as i64);
        }
    }

    #[test]
    fn truncated_input_is_parse_error() {
        // A continuation byte (high bit set) with nothing following.
        let buf = [0x80u8];
        let mut cursor = Cursor::new(buf.as_slice());
        assert!(read_u32(&mut cursor).is_err());
    }

    #[test]
    fn oversized_u32_is_parse_error() {
        let mut buf = Vec::new();
        write_u64(&mut buf, u64::MAX);
        let mut cursor = Cursor::new(buf.as_slice());
        assert!(read_u32(&mut cursor).is_err());
    }
}
