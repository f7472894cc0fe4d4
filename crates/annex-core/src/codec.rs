//! Little-endian byte codec for on-disk scalars.
//!
//! Everything in the index file is little-endian: `u16`/`u32`/`f32` as
//! 2/4/4 bytes, `i64`/`u64` as 8 bytes, `f32` as its IEEE-754 bit
//! pattern. Decoding is shift-and-combine over an in-bounds slice and
//! never allocates; encoding writes into a caller-provided buffer and
//! returns the number of bytes written.
//!
//! All functions panic when the buffer is shorter than the encoded
//! width. Callers size their buffers from the block geometry, so a
//! panic here is a bug, not an input error.

#[inline]
pub(crate) fn write_u16(buf: &mut [u8], value: u16) -> usize {
    buf[..2].copy_from_slice(&value.to_le_bytes());
    2
}

#[inline]
pub(crate) fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes(buf[..2].try_into().expect("buffer holds 2 bytes"))
}

#[inline]
pub(crate) fn write_u32(buf: &mut [u8], value: u32) -> usize {
    buf[..4].copy_from_slice(&value.to_le_bytes());
    4
}

#[inline]
pub(crate) fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[..4].try_into().expect("buffer holds 4 bytes"))
}

#[inline]
pub(crate) fn write_u64(buf: &mut [u8], value: u64) -> usize {
    buf[..8].copy_from_slice(&value.to_le_bytes());
    8
}

#[inline]
pub(crate) fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes(buf[..8].try_into().expect("buffer holds 8 bytes"))
}

#[inline]
pub(crate) fn write_i64(buf: &mut [u8], value: i64) -> usize {
    buf[..8].copy_from_slice(&value.to_le_bytes());
    8
}

#[inline]
pub(crate) fn read_i64(buf: &[u8]) -> i64 {
    i64::from_le_bytes(buf[..8].try_into().expect("buffer holds 8 bytes"))
}

#[inline]
pub(crate) fn write_f32(buf: &mut [u8], value: f32) -> usize {
    buf[..4].copy_from_slice(&value.to_le_bytes());
    4
}

#[inline]
pub(crate) fn read_f32(buf: &[u8]) -> f32 {
    f32::from_le_bytes(buf[..4].try_into().expect("buffer holds 4 bytes"))
}
