//! Helpers for explicit little-endian conversions.
//!
//! Coredump frame headers are produced by little-endian microcontrollers and
//! carry their integer fields in that order. These helpers keep Clippy
//! expectations scoped to the conversion points so protocol code stays explicit
//! about wire endianness without repeating lint annotations.

/// Serialise a `u32` in little-endian byte order.
///
/// # Examples
///
/// ```
/// use coredump_recv::byte_order::write_le_u32;
///
/// assert_eq!(write_le_u32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_le_u32(value: u32) -> [u8; 4] {
    #[allow(
        clippy::little_endian_bytes,
        reason = "Device headers are little-endian on the wire."
    )]
    value.to_le_bytes()
}

/// Parse a little-endian `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use coredump_recv::byte_order::read_le_u32;
///
/// assert_eq!(read_le_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_le_u32(bytes: [u8; 4]) -> u32 {
    #[allow(
        clippy::little_endian_bytes,
        reason = "Device headers are little-endian on the wire."
    )]
    u32::from_le_bytes(bytes)
}
