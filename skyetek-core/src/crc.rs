//! SkyeTek CRC16
//!
//! Both the STPv3 frame format and the bootload sub-protocol use a reflected
//! CRC16 with polynomial 0x8408, processed LSB-first, eight shifts per byte.
//! They differ in what gets covered and how the result is checked, so each
//! has its own entry point:
//!
//! - [`stpv3`]: seeded with 0, covers `[length .. payload]` of a frame
//!   (everything after STX, before the trailing CRC).
//! - [`bootload`]: preset supplied per frame, covers `[length, code, payload]`.
//!
//! The trailing CRC is written big-endian in both formats.

use tracing::trace;

/// Reflected CCITT polynomial
pub const POLYNOMIAL: u16 = 0x8408;

fn update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if crc & 0x0001 == 1 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Calculate the STPv3 frame CRC
///
/// # Examples
///
/// ```
/// use skyetek_core::crc;
///
/// // Empty input returns the seed unchanged
/// assert_eq!(crc::stpv3(0, &[]), 0);
/// ```
pub fn stpv3(seed: u16, data: &[u8]) -> u16 {
    let crc = update(seed, data);

    trace!(
        seed = seed,
        len = data.len(),
        crc = format!("0x{:04X}", crc),
        "Calculated STPv3 CRC"
    );

    crc
}

/// Verify a complete STPv3 frame (`STX | len | ... | crc`) against its trailing CRC
///
/// Returns `(calculated, received)` so callers can report both on mismatch.
/// Frames shorter than the minimal STX + length + CRC layout yield `None`.
pub fn stpv3_check(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < 5 {
        return None;
    }

    let crc_at = frame.len() - 2;
    let received = u16::from_be_bytes([frame[crc_at], frame[crc_at + 1]]);
    let calculated = stpv3(0, &frame[1..crc_at]);

    Some((calculated, received))
}

/// Calculate the bootload frame CRC
pub fn bootload(preset: u16, data: &[u8]) -> u16 {
    let crc = update(preset, data);

    trace!(
        preset = preset,
        len = data.len(),
        crc = format!("0x{:04X}", crc),
        "Calculated bootload CRC"
    );

    crc
}

/// Verify a bootload response buffer laid out as `len(2) | body(len)`
///
/// The CRC covers the first `len` bytes of the buffer (length, code and
/// payload) and sits big-endian in the two bytes after them.
pub fn bootload_verify(buf: &[u8], len: usize) -> bool {
    if len < 2 || buf.len() < len + 2 {
        return false;
    }

    let calculated = bootload(0x0000, &buf[..len]);
    buf[len] == (calculated >> 8) as u8 && buf[len + 1] == (calculated & 0x00FF) as u8
}
