//! Integrity checks used by the HC03 framing layer.
//!
//! Both functions must stay bit-for-bit identical to the device firmware.

/// XOR-fold of the header bytes, low 8 bits.
pub fn header_checksum(bytes: &[u8]) -> u8 {
    let mut acc: u16 = 0;
    for &b in bytes {
        acc ^= u16::from(b);
    }
    (acc & 0xFF) as u8
}

/// 16-bit checksum over a frame from the start marker through the last content byte.
///
/// Per byte: swap the accumulator halves, XOR the byte in, then run the three
/// mixing steps. `u16` arithmetic keeps every intermediate masked to 16 bits.
pub fn frame_checksum(bytes: &[u8]) -> u16 {
    let mut acc: u16 = 0xFFFF;
    for &b in bytes {
        acc = acc.rotate_left(8);
        acc ^= u16::from(b);
        acc ^= (acc & 0xFF) >> 4;
        acc ^= acc << 12;
        acc ^= (acc & 0xFF) << 5;
    }
    acc
}

/// Wrapping byte sum used by the structured oxygen/pressure payloads.
pub fn sum_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
