//! 8-bit Fletcher checksum with a 4-bit block size.
//!
//! Both ends of the link run this exact routine; any asymmetry is a
//! protocol bug.

/// Compute the checksum over `data`.
///
/// Each byte is fed as two nibbles (high first). After every nibble the
/// first accumulator is added into the second; both are reduced mod 16
/// once per byte.
pub fn fletcher8(data: &[u8]) -> u8 {
    let mut sum1: u8 = 0;
    let mut sum2: u8 = 0;
    for &byte in data {
        sum1 += byte >> 4;
        sum2 += sum1;

        sum1 += byte & 0x0F;
        sum2 += sum1;

        sum1 %= 16;
        sum2 %= 16;
    }
    (sum2 << 4) | sum1
}

/// `true` when the last byte of `frame` is the checksum of the rest.
pub fn verify(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&last, body)) => fletcher8(body) == last,
        None => false,
    }
}
