//! # CRC-8 digest for nvparam
//!
//! Plain CRC-8 (polynomial `0x07`, initial value `0x00`, no reflection, no
//! final XOR), computed bitwise. One byte of digest per stored instance
//! keeps the device overhead minimal; for payloads beyond a few dozen bytes
//! consider a wider checksum, since single-byte digests miss one corruption
//! in 256.

#![no_std]
#![warn(missing_docs)]

use nvparam_hal::Checksum;

const POLYNOMIAL: u8 = 0x07;

/// CRC-8 implementation of the [`Checksum`] interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc8;

impl Crc8 {
    /// Create a new CRC-8 digest.
    pub const fn new() -> Self {
        Self
    }
}

/// Computes the CRC-8 of `data`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl Checksum for Crc8 {
    const DIGEST_SIZE: usize = 1;

    fn compute(&self, data: &[u8], digest: &mut [u8]) {
        digest[0] = crc8(data);
    }
}
