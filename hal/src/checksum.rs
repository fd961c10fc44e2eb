//! # Checksum Interface
//!
//! Every stored block instance is protected by a digest computed over its
//! payload. The algorithm is pluggable; the engine only requires a pure
//! byte-array -> fixed-width function and treats the digest as opaque bytes.

/// A deterministic, pure digest over a byte range.
///
/// The reliability of the whole engine rests on the chosen algorithm:
/// a digest too weak for the payload size will let corrupted instances be
/// accepted as valid at startup.
pub trait Checksum {
    /// Width of the digest in bytes.
    const DIGEST_SIZE: usize;

    /// Computes the digest of `data` into `digest`.
    ///
    /// `digest` is exactly [`Self::DIGEST_SIZE`] bytes. Byte order within
    /// the digest is the implementation's choice; the engine only ever
    /// compares digests it produced itself.
    fn compute(&self, data: &[u8], digest: &mut [u8]);
}
