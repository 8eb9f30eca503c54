//! CRC32 checksum computation for key records
//!
//! Every record read from the reverse store is verified; a mismatch is
//! reported as data corruption.

use crc32fast::Hasher;

/// Computes a CRC32 (IEEE) checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes a CRC32 checksum over several slices as if they were contiguous.
pub fn compute_checksum_parts(parts: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"<t>shared string</t>";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut data = vec![0x00, 0x01, 0x02, 0x03, 0x04];
        let original = compute_checksum(&data);
        data[2] ^= 0x01;
        assert_ne!(original, compute_checksum(&data));
    }

    #[test]
    fn test_parts_match_contiguous() {
        let whole = compute_checksum(b"lengthbody");
        let parts = compute_checksum_parts(&[b"length", b"body"]);
        assert_eq!(whole, parts);
    }
}
