//! Checksummed value envelope
//!
//! On-disk layout: `[crc32: u32 LE][len: u32 LE][payload]`.
//! The checksum covers the length and the payload. Any mismatch is corruption.

use crc32fast::Hasher;

use super::errors::{StorageError, StorageResult};

const HEADER_LEN: usize = 8;

/// Computes a CRC32 (IEEE) checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Wrap `payload` in a checksummed envelope.
pub fn seal(payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() as u32).to_le_bytes();
    let mut hasher = Hasher::new();
    hasher.update(&len);
    hasher.update(payload);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&len);
    out.extend_from_slice(payload);
    out
}

/// Verify and strip the envelope.
pub fn open(bytes: &[u8]) -> StorageResult<&[u8]> {
    if bytes.len() < HEADER_LEN {
        return Err(StorageError::data_corruption(format!(
            "envelope truncated: {} bytes",
            bytes.len()
        )));
    }
    let stored_crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len {
        return Err(StorageError::data_corruption(format!(
            "envelope length mismatch: header {} payload {}",
            len,
            payload.len()
        )));
    }
    if compute_checksum(&bytes[4..]) != stored_crc {
        return Err(StorageError::data_corruption("envelope checksum mismatch"));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        assert_eq!(compute_checksum(b"abc"), compute_checksum(b"abc"));
        assert_ne!(compute_checksum(b"abc"), compute_checksum(b"abd"));
    }

    #[test]
    fn test_seal_open() {
        let sealed = seal(b"{\"next_replica_id\":3}");
        assert_eq!(open(&sealed).unwrap(), b"{\"next_replica_id\":3}");
    }

    #[test]
    fn test_empty_payload() {
        let sealed = seal(b"");
        assert_eq!(open(&sealed).unwrap(), b"");
    }

    #[test]
    fn test_bit_flip_is_corruption() {
        let mut sealed = seal(b"payload");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let err = open(&sealed).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_truncation_is_corruption() {
        let sealed = seal(b"payload");
        assert!(open(&sealed[..5]).unwrap_err().is_fatal());
        assert!(open(&sealed[..sealed.len() - 1]).unwrap_err().is_fatal());
    }
}
