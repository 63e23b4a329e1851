//! Stored-record framing: `payload-bytes | key-bytes | key-length (LE u16)`.
//!
//! The suffix key-length lets the read path unframe without a pre-read header — the
//! reassembly walks arenas forward and the length lands in the last arena of a
//! cross-arena entry.

use crate::error::{CacheError, Result};

pub const MAX_KEY_SIZE: usize = u16::MAX as usize;

/// Builds the stored record for a `(key, payload)` pair.
pub fn frame(key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    if key.len() > MAX_KEY_SIZE {
        return Err(CacheError::KeyTooBig {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    if payload.is_empty() {
        return Err(CacheError::EntryEmpty);
    }
    let mut buf = Vec::with_capacity(payload.len() + key.len() + 2);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    Ok(buf)
}

/// Splits a stored record back into `(payload, key)`. Fails with `EntryCorrupt` if the
/// record is too short to hold the key-length suffix and the key it names.
pub fn unframe(record: &[u8]) -> Result<(&[u8], &[u8])> {
    if record.len() < 2 {
        return Err(CacheError::EntryCorrupt);
    }
    let (body, len_bytes) = record.split_at(record.len() - 2);
    let key_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if key_len > body.len() {
        return Err(CacheError::EntryCorrupt);
    }
    let (payload, key) = body.split_at(body.len() - key_len);
    Ok((payload, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = b"foo";
        let payload = b"bar";
        let framed = frame(key, payload).unwrap();
        assert_eq!(framed.len(), payload.len() + key.len() + 2);
        let (p, k) = unframe(&framed).unwrap();
        assert_eq!(p, payload);
        assert_eq!(k, key);
    }

    #[test]
    fn empty_payload_rejected() {
        assert_eq!(frame(b"k", b"").unwrap_err(), CacheError::EntryEmpty);
    }

    #[test]
    fn oversized_key_rejected() {
        let key = vec![0u8; MAX_KEY_SIZE + 1];
        assert!(matches!(
            frame(&key, b"v").unwrap_err(),
            CacheError::KeyTooBig { .. }
        ));
    }

    #[test]
    fn truncated_record_is_corrupt() {
        assert!(unframe(&[0u8]).is_err());
    }
}
