//! Helpers shared between the parsers: padding classification, UCS-2 string
//! decoding and the TCG hash dispatch.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use sm3::Sm3;
use tree_model_lib::padding_subtype;

use crate::intel_fit::{
    TCG_HASH_ALGORITHM_ID_SHA1, TCG_HASH_ALGORITHM_ID_SHA256, TCG_HASH_ALGORITHM_ID_SHA384,
    TCG_HASH_ALGORITHM_ID_SHA512, TCG_HASH_ALGORITHM_ID_SM3,
};

/// Padding subtype by content: all-0x00, all-0xFF, or arbitrary data.
pub fn padding_type(data: &[u8]) -> u8 {
    if data.iter().all(|&b| b == 0x00) {
        padding_subtype::ZERO
    } else if data.iter().all(|&b| b == 0xFF) {
        padding_subtype::ONE
    } else {
        padding_subtype::DATA
    }
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Digest by TCG algorithm id. `None` for unknown algorithms.
pub fn tcg_digest(algorithm_id: u16, data: &[u8]) -> Option<Vec<u8>> {
    match algorithm_id {
        TCG_HASH_ALGORITHM_ID_SHA1 => Some(Sha1::digest(data).to_vec()),
        TCG_HASH_ALGORITHM_ID_SHA256 => Some(Sha256::digest(data).to_vec()),
        TCG_HASH_ALGORITHM_ID_SHA384 => Some(Sha384::digest(data).to_vec()),
        TCG_HASH_ALGORITHM_ID_SHA512 => Some(Sha512::digest(data).to_vec()),
        TCG_HASH_ALGORITHM_ID_SM3 => Some(Sm3::digest(data).to_vec()),
        _ => None,
    }
}

/// Uppercase hex, the rendering used for every hash in info and security
/// text.
pub fn to_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode a NUL-terminated UCS-2 string from the start of `data`.
pub fn ucs2_string(data: &[u8]) -> String {
    let mut out = String::new();
    for pair in data.chunks_exact(2) {
        let value = u16::from_le_bytes([pair[0], pair[1]]);
        if value == 0 {
            break;
        }
        out.push(char::from_u32(value as u32).unwrap_or('\u{FFFD}'));
    }
    out
}

/// Decode a NUL-terminated ASCII string from the start of `data`.
pub fn ascii_string(data: &[u8]) -> String {
    data.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '\u{FFFD}' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_classification() {
        assert_eq!(padding_type(&[0u8; 8]), padding_subtype::ZERO);
        assert_eq!(padding_type(&[0xFFu8; 8]), padding_subtype::ONE);
        assert_eq!(padding_type(&[0u8, 0xFF]), padding_subtype::DATA);
    }

    #[test]
    fn tcg_digest_sizes() {
        let data = b"firmware";
        assert_eq!(tcg_digest(TCG_HASH_ALGORITHM_ID_SHA1, data).unwrap().len(), 20);
        assert_eq!(tcg_digest(TCG_HASH_ALGORITHM_ID_SHA256, data).unwrap().len(), 32);
        assert_eq!(tcg_digest(TCG_HASH_ALGORITHM_ID_SHA384, data).unwrap().len(), 48);
        assert_eq!(tcg_digest(TCG_HASH_ALGORITHM_ID_SHA512, data).unwrap().len(), 64);
        assert_eq!(tcg_digest(TCG_HASH_ALGORITHM_ID_SM3, data).unwrap().len(), 32);
        assert!(tcg_digest(0x1234, data).is_none());
    }

    #[test]
    fn ucs2_decoding() {
        let bytes = [b'1', 0, b'.', 0, b'2', 0, 0, 0, 0xFF, 0xFF];
        assert_eq!(ucs2_string(&bytes), "1.2");
    }
}
