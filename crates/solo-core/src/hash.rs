//! SHA256 double-hashing and target comparison.

use sha2::{Digest, Sha256};

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// Used for header hashing, transaction ids, merkle nodes and base58
/// checksums.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Check if a hash is strictly below a target.
///
/// Both values are 256-bit integers stored little-endian, which is the
/// byte order `double_sha256` produces for headers. The most significant
/// byte is the last one.
#[inline]
pub fn hash_below_target(hash: &[u8; 32], target_le: &[u8; 32]) -> bool {
    for i in (0..32).rev() {
        if hash[i] < target_le[i] {
            return true;
        }
        if hash[i] > target_le[i] {
            return false;
        }
    }
    false
}

/// Reverse the byte order of a 32-byte array.
///
/// Converts between display (RPC hex) order and internal order.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> String {
    hex::encode(reverse_bytes(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        let expected =
            hex::decode("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_hash_below_target_little_endian() {
        // Target 0x00ff00..00 stored little-endian: most significant byte last.
        let mut target = [0u8; 32];
        target[30] = 0xff;

        let mut below = [0xffu8; 32];
        below[31] = 0x00;
        below[30] = 0xfe;
        assert!(hash_below_target(&below, &target));

        // Low-order bytes do not matter once a higher byte is larger.
        let mut above = [0u8; 32];
        above[31] = 0x01;
        assert!(!hash_below_target(&above, &target));

        // Equal is not below.
        assert!(!hash_below_target(&target, &target));
    }

    #[test]
    fn test_display_hex_reverses() {
        let mut hash = [0u8; 32];
        hash[31] = 0xab;
        let display = hash_to_display_hex(&hash);
        assert!(display.starts_with("ab"));
        assert!(display.ends_with("00"));
    }
}
