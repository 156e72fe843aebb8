//! Compact "bits" difficulty decoding.

use thiserror::Error;

/// Errors produced while decoding a compact difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifficultyError {
    /// The bits value is not a valid hexadecimal u32.
    #[error("malformed difficulty bits: {0:?}")]
    MalformedDifficulty(String),
}

/// Parse compact bits given as a hex string, with or without a `0x` prefix.
pub fn parse_bits(text: &str) -> Result<u32, DifficultyError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DifficultyError::MalformedDifficulty(text.to_string()));
    }

    u32::from_str_radix(digits, 16)
        .map_err(|_| DifficultyError::MalformedDifficulty(text.to_string()))
}

/// Convert compact "bits" to a 256-bit target.
///
/// The bits format is: [exponent (1 byte)][coefficient (3 bytes)]
/// Target = coefficient * 256^(exponent - 3), clamped to 2^256 - 1.
///
/// The result is a 32-byte big-endian representation of the target.
pub fn bits_to_target(bits: u32) -> [u8; 32] {
    let exponent = (bits >> 24) as usize;
    let coefficient = bits & 0x00ff_ffff;

    let mut target = [0u8; 32];

    if exponent <= 3 {
        // Coefficient loses its low bytes.
        let value = coefficient >> (8 * (3 - exponent));
        target[29..32].copy_from_slice(&value.to_be_bytes()[1..4]);
        return target;
    }

    // Coefficient byte k (0 = most significant) lands at 29 + k - shift.
    let shift = exponent - 3;
    let coefficient_bytes = coefficient.to_be_bytes();
    for (k, &byte) in coefficient_bytes[1..4].iter().enumerate() {
        match (29 + k).checked_sub(shift) {
            Some(index) => target[index] = byte,
            None if byte != 0 => return [0xff; 32],
            None => {}
        }
    }

    target
}

/// Decode bits supplied as a hex string into a big-endian target.
pub fn target_from_bits_hex(text: &str) -> Result<[u8; 32], DifficultyError> {
    parse_bits(text).map(bits_to_target)
}

/// Calculate approximate difficulty from bits.
///
/// Difficulty = max_target / current_target, where max_target is the
/// difficulty-1 target (bits = 0x1d00ffff).
pub fn bits_to_difficulty(bits: u32) -> f64 {
    const DIFFICULTY_ONE_BITS: u32 = 0x1d00ffff;

    let current = target_to_f64(&bits_to_target(bits));
    let one = target_to_f64(&bits_to_target(DIFFICULTY_ONE_BITS));

    if current == 0.0 {
        return f64::INFINITY;
    }

    one / current
}

fn target_to_f64(target: &[u8; 32]) -> f64 {
    target
        .iter()
        .fold(0.0f64, |acc, &byte| acc * 256.0 + byte as f64)
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}
