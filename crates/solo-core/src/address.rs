//! Payout address decoding.
//!
//! Supports the three mainnet forms a coinbase can pay to:
//! - P2PKH - legacy base58check addresses starting with `1`
//! - P2SH - base58check addresses starting with `3`
//! - P2WPKH - native SegWit v0 bech32 addresses starting with `bc1q`
//!   carrying a 20-byte program
//!
//! Anything else (testnet prefixes, P2WSH, Taproot) is rejected as
//! unsupported.

use bech32::Variant;
use thiserror::Error;

/// Length of a public-key (or script) hash.
pub const PUBKEY_HASH_LEN: usize = 20;

const P2PKH_VERSION: u8 = 0x00;
const P2SH_VERSION: u8 = 0x05;
const SEGWIT_HRP: &str = "bc";

/// Address decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address has a supported prefix but does not decode
    /// (bad character, bad checksum, wrong payload length).
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    /// The address prefix or witness program is not one we can pay to.
    #[error("unsupported address {0:?}")]
    UnsupportedAddress(String),
}

impl AddressError {
    fn invalid(address: &str, reason: impl Into<String>) -> Self {
        AddressError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Address class, used to select the output script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    /// Legacy P2PKH: OP_DUP OP_HASH160 <20-byte-hash> OP_EQUALVERIFY OP_CHECKSIG
    P2PKH,
    /// P2SH: OP_HASH160 <20-byte-hash> OP_EQUAL
    P2SH,
    /// Native SegWit v0 P2WPKH: OP_0 <20-byte-hash>
    P2WPKH,
}

impl AddressClass {
    /// Get the display name for this address class.
    pub fn name(&self) -> &'static str {
        match self {
            AddressClass::P2PKH => "P2PKH",
            AddressClass::P2SH => "P2SH",
            AddressClass::P2WPKH => "P2WPKH",
        }
    }
}

/// A decoded payout address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    /// The address class.
    pub class: AddressClass,
    /// The 20-byte public-key hash (or script hash for P2SH).
    pub pubkey_hash: [u8; PUBKEY_HASH_LEN],
    /// The original address string.
    pub display: String,
}

/// Decode an address into its class and 20-byte hash.
pub fn decode_address(address: &str) -> Result<DecodedAddress, AddressError> {
    let trimmed = address.trim();

    if trimmed.to_ascii_lowercase().starts_with("bc1q") {
        return decode_segwit_v0(trimmed);
    }

    match trimmed.chars().next() {
        Some('1') => decode_base58(trimmed, AddressClass::P2PKH, P2PKH_VERSION),
        Some('3') => decode_base58(trimmed, AddressClass::P2SH, P2SH_VERSION),
        _ => Err(AddressError::UnsupportedAddress(trimmed.to_string())),
    }
}

/// Decode a base58check address (P2PKH or P2SH).
fn decode_base58(
    address: &str,
    class: AddressClass,
    expected_version: u8,
) -> Result<DecodedAddress, AddressError> {
    // Verifies and strips the 4-byte checksum; the version byte stays.
    let payload = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::invalid(address, e.to_string()))?;

    if payload.len() != 1 + PUBKEY_HASH_LEN {
        return Err(AddressError::invalid(
            address,
            format!("payload is {} bytes, expected 21", payload.len()),
        ));
    }

    if payload[0] != expected_version {
        return Err(AddressError::invalid(
            address,
            format!("unexpected version byte {:#04x}", payload[0]),
        ));
    }

    let mut pubkey_hash = [0u8; PUBKEY_HASH_LEN];
    pubkey_hash.copy_from_slice(&payload[1..1 + PUBKEY_HASH_LEN]);

    Ok(DecodedAddress {
        class,
        pubkey_hash,
        display: address.to_string(),
    })
}

/// Decode a bech32 SegWit v0 address with a 20-byte program.
fn decode_segwit_v0(address: &str) -> Result<DecodedAddress, AddressError> {
    let (hrp, data, variant) =
        bech32::decode(address).map_err(|e| AddressError::invalid(address, e.to_string()))?;

    if hrp != SEGWIT_HRP {
        return Err(AddressError::UnsupportedAddress(address.to_string()));
    }

    if variant != Variant::Bech32 {
        return Err(AddressError::invalid(address, "SegWit v0 must use bech32"));
    }

    let (version, groups) = data
        .split_first()
        .ok_or_else(|| AddressError::invalid(address, "empty data part"))?;

    if version.to_u8() != 0 {
        return Err(AddressError::UnsupportedAddress(address.to_string()));
    }

    let groups: Vec<u8> = groups.iter().map(|g| g.to_u8()).collect();
    let program = regroup_5_to_8(&groups);

    if program.len() < PUBKEY_HASH_LEN {
        return Err(AddressError::invalid(
            address,
            format!("witness program is {} bytes", program.len()),
        ));
    }
    if program.len() != PUBKEY_HASH_LEN {
        // 32-byte v0 programs are P2WSH.
        return Err(AddressError::UnsupportedAddress(address.to_string()));
    }

    let mut pubkey_hash = [0u8; PUBKEY_HASH_LEN];
    pubkey_hash.copy_from_slice(&program[..PUBKEY_HASH_LEN]);

    Ok(DecodedAddress {
        class: AddressClass::P2WPKH,
        pubkey_hash,
        display: address.to_string(),
    })
}

/// Pack 5-bit groups into bytes, most significant bit first.
///
/// A trailing remainder of fewer than 8 bits is discarded.
fn regroup_5_to_8(groups: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(groups.len() * 5 / 8);

    for &group in groups {
        acc = (acc << 5) | (group & 0x1f) as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
        acc &= (1 << bits) - 1;
    }

    out
}
