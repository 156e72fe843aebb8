//! Block template data model.
//!
//! A [`BlockTemplate`] is the validated, immutable form of a
//! `getblocktemplate` response. Hex fields are decoded once, hashes are
//! stored in internal byte order, and the compact bits are kept as
//! delivered so a malformed value surfaces when the header is built.

use serde::Deserialize;
use thiserror::Error;

use crate::coinbase::{commitment_payload, WITNESS_COMMITMENT_SIZE};
use crate::difficulty::{parse_bits, DifficultyError};

/// Template validation errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The response was not a well-formed template object.
    #[error("malformed template: {0}")]
    Json(#[from] serde_json::Error),
    /// A hex field did not decode.
    #[error("field {field}: invalid hex: {reason}")]
    InvalidHex { field: &'static str, reason: String },
    /// A hash or commitment field decoded to the wrong number of bytes.
    #[error("field {field}: expected 32 bytes, got {len}")]
    InvalidLength { field: &'static str, len: usize },
}

/// Compact difficulty bits as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CompactBits {
    /// Already an integer.
    Value(u32),
    /// Hex string, optionally `0x`-prefixed.
    Hex(String),
}

impl CompactBits {
    /// Resolve to the 32-bit compact value.
    pub fn value(&self) -> Result<u32, DifficultyError> {
        match self {
            CompactBits::Value(bits) => Ok(*bits),
            CompactBits::Hex(text) => parse_bits(text),
        }
    }
}

impl From<u32> for CompactBits {
    fn from(bits: u32) -> Self {
        CompactBits::Value(bits)
    }
}

/// A mempool transaction carried by the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTransaction {
    /// Transaction id in internal byte order.
    pub txid: [u8; 32],
    /// Raw serialized transaction.
    pub data: Vec<u8>,
}

/// A validated block template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Block version.
    pub version: u32,
    /// Hash of the previous block (internal byte order).
    pub prev_block_hash: [u8; 32],
    /// Difficulty bits.
    pub bits: CompactBits,
    /// Node's current time, if supplied.
    pub curtime: Option<u32>,
    /// Median time of the past blocks, if supplied.
    pub mediantime: Option<u32>,
    /// Height of the block being built.
    pub height: u64,
    /// Total reward available to the coinbase (subsidy + fees).
    pub coinbase_value: u64,
    /// Witness commitment, if the template carries segwit transactions.
    pub witness_commitment: Option<[u8; WITNESS_COMMITMENT_SIZE]>,
    /// Mempool transactions, in template order.
    pub transactions: Vec<TemplateTransaction>,
}

#[derive(Deserialize)]
struct RawTransaction {
    txid: String,
    data: String,
}

#[derive(Deserialize)]
struct RawBlockTemplate {
    version: u32,
    previousblockhash: String,
    bits: CompactBits,
    curtime: Option<u64>,
    mediantime: Option<u64>,
    height: u64,
    coinbasevalue: u64,
    default_witness_commitment: Option<String>,
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

impl BlockTemplate {
    /// Parse a template from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, TemplateError> {
        let raw: RawBlockTemplate = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Parse a template from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, TemplateError> {
        let raw: RawBlockTemplate = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawBlockTemplate) -> Result<Self, TemplateError> {
        let prev_block_hash = display_hash(&raw.previousblockhash, "previousblockhash")?;

        let witness_commitment = raw
            .default_witness_commitment
            .as_deref()
            .map(decode_commitment)
            .transpose()?;

        let transactions = raw
            .transactions
            .iter()
            .map(|tx| {
                Ok(TemplateTransaction {
                    txid: display_hash(&tx.txid, "transactions.txid")?,
                    data: decode_hex(&tx.data, "transactions.data")?,
                })
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;

        Ok(BlockTemplate {
            version: raw.version,
            prev_block_hash,
            bits: raw.bits,
            curtime: raw.curtime.map(saturate_u32),
            mediantime: raw.mediantime.map(saturate_u32),
            height: raw.height,
            coinbase_value: raw.coinbasevalue,
            witness_commitment,
            transactions,
        })
    }

    /// Number of mempool transactions (the coinbase is not counted).
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Mempool transaction ids in template order (internal byte order).
    pub fn txids(&self) -> Vec<[u8; 32]> {
        self.transactions.iter().map(|tx| tx.txid).collect()
    }

    /// Copy of this template with absent timestamps pinned to `now`.
    ///
    /// The header time of a template without `curtime`/`mediantime`
    /// depends on the clock; a pinned copy rebuilds to the same header
    /// later.
    pub fn pinned_at(&self, now: u32) -> BlockTemplate {
        let mut pinned = self.clone();
        pinned.curtime.get_or_insert(now);
        pinned.mediantime.get_or_insert(now);
        pinned
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn decode_hex(text: &str, field: &'static str) -> Result<Vec<u8>, TemplateError> {
    hex::decode(text).map_err(|e| TemplateError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Decode `default_witness_commitment`, bare or as the full OP_RETURN script.
fn decode_commitment(text: &str) -> Result<[u8; WITNESS_COMMITMENT_SIZE], TemplateError> {
    const FIELD: &str = "default_witness_commitment";
    let bytes = decode_hex(text, FIELD)?;
    commitment_payload(&bytes).ok_or(TemplateError::InvalidLength {
        field: FIELD,
        len: bytes.len(),
    })
}

/// Decode a display-order hash into internal byte order.
fn display_hash(text: &str, field: &'static str) -> Result<[u8; 32], TemplateError> {
    let bytes = decode_hex(text, field)?;
    if bytes.len() != 32 {
        return Err(TemplateError::InvalidLength {
            field,
            len: bytes.len(),
        });
    }

    let mut hash = [0u8; 32];
    for (i, byte) in bytes.iter().rev().enumerate() {
        hash[i] = *byte;
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREV: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    fn sample_json(bits: &str) -> String {
        format!(
            r#"{{
                "version": 536870912,
                "previousblockhash": "{PREV}",
                "bits": {bits},
                "curtime": 1700000000,
                "height": 820000,
                "coinbasevalue": 625000000,
                "transactions": [
                    {{"txid": "{txid}", "data": "0100"}}
                ]
            }}"#,
            txid = "11".repeat(31) + "22",
        )
    }

    #[test]
    fn test_parse_template_with_hex_bits() {
        let template = BlockTemplate::from_json(&sample_json("\"17034219\"")).unwrap();

        assert_eq!(template.version, 0x20000000);
        assert_eq!(template.height, 820000);
        assert_eq!(template.coinbase_value, 625_000_000);
        assert_eq!(template.bits.value().unwrap(), 0x17034219);
        assert_eq!(template.curtime, Some(1_700_000_000));
        assert_eq!(template.mediantime, None);
        assert_eq!(template.witness_commitment, None);

        // Display order reversed into internal order.
        assert_eq!(template.prev_block_hash[0], 0x6f);
        assert_eq!(template.prev_block_hash[31], 0x00);

        assert_eq!(template.tx_count(), 1);
        assert_eq!(template.txids()[0][0], 0x22);
        assert_eq!(template.transactions[0].data, vec![0x01, 0x00]);
    }

    #[test]
    fn test_parse_template_with_integer_bits() {
        let template = BlockTemplate::from_json(&sample_json("486604799")).unwrap();
        assert_eq!(template.bits, CompactBits::Value(0x1d00ffff));
    }

    #[test]
    fn test_malformed_bits_surface_on_resolution() {
        let template = BlockTemplate::from_json(&sample_json("\"xyz\"")).unwrap();
        assert!(matches!(
            template.bits.value(),
            Err(DifficultyError::MalformedDifficulty(_))
        ));
    }

    #[test]
    fn test_rejects_bad_prev_hash() {
        let json = sample_json("\"1d00ffff\"").replace(PREV, "abcd");
        assert!(matches!(
            BlockTemplate::from_json(&json),
            Err(TemplateError::InvalidLength { len: 2, .. })
        ));

        let json = sample_json("\"1d00ffff\"").replace(PREV, &"zz".repeat(32));
        assert!(matches!(
            BlockTemplate::from_json(&json),
            Err(TemplateError::InvalidHex { .. })
        ));
    }

    fn with_commitment(commitment: &str) -> String {
        sample_json("\"1d00ffff\"").replace(
            r#""coinbasevalue": 625000000,"#,
            &format!(r#""coinbasevalue": 625000000, "default_witness_commitment": "{commitment}","#),
        )
    }

    #[test]
    fn test_witness_commitment_bare_or_full_script() {
        let bare = "cd".repeat(32);
        let template = BlockTemplate::from_json(&with_commitment(&bare)).unwrap();
        assert_eq!(template.witness_commitment, Some([0xcd; 32]));

        let full = format!("6a24aa21a9ed{bare}");
        let template = BlockTemplate::from_json(&with_commitment(&full)).unwrap();
        assert_eq!(template.witness_commitment, Some([0xcd; 32]));
    }

    #[test]
    fn test_rejects_oversized_witness_commitment() {
        let json = with_commitment(&"cd".repeat(300));
        assert!(matches!(
            BlockTemplate::from_json(&json),
            Err(TemplateError::InvalidLength { len: 300, .. })
        ));

        let json = with_commitment(&"cd".repeat(31));
        assert!(matches!(
            BlockTemplate::from_json(&json),
            Err(TemplateError::InvalidLength { len: 31, .. })
        ));
    }

    #[test]
    fn test_pinned_at_fills_only_missing_times() {
        let template = BlockTemplate::from_json(&sample_json("\"1d00ffff\"")).unwrap();
        let pinned = template.pinned_at(1_700_000_500);

        assert_eq!(pinned.curtime, Some(1_700_000_000));
        assert_eq!(pinned.mediantime, Some(1_700_000_500));
        // The original is untouched.
        assert_eq!(template.mediantime, None);
    }
}
