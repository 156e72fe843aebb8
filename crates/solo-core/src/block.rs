//! Block header construction and full block assembly.

use thiserror::Error;

use crate::address::AddressError;
use crate::coinbase::{CoinbaseBuilder, CoinbaseTransaction};
use crate::difficulty::DifficultyError;
use crate::merkle::block_merkle_root;
use crate::template::BlockTemplate;
use crate::varint::encode_varint;

/// Size of a header without its nonce.
pub const HEADER_PRENONCE_SIZE: usize = 76;

/// Size of a complete block header.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Maximum distance, in seconds, between the header time and the
/// reference time.
pub const MAX_TIME_OFFSET: i64 = 7200;

/// Errors that abort building a header or block for a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// A 76-byte header together with the coinbase it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateHeader {
    /// Header bytes without the nonce.
    pub bytes: [u8; HEADER_PRENONCE_SIZE],
    /// The coinbase whose txid is the first merkle leaf.
    pub coinbase: CoinbaseTransaction,
}

impl CandidateHeader {
    /// The 80-byte header for `nonce`.
    pub fn with_nonce(&self, nonce: u32) -> [u8; BLOCK_HEADER_SIZE] {
        header_with_nonce(&self.bytes, nonce)
    }
}

/// Builds headers for templates, paying the coinbase to one address.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    coinbase: CoinbaseBuilder,
}

impl HeaderBuilder {
    /// Create a header builder around a coinbase builder.
    pub fn new(coinbase: CoinbaseBuilder) -> Self {
        HeaderBuilder { coinbase }
    }

    /// Create a header builder paying to `address`.
    pub fn for_address(address: &str) -> Result<Self, BuildError> {
        Ok(Self::new(CoinbaseBuilder::for_address(address)?))
    }

    /// The coinbase builder in use.
    pub fn coinbase_builder(&self) -> &CoinbaseBuilder {
        &self.coinbase
    }

    /// Build the coinbase transaction for `template`.
    pub fn coinbase(&self, template: &BlockTemplate) -> CoinbaseTransaction {
        self.coinbase.build(
            template.height,
            template.coinbase_value,
            template.witness_commitment.as_ref(),
        )
    }

    /// Build the 76-byte pre-nonce header for `template`.
    ///
    /// `now` stands in for the template's `curtime` and `mediantime`
    /// when the node did not supply them.
    pub fn build(&self, template: &BlockTemplate, now: u32) -> Result<CandidateHeader, BuildError> {
        let bits = template.bits.value()?;
        let coinbase = self.coinbase(template);
        let merkle_root = block_merkle_root(coinbase.txid, &template.txids());
        let time = corrected_time(template.curtime, template.mediantime, now);

        let mut bytes = [0u8; HEADER_PRENONCE_SIZE];
        bytes[0..4].copy_from_slice(&template.version.to_le_bytes());
        bytes[4..36].copy_from_slice(&template.prev_block_hash);
        bytes[36..68].copy_from_slice(&merkle_root);
        bytes[68..72].copy_from_slice(&time.to_le_bytes());
        bytes[72..76].copy_from_slice(&bits.to_le_bytes());

        Ok(CandidateHeader { bytes, coinbase })
    }
}

/// Header time: `curtime` clamped to within [`MAX_TIME_OFFSET`] of the
/// median time, each falling back to `now` when absent.
pub fn corrected_time(curtime: Option<u32>, mediantime: Option<u32>, now: u32) -> u32 {
    let current = i64::from(curtime.unwrap_or(now));
    let reference = i64::from(mediantime.unwrap_or(now));

    let clamped = current.clamp(reference - MAX_TIME_OFFSET, reference + MAX_TIME_OFFSET);
    clamped.clamp(0, i64::from(u32::MAX)) as u32
}

/// Append `nonce` (little-endian) to a pre-nonce header.
pub fn header_with_nonce(header: &[u8; HEADER_PRENONCE_SIZE], nonce: u32) -> [u8; BLOCK_HEADER_SIZE] {
    let mut full = [0u8; BLOCK_HEADER_SIZE];
    full[..HEADER_PRENONCE_SIZE].copy_from_slice(header);
    full[HEADER_PRENONCE_SIZE..].copy_from_slice(&nonce.to_le_bytes());
    full
}

/// Serialize a complete block for submission.
///
/// Header, transaction count, coinbase, then the template's raw
/// transactions in order. No validation is performed.
pub fn assemble_block(
    header: &[u8; BLOCK_HEADER_SIZE],
    coinbase: &CoinbaseTransaction,
    template: &BlockTemplate,
) -> Vec<u8> {
    let coinbase_bytes = coinbase.block_bytes();
    let tx_bytes: usize = template.transactions.iter().map(|tx| tx.data.len()).sum();

    let mut block = Vec::with_capacity(BLOCK_HEADER_SIZE + 9 + coinbase_bytes.len() + tx_bytes);
    block.extend_from_slice(header);
    encode_varint(1 + template.tx_count() as u64, &mut block);
    block.extend_from_slice(coinbase_bytes);
    for tx in &template.transactions {
        block.extend_from_slice(&tx.data);
    }

    block
}
