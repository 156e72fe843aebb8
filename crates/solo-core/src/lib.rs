//! Bitcoin wire encoding for the solo miner.
//!
//! This crate provides pure Rust implementations of:
//! - Compact difficulty bits and target conversion
//! - Payout address decoding (P2PKH, P2SH, P2WPKH)
//! - Coinbase transaction building with BIP34 height commitment
//! - Merkle root computation
//! - Block header construction and full block assembly
//!
//! Nothing in here touches the network or the clock; callers pass in
//! templates and timestamps.

pub mod address;
pub mod block;
pub mod coinbase;
pub mod difficulty;
pub mod hash;
pub mod merkle;
pub mod template;
pub mod varint;

pub use address::{decode_address, AddressClass, AddressError, DecodedAddress};
pub use block::{
    assemble_block, corrected_time, header_with_nonce, BuildError, CandidateHeader,
    HeaderBuilder, BLOCK_HEADER_SIZE, HEADER_PRENONCE_SIZE,
};
pub use coinbase::{CoinbaseBuilder, CoinbaseTransaction};
pub use difficulty::{
    bits_to_difficulty, bits_to_target, format_difficulty, parse_bits, target_from_bits_hex,
    DifficultyError,
};
pub use hash::{double_sha256, hash_below_target, hash_to_display_hex};
pub use merkle::{block_merkle_root, compute_merkle_root};
pub use template::{BlockTemplate, CompactBits, TemplateError, TemplateTransaction};
pub use varint::{encode_varint, varint};
