//! Coinbase transaction construction.
//!
//! The coinbase is the first transaction of the block. It claims the
//! template's coinbase value for the payout address and, for segwit
//! templates, carries the witness commitment.

use crate::address::{decode_address, AddressClass, AddressError, DecodedAddress};
use crate::hash::double_sha256;
use crate::varint::encode_varint;

/// Header bytes that prefix a witness commitment inside its OP_RETURN output.
pub const WITNESS_COMMITMENT_HEADER: [u8; 4] = [0xaa, 0x21, 0xa9, 0xed];

/// Size of the commitment payload following the header.
pub const WITNESS_COMMITMENT_SIZE: usize = 32;

const OP_0: u8 = 0x00;
const OP_RETURN: u8 = 0x6a;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

/// Builder for the coinbase transaction of a template.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    /// The address receiving the block reward.
    payout: DecodedAddress,
    /// Extra nonce appended to the scriptSig after the height push.
    extra_nonce: [u8; 2],
}

impl CoinbaseBuilder {
    /// Create a builder paying to an already decoded address.
    pub fn new(payout: DecodedAddress) -> Self {
        CoinbaseBuilder {
            payout,
            extra_nonce: [0u8; 2],
        }
    }

    /// Decode `address` and create a builder paying to it.
    pub fn for_address(address: &str) -> Result<Self, AddressError> {
        decode_address(address).map(Self::new)
    }

    /// Set the extra nonce.
    pub fn with_extra_nonce(mut self, extra_nonce: [u8; 2]) -> Self {
        self.extra_nonce = extra_nonce;
        self
    }

    /// The payout address.
    pub fn payout(&self) -> &DecodedAddress {
        &self.payout
    }

    /// Build the coinbase for a block at `height` claiming `value` satoshis.
    pub fn build(
        &self,
        height: u64,
        value: u64,
        witness_commitment: Option<&[u8; WITNESS_COMMITMENT_SIZE]>,
    ) -> CoinbaseTransaction {
        let script_sig = self.script_sig(height);

        let mut outputs = Vec::with_capacity(2);
        outputs.push(TxOutput {
            value,
            script_pubkey: output_script(&self.payout),
        });
        if let Some(commitment) = witness_commitment {
            outputs.push(TxOutput {
                value: 0,
                script_pubkey: witness_commitment_script(commitment),
            });
        }

        let raw_tx = serialize_transaction(&script_sig, &outputs, false);
        let txid = double_sha256(&raw_tx);
        let raw_tx_with_witness = witness_commitment
            .map(|_| serialize_transaction(&script_sig, &outputs, true));

        CoinbaseTransaction {
            raw_tx,
            raw_tx_with_witness,
            txid,
        }
    }

    /// scriptSig: height push, then the extra nonce.
    fn script_sig(&self, height: u64) -> Vec<u8> {
        let height_bytes = encode_block_height(height);

        let mut script_sig = Vec::with_capacity(1 + height_bytes.len() + self.extra_nonce.len());
        script_sig.push(height_bytes.len() as u8);
        script_sig.extend_from_slice(&height_bytes);
        script_sig.extend_from_slice(&self.extra_nonce);
        script_sig
    }
}

/// A constructed coinbase transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    /// Raw transaction without witness (hashed for the txid).
    pub raw_tx: Vec<u8>,
    /// Raw transaction with the coinbase witness, present when the block
    /// commits to witness data.
    pub raw_tx_with_witness: Option<Vec<u8>>,
    /// Transaction id in internal byte order.
    pub txid: [u8; 32],
}

impl CoinbaseTransaction {
    /// The serialization that goes into the block.
    pub fn block_bytes(&self) -> &[u8] {
        self.raw_tx_with_witness.as_deref().unwrap_or(&self.raw_tx)
    }
}

struct TxOutput {
    value: u64,
    script_pubkey: Vec<u8>,
}

/// Output script paying to a decoded address.
pub fn output_script(address: &DecodedAddress) -> Vec<u8> {
    let hash = &address.pubkey_hash;
    match address.class {
        AddressClass::P2PKH => {
            let mut script = Vec::with_capacity(25);
            script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
            script.extend_from_slice(hash);
            script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            script
        }
        AddressClass::P2SH => {
            let mut script = Vec::with_capacity(23);
            script.extend_from_slice(&[OP_HASH160, PUSH_20]);
            script.extend_from_slice(hash);
            script.push(OP_EQUAL);
            script
        }
        AddressClass::P2WPKH => {
            let mut script = Vec::with_capacity(22);
            script.extend_from_slice(&[OP_0, PUSH_20]);
            script.extend_from_slice(hash);
            script
        }
    }
}

/// Extract the 32-byte commitment from either the bare payload or the
/// complete script a node reports as `default_witness_commitment`.
///
/// Returns `None` for anything else.
pub fn commitment_payload(commitment: &[u8]) -> Option<[u8; WITNESS_COMMITMENT_SIZE]> {
    let script = commitment_script_prefix();
    let payload = commitment.strip_prefix(&script[..]).unwrap_or(commitment);
    payload.try_into().ok()
}

/// OP_RETURN script carrying a witness commitment.
pub fn witness_commitment_script(commitment: &[u8; WITNESS_COMMITMENT_SIZE]) -> Vec<u8> {
    let prefix = commitment_script_prefix();

    let mut script = Vec::with_capacity(prefix.len() + WITNESS_COMMITMENT_SIZE);
    script.extend_from_slice(&prefix);
    script.extend_from_slice(commitment);
    script
}

fn commitment_script_prefix() -> [u8; 6] {
    let mut prefix = [0u8; 6];
    prefix[0] = OP_RETURN;
    prefix[1] = (WITNESS_COMMITMENT_HEADER.len() + WITNESS_COMMITMENT_SIZE) as u8;
    prefix[2..].copy_from_slice(&WITNESS_COMMITMENT_HEADER);
    prefix
}

fn serialize_transaction(script_sig: &[u8], outputs: &[TxOutput], with_witness: bool) -> Vec<u8> {
    let mut tx = Vec::with_capacity(200);

    // Version 2
    tx.extend_from_slice(&2u32.to_le_bytes());

    if with_witness {
        tx.push(0x00); // Marker
        tx.push(0x01); // Flag
    }

    // One input spending the null outpoint.
    tx.push(0x01);
    tx.extend_from_slice(&[0u8; 32]);
    tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    encode_varint(script_sig.len() as u64, &mut tx);
    tx.extend_from_slice(script_sig);
    tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

    encode_varint(outputs.len() as u64, &mut tx);
    for output in outputs {
        tx.extend_from_slice(&output.value.to_le_bytes());
        encode_varint(output.script_pubkey.len() as u64, &mut tx);
        tx.extend_from_slice(&output.script_pubkey);
    }

    if with_witness {
        // One stack item: the 32-byte witness reserved value.
        tx.push(0x01);
        tx.push(0x20);
        tx.extend_from_slice(&[0u8; 32]);
    }

    // Locktime
    tx.extend_from_slice(&0u32.to_le_bytes());

    tx
}

/// Encode a block height as the minimal little-endian script number.
///
/// A 0x00 byte is appended when the top bit of the last byte is set so
/// the number is not read as negative.
pub fn encode_block_height(height: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut n = height;

    while n > 0 {
        bytes.push((n & 0xFF) as u8);
        n >>= 8;
    }

    if let Some(&last) = bytes.last() {
        if last & 0x80 != 0 {
            bytes.push(0x00);
        }
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    #[test]
    fn test_encode_block_height() {
        assert_eq!(encode_block_height(0), Vec::<u8>::new());
        assert_eq!(encode_block_height(1), vec![0x01]);
        assert_eq!(encode_block_height(127), vec![0x7F]);
        assert_eq!(encode_block_height(128), vec![0x80, 0x00]);
        assert_eq!(encode_block_height(256), vec![0x00, 0x01]);
        assert_eq!(encode_block_height(500000), vec![0x20, 0xA1, 0x07]);
    }

    #[test]
    fn test_output_scripts_by_class() {
        let p2pkh = decode_address(GENESIS_ADDRESS).unwrap();
        let script = output_script(&p2pkh);
        assert_eq!(script.len(), 25);
        assert_eq!(&script[..3], &[0x76, 0xa9, 0x14]);
        assert_eq!(&script[23..], &[0x88, 0xac]);

        let p2sh = decode_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy").unwrap();
        let script = output_script(&p2sh);
        assert_eq!(script.len(), 23);
        assert_eq!(&script[..2], &[0xa9, 0x14]);
        assert_eq!(script[22], 0x87);

        let p2wpkh = decode_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap();
        assert_eq!(
            hex::encode(output_script(&p2wpkh)),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_for_address_rejects_unsupported() {
        assert!(matches!(
            CoinbaseBuilder::for_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"),
            Err(AddressError::UnsupportedAddress(_))
        ));
    }

    #[test]
    fn test_coinbase_bytes_height_one() {
        let builder = CoinbaseBuilder::for_address(GENESIS_ADDRESS).unwrap();
        let coinbase = builder.build(1, 5_000_000_000, None);

        let expected = "02000000\
            01\
            0000000000000000000000000000000000000000000000000000000000000000ffffffff\
            04010100 00\
            ffffffff\
            01\
            00f2052a01000000\
            1976a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac\
            00000000"
            .replace(' ', "");
        assert_eq!(hex::encode(&coinbase.raw_tx), expected);
        assert_eq!(coinbase.raw_tx_with_witness, None);
        assert_eq!(coinbase.block_bytes(), coinbase.raw_tx.as_slice());
        assert_eq!(coinbase.txid, double_sha256(&coinbase.raw_tx));
    }

    #[test]
    fn test_extra_nonce_lands_after_height() {
        let builder = CoinbaseBuilder::for_address(GENESIS_ADDRESS)
            .unwrap()
            .with_extra_nonce([0xbe, 0xef]);
        let coinbase = builder.build(500000, 1, None);

        // scriptSig length, push 3, height, extra nonce
        assert_eq!(&coinbase.raw_tx[41..47], &[0x06, 0x03, 0x20, 0xa1, 0x07, 0xbe]);
        assert_eq!(coinbase.raw_tx[47], 0xef);
    }

    #[test]
    fn test_witness_commitment_output() {
        let builder = CoinbaseBuilder::for_address(GENESIS_ADDRESS).unwrap();
        let commitment = [0xab; 32];
        let coinbase = builder.build(840000, 312_500_000, Some(&commitment));

        let script = witness_commitment_script(&commitment);
        assert_eq!(script.len(), 38);
        assert_eq!(&script[..6], &[0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed]);

        // Second output: zero value followed by the commitment script.
        let tail = &coinbase.raw_tx[coinbase.raw_tx.len() - 4 - 38 - 1 - 8..];
        assert_eq!(&tail[..8], &[0u8; 8]);
        assert_eq!(tail[8], 38);
        assert_eq!(&tail[9..47], script.as_slice());

        // The witness form carries marker, flag and the reserved value,
        // but the txid is still taken over the stripped form.
        let with_witness = coinbase.raw_tx_with_witness.as_ref().unwrap();
        assert_eq!(&with_witness[4..6], &[0x00, 0x01]);
        assert_eq!(with_witness.len(), coinbase.raw_tx.len() + 2 + 34);
        assert_eq!(coinbase.block_bytes(), with_witness.as_slice());
        assert_eq!(coinbase.txid, double_sha256(&coinbase.raw_tx));
    }

    #[test]
    fn test_commitment_payload_accepts_bare_and_full_script() {
        let bare = [0x5a; 32];
        let full = witness_commitment_script(&bare);
        assert_eq!(commitment_payload(&bare), Some(bare));
        assert_eq!(commitment_payload(&full), Some(bare));
    }

    #[test]
    fn test_commitment_payload_rejects_other_lengths() {
        assert_eq!(commitment_payload(&[0x5a; 31]), None);
        assert_eq!(commitment_payload(&[0x5a; 33]), None);
        assert_eq!(commitment_payload(&[0x5a; 300]), None);
        assert_eq!(commitment_payload(&[]), None);

        // A full-script prefix followed by the wrong payload length.
        let mut truncated = witness_commitment_script(&[0x5a; 32]);
        truncated.pop();
        assert_eq!(commitment_payload(&truncated), None);
    }
}
