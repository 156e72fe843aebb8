//! Merkle root computation.

use crate::hash::double_sha256;

/// Compute the merkle root from leaves in internal byte order.
///
/// A single leaf is its own root. On every level with an odd number of
/// nodes the last node is paired with itself.
pub fn compute_merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<[u8; 32]> = leaves.to_vec();

    while current_level.len() > 1 {
        if current_level.len() % 2 == 1 {
            let last = current_level[current_level.len() - 1];
            current_level.push(last);
        }

        current_level = current_level
            .chunks_exact(2)
            .map(|pair| {
                let mut combined = [0u8; 64];
                combined[..32].copy_from_slice(&pair[0]);
                combined[32..].copy_from_slice(&pair[1]);
                double_sha256(&combined)
            })
            .collect();
    }

    current_level[0]
}

/// Merkle root of a block: the coinbase txid first, then the template's
/// transaction ids in order.
pub fn block_merkle_root(coinbase_txid: [u8; 32], txids: &[[u8; 32]]) -> [u8; 32] {
    let mut leaves = Vec::with_capacity(1 + txids.len());
    leaves.push(coinbase_txid);
    leaves.extend_from_slice(txids);
    compute_merkle_root(&leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(left);
        combined[32..].copy_from_slice(right);
        double_sha256(&combined)
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(compute_merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn test_single_leaf_unchanged() {
        let txid = [0x42u8; 32];
        assert_eq!(compute_merkle_root(&[txid]), txid);
        assert_eq!(block_merkle_root(txid, &[]), txid);
    }

    #[test]
    fn test_two_leaves() {
        let tx1 = [0x11u8; 32];
        let tx2 = [0x22u8; 32];
        assert_eq!(compute_merkle_root(&[tx1, tx2]), hash_pair(&tx1, &tx2));
    }

    #[test]
    fn test_three_leaves_duplicates_last() {
        let tx1 = [0x11u8; 32];
        let tx2 = [0x22u8; 32];
        let tx3 = [0x33u8; 32];

        let h12 = hash_pair(&tx1, &tx2);
        let h33 = hash_pair(&tx3, &tx3);
        let expected = hash_pair(&h12, &h33);

        assert_eq!(compute_merkle_root(&[tx1, tx2, tx3]), expected);
        assert_eq!(block_merkle_root(tx1, &[tx2, tx3]), expected);
    }

    #[test]
    fn test_five_leaves_duplicates_on_each_odd_level() {
        let leaves: Vec<[u8; 32]> = (1..=5u8).map(|b| [b; 32]).collect();

        let a = hash_pair(&leaves[0], &leaves[1]);
        let b = hash_pair(&leaves[2], &leaves[3]);
        let c = hash_pair(&leaves[4], &leaves[4]);
        let ab = hash_pair(&a, &b);
        let cc = hash_pair(&c, &c);
        let expected = hash_pair(&ab, &cc);

        assert_eq!(compute_merkle_root(&leaves), expected);
    }

    #[test]
    fn test_known_block_root() {
        // Block 100000: four transactions.
        let txids = [
            "8c14f0db3df150123e6f3dbbf30f8b955a8249b62ac1d1ff16284aefa3d06d87",
            "fff2525b8931402dd09222c50775608f75787bd2b87e56995a7bdd30f79702c4",
            "6359f0868171b1d194cbee1af2f16ea598ae8fad666d9b012c8ed2b79a236ec4",
            "e9a66845e05d5abc0ad04ec80f774a7e585c6e8db975962d069a522137b80c1d",
        ];
        let leaves: Vec<[u8; 32]> = txids
            .iter()
            .map(|t| {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&hex::decode(t).unwrap());
                bytes.reverse();
                bytes
            })
            .collect();

        let mut root = compute_merkle_root(&leaves);
        root.reverse();
        assert_eq!(
            hex::encode(root),
            "f3e94742aca4b5ef85488dc37c06c3282295ffec960994b2c0d5ac2a25a95766"
        );
    }
}
