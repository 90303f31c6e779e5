//! Inclusion proofs: generation from a built tree and stateless verification.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::common::{hash_sorted_pair, hex_encode, parse_hash, Hash};
use crate::error::{DistributionError, Result};
use crate::leaf;
use crate::record::{parse_amount, Address, Record};
use crate::tree::MerkleTree;

/// Sibling hashes from leaf level to root (bottom-up).
///
/// Positions are implicit: siblings are combined with the sorted-pair rule, so
/// levels where the path node was carried up contribute no element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proof {
    pub siblings: Vec<Hash>,
}

impl Proof {
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }
}

/// Generates a proof for the leaf at `leaf_index` in canonical order.
pub fn prove_index(tree: &MerkleTree, leaf_index: usize) -> Result<Proof> {
    if leaf_index >= tree.len() {
        return Err(DistributionError::LeafNotFound(format!(
            "leaf index {} is out of bounds for tree with {} leaves",
            leaf_index,
            tree.len()
        )));
    }

    let levels = tree.levels();
    let mut siblings = Vec::with_capacity(levels.len() - 1);
    let mut current_index = leaf_index;

    for level in &levels[..levels.len() - 1] {
        let sibling_index = current_index ^ 1;
        // A missing sibling means this node was carried up unchanged.
        if let Some(sibling) = level.get(sibling_index) {
            siblings.push(*sibling);
        }
        current_index /= 2;
    }

    Ok(Proof { siblings })
}

/// Generates a proof for `target`.
///
/// When the tree holds duplicate copies of `target`, the first copy in
/// canonical order is proven; identical records share a leaf, so the proof is
/// valid for any of them.
pub fn prove(tree: &MerkleTree, target: &Record) -> Result<Proof> {
    let leaf = leaf::encode(target);
    let index = tree
        .position(&leaf)
        .ok_or_else(|| DistributionError::LeafNotFound(target.address.to_string()))?;
    prove_index(tree, index)
}

/// Locates the single entitlement for `address`.
///
/// Fails with `AmbiguousLeaf` when the address holds more than one distinct
/// amount; exact duplicates resolve to their first copy.
pub fn find_record(tree: &MerkleTree, address: &Address) -> Result<(usize, Record)> {
    let positions = tree.positions_of(address);
    let first = *positions
        .first()
        .ok_or_else(|| DistributionError::LeafNotFound(address.to_string()))?;
    let record = tree.records()[first];
    if positions
        .iter()
        .any(|&index| tree.records()[index].amount != record.amount)
    {
        return Err(DistributionError::AmbiguousLeaf(address.to_string()));
    }
    Ok((first, record))
}

/// Recomputes the root from `leaf` and `proof` and compares it to `root`.
///
/// On-chain verification must use the identical sorted-pair rule.
pub fn verify(leaf: &Hash, proof: &Proof, root: &Hash) -> bool {
    let computed = proof
        .siblings
        .iter()
        .fold(*leaf, |current, sibling| hash_sorted_pair(current, *sibling));
    computed == *root
}

/// Self-contained claim proof as written by the CLI and handed to the claim
/// submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimProof {
    pub merkle_root: String,
    pub account: Address,
    /// Decimal base-unit amount.
    pub amount: String,
    pub leaf_index: usize,
    pub merkle_proof: Vec<String>,
}

impl ClaimProof {
    pub fn new(root: Hash, leaf_index: usize, record: &Record, proof: &Proof) -> Self {
        Self {
            merkle_root: hex_encode(root),
            account: record.address,
            amount: record.amount.to_string(),
            leaf_index,
            merkle_proof: proof.siblings.iter().map(hex_encode).collect(),
        }
    }

    pub fn record(&self) -> Result<Record> {
        Record::new(self.account, self.amount()?)
    }

    pub fn amount(&self) -> Result<U256> {
        parse_amount(&self.amount)
    }

    pub fn proof(&self) -> anyhow::Result<Proof> {
        let siblings = self
            .merkle_proof
            .iter()
            .map(|h| parse_hash(h))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Proof { siblings })
    }

    pub fn root(&self) -> anyhow::Result<Hash> {
        parse_hash(&self.merkle_root)
    }

    /// Verifies the proof against `root`, or against its own root when `None`.
    pub fn verify(&self, root: Option<Hash>) -> anyhow::Result<bool> {
        let root = match root {
            Some(root) => root,
            None => self.root()?,
        };
        let leaf = leaf::encode(&self.record()?);
        Ok(verify(&leaf, &self.proof()?, &root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8, amount: u64) -> Record {
        Record::new(Address::from_bytes([byte; 20]), U256::from(amount)).unwrap()
    }

    fn ceil_log2(n: usize) -> usize {
        n.next_power_of_two().trailing_zeros() as usize
    }

    #[test]
    fn test_single_leaf_proof_is_empty() {
        let r = record(1, 100);
        let tree = MerkleTree::build(&[r]).unwrap();
        let proof = prove(&tree, &r).unwrap();
        assert!(proof.is_empty());
        assert!(verify(&leaf::encode(&r), &proof, &tree.root()));
    }

    #[test]
    fn test_two_leaf_example() {
        let a = Record::parse("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1", "100").unwrap();
        let b = Record::parse("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2", "100").unwrap();
        let tree = MerkleTree::build(&[a, b]).unwrap();
        let root = tree.root();

        let proof = prove(&tree, &a).unwrap();
        assert_eq!(proof.siblings, vec![leaf::encode(&b)]);
        assert!(verify(&leaf::encode(&a), &proof, &root));

        let mut other_root = root;
        other_root[0] ^= 1;
        assert!(!verify(&leaf::encode(&a), &proof, &other_root));
    }

    #[test]
    fn test_every_record_verifies() {
        for size in 1..=17u8 {
            let records: Vec<_> = (1..=size).map(|i| record(i, i as u64 * 10)).collect();
            let tree = MerkleTree::build(&records).unwrap();
            for r in &records {
                let proof = prove(&tree, r).unwrap();
                assert!(proof.len() <= ceil_log2(size as usize));
                assert!(verify(&leaf::encode(r), &proof, &tree.root()), "size {size}");
            }
        }
    }

    #[test]
    fn test_carried_leaf_has_shorter_proof() {
        let records: Vec<_> = (1..=3u8).map(|i| record(i, 1)).collect();
        let tree = MerkleTree::build(&records).unwrap();
        assert_eq!(prove_index(&tree, 0).unwrap().len(), 2);
        assert_eq!(prove_index(&tree, 1).unwrap().len(), 2);
        assert_eq!(prove_index(&tree, 2).unwrap().len(), 1);

        let records: Vec<_> = (1..=5u8).map(|i| record(i, 1)).collect();
        let tree = MerkleTree::build(&records).unwrap();
        assert_eq!(prove_index(&tree, 0).unwrap().len(), 3);
        assert_eq!(prove_index(&tree, 4).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_record() {
        let tree = MerkleTree::build(&[record(1, 10)]).unwrap();
        assert!(matches!(
            prove(&tree, &record(1, 11)),
            Err(DistributionError::LeafNotFound(_))
        ));
        assert!(matches!(
            prove_index(&tree, 1),
            Err(DistributionError::LeafNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_records_provable() {
        let r = record(9, 90);
        let tree = MerkleTree::build(&[r, record(8, 80), r]).unwrap();
        let leaf = leaf::encode(&r);
        for index in tree.positions_of(&r.address) {
            let proof = prove_index(&tree, index).unwrap();
            assert!(verify(&leaf, &proof, &tree.root()));
        }
        assert!(verify(&leaf, &prove(&tree, &r).unwrap(), &tree.root()));
        assert_eq!(find_record(&tree, &r.address).unwrap().1, r);
    }

    #[test]
    fn test_find_record_ambiguous() {
        let tree = MerkleTree::build(&[record(9, 90), record(9, 91)]).unwrap();
        assert!(matches!(
            find_record(&tree, &Address::from_bytes([9; 20])),
            Err(DistributionError::AmbiguousLeaf(_))
        ));
        assert!(matches!(
            find_record(&tree, &Address::from_bytes([7; 20])),
            Err(DistributionError::LeafNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_leaf_fails() {
        let tree = MerkleTree::build(&[record(1, 10), record(2, 20)]).unwrap();
        let proof = prove(&tree, &record(1, 10)).unwrap();
        assert!(!verify(&leaf::encode(&record(1, 11)), &proof, &tree.root()));
    }

    #[test]
    fn test_claim_proof_json() {
        let records: Vec<_> = (1..=4u8).map(|i| record(i, 500)).collect();
        let tree = MerkleTree::build(&records).unwrap();
        let (index, r) = find_record(&tree, &records[2].address).unwrap();
        let claim = ClaimProof::new(tree.root(), index, &r, &prove_index(&tree, index).unwrap());

        let json = serde_json::to_string(&claim).unwrap();
        assert!(json.contains("\"merkleRoot\""));
        let parsed: ClaimProof = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, claim);
        assert!(parsed.verify(None).unwrap());
        assert!(!parsed.verify(Some([0u8; 32])).unwrap());
    }
}
