//! Binary Merkle tree over entitlement records.
//!
//! Leaves are sorted byte-lexicographically before construction and each
//! parent is `keccak256(min(l, r) || max(l, r))`. A level with an odd node
//! count carries its last node up unchanged. The root is therefore a pure
//! function of the record set, independent of input order.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::common::{hash_sorted_pair, hex_encode, parse_hash, Hash};
use crate::error::{DistributionError, Result};
use crate::leaf;
use crate::record::{Address, Record};

/// Format tag written into every serialized tree.
pub const TREE_FORMAT: &str = "keccak-sorted-pair-v1";

/// Solidity types of the leaf fields, in packing order.
pub const LEAF_ENCODING: [&str; 2] = ["address", "uint256"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the sorted leaves, the last level holds the root.
    levels: Vec<Vec<Hash>>,
    /// Records aligned with `levels[0]`.
    records: Vec<Record>,
}

/// Builds the hash levels above `leaves`, which must already be in canonical order.
fn build_levels(leaves: Vec<Hash>) -> Vec<Vec<Hash>> {
    let mut levels = vec![leaves];

    while let Some(level) = levels.last().filter(|level| level.len() > 1) {
        let next_level: Vec<Hash> = level
            .chunks(2)
            .map(|chunk| match *chunk {
                [left, right] => hash_sorted_pair(left, right),
                _ => chunk[0],
            })
            .collect();
        levels.push(next_level);
    }

    levels
}

impl MerkleTree {
    /// Builds a tree over `records`.
    ///
    /// Duplicate records are kept; each copy is its own leaf.
    pub fn build(records: &[Record]) -> Result<Self> {
        if records.is_empty() {
            return Err(DistributionError::EmptyDistribution);
        }
        if let Some(record) = records.iter().find(|r| r.address.is_zero()) {
            return Err(DistributionError::InvalidRecord(format!(
                "zero address not allowed (amount {})",
                record.amount
            )));
        }

        let mut entries: Vec<(Hash, Record)> =
            records.iter().map(|r| (leaf::encode(r), *r)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let (leaves, records): (Vec<Hash>, Vec<Record>) = entries.into_iter().unzip();
        Ok(Self {
            levels: build_levels(leaves),
            records,
        })
    }

    pub fn root(&self) -> Hash {
        // `build` and `from_dump` never produce an empty tree.
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default()
    }

    /// Leaves in canonical order.
    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Records aligned with [`leaves`](Self::leaves).
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// All hash levels, leaves first.
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of the first leaf equal to `leaf`.
    pub fn position(&self, leaf: &Hash) -> Option<usize> {
        self.leaves().binary_search(leaf).ok().map(|mut index| {
            while index > 0 && self.leaves()[index - 1] == *leaf {
                index -= 1;
            }
            index
        })
    }

    /// Positions of every record belonging to `address`.
    pub fn positions_of(&self, address: &Address) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.address == *address)
            .map(|(index, _)| index)
            .collect()
    }

    /// Sum of all record amounts.
    pub fn total_amount(&self) -> Result<U256> {
        self.records.iter().try_fold(U256::zero(), |total, record| {
            total
                .checked_add(record.amount)
                .ok_or(DistributionError::AmountOverflow)
        })
    }

    /// Serializes the tree into its loss-less persisted form.
    pub fn dump(&self) -> TreeDump {
        TreeDump {
            format: TREE_FORMAT.to_string(),
            leaf_encoding: LEAF_ENCODING.iter().map(|s| s.to_string()).collect(),
            levels: self
                .levels
                .iter()
                .map(|level| level.iter().map(hex_encode).collect())
                .collect(),
            values: self
                .records
                .iter()
                .enumerate()
                .map(|(leaf_index, record)| DumpValue {
                    value: [record.address.to_string(), record.amount.to_string()],
                    leaf_index,
                })
                .collect(),
        }
    }

    /// Reloads a serialized tree, re-deriving every level from its values.
    pub fn from_dump(dump: &TreeDump) -> Result<Self> {
        if dump.format != TREE_FORMAT {
            return Err(DistributionError::InvalidTree(format!(
                "unsupported format {:?}",
                dump.format
            )));
        }
        if dump.leaf_encoding != LEAF_ENCODING {
            return Err(DistributionError::InvalidTree(format!(
                "unsupported leaf encoding {:?}",
                dump.leaf_encoding
            )));
        }

        let records = dump
            .values
            .iter()
            .map(|v| Record::parse(&v.value[0], &v.value[1]))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| DistributionError::InvalidTree(e.to_string()))?;
        let tree = Self::build(&records).map_err(|e| match e {
            DistributionError::EmptyDistribution => {
                DistributionError::InvalidTree("tree has no values".to_string())
            }
            other => other,
        })?;

        for (value, record) in dump.values.iter().zip(&records) {
            let matches = tree
                .leaves()
                .get(value.leaf_index)
                .is_some_and(|leaf| *leaf == leaf::encode(record));
            if !matches {
                return Err(DistributionError::InvalidTree(format!(
                    "value {} does not match leaf {}",
                    value.value[0], value.leaf_index
                )));
            }
        }

        let stored = dump
            .levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|h| parse_hash(h))
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| DistributionError::InvalidTree(e.to_string()))?;
        if stored != tree.levels {
            return Err(DistributionError::InvalidTree(
                "stored hashes do not match values".to_string(),
            ));
        }

        Ok(tree)
    }
}

/// Loss-less, JSON-friendly form of a [`MerkleTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDump {
    pub format: String,
    pub leaf_encoding: Vec<String>,
    pub levels: Vec<Vec<String>>,
    pub values: Vec<DumpValue>,
}

impl TreeDump {
    /// The stored root, if the dump has one.
    pub fn root(&self) -> Option<&str> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpValue {
    /// `[address, amount]` with the amount as a decimal string.
    pub value: [String; 2],
    pub leaf_index: usize,
}
