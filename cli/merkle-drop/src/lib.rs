//! Merkle airdrop distributions.
//!
//! An operator turns a list of `(address, amount)` entitlements into a Merkle
//! tree, deploys a claim contract committed to its root and stores the tree
//! under the contract address. Claimants later fetch the tree, regenerate
//! their proof and submit a claim.

pub mod api;
pub mod chain;
pub mod common;
pub mod config;
pub mod error;
pub mod leaf;
pub mod logging;
pub mod proof;
pub mod record;
pub mod store;
pub mod tree;
pub mod workflow;

pub use common::{
    hash_sorted_pair, hex_encode, keccak256, parse_address, parse_hash, write_file_atomic, Hash,
};
pub use error::{ChainError, DistributionError, StoreError, WorkflowError};
pub use proof::{prove, prove_index, verify, ClaimProof, Proof};
pub use record::{parse_amount, parse_ether, Address, Record};
pub use store::{FileStore, MemoryStore, TreeStore};
pub use tree::{MerkleTree, TreeDump};
pub use workflow::{DistributionWorkflow, IssueRequest, Session};
