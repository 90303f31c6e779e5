//! Distribution persistence.
//!
//! One document per contract address, shaped `{ "merkleTree": <TreeDump> }`,
//! in the `contracts` collection. Saves are whole-document and last write wins.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::tree::TreeDump;

/// Name of the collection distributions are stored in.
pub const COLLECTION: &str = "contracts";

/// The persisted document for one deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    pub merkle_tree: TreeDump,
}

/// Storage backend for serialized trees keyed by contract address.
pub trait TreeStore: Send + Sync {
    /// Persists `tree` under `identifier`, replacing any existing document.
    fn save(&self, identifier: &str, tree: &TreeDump) -> Result<(), StoreError>;

    /// Loads the tree stored under `identifier`.
    fn load(&self, identifier: &str) -> Result<TreeDump, StoreError>;
}

/// Checks required fields before any I/O is attempted.
pub fn validate_save<'a>(
    identifier: Option<&'a str>,
    tree: Option<&'a TreeDump>,
) -> Result<(&'a str, &'a TreeDump), StoreError> {
    let identifier = identifier
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(StoreError::MissingIdentifier)?;
    let tree = tree
        .filter(|tree| !tree.values.is_empty())
        .ok_or(StoreError::MissingTree)?;
    Ok((identifier, tree))
}

pub(crate) fn validate_identifier(identifier: &str) -> Result<&str, StoreError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(StoreError::MissingIdentifier);
    }
    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Address, Record};
    use crate::tree::MerkleTree;
    use primitive_types::U256;

    fn sample_dump() -> TreeDump {
        let record = Record::new(Address::from_bytes([1; 20]), U256::from(5u64)).unwrap();
        MerkleTree::build(&[record]).unwrap().dump()
    }

    #[test]
    fn test_validate_save() {
        let dump = sample_dump();
        assert!(matches!(
            validate_save(None, Some(&dump)),
            Err(StoreError::MissingIdentifier)
        ));
        assert!(matches!(
            validate_save(Some("  "), Some(&dump)),
            Err(StoreError::MissingIdentifier)
        ));
        assert!(matches!(
            validate_save(Some("0xabc"), None),
            Err(StoreError::MissingTree)
        ));

        let mut empty = dump.clone();
        empty.values.clear();
        assert!(matches!(
            validate_save(Some("0xabc"), Some(&empty)),
            Err(StoreError::MissingTree)
        ));

        let (id, _) = validate_save(Some(" 0xabc "), Some(&dump)).unwrap();
        assert_eq!(id, "0xabc");
    }

    #[test]
    fn test_document_shape() {
        let doc = ContractDocument {
            merkle_tree: sample_dump(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("merkleTree").is_some());
    }
}
