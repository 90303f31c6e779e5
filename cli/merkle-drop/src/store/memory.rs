use std::collections::HashMap;
use std::sync::RwLock;

use super::{validate_identifier, validate_save, TreeStore};
use crate::error::StoreError;
use crate::tree::TreeDump;

/// In-memory store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, TreeDump>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::StoreUnavailable(std::io::Error::new(
        std::io::ErrorKind::Other,
        "store lock poisoned",
    ))
}

impl TreeStore for MemoryStore {
    fn save(&self, identifier: &str, tree: &TreeDump) -> Result<(), StoreError> {
        let (identifier, tree) = validate_save(Some(identifier), Some(tree))?;
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .insert(identifier.to_string(), tree.clone());
        Ok(())
    }

    fn load(&self, identifier: &str) -> Result<TreeDump, StoreError> {
        let identifier = validate_identifier(identifier)?;
        self.documents
            .read()
            .map_err(|_| poisoned())?
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Address, Record};
    use crate::tree::MerkleTree;
    use primitive_types::U256;

    #[test]
    fn test_roundtrip() {
        let record = Record::new(Address::from_bytes([4; 20]), U256::from(4u64)).unwrap();
        let tree = MerkleTree::build(&[record]).unwrap().dump();
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.save("0xdef", &tree).unwrap();
        assert_eq!(store.load("0xdef").unwrap(), tree);
        assert!(matches!(store.load("0x123"), Err(StoreError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }
}
