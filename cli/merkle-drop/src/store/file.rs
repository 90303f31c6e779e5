use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{validate_identifier, validate_save, ContractDocument, TreeStore, COLLECTION};
use crate::common::{keccak256, write_file_atomic};
use crate::error::StoreError;
use crate::tree::TreeDump;

/// Stores each document as `<root>/contracts/<hex(keccak256(identifier))>.json`.
///
/// Identifiers are opaque strings of any length; hashing them keeps file
/// names fixed at 64 hex characters and inside the collection directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    collection_dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let collection_dir = root.as_ref().join(COLLECTION);
        std::fs::create_dir_all(&collection_dir)?;
        Ok(Self { collection_dir })
    }

    fn document_path(&self, identifier: &str) -> PathBuf {
        self.collection_dir
            .join(format!("{}.json", hex::encode(keccak256(identifier.as_bytes()))))
    }
}

impl TreeStore for FileStore {
    fn save(&self, identifier: &str, tree: &TreeDump) -> Result<(), StoreError> {
        let (identifier, tree) = validate_save(Some(identifier), Some(tree))?;
        let document = ContractDocument {
            merkle_tree: tree.clone(),
        };
        let json = serde_json::to_string_pretty(&document).map_err(|source| StoreError::Corrupt {
            identifier: identifier.to_string(),
            source,
        })?;

        let path = self.document_path(identifier);
        write_file_atomic(&path, &json)?;
        debug!(identifier, path = %path.display(), "Saved merkle tree");
        Ok(())
    }

    fn load(&self, identifier: &str) -> Result<TreeDump, StoreError> {
        let identifier = validate_identifier(identifier)?;
        let path = self.document_path(identifier);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => return Err(StoreError::StoreUnavailable(e)),
        };
        let document: ContractDocument =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                identifier: identifier.to_string(),
                source,
            })?;
        debug!(identifier, "Loaded merkle tree");
        Ok(document.merkle_tree)
    }
}
