//! Error types for tree construction, storage, the chain collaborator and the
//! distribution workflow.

use thiserror::Error;

/// Errors raised while encoding records or building, loading and proving trees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Distribution is empty: at least one account address is required")]
    EmptyDistribution,

    #[error("Leaf not found for account {0}")]
    LeafNotFound(String),

    #[error("Account {0} appears with more than one amount; prove the full record instead")]
    AmbiguousLeaf(String),

    #[error("Total distribution amount overflows 256 bits")]
    AmountOverflow,

    #[error("Invalid serialized tree: {0}")]
    InvalidTree(String),
}

/// Errors raised by a [`TreeStore`](crate::store::TreeStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Missing contract address")]
    MissingIdentifier,

    #[error("Missing merkle tree")]
    MissingTree,

    #[error("No distribution stored for {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] std::io::Error),

    #[error("Stored document for {identifier} is corrupt: {source}")]
    Corrupt {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by a [`ChainClient`](crate::chain::ChainClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No signer available: {0}")]
    NoSigner(String),

    #[error("Contract not found at {0}")]
    ContractNotFound(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// The step of the issuing path at which a deployed distribution was left incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStage {
    /// The contract is deployed but its tree was not persisted.
    Persist,
    /// The tree is persisted but the contract was not funded.
    Fund,
}

impl std::fmt::Display for IssueStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persist => write!(f, "saving the merkle tree"),
            Self::Fund => write!(f, "funding the contract"),
        }
    }
}

/// Errors surfaced to the operator by the distribution workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Wallet or chain failure: {0}")]
    ExternalCollaboratorFailure(#[from] ChainError),

    #[error("Contract {contract_address} was deployed but {stage} failed: {reason}")]
    PartialCompletion {
        contract_address: String,
        stage: IssueStage,
        reason: String,
    },

    #[error("A request is already in flight for this session")]
    RequestInFlight,

    #[error("Generated proof does not verify against the stored root")]
    LocalVerificationFailed,
}

pub type Result<T> = std::result::Result<T, DistributionError>;
