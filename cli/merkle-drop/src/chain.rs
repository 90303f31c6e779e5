//! Wallet and chain collaborator.
//!
//! The workflow only needs four capabilities from a wallet: the signing
//! account, contract deployment, funding and claim submission. Concrete
//! wallet libraries implement [`ChainClient`]; [`MemoryChain`] is the
//! in-memory implementation used for development and tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use primitive_types::U256;
use sha3::{Digest, Keccak256};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::common::{hex_encode, keccak256, strip_hex_prefix, Hash};
use crate::error::ChainError;
use crate::leaf;
use crate::proof::{verify, Proof};
use crate::record::{Address, Record};

/// Transaction hash returned by state-changing calls.
pub type TxHash = Hash;

/// Constructor arguments for a claim contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployRequest {
    pub merkle_root: Hash,
    /// Amount paid out per successful claim.
    pub claim_amount: U256,
}

/// Narrow capability interface over a wallet / chain client.
pub trait ChainClient: Send + Sync {
    /// The account transactions are signed with.
    fn signer(&self) -> Result<Address, ChainError>;

    /// Deploys a claim contract and returns its address.
    fn deploy(&self, request: &DeployRequest) -> Result<Address, ChainError>;

    /// Sends `value` to `contract`.
    fn fund(&self, contract: &Address, value: U256) -> Result<TxHash, ChainError>;

    /// Submits a claim for `account` with its inclusion proof.
    fn claim(&self, contract: &Address, account: &Address, proof: &Proof)
        -> Result<TxHash, ChainError>;

    /// The per-claim amount configured in `contract`.
    fn claim_amount(&self, contract: &Address) -> Result<U256, ChainError>;
}

/// A secp256k1 key held in memory.
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Parses a hex private key (with or without `0x`), zeroizing intermediate copies.
    pub fn from_hex(key: &str) -> Result<Self, ChainError> {
        let key_str = strip_hex_prefix(key);
        if key_str.is_empty() {
            return Err(ChainError::NoSigner("private key is empty".to_string()));
        }
        let mut key_bytes = hex::decode(key_str)
            .map_err(|e| ChainError::NoSigner(format!("invalid private key format: {e}")))?;
        if key_bytes.len() != 32 {
            let len = key_bytes.len();
            key_bytes.zeroize();
            return Err(ChainError::NoSigner(format!(
                "invalid private key length: expected 32 bytes, got {len}"
            )));
        }
        let mut private_key_bytes = [0u8; 32];
        private_key_bytes.copy_from_slice(&key_bytes);
        key_bytes.zeroize();

        let signer = Self::from_bytes(&private_key_bytes);
        private_key_bytes.zeroize();
        signer
    }

    pub fn from_bytes(private_key: &[u8; 32]) -> Result<Self, ChainError> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| ChainError::NoSigner(format!("invalid private key: {e}")))?;
        let address = private_key_to_address(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte digest.
    pub fn sign_digest(&self, digest: &Hash) -> Result<Signature, ChainError> {
        self.signing_key
            .sign_prehash(digest)
            .map_err(|e| ChainError::NoSigner(format!("signing failed: {e}")))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derives the Ethereum-style address: the last 20 bytes of
/// `keccak256(uncompressed_pubkey[1..])`.
fn private_key_to_address(signing_key: &SigningKey) -> Address {
    let public_key = signing_key.verifying_key();
    let encoded = public_key.to_encoded_point(false);
    let pub_bytes = encoded.as_bytes();
    let hash = Keccak256::digest(&pub_bytes[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    Address::from_bytes(address)
}

/// Which [`MemoryChain`] call should fail next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    Deploy,
    Fund,
    Claim,
}

#[derive(Debug, Clone)]
struct ClaimContract {
    merkle_root: Hash,
    claim_amount: U256,
    balance: U256,
    claimed: HashSet<Address>,
}

#[derive(Debug, Default)]
struct ChainState {
    contracts: HashMap<Address, ClaimContract>,
    nonce: u64,
    failures: HashSet<FailOn>,
}

impl ChainState {
    /// Hash of the next transaction sent by `signer`, covering its signature.
    fn next_tx(&mut self, signer: &LocalSigner, tag: &[u8]) -> Result<TxHash, ChainError> {
        self.nonce += 1;
        let mut preimage = signer.address().as_bytes().to_vec();
        preimage.extend_from_slice(tag);
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        let unsigned = keccak256(&preimage);
        let signature = signer.sign_digest(&unsigned)?;
        preimage.extend_from_slice(&signature.to_bytes());
        Ok(keccak256(&preimage))
    }

    fn take_failure(&mut self, call: FailOn) -> Result<(), ChainError> {
        if self.failures.remove(&call) {
            return Err(ChainError::Rpc(format!("injected {call:?} failure")));
        }
        Ok(())
    }
}

/// In-memory chain holding claim contracts.
///
/// Claims are checked the way the deployed contract does: the leaf is rebuilt
/// from `(account, claim_amount)` and verified against the stored root with
/// the sorted-pair rule.
#[derive(Debug)]
pub struct MemoryChain {
    signer: LocalSigner,
    state: RwLock<ChainState>,
}

impl MemoryChain {
    pub fn new(signer: LocalSigner) -> Self {
        Self {
            signer,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Makes the next call of the given kind fail with an RPC error.
    pub fn fail_next(&self, call: FailOn) {
        if let Ok(mut state) = self.state.write() {
            state.failures.insert(call);
        }
    }

    /// Current balance of a deployed contract.
    pub fn balance(&self, contract: &Address) -> Option<U256> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.contracts.get(contract).map(|c| c.balance))
    }

    /// Stored root of a deployed contract.
    pub fn merkle_root(&self, contract: &Address) -> Option<Hash> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.contracts.get(contract).map(|c| c.merkle_root))
    }

    pub fn contract_count(&self) -> usize {
        self.state.read().map(|state| state.contracts.len()).unwrap_or(0)
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut ChainState) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ChainError::Rpc("chain state lock poisoned".to_string()))?;
        f(&mut state)
    }
}

impl ChainClient for MemoryChain {
    fn signer(&self) -> Result<Address, ChainError> {
        Ok(self.signer.address())
    }

    fn deploy(&self, request: &DeployRequest) -> Result<Address, ChainError> {
        self.with_state(|state| {
            state.take_failure(FailOn::Deploy)?;
            let hash = state.next_tx(&self.signer, b"deploy")?;
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&hash[12..]);
            let address = Address::from_bytes(bytes);
            state.contracts.insert(
                address,
                ClaimContract {
                    merkle_root: request.merkle_root,
                    claim_amount: request.claim_amount,
                    balance: U256::zero(),
                    claimed: HashSet::new(),
                },
            );
            info!(contract = %address, root = %hex_encode(request.merkle_root), "Deployed claim contract");
            Ok(address)
        })
    }

    fn fund(&self, contract: &Address, value: U256) -> Result<TxHash, ChainError> {
        self.with_state(|state| {
            state.take_failure(FailOn::Fund)?;
            let entry = state
                .contracts
                .get_mut(contract)
                .ok_or_else(|| ChainError::ContractNotFound(contract.to_string()))?;
            entry.balance = entry
                .balance
                .checked_add(value)
                .ok_or_else(|| ChainError::Reverted("Balance overflow.".to_string()))?;
            debug!(contract = %contract, %value, "Funded claim contract");
            state.next_tx(&self.signer, b"fund")
        })
    }

    fn claim(
        &self,
        contract: &Address,
        account: &Address,
        proof: &Proof,
    ) -> Result<TxHash, ChainError> {
        self.with_state(|state| {
            state.take_failure(FailOn::Claim)?;
            let entry = state
                .contracts
                .get_mut(contract)
                .ok_or_else(|| ChainError::ContractNotFound(contract.to_string()))?;

            let record = Record {
                address: *account,
                amount: entry.claim_amount,
            };
            if !verify(&leaf::encode(&record), proof, &entry.merkle_root) {
                return Err(ChainError::Reverted("Invalid proof.".to_string()));
            }
            if entry.claimed.contains(account) {
                return Err(ChainError::Reverted("Already claimed.".to_string()));
            }
            if entry.balance < entry.claim_amount {
                return Err(ChainError::Reverted("Insufficient balance.".to_string()));
            }
            entry.balance -= entry.claim_amount;
            entry.claimed.insert(*account);
            info!(contract = %contract, account = %account, amount = %entry.claim_amount, "Claimed");
            state.next_tx(&self.signer, b"claim")
        })
    }

    fn claim_amount(&self, contract: &Address) -> Result<U256, ChainError> {
        self.state
            .read()
            .map_err(|_| ChainError::Rpc("chain state lock poisoned".to_string()))?
            .contracts
            .get(contract)
            .map(|c| c.claim_amount)
            .ok_or_else(|| ChainError::ContractNotFound(contract.to_string()))
    }
}
