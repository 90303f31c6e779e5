//! Issuing and claiming distributions.
//!
//! Issuing: validate → build tree → deploy → save tree → fund.
//! Claiming: load tree → locate claimant → prove → local check → submit.
//!
//! Nothing is retried. Once a contract exists, later failures are reported as
//! [`WorkflowError::PartialCompletion`] naming the contract so the operator
//! can finish by hand instead of deploying a second contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use primitive_types::U256;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainClient, DeployRequest, TxHash};
use crate::common::{hex_encode, Hash};
use crate::error::{DistributionError, IssueStage, WorkflowError};
use crate::leaf;
use crate::proof::{find_record, prove_index, verify, Proof};
use crate::record::{parse_ether, Address, Record};
use crate::store::TreeStore;
use crate::tree::MerkleTree;

/// Per-user context: the connected account and whether a request is outstanding.
#[derive(Debug)]
pub struct Session {
    account: Address,
    in_flight: AtomicBool,
}

impl Session {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Opens a session for the account the wallet signs with.
    pub fn connect(chain: &dyn ChainClient) -> Result<Self, WorkflowError> {
        Ok(Self::new(chain.signer()?))
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlight<'_>, WorkflowError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkflowError::RequestInFlight)?;
        Ok(InFlight(&self.in_flight))
    }
}

/// Clears the session's in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Operator input: every account receives the same reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub accounts: Vec<Address>,
    /// Per-account reward in base units.
    pub reward_amount: U256,
}

impl IssueRequest {
    /// Parses a newline-separated address list and a whole-token reward amount.
    pub fn parse(addresses: &str, reward_amount: &str) -> Result<Self, DistributionError> {
        let accounts = addresses
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::parse::<Address>)
            .collect::<Result<Vec<Address>, _>>()?;
        if accounts.is_empty() {
            return Err(DistributionError::EmptyDistribution);
        }
        let reward_amount = parse_ether(reward_amount)?;
        Ok(Self {
            accounts,
            reward_amount,
        })
    }

    pub fn records(&self) -> Result<Vec<Record>, DistributionError> {
        self.accounts
            .iter()
            .map(|account| Record::new(*account, self.reward_amount))
            .collect()
    }

    /// Amount the contract must hold to pay every account.
    pub fn total_amount(&self) -> Result<U256, DistributionError> {
        self.reward_amount
            .checked_mul(U256::from(self.accounts.len()))
            .ok_or(DistributionError::AmountOverflow)
    }
}

/// Outcome of a completed issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedDistribution {
    pub contract_address: Address,
    pub merkle_root: Hash,
    pub total_amount: U256,
    pub fund_tx: TxHash,
}

/// Outcome of a submitted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub contract_address: Address,
    pub account: Address,
    pub amount: U256,
    pub proof: Proof,
    pub tx_hash: TxHash,
}

pub struct DistributionWorkflow {
    store: Arc<dyn TreeStore>,
    chain: Arc<dyn ChainClient>,
}

impl DistributionWorkflow {
    pub fn new(store: Arc<dyn TreeStore>, chain: Arc<dyn ChainClient>) -> Self {
        Self { store, chain }
    }

    /// Builds the tree, deploys and funds its contract, and persists the tree.
    pub fn issue(
        &self,
        session: &Session,
        request: &IssueRequest,
    ) -> Result<IssuedDistribution, WorkflowError> {
        let _guard = session.begin()?;

        let records = request.records()?;
        let total_amount = request.total_amount()?;
        let tree = MerkleTree::build(&records)?;
        let merkle_root = tree.root();
        info!(
            accounts = records.len(),
            root = %hex_encode(merkle_root),
            total = %total_amount,
            "Built merkle tree"
        );

        let contract_address = self.chain.deploy(&DeployRequest {
            merkle_root,
            claim_amount: request.reward_amount,
        })?;
        info!(contract = %contract_address, "Contract deployed");

        let identifier = contract_address.to_string();
        if let Err(e) = self.store.save(&identifier, &tree.dump()) {
            error!(contract = %identifier, error = %e, "Contract deployed but merkle tree was not saved");
            return Err(WorkflowError::PartialCompletion {
                contract_address: identifier,
                stage: IssueStage::Persist,
                reason: e.to_string(),
            });
        }
        debug!(contract = %identifier, "Merkle tree saved");

        let fund_tx = self
            .chain
            .fund(&contract_address, total_amount)
            .map_err(|e| {
                error!(contract = %identifier, error = %e, "Contract deployed but not funded");
                WorkflowError::PartialCompletion {
                    contract_address: identifier.clone(),
                    stage: IssueStage::Fund,
                    reason: e.to_string(),
                }
            })?;
        info!(contract = %identifier, tx = %hex_encode(fund_tx), "Contract funded");

        Ok(IssuedDistribution {
            contract_address,
            merkle_root,
            total_amount,
            fund_tx,
        })
    }

    /// Fetches the contract's tree, proves the session account and submits the claim.
    pub fn claim(
        &self,
        session: &Session,
        contract_address: &str,
    ) -> Result<ClaimReceipt, WorkflowError> {
        let _guard = session.begin()?;
        let contract: Address = contract_address.parse()?;

        let dump = self.store.load(&contract.to_string())?;
        let tree = MerkleTree::from_dump(&dump)?;

        let account = session.account();
        let (leaf_index, record) = find_record(&tree, &account).map_err(|e| {
            warn!(account = %account, contract = %contract, error = %e, "Could not locate entitlement");
            e
        })?;
        self.submit(&contract, &tree, leaf_index, record)
    }

    /// Claims a specific record, for accounts holding more than one distinct amount.
    pub fn claim_record(
        &self,
        session: &Session,
        contract_address: &str,
        record: &Record,
    ) -> Result<ClaimReceipt, WorkflowError> {
        let _guard = session.begin()?;
        let contract: Address = contract_address.parse()?;

        let dump = self.store.load(&contract.to_string())?;
        let tree = MerkleTree::from_dump(&dump)?;
        let leaf_index = tree
            .position(&leaf::encode(record))
            .ok_or_else(|| DistributionError::LeafNotFound(record.address.to_string()))?;
        self.submit(&contract, &tree, leaf_index, *record)
    }

    fn submit(
        &self,
        contract: &Address,
        tree: &MerkleTree,
        leaf_index: usize,
        record: Record,
    ) -> Result<ClaimReceipt, WorkflowError> {
        let proof = prove_index(tree, leaf_index)?;
        if !verify(&leaf::encode(&record), &proof, &tree.root()) {
            return Err(WorkflowError::LocalVerificationFailed);
        }
        debug!(
            account = %record.address,
            leaf_index,
            proof_len = proof.len(),
            "Generated merkle proof"
        );

        let tx_hash = self.chain.claim(contract, &record.address, &proof)?;
        info!(
            contract = %contract,
            account = %record.address,
            amount = %record.amount,
            tx = %hex_encode(tx_hash),
            "Claim submitted"
        );

        Ok(ClaimReceipt {
            contract_address: *contract,
            account: record.address,
            amount: record.amount,
            proof,
            tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_request_parse() {
        let text = "0x1111111111111111111111111111111111111111\n\n  \
                    0x2222222222222222222222222222222222222222  \n";
        let request = IssueRequest::parse(text, "0.5").unwrap();
        assert_eq!(request.accounts.len(), 2);
        assert_eq!(request.reward_amount, U256::exp10(17) * U256::from(5u64));
        assert_eq!(request.total_amount().unwrap(), U256::exp10(18));
    }

    #[test]
    fn test_issue_request_rejects_bad_input() {
        assert_eq!(
            IssueRequest::parse("  \n\n", "1"),
            Err(DistributionError::EmptyDistribution)
        );
        assert!(matches!(
            IssueRequest::parse("0x1111111111111111111111111111111111111111", ""),
            Err(DistributionError::InvalidRecord(_))
        ));
        assert!(matches!(
            IssueRequest::parse("not-an-address", "1"),
            Err(DistributionError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_total_amount_overflow() {
        let request = IssueRequest {
            accounts: vec![Address::from_bytes([1; 20]), Address::from_bytes([2; 20])],
            reward_amount: U256::max_value(),
        };
        assert_eq!(request.total_amount(), Err(DistributionError::AmountOverflow));
    }

    #[test]
    fn test_session_guard() {
        let session = Session::new(Address::from_bytes([1; 20]));
        let guard = session.begin().unwrap();
        assert!(session.is_busy());
        assert!(matches!(session.begin(), Err(WorkflowError::RequestInFlight)));
        drop(guard);
        assert!(!session.is_busy());
        assert!(session.begin().is_ok());
    }
}
