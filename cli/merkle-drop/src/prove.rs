use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use merkle_drop::proof::find_record;
use merkle_drop::{
    parse_amount, prove_index, write_file_atomic, Address, ClaimProof, MerkleTree, Record,
    TreeDump,
};

#[derive(Args, Debug)]
pub struct Cli {
    /// Path to the serialized Merkle tree
    #[arg(short = 't', long)]
    tree: PathBuf,

    /// Claimant address
    #[arg(short = 'a', long)]
    address: String,

    /// Exact amount in base units, required when the address holds several amounts
    #[arg(long)]
    amount: Option<String>,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
}

pub fn load_tree(path: &PathBuf) -> Result<MerkleTree> {
    let contents = fs::read_to_string(path).context("Failed to read Merkle tree file")?;
    let dump: TreeDump = serde_json::from_str(&contents).context("Failed to parse Merkle tree")?;
    MerkleTree::from_dump(&dump).context("Invalid Merkle tree")
}

pub fn run(cli: Cli) -> Result<()> {
    info!("Loading Merkle tree...");
    let tree = load_tree(&cli.tree)?;

    let address: Address = cli.address.parse().context("Invalid claimant address")?;
    let (leaf_index, record) = match &cli.amount {
        Some(amount) => {
            let record = Record::new(address, parse_amount(amount)?)?;
            let index = tree
                .position(&merkle_drop::leaf::encode(&record))
                .context("Record not found in tree")?;
            (index, record)
        }
        None => find_record(&tree, &address).context("Address not found in distribution")?,
    };

    info!("Generating Merkle proof...");
    let proof = prove_index(&tree, leaf_index)?;
    let claim = ClaimProof::new(tree.root(), leaf_index, &record, &proof);
    if !claim.verify(None)? {
        anyhow::bail!("Generated proof does not verify against the tree root");
    }

    info!("Writing claim proof to {:?}...", cli.output);
    let json = serde_json::to_string_pretty(&claim).context("Failed to serialize JSON")?;
    write_file_atomic(&cli.output, &json).context("Failed to write claim file")?;

    info!("Claimer address: {}", claim.account);
    info!("Amount: {}", claim.amount);
    info!("Proof length: {} nodes", proof.len());
    Ok(())
}
