use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use merkle_drop::{parse_hash, ClaimProof};

#[derive(Args, Debug)]
pub struct Cli {
    /// Claim proof JSON produced by `prove`
    #[arg(short, long)]
    proof: PathBuf,

    /// Expected Merkle root; defaults to the root recorded in the proof
    #[arg(short, long)]
    root: Option<String>,
}

pub fn run(cli: &Cli) -> Result<()> {
    let contents = fs::read_to_string(&cli.proof).context("Failed to read claim proof")?;
    let claim: ClaimProof = serde_json::from_str(&contents).context("Failed to parse claim proof")?;

    let root = cli
        .root
        .as_deref()
        .map(parse_hash)
        .transpose()
        .context("Invalid Merkle root")?;

    if !claim.verify(root)? {
        bail!("Proof for {} does not verify", claim.account);
    }

    info!("Proof for {} verifies", claim.account);
    println!("valid");
    Ok(())
}
