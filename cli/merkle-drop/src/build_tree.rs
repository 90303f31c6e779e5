use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use merkle_drop::record::format_ether;
use merkle_drop::{hex_encode, write_file_atomic, IssueRequest, MerkleTree};

#[derive(Args, Debug)]
pub struct Cli {
    /// Input file containing account addresses (one per line)
    #[arg(short, long)]
    input: PathBuf,

    /// Reward per account, in whole tokens (e.g. 0.5)
    #[arg(short, long)]
    amount: String,

    /// Output file for the serialized Merkle tree
    #[arg(short, long)]
    output: PathBuf,

    /// Output file for the Merkle root
    #[arg(short, long)]
    root_output: Option<PathBuf>,
}

fn read_addresses(path: &PathBuf) -> Result<String> {
    let file = File::open(path).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let mut addresses = String::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        addresses.push_str(&line);
        addresses.push('\n');

        if (line_num + 1) % 1_000_000 == 0 {
            debug!("Processed {} lines...", line_num + 1);
        }
    }
    Ok(addresses)
}

pub fn run(cli: Cli) -> Result<()> {
    info!("Reading addresses from {:?}...", cli.input);
    let addresses = read_addresses(&cli.input)?;
    let request = IssueRequest::parse(&addresses, &cli.amount).context("Invalid distribution")?;
    let total = request.total_amount()?;

    info!(
        "Total accounts: {}, amount to deposit: {}",
        request.accounts.len(),
        format_ether(total)
    );
    info!("Building Merkle tree...");

    let tree = MerkleTree::build(&request.records()?)?;
    let root = hex_encode(tree.root());
    info!("Merkle root: {}", root);

    if let Some(root_path) = &cli.root_output {
        write_file_atomic(root_path, &format!("{root}\n")).context("Failed to write root")?;
    }

    info!("Writing Merkle tree to {:?}...", cli.output);
    let json = serde_json::to_string_pretty(&tree.dump()).context("Failed to serialize tree")?;
    write_file_atomic(&cli.output, &json).context("Failed to write tree file")?;

    println!("{root}");
    Ok(())
}
