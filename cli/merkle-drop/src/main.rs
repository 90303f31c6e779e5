#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};

use merkle_drop::logging::{self, LogLevel};

mod build_tree;
mod prove;
mod serve;
mod verify;

#[derive(Parser, Debug)]
#[command(name = "merkle-drop")]
#[command(about = "Merkle airdrop distribution tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (-q warnings only, -qq errors only)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a Merkle tree from a list of addresses
    BuildTree(build_tree::Cli),
    /// Generate a claim proof for one account
    Prove(prove::Cli),
    /// Check a claim proof against a Merkle root
    Verify(verify::Cli),
    /// Run the tree storage HTTP service
    Serve(serve::Cli),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::try_init(LogLevel::from_flags(cli.verbose, cli.quiet)).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::BuildTree(args) => build_tree::run(args)?,
        Commands::Prove(args) => prove::run(args)?,
        Commands::Verify(args) => verify::run(&args)?,
        Commands::Serve(args) => serve::run(args)?,
    }

    Ok(())
}
