use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use claims_tree::{
    hex_encode, verify_report, ClaimsError, ClaimsPerNetwork, MerkleTree, TreeDump,
};

use crate::generate::dump_file_name;

#[derive(Parser, Debug)]
#[command(about = "Check every proof in a proofs file against its Merkle root", long_about = None)]
pub struct Cli {
    /// Proofs JSON file written by `generate`
    #[arg(short, long)]
    input: PathBuf,

    /// Directory of tree dumps to cross-check the report against
    #[arg(short = 'd', long)]
    tree_dump_dir: Option<PathBuf>,
}

fn check_against_dumps(report: &ClaimsPerNetwork, dir: &std::path::Path) -> Result<()> {
    for (network, claims) in report.iter() {
        let path = dir.join(dump_file_name(network));
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read tree dump {}", path.display()))?;
        let dump: TreeDump =
            serde_json::from_str(&content).context("Failed to parse tree dump JSON")?;
        let tree = MerkleTree::load(&dump).map_err(|err| err.in_network(network))?;

        if hex_encode(tree.root()) != claims.merkle_root {
            anyhow::bail!(
                "tree dump root {} does not match report root {} for network {network}",
                hex_encode(tree.root()),
                claims.merkle_root
            );
        }

        for entry in &claims.accounts {
            let proof = tree
                .find_proof(&entry.claim)
                .map_err(|err| err.in_network(network))?;
            if proof != entry.proof()? {
                return Err(ClaimsError::ProofMismatch {
                    network: network.to_string(),
                    account: entry.claim.account.clone(),
                    token: entry.claim.token_address.clone(),
                }
                .into());
            }
        }
        if tree.len() != claims.accounts.len() {
            anyhow::bail!(
                "tree dump holds {} claims but report lists {} for network {network}",
                tree.len(),
                claims.accounts.len()
            );
        }
        info!(network = %network, "report matches tree dump");
    }
    Ok(())
}

pub fn run(args: &Cli) -> Result<()> {
    info!(path = %args.input.display(), "reading proofs");
    let invalid = |reason: String| ClaimsError::InvalidInput {
        path: "$".to_string(),
        reason,
    };
    let content = fs::read_to_string(&args.input)
        .map_err(|err| invalid(format!("cannot read {}: {err}", args.input.display())))
        .context("Failed to read proofs file")?;
    let report: ClaimsPerNetwork = serde_json::from_str(&content)
        .map_err(|err| invalid(err.to_string()))
        .context("Failed to parse proofs JSON")?;

    let verified = verify_report(&report)?;

    if let Some(dir) = &args.tree_dump_dir {
        check_against_dumps(&report, dir)?;
    }

    for (network, claims) in report.iter() {
        println!(
            "{network}: {} proofs verified against {}",
            claims.accounts.len(),
            claims.merkle_root
        );
    }
    println!("Verified {verified} proofs across {} networks", report.len());

    Ok(())
}
