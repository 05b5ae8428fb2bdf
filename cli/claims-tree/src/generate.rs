use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use claims_tree::common::{persist_all, stage_file, StagedFile};
use claims_tree::{flatten, ClaimsError, ReportAssembler, TreeDump, TreeOptions};

#[derive(Parser, Debug)]
#[command(
    about = "Build Merkle trees from a claims file and write every claim's proof",
    long_about = None
)]
pub struct Cli {
    /// Claims JSON file: network -> account -> [{tokenAddress: amount}]
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file for Merkle roots and proofs
    #[arg(short, long)]
    output: PathBuf,

    /// Directory to write one `standard-v1` tree dump per network into
    #[arg(short = 'd', long)]
    tree_dump_dir: Option<PathBuf>,

    /// Keep leaves in input order instead of sorting them by hash
    #[arg(long)]
    no_sort_leaves: bool,
}

/// File name of a network's tree dump.
pub fn dump_file_name(network: &str) -> String {
    let safe: String = network
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.tree.json")
}

fn read_claims_document(path: &Path) -> Result<serde_json::Value> {
    let invalid = |reason: String| ClaimsError::InvalidInput {
        path: "$".to_string(),
        reason,
    };

    let content = fs::read_to_string(path)
        .map_err(|err| invalid(format!("cannot read {}: {err}", path.display())))
        .context("Failed to read claims file")?;
    let document = serde_json::from_str(&content)
        .map_err(|err| invalid(err.to_string()))
        .context("Failed to parse claims JSON")?;
    Ok(document)
}

fn stage_tree_dumps(dir: &Path, dumps: &[(String, TreeDump)]) -> Result<Vec<StagedFile>> {
    dumps
        .iter()
        .map(|(network, dump)| -> Result<StagedFile> {
            let json =
                serde_json::to_string_pretty(dump).context("Failed to serialize tree dump")?;
            stage_file(&dir.join(dump_file_name(network)), &json)
                .with_context(|| format!("Failed to write tree dump for {network}"))
        })
        .collect()
}

/// Writes the proofs file and any tree dumps, all or none.
fn write_artifacts(
    output: &Path,
    report_json: &str,
    dump_dir: Option<&Path>,
    dumps: &[(String, TreeDump)],
) -> Result<()> {
    let mut staged = vec![stage_file(output, report_json).context("Failed to write proofs file")?];

    let Some(dir) = dump_dir else {
        return persist_all(staged).context("Failed to write proofs file");
    };

    let created_dir = !dir.exists();
    fs::create_dir_all(dir).context("Failed to create tree dump directory")?;
    let result = stage_tree_dumps(dir, dumps).and_then(|dumps| {
        staged.extend(dumps);
        persist_all(staged).context("Failed to write output files")
    });
    if result.is_err() && created_dir {
        let _ = fs::remove_dir(dir);
    }
    result
}

pub fn run(args: Cli) -> Result<()> {
    info!(path = %args.input.display(), "reading claims");
    let document = read_claims_document(&args.input)?;

    let sets = flatten(&document)?;
    let options = TreeOptions {
        sort_leaves: !args.no_sort_leaves,
    };

    let mut assembler = ReportAssembler::new(options);
    let mut dumps = Vec::new();
    for set in &sets {
        let tree = assembler.add_network(set)?;
        if args.tree_dump_dir.is_some() {
            dumps.push((set.network.clone(), tree.dump()));
        }
    }
    let report = assembler.finish()?;
    info!(
        networks = report.len(),
        claims = report.claim_count(),
        "verified all proofs"
    );

    let json_output = serde_json::to_string_pretty(&report).context("Failed to serialize JSON")?;
    write_artifacts(
        &args.output,
        &json_output,
        args.tree_dump_dir.as_deref(),
        &dumps,
    )?;
    info!(path = %args.output.display(), "wrote proofs");
    if let Some(dir) = &args.tree_dump_dir {
        info!(path = %dir.display(), networks = dumps.len(), "wrote tree dumps");
    }

    for (network, claims) in report.iter() {
        println!(
            "{network}: root {} ({} claims)",
            claims.merkle_root,
            claims.accounts.len()
        );
    }
    println!("Success");

    Ok(())
}
