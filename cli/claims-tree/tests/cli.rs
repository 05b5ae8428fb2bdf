//! End-to-end tests running the `claims-tree` binary against files in a tempdir.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use claims_tree::{verify_proof, Claim, ClaimsPerNetwork, MerkleTree, TreeDump};
use serde_json::json;

const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const BOB: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
const MAX_UINT256: &str =
    "115792089237316195423570985008687907853269984665640564039457584007913129639935";

fn claims_tree_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_claims-tree"))
}

fn run(args: &[&str]) -> Output {
    Command::new(claims_tree_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run claims-tree")
}

fn write_claims(dir: &Path, document: &serde_json::Value) -> PathBuf {
    let path = dir.join("claims.json");
    std::fs::write(&path, serde_json::to_string_pretty(document).unwrap()).unwrap();
    path
}

fn generate(input: &Path, output: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "generate",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    run(&args)
}

fn sample_document() -> serde_json::Value {
    json!({
        "mainnet": {
            ALICE: [{ USDC: "100" }, { WETH: "50" }],
            BOB: [{ USDC: 2500000 }],
            CAROL: [{ WETH: MAX_UINT256 }]
        },
        "polygon": {
            BOB: [{ USDC: "1" }]
        }
    })
}

fn read_report(path: &Path) -> ClaimsPerNetwork {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_generate_writes_verifiable_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let output = dir.path().join("proofs.json");

    let result = generate(&input, &output, &[]);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(String::from_utf8_lossy(&result.stdout).contains("Success"));

    let report = read_report(&output);
    let networks: Vec<&str> = report.iter().map(|(name, _)| name).collect();
    assert_eq!(networks, vec!["mainnet", "polygon"]);

    let mainnet = report.get("mainnet").unwrap();
    assert_eq!(mainnet.accounts.len(), 4);
    let claims: Vec<&Claim> = mainnet.accounts.iter().map(|a| &a.claim).collect();
    assert_eq!(
        claims,
        vec![
            &Claim::new(ALICE, USDC, "100"),
            &Claim::new(ALICE, WETH, "50"),
            &Claim::new(BOB, USDC, "2500000"),
            &Claim::new(CAROL, WETH, MAX_UINT256),
        ]
    );

    let root = claims_tree::common::parse_hash(&mainnet.merkle_root).unwrap();
    for entry in &mainnet.accounts {
        assert!(!entry.merkle_proof.is_empty());
        let leaf = claims_tree::leaf::encode(&entry.claim).unwrap();
        assert!(verify_proof(root, leaf, &entry.proof().unwrap()));
    }

    let polygon = report.get("polygon").unwrap();
    assert_eq!(polygon.accounts.len(), 1);
    assert!(polygon.accounts[0].merkle_proof.is_empty());
    assert_eq!(
        polygon.merkle_root,
        claims_tree::hex_encode(claims_tree::leaf::encode(&Claim::new(BOB, USDC, "1")).unwrap())
    );

    let verify = run(&["verify", "--input", output.to_str().unwrap()]);
    assert!(verify.status.success());
    assert!(String::from_utf8_lossy(&verify.stdout)
        .contains("Verified 5 proofs across 2 networks"));
}

#[test]
fn test_generate_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    assert!(generate(&input, &first, &[]).status.success());
    assert!(generate(&input, &second, &[]).status.success());
    assert_eq!(
        std::fs::read_to_string(&first).unwrap(),
        std::fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn test_malformed_amount_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(
        dir.path(),
        &json!({
            "mainnet": { ALICE: [{ USDC: "100" }] },
            "polygon": { BOB: [{ USDC: "12.5" }] }
        }),
    );
    let output = dir.path().join("proofs.json");

    let result = generate(&input, &output, &[]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("ValueError"), "stderr: {stderr}");
    assert!(stderr.contains("polygon"), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn test_empty_network_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(
        dir.path(),
        &json!({ "mainnet": { ALICE: [{ USDC: "100" }] }, "base": {} }),
    );
    let output = dir.path().join("proofs.json");

    let result = generate(&input, &output, &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("EmptyInputError"));
    assert!(!output.exists());
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("proofs.json");

    let result = generate(&dir.path().join("nope.json"), &output, &[]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("InvalidInputError"), "stderr: {stderr}");
    assert!(stderr.contains("Failed to read claims file"), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn test_malformed_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("claims.json");
    std::fs::write(&input, "{not json").unwrap();
    let output = dir.path().join("proofs.json");

    let result = generate(&input, &output, &[]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("InvalidInputError"), "stderr: {stderr}");
    assert!(!stderr.contains('\x1b'), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_leaves_no_tree_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let output = dir.path().join("missing").join("proofs.json");
    let dumps = dir.path().join("trees");

    let result = generate(&input, &output, &["--tree-dump-dir", dumps.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(!output.exists());
    assert!(!dumps.join("mainnet.tree.json").exists());
    assert!(!dumps.exists());
}

#[test]
fn test_unsorted_leaves_still_verify() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let sorted = dir.path().join("sorted.json");
    let unsorted = dir.path().join("unsorted.json");

    assert!(generate(&input, &sorted, &[]).status.success());
    assert!(generate(&input, &unsorted, &["--no-sort-leaves"]).status.success());

    let sorted = read_report(&sorted);
    let unsorted = read_report(&unsorted);
    assert_ne!(
        sorted.get("mainnet").unwrap().merkle_root,
        unsorted.get("mainnet").unwrap().merkle_root
    );
    assert_eq!(claims_tree::verify_report(&unsorted).unwrap(), 5);
}

#[test]
fn test_tree_dumps_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let output = dir.path().join("proofs.json");
    let dumps = dir.path().join("trees");

    let result = generate(&input, &output, &["--tree-dump-dir", dumps.to_str().unwrap()]);
    assert!(result.status.success());

    let dump: TreeDump = serde_json::from_str(
        &std::fs::read_to_string(dumps.join("mainnet.tree.json")).unwrap(),
    )
    .unwrap();
    let tree = MerkleTree::load(&dump).unwrap();
    let report = read_report(&output);
    assert_eq!(
        claims_tree::hex_encode(tree.root()),
        report.get("mainnet").unwrap().merkle_root
    );

    let verify = run(&[
        "verify",
        "--input",
        output.to_str().unwrap(),
        "--tree-dump-dir",
        dumps.to_str().unwrap(),
    ]);
    assert!(
        verify.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&verify.stderr)
    );
}

#[test]
fn test_verify_rejects_tampered_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_claims(dir.path(), &sample_document());
    let output = dir.path().join("proofs.json");
    assert!(generate(&input, &output, &[]).status.success());

    let mut report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    report["mainnet"]["accounts"][0]["amount"] = json!("101");
    std::fs::write(&output, serde_json::to_string(&report).unwrap()).unwrap();

    let verify = run(&["verify", "--input", output.to_str().unwrap()]);
    assert!(!verify.status.success());
    assert!(String::from_utf8_lossy(&verify.stderr).contains("ProofMismatchError"));
}
