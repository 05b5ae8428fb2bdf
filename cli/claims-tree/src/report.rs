//! Per-network proof report.
//!
//! Output shape:
//!
//! ```json
//! {
//!   "mainnet": {
//!     "merkleRoot": "0x…",
//!     "accounts": [
//!       { "account": "0x…", "tokenAddress": "0x…", "amount": "100", "merkleProof": ["0x…"] }
//!     ]
//!   }
//! }
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::common::{self, hex_encode, Hash};
use crate::error::{ClaimsError, Result};
use crate::leaf::{self, Claim};
use crate::normalize::NetworkClaimSet;
use crate::tree::{self, MerkleTree, TreeOptions};

/// A claim together with its inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimWithProof {
    #[serde(flatten)]
    pub claim: Claim,
    pub merkle_proof: Vec<String>,
}

impl ClaimWithProof {
    pub fn new(claim: Claim, proof: &[Hash]) -> Self {
        ClaimWithProof {
            claim,
            merkle_proof: proof.iter().map(hex_encode).collect(),
        }
    }

    /// Decodes the hex proof.
    pub fn proof(&self) -> Result<Vec<Hash>> {
        self.merkle_proof
            .iter()
            .map(|node| common::parse_hash(node))
            .collect()
    }
}

/// Root and proofs for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkClaims {
    pub merkle_root: String,
    pub accounts: Vec<ClaimWithProof>,
}

/// Reports keyed by network, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsPerNetwork {
    networks: Vec<(String, NetworkClaims)>,
}

impl ClaimsPerNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a network's report, replacing any previous one for that network.
    pub fn insert(&mut self, network: impl Into<String>, claims: NetworkClaims) {
        let network = network.into();
        match self.networks.iter_mut().find(|(name, _)| *name == network) {
            Some((_, existing)) => *existing = claims,
            None => self.networks.push((network, claims)),
        }
    }

    pub fn get(&self, network: &str) -> Option<&NetworkClaims> {
        self.networks
            .iter()
            .find(|(name, _)| name == network)
            .map(|(_, claims)| claims)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NetworkClaims)> {
        self.networks
            .iter()
            .map(|(name, claims)| (name.as_str(), claims))
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Total number of claims across all networks.
    pub fn claim_count(&self) -> usize {
        self.networks.iter().map(|(_, c)| c.accounts.len()).sum()
    }
}

impl Serialize for ClaimsPerNetwork {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.networks.len()))?;
        for (network, claims) in &self.networks {
            map.serialize_entry(network, claims)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClaimsPerNetwork {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ReportVisitor;

        impl<'de> Visitor<'de> for ReportVisitor {
            type Value = ClaimsPerNetwork;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of network to merkle root and claims")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut report = ClaimsPerNetwork::new();
                while let Some((network, claims)) = access.next_entry::<String, NetworkClaims>()? {
                    report.insert(network, claims);
                }
                Ok(report)
            }
        }

        deserializer.deserialize_map(ReportVisitor)
    }
}

/// Builds, validates and proves one network's tree.
///
/// The tree is returned so callers can dump it; the report entry holds no
/// reference into it.
pub fn prove_network(
    set: &NetworkClaimSet,
    options: TreeOptions,
) -> Result<(NetworkClaims, MerkleTree)> {
    let in_network = |err: ClaimsError| err.in_network(&set.network);

    let tree = MerkleTree::build(set.claims.clone(), options).map_err(|err| match err {
        ClaimsError::EmptyInput { .. } => ClaimsError::EmptyInput {
            network: set.network.clone(),
        },
        err => in_network(err),
    })?;
    tree.validate().map_err(in_network)?;

    let accounts = tree
        .values()
        .iter()
        .enumerate()
        .map(|(value_index, value)| -> Result<ClaimWithProof> {
            let proof = tree.get_proof(value_index)?;
            debug!(
                account = %value.claim.account,
                token = %value.claim.token_address,
                proof_len = proof.len(),
                "generated proof"
            );
            Ok(ClaimWithProof::new(value.claim.clone(), &proof))
        })
        .collect::<Result<Vec<_>>>()
        .map_err(in_network)?;

    let claims = NetworkClaims {
        merkle_root: hex_encode(tree.root()),
        accounts,
    };
    info!(
        network = %set.network,
        root = %claims.merkle_root,
        claims = claims.accounts.len(),
        "generated merkle tree"
    );

    Ok((claims, tree))
}

/// Accumulates network reports; `finish` verifies every proof before handing
/// the report out.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    options: TreeOptions,
    report: ClaimsPerNetwork,
}

impl ReportAssembler {
    pub fn new(options: TreeOptions) -> Self {
        ReportAssembler {
            options,
            report: ClaimsPerNetwork::new(),
        }
    }

    /// Proves one network and records its report. Returns the network's tree.
    pub fn add_network(&mut self, set: &NetworkClaimSet) -> Result<MerkleTree> {
        let (claims, tree) = prove_network(set, self.options)?;
        self.report.insert(set.network.clone(), claims);
        Ok(tree)
    }

    pub fn finish(self) -> Result<ClaimsPerNetwork> {
        verify_report(&self.report)?;
        Ok(self.report)
    }
}

/// Runs the whole pipeline over already-normalized claims.
pub fn assemble(sets: &[NetworkClaimSet], options: TreeOptions) -> Result<ClaimsPerNetwork> {
    let mut assembler = ReportAssembler::new(options);
    for set in sets {
        assembler.add_network(set)?;
    }
    assembler.finish()
}

fn verify_network(network: &str, claims: &NetworkClaims) -> Result<()> {
    let root = common::parse_hash(&claims.merkle_root)?;

    for entry in &claims.accounts {
        let leaf = leaf::encode(&entry.claim)?;
        if !tree::verify_proof(root, leaf, &entry.proof()?) {
            return Err(ClaimsError::ProofMismatch {
                network: network.to_string(),
                account: entry.claim.account.clone(),
                token: entry.claim.token_address.clone(),
            });
        }
    }

    Ok(())
}

/// Re-hashes every claim and walks its proof up to its network's root.
///
/// Returns the number of verified claims.
pub fn verify_report(report: &ClaimsPerNetwork) -> Result<usize> {
    for (network, claims) in report.iter() {
        verify_network(network, claims).map_err(|err| err.in_network(network))?;
        debug!(network, claims = claims.accounts.len(), "verified proofs");
    }
    Ok(report.claim_count())
}
