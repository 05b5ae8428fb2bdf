//! Flat-array Merkle tree over claim leaves.
//!
//! Layout matches the standard JS tree the verifier's tooling uses: `2n - 1`
//! nodes, root at index 0, children of node `i` at `2i + 1` and `2i + 2`, and
//! the `n` leaves packed at the end of the array. An odd leaf count needs no
//! padding since the array layout alone decides which leaves pair up.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{self, Hash};
use crate::error::{ClaimsError, Result};
use crate::leaf::{Claim, NodeHasher, StandardHasher, LEAF_ENCODING};

/// Dump format tag understood by the JS tooling.
pub const DUMP_FORMAT: &str = "standard-v1";

/// Tree construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Sort leaves by hash before placing them. Makes the root independent of
    /// input order.
    pub sort_leaves: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions { sort_leaves: true }
    }
}

/// A claim and the position of its leaf in the node array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafValue {
    pub claim: Claim,
    pub tree_index: usize,
}

#[derive(Debug, Clone)]
pub struct MerkleTree<H: NodeHasher = StandardHasher> {
    hasher: H,
    tree: Vec<Hash>,
    values: Vec<LeafValue>,
}

fn left_child(index: usize) -> usize {
    2 * index + 1
}

fn parent(index: usize) -> usize {
    (index - 1) / 2
}

fn sibling(index: usize) -> usize {
    if index % 2 == 1 {
        index + 1
    } else {
        index - 1
    }
}

/// Checks a proof by folding sorted-pair hashes from `leaf` up to `root`.
pub fn verify_proof(root: Hash, leaf: Hash, proof: &[Hash]) -> bool {
    verify_proof_with(&StandardHasher, root, leaf, proof)
}

/// Like [`verify_proof`], with a caller-supplied hasher.
pub fn verify_proof_with<H: NodeHasher>(
    hasher: &H,
    root: Hash,
    leaf: Hash,
    proof: &[Hash],
) -> bool {
    proof
        .iter()
        .fold(leaf, |node, sibling| hasher.hash_pair(node, *sibling))
        == root
}

impl MerkleTree<StandardHasher> {
    /// Builds a tree with the standard hashing rules.
    pub fn build(claims: Vec<Claim>, options: TreeOptions) -> Result<Self> {
        Self::build_with_hasher(claims, options, StandardHasher)
    }

    /// Rebuilds a tree from a `standard-v1` dump and validates it.
    pub fn load(dump: &TreeDump) -> Result<Self> {
        if dump.format != DUMP_FORMAT {
            return Err(ClaimsError::InvalidInput {
                path: "format".to_string(),
                reason: format!("unknown tree dump format {:?}", dump.format),
            });
        }
        if dump.leaf_encoding != LEAF_ENCODING {
            return Err(ClaimsError::InvalidInput {
                path: "leafEncoding".to_string(),
                reason: format!("unsupported leaf encoding {:?}", dump.leaf_encoding),
            });
        }

        let tree = dump
            .tree
            .iter()
            .map(|node| common::parse_hash(node))
            .collect::<Result<Vec<_>>>()?;

        let values = dump
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| match value.value.as_slice() {
                [account, token, amount] => Ok(LeafValue {
                    claim: Claim::new(account.as_str(), token.as_str(), amount.as_str()),
                    tree_index: value.tree_index,
                }),
                other => Err(ClaimsError::InvalidInput {
                    path: format!("values[{i}]"),
                    reason: format!("expected 3 fields, got {}", other.len()),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let loaded = MerkleTree {
            hasher: StandardHasher,
            tree,
            values,
        };
        loaded.validate()?;
        Ok(loaded)
    }
}

impl<H: NodeHasher> MerkleTree<H> {
    /// Builds a tree from claims in the order given.
    ///
    /// Fails on an empty claim list, on any claim that does not encode, and on a
    /// triple that appears more than once.
    pub fn build_with_hasher(
        claims: Vec<Claim>,
        options: TreeOptions,
        hasher: H,
    ) -> Result<Self> {
        if claims.is_empty() {
            return Err(ClaimsError::EmptyInput {
                network: String::new(),
            });
        }

        let mut seen = HashSet::with_capacity(claims.len());
        for claim in &claims {
            if !seen.insert(claim) {
                return Err(ClaimsError::DuplicateClaim {
                    account: claim.account.clone(),
                    token: claim.token_address.clone(),
                    amount: claim.amount.clone(),
                });
            }
        }

        let mut hashed = claims
            .iter()
            .enumerate()
            .map(|(value_index, claim)| -> Result<(Hash, usize)> {
                Ok((hasher.leaf_hash(&claim.parse()?), value_index))
            })
            .collect::<Result<Vec<_>>>()?;
        if options.sort_leaves {
            hashed.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let leaf_count = hashed.len();
        let len = 2 * leaf_count - 1;
        let mut tree = vec![[0u8; 32]; len];
        let mut tree_indices = vec![0usize; leaf_count];
        for (i, (leaf, value_index)) in hashed.into_iter().enumerate() {
            tree[len - 1 - i] = leaf;
            tree_indices[value_index] = len - 1 - i;
        }

        for i in (0..len - leaf_count).rev() {
            tree[i] = hasher.hash_pair(tree[left_child(i)], tree[left_child(i) + 1]);
        }

        let values = claims
            .into_iter()
            .zip(tree_indices)
            .map(|(claim, tree_index)| LeafValue { claim, tree_index })
            .collect();

        debug!(leaves = leaf_count, root = %common::hex_encode(tree[0]), "built merkle tree");

        Ok(MerkleTree {
            hasher,
            tree,
            values,
        })
    }

    pub fn root(&self) -> Hash {
        self.tree[0]
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in the order they were supplied to the builder.
    pub fn values(&self) -> &[LeafValue] {
        &self.values
    }

    /// The full node array.
    pub fn nodes(&self) -> &[Hash] {
        &self.tree
    }

    fn value(&self, value_index: usize) -> Result<&LeafValue> {
        self.values
            .get(value_index)
            .ok_or(ClaimsError::IndexOutOfBounds {
                index: value_index,
                len: self.values.len(),
            })
    }

    fn is_leaf_node(&self, index: usize) -> bool {
        index < self.tree.len() && left_child(index) >= self.tree.len()
    }

    /// Leaf hash stored for the value at `value_index`.
    pub fn leaf_hash(&self, value_index: usize) -> Result<Hash> {
        Ok(self.tree[self.value(value_index)?.tree_index])
    }

    /// Recomputes every leaf and internal node and compares with the stored tree.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |index: usize, reason: String| ClaimsError::TreeCorruption { index, reason };

        if self.tree.is_empty() || self.tree.len() % 2 == 0 {
            return Err(corrupt(0, format!("invalid node count {}", self.tree.len())));
        }
        if self.tree.len() + 1 != 2 * self.values.len() {
            return Err(corrupt(
                0,
                format!(
                    "{} nodes cannot hold {} leaves",
                    self.tree.len(),
                    self.values.len()
                ),
            ));
        }

        let mut used = HashSet::with_capacity(self.values.len());
        for value in &self.values {
            let index = value.tree_index;
            if !self.is_leaf_node(index) {
                return Err(corrupt(index, "value does not point at a leaf".to_string()));
            }
            if !used.insert(index) {
                return Err(corrupt(index, "leaf is shared by two values".to_string()));
            }
            if self.hasher.leaf_hash(&value.claim.parse()?) != self.tree[index] {
                return Err(corrupt(index, "leaf hash does not match its claim".to_string()));
            }
        }

        for i in (0..self.tree.len()).rev().filter(|&i| !self.is_leaf_node(i)) {
            let expected = self
                .hasher
                .hash_pair(self.tree[left_child(i)], self.tree[left_child(i) + 1]);
            if expected != self.tree[i] {
                return Err(corrupt(i, "internal node does not match its children".to_string()));
            }
        }

        Ok(())
    }

    /// Sibling path from the leaf of `value_index` up to the root.
    pub fn get_proof(&self, value_index: usize) -> Result<Vec<Hash>> {
        let mut index = self.value(value_index)?.tree_index;
        if !self.is_leaf_node(index) {
            return Err(ClaimsError::TreeCorruption {
                index,
                reason: "value does not point at a leaf".to_string(),
            });
        }

        let mut proof = Vec::new();
        while index > 0 {
            proof.push(self.tree[sibling(index)]);
            index = parent(index);
        }
        Ok(proof)
    }

    /// Index of the first value whose three fields equal `claim` exactly.
    pub fn position(&self, claim: &Claim) -> Option<usize> {
        self.values.iter().position(|value| &value.claim == claim)
    }

    /// Proof for the first value equal to `claim`.
    ///
    /// Matches on the claim strings rather than on hashes.
    pub fn find_proof(&self, claim: &Claim) -> Result<Vec<Hash>> {
        let value_index = self
            .position(claim)
            .ok_or_else(|| ClaimsError::LeafNotFound {
                account: claim.account.clone(),
                token: claim.token_address.clone(),
                amount: claim.amount.clone(),
            })?;
        self.get_proof(value_index)
    }

    /// Checks `proof` for the value at `value_index` against this tree's root.
    pub fn verify(&self, value_index: usize, proof: &[Hash]) -> Result<bool> {
        let leaf = self.leaf_hash(value_index)?;
        Ok(verify_proof_with(&self.hasher, self.root(), leaf, proof))
    }

    /// Serializable snapshot of the whole tree.
    pub fn dump(&self) -> TreeDump {
        TreeDump {
            format: DUMP_FORMAT.to_string(),
            leaf_encoding: LEAF_ENCODING.iter().map(|t| t.to_string()).collect(),
            tree: self.tree.iter().map(common::hex_encode).collect(),
            values: self
                .values
                .iter()
                .map(|value| DumpValue {
                    value: value.claim.values().into_iter().map(str::to_string).collect(),
                    tree_index: value.tree_index,
                })
                .collect(),
        }
    }
}

/// `standard-v1` tree dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDump {
    pub format: String,
    pub leaf_encoding: Vec<String>,
    pub tree: Vec<String>,
    pub values: Vec<DumpValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpValue {
    pub value: Vec<String>,
    pub tree_index: usize,
}
