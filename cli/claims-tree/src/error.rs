//! Error types for claim normalization, tree construction and proof generation.
//!
//! Every variant is fatal for the run: the generator is a one-shot batch job and
//! nothing here is retried.

use thiserror::Error;

/// Errors raised while turning a claims document into a proof report.
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// The input document does not have the expected shape.
    #[error("invalid input at {path}: {reason}")]
    InvalidInput {
        /// JSON path of the offending node, e.g. `mainnet.0xabc…[1]`.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A network has no claims at all.
    #[error("network {network} has no claims")]
    EmptyInput {
        /// Network identifier.
        network: String,
    },

    /// An account or token string is not a valid 20-byte address.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress { value: String, reason: String },

    /// An amount is not a non-negative integer that fits in 256 bits.
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    /// A hash string could not be decoded into 32 bytes.
    #[error("invalid hash {value:?}: {reason}")]
    InvalidHash { value: String, reason: String },

    /// The same (account, token, amount) triple appears twice in one tree.
    #[error("duplicate claim: account {account}, token {token}, amount {amount}")]
    DuplicateClaim {
        account: String,
        token: String,
        amount: String,
    },

    /// Recomputing the tree disagreed with the stored nodes.
    #[error("tree corruption at node {index}: {reason}")]
    TreeCorruption { index: usize, reason: String },

    /// No leaf matches the claim a proof was requested for.
    #[error("no leaf for claim: account {account}, token {token}, amount {amount}")]
    LeafNotFound {
        account: String,
        token: String,
        amount: String,
    },

    /// A value index past the end of the tree's values.
    #[error("value index {index} is out of bounds for tree with {len} values")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A proof in a report does not lead back to its network's root.
    #[error("proof does not verify for account {account}, token {token} on network {network}")]
    ProofMismatch {
        network: String,
        account: String,
        token: String,
    },

    /// Wraps an error with the network it occurred in.
    #[error("network {network}: {error}")]
    Network {
        network: String,
        error: Box<ClaimsError>,
    },
}

impl ClaimsError {
    /// Attaches the network identifier to an error, unless it already carries one.
    pub fn in_network(self, network: &str) -> Self {
        match self {
            err @ (ClaimsError::Network { .. }
            | ClaimsError::EmptyInput { .. }
            | ClaimsError::ProofMismatch { .. }) => err,
            err => ClaimsError::Network {
                network: network.to_string(),
                error: Box::new(err),
            },
        }
    }

    /// Short name of the error kind, used in the CLI diagnostic.
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimsError::InvalidInput { .. }
            | ClaimsError::InvalidAddress { .. }
            | ClaimsError::InvalidHash { .. } => "InvalidInputError",
            ClaimsError::EmptyInput { .. } => "EmptyInputError",
            ClaimsError::InvalidAmount { .. } => "ValueError",
            ClaimsError::DuplicateClaim { .. } => "DuplicateClaimError",
            ClaimsError::TreeCorruption { .. } => "TreeCorruptionError",
            ClaimsError::LeafNotFound { .. } | ClaimsError::IndexOutOfBounds { .. } => {
                "LeafNotFoundError"
            }
            ClaimsError::ProofMismatch { .. } => "ProofMismatchError",
            ClaimsError::Network { error, .. } => error.kind(),
        }
    }
}

pub type Result<T, E = ClaimsError> = std::result::Result<T, E>;
