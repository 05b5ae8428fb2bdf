pub mod common;
pub mod error;
pub mod leaf;
pub mod normalize;
pub mod report;
pub mod tree;

pub use common::{
    hash_sorted_pair, hex_encode, keccak256, parse_address, write_file_atomic, Hash,
};
pub use error::ClaimsError;
pub use leaf::{Claim, NodeHasher, StandardHasher};
pub use normalize::{flatten, NetworkClaimSet};
pub use report::{
    assemble, verify_report, ClaimWithProof, ClaimsPerNetwork, NetworkClaims, ReportAssembler,
};
pub use tree::{verify_proof, MerkleTree, TreeDump, TreeOptions};
