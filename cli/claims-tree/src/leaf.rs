//! Leaf encoding for token claims.
//!
//! A claim is committed to as `keccak256(keccak256(abi.encode(account, token, amount)))`
//! with the Solidity types `(address, address, uint256)`. Internal nodes use
//! sorted-pair keccak hashing. Both rules are fixed by the verifying contract.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::common::{self, Address, Hash};
use crate::error::{ClaimsError, Result};

/// Solidity types of the leaf tuple, in encoding order.
pub const LEAF_ENCODING: [&str; 3] = ["address", "address", "uint256"];

/// Size of one ABI word.
const WORD: usize = 32;

/// One token entitlement, kept exactly as it appeared in the input.
///
/// Identity is the tuple of the three strings; no case folding is applied to
/// addresses, so the output echoes whatever form the input used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub account: String,
    pub token_address: String,
    pub amount: String,
}

impl Claim {
    pub fn new(
        account: impl Into<String>,
        token_address: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Claim {
            account: account.into(),
            token_address: token_address.into(),
            amount: amount.into(),
        }
    }

    /// Validates the three fields and converts them to their ABI values.
    pub fn parse(&self) -> Result<ParsedClaim> {
        Ok(ParsedClaim {
            account: common::parse_address(&self.account)?,
            token: common::parse_address(&self.token_address)?,
            amount: parse_amount(&self.amount)?,
        })
    }

    /// The claim's fields in leaf-encoding order.
    pub fn values(&self) -> [&str; 3] {
        [
            self.account.as_str(),
            self.token_address.as_str(),
            self.amount.as_str(),
        ]
    }
}

/// A claim converted to the ABI values it is encoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedClaim {
    pub account: Address,
    pub token: Address,
    pub amount: BigUint,
}

impl ParsedClaim {
    /// Standard ABI encoding of `(address, address, uint256)`: three
    /// left-padded 32-byte words.
    pub fn abi_encode(&self) -> [u8; 3 * WORD] {
        let mut encoded = [0u8; 3 * WORD];
        encoded[12..WORD].copy_from_slice(&self.account);
        encoded[WORD + 12..2 * WORD].copy_from_slice(&self.token);

        let amount = self.amount.to_bytes_be();
        encoded[3 * WORD - amount.len()..].copy_from_slice(&amount);
        encoded
    }
}

/// Parses a decimal amount that must fit in a `uint256`.
///
/// Only plain ASCII digits are accepted: no sign, whitespace, hex prefix or
/// exponent.
pub fn parse_amount(amount_str: &str) -> Result<BigUint> {
    let invalid = |reason: &str| ClaimsError::InvalidAmount {
        value: amount_str.to_string(),
        reason: reason.to_string(),
    };

    if amount_str.is_empty() || !amount_str.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a non-negative decimal integer"));
    }

    let amount = BigUint::parse_bytes(amount_str.as_bytes(), 10)
        .ok_or_else(|| invalid("not a non-negative decimal integer"))?;
    if amount.bits() > 256 {
        return Err(invalid("does not fit in uint256"));
    }

    Ok(amount)
}

/// Hashing strategy for leaves and internal nodes.
///
/// The tree is generic over this so tests can pin byte output, but only
/// [`StandardHasher`] is compatible with the on-chain verifier.
pub trait NodeHasher {
    /// Hashes the ABI-encoded leaf tuple.
    fn hash_leaf(&self, encoded: &[u8]) -> Hash;

    /// Hashes two children into their parent.
    fn hash_pair(&self, a: Hash, b: Hash) -> Hash;

    /// Hashes a claim into its leaf.
    fn leaf_hash(&self, claim: &ParsedClaim) -> Hash {
        self.hash_leaf(&claim.abi_encode())
    }
}

/// Double-hashed keccak leaves with sorted-pair keccak nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardHasher;

impl NodeHasher for StandardHasher {
    fn hash_leaf(&self, encoded: &[u8]) -> Hash {
        common::keccak256(&common::keccak256(encoded))
    }

    fn hash_pair(&self, a: Hash, b: Hash) -> Hash {
        common::hash_sorted_pair(a, b)
    }
}

/// Leaf hash of a claim under the standard encoding.
pub fn encode(claim: &Claim) -> Result<Hash> {
    Ok(StandardHasher.leaf_hash(&claim.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hex_encode;

    const ACCOUNT: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TOKEN: &str = "0x1111111111111111111111111111111111111111";
    const MAX_UINT256: &str =
        "115792089237316195423570985008687907853269984665640564039457584007913129639935";

    #[test]
    fn test_abi_encode_layout() {
        let parsed = Claim::new(ACCOUNT, TOKEN, "100").parse().unwrap();
        assert_eq!(
            hex::encode(parsed.abi_encode()),
            concat!(
                "000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "0000000000000000000000001111111111111111111111111111111111111111",
                "0000000000000000000000000000000000000000000000000000000000000064",
            )
        );
    }

    #[test]
    fn test_leaf_hash_vector() {
        let leaf = encode(&Claim::new(ACCOUNT, TOKEN, "100")).unwrap();
        assert_eq!(
            hex_encode(leaf),
            "0x7644a0c176926a031cc3635a0cab39d9ba71e38740932c4b4a4399cfcaddc164"
        );
    }

    #[test]
    fn test_leaf_hash_ignores_address_case() {
        let lower = encode(&Claim::new(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            TOKEN,
            "1",
        ))
        .unwrap();
        let checksummed = encode(&Claim::new(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            TOKEN,
            "1",
        ))
        .unwrap();
        assert_eq!(lower, checksummed);
    }

    #[test]
    fn test_parse_amount_bounds() {
        assert_eq!(parse_amount("0").unwrap(), BigUint::from(0u32));
        assert_eq!(parse_amount("007").unwrap(), BigUint::from(7u32));
        assert_eq!(parse_amount(MAX_UINT256).unwrap().bits(), 256);

        let overflow =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        let err = parse_amount(overflow).unwrap_err();
        assert!(err.to_string().contains("uint256"));
    }

    #[test]
    fn test_parse_amount_rejects_malformed() {
        for bad in ["", "-1", "+1", "1.5", "1e18", "0x10", " 1", "abc"] {
            assert!(
                matches!(parse_amount(bad), Err(ClaimsError::InvalidAmount { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode_rejects_bad_address() {
        let err = encode(&Claim::new("0xabc", TOKEN, "1")).unwrap_err();
        assert!(matches!(err, ClaimsError::InvalidAddress { .. }));
    }

    #[test]
    fn test_max_amount_fills_last_word() {
        let parsed = Claim::new(ACCOUNT, TOKEN, MAX_UINT256).parse().unwrap();
        assert_eq!(parsed.abi_encode()[64..], [0xffu8; 32]);
    }
}
