use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sha3::{Digest, Keccak256};

use crate::error::{ClaimsError, Result};

/// A 32-byte node or leaf hash.
pub type Hash = [u8; 32];

/// A 20-byte account or token address.
pub type Address = [u8; 20];

/// Computes the Keccak256 hash of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Computes a Keccak256 hash of two 32-byte values, smaller one first.
///
/// Ordering the children makes the parent independent of which side each
/// child sits on, so proofs carry no left/right flags.
///
/// # Arguments
/// * `a` - First 32-byte value
/// * `b` - Second 32-byte value
///
/// # Returns
/// 32-byte hash result
pub fn hash_sorted_pair(a: Hash, b: Hash) -> Hash {
    let (left, right) = if a <= b { (a, b) } else { (b, a) };
    let hash = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize();
    hash.into()
}

/// Parses an Ethereum address from a hex string.
///
/// Accepts the forms the ABI coder of the verifying side accepts: an optional
/// "0x" prefix followed by 40 hex digits, either single-case or a valid EIP-55
/// checksum. The zero address is a valid ABI value and is accepted.
///
/// # Errors
/// Returns [`ClaimsError::InvalidAddress`] on a wrong length, non-hex digits or
/// a mixed-case string whose checksum does not match.
pub fn parse_address(addr_str: &str) -> Result<Address> {
    let invalid = |reason: String| ClaimsError::InvalidAddress {
        value: addr_str.to_string(),
        reason,
    };

    let cleaned = addr_str.strip_prefix("0x").unwrap_or(addr_str);
    if cleaned.len() != 40 {
        return Err(invalid(format!(
            "expected 40 hex chars, got {}",
            cleaned.len()
        )));
    }

    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| invalid(format!("invalid hex encoding: {e}")))?;

    let has_lower = cleaned.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = cleaned.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_hex(&address) != cleaned {
        return Err(invalid("bad address checksum".to_string()));
    }

    Ok(address)
}

/// Renders an address as 40 EIP-55 checksummed hex digits (no prefix).
pub fn to_checksum_hex(address: &Address) -> String {
    let lower = hex::encode(address);
    let digest = keccak256(lower.as_bytes());

    lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let nibble = (digest[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// Encodes bytes as a "0x"-prefixed lowercase hex string.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a "0x"-prefixed (or bare) 64-digit hex string into a hash.
pub fn parse_hash(hash_str: &str) -> Result<Hash> {
    let cleaned = hash_str.strip_prefix("0x").unwrap_or(hash_str);
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash).map_err(|e| ClaimsError::InvalidHash {
        value: hash_str.to_string(),
        reason: e.to_string(),
    })?;
    Ok(hash)
}

/// An artifact written to a temp file next to its destination, not yet visible.
///
/// Dropping it removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    temp_file: tempfile::NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the temp file onto its destination.
    pub fn persist(self) -> anyhow::Result<()> {
        self.temp_file
            .persist(&self.path)
            .with_context(|| format!("Failed to move temp file to {}", self.path.display()))?;
        Ok(())
    }
}

/// Writes `content` to a temp file in `path`'s directory without touching `path`.
pub fn stage_file(path: &Path, content: &str) -> anyhow::Result<StagedFile> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temp file")?;
    temp_file.flush().context("Failed to flush temp file")?;

    Ok(StagedFile {
        temp_file,
        path: path.to_path_buf(),
    })
}

/// Persists staged files in order.
///
/// If one rename fails, the destinations already persisted by this call are
/// removed and the remaining temp files are dropped, so either every artifact
/// appears or none of them does.
pub fn persist_all(staged: Vec<StagedFile>) -> anyhow::Result<()> {
    let mut persisted: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for file in staged {
        let path = file.path.clone();
        if let Err(err) = file.persist() {
            for done in &persisted {
                let _ = fs::remove_file(done);
            }
            return Err(err);
        }
        persisted.push(path);
    }
    Ok(())
}

/// Writes `content` to `path` through a temp file in the same directory.
///
/// Readers either see the previous file or the complete new one, never a
/// partially written artifact.
pub fn write_file_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    stage_file(path, content)?.persist()
}
