//! Flattens the nested claims document into ordered claim lists.
//!
//! Input shape: `{ network: { account: [ { token: amount }, ... ] } }`. Everything
//! is enumerated in document order (networks, accounts, list entries, then keys
//! within an entry), which requires `serde_json`'s `preserve_order` feature.

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::{ClaimsError, Result};
use crate::leaf::Claim;

/// Claims of one network, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkClaimSet {
    pub network: String,
    pub claims: Vec<Claim>,
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| ClaimsError::InvalidInput {
        path: path.to_string(),
        reason: format!("expected an object, got {}", type_name(value)),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Renders a JSON number the way a JS `String(number)` would for integers.
///
/// Anything that is not a plain integer keeps its JSON text and is rejected
/// later by the amount parser.
fn number_to_decimal(number: &Number) -> String {
    if let Some(n) = number.as_u64() {
        return n.to_string();
    }
    if let Some(n) = number.as_i64() {
        return n.to_string();
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        _ => number.to_string(),
    }
}

fn amount_to_string(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(number_to_decimal(n)),
        other => Err(ClaimsError::InvalidInput {
            path: path.to_string(),
            reason: format!("amount must be a string or number, got {}", type_name(other)),
        }),
    }
}

/// Flattens one network's `account -> [{token: amount}]` mapping.
pub fn flatten_network(network: &str, accounts: &Value) -> Result<Vec<Claim>> {
    let accounts = as_object(accounts, network)?;
    let mut claims = Vec::new();

    for (account, claim_list) in accounts {
        let path = format!("{network}.{account}");
        let entries = claim_list
            .as_array()
            .ok_or_else(|| ClaimsError::InvalidInput {
                path: path.clone(),
                reason: format!("expected an array, got {}", type_name(claim_list)),
            })?;

        for (i, entry) in entries.iter().enumerate() {
            let entry_path = format!("{path}[{i}]");
            let entry = as_object(entry, &entry_path)?;
            if entry.is_empty() {
                return Err(ClaimsError::InvalidInput {
                    path: entry_path,
                    reason: "claim entry has no token".to_string(),
                });
            }

            for (token, amount) in entry {
                let amount = amount_to_string(amount, &format!("{entry_path}.{token}"))?;
                claims.push(Claim::new(account.as_str(), token.as_str(), amount));
            }
        }
    }

    if claims.is_empty() {
        return Err(ClaimsError::EmptyInput {
            network: network.to_string(),
        });
    }

    debug!(network, accounts = accounts.len(), claims = claims.len(), "flattened network");
    Ok(claims)
}

/// Flattens the whole document into per-network claim lists.
pub fn flatten(document: &Value) -> Result<Vec<NetworkClaimSet>> {
    let networks = as_object(document, "$")?;
    if networks.is_empty() {
        return Err(ClaimsError::InvalidInput {
            path: "$".to_string(),
            reason: "no networks".to_string(),
        });
    }

    networks
        .iter()
        .map(|(network, accounts)| -> Result<NetworkClaimSet> {
            Ok(NetworkClaimSet {
                network: network.clone(),
                claims: flatten_network(network, accounts)?,
            })
        })
        .collect()
}
