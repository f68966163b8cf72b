//! Test accounts and the key file they are loaded from.

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::error::BridgeError;

/// Default key file, one private key per line.
pub const DEFAULT_KEY_FILE: &str = "add.txt";

/// Position of an account in the key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AccountId(pub usize);

impl AccountId {
    pub const SOURCE: Self = Self(0);
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// First key in the file; funds distribution and deploys contracts.
    Source,
    Target,
}

/// Public view of an account. The key stays inside the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub address: Address,
    pub role: Role,
}

/// Parse key file contents.
///
/// Blank lines and `#` comments are ignored, the `0x` prefix is optional and
/// malformed keys are skipped with a warning. Fails if no valid key remains.
pub fn parse_keys(contents: &str) -> Result<Vec<PrivateKeySigner>, BridgeError> {
    let mut signers = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let hex = line.strip_prefix("0x").or_else(|| line.strip_prefix("0X")).unwrap_or(line);
        match hex.parse::<PrivateKeySigner>() {
            Ok(signer) => signers.push(signer),
            Err(err) => warn!(line = line_no + 1, error = %err, "Skipping malformed private key"),
        }
    }

    if signers.is_empty() {
        return Err(BridgeError::KeyFile("no valid private keys found".to_string()));
    }
    Ok(signers)
}

pub fn load_key_file(path: &Path) -> Result<Vec<PrivateKeySigner>, BridgeError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| BridgeError::KeyFile(format!("failed to read {}: {err}", path.display())))?;
    parse_keys(&contents)
}
