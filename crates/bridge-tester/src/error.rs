//! Classified failures of the orchestration core.

use alloy::primitives::{Address, B256, U256};

use crate::chain::ChainKind;

/// What the balance check was measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Native,
    Token(Address),
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Token(token) => write!(f, "token {token}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The pool kept refusing the transaction until the attempt ceiling.
    #[error("transaction on {chain} still underpriced after {attempts} attempt(s)")]
    PricingRejected { chain: ChainKind, attempts: usize },

    #[error("transaction {tx_hash} reverted on {chain}")]
    ExecutionReverted { chain: ChainKind, tx_hash: B256 },

    #[error(
        "insufficient {asset} balance for {account} on {chain}: have {balance}, need {required}"
    )]
    InsufficientFunds {
        chain: ChainKind,
        account: Address,
        asset: Asset,
        balance: U256,
        required: U256,
    },

    #[error("{chain} endpoint unavailable during {operation}: {reason}")]
    EndpointUnavailable {
        chain: ChainKind,
        operation: &'static str,
        reason: String,
    },

    /// Cross-chain credit not observed in time. Reported, never fatal.
    #[error("settlement on {chain} not observed within {waited_secs}s")]
    SettlementTimeout { chain: ChainKind, waited_secs: u64 },

    #[error("contract tooling failed: {0}")]
    ToolingFailure(String),

    #[error("transaction on {chain} abandoned after {attempts} attempt(s): {reason}")]
    Abandoned {
        chain: ChainKind,
        attempts: usize,
        reason: String,
    },

    #[error("transaction rejected by {chain}: {reason}")]
    Rejected { chain: ChainKind, reason: String },

    #[error("nonce for {account} on {chain} is already in flight")]
    NonceInFlight { chain: ChainKind, account: Address },

    #[error("unknown account #{0}")]
    UnknownAccount(usize),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key file: {0}")]
    KeyFile(String),

    #[error("invalid config value for {field}: {message}")]
    Config { field: &'static str, message: String },
}

impl BridgeError {
    /// Whether a batch in continue-mode may move past this failure.
    pub fn is_recoverable_in_batch(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. } | Self::KeyFile(_) | Self::UnknownAccount(_)
        )
    }
}
