//! Transaction orchestration core for L1 <-> L2 bridge testing.
//!
//! Builds, prices, signs and submits the transactions of the standard bridge
//! flows (deposits, withdrawal initiation, ERC-20 bridging, faucet claims and
//! contract deployments) against a pair of OP-stack style chains, and sequences
//! them across a set of test accounts.

pub mod accounts;
pub mod calls;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fees;
pub mod jobs;
pub mod ledger;
pub mod metrics;
pub mod ops;
pub mod orchestrator;
pub mod retry;
pub mod rpc;
pub mod settlement;
pub mod submitter;

pub use chain::{ChainEndpoint, ChainKind};
pub use config::TesterConfig;
pub use error::BridgeError;
pub use ops::Bridge;
pub use orchestrator::{BatchOrchestrator, FailurePolicy};

#[cfg(test)]
mod tests;
