//! Best-effort observation of cross-chain credits.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    chain::{ChainEndpoint, ChainKind},
    config::SettlementPolicy,
    error::{Asset, BridgeError},
    metrics::TesterMetrics,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SettlementStatus {
    Observed { delta: U256, waited_secs: u64 },
    /// No credit seen within the timeout. Not a failure.
    Pending { waited_secs: u64 },
}

/// What a watch looked for and what it saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub chain: ChainKind,
    pub account: Address,
    pub asset: Asset,
    pub before: U256,
    #[serde(flatten)]
    pub status: SettlementStatus,
}

impl SettlementReport {
    pub const fn is_observed(&self) -> bool {
        matches!(self.status, SettlementStatus::Observed { .. })
    }

    /// The pending state as a classified error, for callers that need one.
    pub fn timeout(&self) -> Option<BridgeError> {
        match self.status {
            SettlementStatus::Pending { waited_secs } => {
                Some(BridgeError::SettlementTimeout { chain: self.chain, waited_secs })
            }
            SettlementStatus::Observed { .. } => None,
        }
    }
}

/// Polls a destination balance for an expected increase.
#[derive(Debug, Clone)]
pub struct SettlementWatcher {
    policy: SettlementPolicy,
    metrics: TesterMetrics,
}

impl SettlementWatcher {
    pub const fn new(policy: SettlementPolicy, metrics: TesterMetrics) -> Self {
        Self { policy, metrics }
    }

    /// Read the balance a later [`Self::watch`] compares against.
    pub async fn snapshot(
        &self,
        endpoint: &ChainEndpoint,
        asset: Asset,
        account: Address,
    ) -> Result<U256, BridgeError> {
        read_balance(endpoint, asset, account).await
    }

    /// Wait until `account`'s balance on `endpoint` grew by at least `min_delta`
    /// over `before`, or the timeout passes.
    pub async fn watch(
        &self,
        endpoint: &ChainEndpoint,
        asset: Asset,
        account: Address,
        before: U256,
        min_delta: U256,
    ) -> SettlementReport {
        let started = Instant::now();
        let deadline = started + self.policy.timeout();
        info!(chain = %endpoint.kind(), %account, %asset, %min_delta, "Watching for settlement");

        let status = loop {
            match read_balance(endpoint, asset, account).await {
                Ok(now) if now.saturating_sub(before) >= min_delta && now > before => {
                    break SettlementStatus::Observed {
                        delta: now - before,
                        waited_secs: started.elapsed().as_secs(),
                    };
                }
                Ok(now) => debug!(chain = %endpoint.kind(), %account, %now, %before, "No credit yet"),
                Err(err) => warn!(chain = %endpoint.kind(), %account, error = %err, "Balance poll failed"),
            }

            if Instant::now() >= deadline {
                break SettlementStatus::Pending { waited_secs: started.elapsed().as_secs() };
            }
            tokio::time::sleep(self.policy.poll_interval()).await;
        };

        let observed = matches!(status, SettlementStatus::Observed { .. });
        self.metrics.record_settlement(observed);
        if observed {
            info!(chain = %endpoint.kind(), %account, ?status, "Settlement observed");
        } else {
            warn!(chain = %endpoint.kind(), %account, ?status, "Settlement not observed in time");
        }

        SettlementReport { chain: endpoint.kind(), account, asset, before, status }
    }
}

async fn read_balance(endpoint: &ChainEndpoint, asset: Asset, account: Address) -> Result<U256, BridgeError> {
    match asset {
        Asset::Native => endpoint.get_balance(account).await,
        Asset::Token(token) => endpoint.token_balance(token, account).await,
    }
}
