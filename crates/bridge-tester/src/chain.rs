//! Typed handles to the two chains under test.

use alloy::{
    primitives::{Address, B256, Bytes, TxKind, U256},
    sol_types::SolCall,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tokio::sync::OnceCell;

use crate::{
    calls::IERC20,
    config::ChainConfig,
    error::BridgeError,
    metrics::TesterMetrics,
    retry::{RetryPolicy, with_retry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainKind {
    L1,
    L2,
}

impl std::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L1 => f.write_str("L1"),
            Self::L2 => f.write_str("L2"),
        }
    }
}

/// Latest fee market reading. `None` when the endpoint could not report a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasSuggestion {
    pub base_fee: Option<u128>,
    pub priority_fee: Option<u128>,
}

/// Read-only call or estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
}

impl CallRequest {
    pub fn view(to: Address, input: impl Into<Bytes>) -> Self {
        Self { from: None, to: TxKind::Call(to), value: U256::ZERO, input: input.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptInfo {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub contract_address: Option<Address>,
}

/// Where a broadcast transaction currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Neither mined nor known to the pool.
    Unknown,
    /// Known to the pool, not yet mined.
    Pending,
    Success(ReceiptInfo),
    Reverted(ReceiptInfo),
}

/// JSON-RPC surface the tester needs from a chain.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Latest base fee (from fee history) and suggested priority fee.
    async fn gas_suggestion(&self) -> eyre::Result<GasSuggestion>;

    async fn balance(&self, account: Address) -> eyre::Result<U256>;

    /// Transaction count including the pending block.
    async fn pending_nonce(&self, account: Address) -> eyre::Result<u64>;

    async fn estimate_gas(&self, request: &CallRequest) -> eyre::Result<u64>;

    async fn call(&self, request: &CallRequest) -> eyre::Result<Bytes>;

    /// Broadcast a signed EIP-2718 envelope.
    async fn send_raw_transaction(&self, encoded: Bytes) -> eyre::Result<B256>;

    async fn receipt(&self, tx_hash: B256) -> eyre::Result<Option<ReceiptInfo>>;

    /// Whether the node still knows the transaction (pooled or mined).
    async fn transaction_known(&self, tx_hash: B256) -> eyre::Result<bool>;
}

/// One chain: its client, addresses and identity.
///
/// All reads go through [`with_retry`] and surface as
/// [`BridgeError::EndpointUnavailable`] once retries are exhausted. Broadcasts are
/// never retried here; the submitter classifies their errors.
#[derive(Clone)]
pub struct ChainEndpoint {
    kind: ChainKind,
    config: ChainConfig,
    client: Arc<dyn ChainClient>,
    retry: RetryPolicy,
    chain_id: Arc<OnceCell<u64>>,
    metrics: TesterMetrics,
}

impl std::fmt::Debug for ChainEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEndpoint")
            .field("kind", &self.kind)
            .field("name", &self.config.name)
            .field("rpc_url", &self.config.rpc_url)
            .finish_non_exhaustive()
    }
}

impl ChainEndpoint {
    pub fn new(kind: ChainKind, config: ChainConfig, client: Arc<dyn ChainClient>) -> Self {
        let chain_id = Arc::new(OnceCell::new_with(config.chain_id));
        Self {
            kind,
            config,
            client,
            retry: RetryPolicy::default(),
            chain_id,
            metrics: TesterMetrics::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: TesterMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub const fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub const fn standard_bridge(&self) -> Address {
        self.config.standard_bridge
    }

    pub const fn message_passer(&self) -> Option<Address> {
        self.config.message_passer
    }

    pub const fn token(&self) -> Address {
        self.config.token
    }

    /// Chain id from config, or fetched once from the endpoint.
    pub async fn chain_id(&self) -> Result<u64, BridgeError> {
        self.chain_id
            .get_or_try_init(|| self.read("chain_id", || self.client.chain_id()))
            .await
            .copied()
    }

    pub async fn current_gas_suggestion(&self) -> Result<GasSuggestion, BridgeError> {
        self.read("gas_suggestion", || self.client.gas_suggestion()).await
    }

    pub async fn get_balance(&self, account: Address) -> Result<U256, BridgeError> {
        self.read("get_balance", || self.client.balance(account)).await
    }

    pub async fn pending_nonce(&self, account: Address) -> Result<u64, BridgeError> {
        self.read("pending_nonce", || self.client.pending_nonce(account)).await
    }

    /// Gas estimate. Errors are returned as-is so callers can fall back to a cap.
    pub async fn estimate_gas(&self, request: &CallRequest) -> eyre::Result<u64> {
        with_retry(self.retry, self.kind, "estimate_gas", || self.client.estimate_gas(request)).await
    }

    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, BridgeError> {
        let request = CallRequest::view(token, IERC20::balanceOfCall { owner }.abi_encode());
        let output = self.read("token_balance", || self.client.call(&request)).await?;
        self.decode::<IERC20::balanceOfCall>("token_balance", &output)
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BridgeError> {
        let request = CallRequest::view(token, IERC20::allowanceCall { owner, spender }.abi_encode());
        let output = self.read("allowance", || self.client.call(&request)).await?;
        self.decode::<IERC20::allowanceCall>("allowance", &output)
    }

    pub async fn send_raw_transaction(&self, encoded: Bytes) -> eyre::Result<B256> {
        let started = Instant::now();
        let result = self.client.send_raw_transaction(encoded).await;
        self.metrics.record_rpc_latency(started.elapsed().as_secs_f64());
        result
    }

    /// Receipt if mined, otherwise whether the pool still knows the hash.
    pub async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<TxStatus, BridgeError> {
        let receipt = self.read("get_transaction_receipt", || self.client.receipt(tx_hash)).await?;
        if let Some(receipt) = receipt {
            return Ok(if receipt.success { TxStatus::Success(receipt) } else { TxStatus::Reverted(receipt) });
        }
        let known = self.read("get_transaction_by_hash", || self.client.transaction_known(tx_hash)).await?;
        Ok(if known { TxStatus::Pending } else { TxStatus::Unknown })
    }

    async fn read<F, Fut, T>(&self, operation: &'static str, f: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = eyre::Result<T>>,
    {
        let started = Instant::now();
        let result = with_retry(self.retry, self.kind, operation, f).await;
        self.metrics.record_rpc_latency(started.elapsed().as_secs_f64());
        result.map_err(|err| BridgeError::EndpointUnavailable {
            chain: self.kind,
            operation,
            reason: format!("{err:#}"),
        })
    }

    fn decode<C: SolCall>(&self, operation: &'static str, output: &[u8]) -> Result<C::Return, BridgeError> {
        C::abi_decode_returns(output).map_err(|err| BridgeError::EndpointUnavailable {
            chain: self.kind,
            operation,
            reason: format!("malformed return data: {err}"),
        })
    }
}
